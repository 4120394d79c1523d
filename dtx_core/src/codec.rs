use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pixel::PixelData;
use crate::syntax::TransferSyntax;

/// Codec-specific settings (quality, near-lossless error bound, …).
///
/// The transcoder never looks inside; it hands the bag to the codec as-is.
/// Codecs ignore keys they do not understand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodecParams {
    entries: BTreeMap<String, String>,
}

impl CodecParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Parse `key` as `T`. `Ok(None)` when the key is absent.
    pub fn get_parsed<T>(&self, key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("codec parameter '{}' = '{}': {}", key, raw, e)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CodecParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Pixel codec bound to exactly one encapsulated transfer syntax.
///
/// Each `Codec` implementation:
/// - Reports the syntax it produces and consumes via `transfer_syntax()`; the
///   registry keys on it and it never changes for the lifetime of the codec.
/// - Fills the destination view frame by frame. For `decode` the destination
///   is a native view; for `encode` it is a view in the codec's own syntax.
/// - May adjust photometric interpretation or planar configuration on the
///   destination when its output layout differs from the source's.
pub trait Codec: Send + Sync {
    fn transfer_syntax(&self) -> &TransferSyntax;

    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    /// Decompress every frame of `old` into `new`.
    fn decode(
        &self,
        old: &PixelData,
        new: &mut PixelData,
        params: Option<&CodecParams>,
    ) -> anyhow::Result<()>;

    /// Compress every frame of `old` into `new`.
    fn encode(
        &self,
        old: &PixelData,
        new: &mut PixelData,
        params: Option<&CodecParams>,
    ) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_lookup() {
        let params: CodecParams = [("quality", "90"), ("mode", "fast")].into_iter().collect();
        assert_eq!(params.get_parsed::<u8>("quality").unwrap(), Some(90));
        assert_eq!(params.get_parsed::<u8>("missing").unwrap(), None);
        let err = params.get_parsed::<u8>("mode").unwrap_err();
        assert!(err.to_string().contains("'mode'"));
    }

    #[test]
    fn set_chains() {
        let mut params = CodecParams::new();
        params.set("a", "1").set("b", "2");
        assert_eq!(params.iter().count(), 2);
        assert!(!params.is_empty());
    }
}
