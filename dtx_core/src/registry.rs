use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::syntax::TransferSyntax;

/// Somewhere codecs come from: a list linked in at build time, a plugin
/// loader, a test fixture.
pub trait CodecSource {
    fn discover(&self) -> Vec<Arc<dyn Codec>>;
}

/// Maps transfer syntax → codec.
///
/// Shared as `Arc<CodecRegistry>`. Population takes the write lock, lookups
/// take the read lock, so concurrent transcodes can resolve codecs while a
/// rare re-population waits its turn.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: RwLock<HashMap<TransferSyntax, Arc<dyn Codec>>>,
    lookups: AtomicU64,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `codec` under its own syntax. A later registration for the
    /// same syntax replaces the earlier one.
    pub fn register(&self, codec: Arc<dyn Codec>) {
        let ts = codec.transfer_syntax().clone();
        tracing::debug!(uid = ts.uid(), codec = codec.name(), "codec registered");
        self.codecs.write().insert(ts, codec);
    }

    /// Register everything `source` discovers. Safe to call repeatedly;
    /// returns how many codecs this call registered.
    pub fn load_from(&self, source: &dyn CodecSource) -> usize {
        let discovered = source.discover();
        let count = discovered.len();
        let mut map = self.codecs.write();
        for codec in discovered {
            let ts = codec.transfer_syntax().clone();
            tracing::debug!(uid = ts.uid(), codec = codec.name(), "codec registered");
            map.insert(ts, codec);
        }
        tracing::debug!(count, total = map.len(), "codec source loaded");
        count
    }

    /// The codec registered for `ts`, matched on UID only.
    pub fn lookup(&self, ts: &TransferSyntax) -> Result<Arc<dyn Codec>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.codecs
            .read()
            .get(ts)
            .cloned()
            .ok_or_else(|| Error::CodecNotFound {
                uid: ts.uid().to_string(),
                name: ts.name().to_string(),
            })
    }

    pub fn contains(&self, ts: &TransferSyntax) -> bool {
        self.codecs.read().contains_key(ts)
    }

    /// Registered syntaxes, sorted by UID.
    pub fn syntaxes(&self) -> Vec<TransferSyntax> {
        let mut out: Vec<TransferSyntax> = self.codecs.read().keys().cloned().collect();
        out.sort_by(|a, b| a.uid().cmp(b.uid()));
        out
    }

    pub fn len(&self) -> usize {
        self.codecs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.read().is_empty()
    }

    /// Number of `lookup` calls served so far, hits and misses alike.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("syntaxes", &self.syntaxes())
            .field("lookups", &self.lookups())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecParams;
    use crate::pixel::PixelData;
    use crate::syntax::{JPEG_BASELINE, RLE_LOSSLESS};

    struct Named(TransferSyntax, &'static str);

    impl Codec for Named {
        fn transfer_syntax(&self) -> &TransferSyntax {
            &self.0
        }
        fn name(&self) -> &'static str {
            self.1
        }
        fn decode(&self, _: &PixelData, _: &mut PixelData, _: Option<&CodecParams>) -> anyhow::Result<()> {
            Ok(())
        }
        fn encode(&self, _: &PixelData, _: &mut PixelData, _: Option<&CodecParams>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Source(Vec<Arc<dyn Codec>>);

    impl CodecSource for Source {
        fn discover(&self) -> Vec<Arc<dyn Codec>> {
            self.0.clone()
        }
    }

    #[test]
    fn miss_is_codec_not_found() {
        let registry = CodecRegistry::new();
        let err = registry.lookup(&RLE_LOSSLESS).err().unwrap();
        assert!(matches!(err, Error::CodecNotFound { ref uid, .. } if uid == "1.2.840.10008.1.2.5"));
        assert_eq!(registry.lookups(), 1);
    }

    #[test]
    fn last_registration_wins() {
        let registry = CodecRegistry::new();
        registry.register(Arc::new(Named(RLE_LOSSLESS, "first")));
        registry.register(Arc::new(Named(RLE_LOSSLESS, "second")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&RLE_LOSSLESS).unwrap().name(), "second");
    }

    #[test]
    fn load_from_can_rescan() {
        let registry = CodecRegistry::new();
        let first = Source(vec![Arc::new(Named(RLE_LOSSLESS, "old"))]);
        let second = Source(vec![
            Arc::new(Named(RLE_LOSSLESS, "new")),
            Arc::new(Named(JPEG_BASELINE, "jpeg")),
        ]);
        assert_eq!(registry.load_from(&first), 1);
        assert_eq!(registry.load_from(&second), 2);
        assert_eq!(registry.lookup(&RLE_LOSSLESS).unwrap().name(), "new");
        assert_eq!(registry.syntaxes(), vec![JPEG_BASELINE, RLE_LOSSLESS]);
        assert!(registry.load_from(&Source(Vec::new())) == 0 && registry.len() == 2);
    }
}
