mod packbits;
mod rle;

pub use rle::RleLosslessCodec;

use std::sync::Arc;

use dtx_core::{Codec, CodecRegistry, CodecSource};

/// The codecs linked into this crate.
///
/// Stands in for plugin discovery: the CLI and tests load a registry from it
/// instead of scanning a directory.
pub struct BundledCodecs;

impl CodecSource for BundledCodecs {
    fn discover(&self) -> Vec<Arc<dyn Codec>> {
        vec![Arc::new(RleLosslessCodec)]
    }
}

/// A registry pre-loaded with every bundled codec.
pub fn default_registry() -> CodecRegistry {
    let registry = CodecRegistry::new();
    registry.load_from(&BundledCodecs);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtx_core::syntax::{JPEG_BASELINE, RLE_LOSSLESS};

    #[test]
    fn default_registry_serves_rle() {
        let registry = default_registry();
        assert_eq!(registry.lookup(&RLE_LOSSLESS).unwrap().name(), "rle-lossless");
        assert!(!registry.contains(&JPEG_BASELINE));
    }
}
