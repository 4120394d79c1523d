pub mod codec;
pub mod dataset;
pub mod error;
pub mod file;
pub mod pixel;
pub mod registry;
pub mod syntax;
pub mod tag;
pub mod transcoder;

pub use codec::{Codec, CodecParams};
pub use dataset::{Dataset, Element, Value, Vr};
pub use error::{Error, Result};
pub use file::{DicomFile, FileMetaInfo};
pub use pixel::PixelData;
pub use registry::{CodecRegistry, CodecSource};
pub use syntax::{Endianness, TransferSyntax};
pub use tag::Tag;
pub use transcoder::{decode_dataset, encode_dataset, Transcoder};
