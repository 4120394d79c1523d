use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::{Codec, CodecParams};
use crate::dataset::{Dataset, Element, Vr};
use crate::error::{Error, Result};
use crate::file::DicomFile;
use crate::pixel::PixelData;
use crate::registry::CodecRegistry;
use crate::syntax::{TransferSyntax, EXPLICIT_VR_LITTLE_ENDIAN};
use crate::tag;

/// Code String value of Lossy Image Compression meaning "has been lossy
/// compressed".
pub const LOSSY_COMPRESSION_APPLIED: &str = "01";

/// Converts datasets from one fixed transfer syntax to another.
///
/// Codecs are resolved from the registry the first time a direction needs
/// one, and only if that direction's syntax is encapsulated; a native syntax
/// never touches the registry. Each resolved codec is kept in its own slot
/// behind a mutex, so one `Transcoder` may be shared between threads and
/// still looks each codec up at most once.
///
/// # Dispatch
/// ```text
/// input encapsulated?  output encapsulated?   path
///        yes                  yes             decode → Explicit VR LE → encode
///        yes                  no              decode straight to output
///        no                   yes             encode from native input
///        no                   no              clone, re-tag if layouts agree
/// ```
pub struct Transcoder {
    registry: Arc<CodecRegistry>,
    input: TransferSyntax,
    output: TransferSyntax,
    input_params: Option<CodecParams>,
    output_params: Option<CodecParams>,
    input_codec: Mutex<Option<Arc<dyn Codec>>>,
    output_codec: Mutex<Option<Arc<dyn Codec>>>,
}

impl Transcoder {
    pub fn new(registry: Arc<CodecRegistry>, input: TransferSyntax, output: TransferSyntax) -> Self {
        Self {
            registry,
            input,
            output,
            input_params: None,
            output_params: None,
            input_codec: Mutex::new(None),
            output_codec: Mutex::new(None),
        }
    }

    pub fn input_syntax(&self) -> &TransferSyntax {
        &self.input
    }

    pub fn output_syntax(&self) -> &TransferSyntax {
        &self.output
    }

    /// Parameters passed to the input codec's `decode`.
    pub fn set_input_params(&mut self, params: CodecParams) {
        self.input_params = Some(params);
    }

    /// Parameters passed to the output codec's `encode`.
    pub fn set_output_params(&mut self, params: CodecParams) {
        self.output_params = Some(params);
    }

    pub fn input_params(&self) -> Option<&CodecParams> {
        self.input_params.as_ref()
    }

    pub fn output_params(&self) -> Option<&CodecParams> {
        self.output_params.as_ref()
    }

    /// The codec decoding the input syntax, or `None` when the input is
    /// native.
    pub fn resolve_input_codec(&self) -> Result<Option<Arc<dyn Codec>>> {
        self.resolve(&self.input_codec, &self.input)
    }

    /// The codec encoding the output syntax, or `None` when the output is
    /// native.
    pub fn resolve_output_codec(&self) -> Result<Option<Arc<dyn Codec>>> {
        self.resolve(&self.output_codec, &self.output)
    }

    fn resolve(
        &self,
        slot: &Mutex<Option<Arc<dyn Codec>>>,
        ts: &TransferSyntax,
    ) -> Result<Option<Arc<dyn Codec>>> {
        if !ts.is_encapsulated() {
            return Ok(None);
        }
        let mut slot = slot.lock();
        if let Some(codec) = slot.as_ref() {
            return Ok(Some(Arc::clone(codec)));
        }
        let codec = self.registry.lookup(ts)?;
        tracing::debug!(uid = ts.uid(), codec = codec.name(), "codec resolved");
        *slot = Some(Arc::clone(&codec));
        Ok(Some(codec))
    }

    /// Produce a new dataset in the output syntax. `dataset` is never
    /// modified, and must currently be in the input syntax.
    ///
    /// Both codecs are resolved before any pixel data is touched, so a
    /// missing codec fails the call up front.
    pub fn transcode(&self, dataset: &Dataset) -> Result<Dataset> {
        if *dataset.transfer_syntax() != self.input {
            return Err(self.invalid(format!(
                "dataset is encoded as {}",
                dataset.transfer_syntax()
            )));
        }

        let input_codec = self.resolve_input_codec()?;
        let output_codec = self.resolve_output_codec()?;

        match (input_codec, output_codec) {
            (Some(decoder), Some(encoder)) => {
                tracing::debug!(from = %self.input, to = %self.output, "transcoding via Explicit VR Little Endian");
                let native = decode_dataset(
                    dataset,
                    &EXPLICIT_VR_LITTLE_ENDIAN,
                    decoder.as_ref(),
                    self.input_params.as_ref(),
                )?;
                encode_dataset(&native, encoder.as_ref(), self.output_params.as_ref())
            }
            (Some(decoder), None) => {
                tracing::debug!(from = %self.input, to = %self.output, "decoding");
                decode_dataset(dataset, &self.output, decoder.as_ref(), self.input_params.as_ref())
            }
            (None, Some(encoder)) => {
                tracing::debug!(from = %self.input, to = %self.output, "encoding");
                encode_dataset(dataset, encoder.as_ref(), self.output_params.as_ref())
            }
            (None, None) => self.retag(dataset),
        }
    }

    /// Transcode a whole file: the meta header is copied with its transfer
    /// syntax replaced, the dataset goes through [`transcode`](Self::transcode).
    pub fn transcode_file(&self, file: &DicomFile) -> Result<DicomFile> {
        let mut meta = file.meta.clone();
        meta.transfer_syntax = self.output.clone();
        let dataset = self.transcode(&file.dataset)?;
        Ok(DicomFile::new(meta, dataset))
    }

    /// Native → native. Pixel bytes are copied untouched, so only syntaxes
    /// with the same sample byte order are accepted (or 8-bit samples, whose
    /// layout has no byte order).
    fn retag(&self, dataset: &Dataset) -> Result<Dataset> {
        if self.input == self.output {
            return Ok(dataset.clone());
        }
        if self.input.endianness() != self.output.endianness() && dataset.exists(tag::PIXEL_DATA) {
            match dataset.get_u16(tag::BITS_ALLOCATED) {
                None => {
                    return Err(self.invalid(
                        "pixel data without Bits Allocated has an unknown byte order".to_string(),
                    ));
                }
                Some(bits) if bits > 8 => {
                    return Err(self.invalid(
                        "native pixel data would need byte swapping, which is not supported".to_string(),
                    ));
                }
                Some(_) => {}
            }
        }
        tracing::debug!(from = %self.input, to = %self.output, "re-tagging native dataset");
        let mut out = dataset.clone();
        out.set_transfer_syntax(self.output.clone());
        Ok(out)
    }

    fn invalid(&self, reason: String) -> Error {
        Error::InvalidTranscodeRequest {
            from: self.input.to_string(),
            to: self.output.to_string(),
            reason,
        }
    }
}

/// Decode `old`'s encapsulated pixel data into `target` (a native syntax)
/// with `codec`, returning a new dataset.
pub fn decode_dataset(
    old: &Dataset,
    target: &TransferSyntax,
    codec: &dyn Codec,
    params: Option<&CodecParams>,
) -> Result<Dataset> {
    let old_pixels = PixelData::from_dataset(old)?;

    let mut dataset = old.clone();
    // Must precede the target view: the view binds to the declared syntax.
    dataset.set_transfer_syntax(target.clone());
    let mut new_pixels = PixelData::target_for(&dataset);

    codec
        .decode(&old_pixels, &mut new_pixels, params)
        .map_err(|source| Error::CodecOperationFailed {
            uid: codec.transfer_syntax().uid().to_string(),
            operation: "decode",
            source,
        })?;

    new_pixels.commit_to(&mut dataset)?;
    Ok(dataset)
}

/// Encode `old`'s native pixel data into `codec`'s syntax, returning a new
/// dataset.
///
/// When the codec is lossy and produced at least one frame, the lossy
/// provenance attributes are updated: the flag is set, the codec's method is
/// appended to any methods already recorded, and the ratio is replaced by
/// this encode's frame-0 ratio.
pub fn encode_dataset(old: &Dataset, codec: &dyn Codec, params: Option<&CodecParams>) -> Result<Dataset> {
    let ts = codec.transfer_syntax();
    let old_pixels = PixelData::from_dataset(old)?;

    let mut dataset = old.clone();
    dataset.set_transfer_syntax(ts.clone());
    let mut new_pixels = PixelData::target_for(&dataset);

    codec
        .encode(&old_pixels, &mut new_pixels, params)
        .map_err(|source| Error::CodecOperationFailed {
            uid: ts.uid().to_string(),
            operation: "encode",
            source,
        })?;

    let ratio = match (old_pixels.frame(0), new_pixels.frame(0)) {
        (Some(before), Some(after)) if !after.is_empty() => {
            Some(format!("{:.3}", before.len() as f64 / after.len() as f64))
        }
        _ => None,
    };
    let produced_frames = new_pixels.number_of_frames();
    new_pixels.commit_to(&mut dataset)?;

    if ts.is_lossy() && produced_frames > 0 {
        record_lossy_compression(&mut dataset, ts, ratio);
    }
    Ok(dataset)
}

fn record_lossy_compression(dataset: &mut Dataset, ts: &TransferSyntax, ratio: Option<String>) {
    dataset.add(
        tag::LOSSY_IMAGE_COMPRESSION,
        Element::string(Vr::CS, LOSSY_COMPRESSION_APPLIED),
    );

    let mut methods: Vec<String> = dataset
        .get_strings(tag::LOSSY_IMAGE_COMPRESSION_METHOD)
        .map(<[String]>::to_vec)
        .unwrap_or_default();
    if let Some(method) = ts.lossy_compression_method() {
        methods.push(method.to_string());
    }
    tracing::trace!(?methods, ratio = ratio.as_deref(), "recording lossy compression");
    dataset.add(
        tag::LOSSY_IMAGE_COMPRESSION_METHOD,
        Element::strings(Vr::CS, methods),
    );

    // An empty output frame has no meaningful ratio; leave any earlier one.
    if let Some(ratio) = ratio {
        dataset.add(tag::LOSSY_IMAGE_COMPRESSION_RATIO, Element::string(Vr::DS, ratio));
    }
}
