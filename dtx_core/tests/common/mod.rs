#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use dtx_core::syntax::EXPLICIT_VR_LITTLE_ENDIAN;
use dtx_core::{tag, Codec, CodecParams, Dataset, Element, PixelData, TransferSyntax, Vr};

/// Codec that pretends to compress every frame to exactly `encoded_size`
/// bytes and decodes back to a frame of the right native size. It counts its
/// calls and remembers the last parameters it saw.
pub struct FixedSizeCodec {
    ts: TransferSyntax,
    encoded_size: usize,
    pub encodes: AtomicUsize,
    pub decodes: AtomicUsize,
    pub last_params: parking_lot::Mutex<Option<CodecParams>>,
}

impl FixedSizeCodec {
    pub fn new(ts: TransferSyntax, encoded_size: usize) -> Self {
        Self {
            ts,
            encoded_size,
            encodes: AtomicUsize::new(0),
            decodes: AtomicUsize::new(0),
            last_params: parking_lot::Mutex::new(None),
        }
    }

    pub fn encodes(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl Codec for FixedSizeCodec {
    fn transfer_syntax(&self) -> &TransferSyntax {
        &self.ts
    }

    fn name(&self) -> &'static str {
        "fixed-size"
    }

    fn decode(&self, old: &PixelData, new: &mut PixelData, params: Option<&CodecParams>) -> anyhow::Result<()> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock() = params.cloned();
        for frame in old.frames() {
            let fill = frame.first().copied().unwrap_or(0);
            new.add_frame(vec![fill; new.frame_size()]);
        }
        Ok(())
    }

    fn encode(&self, old: &PixelData, new: &mut PixelData, params: Option<&CodecParams>) -> anyhow::Result<()> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock() = params.cloned();
        for frame in old.frames() {
            let fill = frame.first().copied().unwrap_or(0);
            new.add_frame(vec![fill; self.encoded_size]);
        }
        Ok(())
    }
}

/// Codec whose every operation fails.
pub struct BrokenCodec(pub TransferSyntax);

impl Codec for BrokenCodec {
    fn transfer_syntax(&self) -> &TransferSyntax {
        &self.0
    }

    fn name(&self) -> &'static str {
        "broken"
    }

    fn decode(&self, _: &PixelData, new: &mut PixelData, _: Option<&CodecParams>) -> anyhow::Result<()> {
        new.add_frame(vec![0xFF]);
        anyhow::bail!("corrupt bitstream")
    }

    fn encode(&self, _: &PixelData, new: &mut PixelData, _: Option<&CodecParams>) -> anyhow::Result<()> {
        new.add_frame(vec![0xFF]);
        anyhow::bail!("unsupported bit depth")
    }
}

/// Native 8-bit monochrome image, `frames` frames of `rows` x `cols`, with a
/// handful of non-pixel attributes.
pub fn mono8(rows: u16, cols: u16, frames: usize) -> Dataset {
    let frame_size = rows as usize * cols as usize;
    let pixels: Vec<u8> = (0..frame_size * frames).map(|i| (i / frame_size + 1) as u8).collect();
    Dataset::new(EXPLICIT_VR_LITTLE_ENDIAN)
        .with(tag::SOP_CLASS_UID, Element::string(Vr::UI, "1.2.840.10008.5.1.4.1.1.7"))
        .with(tag::SOP_INSTANCE_UID, Element::string(Vr::UI, "1.2.3.4.5.6.7"))
        .with(tag::MODALITY, Element::string(Vr::CS, "OT"))
        .with(tag::PATIENT_NAME, Element::string(Vr::PN, "Doe^Jane"))
        .with(tag::PATIENT_ID, Element::string(Vr::LO, "PID-0042"))
        .with(tag::SAMPLES_PER_PIXEL, Element::us(1))
        .with(tag::PHOTOMETRIC_INTERPRETATION, Element::string(Vr::CS, "MONOCHROME2"))
        .with(tag::NUMBER_OF_FRAMES, Element::string(Vr::IS, frames.to_string()))
        .with(tag::ROWS, Element::us(rows))
        .with(tag::COLUMNS, Element::us(cols))
        .with(tag::BITS_ALLOCATED, Element::us(8))
        .with(tag::BITS_STORED, Element::us(8))
        .with(tag::HIGH_BIT, Element::us(7))
        .with(tag::PIXEL_REPRESENTATION, Element::us(0))
        .with(tag::PIXEL_DATA, Element::bytes(Vr::OB, pixels))
}

/// Attributes outside the pixel and lossy modules, for metadata comparisons.
pub fn non_pixel_attributes(ds: &Dataset) -> Vec<(tag::Tag, Element)> {
    ds.iter()
        .filter(|(t, _)| t.group() != 0x0028 && **t != tag::PIXEL_DATA)
        .map(|(t, e)| (*t, e.clone()))
        .collect()
}
