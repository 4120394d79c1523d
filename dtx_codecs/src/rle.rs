use dtx_core::syntax::{Endianness, RLE_LOSSLESS};
use dtx_core::{Codec, CodecParams, PixelData, TransferSyntax};

use crate::packbits;

/// Fixed RLE header: segment count + 15 segment offsets, all u32 LE.
const HEADER_SIZE: usize = 64;
const MAX_SEGMENTS: usize = 15;

/// DICOM RLE Lossless codec.
///
/// Every frame becomes one fragment: a 64-byte header followed by one
/// PackBits segment per byte plane. Planes are ordered sample by sample, most
/// significant byte first, so a 16-bit RGB image has six segments
/// (R-high, R-low, G-high, …).
///
/// Decoded frames are always interleaved (planar configuration 0). Encoding
/// accepts either planar configuration. The native side may be either byte
/// order; its syntax decides which byte of a sample is the most significant.
pub struct RleLosslessCodec;

impl RleLosslessCodec {
    /// Plane layout of `pixels`, with native byte positions taken in the
    /// byte order of `native`.
    fn layout(pixels: &PixelData, native: &TransferSyntax) -> anyhow::Result<PlaneLayout> {
        if pixels.bits_allocated() % 8 != 0 {
            anyhow::bail!(
                "RLE Lossless needs whole-byte samples, got {} bits allocated",
                pixels.bits_allocated()
            );
        }
        let layout = PlaneLayout {
            pixels: pixels.rows() as usize * pixels.columns() as usize,
            samples: pixels.samples_per_pixel() as usize,
            bytes_per_sample: pixels.bytes_per_sample(),
            planar: pixels.planar_configuration() == 1,
            big_endian: native.endianness() == Endianness::Big,
        };
        if layout.segments() > MAX_SEGMENTS {
            anyhow::bail!(
                "{} samples of {} bytes need {} RLE segments, at most {} allowed",
                layout.samples,
                layout.bytes_per_sample,
                layout.segments(),
                MAX_SEGMENTS
            );
        }
        Ok(layout)
    }
}

struct PlaneLayout {
    pixels: usize,
    samples: usize,
    bytes_per_sample: usize,
    planar: bool,
    big_endian: bool,
}

impl PlaneLayout {
    fn segments(&self) -> usize {
        self.samples * self.bytes_per_sample
    }

    fn frame_size(&self) -> usize {
        self.pixels * self.segments()
    }

    /// (sample, significance) pairs in segment order: sample by sample, most
    /// significant byte first. Significance 0 is the most significant byte.
    fn segment_order(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.samples).flat_map(move |s| (0..self.bytes_per_sample).map(move |b| (s, b)))
    }

    fn native_offset(&self, pixel: usize, sample: usize, significance: usize) -> usize {
        let byte = if self.big_endian {
            significance
        } else {
            self.bytes_per_sample - 1 - significance
        };
        let sample_index = if self.planar {
            sample * self.pixels + pixel
        } else {
            pixel * self.samples + sample
        };
        sample_index * self.bytes_per_sample + byte
    }
}

impl Codec for RleLosslessCodec {
    fn transfer_syntax(&self) -> &TransferSyntax {
        &RLE_LOSSLESS
    }

    fn name(&self) -> &'static str {
        "rle-lossless"
    }

    fn encode(
        &self,
        old: &PixelData,
        new: &mut PixelData,
        _params: Option<&CodecParams>,
    ) -> anyhow::Result<()> {
        let layout = Self::layout(old, old.syntax())?;

        for (index, frame) in old.frames().enumerate() {
            if frame.len() < layout.frame_size() {
                anyhow::bail!(
                    "frame {} is {} bytes, expected {}",
                    index,
                    frame.len(),
                    layout.frame_size()
                );
            }

            let mut out = vec![0u8; HEADER_SIZE];
            let mut offsets = Vec::with_capacity(layout.segments());
            let mut plane = Vec::with_capacity(layout.pixels);
            for (sample, byte) in layout.segment_order() {
                offsets.push(out.len() as u32);
                plane.clear();
                plane.extend((0..layout.pixels).map(|p| frame[layout.native_offset(p, sample, byte)]));
                packbits::encode(&plane, &mut out);
                if out.len() % 2 == 1 {
                    out.push(0);
                }
            }

            out[0..4].copy_from_slice(&(offsets.len() as u32).to_le_bytes());
            for (i, offset) in offsets.iter().enumerate() {
                let at = 4 + i * 4;
                out[at..at + 4].copy_from_slice(&offset.to_le_bytes());
            }
            tracing::trace!(frame = index, raw = frame.len(), encoded = out.len(), "rle frame encoded");
            new.add_frame(out);
        }

        new.set_planar_configuration(0);
        Ok(())
    }

    fn decode(
        &self,
        old: &PixelData,
        new: &mut PixelData,
        _params: Option<&CodecParams>,
    ) -> anyhow::Result<()> {
        let mut layout = Self::layout(old, new.syntax())?;
        layout.planar = false;

        for (index, frame) in old.frames().enumerate() {
            if frame.len() < HEADER_SIZE {
                anyhow::bail!("frame {} is {} bytes, shorter than the RLE header", index, frame.len());
            }
            let word = |i: usize| u32::from_le_bytes([frame[i], frame[i + 1], frame[i + 2], frame[i + 3]]) as usize;

            let count = word(0);
            if count != layout.segments() {
                anyhow::bail!(
                    "frame {} has {} RLE segments, image geometry needs {}",
                    index,
                    count,
                    layout.segments()
                );
            }
            let offsets: Vec<usize> = (0..count).map(|i| word(4 + i * 4)).collect();

            let mut out = vec![0u8; layout.frame_size()];
            for (seg, (sample, byte)) in layout.segment_order().enumerate() {
                let start = offsets[seg];
                let end = offsets.get(seg + 1).copied().unwrap_or(frame.len());
                if start < HEADER_SIZE || start > end || end > frame.len() {
                    anyhow::bail!(
                        "frame {} segment {} has invalid bounds {}..{} (fragment is {} bytes)",
                        index,
                        seg,
                        start,
                        end,
                        frame.len()
                    );
                }
                let plane = packbits::decode(&frame[start..end], layout.pixels)
                    .map_err(|e| anyhow::anyhow!("frame {} segment {}: {}", index, seg, e))?;
                for (p, value) in plane.into_iter().enumerate() {
                    out[layout.native_offset(p, sample, byte)] = value;
                }
            }
            new.add_frame(out);
        }

        new.set_planar_configuration(0);
        Ok(())
    }
}
