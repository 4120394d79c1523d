use crate::dataset::{Dataset, Element, Value, Vr};
use crate::error::{Error, Result};
use crate::syntax::TransferSyntax;
use crate::tag;

/// Owned view over a dataset's image pixel module.
///
/// A view is either built from an existing dataset to be read by a codec
/// ([`PixelData::from_dataset`]), or built empty to be filled by a codec
/// ([`PixelData::target_for`]) and then written back with
/// [`PixelData::commit_to`]. Both kinds carry the transfer syntax the dataset
/// declared when the view was built; commit refuses to write a view into a
/// dataset that declares a different syntax.
#[derive(Debug, Clone)]
pub struct PixelData {
    syntax: TransferSyntax,
    rows: u16,
    columns: u16,
    samples_per_pixel: u16,
    bits_allocated: u16,
    bits_stored: u16,
    high_bit: u16,
    pixel_representation: u16,
    photometric_interpretation: String,
    planar_configuration: u16,
    frames: Vec<Vec<u8>>,
}

impl PixelData {
    /// Read view: geometry plus every frame of `dataset`'s pixel data,
    /// interpreted under the syntax the dataset currently declares.
    ///
    /// A dataset without Pixel Data yields a view with zero frames.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        let mut view = Self::geometry(dataset);
        let element = match dataset.get(tag::PIXEL_DATA) {
            Some(e) => e,
            None => return Ok(view),
        };
        view.validate_geometry()?;

        let declared = number_of_frames(dataset)?;
        match (&element.value, view.syntax.is_encapsulated()) {
            (Value::Fragments(fragments), true) => {
                if fragments.len() != declared {
                    return Err(Error::InvalidPixelData(format!(
                        "{} fragments for {} declared frames",
                        fragments.len(),
                        declared
                    )));
                }
                view.frames = fragments.clone();
            }
            (Value::Bytes(bytes), false) => {
                let frame_size = view.frame_size();
                let needed = frame_size.checked_mul(declared).ok_or_else(|| {
                    Error::InvalidPixelData(format!(
                        "{} frames of {} bytes overflow the addressable size",
                        declared, frame_size
                    ))
                })?;
                if bytes.len() < needed {
                    return Err(Error::InvalidPixelData(format!(
                        "native pixel data is {} bytes, {} frames of {} bytes need {}",
                        bytes.len(),
                        declared,
                        frame_size,
                        needed
                    )));
                }
                view.frames = bytes[..needed].chunks(frame_size).map(<[u8]>::to_vec).collect();
            }
            (_, encapsulated) => {
                return Err(Error::InvalidPixelData(format!(
                    "pixel data value does not match {} ({})",
                    view.syntax,
                    if encapsulated { "expected fragments" } else { "expected native bytes" }
                )));
            }
        }
        Ok(view)
    }

    /// Write view: geometry of `dataset` with no frames, bound to the syntax
    /// the dataset declares. Set the dataset's new syntax first.
    pub fn target_for(dataset: &Dataset) -> Self {
        Self::geometry(dataset)
    }

    fn geometry(dataset: &Dataset) -> Self {
        let bits_allocated = dataset.get_u16(tag::BITS_ALLOCATED).unwrap_or(0);
        let bits_stored = dataset.get_u16(tag::BITS_STORED).unwrap_or(bits_allocated);
        Self {
            syntax: dataset.transfer_syntax().clone(),
            rows: dataset.get_u16(tag::ROWS).unwrap_or(0),
            columns: dataset.get_u16(tag::COLUMNS).unwrap_or(0),
            samples_per_pixel: dataset.get_u16(tag::SAMPLES_PER_PIXEL).unwrap_or(1),
            bits_allocated,
            bits_stored,
            high_bit: dataset
                .get_u16(tag::HIGH_BIT)
                .unwrap_or_else(|| bits_stored.saturating_sub(1)),
            pixel_representation: dataset.get_u16(tag::PIXEL_REPRESENTATION).unwrap_or(0),
            photometric_interpretation: dataset
                .get_string(tag::PHOTOMETRIC_INTERPRETATION)
                .unwrap_or("MONOCHROME2")
                .to_string(),
            planar_configuration: dataset.get_u16(tag::PLANAR_CONFIGURATION).unwrap_or(0),
            frames: Vec::new(),
        }
    }

    fn validate_geometry(&self) -> Result<()> {
        if self.rows == 0 || self.columns == 0 {
            return Err(Error::InvalidPixelData(format!(
                "image is {}x{}",
                self.columns, self.rows
            )));
        }
        if self.bits_allocated == 0 || self.samples_per_pixel == 0 {
            return Err(Error::InvalidPixelData(format!(
                "bits allocated {} / samples per pixel {}",
                self.bits_allocated, self.samples_per_pixel
            )));
        }
        Ok(())
    }

    /// Write this view's frames and any changed pixel-module attributes into
    /// `dataset`.
    pub fn commit_to(self, dataset: &mut Dataset) -> Result<()> {
        if *dataset.transfer_syntax() != self.syntax {
            return Err(Error::SyntaxMismatch {
                view: self.syntax.to_string(),
                dataset: dataset.transfer_syntax().to_string(),
            });
        }

        if self.frames.len() > 1 || dataset.exists(tag::NUMBER_OF_FRAMES) {
            dataset.add(
                tag::NUMBER_OF_FRAMES,
                Element::string(Vr::IS, self.frames.len().to_string()),
            );
        }
        if dataset.exists(tag::PHOTOMETRIC_INTERPRETATION) || !self.frames.is_empty() {
            dataset.add(
                tag::PHOTOMETRIC_INTERPRETATION,
                Element::string(Vr::CS, self.photometric_interpretation.clone()),
            );
        }
        if self.samples_per_pixel > 1 || dataset.exists(tag::PLANAR_CONFIGURATION) {
            dataset.add(tag::PLANAR_CONFIGURATION, Element::us(self.planar_configuration));
        }

        if self.frames.is_empty() {
            dataset.remove(tag::PIXEL_DATA);
        } else if self.syntax.is_encapsulated() {
            dataset.add(tag::PIXEL_DATA, Element::fragments(self.frames));
        } else {
            let vr = if self.bits_allocated > 8 { Vr::OW } else { Vr::OB };
            dataset.add(tag::PIXEL_DATA, Element::bytes(vr, self.frames.concat()));
        }
        Ok(())
    }

    pub fn syntax(&self) -> &TransferSyntax {
        &self.syntax
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn samples_per_pixel(&self) -> u16 {
        self.samples_per_pixel
    }

    pub fn bits_allocated(&self) -> u16 {
        self.bits_allocated
    }

    pub fn bits_stored(&self) -> u16 {
        self.bits_stored
    }

    pub fn high_bit(&self) -> u16 {
        self.high_bit
    }

    pub fn pixel_representation(&self) -> u16 {
        self.pixel_representation
    }

    pub fn photometric_interpretation(&self) -> &str {
        &self.photometric_interpretation
    }

    pub fn set_photometric_interpretation(&mut self, value: impl Into<String>) {
        self.photometric_interpretation = value.into();
    }

    /// 0 = interleaved (R1G1B1 R2G2B2 …), 1 = separate colour planes.
    pub fn planar_configuration(&self) -> u16 {
        self.planar_configuration
    }

    pub fn set_planar_configuration(&mut self, value: u16) {
        self.planar_configuration = value;
    }

    /// Bytes per sample value, rounded up.
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_allocated as usize).div_ceil(8)
    }

    /// Size in bytes of one uncompressed frame.
    pub fn frame_size(&self) -> usize {
        let bits = self.rows as usize
            * self.columns as usize
            * self.samples_per_pixel as usize
            * self.bits_allocated as usize;
        bits.div_ceil(8)
    }

    pub fn number_of_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> Option<&[u8]> {
        self.frames.get(index).map(Vec::as_slice)
    }

    pub fn frames(&self) -> impl Iterator<Item = &[u8]> {
        self.frames.iter().map(Vec::as_slice)
    }

    /// Append one frame: a native buffer or a compressed bitstream, depending
    /// on this view's syntax.
    pub fn add_frame(&mut self, frame: Vec<u8>) {
        self.frames.push(frame);
    }
}

fn number_of_frames(dataset: &Dataset) -> Result<usize> {
    match dataset.get_string(tag::NUMBER_OF_FRAMES) {
        None => Ok(1),
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidPixelData(format!("Number of Frames '{}' is not an integer", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{EXPLICIT_VR_LITTLE_ENDIAN, RLE_LOSSLESS};

    fn mono8(rows: u16, cols: u16, frames: usize) -> Dataset {
        let size = rows as usize * cols as usize * frames;
        Dataset::new(EXPLICIT_VR_LITTLE_ENDIAN)
            .with(tag::ROWS, Element::us(rows))
            .with(tag::COLUMNS, Element::us(cols))
            .with(tag::BITS_ALLOCATED, Element::us(8))
            .with(tag::NUMBER_OF_FRAMES, Element::string(Vr::IS, frames.to_string()))
            .with(tag::PIXEL_DATA, Element::bytes(Vr::OB, (0..size).map(|i| i as u8).collect()))
    }

    #[test]
    fn splits_native_frames() {
        let view = PixelData::from_dataset(&mono8(2, 3, 4)).unwrap();
        assert_eq!(view.number_of_frames(), 4);
        assert_eq!(view.frame_size(), 6);
        assert_eq!(view.frame(1).unwrap(), &[6, 7, 8, 9, 10, 11]);
        assert_eq!(view.photometric_interpretation(), "MONOCHROME2");
        assert_eq!(view.high_bit(), 7);
    }

    #[test]
    fn absurd_frame_count_is_rejected() {
        let mut ds = mono8(1, 1, 1);
        ds.add(tag::BITS_ALLOCATED, Element::us(16));
        ds.add(tag::NUMBER_OF_FRAMES, Element::string(Vr::IS, usize::MAX.to_string()));
        let err = PixelData::from_dataset(&ds).unwrap_err();
        assert!(matches!(err, Error::InvalidPixelData(msg) if msg.contains("overflow")));
    }

    #[test]
    fn short_native_buffer_is_rejected() {
        let mut ds = mono8(2, 3, 1);
        ds.add(tag::NUMBER_OF_FRAMES, Element::string(Vr::IS, "2"));
        let err = PixelData::from_dataset(&ds).unwrap_err();
        assert!(matches!(err, Error::InvalidPixelData(_)));
    }

    #[test]
    fn fragments_under_native_syntax_are_rejected() {
        let mut ds = mono8(2, 3, 1);
        ds.add(tag::PIXEL_DATA, Element::fragments(vec![vec![0; 4]]));
        assert!(matches!(PixelData::from_dataset(&ds), Err(Error::InvalidPixelData(_))));
    }

    #[test]
    fn missing_pixel_data_yields_no_frames() {
        let mut ds = mono8(2, 3, 1);
        ds.remove(tag::PIXEL_DATA);
        let view = PixelData::from_dataset(&ds).unwrap();
        assert_eq!(view.number_of_frames(), 0);
    }

    #[test]
    fn commit_requires_matching_syntax() {
        let ds = mono8(2, 2, 1);
        let mut target = PixelData::target_for(&ds);
        target.add_frame(vec![0; 4]);

        let mut other = ds.clone();
        other.set_transfer_syntax(RLE_LOSSLESS);
        let err = target.commit_to(&mut other).unwrap_err();
        assert!(matches!(err, Error::SyntaxMismatch { .. }));
    }

    #[test]
    fn commit_writes_fragments_for_encapsulated_syntax() {
        let mut ds = mono8(2, 2, 2);
        ds.set_transfer_syntax(RLE_LOSSLESS);
        let mut target = PixelData::target_for(&ds);
        target.add_frame(vec![1, 2]);
        target.add_frame(vec![3]);
        target.commit_to(&mut ds).unwrap();

        assert_eq!(
            ds.get(tag::PIXEL_DATA).unwrap().value,
            Value::Fragments(vec![vec![1, 2], vec![3]])
        );
        assert_eq!(ds.get_string(tag::NUMBER_OF_FRAMES), Some("2"));

        let reread = PixelData::from_dataset(&ds).unwrap();
        assert_eq!(reread.frame(1).unwrap(), &[3]);
    }
}
