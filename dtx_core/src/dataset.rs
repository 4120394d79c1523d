use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::syntax::TransferSyntax;
use crate::tag::Tag;

/// Value representation of an element. Only the VRs the pixel and lossy
/// modules need are distinguished; everything else travels as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vr {
    AE,
    CS,
    DA,
    DS,
    IS,
    LO,
    OB,
    OW,
    PN,
    SH,
    TM,
    UI,
    US,
}

/// Element payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Backslash-separated multi-valued text, already split.
    Strings(Vec<String>),
    U16(Vec<u16>),
    /// Native pixel data or any other opaque byte value.
    Bytes(Vec<u8>),
    /// Encapsulated pixel data, one fragment per frame.
    Fragments(Vec<Vec<u8>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub vr: Vr,
    pub value: Value,
}

impl Element {
    pub fn new(vr: Vr, value: Value) -> Self {
        Self { vr, value }
    }

    pub fn string(vr: Vr, value: impl Into<String>) -> Self {
        Self::new(vr, Value::Strings(vec![value.into()]))
    }

    pub fn strings<I, S>(vr: Vr, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(vr, Value::Strings(values.into_iter().map(Into::into).collect()))
    }

    pub fn us(value: u16) -> Self {
        Self::new(Vr::US, Value::U16(vec![value]))
    }

    pub fn bytes(vr: Vr, bytes: Vec<u8>) -> Self {
        Self::new(vr, Value::Bytes(bytes))
    }

    pub fn fragments(fragments: Vec<Vec<u8>>) -> Self {
        Self::new(Vr::OB, Value::Fragments(fragments))
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match &self.value {
            Value::Strings(v) => Some(v),
            _ => None,
        }
    }
}

/// An ordered tag → element map that also declares the transfer syntax its
/// pixel data is currently encoded in.
///
/// `Clone` is a deep copy: pixel buffers are duplicated, never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    transfer_syntax: TransferSyntax,
    elements: BTreeMap<Tag, Element>,
}

impl Dataset {
    pub fn new(transfer_syntax: TransferSyntax) -> Self {
        Self {
            transfer_syntax,
            elements: BTreeMap::new(),
        }
    }

    pub fn transfer_syntax(&self) -> &TransferSyntax {
        &self.transfer_syntax
    }

    /// Re-declare the syntax of the pixel data. Callers changing the pixel
    /// representation must call this before building a write view over it.
    pub fn set_transfer_syntax(&mut self, ts: TransferSyntax) {
        self.transfer_syntax = ts;
    }

    /// Insert or overwrite `tag`, returning the previous element if any.
    pub fn add(&mut self, tag: Tag, element: Element) -> Option<Element> {
        self.elements.insert(tag, element)
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(mut self, tag: Tag, element: Element) -> Self {
        self.add(tag, element);
        self
    }

    pub fn get(&self, tag: Tag) -> Option<&Element> {
        self.elements.get(&tag)
    }

    pub fn exists(&self, tag: Tag) -> bool {
        self.elements.contains_key(&tag)
    }

    pub fn remove(&mut self, tag: Tag) -> Option<Element> {
        self.elements.remove(&tag)
    }

    /// All text values of `tag`, or `None` when absent or not text.
    pub fn get_strings(&self, tag: Tag) -> Option<&[String]> {
        self.get(tag).and_then(Element::as_strings)
    }

    /// First text value of `tag`, trimmed of DICOM padding.
    pub fn get_string(&self, tag: Tag) -> Option<&str> {
        self.get_strings(tag)
            .and_then(|v| v.first())
            .map(|s| s.trim_end_matches(|c: char| c == '\0' || c == ' '))
    }

    /// First value of a US element, or an IS element parsed as an integer.
    pub fn get_u16(&self, tag: Tag) -> Option<u16> {
        match &self.get(tag)?.value {
            Value::U16(v) => v.first().copied(),
            Value::Strings(v) => v.first()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// Iterate elements in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &Element)> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{EXPLICIT_VR_LITTLE_ENDIAN, RLE_LOSSLESS};
    use crate::tag::{NUMBER_OF_FRAMES, PATIENT_NAME, PIXEL_DATA, ROWS};

    #[test]
    fn add_overwrites_and_returns_previous() {
        let mut ds = Dataset::new(EXPLICIT_VR_LITTLE_ENDIAN);
        assert!(ds.add(PATIENT_NAME, Element::string(Vr::PN, "Doe^John")).is_none());
        let prev = ds.add(PATIENT_NAME, Element::string(Vr::PN, "Roe^Jane"));
        assert_eq!(prev.unwrap().as_strings().unwrap()[0], "Doe^John");
        assert_eq!(ds.get_string(PATIENT_NAME), Some("Roe^Jane"));
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn clone_is_deep() {
        let ds = Dataset::new(EXPLICIT_VR_LITTLE_ENDIAN).with(PIXEL_DATA, Element::bytes(Vr::OW, vec![1, 2, 3, 4]));
        let mut copy = ds.clone();
        copy.add(PIXEL_DATA, Element::bytes(Vr::OW, vec![9, 9, 9, 9]));
        copy.set_transfer_syntax(RLE_LOSSLESS);

        assert_eq!(ds.get(PIXEL_DATA).unwrap().value, Value::Bytes(vec![1, 2, 3, 4]));
        assert_eq!(*ds.transfer_syntax(), EXPLICIT_VR_LITTLE_ENDIAN);
    }

    #[test]
    fn get_u16_reads_us_and_is() {
        let ds = Dataset::new(EXPLICIT_VR_LITTLE_ENDIAN)
            .with(ROWS, Element::us(512))
            .with(NUMBER_OF_FRAMES, Element::string(Vr::IS, " 12 "));
        assert_eq!(ds.get_u16(ROWS), Some(512));
        assert_eq!(ds.get_u16(NUMBER_OF_FRAMES), Some(12));
        assert_eq!(ds.get_u16(PATIENT_NAME), None);
    }

    #[test]
    fn iterates_in_tag_order() {
        let ds = Dataset::new(EXPLICIT_VR_LITTLE_ENDIAN)
            .with(PIXEL_DATA, Element::bytes(Vr::OB, vec![]))
            .with(PATIENT_NAME, Element::string(Vr::PN, "A"))
            .with(ROWS, Element::us(1));
        let tags: Vec<Tag> = ds.iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, vec![PATIENT_NAME, ROWS, PIXEL_DATA]);
    }

    #[test]
    fn json_round_trip_keeps_syntax_and_elements() {
        let ds = Dataset::new(RLE_LOSSLESS)
            .with(PATIENT_NAME, Element::string(Vr::PN, "Doe^John"))
            .with(ROWS, Element::us(4))
            .with(PIXEL_DATA, Element::fragments(vec![vec![1, 2], vec![3, 4]]));

        let json = serde_json::to_string(&ds).unwrap();
        assert!(json.contains("\"1.2.840.10008.1.2.5\""));
        assert!(json.contains("\"7FE00010\""));

        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ds);
        assert_eq!(back.transfer_syntax().name(), "RLE Lossless");
    }

    #[test]
    fn json_with_unknown_syntax_is_rejected() {
        let err = serde_json::from_str::<Dataset>(r#"{"transfer_syntax":"9.9.9","elements":{}}"#).unwrap_err();
        assert!(err.to_string().contains("9.9.9"));
    }
}
