use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

/// Byte order of multi-byte pixel samples in a native (raw) syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Identity and properties of a DICOM transfer syntax.
///
/// Two syntaxes are equal when their UIDs are equal. The remaining fields are
/// derived properties and never take part in comparisons, hashing, or
/// registry lookups.
#[derive(Debug, Clone, Serialize)]
#[serde(into = "String")]
pub struct TransferSyntax {
    uid: &'static str,
    name: &'static str,
    explicit_vr: bool,
    endianness: Endianness,
    deflated: bool,
    encapsulated: bool,
    lossy: bool,
    /// Defined Term for Lossy Image Compression Method (0028,2114).
    lossy_method: Option<&'static str>,
}

impl TransferSyntax {
    /// Describe a native (uncompressed) syntax.
    pub const fn native(
        uid: &'static str,
        name: &'static str,
        explicit_vr: bool,
        endianness: Endianness,
    ) -> Self {
        Self {
            uid,
            name,
            explicit_vr,
            endianness,
            deflated: false,
            encapsulated: false,
            lossy: false,
            lossy_method: None,
        }
    }

    /// Describe an encapsulated syntax. `lossy_method` is `Some` exactly when
    /// the compression discards information.
    pub const fn encapsulated(
        uid: &'static str,
        name: &'static str,
        lossy_method: Option<&'static str>,
    ) -> Self {
        Self {
            uid,
            name,
            explicit_vr: true,
            endianness: Endianness::Little,
            deflated: false,
            encapsulated: true,
            lossy: lossy_method.is_some(),
            lossy_method,
        }
    }

    const fn deflate(self) -> Self {
        Self {
            deflated: true,
            ..self
        }
    }

    pub fn uid(&self) -> &'static str {
        self.uid
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Whether the whole dataset is deflate-compressed on disk. Pixel data
    /// itself stays native.
    pub fn is_deflated(&self) -> bool {
        self.deflated
    }

    /// Whether pixel data is stored as a compressed bitstream of fragments.
    pub fn is_encapsulated(&self) -> bool {
        self.encapsulated
    }

    pub fn is_lossy(&self) -> bool {
        self.lossy
    }

    /// Label appended to Lossy Image Compression Method when this syntax is
    /// the target of a lossy encode. `None` for lossless syntaxes.
    pub fn lossy_compression_method(&self) -> Option<&'static str> {
        self.lossy_method
    }

    /// Look up one of the well-known syntaxes by UID.
    pub fn from_uid(uid: &str) -> Option<&'static TransferSyntax> {
        let uid = uid.trim_end_matches('\0').trim();
        KNOWN.iter().find(|ts| ts.uid == uid)
    }

    /// All well-known syntaxes, in UID order.
    pub fn all() -> &'static [TransferSyntax] {
        KNOWN
    }
}

impl PartialEq for TransferSyntax {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for TransferSyntax {}

impl Hash for TransferSyntax {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

impl fmt::Display for TransferSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.uid)
    }
}

impl TryFrom<String> for TransferSyntax {
    type Error = Error;

    fn try_from(uid: String) -> Result<Self, Self::Error> {
        TransferSyntax::from_uid(&uid)
            .cloned()
            .ok_or(Error::UnknownTransferSyntax(uid))
    }
}

// The derive would tie `'de` to the `&'static str` fields, so the UID string
// is read as an owned value and resolved against the known table.
impl<'de> Deserialize<'de> for TransferSyntax {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let uid = String::deserialize(deserializer)?;
        TransferSyntax::try_from(uid).map_err(serde::de::Error::custom)
    }
}

impl From<TransferSyntax> for String {
    fn from(ts: TransferSyntax) -> Self {
        ts.uid.to_string()
    }
}

// ── Native syntaxes ────────────────────────────────────────────────────────

pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::native(
    "1.2.840.10008.1.2",
    "Implicit VR Little Endian",
    false,
    Endianness::Little,
);

/// Canonical intermediate representation for encapsulated → encapsulated
/// transcodes.
pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::native(
    "1.2.840.10008.1.2.1",
    "Explicit VR Little Endian",
    true,
    Endianness::Little,
);

pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::native(
    "1.2.840.10008.1.2.1.99",
    "Deflated Explicit VR Little Endian",
    true,
    Endianness::Little,
)
.deflate();

pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::native(
    "1.2.840.10008.1.2.2",
    "Explicit VR Big Endian",
    true,
    Endianness::Big,
);

// ── Encapsulated syntaxes ──────────────────────────────────────────────────

pub const JPEG_BASELINE: TransferSyntax = TransferSyntax::encapsulated(
    "1.2.840.10008.1.2.4.50",
    "JPEG Baseline (Process 1)",
    Some("ISO_10918_1"),
);

pub const JPEG_EXTENDED: TransferSyntax = TransferSyntax::encapsulated(
    "1.2.840.10008.1.2.4.51",
    "JPEG Extended (Process 2 & 4)",
    Some("ISO_10918_1"),
);

pub const JPEG_LOSSLESS: TransferSyntax = TransferSyntax::encapsulated(
    "1.2.840.10008.1.2.4.57",
    "JPEG Lossless, Non-Hierarchical (Process 14)",
    None,
);

pub const JPEG_LOSSLESS_SV1: TransferSyntax = TransferSyntax::encapsulated(
    "1.2.840.10008.1.2.4.70",
    "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
    None,
);

pub const JPEG_LS_LOSSLESS: TransferSyntax = TransferSyntax::encapsulated(
    "1.2.840.10008.1.2.4.80",
    "JPEG-LS Lossless Image Compression",
    None,
);

pub const JPEG_LS_NEAR_LOSSLESS: TransferSyntax = TransferSyntax::encapsulated(
    "1.2.840.10008.1.2.4.81",
    "JPEG-LS Lossy (Near-Lossless) Image Compression",
    Some("ISO_14495_1"),
);

pub const JPEG_2000_LOSSLESS: TransferSyntax = TransferSyntax::encapsulated(
    "1.2.840.10008.1.2.4.90",
    "JPEG 2000 Image Compression (Lossless Only)",
    None,
);

pub const JPEG_2000: TransferSyntax = TransferSyntax::encapsulated(
    "1.2.840.10008.1.2.4.91",
    "JPEG 2000 Image Compression",
    Some("ISO_15444_1"),
);

pub const RLE_LOSSLESS: TransferSyntax =
    TransferSyntax::encapsulated("1.2.840.10008.1.2.5", "RLE Lossless", None);

static KNOWN: &[TransferSyntax] = &[
    IMPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_LITTLE_ENDIAN,
    DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_BIG_ENDIAN,
    JPEG_BASELINE,
    JPEG_EXTENDED,
    JPEG_LOSSLESS,
    JPEG_LOSSLESS_SV1,
    JPEG_LS_LOSSLESS,
    JPEG_LS_NEAR_LOSSLESS,
    JPEG_2000_LOSSLESS,
    JPEG_2000,
    RLE_LOSSLESS,
];
