use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::syntax::TransferSyntax;

/// File Meta Information (group 0002) of a Part 10 file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetaInfo {
    pub transfer_syntax: TransferSyntax,
    pub media_storage_sop_class_uid: String,
    pub media_storage_sop_instance_uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_class_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_version_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_application_entity_title: Option<String>,
}

impl FileMetaInfo {
    pub fn new(
        transfer_syntax: TransferSyntax,
        sop_class_uid: impl Into<String>,
        sop_instance_uid: impl Into<String>,
    ) -> Self {
        Self {
            transfer_syntax,
            media_storage_sop_class_uid: sop_class_uid.into(),
            media_storage_sop_instance_uid: sop_instance_uid.into(),
            implementation_class_uid: None,
            implementation_version_name: None,
            source_application_entity_title: None,
        }
    }
}

/// A file meta header plus the dataset it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DicomFile {
    pub meta: FileMetaInfo,
    pub dataset: Dataset,
}

impl DicomFile {
    pub fn new(meta: FileMetaInfo, dataset: Dataset) -> Self {
        Self { meta, dataset }
    }
}
