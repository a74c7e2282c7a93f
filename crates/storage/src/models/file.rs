//! File metadata records.

use serde::{Deserialize, Serialize};

use super::folder::FolderKey;
use super::size::SizeSpec;

/// Author recorded when no user is signed in.
pub const UNKNOWN_USER: &str = "UNKNOWN";

/// Custom blob metadata key carrying the owning file id.
pub const FILE_ID_METADATA_KEY: &str = "flamelinkFileId";

/// Custom blob metadata key carrying the folder id, set only when the file has a folder.
pub const FOLDER_ID_METADATA_KEY: &str = "flamelinkFolderId";

/// Media classification of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Images,
    Files,
}

impl MediaType {
    /// Classify by MIME type: `image/*` is an image, anything else a file.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            Self::Images
        } else {
            Self::Files
        }
    }

    /// The stored `type` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Files => "files",
        }
    }
}

/// Authoring stamp written with every file record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_date: String,
}

/// File record from `fl_files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: String,
    /// Stored filename (`{id}_{name}` or `{id}`), or a full URL on legacy records.
    pub file: String,
    #[serde(default)]
    pub folder_id: Option<FolderKey>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<SizeSpec>>,
    #[serde(rename = "__meta__", default)]
    pub meta: FileMeta,
}

impl File {
    /// Recorded variants, empty when none.
    pub fn variants(&self) -> &[SizeSpec] {
        self.sizes.as_deref().unwrap_or_default()
    }
}
