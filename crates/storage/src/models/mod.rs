//! Data models for files, folders and size variants.

pub mod file;
pub mod folder;
pub mod size;

pub use file::{
    FILE_ID_METADATA_KEY, FOLDER_ID_METADATA_KEY, File, FileMeta, MediaType, UNKNOWN_USER,
};
pub use folder::{Folder, FolderKey, FolderNode, build_folder_tree};
pub use size::{DEVICE_SIZE_TOKEN, REQUIRED_BASELINE_WIDTH, SizeRequest, SizeSpec};
