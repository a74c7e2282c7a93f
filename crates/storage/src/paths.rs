//! Blob key derivation for originals and size variants.
//!
//! The CMS reads these locations directly, so the layout is fixed:
//!
//! - original: `flamelink/media/{filename}`
//! - variant with a path: `flamelink/media/sized/{path}/{filename}`
//! - width-only variant: `flamelink/media/sized/{width}/{filename}`

use crate::models::SizeSpec;

/// Folder holding original uploads.
pub const MEDIA_FOLDER: &str = "flamelink/media";

/// Folder holding resized variants.
pub const MEDIA_RESIZED_FOLDER: &str = "flamelink/media/sized";

/// Key for a file, optionally addressed at one of its variants.
///
/// A spec without path or width addresses the original.
pub fn storage_key(filename: &str, size: Option<&SizeSpec>) -> String {
    size.and_then(|size| variant_key(filename, size))
        .unwrap_or_else(|| original_key(filename))
}

/// Key of the original upload.
pub fn original_key(filename: &str) -> String {
    format!("{MEDIA_FOLDER}/{filename}")
}

/// Key of a variant, or `None` when the spec has neither path nor width.
pub fn variant_key(filename: &str, size: &SizeSpec) -> Option<String> {
    if let Some(path) = size.path() {
        return Some(format!("{MEDIA_RESIZED_FOLDER}/{path}/{filename}"));
    }
    size.effective_width()
        .map(|width| format!("{MEDIA_RESIZED_FOLDER}/{width}/{filename}"))
}

/// Whether a stored `file` value is a full URL rather than a filename.
pub fn is_url(filename: &str) -> bool {
    filename.contains("://")
}
