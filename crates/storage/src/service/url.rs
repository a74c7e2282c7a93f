//! Resolving download URLs, picking the closest stored variant.

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, warn};

use super::StorageService;
use crate::error::{StorageError, StorageResult};
use crate::models::{DEVICE_SIZE_TOKEN, SizeRequest, SizeSpec};

/// Options for [`StorageService::get_url`].
#[derive(Debug, Clone, Default)]
pub struct UrlOptions {
    pub file_id: String,
    pub size: Option<SizeRequest>,
}

impl UrlOptions {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: impl Into<SizeRequest>) -> Self {
        self.size = Some(size.into());
        self
    }
}

/// Which blob a URL request resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantChoice {
    /// No size was requested.
    Original,
    /// A stored variant.
    Variant(SizeSpec),
    /// A size was requested but could not be honored; the original is used.
    Fallback(String),
}

impl VariantChoice {
    pub fn variant(&self) -> Option<&SizeSpec> {
        match self {
            Self::Variant(spec) => Some(spec),
            _ => None,
        }
    }
}

/// Pick the variant of a file that satisfies `requested`.
///
/// Structured sizes with a path match a stored path exactly, provided the
/// file has path variants at all. Otherwise a width (structured, numeric
/// string, or the `"device"` display width) selects the smallest variant at
/// least that wide.
pub fn choose_variant(
    available: &[SizeSpec],
    requested: Option<&SizeRequest>,
    display_width: Option<u32>,
) -> VariantChoice {
    match requested {
        None => VariantChoice::Original,
        Some(SizeRequest::Spec(spec)) => {
            let spec = spec.clone().normalized();
            match (spec.path(), spec.width.filter(|w| *w > 0)) {
                (Some(path), _) if available.iter().any(|s| s.path().is_some()) => {
                    match available.iter().find(|s| s.path() == Some(path)) {
                        Some(found) => VariantChoice::Variant(found.clone()),
                        None => VariantChoice::Fallback(format!(
                            "the provided path ({path}) did not match any of the file's available paths: {}",
                            list(available.iter().filter_map(SizeSpec::path))
                        )),
                    }
                }
                (_, Some(width)) if !available.is_empty() => {
                    closest_at_least(available, f64::from(width), &width.to_string())
                }
                _ => VariantChoice::Original,
            }
        }
        Some(SizeRequest::Literal(_)) if available.is_empty() => VariantChoice::Original,
        Some(SizeRequest::Literal(token)) if token == DEVICE_SIZE_TOKEN => match display_width {
            Some(width) => closest_at_least(available, f64::from(width), token),
            None => VariantChoice::Fallback(
                "the display width is unknown in this execution context".to_string(),
            ),
        },
        Some(SizeRequest::Literal(token)) => match numeric_width(token) {
            Some(width) => closest_at_least(available, width, token),
            None => VariantChoice::Fallback(format!(
                "the provided size ({token}) is not a width"
            )),
        },
    }
}

/// Numeric value of a literal size. Blank means zero; `None` only for NaN.
fn numeric_width(token: &str) -> Option<f64> {
    let token = token.trim();
    if token.is_empty() {
        return Some(0.0);
    }
    token.parse::<f64>().ok().filter(|width| !width.is_nan())
}

/// Smallest variant whose width or max width is at least `min_width`.
fn closest_at_least(available: &[SizeSpec], min_width: f64, requested: &str) -> VariantChoice {
    let mut by_width: Vec<(u32, &SizeSpec)> = available
        .iter()
        .filter_map(|spec| spec.effective_width().map(|w| (w, spec)))
        .collect();
    by_width.sort_by_key(|(width, _)| *width);

    match by_width
        .iter()
        .find(|(width, _)| f64::from(*width) >= min_width)
    {
        Some((_, spec)) => VariantChoice::Variant((*spec).clone()),
        None => VariantChoice::Fallback(format!(
            "the provided size ({requested}) did not match any of the file's available sizes: {}",
            list(by_width.iter().map(|(width, _)| width))
        )),
    }
}

fn list<T: std::fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|item| item.to_string()).collect::<Vec<_>>().join(", ")
}

/// Expiry of admin signed URLs: effectively never.
fn signed_url_expiry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2500, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl StorageService {
    /// Download URL of a file, or of the closest variant to the requested
    /// size. `None` when the file record does not exist.
    ///
    /// Admin contexts get a signed URL; clients get the public download URL.
    pub async fn get_url(&self, options: &UrlOptions) -> StorageResult<Option<String>> {
        if options.file_id.is_empty() {
            return Err(StorageError::missing("getURL", "at least the file ID"));
        }
        self.ensure_blob_access("getURL")?;

        let Some(file) = self.load_file(&options.file_id).await? else {
            return Ok(None);
        };

        let choice = choose_variant(
            file.variants(),
            options.size.as_ref(),
            self.context.display_width(),
        );
        if let VariantChoice::Fallback(reason) = &choice {
            warn!(file_id = %file.id, reason = %reason, "requested size ignored, using original");
        }

        let key = self.blob_key("getURL", &file.file, choice.variant())?;
        let url = if self.context.is_server_privileged() {
            self.blobs.signed_url(&key, signed_url_expiry()).await?
        } else {
            self.blobs.download_url(&key)
        };

        debug!(file_id = %file.id, key = %key, "file URL resolved");
        Ok(Some(url))
    }
}
