//! Image size descriptors.

use serde::{Deserialize, Deserializer, Serialize};

/// Width of the variant every image upload must have.
///
/// The CMS looks for resized images in the `240` folder.
pub const REQUIRED_BASELINE_WIDTH: u32 = 240;

/// Literal size token meaning "the caller's display width".
pub const DEVICE_SIZE_TOKEN: &str = "device";

/// A target size for an image variant.
///
/// Either a legacy width-only target (`width` or `maxWidth`) or a
/// width + height + quality target whose `path` is derived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeSpec {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_u32"
    )]
    pub width: Option<u32>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_u32"
    )]
    pub max_width: Option<u32>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_u32"
    )]
    pub height: Option<u32>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_f64"
    )]
    pub quality: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl SizeSpec {
    /// Width-only target.
    pub fn width(width: u32) -> Self {
        Self {
            width: Some(width),
            ..Self::default()
        }
    }

    /// Max-width-only target.
    pub fn max_width(max_width: u32) -> Self {
        Self {
            max_width: Some(max_width),
            ..Self::default()
        }
    }

    /// Width + height + quality target with its derived path.
    pub fn sized(width: u32, height: u32, quality: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            quality: Some(quality),
            ..Self::default()
        }
        .normalized()
    }

    /// Set an explicit path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the height.
    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Set the quality (0.0 - 1.0).
    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = Some(quality);
        self
    }

    /// The `{width}_{height}_{quality*100}` path, when all three are set.
    pub fn derived_path(&self) -> Option<String> {
        let width = self.width.filter(|w| *w > 0)?;
        let height = self.height.filter(|h| *h > 0)?;
        let quality = self.quality.filter(|q| *q > 0.0)?;
        Some(format!(
            "{width}_{height}_{}",
            (quality * 100.0).round() as i64
        ))
    }

    /// Replace any caller-supplied path with the derived one when possible.
    pub fn normalized(mut self) -> Self {
        if let Some(path) = self.derived_path() {
            self.path = Some(path);
        }
        self
    }

    /// `width`, falling back to `maxWidth`.
    pub fn effective_width(&self) -> Option<u32> {
        self.width
            .filter(|w| *w > 0)
            .or(self.max_width.filter(|w| *w > 0))
    }

    /// The explicit path, if non-empty.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref().filter(|p| !p.is_empty())
    }

    /// Whether a blob location can be derived from this spec.
    pub fn is_addressable(&self) -> bool {
        self.path().is_some() || self.effective_width().is_some()
    }

    /// Whether this is the plain baseline-width variant.
    pub fn is_baseline(&self) -> bool {
        (self.width == Some(REQUIRED_BASELINE_WIDTH)
            || self.max_width == Some(REQUIRED_BASELINE_WIDTH))
            && self.height.is_none_or(|h| h == 0)
            && self.quality.is_none_or(|q| q == 0.0)
    }
}

/// The size a caller asks for when resolving a URL.
#[derive(Debug, Clone, PartialEq)]
pub enum SizeRequest {
    /// A structured descriptor.
    Spec(SizeSpec),
    /// A literal token: `"device"` or a minimum width such as `"600"`.
    Literal(String),
}

impl SizeRequest {
    /// The display-width token.
    pub fn device() -> Self {
        Self::Literal(DEVICE_SIZE_TOKEN.to_string())
    }

    /// A minimum width.
    pub fn min_width(width: u32) -> Self {
        Self::Literal(width.to_string())
    }
}

impl From<SizeSpec> for SizeRequest {
    fn from(spec: SizeSpec) -> Self {
        Self::Spec(spec)
    }
}

impl From<&str> for SizeRequest {
    fn from(token: &str) -> Self {
        Self::Literal(token.to_string())
    }
}

impl From<String> for SizeRequest {
    fn from(token: String) -> Self {
        Self::Literal(token)
    }
}

/// Accept a number or a numeric string; older records store widths as text.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
