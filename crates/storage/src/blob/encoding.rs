//! String upload encodings.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

/// How a string upload is turned into bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringEncoding {
    /// UTF-8 bytes of the string itself.
    #[default]
    Raw,
    Base64,
    Base64Url,
    /// `data:[<mediatype>][;base64],<data>`
    DataUrl,
}

/// Bytes decoded from a string upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedString {
    pub bytes: Vec<u8>,
    /// Content type carried by the encoding itself (data URLs only).
    pub content_type: Option<String>,
}

impl StringEncoding {
    /// Decode `data` into bytes.
    pub fn decode(self, data: &str) -> Result<DecodedString> {
        let (bytes, content_type) = match self {
            Self::Raw => (data.as_bytes().to_vec(), None),
            Self::Base64 => (
                STANDARD
                    .decode(data.trim())
                    .context("string is not valid base64")?,
                None,
            ),
            Self::Base64Url => (
                URL_SAFE_NO_PAD
                    .decode(data.trim().trim_end_matches('='))
                    .context("string is not valid base64url")?,
                None,
            ),
            Self::DataUrl => decode_data_url(data)?,
        };
        Ok(DecodedString {
            bytes,
            content_type,
        })
    }
}

fn decode_data_url(data: &str) -> Result<(Vec<u8>, Option<String>)> {
    let Some(rest) = data.strip_prefix("data:") else {
        bail!("string is not a data URL");
    };
    let Some((header, payload)) = rest.split_once(',') else {
        bail!("data URL has no payload separator");
    };

    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (header, false),
    };

    let bytes = if is_base64 {
        STANDARD
            .decode(payload.trim())
            .context("data URL payload is not valid base64")?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };

    let content_type = Some(media_type)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    Ok((bytes, content_type))
}
