use std::fmt;

use base64::{engine::general_purpose, Engine as _};

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn normalize_image_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataUrlError {
    #[error("data URL must start with 'data:'")]
    MissingScheme,
    #[error("data URL must be base64 encoded (expected ';base64,')")]
    NotBase64,
    #[error("data URL has an empty MIME type")]
    MissingMimeType,
    #[error("data URL payload is empty")]
    EmptyPayload,
    #[error("data URL payload is not valid base64: {0}")]
    InvalidPayload(String),
}

/// Binary content carried inline as `data:<mime>;base64,<payload>`.
///
/// The payload is kept in its encoded form; it is validated once on parse so
/// it can be forwarded to the generation service without re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    mime_type: String,
    base64_data: String,
}

impl DataUrl {
    pub fn parse(value: &str) -> Result<Self, DataUrlError> {
        let rest = value
            .trim()
            .strip_prefix("data:")
            .ok_or(DataUrlError::MissingScheme)?;
        let (mime_type, payload) = rest.split_once(";base64,").ok_or(DataUrlError::NotBase64)?;
        let mime_type = mime_type.trim();
        if mime_type.is_empty() {
            return Err(DataUrlError::MissingMimeType);
        }
        let payload: String = payload.chars().filter(|ch| !ch.is_whitespace()).collect();
        if payload.is_empty() {
            return Err(DataUrlError::EmptyPayload);
        }
        general_purpose::STANDARD
            .decode(&payload)
            .map_err(|err| DataUrlError::InvalidPayload(err.to_string()))?;

        Ok(DataUrl {
            mime_type: normalize_image_mime_type(mime_type),
            base64_data: payload,
        })
    }

    /// Wraps an already base64-encoded payload, as returned inline by the
    /// generation service.
    pub fn from_base64(mime_type: &str, base64_data: impl Into<String>) -> Self {
        DataUrl {
            mime_type: normalize_image_mime_type(mime_type),
            base64_data: base64_data.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8], fallback_mime: &str) -> Self {
        let mime_type = detect_mime_type(bytes).unwrap_or_else(|| fallback_mime.to_string());
        DataUrl {
            mime_type: normalize_image_mime_type(&mime_type),
            base64_data: general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn base64_data(&self) -> &str {
        &self.base64_data
    }

    pub fn decode(&self) -> Result<Vec<u8>, DataUrlError> {
        general_purpose::STANDARD
            .decode(&self.base64_data)
            .map_err(|err| DataUrlError::InvalidPayload(err.to_string()))
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.base64_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 16] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    #[test]
    fn parses_and_formats_data_urls() {
        let parsed = DataUrl::parse("data:image/JPG;base64,aGVsbG8=").unwrap();
        assert_eq!(parsed.mime_type(), "image/jpeg");
        assert_eq!(parsed.base64_data(), "aGVsbG8=");
        assert_eq!(parsed.decode().unwrap(), b"hello");
        assert_eq!(parsed.to_string(), "data:image/jpeg;base64,aGVsbG8=");
    }

    #[test]
    fn rejects_malformed_data_urls() {
        assert_eq!(
            DataUrl::parse("https://example.com/a.png"),
            Err(DataUrlError::MissingScheme)
        );
        assert_eq!(
            DataUrl::parse("data:image/png,rawbytes"),
            Err(DataUrlError::NotBase64)
        );
        assert_eq!(
            DataUrl::parse("data:;base64,aGVsbG8="),
            Err(DataUrlError::MissingMimeType)
        );
        assert_eq!(
            DataUrl::parse("data:image/png;base64,"),
            Err(DataUrlError::EmptyPayload)
        );
        assert!(matches!(
            DataUrl::parse("data:image/png;base64,!!!"),
            Err(DataUrlError::InvalidPayload(_))
        ));
    }

    #[test]
    fn sniffs_mime_type_from_bytes() {
        let url = DataUrl::from_bytes(&PNG_HEADER, "image/jpeg");
        assert_eq!(url.mime_type(), "image/png");
        assert_eq!(url.decode().unwrap(), PNG_HEADER.to_vec());

        let unknown = DataUrl::from_bytes(b"plain", "image/jpeg");
        assert_eq!(unknown.mime_type(), "image/jpeg");
    }
}
