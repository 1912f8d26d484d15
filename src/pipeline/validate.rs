// src/pipeline/validate.rs

//! Attachment validation before any publish attempt.

use std::fmt;

use crate::models::{AttachmentConfig, FetchedAttachment};

/// Why an attachment was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidAttachment {
    /// Not above the minimum size, usually an error page
    TooSmall { len: usize, min: usize },
    TooLarge { len: usize, max: usize },
    /// Leading bytes are not the document signature
    BadSignature,
    /// The announcement page links no document
    Missing,
}

impl fmt::Display for InvalidAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSmall { len, min } => write!(f, "{len} bytes, not above minimum of {min}"),
            Self::TooLarge { len, max } => write!(f, "{len} bytes, above maximum of {max}"),
            Self::BadSignature => f.write_str("document signature mismatch"),
            Self::Missing => f.write_str("no attachment on the page"),
        }
    }
}

/// Checks fetched bytes are a plausible document.
#[derive(Debug, Clone)]
pub struct AttachmentValidator {
    min_bytes: usize,
    max_bytes: usize,
    signature: Vec<u8>,
}

impl AttachmentValidator {
    pub fn new(config: &AttachmentConfig) -> Self {
        Self {
            min_bytes: config.min_bytes,
            max_bytes: config.max_bytes,
            signature: config.signature.as_bytes().to_vec(),
        }
    }

    pub fn check(&self, bytes: &[u8]) -> Result<(), InvalidAttachment> {
        let len = bytes.len();
        if len <= self.min_bytes {
            return Err(InvalidAttachment::TooSmall {
                len,
                min: self.min_bytes,
            });
        }
        if len > self.max_bytes {
            return Err(InvalidAttachment::TooLarge {
                len,
                max: self.max_bytes,
            });
        }
        if !bytes.starts_with(&self.signature) {
            return Err(InvalidAttachment::BadSignature);
        }
        Ok(())
    }

    /// Accept fetched bytes for publishing.
    pub fn validate(&self, bytes: Vec<u8>) -> Result<FetchedAttachment, InvalidAttachment> {
        self.check(&bytes)?;
        Ok(FetchedAttachment {
            bytes,
            is_valid: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(len: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.resize(len, b' ');
        bytes
    }

    fn validator() -> AttachmentValidator {
        AttachmentValidator::new(&AttachmentConfig::default())
    }

    #[test]
    fn test_accepts_pdf() {
        let attachment = validator().validate(pdf(4096)).unwrap();
        assert!(attachment.is_valid);
        assert_eq!(attachment.bytes.len(), 4096);
    }

    #[test]
    fn test_rejects_small_payload() {
        assert_eq!(
            validator().check(&pdf(100)),
            Err(InvalidAttachment::TooSmall { len: 100, min: 1024 })
        );
    }

    #[test]
    fn test_minimum_size_must_be_exceeded() {
        assert_eq!(
            validator().check(&pdf(1024)),
            Err(InvalidAttachment::TooSmall { len: 1024, min: 1024 })
        );
        assert!(validator().check(&pdf(1025)).is_ok());
    }

    #[test]
    fn test_rejects_html_error_page() {
        let mut page = b"<!DOCTYPE html><html><body>404</body></html>".to_vec();
        page.resize(4096, b' ');
        assert_eq!(validator().check(&page), Err(InvalidAttachment::BadSignature));
        assert!(validator().validate(page).is_err());
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let config = AttachmentConfig {
            max_bytes: 2048,
            ..AttachmentConfig::default()
        };
        let validator = AttachmentValidator::new(&config);
        assert!(matches!(
            validator.check(&pdf(4096)),
            Err(InvalidAttachment::TooLarge { .. })
        ));
    }
}
