//! Error taxonomy for receipt extraction.
//!
//! Errors fall into two groups. Run-level errors (`NotFound`, `Fatal`) abort the
//! whole batch before any output is produced. Per-image errors (`Transient`,
//! `Rejected`, `MalformedResponse`, `Image`) are recorded against the image in the
//! batch and processing continues.

use std::path::PathBuf;

use thiserror::Error;

use crate::openai::OpenAiError;

/// Marker kind for responses that failed schema validation.
pub const KIND_PARSE_ERROR: &str = "parse_error";
/// Marker kind for network and API failures.
pub const KIND_API_ERROR: &str = "api_error";
/// Marker kind for image files that could not be read.
pub const KIND_IO_ERROR: &str = "io_error";

/// Errors produced while discovering, extracting or aggregating receipts.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// The input directory is missing or is not a directory.
    #[error("input directory not found: {}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Missing or rejected credential, or unusable configuration.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Network failure, timeout, rate limit or server-side error. Safe to retry.
    #[error("transient API failure: {0}")]
    Transient(String),

    /// The API refused this particular request. Retrying will not help.
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The model reply did not match the receipt schema.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// An image file could not be read.
    #[error("failed to read image {}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReceiptError {
    /// Creates a `MalformedResponse` error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Returns `true` for errors that must terminate the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Fatal(_))
    }

    /// Returns `true` if a caller may reasonably retry the failed request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns the error kind recorded in a batch error marker.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedResponse(_) => KIND_PARSE_ERROR,
            Self::Image { .. } => KIND_IO_ERROR,
            Self::Transient(_) | Self::Rejected { .. } | Self::Fatal(_) | Self::NotFound { .. } => {
                KIND_API_ERROR
            }
        }
    }
}

impl From<OpenAiError> for ReceiptError {
    fn from(error: OpenAiError) -> Self {
        match error {
            OpenAiError::Network(e) => Self::Transient(format!("network error: {e}")),
            OpenAiError::Timeout(_) => Self::Transient("request timed out".to_string()),
            OpenAiError::Http { status, message } => match status {
                401 | 403 => Self::Fatal(format!(
                    "API rejected the credential (status {status}): {message}"
                )),
                408 | 429 | 500..=599 => {
                    Self::Transient(format!("HTTP status {status}: {message}"))
                }
                _ => Self::Rejected { status, message },
            },
            OpenAiError::Serialization(e) => {
                Self::MalformedResponse(format!("undecodable API response: {e}"))
            }
            OpenAiError::Api { message } => Self::MalformedResponse(message),
            OpenAiError::InvalidUrl(url) => Self::Fatal(format!("invalid API base URL: {url}")),
            OpenAiError::MissingCredential(var) => {
                Self::Fatal(format!("API credential not configured: set {var}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_response_maps_to_parse_error_kind() {
        let err = ReceiptError::malformed("missing key 'total'");
        assert_eq!(err.kind(), "parse_error");
        assert!(!err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn not_found_is_fatal() {
        let err = ReceiptError::NotFound {
            path: PathBuf::from("/no/such/dir"),
            source: None,
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("/no/such/dir"));
    }

    #[test]
    fn auth_statuses_classify_as_fatal() {
        for status in [401, 403] {
            let err: ReceiptError = OpenAiError::Http {
                status,
                message: "bad key".to_string(),
            }
            .into();
            assert!(err.is_fatal(), "status {status} should be fatal");
        }
    }

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        for status in [408, 429, 500, 503] {
            let err: ReceiptError = OpenAiError::Http {
                status,
                message: String::new(),
            }
            .into();
            assert!(err.is_retryable(), "status {status} should be transient");
            assert_eq!(err.kind(), "api_error");
        }
    }

    #[test]
    fn other_client_errors_are_rejected_per_image() {
        let err: ReceiptError = OpenAiError::Http {
            status: 400,
            message: "image too large".to_string(),
        }
        .into();
        assert!(matches!(err, ReceiptError::Rejected { status: 400, .. }));
        assert!(!err.is_fatal());
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "api_error");
    }

    #[test]
    fn missing_credential_is_fatal() {
        let err: ReceiptError = OpenAiError::MissingCredential("OPENAI_API_KEY").into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn image_errors_map_to_io_error_kind() {
        let err = ReceiptError::Image {
            path: PathBuf::from("r1.jpg"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.kind(), "io_error");
        assert!(std::error::Error::source(&err).is_some());
    }
}
