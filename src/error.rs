//! Error taxonomy for the continuous-learning core
//!
//! Capture-path errors are swallowed and logged by the coordinator so a
//! learning hiccup never blocks the caller's photo-upload response.
//! Pipeline-path errors abort only the current phase. Validation errors are
//! the one class that must reach the caller synchronously.

use axum::http::StatusCode;

/// Domain errors for sample storage, inference, training and evaluation
#[derive(Debug, thiserror::Error)]
pub enum MlError {
    /// Bad caller input (e.g. rating out of range). Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing sample, model or tire reference
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Disk read/write failure
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// Image bytes could not be decoded
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// Submitted image exceeds the configured size limit
    #[error("payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Remote model endpoint unreachable. Callers fall back to mock
    /// analysis instead of surfacing this.
    #[error("model endpoint unavailable: {0}")]
    ModelUnavailable(String),

    /// Training has zero real samples and synthetic generation is disabled
    #[error("insufficient training data: {0}")]
    InsufficientData(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MlError {
    /// Construct a not-found error for a sample id
    pub fn sample_not_found(id: &str) -> Self {
        MlError::NotFound {
            kind: "sample",
            id: id.to_string(),
        }
    }

    /// Construct a not-found error for a model name
    pub fn model_not_found(name: &str) -> Self {
        MlError::NotFound {
            kind: "model",
            id: name.to_string(),
        }
    }

    /// HTTP status code used by the inference API when surfacing this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            MlError::Validation(_) | MlError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            MlError::NotFound { .. } => StatusCode::NOT_FOUND,
            MlError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            MlError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MlError::Io(_) | MlError::InsufficientData(_) | MlError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<image::ImageError> for MlError {
    fn from(err: image::ImageError) -> Self {
        MlError::ImageDecode(err.to_string())
    }
}

/// Convenience alias used throughout the crate
pub type MlResult<T> = Result<T, MlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            MlError::Validation("bad rating".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            MlError::sample_not_found("abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            MlError::PayloadTooLarge { size: 11, limit: 10 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            MlError::ImageDecode("not a jpeg".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = MlError::sample_not_found("s-123");
        assert_eq!(err.to_string(), "sample not found: s-123");
    }
}
