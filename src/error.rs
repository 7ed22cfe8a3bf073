//! Error types for the AWS provider.
//!
//! Two layers of errors exist:
//!
//! - [`ApiError`] is what the remote service seam returns. It is a tagged
//!   result so callers pattern match on [`ApiError::NotFound`] instead of
//!   sniffing error strings.
//! - [`ProviderError`] is what provider operations return to the host.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors returned by the remote management API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The addressed resource does not exist (or is no longer active).
    #[error("{0}")]
    NotFound(String),

    /// A network or service failure the caller may retry.
    #[error("{0}")]
    Transient(String),

    /// The request itself was malformed. Retrying will not help.
    #[error("{0}")]
    Fatal(String),
}

impl ApiError {
    /// Returns true for [`ApiError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for remote API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that can occur in provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Configuration could not be decoded into its typed form.
    #[error("Decode error: {}", summarize(.0))]
    Decode(Vec<Diagnostic>),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote service failed. The message is the service's own.
    #[error("{0}")]
    Remote(String),

    /// The remote service rejected a request as malformed.
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Remote(msg)
            | Self::Fatal(msg)
            | Self::DeadlineExceeded(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::Decode(diagnostics) => summarize(diagnostics),
            Self::Serialization(err) => err.to_string(),
        }
    }

    /// Returns true if the error means the resource is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ApiError> for ProviderError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(msg) => Self::NotFound(msg),
            ApiError::Transient(msg) => Self::Remote(msg),
            ApiError::Fatal(msg) => Self::Fatal(msg),
        }
    }
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| match &d.attribute {
            Some(path) => format!("{} (at {})", d.summary, path),
            None => d.summary.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("vpc connector arn:aws:x".to_string());
        assert_eq!(format!("{}", err), "Resource not found: vpc connector arn:aws:x");

        let err = ProviderError::UnknownResource("aws_thing".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: aws_thing");
    }

    #[test]
    fn test_remote_error_is_verbatim() {
        let err: ProviderError =
            ApiError::Transient("ThrottlingException: Rate exceeded".to_string()).into();
        assert_eq!(err.to_string(), "ThrottlingException: Rate exceeded");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_api_error_mapping() {
        let err: ProviderError = ApiError::NotFound("gone".to_string()).into();
        assert!(err.is_not_found());
        assert_eq!(err.message(), "gone");

        let err: ProviderError = ApiError::Fatal("bad shape".to_string()).into();
        assert!(matches!(err, ProviderError::Fatal(_)));
        assert_eq!(err.to_string(), "Fatal error: bad shape");
    }

    #[test]
    fn test_decode_error_lists_paths() {
        let err = ProviderError::Decode(vec![
            Diagnostic::error("Missing required attribute 'parameter.0.value'")
                .with_attribute("parameter.0.value"),
            Diagnostic::error("Invalid type for attribute 'name'").with_attribute("name"),
        ]);

        let display = err.to_string();
        assert!(display.starts_with("Decode error: "));
        assert!(display.contains("(at parameter.0.value)"));
        assert!(display.contains("(at name)"));
    }

    #[test]
    fn test_api_error_not_found_predicate() {
        assert!(ApiError::NotFound("x".to_string()).is_not_found());
        assert!(!ApiError::Transient("x".to_string()).is_not_found());
        assert!(!ApiError::Fatal("x".to_string()).is_not_found());
    }
}
