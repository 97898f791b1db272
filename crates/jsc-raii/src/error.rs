//! Error types for JavaScriptCore operations
//!
//! Failures fall into two kinds: malformed input supplied by the caller
//! (`InvalidArgument`) and failures surfaced by the engine itself
//! (`Runtime`). Narrowing a value to the wrong subtype reports
//! `TypeMismatch`.

use thiserror::Error;

/// Result type alias for JSC operations
pub type JscResult<T> = Result<T, JscError>;

#[derive(Debug, Error)]
pub enum JscError {
    /// Bad JSON text, empty property name, missing callback, syntax error
    /// in source text
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An exception raised by the engine during evaluation, or a duplicate
    /// class registration
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Value is not of the requested subtype
    #[error("Type error: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// JSON deserialization into a Rust type failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JscError {
    /// Create an invalid-argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, Self::Runtime(_))
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    /// The message without the kind prefix
    pub fn message(&self) -> String {
        match self {
            Self::InvalidArgument(message) | Self::Runtime(message) => message.clone(),
            Self::TypeMismatch { expected, actual } => {
                format!("expected {}, got {}", expected, actual)
            }
            Self::Json(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let err = JscError::invalid_argument("The name is empty.");
        assert_eq!(err.to_string(), "Invalid argument: The name is empty.");
        assert!(err.is_invalid_argument());
        assert!(!err.is_runtime());
    }

    #[test]
    fn test_runtime_display() {
        let err = JscError::runtime("Error: x");
        assert_eq!(err.to_string(), "Runtime error: Error: x");
        assert_eq!(err.message(), "Error: x");
        assert!(err.is_runtime());
    }

    #[test]
    fn test_type_mismatch() {
        let err = JscError::type_mismatch("Function", "Number");
        assert!(err.to_string().contains("expected Function"));
        assert!(err.to_string().contains("got Number"));
        assert!(err.is_type_mismatch());
    }

    #[test]
    fn test_json_error_from() {
        let parse = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: JscError = parse.into();
        assert!(matches!(err, JscError::Json(_)));
    }
}
