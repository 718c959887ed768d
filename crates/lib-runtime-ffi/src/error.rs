//! Error types for runtime bridge operations.

use crate::status::StatusCode;
use lib_types::TensorError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading the runtime or invoking a module.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime cannot be used in this build or configuration.
    #[error("Runtime unavailable: {reason}")]
    Unavailable { reason: String },

    /// No candidate library path could be loaded.
    #[error("Unable to load the IREE runtime library (tried {}); set {env_var}", display_paths(.tried))]
    LibraryNotFound {
        tried: Vec<PathBuf>,
        env_var: &'static str,
    },

    /// Failed to open a specific shared library.
    #[error("Failed to load library '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// Required symbol not found in library.
    #[error("Symbol '{symbol}' not found in library '{path}'")]
    SymbolNotFound { path: String, symbol: String },

    /// Argument rejected before any runtime call was made.
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// Element type outside the supported set.
    #[error("Unsupported element type code {code:#x}")]
    UnsupportedElementType { code: i64 },

    /// The runtime reported a failure status.
    #[error("{call} failed ({code}): {message}")]
    Status {
        call: &'static str,
        code: StatusCode,
        message: String,
    },

    /// Host allocation failed.
    #[error("Out of memory: {0}")]
    ResourceExhausted(String),

    /// Output list entry was not a buffer view.
    #[error("Missing output buffer view at index {index}")]
    MissingOutput { index: usize },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "no candidates".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RuntimeError {
    /// Create an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a load error.
    pub fn load_error(path: impl Into<String>, source: libloading::Error) -> Self {
        Self::LoadError {
            path: path.into(),
            source,
        }
    }

    /// Create a symbol not found error.
    pub fn symbol_not_found(path: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::SymbolNotFound {
            path: path.into(),
            symbol: symbol.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a runtime status error.
    pub fn status(call: &'static str, code: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            call,
            code,
            message: message.into(),
        }
    }

    /// The runtime could not be located or opened at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. }
                | Self::LibraryNotFound { .. }
                | Self::LoadError { .. }
                | Self::SymbolNotFound { .. }
        )
    }

    /// The error was detected before anything was handed to the runtime.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::UnsupportedElementType { .. }
        )
    }

    /// Status code carried by runtime failures.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::ResourceExhausted(_) => Some(StatusCode::ResourceExhausted),
            _ => None,
        }
    }
}

impl From<TensorError> for RuntimeError {
    fn from(err: TensorError) -> Self {
        match err {
            TensorError::UnsupportedElementType { code } => Self::UnsupportedElementType { code },
            other => Self::invalid_argument("tensor", other.to_string()),
        }
    }
}

/// Result type for runtime bridge operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_errors_become_invalid_input() {
        let err: RuntimeError = TensorError::ByteLengthMismatch {
            expected: 8,
            actual: 4,
        }
        .into();
        assert!(err.is_invalid_input());

        let err: RuntimeError = TensorError::UnsupportedElementType { code: 9 }.into();
        assert!(matches!(err, RuntimeError::UnsupportedElementType { code: 9 }));
    }

    #[test]
    fn test_not_found_message_lists_candidates() {
        let err = RuntimeError::LibraryNotFound {
            tried: vec![PathBuf::from("a.so"), PathBuf::from("b.so")],
            env_var: "IREE_BRIDGE_RUNTIME_LIB",
        };
        let message = err.to_string();
        assert!(message.contains("a.so, b.so"));
        assert!(message.contains("IREE_BRIDGE_RUNTIME_LIB"));
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_status_code_accessor() {
        let err = RuntimeError::status("iree_vm_list_create", StatusCode::Internal, "boom");
        assert_eq!(err.status_code(), Some(StatusCode::Internal));
        assert_eq!(
            RuntimeError::ResourceExhausted("x".into()).status_code(),
            Some(StatusCode::ResourceExhausted)
        );
        assert!(!err.is_invalid_input());
    }
}
