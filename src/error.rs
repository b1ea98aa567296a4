//! Error types for route compilation and module loading.
//!
//! Two classes of failure exist:
//!
//! - [`CompileError`] aborts the whole compilation. It is raised only for
//!   security requirements that reference an unknown scheme or scope.
//! - [`LoadError`] describes why a module could not be loaded. It never
//!   escapes [`crate::resolve::resolve`]; the resolver logs it and reports the
//!   reference as unresolved so the caller can fall back.

use http::Method;
use std::path::PathBuf;
use thiserror::Error;

/// Compilation-fatal errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A security requirement names a scheme missing from `securityDefinitions`.
    #[error("Unrecognized security definition ({scheme}) on {method} {path}")]
    UnknownSecurityScheme {
        scheme: String,
        path: String,
        method: Method,
    },
    /// A security requirement asks for a scope the scheme does not declare.
    #[error("Unrecognized scope ({scope}) for security definition {scheme} on {method} {path}")]
    UnknownScope {
        scope: String,
        scheme: String,
        path: String,
        method: Method,
    },
}

impl CompileError {
    /// `"{path} → {method}"`, the location string used in validation issues.
    #[must_use]
    pub fn location(&self) -> String {
        match self {
            CompileError::UnknownSecurityScheme { path, method, .. }
            | CompileError::UnknownScope { path, method, .. } => format!("{path} → {method}"),
        }
    }

    /// Short machine-readable kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::UnknownSecurityScheme { .. } => "UnknownSecurityScheme",
            CompileError::UnknownScope { .. } => "UnknownScope",
        }
    }
}

/// Reasons a module could not be loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("module not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read module {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed module {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_messages() {
        let err = CompileError::UnknownScope {
            scope: "read".into(),
            scheme: "oauth2".into(),
            path: "/pets".into(),
            method: Method::GET,
        };
        assert_eq!(
            err.to_string(),
            "Unrecognized scope (read) for security definition oauth2 on GET /pets"
        );
        assert_eq!(err.kind(), "UnknownScope");
        assert_eq!(err.location(), "/pets → GET");
    }

    #[test]
    fn test_load_error_display() {
        let err = LoadError::NotFound(PathBuf::from("/mocks/pets"));
        assert_eq!(err.to_string(), "module not found: /mocks/pets");
    }
}
