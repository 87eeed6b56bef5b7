use crate::loader::LoadError;
use std::fmt;
use thiserror::Error;

/// Result type alias for the build pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal build errors.
///
/// Anything reported through this type aborts the build without producing a document.
/// Recoverable problems are reported as [`Diagnostic`]s instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("entry package {path} could not be loaded: {source}")]
    EntryPackage {
        path: String,
        #[source]
        source: LoadError,
    },

    #[error("entry file {file} not found in package {package}")]
    EntryFile { package: String, file: String },

    #[error(
        "route collision for {method} {path}: declared by {first} and by {second}"
    )]
    RouteCollision {
        method: String,
        path: String,
        first: String,
        second: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A recoverable issue found while building, attached to a source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// `package/file:Declaration` or the qualified type the issue concerns.
    pub location: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_collision_message_names_both_declarations() {
        let err = Error::RouteCollision {
            method: "GET".to_string(),
            path: "/users".to_string(),
            first: "api/users.go:ListUsers".to_string(),
            second: "api/admin.go:AllUsers".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("GET /users"));
        assert!(message.contains("ListUsers"));
        assert!(message.contains("AllUsers"));
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::new("api/users.go:GetUser", "unknown type model.Ghost");
        assert_eq!(diag.to_string(), "api/users.go:GetUser: unknown type model.Ghost");
    }
}
