//! Error types for xsdcover
//!
//! This module defines all error types used throughout the library.

use std::fmt;
use thiserror::Error;

/// Result type alias using xsdcover Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xsdcover operations
#[derive(Error, Debug)]
pub enum Error {
    /// XSD schema parsing/building error
    #[error("schema error: {0}")]
    Parse(#[from] ParseError),

    /// Internal invariant violated while walking the schema
    #[error("enumeration error: {0}")]
    Enumeration(String),

    /// XML document parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// Generation strategy failure
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// XSD schema parsing error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location in the schema file
    pub location: Option<String>,
    /// Schema source that caused the error
    pub source: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            source: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        if let Some(ref src) = self.source {
            write!(f, "\n\nSource:\n{}", src)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Failure modes of the boolean-optimization generation strategy
#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    /// The hard constraints are contradictory (unsat)
    #[error("constraints are infeasible{}", conflict_suffix(.conflict))]
    Infeasible {
        /// Conflicting clause description, when the solver exposes one
        conflict: Option<String>,
    },

    /// The solver exhausted its time budget without any model
    #[error("solver timed out after {timeout_ms} ms")]
    Timeout {
        /// Time budget that was exhausted
        timeout_ms: u64,
    },
}

fn conflict_suffix(conflict: &Option<String>) -> String {
    match conflict {
        Some(c) => format!(" ({})", c),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("Invalid schema syntax")
            .with_location("schema.xsd:42")
            .with_source("<xs:element name='invalid'/>");

        let msg = format!("{}", err);
        assert!(msg.contains("Invalid schema syntax"));
        assert!(msg.contains("Location:"));
        assert!(msg.contains("Source:"));
    }

    #[test]
    fn test_error_conversion() {
        let parse_err = ParseError::new("test");
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::Infeasible { conflict: None };
        assert_eq!(format!("{}", err), "constraints are infeasible");

        let err = GenerationError::Infeasible {
            conflict: Some("choice exclusion".to_string()),
        };
        assert!(format!("{}", err).contains("choice exclusion"));

        let err = GenerationError::Timeout { timeout_ms: 500 };
        assert!(format!("{}", err).contains("500 ms"));
    }
}
