use std::{fmt, io, str::Utf8Error};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use serde_yaml::Error as YamlError;
use thiserror::Error;

/// Hard failures of the compiler.
///
/// Only catastrophic input (empty text, undecodable bytes) and setup problems (bad
/// configuration, an inconsistent enrichment order) surface here. Everything that goes
/// wrong *inside* a document is reported as a [`Diagnostic`](crate::codec::Diagnostic)
/// instead, and compilation carries on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum SsmError {
    #[error("Source document is empty")]
    EmptyInput,
    #[error("Source document is not valid UTF-8: {0}")]
    Decode(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Enrichment pass order error: {0}")]
    PassOrder(String),
    #[error("SSM codec software error: {0}")]
    Codec(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl SsmError {
    /// Whether this error was caused by the document itself rather than the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(self, SsmError::EmptyInput | SsmError::Decode(_))
    }
}

impl From<Utf8Error> for SsmError {
    fn from(src: Utf8Error) -> SsmError {
        SsmError::Decode(format!("invalid byte sequence after offset {}", src.valid_up_to()))
    }
}

impl From<toml::de::Error> for SsmError {
    fn from(src: toml::de::Error) -> SsmError {
        SsmError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for SsmError {
    fn from(src: toml::ser::Error) -> SsmError {
        SsmError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<YamlError> for SsmError {
    fn from(src: YamlError) -> SsmError {
        SsmError::Config(format!("Yaml deserialization error: {src}"))
    }
}

impl From<JsonError> for SsmError {
    fn from(src: JsonError) -> SsmError {
        SsmError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for SsmError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => SsmError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => SsmError::PermissionDenied,
            _ => SsmError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for SsmError {
    fn from(x: fmt::Error) -> Self {
        SsmError::Codec(format!("{x}"))
    }
}

impl From<RegexError> for SsmError {
    fn from(x: RegexError) -> Self {
        SsmError::Config(format!("Regex parse failed: {x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_utf8_error_maps_to_decode() {
        let bytes = [b'a', 0xff, b'b'];
        let err: SsmError = std::str::from_utf8(&bytes).unwrap_err().into();
        assert!(matches!(err, SsmError::Decode(ref msg) if msg.contains("offset 1")));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: SsmError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, SsmError::NotFound(_)));
        assert!(!err.is_input_error());
    }
}
