use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::extractor::ExtractionError;

pub const SUPPORTED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

/// A case or assertion that is written wrong. Never retried, and always names
/// the offending value.
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("unsupported request method `{method}`, supported methods: {}", SUPPORTED_METHODS.join("/"))]
    #[diagnostic(code(ddt::config::method))]
    UnsupportedMethod { method: String },

    #[error("case is missing the required field `{0}`")]
    #[diagnostic(code(ddt::config::missing_field))]
    MissingField(&'static str),

    #[error("invalid field `{field}`: {message}")]
    #[diagnostic(code(ddt::config::invalid_field))]
    InvalidField { field: String, message: String },

    #[error("assertion #{index} is missing required fields: {}", .missing.join(", "))]
    #[diagnostic(code(ddt::config::assertion_fields))]
    MissingAssertionFields {
        index: usize,
        missing: Vec<&'static str>,
    },

    #[error(
        "assertion #{index}: unsupported target `{target}`, supported targets are `status_code` \
         and path expressions starting with `$` or `.`"
    )]
    #[diagnostic(code(ddt::config::target))]
    UnsupportedTarget { index: usize, target: String },

    #[error("assertion #{index}: invalid path expression `{path}`: {reason}")]
    #[diagnostic(code(ddt::config::path))]
    InvalidPath {
        index: usize,
        path: String,
        reason: String,
    },

    #[error("assertion #{index}: unsupported assertion kind `{kind}`")]
    #[diagnostic(code(ddt::config::kind))]
    UnsupportedKind { index: usize, kind: String },

    #[error(
        "assertion #{index}: unsupported type name {name}, supported types: string, integer, \
         boolean, object, array"
    )]
    #[diagnostic(code(ddt::config::type_name))]
    UnsupportedTypeName { index: usize, name: Value },

    #[error("assertion #{index}: `{kind}` only supports {supported}, got actual {actual} and expected {expected}")]
    #[diagnostic(code(ddt::config::type_mismatch))]
    TypeMismatch {
        index: usize,
        kind: &'static str,
        supported: &'static str,
        actual: Value,
        expected: Value,
    },
}

impl ConfigError {
    /// 1-based position of the assertion this error belongs to, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            ConfigError::MissingAssertionFields { index, .. }
            | ConfigError::UnsupportedTarget { index, .. }
            | ConfigError::InvalidPath { index, .. }
            | ConfigError::UnsupportedKind { index, .. }
            | ConfigError::UnsupportedTypeName { index, .. }
            | ConfigError::TypeMismatch { index, .. } => Some(*index),
            ConfigError::UnsupportedMethod { .. }
            | ConfigError::MissingField(_)
            | ConfigError::InvalidField { .. } => None,
        }
    }
}

/// Everything that can make a single case instance fail.
#[derive(Error, Debug, Diagnostic)]
pub enum CaseError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Configuration(#[from] ConfigError),

    #[error("assertion #{index}: failed to extract the actual value: {source}")]
    #[diagnostic(code(ddt::extraction))]
    Extraction {
        index: usize,
        #[source]
        source: ExtractionError,
    },

    #[error("assertion #{index} failed: {message}")]
    #[diagnostic(code(ddt::assertion))]
    AssertionFailed {
        index: usize,
        message: String,
        actual: Value,
        expected: Value,
    },

    #[error("request failed: {0}")]
    #[diagnostic(code(ddt::transport))]
    Transport(#[from] reqwest::Error),
}

impl CaseError {
    pub fn index(&self) -> Option<usize> {
        match self {
            CaseError::Configuration(error) => error.index(),
            CaseError::Extraction { index, .. } | CaseError::AssertionFailed { index, .. } => {
                Some(*index)
            }
            CaseError::Transport(_) => None,
        }
    }
}
