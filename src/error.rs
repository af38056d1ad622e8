use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Operation not supported: {0}")]
    NotSupportedOperation(String),

    #[error("{0} requires a non-empty `target` option to build a targeted event factory")]
    MissingTarget(String),

    #[error("Invalid field reference '{0}'")]
    InvalidFieldReference(String),

    #[error("Invalid timestamp value '{0}'")]
    InvalidTimestamp(String),

    #[error("Cannot write field reference '{reference}' ({reason})")]
    FieldConflict { reference: String, reason: String },

    #[error("Invalid format string '{0}'")]
    InvalidFormat(String),

    #[error(transparent)]
    Json(#[from] JsonError),

    #[error("Encountered an invalid plugin configuration ({0})")]
    Config(#[from] serde_yaml::Error),
}

/// Failures surfaced while decoding JSON payloads into events.
#[derive(Debug, Error)]
pub enum JsonError {
    #[error("Failed to parse JSON ({0})")]
    Syntax(#[from] serde_json::Error),

    #[error("Unexpected JSON {found}, expected {expected}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },
}

impl Error {
    pub(crate) fn not_supported<S: AsRef<str>>(op: S) -> Self {
        Error::NotSupportedOperation(op.as_ref().to_owned())
    }

    pub(crate) fn invalid_ref<S: AsRef<str>>(r: S) -> Self {
        Error::InvalidFieldReference(r.as_ref().to_owned())
    }

    pub(crate) fn conflict<S: AsRef<str>, R: Into<String>>(r: S, reason: R) -> Self {
        Error::FieldConflict {
            reference: r.as_ref().to_owned(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error originated from the JSON decoder.
    pub fn is_json(&self) -> bool {
        matches!(self, Error::Json(_))
    }
}
