use std::error;
use std::fmt;
use std::io;

/// Every failure of the interchange pipeline. All of them are fatal to the enclosing operation.
#[derive(Debug)]
pub enum Error {
    /// Malformed or unexpected input at a parse boundary.
    Format(String),

    /// A loaded dataset lacks a required field, or no entry matches the requested selection.
    Configuration(String),

    /// The problem identifier has no row in the instance table.
    UnresolvedInstance(String),

    Io(io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
}

impl Error {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Format(message) => write!(f, "Format error: {message}"),
            Self::Configuration(message) => write!(f, "Configuration error: {message}"),
            Self::UnresolvedInstance(problem) => write!(f, "Unresolved instance {problem:?}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::Csv(e) => write!(f, "CSV error: {e}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

/// Convert an absent value into a [`Error::Format`] describing what was expected.
pub fn expected<T>(value: Option<T>, what: &str) -> Result<T, Error> {
    value.ok_or_else(|| Error::format(format!("Expected {what}")))
}
