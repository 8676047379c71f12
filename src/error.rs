use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for the flashdeck library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The document is missing or could not be read.
    #[error("Cannot access '{path}': {message}")]
    FileAccess {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// The document is larger than the configured ceiling.
    #[error("File '{path}' is too large to process: {size} bytes exceeds limit of {limit} bytes")]
    SizeLimitExceeded {
        /// Path to the oversized file
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Maximum allowed size in bytes
        limit: u64,
    },

    /// The completion call failed or came back empty.
    #[error("Completion request failed: {message}")]
    Invocation {
        /// Error message
        message: String,
    },

    /// The completion payload is not a valid deck.
    #[error("Invalid deck JSON in completion response: {message}")]
    Parse {
        /// Error message
        message: String,
    },

    /// The run was cancelled between chunks.
    #[error("Operation cancelled")]
    Cancelled,

    /// A chunk could not be turned into a deck.
    #[error("Failed to create deck from chunk {index}: {source}")]
    Chunk {
        /// Zero-based chunk index
        index: usize,
        /// Underlying failure
        source: Box<Error>,
    },

    /// The background stream worker died or could not be started.
    #[error("Deck stream worker failed: {message}")]
    Worker {
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// AnkiConnect rejected a request or could not be reached.
    #[error("Anki error: {message}")]
    Anki {
        /// Error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// Generation finished without producing any cards.
    #[error("No flashcards were generated from '{path}'")]
    EmptyDeck {
        /// Source document
        path: PathBuf,
    },
}

impl Error {
    /// Creates a file access error with path context.
    #[must_use]
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invocation error.
    #[must_use]
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::Invocation {
            message: message.into(),
        }
    }

    /// Creates a stream worker error.
    #[must_use]
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates an Anki error.
    #[must_use]
    pub fn anki(message: impl Into<String>) -> Self {
        Self::Anki {
            message: message.into(),
        }
    }

    /// Wraps an error with the index of the chunk that produced it.
    #[must_use]
    pub fn in_chunk(index: usize, source: Self) -> Self {
        Self::Chunk {
            index,
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, looking through chunk wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Chunk { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }

    /// Returns true if the document exceeded the size ceiling.
    #[must_use]
    pub fn is_size_limit(&self) -> bool {
        matches!(self.root(), Self::SizeLimitExceeded { .. })
    }

    /// Returns true if this is a file access error.
    #[must_use]
    pub fn is_file_access(&self) -> bool {
        matches!(self.root(), Self::FileAccess { .. })
    }

    /// Returns true if the stream worker failed.
    #[must_use]
    pub fn is_worker(&self) -> bool {
        matches!(self.root(), Self::Worker { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Invocation {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_file_access_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::file_access("/tmp/notes.md", io_err);
        assert!(err.is_file_access());
        assert!(err.to_string().contains("/tmp/notes.md"));
    }

    #[test]
    fn test_chunk_wrapper_exposes_root() {
        let err = Error::in_chunk(2, Error::Cancelled);
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("chunk 2"));
        assert!(matches!(err.root(), Error::Cancelled));
    }

    #[test]
    fn test_worker_error_is_not_invocation() {
        let err = Error::worker("panicked: boom");
        assert!(err.is_worker());
        assert!(!matches!(err, Error::Invocation { .. }));
        assert_eq!(err.to_string(), "Deck stream worker failed: panicked: boom");
    }

    #[test]
    fn test_size_limit_message() {
        let err = Error::SizeLimitExceeded {
            path: PathBuf::from("big.md"),
            size: 11,
            limit: 10,
        };
        assert!(err.is_size_limit());
        assert!(err.to_string().contains("11 bytes exceeds limit of 10"));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::parse("test");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
