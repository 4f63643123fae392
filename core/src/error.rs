//! Error taxonomy for lexicon-core
//!
//! Errors are grouped into four closed kinds. Every variant carries its own
//! human-readable message via `Display`, and [`Error::title`] gives the
//! short heading platform layers show in an alert.

use thiserror::Error;

/// Failures talking to an external service (dictionary, translation, sync)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("The request timed out")]
    Timeout,

    #[error("The server could not be reached")]
    Unreachable,

    #[error("The server returned an invalid response (status {0})")]
    InvalidResponse(u16),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("API key is missing")]
    MissingApiKey,

    #[error("Failed to decode response: {0}")]
    Decoding(String),

    #[error("The response contained no data")]
    NoData,

    #[error("No internet connection")]
    NoConnection,
}

/// Failures of the on-device store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to open the store: {0}")]
    InitFailed(String),

    #[error("Failed to save changes: {0}")]
    SaveFailed(String),

    #[error("Failed to read data: {0}")]
    ReadFailed(String),

    #[error("Stored data is corrupted: {0}")]
    DataCorrupted(String),
}

impl StorageError {
    /// Map a SQLite error raised while reading
    pub fn read(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => Self::DataCorrupted(err.to_string()),
            other => Self::ReadFailed(other.to_string()),
        }
    }

    /// Map a SQLite error raised while writing
    pub fn save(err: rusqlite::Error) -> Self {
        Self::SaveFailed(err.to_string())
    }
}

/// Invalid caller input that is not covered by a named operation failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Named operation failures surfaced by managers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InternalError {
    #[error("Input cannot be empty")]
    InputCannotBeEmpty,

    #[error("Saving the word failed")]
    SavingWordFailed,

    #[error("Deleting the word failed")]
    DeletingWordFailed,

    #[error("Saving the idiom failed")]
    SavingIdiomFailed,

    #[error("Deleting the idiom failed")]
    DeletingIdiomFailed,

    #[error("No entry with id {0}")]
    EntryNotFound(String),

    #[error("A tag named \"{0}\" already exists")]
    TagAlreadyExists(String),

    #[error("An entry can hold at most {0} tags")]
    TagLimitReached(usize),

    #[error("Cannot play audio")]
    CannotPlayAudio,

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Import failed: {0}")]
    ImportFailed(String),

    #[error("No definitions were found for \"{0}\"")]
    DefinitionNotFound(String),

    #[error("Saving the quiz session failed")]
    SavingQuizSessionFailed,

    #[error("You do not have access to this shared dictionary")]
    SharedDictionaryAccessDenied,
}

/// Errors that can occur in lexicon-core operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl Error {
    /// Short heading for an alert presenting this error
    pub fn title(&self) -> &'static str {
        match self {
            Error::Network(NetworkError::NoConnection) => "You are offline",
            Error::Network(_) => "Network error",
            Error::Storage(StorageError::DataCorrupted(_)) => "Data problem",
            Error::Storage(_) => "Storage error",
            Error::Validation(_) => "Invalid input",
            Error::Internal(InternalError::SharedDictionaryAccessDenied) => "Access denied",
            Error::Internal(_) => "Something went wrong",
        }
    }

    /// Whether offering the user a retry action makes sense
    ///
    /// Nothing in the crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(err) => matches!(
                err,
                NetworkError::Timeout
                    | NetworkError::Unreachable
                    | NetworkError::NoConnection
                    | NetworkError::InvalidResponse(_)
            ),
            Error::Storage(err) => matches!(
                err,
                StorageError::SaveFailed(_) | StorageError::ReadFailed(_)
            ),
            Error::Validation(_) => false,
            Error::Internal(err) => matches!(
                err,
                InternalError::SavingWordFailed
                    | InternalError::SavingIdiomFailed
                    | InternalError::SavingQuizSessionFailed
                    | InternalError::ExportFailed(_)
            ),
        }
    }
}

/// Result type alias for lexicon-core operations
pub type Result<T> = std::result::Result<T, Error>;
