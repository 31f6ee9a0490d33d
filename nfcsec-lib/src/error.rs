use thiserror::Error;

/// The primary error type for the `nfcsec` library.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Invalid hex in envelope: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Envelope too short: expected at least {expected} bytes, got {actual}")]
    EnvelopeTooShort { expected: usize, actual: usize },

    #[error("Ciphertext length {0} is not a multiple of the block size")]
    Length(usize),

    #[error("Integrity check failed: authentication tag mismatch")]
    Integrity,

    #[error("UID validation failed: {0}")]
    Validation(String),

    #[error("Unsupported topic: {0}")]
    UnsupportedTopic(String),

    #[error("Invalid secret key: {0}")]
    InvalidKey(String),

    #[error("Failed to hash tag id: {0}")]
    Hashing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to append to or read from the audit store.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Audit writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Corrupt audit row {id}: {message}")]
    CorruptRow { id: i64, message: String },
}
