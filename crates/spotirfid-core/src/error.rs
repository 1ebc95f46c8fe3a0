use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Data model errors
    #[error("Invalid card identity: {0}")]
    InvalidIdentity(String),

    #[error("Payload too long: {len} bytes exceeds the {max}-byte capacity")]
    PayloadTooLong { len: usize, max: usize },

    #[error("Payload byte 0x{byte:02X} at position {position} is not printable ASCII")]
    PayloadNotPrintable { position: usize, byte: u8 },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
