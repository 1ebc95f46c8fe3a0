//! Error types for reader-chip operations.
//!
//! These mirror the status codes a contactless reader chip reports for a
//! single command: no answer, collisions, CRC problems, NAKs from the tag,
//! and binding-level failures.

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while exchanging a command with a tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No answer within the chip's response window.
    #[error("Timeout waiting for the card")]
    Timeout,

    /// Several cards answered at once.
    #[error("Collision detected")]
    Collision,

    /// Response CRC did not match.
    #[error("CRC mismatch in card response")]
    CrcMismatch,

    /// The card answered with a NAK (4-bit code).
    #[error("Card NAK: 0x{code:X}")]
    Nack { code: u8 },

    /// No card is selected in the field.
    #[error("No card selected")]
    NoCard,

    /// The chip has not been initialized.
    #[error("Reader not initialized")]
    NotInitialized,

    /// Operation is not supported by this card.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Malformed or unexpected exchange.
    #[error("Protocol error: {message}")]
    Protocol { message: String },
}

impl TransportError {
    /// Create a new NAK error.
    pub fn nack(code: u8) -> Self {
        Self::Nack { code }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Whether the card stopped responding, rather than rejecting the command.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
