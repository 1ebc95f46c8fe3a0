//! Storage failure types.

use spotirfid_hardware::TransportError;

/// Why a multi-unit storage operation stopped.
///
/// `at_unit` is the zero-based index of the failing unit in the order the
/// operation visits them. Units before it completed; for writes they stay
/// written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageFailure {
    /// The card family has no payload layout.
    #[error("Card family is not supported")]
    UnsupportedFamily,

    /// No card is selected in this session.
    #[error("No active card in session")]
    NoActiveCard,

    /// Key-A handshake for a block was refused.
    #[error("Authentication failed at unit {at_unit} (block {block})")]
    AuthenticationFailed {
        at_unit: usize,
        block: u8,
        #[source]
        cause: TransportError,
    },

    /// A single read or write transfer failed.
    #[error("Transfer failed at unit {at_unit} (address {address})")]
    TransferFailed {
        at_unit: usize,
        address: u8,
        #[source]
        cause: TransportError,
    },
}

/// Failure of a payload write.
pub type WriteFailure = StorageFailure;

impl StorageFailure {
    /// Index of the unit that failed, if the failure happened mid-sequence.
    pub fn at_unit(&self) -> Option<usize> {
        match self {
            Self::AuthenticationFailed { at_unit, .. } | Self::TransferFailed { at_unit, .. } => {
                Some(*at_unit)
            }
            Self::UnsupportedFamily | Self::NoActiveCard => None,
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_at_unit() {
        let failure = StorageFailure::TransferFailed {
            at_unit: 2,
            address: 12,
            cause: TransportError::Timeout,
        };
        assert_eq!(failure.at_unit(), Some(2));
        assert_eq!(StorageFailure::UnsupportedFamily.at_unit(), None);
    }

    #[test]
    fn test_cause_is_source() {
        let failure = StorageFailure::AuthenticationFailed {
            at_unit: 0,
            block: 4,
            cause: TransportError::Timeout,
        };
        assert!(failure.is_authentication());
        assert_eq!(
            failure.source().map(ToString::to_string),
            Some("Timeout waiting for the card".to_string())
        );
        assert_eq!(
            failure.to_string(),
            "Authentication failed at unit 0 (block 4)"
        );
    }
}
