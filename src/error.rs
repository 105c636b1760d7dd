//! Error types for deterministic key and address derivation.

use ipnetwork::IpNetworkError;
use thiserror::Error;

/// Error returned by derivation, allocation and config operations.
///
/// Every failure is a pure function of the inputs, so callers should not
/// retry an operation without changing its arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WgPrngError {
    /// An argument is outside its accepted domain (ordinal < 1, bad seed).
    #[error("invalid argument: {message}")]
    Validation {
        /// Description of what is invalid.
        message: String,
    },

    /// A CIDR or `host:port` string could not be parsed.
    #[error("invalid format: {message}")]
    Format {
        /// Description of the malformed input.
        message: String,
    },

    /// An address index does not fit into the host range of a network.
    #[error("index {index} is out of range for a network of {size} addresses")]
    Range {
        /// The requested index.
        index: i64,
        /// Number of addresses in the network.
        size: u64,
    },

    /// The key primitive rejected the derived key material.
    #[error("key derivation failed: {message}")]
    Derivation {
        /// Description of the rejected input.
        message: String,
    },
}

impl WgPrngError {
    /// Creates a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        WgPrngError::Validation {
            message: message.into(),
        }
    }

    /// Creates a Format error.
    pub fn format(message: impl Into<String>) -> Self {
        WgPrngError::Format {
            message: message.into(),
        }
    }

    /// Creates a Range error for `index` within a network of `size` addresses.
    pub fn range(index: i64, size: u64) -> Self {
        WgPrngError::Range { index, size }
    }

    /// Creates a Derivation error.
    pub fn derivation(message: impl Into<String>) -> Self {
        WgPrngError::Derivation {
            message: message.into(),
        }
    }
}

impl From<IpNetworkError> for WgPrngError {
    fn from(err: IpNetworkError) -> Self {
        WgPrngError::format(format!("invalid CIDR range: {err}"))
    }
}
