//! # Error Types for the Loanlock Engine
//!
//! Three error families cover every failure mode of the construction core:
//! caller mistakes ([`ValidationError`]), cryptographic failures
//! ([`CryptoError`]), and transaction-assembly failures
//! ([`ConstructionError`]). None of them is ever retried internally; the
//! engine performs no I/O, so transient-failure handling belongs to callers.

use thiserror::Error;

/// Malformed caller input. Never retried; the offending field is named.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A public key field could not be parsed (wrong length or not a point)
    #[error("invalid public key in {field}: {message}")]
    InvalidPublicKey { field: &'static str, message: String },

    /// A secret key field could not be parsed
    #[error("invalid secret key: {message}")]
    InvalidSecretKey { message: String },

    /// Borrower and lender keys must differ
    #[error("borrower and lender public keys must be distinct")]
    DuplicateKeys,

    /// Relative timelock outside the 16-bit BIP68 height encoding
    #[error("invalid timelock {value}: must be between 1 and 65535 blocks")]
    InvalidTimelock { value: u32 },

    /// Hash commitment is not a 32-byte SHA-256 digest
    #[error("invalid hash commitment: expected 32 bytes, got {actual}")]
    InvalidHash { actual: usize },

    /// A hex-encoded field could not be decoded
    #[error("invalid hex in {field}: {message}")]
    InvalidHex { field: &'static str, message: String },

    /// Transaction id is not 64 hex characters
    #[error("invalid transaction id {txid}: {message}")]
    InvalidTxid { txid: String, message: String },

    /// A script tree has exactly two leaves; any other index is a mistake
    #[error("leaf index {index} out of range: tree has exactly two leaves")]
    InvalidLeafIndex { index: usize },

    /// An interchange record contradicts the loan parameters it claims
    #[error("interchange record mismatch in {field}: {message}")]
    RecordMismatch { field: &'static str, message: String },
}

/// Signature and preimage failures. Terminal for the operation, never
/// silently ignored.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A required signature was not supplied to the witness assembler
    #[error("{role} signature missing from witness")]
    MissingSignature { role: &'static str },

    /// Revealed preimage does not hash to the committed value
    #[error("preimage mismatch: committed hash {expected}, preimage hashes to {actual}")]
    PreimageMismatch { expected: String, actual: String },

    /// A signature failed verification against its digest and key
    #[error("signature verification failed for {role}")]
    VerificationFailed { role: &'static str },

    /// Schnorr signing could not complete
    #[error("signing failed: {message}")]
    Signing { message: String },

    /// Key material holds no secret key but one was required
    #[error("secret key unavailable for this key material")]
    MissingSecretKey,
}

/// Transaction-assembly failures: amounts that do not add up, taproot
/// trees that will not finalize, witnesses that do not fit their leaf.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// Input value cannot cover the declared outputs plus the relay floor
    #[error("insufficient amount: input {input} sat cannot cover {required} sat (short {shortfall} sat)")]
    InsufficientAmount {
        input: u64,
        required: u64,
        shortfall: u64,
    },

    /// An output would be created at or below the dust floor
    #[error("output of {amount} sat is at or below the {limit} sat dust floor")]
    DustOutput { amount: u64, limit: u64 },

    /// Taproot tree or control-block assembly failed
    #[error("taproot assembly failed: {message}")]
    Taproot { message: String },

    /// BIP341 sighash computation failed
    #[error("sighash computation failed: {message}")]
    Sighash { message: String },

    /// Witness parts were offered to a leaf of the wrong kind
    #[error("witness does not fit leaf: {message}")]
    LeafMismatch { message: String },

    /// Consensus encoding or decoding of a transaction failed
    #[error("transaction encoding failed: {message}")]
    Encoding { message: String },
}

/// Top-level error type for all engine operations
#[derive(Debug, Error)]
pub enum EscrowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// File I/O while saving or loading an interchange record
    #[error("file operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization of an interchange record
    #[error("JSON processing error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for engine operations
pub type EscrowResult<T> = Result<T, EscrowError>;

impl ValidationError {
    /// Create an invalid-hex error for a named field
    pub fn hex(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidHex {
            field,
            message: message.into(),
        }
    }

    /// Create a record-mismatch error for a named field
    pub fn record(field: &'static str, message: impl Into<String>) -> Self {
        Self::RecordMismatch {
            field,
            message: message.into(),
        }
    }
}

impl ConstructionError {
    /// Create a taproot assembly error with a message
    pub fn taproot(message: impl Into<String>) -> Self {
        Self::Taproot {
            message: message.into(),
        }
    }

    /// Create an encoding error with a message
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a leaf-mismatch error with a message
    pub fn leaf_mismatch(message: impl Into<String>) -> Self {
        Self::LeafMismatch {
            message: message.into(),
        }
    }
}

impl EscrowError {
    /// Check whether this error is a caller mistake (bad parameters,
    /// malformed records) rather than an engine-side failure
    pub fn is_caller_mistake(&self) -> bool {
        matches!(self, EscrowError::Validation { .. })
    }

    /// Check whether this error is terminal for the operation: no amount
    /// of retrying with the same inputs can succeed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EscrowError::Validation { .. }
                | EscrowError::Crypto { .. }
                | EscrowError::Construction { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let hex_err = ValidationError::hex("borrower_pubkey", "odd length");
        assert!(matches!(hex_err, ValidationError::InvalidHex { .. }));

        let taproot_err = ConstructionError::taproot("tree incomplete");
        assert!(matches!(taproot_err, ConstructionError::Taproot { .. }));
    }

    #[test]
    fn test_error_classification() {
        let validation: EscrowError = ValidationError::DuplicateKeys.into();
        assert!(validation.is_caller_mistake());
        assert!(validation.is_terminal());

        let crypto: EscrowError = CryptoError::MissingSecretKey.into();
        assert!(!crypto.is_caller_mistake());
        assert!(crypto.is_terminal());

        let io: EscrowError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(!io.is_terminal());
    }

    #[test]
    fn test_shortfall_message_names_amounts() {
        let err = ConstructionError::InsufficientAmount {
            input: 1_000,
            required: 1_500,
            shortfall: 500,
        };
        let message = err.to_string();
        assert!(message.contains("1000"));
        assert!(message.contains("1500"));
        assert!(message.contains("500"));
    }
}
