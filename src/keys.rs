//! # Key Material and the NUMS Internal Key
//!
//! Wrappers around secp256k1 key material as the engine consumes it:
//! x-only public keys (with the matching secret key where the caller holds
//! it) and the fixed NUMS point used as the Taproot internal key for every
//! escrow and collateral output.

use crate::error::{CryptoError, EscrowResult, ValidationError};
use bitcoin::secp256k1::{
    Keypair, PublicKey as Secp256k1PublicKey, Secp256k1, SecretKey, Signing, XOnlyPublicKey,
};
use rand::rngs::OsRng;
use std::str::FromStr;

/// The fixed NUMS (Nothing-Up-My-Sleeve) internal key, x-only.
///
/// This point has no known discrete logarithm, so a key-path spend of any
/// output tweaked from it is impossible: every spend must reveal a script
/// leaf. The engine deliberately exposes no signing operation for this key.
///
/// The constant is a protocol compatibility anchor — swapping it for any
/// other NUMS point changes every derived address.
const NUMS_X_ONLY: [u8; 32] = [
    0x50, 0x92, 0x9b, 0x74, 0xc1, 0xa0, 0x49, 0x54, 0xb7, 0x8b, 0x4b, 0x60, 0xc5, 0x95, 0xc2,
    0x11, 0xf8, 0xb8, 0x53, 0xe6, 0xe8, 0x4b, 0xfa, 0x2b, 0xe9, 0x57, 0x12, 0xa7, 0xb0, 0xdd,
    0x59, 0xe6,
];

/// Returns the NUMS internal key.
///
/// Fails only if the embedded constant is not a valid x coordinate, which
/// would mean the binary itself is corrupt.
pub fn nums_point() -> EscrowResult<XOnlyPublicKey> {
    XOnlyPublicKey::from_slice(&NUMS_X_ONLY).map_err(|e| {
        ValidationError::InvalidPublicKey {
            field: "nums_internal_key",
            message: e.to_string(),
        }
        .into()
    })
}

/// A public key, optionally paired with its secret key.
///
/// Signing roles (borrower, lender) each hold one of these; verification
/// sites only ever need the x-only public half.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    x_only: XOnlyPublicKey,
    secret: Option<SecretKey>,
}

impl KeyMaterial {
    /// Parse a public-only key from hex: either a 33-byte compressed key
    /// (66 hex chars) or a 32-byte x-only key (64 hex chars).
    pub fn from_public_hex(hex_key: &str) -> Result<Self, ValidationError> {
        let x_only = parse_x_only(hex_key, "public_key")?;
        Ok(Self {
            x_only,
            secret: None,
        })
    }

    /// Parse a key pair from a 32-byte hex secret key.
    pub fn from_secret_hex(hex_key: &str) -> Result<Self, ValidationError> {
        let secret =
            SecretKey::from_str(hex_key).map_err(|e| ValidationError::InvalidSecretKey {
                message: e.to_string(),
            })?;
        Ok(Self::from_secret_key(&Secp256k1::new(), secret))
    }

    /// Build key material from an existing secret key.
    pub fn from_secret_key<C: Signing>(secp: &Secp256k1<C>, secret: SecretKey) -> Self {
        let pubkey = Secp256k1PublicKey::from_secret_key(secp, &secret);
        Self {
            x_only: XOnlyPublicKey::from(pubkey),
            secret: Some(secret),
        }
    }

    /// Generate a fresh key pair from the operating system RNG.
    pub fn generate() -> Self {
        let secret = SecretKey::new(&mut OsRng);
        Self::from_secret_key(&Secp256k1::new(), secret)
    }

    /// The x-only public key (BIP340 form, 32 bytes).
    pub fn x_only(&self) -> XOnlyPublicKey {
        self.x_only
    }

    /// The x-only public key as lowercase hex.
    pub fn x_only_hex(&self) -> String {
        self.x_only.to_string()
    }

    /// Whether this material can sign.
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// The secret key, if held.
    pub fn secret_key(&self) -> Result<SecretKey, CryptoError> {
        self.secret.ok_or(CryptoError::MissingSecretKey)
    }

    /// A signing keypair for Schnorr operations.
    pub fn keypair<C: Signing>(&self, secp: &Secp256k1<C>) -> Result<Keypair, CryptoError> {
        let secret = self.secret_key()?;
        Ok(Keypair::from_secret_key(secp, &secret))
    }
}

/// The two participant keys of one loan. Both x-only, always distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyPair {
    pub borrower: XOnlyPublicKey,
    pub lender: XOnlyPublicKey,
}

impl PublicKeyPair {
    /// Pair two participant keys, rejecting equal keys.
    pub fn new(
        borrower: XOnlyPublicKey,
        lender: XOnlyPublicKey,
    ) -> Result<Self, ValidationError> {
        if borrower == lender {
            return Err(ValidationError::DuplicateKeys);
        }
        Ok(Self { borrower, lender })
    }

    /// Parse a pair from hex-encoded keys (compressed or x-only form).
    pub fn from_hex(borrower_hex: &str, lender_hex: &str) -> Result<Self, ValidationError> {
        let borrower = parse_x_only(borrower_hex, "borrower_pubkey")?;
        let lender = parse_x_only(lender_hex, "lender_pubkey")?;
        Self::new(borrower, lender)
    }
}

fn parse_x_only(hex_key: &str, field: &'static str) -> Result<XOnlyPublicKey, ValidationError> {
    match hex_key.len() {
        64 => XOnlyPublicKey::from_str(hex_key).map_err(|e| ValidationError::InvalidPublicKey {
            field,
            message: e.to_string(),
        }),
        66 => {
            let full = Secp256k1PublicKey::from_str(hex_key).map_err(|e| {
                ValidationError::InvalidPublicKey {
                    field,
                    message: e.to_string(),
                }
            })?;
            Ok(XOnlyPublicKey::from(full))
        }
        other => Err(ValidationError::InvalidPublicKey {
            field,
            message: format!("expected 64 or 66 hex chars, got {}", other),
        }),
    }
}
