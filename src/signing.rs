//! # Schnorr Signing and Verification
//!
//! BIP340 signatures over script-path sighashes. Signing is untweaked —
//! script-path spends sign with the raw participant key, never the taproot
//! output tweak — and always draws fresh auxiliary randomness; the
//! deterministic entry point exists for fixtures and must be opted into
//! explicitly.
//!
//! Verification is total: malformed input yields `false`, never a panic or
//! an error, because signatures routinely arrive from untrusted
//! interchange files.

use crate::error::{CryptoError, EscrowResult};
use bitcoin::secp256k1::{Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};
use bitcoin::taproot::Signature;
use bitcoin::{TapSighash, TapSighashType};
use log::debug;
use std::fmt;

/// Which party produced or must produce a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerRole {
    Borrower,
    Lender,
}

impl SignerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignerRole::Borrower => "borrower",
            SignerRole::Lender => "lender",
        }
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sign a script-path sighash with fresh auxiliary randomness.
pub fn sign(secret_key: &SecretKey, sighash: TapSighash) -> EscrowResult<Signature> {
    let secp = Secp256k1::new();
    let keypair = Keypair::from_secret_key(&secp, secret_key);
    let message = Message::from_digest_slice(&sighash[..]).map_err(|e| CryptoError::Signing {
        message: e.to_string(),
    })?;
    let signature = secp.sign_schnorr(&message, &keypair);
    Ok(Signature {
        signature,
        sighash_type: TapSighashType::Default,
    })
}

/// Sign with caller-supplied auxiliary randomness.
///
/// Deterministic for fixed inputs; meant for test fixtures and
/// reproducible vectors, not for production signing.
pub fn sign_with_aux_rand(
    secret_key: &SecretKey,
    sighash: TapSighash,
    aux_rand: [u8; 32],
) -> EscrowResult<Signature> {
    let secp = Secp256k1::new();
    let keypair = Keypair::from_secret_key(&secp, secret_key);
    let message = Message::from_digest_slice(&sighash[..]).map_err(|e| CryptoError::Signing {
        message: e.to_string(),
    })?;
    let signature = secp.sign_schnorr_with_aux_rand(&message, &keypair, &aux_rand);
    Ok(Signature {
        signature,
        sighash_type: TapSighashType::Default,
    })
}

/// Verify a Schnorr signature against a sighash and an x-only key.
///
/// Returns `false` on any failure, including a malformed digest.
pub fn verify(pubkey: &XOnlyPublicKey, sighash: TapSighash, signature: &Signature) -> bool {
    let secp = Secp256k1::verification_only();
    let message = match Message::from_digest_slice(&sighash[..]) {
        Ok(message) => message,
        Err(_) => return false,
    };
    match secp.verify_schnorr(&signature.signature, &message, pubkey) {
        Ok(()) => true,
        Err(e) => {
            debug!("schnorr verification failed: {}", e);
            false
        }
    }
}

/// Parse a signature from hex (64-byte raw form, or 65 bytes with a
/// trailing sighash-type flag). Returns `None` on any malformed input.
pub fn signature_from_hex(hex_sig: &str) -> Option<Signature> {
    let bytes = hex::decode(hex_sig).ok()?;
    Signature::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyMaterial;
    use bitcoin::hashes::Hash as _;
    use sha2::{Digest, Sha256};

    fn dummy_sighash(tag: &[u8]) -> TapSighash {
        // Any fixed 32 bytes works as a digest for round-trip testing
        let digest: [u8; 32] = Sha256::digest(tag).into();
        TapSighash::from_byte_array(digest)
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let key = KeyMaterial::generate();
        let sighash = dummy_sighash(b"digest");

        let signature = sign(&key.secret_key().unwrap(), sighash).unwrap();
        assert_eq!(signature.sighash_type, TapSighashType::Default);
        assert!(verify(&key.x_only(), sighash, &signature));
    }

    #[test]
    fn test_verify_rejects_wrong_digest() {
        let key = KeyMaterial::generate();
        let signature = sign(&key.secret_key().unwrap(), dummy_sighash(b"digest")).unwrap();
        assert!(!verify(&key.x_only(), dummy_sighash(b"other"), &signature));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let key = KeyMaterial::generate();
        let other = KeyMaterial::generate();
        let sighash = dummy_sighash(b"digest");
        let signature = sign(&key.secret_key().unwrap(), sighash).unwrap();
        assert!(!verify(&other.x_only(), sighash, &signature));
    }

    #[test]
    fn test_deterministic_mode_is_reproducible() {
        let key = KeyMaterial::generate();
        let sighash = dummy_sighash(b"digest");
        let aux = [7u8; 32];

        let first = sign_with_aux_rand(&key.secret_key().unwrap(), sighash, aux).unwrap();
        let second = sign_with_aux_rand(&key.secret_key().unwrap(), sighash, aux).unwrap();
        assert_eq!(first.signature, second.signature);
        assert!(verify(&key.x_only(), sighash, &first));
    }

    #[test]
    fn test_signature_hex_round_trip() {
        let key = KeyMaterial::generate();
        let signature = sign(&key.secret_key().unwrap(), dummy_sighash(b"digest")).unwrap();

        let hex_sig = hex::encode(signature.to_vec());
        assert_eq!(hex_sig.len(), 128); // default type: 64 raw bytes, no flag
        let parsed = signature_from_hex(&hex_sig).unwrap();
        assert_eq!(parsed.signature, signature.signature);

        assert!(signature_from_hex("zz").is_none());
        assert!(signature_from_hex("abcd").is_none());
    }
}
