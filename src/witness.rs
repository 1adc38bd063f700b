//! # Witness Assembly
//!
//! Builds the final witness stacks for the two spending paths and attaches
//! them to a pre-built transaction:
//!
//! - CSV escape: `[signature, leaf_script, control_block]`
//! - Hashlock multisig: `[sig_a, sig_b, preimage, leaf_script,
//!   control_block]`
//!
//! The hashlock assembler is the point where secret disclosure is
//! enforced: it refuses to assemble unless both signatures are present and
//! the preimage hashes to the leaf's commitment, so a counterparty cannot
//! complete the cooperative spend before the secret is revealed.

use crate::error::{ConstructionError, CryptoError, EscrowResult};
use crate::scripts::LeafScript;
use crate::signing::SignerRole;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::taproot::{ControlBlock, Signature};
use bitcoin::{Transaction, Witness};
use log::debug;
use sha2::{Digest, Sha256};

/// An ordered witness stack, ready to attach to the sole input of a
/// pre-built transaction.
#[derive(Debug, Clone)]
pub struct WitnessBundle {
    stack: Vec<Vec<u8>>,
}

impl WitnessBundle {
    /// The stack elements, bottom first.
    pub fn stack(&self) -> &[Vec<u8>] {
        &self.stack
    }

    /// Convert into a consensus witness.
    pub fn to_witness(&self) -> Witness {
        let mut witness = Witness::new();
        for element in &self.stack {
            witness.push(element);
        }
        witness
    }
}

/// Assemble the single-signature witness for a CSV escape spend.
pub fn assemble_csv_witness(
    signature: &Signature,
    leaf: &LeafScript,
    control_block: &ControlBlock,
) -> EscrowResult<WitnessBundle> {
    match leaf {
        LeafScript::CsvEscape { .. } => Ok(WitnessBundle {
            stack: vec![
                signature.to_vec(),
                leaf.script().to_bytes(),
                control_block.serialize(),
            ],
        }),
        LeafScript::HashlockMultisig { .. } => Err(ConstructionError::leaf_mismatch(
            "csv witness offered to a hashlock_multisig leaf",
        )
        .into()),
    }
}

/// Assemble the two-signature, preimage-bearing witness for a hashlock
/// multisig spend.
///
/// `borrower_key` resolves which signature satisfies which key slot of the
/// leaf; the stack always carries the `OP_CHECKSIGADD` signature below the
/// `OP_CHECKSIG` one. Fails before any assembly if the preimage does not
/// hash to the leaf's commitment or if either signature is absent.
pub fn assemble_hashlock_witness(
    sig_borrower: Option<&Signature>,
    sig_lender: Option<&Signature>,
    preimage: &[u8],
    leaf: &LeafScript,
    control_block: &ControlBlock,
    borrower_key: &XOnlyPublicKey,
) -> EscrowResult<WitnessBundle> {
    let (hash, key_a, key_b) = match leaf {
        LeafScript::HashlockMultisig { hash, key_a, key_b } => (hash, key_a, key_b),
        LeafScript::CsvEscape { .. } => {
            return Err(ConstructionError::leaf_mismatch(
                "hashlock witness offered to a csv_escape leaf",
            )
            .into())
        }
    };

    let actual: [u8; 32] = Sha256::digest(preimage).into();
    if actual != *hash {
        debug!("preimage rejected: does not hash to leaf commitment");
        return Err(CryptoError::PreimageMismatch {
            expected: hex::encode(hash),
            actual: hex::encode(actual),
        }
        .into());
    }

    let sig_borrower = sig_borrower.ok_or(CryptoError::MissingSignature {
        role: SignerRole::Borrower.as_str(),
    })?;
    let sig_lender = sig_lender.ok_or(CryptoError::MissingSignature {
        role: SignerRole::Lender.as_str(),
    })?;

    // Stack order follows the leaf's key slots: key_a is consumed by
    // OP_CHECKSIGADD (bottom signature), key_b by OP_CHECKSIG.
    let (sig_a, sig_b) = if key_a == borrower_key {
        (sig_borrower, sig_lender)
    } else if key_b == borrower_key {
        (sig_lender, sig_borrower)
    } else {
        return Err(ConstructionError::leaf_mismatch(
            "borrower key does not occupy either slot of the hashlock leaf",
        )
        .into());
    };

    Ok(WitnessBundle {
        stack: vec![
            sig_a.to_vec(),
            sig_b.to_vec(),
            preimage.to_vec(),
            leaf.script().to_bytes(),
            control_block.serialize(),
        ],
    })
}

/// Attach a witness bundle to the sole input of a transaction.
pub fn attach(mut tx: Transaction, bundle: &WitnessBundle) -> EscrowResult<Transaction> {
    if tx.input.len() != 1 {
        return Err(ConstructionError::encoding(format!(
            "expected a single input, found {}",
            tx.input.len()
        ))
        .into());
    }
    tx.input[0].witness = bundle.to_witness();
    Ok(tx)
}

/// Attach a witness bundle and serialize to wire-format hex, ready for
/// broadcast by an external network client.
pub fn finalize(tx: Transaction, bundle: &WitnessBundle) -> EscrowResult<String> {
    let finalized = attach(tx, bundle)?;
    Ok(serialize_hex(&finalized))
}
