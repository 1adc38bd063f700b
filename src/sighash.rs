//! # Script-Path Sighash Computation
//!
//! The BIP341/342 signature hash for spending a specific tapscript leaf:
//! commits to every input's amount and scriptPubKey, every output, the
//! input's sequence, and the tapleaf hash of the leaf being spent (not the
//! Merkle root), under leaf version 0xc0 and `SIGHASH_DEFAULT`.
//!
//! This is the most failure-sensitive routine in the engine: a digest that
//! differs between signing and verification sites produces signatures that
//! verify against the wrong data. Both sites therefore go through this one
//! function.

use crate::error::{ConstructionError, EscrowResult};
use crate::scripts::LeafScript;
use bitcoin::sighash::{Prevouts, SighashCache};
use bitcoin::{TapSighash, TapSighashType, Transaction, TxOut};

/// Compute the Taproot script-path sighash for one input of an unsigned
/// transaction.
///
/// `prevouts` must list the spent output of every input in order; for the
/// single-input transactions this engine builds that is one element
/// carrying the escrow (or collateral) amount and scriptPubKey.
pub fn script_spend_sighash(
    tx: &Transaction,
    input_index: usize,
    prevouts: &[TxOut],
    leaf: &LeafScript,
) -> EscrowResult<TapSighash> {
    let mut cache = SighashCache::new(tx);
    cache
        .taproot_script_spend_signature_hash(
            input_index,
            &Prevouts::All(prevouts),
            leaf.tapleaf_hash(),
            TapSighashType::Default,
        )
        .map_err(|e| ConstructionError::Sighash {
            message: e.to_string(),
        }
        .into())
}
