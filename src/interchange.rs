//! # Interchange Records
//!
//! The structured artifact one party hands the other out-of-band (file
//! transfer, messaging) to complete a witness without either party
//! learning the other's private key. A borrower produces one when
//! pre-signing the collateral lock; a lender produces one when
//! pre-signing a collateral release.
//!
//! The revealed preimage is deliberately NOT part of the record: the
//! completing party learns it from the external ledger event and supplies
//! it at witness-assembly time.

use crate::config::interchange::SIGNATURE_FILE_PREFIX;
use crate::error::EscrowResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A pre-signature handoff record.
///
/// All byte-ish fields are hex-encoded strings so the record survives any
/// JSON transport untouched; amounts are satoshis.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InterchangeRecord {
    /// The pre-signer's Schnorr signature over the spending transaction's
    /// script-path sighash (64 bytes hex; 65 with a non-default flag)
    pub signature: String,

    /// Txid of the output being spent
    pub txid: String,

    /// Output index of the output being spent
    pub vout: u32,

    /// The unsigned spending transaction, consensus-encoded (pre-witness)
    pub raw_tx: String,

    /// Value of the spent output in satoshis
    pub input_amount: u64,

    /// Protocol index of the leaf the signature authorizes
    pub leaf_index: usize,

    /// The leaf script being spent, hex-encoded
    pub tapleaf_script: String,

    /// Control block proving the leaf belongs to the spent output
    pub control_block: String,

    /// Parity of the spent output's tweaked key
    pub escrow_output_is_odd_parity: bool,

    /// Caller-assigned loan identifier
    pub loan_id: String,

    /// Borrower x-only public key, hex
    pub borrower_pubkey: String,

    /// Lender x-only public key, hex
    pub lender_pubkey: String,

    /// The SHA-256 commitment gating the hashlock leaf, hex
    pub hash_commitment: String,

    /// Relative timelock of the sibling CSV leaf, in blocks
    pub timelock: u16,

    /// Collateral output value in satoshis
    pub collateral_amount: u64,

    /// Origination-fee output value in satoshis (zero when absent)
    pub origination_fee: u64,
}

impl InterchangeRecord {
    /// Conventional filename for this record.
    pub fn default_file_name(&self) -> String {
        format!("{}{}.json", SIGNATURE_FILE_PREFIX, self.loan_id)
    }

    /// Save the record as pretty-printed JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> EscrowResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a record from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> EscrowResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let record: InterchangeRecord = serde_json::from_str(&json)?;
        Ok(record)
    }
}
