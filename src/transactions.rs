//! # Unsigned Transaction Construction
//!
//! Builders for the three transactions of a loan's Bitcoin lifecycle:
//!
//! 1. **Escrow funding**: an arbitrary funding input paying the escrow
//!    P2TR output.
//! 2. **Collateral lock**: spends the escrow output into the collateral
//!    P2TR output, optionally splitting off an origination-fee output for
//!    the lender.
//! 3. **Release**: spends the collateral output to a single destination
//!    (borrower on repayment, lender on default).
//!
//! All transactions are version 2 with zero locktime; the input sequence
//! carries the spending intent. The two leaves of an output share the
//! input but not a required sequence: the CSV leaf needs its encoded
//! relative height (BIP68), the hashlock leaf the final sequence
//! `0xFFFFFFFE`. Both spend variants may be pre-built from the same
//! output, but only one ever confirms — the other is void once the shared
//! UTXO is spent.

use crate::config::protocol::{MIN_RELAY_FEE_SATS, P2TR_DUST_SATS};
use crate::error::{ConstructionError, EscrowResult};
use crate::scripts::{LeafScript, LEAF_INDEX_CSV, LEAF_INDEX_HASHLOCK};
use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use log::debug;

/// The caller's declaration of which leaf a pre-built spend targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafIntent {
    /// Spend through the CSV escape leaf once the timelock matures
    CsvEscape,
    /// Spend through the cooperative hashlock multisig leaf
    HashlockMultisig,
}

impl LeafIntent {
    /// Protocol index of the intended leaf within its script tree.
    pub fn leaf_index(&self) -> usize {
        match self {
            LeafIntent::CsvEscape => LEAF_INDEX_CSV,
            LeafIntent::HashlockMultisig => LEAF_INDEX_HASHLOCK,
        }
    }
}

/// Build the escrow funding transaction: one designated input, one P2TR
/// output paying the escrow tree.
///
/// The input is left unsigned; the borrower's wallet signs it with
/// whatever key controls the funding UTXO. Rejects amounts at or below
/// the P2TR dust floor.
pub fn build_escrow_tx(
    funding_ref: OutPoint,
    amount: Amount,
    escrow_script_pubkey: ScriptBuf,
) -> EscrowResult<Transaction> {
    check_above_dust(amount)?;

    debug!(
        "building escrow tx: {} sat from {} to escrow output",
        amount.to_sat(),
        funding_ref
    );

    Ok(Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: funding_ref,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: amount,
            script_pubkey: escrow_script_pubkey,
        }],
    })
}

/// Build the escrow-to-collateral transaction.
///
/// The sole input references the escrow output; its sequence encodes the
/// requirement of `spend_leaf`. Outputs are the collateral output at
/// vout 0 and, when present, the lender's origination-fee output at
/// vout 1. Whatever the escrow amount leaves above the declared outputs
/// is consumed as the mining fee.
///
/// Fails with the computed shortfall when the escrow amount does not
/// cover `collateral + origination fee + relay floor`.
pub fn build_collateral_tx(
    escrow_ref: OutPoint,
    escrow_amount: Amount,
    collateral_amount: Amount,
    collateral_script_pubkey: ScriptBuf,
    origination_fee: Option<(Amount, ScriptBuf)>,
    spend_leaf: &LeafScript,
) -> EscrowResult<Transaction> {
    check_above_dust(collateral_amount)?;

    let fee_sats = match &origination_fee {
        Some((fee, _)) => {
            check_above_dust(*fee)?;
            fee.to_sat()
        }
        None => 0,
    };

    let required = collateral_amount
        .to_sat()
        .checked_add(fee_sats)
        .and_then(|sum| sum.checked_add(MIN_RELAY_FEE_SATS))
        .unwrap_or(u64::MAX);
    if escrow_amount.to_sat() < required {
        return Err(ConstructionError::InsufficientAmount {
            input: escrow_amount.to_sat(),
            required,
            shortfall: required - escrow_amount.to_sat(),
        }
        .into());
    }

    let mut output = vec![TxOut {
        value: collateral_amount,
        script_pubkey: collateral_script_pubkey,
    }];
    if let Some((fee, script_pubkey)) = origination_fee {
        output.push(TxOut {
            value: fee,
            script_pubkey,
        });
    }

    debug!(
        "building collateral tx via {} leaf: {} sat escrow -> {} sat collateral + {} sat fee output",
        spend_leaf.kind(),
        escrow_amount.to_sat(),
        collateral_amount.to_sat(),
        fee_sats
    );

    Ok(Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: escrow_ref,
            script_sig: ScriptBuf::new(),
            sequence: spend_leaf.required_sequence(),
            witness: Witness::new(),
        }],
        output,
    })
}

/// Build a collateral release transaction: the collateral output spent in
/// full, minus `tx_fee`, to a single destination.
///
/// Used for both terminal outcomes — the lender claiming after a default
/// through the CSV leaf, or the borrower reclaiming on repayment through
/// the hashlock leaf.
pub fn build_release_tx(
    collateral_ref: OutPoint,
    collateral_amount: Amount,
    destination_script_pubkey: ScriptBuf,
    tx_fee: Amount,
    spend_leaf: &LeafScript,
) -> EscrowResult<Transaction> {
    let release_sats = collateral_amount
        .to_sat()
        .checked_sub(tx_fee.to_sat())
        .ok_or_else(|| ConstructionError::InsufficientAmount {
            input: collateral_amount.to_sat(),
            required: tx_fee.to_sat(),
            shortfall: tx_fee.to_sat() - collateral_amount.to_sat(),
        })?;
    let release = Amount::from_sat(release_sats);
    check_above_dust(release)?;

    debug!(
        "building release tx via {} leaf: {} sat collateral -> {} sat after {} sat fee",
        spend_leaf.kind(),
        collateral_amount.to_sat(),
        release_sats,
        tx_fee.to_sat()
    );

    Ok(Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: collateral_ref,
            script_sig: ScriptBuf::new(),
            sequence: spend_leaf.required_sequence(),
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: release,
            script_pubkey: destination_script_pubkey,
        }],
    })
}

fn check_above_dust(amount: Amount) -> Result<(), ConstructionError> {
    if amount.to_sat() <= P2TR_DUST_SATS {
        return Err(ConstructionError::DustOutput {
            amount: amount.to_sat(),
            limit: P2TR_DUST_SATS,
        });
    }
    Ok(())
}
