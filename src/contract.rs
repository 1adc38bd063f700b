//! # Loan Contract Operations
//!
//! The collaborator-facing surface of the engine. A [`LoanContract`] is the
//! validated parameter bundle of one loan — both participant keys, the two
//! hash commitments, the two relative timelocks, and the network — and
//! every operation is a pure function of it:
//!
//! 1. **Borrower** derives the escrow address and funds it.
//! 2. **Borrower** pre-signs the escrow→collateral transaction over the
//!    hashlock leaf, blind to the future preimage, and hands the resulting
//!    [`InterchangeRecord`] to the lender.
//! 3. **Lender** verifies the pre-signature, and — once the borrower's
//!    secret is revealed on the external ledger — adds their own signature
//!    plus the preimage and finalizes the transaction for broadcast.
//! 4. Depending on loan outcome, the collateral is released to the lender
//!    (CSV leaf, after default) or back to the borrower (hashlock leaf,
//!    against the lender's revealed secret), with the pre-signing roles
//!    reversed.
//!
//! Both outputs commit to the NUMS internal key, so no key-path spend
//! exists and this engine deliberately provides no operation to attempt
//! one.
//!
//! The engine does not track hash-commitment reuse across loans; that
//! uniqueness assumption belongs to the orchestration layer and its
//! persistent store.

use crate::error::{
    ConstructionError, CryptoError, EscrowResult, ValidationError,
};
use crate::interchange::InterchangeRecord;
use crate::keys::{KeyMaterial, PublicKeyPair};
use crate::scripts::{LeafScript, LEAF_INDEX_CSV, LEAF_INDEX_HASHLOCK};
use crate::sighash::script_spend_sighash;
use crate::signing::{self, SignerRole};
use crate::transactions::{build_collateral_tx, build_escrow_tx, build_release_tx, LeafIntent};
use crate::tree::ScriptTree;
use bitcoin::consensus::encode::{deserialize, serialize_hex};
use bitcoin::key::TweakedPublicKey;
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::{Address, Amount, Network, OutPoint, Transaction, TxOut, Txid};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Caller-supplied loan parameters, hex-encoded for transport.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LoanConfig {
    /// Bitcoin network the addresses are derived for
    pub network: Network,
    /// Borrower public key (x-only or compressed hex)
    pub borrower_pubkey: String,
    /// Lender public key (x-only or compressed hex)
    pub lender_pubkey: String,
    /// SHA-256 commitment to the borrower's secret (hex, 64 chars)
    pub preimage_hash_borrower: String,
    /// SHA-256 commitment to the lender's secret (hex, 64 chars)
    pub preimage_hash_lender: String,
    /// Borrower's escrow escape timelock in blocks
    pub borrower_timelock: u16,
    /// Lender's collateral claim timelock in blocks
    pub lender_timelock: u16,
}

/// Economic terms of the escrow→collateral transition.
#[derive(Debug, Clone)]
pub struct CollateralTerms {
    /// Txid of the funded escrow output
    pub escrow_txid: String,
    /// Output index of the funded escrow output
    pub escrow_vout: u32,
    /// Value locked in the escrow output
    pub escrow_amount: Amount,
    /// Value to lock into the collateral output
    pub collateral_amount: Amount,
    /// Up-front fee paid to the lender (zero to omit the fee output)
    pub origination_fee: Amount,
}

/// A validated loan parameter bundle with derived-address and
/// transaction-construction operations.
#[derive(Debug, Clone)]
pub struct LoanContract {
    network: Network,
    keys: PublicKeyPair,
    hash_borrower: [u8; 32],
    hash_lender: [u8; 32],
    borrower_timelock: u16,
    lender_timelock: u16,
}

impl LoanContract {
    /// Validate a [`LoanConfig`] into a contract.
    pub fn new(config: &LoanConfig) -> EscrowResult<Self> {
        let keys = PublicKeyPair::from_hex(&config.borrower_pubkey, &config.lender_pubkey)?;
        let hash_borrower = parse_commitment(&config.preimage_hash_borrower)?;
        let hash_lender = parse_commitment(&config.preimage_hash_lender)?;
        for timelock in [config.borrower_timelock, config.lender_timelock] {
            if timelock == 0 {
                return Err(ValidationError::InvalidTimelock { value: 0 }.into());
            }
        }

        Ok(Self {
            network: config.network,
            keys,
            hash_borrower,
            hash_lender,
            borrower_timelock: config.borrower_timelock,
            lender_timelock: config.lender_timelock,
        })
    }

    /// The network this contract derives addresses for.
    pub fn network(&self) -> Network {
        self.network
    }

    /// The participant key pair.
    pub fn keys(&self) -> &PublicKeyPair {
        &self.keys
    }

    /// The two escrow leaves: the borrower's CSV escape hatch, and the
    /// hashlock 2-of-2 the lender completes with the borrower's secret.
    pub fn escrow_leaves(&self) -> EscrowResult<[LeafScript; 2]> {
        Ok([
            LeafScript::csv_escape(self.keys.borrower, self.borrower_timelock as u32)?,
            LeafScript::hashlock_multisig(
                &self.hash_borrower,
                self.keys.borrower,
                self.keys.lender,
            )?,
        ])
    }

    /// The two collateral leaves: the lender's CSV claim path for a
    /// default, and the hashlock 2-of-2 the borrower completes with the
    /// lender's secret on repayment.
    pub fn collateral_leaves(&self) -> EscrowResult<[LeafScript; 2]> {
        Ok([
            LeafScript::csv_escape(self.keys.lender, self.lender_timelock as u32)?,
            LeafScript::hashlock_multisig(
                &self.hash_lender,
                self.keys.lender,
                self.keys.borrower,
            )?,
        ])
    }

    /// The escrow script tree.
    pub fn escrow_tree(&self) -> EscrowResult<ScriptTree> {
        let [csv, hashlock] = self.escrow_leaves()?;
        ScriptTree::new(csv, hashlock)
    }

    /// The collateral script tree.
    pub fn collateral_tree(&self) -> EscrowResult<ScriptTree> {
        let [csv, hashlock] = self.collateral_leaves()?;
        ScriptTree::new(csv, hashlock)
    }

    /// Bech32m address of the escrow output. Deterministic for fixed
    /// parameters.
    pub fn escrow_address(&self) -> EscrowResult<Address> {
        Ok(self.escrow_tree()?.address(self.network))
    }

    /// Bech32m address of the collateral output.
    pub fn collateral_address(&self) -> EscrowResult<Address> {
        Ok(self.collateral_tree()?.address(self.network))
    }

    /// Key-path P2TR payout address for the borrower key.
    pub fn borrower_payout_address(&self) -> Address {
        Address::p2tr_tweaked(
            TweakedPublicKey::dangerous_assume_tweaked(self.keys.borrower),
            self.network,
        )
    }

    /// Key-path P2TR payout address for the lender key. Also receives the
    /// origination fee, which is spendable by the lender independently of
    /// collateral resolution.
    pub fn lender_payout_address(&self) -> Address {
        Address::p2tr_tweaked(
            TweakedPublicKey::dangerous_assume_tweaked(self.keys.lender),
            self.network,
        )
    }

    /// Build the escrow funding transaction and serialize it to hex. The
    /// funding input stays unsigned; the borrower's wallet owns it.
    pub fn build_escrow_transaction(
        &self,
        funding_txid: &str,
        funding_vout: u32,
        amount: Amount,
    ) -> EscrowResult<String> {
        let funding_ref = parse_outpoint(funding_txid, funding_vout)?;
        let tree = self.escrow_tree()?;
        let tx = build_escrow_tx(funding_ref, amount, tree.script_pubkey(self.network))?;
        Ok(serialize_hex(&tx))
    }

    /// Build the unsigned escrow→collateral transaction for the given
    /// spending intent and serialize it to hex.
    pub fn build_collateral_transaction(
        &self,
        terms: &CollateralTerms,
        intent: LeafIntent,
    ) -> EscrowResult<String> {
        let tree = self.escrow_tree()?;
        let leaf = tree.leaf(intent.leaf_index())?.clone();
        let tx = self.collateral_lock_tx(terms, &leaf)?;
        Ok(serialize_hex(&tx))
    }

    /// Borrower's half of the cooperative escrow spend: build the
    /// collateral-lock transaction over the hashlock leaf, sign its
    /// script-path sighash, and pack everything the lender needs into an
    /// interchange record.
    ///
    /// The borrower signs blind to the future preimage — the record never
    /// carries the secret.
    pub fn sign_as_borrower(
        &self,
        borrower: &KeyMaterial,
        terms: &CollateralTerms,
        loan_id: &str,
    ) -> EscrowResult<InterchangeRecord> {
        self.require_key(borrower, SignerRole::Borrower)?;

        let tree = self.escrow_tree()?;
        let leaf = tree.leaf(LEAF_INDEX_HASHLOCK)?.clone();
        let tx = self.collateral_lock_tx(terms, &leaf)?;

        let prevout = TxOut {
            value: terms.escrow_amount,
            script_pubkey: tree.script_pubkey(self.network),
        };
        let sighash = script_spend_sighash(&tx, 0, std::slice::from_ref(&prevout), &leaf)?;
        let signature = signing::sign(&borrower.secret_key()?, sighash)?;

        let control_block = tree.control_block(LEAF_INDEX_HASHLOCK)?;
        let output = tree.output()?;

        info!(
            "borrower pre-signed collateral lock for loan {} over {} leaf",
            loan_id,
            leaf.kind()
        );

        Ok(InterchangeRecord {
            signature: hex::encode(signature.to_vec()),
            txid: terms.escrow_txid.clone(),
            vout: terms.escrow_vout,
            raw_tx: serialize_hex(&tx),
            input_amount: terms.escrow_amount.to_sat(),
            leaf_index: LEAF_INDEX_HASHLOCK,
            tapleaf_script: hex::encode(leaf.script().to_bytes()),
            control_block: hex::encode(control_block.serialize()),
            escrow_output_is_odd_parity: output.is_odd_parity(),
            loan_id: loan_id.to_string(),
            borrower_pubkey: self.keys.borrower.to_string(),
            lender_pubkey: self.keys.lender.to_string(),
            hash_commitment: hex::encode(self.hash_borrower),
            timelock: self.borrower_timelock,
            collateral_amount: terms.collateral_amount.to_sat(),
            origination_fee: terms.origination_fee.to_sat(),
        })
    }

    /// Check a pre-signature record against this contract's parameters
    /// and the given signer key.
    ///
    /// Total: any malformed or mismatched record yields `false`, never an
    /// error, since records arrive from untrusted files.
    pub fn verify_borrower_signature(
        &self,
        record: &InterchangeRecord,
        pubkey: &XOnlyPublicKey,
    ) -> bool {
        let tree = match self.escrow_tree() {
            Ok(tree) => tree,
            Err(_) => return false,
        };
        match self.recover_sighash(&tree, record) {
            Ok((sighash, _)) => {
                let signature = match signing::signature_from_hex(&record.signature) {
                    Some(signature) => signature,
                    None => return false,
                };
                signing::verify(pubkey, sighash, &signature)
            }
            Err(e) => {
                debug!("pre-signature record rejected: {}", e);
                false
            }
        }
    }

    /// Lender's half of the cooperative escrow spend: given the
    /// borrower's record and the secret revealed on the external ledger,
    /// verify the pre-signature, counter-sign, assemble the full witness
    /// and serialize the broadcast-ready transaction.
    ///
    /// Fails with `PreimageMismatch` — producing no transaction — when the
    /// revealed preimage does not hash to the escrow commitment.
    pub fn complete_witness_as_lender(
        &self,
        record: &InterchangeRecord,
        lender: &KeyMaterial,
        revealed_preimage: &[u8],
    ) -> EscrowResult<String> {
        self.require_key(lender, SignerRole::Lender)?;
        let tree = self.escrow_tree()?;
        self.complete_hashlock_spend(
            &tree,
            record,
            &self.keys.borrower,
            SignerRole::Borrower,
            lender,
            revealed_preimage,
        )
    }

    /// Borrower's unilateral escrow exit once the escape timelock has
    /// matured: spends the escrow CSV leaf back to the borrower's payout
    /// address with only the borrower's signature.
    pub fn build_borrower_exit_transaction(
        &self,
        borrower: &KeyMaterial,
        escrow_txid: &str,
        escrow_vout: u32,
        escrow_amount: Amount,
        tx_fee: Amount,
    ) -> EscrowResult<String> {
        self.require_key(borrower, SignerRole::Borrower)?;
        let tree = self.escrow_tree()?;
        self.csv_spend(
            &tree,
            borrower,
            escrow_txid,
            escrow_vout,
            escrow_amount,
            tx_fee,
            self.borrower_payout_address(),
        )
    }

    /// Lender's collateral claim after a default: spends the collateral
    /// CSV leaf to the lender's payout address once the claim timelock has
    /// matured.
    pub fn release_collateral_to_lender(
        &self,
        lender: &KeyMaterial,
        collateral_txid: &str,
        collateral_vout: u32,
        collateral_amount: Amount,
        tx_fee: Amount,
    ) -> EscrowResult<String> {
        self.require_key(lender, SignerRole::Lender)?;
        let tree = self.collateral_tree()?;
        self.csv_spend(
            &tree,
            lender,
            collateral_txid,
            collateral_vout,
            collateral_amount,
            tx_fee,
            self.lender_payout_address(),
        )
    }

    /// Lender's half of the repayment path: pre-sign the transaction
    /// releasing the collateral back to the borrower over the collateral
    /// hashlock leaf, blind to the lender's own future preimage reveal.
    pub fn sign_release_as_lender(
        &self,
        lender: &KeyMaterial,
        collateral_txid: &str,
        collateral_vout: u32,
        collateral_amount: Amount,
        tx_fee: Amount,
        loan_id: &str,
    ) -> EscrowResult<InterchangeRecord> {
        self.require_key(lender, SignerRole::Lender)?;

        let tree = self.collateral_tree()?;
        let leaf = tree.leaf(LEAF_INDEX_HASHLOCK)?.clone();
        let collateral_ref = parse_outpoint(collateral_txid, collateral_vout)?;
        let tx = build_release_tx(
            collateral_ref,
            collateral_amount,
            self.borrower_payout_address().script_pubkey(),
            tx_fee,
            &leaf,
        )?;

        let prevout = TxOut {
            value: collateral_amount,
            script_pubkey: tree.script_pubkey(self.network),
        };
        let sighash = script_spend_sighash(&tx, 0, std::slice::from_ref(&prevout), &leaf)?;
        let signature = signing::sign(&lender.secret_key()?, sighash)?;

        let control_block = tree.control_block(LEAF_INDEX_HASHLOCK)?;
        let output = tree.output()?;

        info!(
            "lender pre-signed collateral release for loan {} over {} leaf",
            loan_id,
            leaf.kind()
        );

        Ok(InterchangeRecord {
            signature: hex::encode(signature.to_vec()),
            txid: collateral_txid.to_string(),
            vout: collateral_vout,
            raw_tx: serialize_hex(&tx),
            input_amount: collateral_amount.to_sat(),
            leaf_index: LEAF_INDEX_HASHLOCK,
            tapleaf_script: hex::encode(leaf.script().to_bytes()),
            control_block: hex::encode(control_block.serialize()),
            escrow_output_is_odd_parity: output.is_odd_parity(),
            loan_id: loan_id.to_string(),
            borrower_pubkey: self.keys.borrower.to_string(),
            lender_pubkey: self.keys.lender.to_string(),
            hash_commitment: hex::encode(self.hash_lender),
            timelock: self.lender_timelock,
            collateral_amount: tx.output[0].value.to_sat(),
            origination_fee: 0,
        })
    }

    /// Borrower's completion of the repayment path: verify the lender's
    /// pre-signature, counter-sign, add the lender's revealed secret, and
    /// finalize the release transaction.
    pub fn complete_release_as_borrower(
        &self,
        record: &InterchangeRecord,
        borrower: &KeyMaterial,
        revealed_preimage: &[u8],
    ) -> EscrowResult<String> {
        self.require_key(borrower, SignerRole::Borrower)?;
        let tree = self.collateral_tree()?;
        self.complete_hashlock_spend(
            &tree,
            record,
            &self.keys.lender,
            SignerRole::Lender,
            borrower,
            revealed_preimage,
        )
    }

    fn collateral_lock_tx(
        &self,
        terms: &CollateralTerms,
        spend_leaf: &LeafScript,
    ) -> EscrowResult<Transaction> {
        let escrow_ref = parse_outpoint(&terms.escrow_txid, terms.escrow_vout)?;
        let collateral_tree = self.collateral_tree()?;
        let origination_fee = if terms.origination_fee == Amount::ZERO {
            None
        } else {
            Some((
                terms.origination_fee,
                self.lender_payout_address().script_pubkey(),
            ))
        };
        build_collateral_tx(
            escrow_ref,
            terms.escrow_amount,
            terms.collateral_amount,
            collateral_tree.script_pubkey(self.network),
            origination_fee,
            spend_leaf,
        )
    }

    /// Rebuild the sighash a record's transaction commits to, cross-
    /// checking every derivable field of the record against this
    /// contract's parameters on the way.
    fn recover_sighash(
        &self,
        tree: &ScriptTree,
        record: &InterchangeRecord,
    ) -> EscrowResult<(bitcoin::TapSighash, Transaction)> {
        let tx_bytes = hex::decode(&record.raw_tx)
            .map_err(|e| ValidationError::hex("raw_tx", e.to_string()))?;
        let tx: Transaction =
            deserialize(&tx_bytes).map_err(|e| ConstructionError::encoding(e.to_string()))?;

        let leaf = tree.leaf(record.leaf_index)?;
        if hex::encode(leaf.script().to_bytes()) != record.tapleaf_script {
            return Err(ValidationError::record(
                "tapleaf_script",
                "script does not match loan parameters",
            )
            .into());
        }
        let control_block = tree.control_block(record.leaf_index)?;
        if hex::encode(control_block.serialize()) != record.control_block {
            return Err(ValidationError::record(
                "control_block",
                "control block does not match loan parameters",
            )
            .into());
        }
        if tree.output()?.is_odd_parity() != record.escrow_output_is_odd_parity {
            return Err(ValidationError::record(
                "escrow_output_is_odd_parity",
                "parity flag does not match derived output",
            )
            .into());
        }

        let prevout = TxOut {
            value: Amount::from_sat(record.input_amount),
            script_pubkey: tree.script_pubkey(self.network),
        };
        let sighash = script_spend_sighash(&tx, 0, std::slice::from_ref(&prevout), leaf)?;
        Ok((sighash, tx))
    }

    fn complete_hashlock_spend(
        &self,
        tree: &ScriptTree,
        record: &InterchangeRecord,
        presigner_key: &XOnlyPublicKey,
        presigner_role: SignerRole,
        countersigner: &KeyMaterial,
        revealed_preimage: &[u8],
    ) -> EscrowResult<String> {
        let presignature = signing::signature_from_hex(&record.signature)
            .ok_or_else(|| ValidationError::hex("signature", "not a schnorr signature"))?;
        let (sighash, tx) = self.recover_sighash(tree, record)?;
        let leaf = tree.leaf(record.leaf_index)?;

        if !signing::verify(presigner_key, sighash, &presignature) {
            return Err(CryptoError::VerificationFailed {
                role: presigner_role.as_str(),
            }
            .into());
        }

        let countersignature = signing::sign(&countersigner.secret_key()?, sighash)?;
        let (sig_borrower, sig_lender) = match presigner_role {
            SignerRole::Borrower => (&presignature, &countersignature),
            SignerRole::Lender => (&countersignature, &presignature),
        };

        let control_block = tree.control_block(record.leaf_index)?;
        let bundle = crate::witness::assemble_hashlock_witness(
            Some(sig_borrower),
            Some(sig_lender),
            revealed_preimage,
            leaf,
            &control_block,
            &self.keys.borrower,
        )?;

        info!(
            "completed {} spend for loan {}",
            leaf.kind(),
            record.loan_id
        );
        crate::witness::finalize(tx, &bundle)
    }

    fn csv_spend(
        &self,
        tree: &ScriptTree,
        signer: &KeyMaterial,
        txid: &str,
        vout: u32,
        input_amount: Amount,
        tx_fee: Amount,
        destination: Address,
    ) -> EscrowResult<String> {
        let leaf = tree.leaf(LEAF_INDEX_CSV)?.clone();
        let outpoint = parse_outpoint(txid, vout)?;
        let tx = build_release_tx(
            outpoint,
            input_amount,
            destination.script_pubkey(),
            tx_fee,
            &leaf,
        )?;

        let prevout = TxOut {
            value: input_amount,
            script_pubkey: tree.script_pubkey(self.network),
        };
        let sighash = script_spend_sighash(&tx, 0, std::slice::from_ref(&prevout), &leaf)?;
        let signature = signing::sign(&signer.secret_key()?, sighash)?;

        let control_block = tree.control_block(LEAF_INDEX_CSV)?;
        let bundle = crate::witness::assemble_csv_witness(&signature, &leaf, &control_block)?;
        crate::witness::finalize(tx, &bundle)
    }

    fn require_key(&self, key: &KeyMaterial, role: SignerRole) -> EscrowResult<()> {
        let expected = match role {
            SignerRole::Borrower => self.keys.borrower,
            SignerRole::Lender => self.keys.lender,
        };
        if key.x_only() != expected {
            return Err(ValidationError::InvalidPublicKey {
                field: match role {
                    SignerRole::Borrower => "borrower_key",
                    SignerRole::Lender => "lender_key",
                },
                message: "key does not match loan parameters".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn parse_commitment(hex_hash: &str) -> EscrowResult<[u8; 32]> {
    let bytes = hex::decode(hex_hash)
        .map_err(|e| ValidationError::hex("preimage_hash", e.to_string()))?;
    let hash: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ValidationError::InvalidHash {
            actual: bytes.len(),
        })?;
    Ok(hash)
}

fn parse_outpoint(txid: &str, vout: u32) -> EscrowResult<OutPoint> {
    let txid = Txid::from_str(txid).map_err(|e| ValidationError::InvalidTxid {
        txid: txid.to_string(),
        message: e.to_string(),
    })?;
    Ok(OutPoint::new(txid, vout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EscrowError;
    use bitcoin::secp256k1::Secp256k1;
    use sha2::{Digest, Sha256};

    const ESCROW_TXID: &str = "1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";

    struct Harness {
        contract: LoanContract,
        config: LoanConfig,
        borrower: KeyMaterial,
        lender: KeyMaterial,
        preimage_borrower: &'static [u8],
        preimage_lender: &'static [u8],
    }

    fn harness() -> Harness {
        let borrower = KeyMaterial::generate();
        let lender = KeyMaterial::generate();
        let preimage_borrower: &'static [u8] = b"secret";
        let preimage_lender: &'static [u8] = b"repaid";

        let config = LoanConfig {
            network: Network::Regtest,
            borrower_pubkey: borrower.x_only_hex(),
            lender_pubkey: lender.x_only_hex(),
            preimage_hash_borrower: hex::encode::<[u8; 32]>(
                Sha256::digest(preimage_borrower).into(),
            ),
            preimage_hash_lender: hex::encode::<[u8; 32]>(
                Sha256::digest(preimage_lender).into(),
            ),
            borrower_timelock: 100,
            lender_timelock: 144,
        };
        let contract = LoanContract::new(&config).unwrap();

        Harness {
            contract,
            config,
            borrower,
            lender,
            preimage_borrower,
            preimage_lender,
        }
    }

    fn terms() -> CollateralTerms {
        CollateralTerms {
            escrow_txid: ESCROW_TXID.to_string(),
            escrow_vout: 0,
            escrow_amount: Amount::from_sat(1_110_000), // 0.0111 BTC
            collateral_amount: Amount::from_sat(1_000_000), // 0.01 BTC
            origination_fee: Amount::from_sat(10_000),  // 0.0001 BTC
        }
    }

    #[test]
    fn test_config_validation() {
        let h = harness();

        let mut same_keys = h.config.clone();
        same_keys.lender_pubkey = same_keys.borrower_pubkey.clone();
        assert!(matches!(
            LoanContract::new(&same_keys),
            Err(EscrowError::Validation(ValidationError::DuplicateKeys))
        ));

        let mut short_hash = h.config.clone();
        short_hash.preimage_hash_borrower = "abcd".to_string();
        assert!(matches!(
            LoanContract::new(&short_hash),
            Err(EscrowError::Validation(ValidationError::InvalidHash { actual: 2 }))
        ));

        let mut zero_timelock = h.config.clone();
        zero_timelock.borrower_timelock = 0;
        assert!(matches!(
            LoanContract::new(&zero_timelock),
            Err(EscrowError::Validation(ValidationError::InvalidTimelock { .. }))
        ));
    }

    #[test]
    fn test_escrow_address_deterministic_and_timelock_sensitive() {
        let h = harness();

        let first = h.contract.escrow_address().unwrap();
        let second = h.contract.escrow_address().unwrap();
        assert_eq!(first, second);
        assert!(first.to_string().starts_with("bcrt1p"));

        let mut bumped = h.config.clone();
        bumped.borrower_timelock = 101;
        let other = LoanContract::new(&bumped).unwrap();
        assert_ne!(other.escrow_address().unwrap(), first);
        // the collateral side does not depend on the borrower timelock
        assert_eq!(
            other.collateral_address().unwrap(),
            h.contract.collateral_address().unwrap()
        );
    }

    #[test]
    fn test_collateral_transaction_amounts() {
        let h = harness();

        let raw = h
            .contract
            .build_collateral_transaction(&terms(), LeafIntent::HashlockMultisig)
            .unwrap();
        let tx: Transaction =
            deserialize(&hex::decode(raw).unwrap()).unwrap();

        assert_eq!(tx.output.len(), 2);
        let total_out: u64 = tx.output.iter().map(|o| o.value.to_sat()).sum();
        assert!(total_out < terms().escrow_amount.to_sat());
        assert_eq!(tx.output[0].value.to_sat(), 1_000_000);
        assert_eq!(
            tx.output[0].script_pubkey,
            h.contract
                .collateral_address()
                .unwrap()
                .script_pubkey()
        );
        assert_eq!(
            tx.output[1].script_pubkey,
            h.contract.lender_payout_address().script_pubkey()
        );

        let mut short = terms();
        short.collateral_amount = Amount::from_sat(1_105_000);
        assert!(matches!(
            h.contract
                .build_collateral_transaction(&short, LeafIntent::HashlockMultisig),
            Err(EscrowError::Construction(
                ConstructionError::InsufficientAmount { .. }
            ))
        ));
    }

    #[test]
    fn test_collateral_transaction_sequence_tracks_intent() {
        let h = harness();

        let csv_raw = h
            .contract
            .build_collateral_transaction(&terms(), LeafIntent::CsvEscape)
            .unwrap();
        let csv_tx: Transaction = deserialize(&hex::decode(csv_raw).unwrap()).unwrap();
        assert_eq!(
            csv_tx.input[0].sequence,
            bitcoin::Sequence::from_height(100)
        );

        let coop_raw = h
            .contract
            .build_collateral_transaction(&terms(), LeafIntent::HashlockMultisig)
            .unwrap();
        let coop_tx: Transaction = deserialize(&hex::decode(coop_raw).unwrap()).unwrap();
        assert_eq!(
            coop_tx.input[0].sequence,
            bitcoin::Sequence::ENABLE_LOCKTIME_NO_RBF
        );
    }

    #[test]
    fn test_borrower_sign_lender_complete_round_trip() {
        let h = harness();

        let record = h
            .contract
            .sign_as_borrower(&h.borrower, &terms(), "loan-1")
            .unwrap();
        assert_eq!(record.leaf_index, LEAF_INDEX_HASHLOCK);
        assert!(h
            .contract
            .verify_borrower_signature(&record, &h.borrower.x_only()));

        let raw = h
            .contract
            .complete_witness_as_lender(&record, &h.lender, h.preimage_borrower)
            .unwrap();
        let tx: Transaction = deserialize(&hex::decode(raw).unwrap()).unwrap();

        // full script-path witness: two signatures, preimage, script,
        // control block
        let witness = &tx.input[0].witness;
        assert_eq!(witness.len(), 5);
        assert_eq!(witness[2], *h.preimage_borrower);

        // the revealed leaf and control block prove membership in the
        // escrow output's tree
        let tree = h.contract.escrow_tree().unwrap();
        let leaf = tree.leaf(LEAF_INDEX_HASHLOCK).unwrap();
        assert_eq!(witness[3], *leaf.script().as_bytes());
        let control_block = bitcoin::taproot::ControlBlock::decode(&witness[4]).unwrap();
        let secp = Secp256k1::new();
        assert!(control_block.verify_taproot_commitment(
            &secp,
            tree.output().unwrap().output_key.to_x_only_public_key(),
            &leaf.script()
        ));

        // both signatures verify against the script-path sighash of the
        // finalized transaction
        let prevout = TxOut {
            value: terms().escrow_amount,
            script_pubkey: tree.script_pubkey(Network::Regtest),
        };
        let sighash =
            script_spend_sighash(&tx, 0, std::slice::from_ref(&prevout), leaf).unwrap();
        let sig_borrower =
            bitcoin::taproot::Signature::from_slice(&witness[0]).unwrap();
        let sig_lender = bitcoin::taproot::Signature::from_slice(&witness[1]).unwrap();
        assert!(signing::verify(&h.borrower.x_only(), sighash, &sig_borrower));
        assert!(signing::verify(&h.lender.x_only(), sighash, &sig_lender));
    }

    #[test]
    fn test_wrong_preimage_produces_no_transaction() {
        let h = harness();

        let record = h
            .contract
            .sign_as_borrower(&h.borrower, &terms(), "loan-1")
            .unwrap();
        let result =
            h.contract
                .complete_witness_as_lender(&record, &h.lender, b"not the secret");
        assert!(matches!(
            result,
            Err(EscrowError::Crypto(CryptoError::PreimageMismatch { .. }))
        ));
    }

    #[test]
    fn test_verification_rejects_tampered_records() {
        let h = harness();
        let record = h
            .contract
            .sign_as_borrower(&h.borrower, &terms(), "loan-1")
            .unwrap();

        // wrong key
        assert!(!h
            .contract
            .verify_borrower_signature(&record, &h.lender.x_only()));

        // tampered input amount changes the sighash
        let mut tampered = record.clone();
        tampered.input_amount += 1;
        assert!(!h
            .contract
            .verify_borrower_signature(&tampered, &h.borrower.x_only()));

        // tampered transaction bytes
        let mut tampered = record.clone();
        let mut raw = hex::decode(&tampered.raw_tx).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        tampered.raw_tx = hex::encode(raw);
        assert!(!h
            .contract
            .verify_borrower_signature(&tampered, &h.borrower.x_only()));

        // malformed signature hex
        let mut tampered = record.clone();
        tampered.signature = "zz".to_string();
        assert!(!h
            .contract
            .verify_borrower_signature(&tampered, &h.borrower.x_only()));

        // record claiming a different leaf script than the parameters give
        let mut tampered = record;
        tampered.leaf_index = LEAF_INDEX_CSV;
        assert!(!h
            .contract
            .verify_borrower_signature(&tampered, &h.borrower.x_only()));
    }

    #[test]
    fn test_completion_requires_matching_lender_key() {
        let h = harness();
        let record = h
            .contract
            .sign_as_borrower(&h.borrower, &terms(), "loan-1")
            .unwrap();

        let stranger = KeyMaterial::generate();
        assert!(matches!(
            h.contract
                .complete_witness_as_lender(&record, &stranger, h.preimage_borrower),
            Err(EscrowError::Validation(ValidationError::InvalidPublicKey { .. }))
        ));
    }

    #[test]
    fn test_borrower_exit_spends_csv_leaf() {
        let h = harness();

        let raw = h
            .contract
            .build_borrower_exit_transaction(
                &h.borrower,
                ESCROW_TXID,
                0,
                Amount::from_sat(1_110_000),
                Amount::from_sat(1_000),
            )
            .unwrap();
        let tx: Transaction = deserialize(&hex::decode(raw).unwrap()).unwrap();

        assert_eq!(tx.input[0].sequence, bitcoin::Sequence::from_height(100));
        assert_eq!(tx.input[0].witness.len(), 3);
        assert_eq!(tx.output.len(), 1);
        assert_eq!(tx.output[0].value.to_sat(), 1_109_000);
        assert_eq!(
            tx.output[0].script_pubkey,
            h.contract.borrower_payout_address().script_pubkey()
        );
    }

    #[test]
    fn test_collateral_release_both_outcomes() {
        let h = harness();
        let collateral_txid = ESCROW_TXID;

        // default: lender claims through the CSV leaf
        let raw = h
            .contract
            .release_collateral_to_lender(
                &h.lender,
                collateral_txid,
                0,
                Amount::from_sat(1_000_000),
                Amount::from_sat(1_000),
            )
            .unwrap();
        let tx: Transaction = deserialize(&hex::decode(raw).unwrap()).unwrap();
        assert_eq!(tx.input[0].sequence, bitcoin::Sequence::from_height(144));
        assert_eq!(
            tx.output[0].script_pubkey,
            h.contract.lender_payout_address().script_pubkey()
        );

        // repayment: lender pre-signs, borrower completes with the
        // lender's revealed secret
        let record = h
            .contract
            .sign_release_as_lender(
                &h.lender,
                collateral_txid,
                0,
                Amount::from_sat(1_000_000),
                Amount::from_sat(1_000),
                "loan-1",
            )
            .unwrap();
        let raw = h
            .contract
            .complete_release_as_borrower(&record, &h.borrower, h.preimage_lender)
            .unwrap();
        let tx: Transaction = deserialize(&hex::decode(raw).unwrap()).unwrap();
        assert_eq!(tx.input[0].witness.len(), 5);
        assert_eq!(tx.input[0].witness[2], *h.preimage_lender);
        assert_eq!(
            tx.output[0].script_pubkey,
            h.contract.borrower_payout_address().script_pubkey()
        );

        // wrong secret: no transaction
        assert!(matches!(
            h.contract
                .complete_release_as_borrower(&record, &h.borrower, b"wrong"),
            Err(EscrowError::Crypto(CryptoError::PreimageMismatch { .. }))
        ));
    }
}
