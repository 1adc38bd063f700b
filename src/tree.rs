//! # Taproot Tree Assembly
//!
//! Combines the two protocol leaves into a Merkle tree under the NUMS
//! internal key and derives everything a spender later needs: the tweaked
//! output key (and its parity), the bech32m address, and per-leaf control
//! blocks.
//!
//! The branch hash commits to the two tapleaf hashes in lexicographic
//! (lowest-first) order per BIP341, so swapping the leaf arguments does not
//! change the derived address. Leaf *indices* are protocol labels
//! (0 = CSV escape, 1 = hashlock multisig) and are independent of that
//! hash ordering.
//!
//! Because the internal key is the NUMS point, no key-path spend of these
//! outputs is possible and this module intentionally provides no key-path
//! signing operation.

use crate::error::{ConstructionError, EscrowResult, ValidationError};
use crate::keys::nums_point;
use crate::scripts::LeafScript;
use bitcoin::key::TweakedPublicKey;
use bitcoin::secp256k1::{Parity, Secp256k1, XOnlyPublicKey};
use bitcoin::taproot::{ControlBlock, LeafVersion, TaprootBuilder, TaprootSpendInfo};
use bitcoin::{Address, Network, ScriptBuf, TapNodeHash};

/// The derived P2TR output of a two-leaf tree.
///
/// Pure-functionally derived from `(leaves, NUMS key)`: the same inputs
/// always yield the same output key, so values of this type are safe to
/// cache by their input tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaprootOutput {
    /// The NUMS internal key the tweak was applied to
    pub internal_key: XOnlyPublicKey,
    /// Merkle root of the two-leaf script tree
    pub merkle_root: TapNodeHash,
    /// The tweaked key embedded in the scriptPubKey
    pub output_key: TweakedPublicKey,
    /// Parity of the tweaked key, needed for control blocks
    pub parity: Parity,
}

impl TaprootOutput {
    /// Whether the tweaked output key has odd parity.
    pub fn is_odd_parity(&self) -> bool {
        self.parity == Parity::Odd
    }
}

/// A two-leaf tapscript tree rooted at the NUMS internal key.
#[derive(Debug, Clone)]
pub struct ScriptTree {
    leaves: [LeafScript; 2],
    spend_info: TaprootSpendInfo,
}

impl ScriptTree {
    /// Assemble the tree from its two leaves.
    pub fn new(leaf_a: LeafScript, leaf_b: LeafScript) -> EscrowResult<Self> {
        let secp = Secp256k1::new();
        let internal_key = nums_point()?;

        let builder = TaprootBuilder::new()
            .add_leaf(1, leaf_a.script())
            .map_err(|e| ConstructionError::taproot(e.to_string()))?
            .add_leaf(1, leaf_b.script())
            .map_err(|e| ConstructionError::taproot(e.to_string()))?;

        let spend_info = builder
            .finalize(&secp, internal_key)
            .map_err(|_| ConstructionError::taproot("two-leaf tree did not finalize"))?;

        Ok(Self {
            leaves: [leaf_a, leaf_b],
            spend_info,
        })
    }

    /// Both leaves, in protocol index order.
    pub fn leaves(&self) -> &[LeafScript; 2] {
        &self.leaves
    }

    /// The leaf at a protocol index (0 or 1).
    pub fn leaf(&self, index: usize) -> EscrowResult<&LeafScript> {
        self.leaves
            .get(index)
            .ok_or_else(|| ValidationError::InvalidLeafIndex { index }.into())
    }

    /// The tweaked output this tree commits to.
    pub fn output(&self) -> EscrowResult<TaprootOutput> {
        let merkle_root = self
            .spend_info
            .merkle_root()
            .ok_or_else(|| ConstructionError::taproot("finalized tree has no merkle root"))?;
        Ok(TaprootOutput {
            internal_key: self.spend_info.internal_key(),
            merkle_root,
            output_key: self.spend_info.output_key(),
            parity: self.spend_info.output_key_parity(),
        })
    }

    /// The bech32m P2TR address for this tree on the given network.
    pub fn address(&self, network: Network) -> Address {
        Address::p2tr_tweaked(self.spend_info.output_key(), network)
    }

    /// The scriptPubKey paying this tree.
    pub fn script_pubkey(&self, network: Network) -> ScriptBuf {
        self.address(network).script_pubkey()
    }

    /// Control block proving the leaf at `index` belongs to this tree:
    /// leaf version + output parity, the NUMS internal key, and the
    /// sibling leaf's tapleaf hash.
    pub fn control_block(&self, index: usize) -> EscrowResult<ControlBlock> {
        let leaf = self.leaf(index)?;
        self.spend_info
            .control_block(&(leaf.script(), LeafVersion::TapScript))
            .ok_or_else(|| {
                ConstructionError::taproot(format!(
                    "no control block for {} leaf at index {}",
                    leaf.kind(),
                    index
                ))
                .into()
            })
    }
}
