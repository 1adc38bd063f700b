//! # Leaf Script Construction
//!
//! The two canonical tapscript leaves of the protocol, as a closed enum:
//!
//! - **CSV escape**: `<timelock> OP_CSV OP_DROP <pubkey> OP_CHECKSIG` — a
//!   unilateral exit for one party once the relative timelock matures.
//! - **Hashlock multisig**: `OP_SHA256 <hash> OP_EQUALVERIFY <pubkey_b>
//!   OP_CHECKSIG <pubkey_a> OP_CHECKSIGADD 2 OP_NUMEQUAL` — the cooperative
//!   path, gated on revealing the committed preimage plus both signatures
//!   (BIP342 CHECKSIGADD form, no legacy CHECKMULTISIG).
//!
//! Every site that serializes, hashes, or interprets a leaf matches
//! exhaustively over this enum; there is no string-typed script kind.

use crate::config::protocol::MAX_RELATIVE_TIMELOCK;
use crate::error::ValidationError;
use bitcoin::opcodes::all::*;
use bitcoin::script::Builder;
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::taproot::LeafVersion;
use bitcoin::{ScriptBuf, Sequence, TapLeafHash};

/// Stable protocol index of the CSV escape leaf within a script tree.
pub const LEAF_INDEX_CSV: usize = 0;

/// Stable protocol index of the hashlock multisig leaf within a script tree.
pub const LEAF_INDEX_HASHLOCK: usize = 1;

/// One tapscript leaf of an escrow or collateral output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafScript {
    /// Single-signature exit after a relative timelock.
    CsvEscape {
        pubkey: XOnlyPublicKey,
        timelock: u16,
    },
    /// Preimage-gated 2-of-2. The witness satisfying this leaf carries
    /// `[sig_a, sig_b, preimage]`: `key_b` is checked first by
    /// `OP_CHECKSIG`, `key_a` second by `OP_CHECKSIGADD`.
    HashlockMultisig {
        hash: [u8; 32],
        key_a: XOnlyPublicKey,
        key_b: XOnlyPublicKey,
    },
}

impl LeafScript {
    /// Build a CSV escape leaf.
    ///
    /// Rejects a zero timelock and anything above the 16-bit BIP68
    /// relative-height encoding range.
    pub fn csv_escape(pubkey: XOnlyPublicKey, timelock: u32) -> Result<Self, ValidationError> {
        if timelock == 0 || timelock > MAX_RELATIVE_TIMELOCK {
            return Err(ValidationError::InvalidTimelock { value: timelock });
        }
        Ok(Self::CsvEscape {
            pubkey,
            timelock: timelock as u16,
        })
    }

    /// Build a hashlock multisig leaf over a 32-byte SHA-256 commitment.
    pub fn hashlock_multisig(
        hash: &[u8],
        key_a: XOnlyPublicKey,
        key_b: XOnlyPublicKey,
    ) -> Result<Self, ValidationError> {
        let hash: [u8; 32] = hash
            .try_into()
            .map_err(|_| ValidationError::InvalidHash { actual: hash.len() })?;
        Ok(Self::HashlockMultisig { hash, key_a, key_b })
    }

    /// Canonical Script serialization of this leaf.
    pub fn script(&self) -> ScriptBuf {
        match self {
            LeafScript::CsvEscape { pubkey, timelock } => Builder::new()
                .push_int(*timelock as i64)
                .push_opcode(OP_CSV)
                .push_opcode(OP_DROP)
                .push_x_only_key(pubkey)
                .push_opcode(OP_CHECKSIG)
                .into_script(),
            LeafScript::HashlockMultisig { hash, key_a, key_b } => Builder::new()
                .push_opcode(OP_SHA256)
                .push_slice(*hash)
                .push_opcode(OP_EQUALVERIFY)
                .push_x_only_key(key_b)
                .push_opcode(OP_CHECKSIG)
                .push_x_only_key(key_a)
                .push_opcode(OP_CHECKSIGADD)
                .push_int(2)
                .push_opcode(OP_NUMEQUAL)
                .into_script(),
        }
    }

    /// Tapleaf hash of this leaf under the `TapLeaf` tag, version 0xc0.
    pub fn tapleaf_hash(&self) -> TapLeafHash {
        TapLeafHash::from_script(&self.script(), LeafVersion::TapScript)
    }

    /// The committed preimage hash, for the hashlock variant.
    pub fn committed_hash(&self) -> Option<[u8; 32]> {
        match self {
            LeafScript::CsvEscape { .. } => None,
            LeafScript::HashlockMultisig { hash, .. } => Some(*hash),
        }
    }

    /// The input sequence required to spend through this leaf: the encoded
    /// relative height for the CSV leaf, and the locktime-enabled final
    /// sequence (`0xFFFFFFFE`) for the hashlock leaf.
    pub fn required_sequence(&self) -> Sequence {
        match self {
            LeafScript::CsvEscape { timelock, .. } => Sequence::from_height(*timelock),
            LeafScript::HashlockMultisig { .. } => Sequence::ENABLE_LOCKTIME_NO_RBF,
        }
    }

    /// Short name for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            LeafScript::CsvEscape { .. } => "csv_escape",
            LeafScript::HashlockMultisig { .. } => "hashlock_multisig",
        }
    }
}
