//! # Protocol Constants
//!
//! This module contains only the protocol-level values that are actually used
//! throughout the loanlock engine.

/// Transaction construction constants
pub mod protocol {
    /// Dust floor for P2TR outputs in satoshis.
    ///
    /// Outputs at or below this value are rejected at construction time;
    /// a sub-dust escrow, collateral, or fee output would be unrelayable.
    pub const P2TR_DUST_SATS: u64 = 330;

    /// Minimum mining fee in satoshis a collateral-lock transaction must
    /// leave behind.
    ///
    /// The escrow input must cover `collateral + origination fee + this
    /// floor`; the remainder above the declared outputs is consumed as the
    /// actual fee.
    pub const MIN_RELAY_FEE_SATS: u64 = 1_000;

    /// Default relative timelock in blocks for the borrower's escrow
    /// escape hatch (144 blocks is roughly one day on mainnet).
    pub const DEFAULT_BORROWER_TIMELOCK: u16 = 144;

    /// Default relative timelock in blocks for the lender's collateral
    /// claim path after a default.
    pub const DEFAULT_LENDER_TIMELOCK: u16 = 144;

    /// Upper bound of the BIP68 16-bit relative-height encoding.
    pub const MAX_RELATIVE_TIMELOCK: u32 = 0xFFFF;
}

/// Interchange file conventions
pub mod interchange {
    /// Filename prefix for a saved pre-signature record; the loan id and
    /// `.json` are appended.
    pub const SIGNATURE_FILE_PREFIX: &str = "borrower_signature_";
}
