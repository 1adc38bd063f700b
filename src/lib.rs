//! # Loanlock: Bitcoin Escrow and Collateral Engine
//!
//! Transaction and script construction for cross-chain loan agreements:
//! a borrower locks bitcoin into a two-leaf Taproot escrow output, a
//! lender atomically moves it into a two-leaf collateral output once the
//! borrower's secret is revealed on an external ledger, and the collateral
//! is later released to either party depending on loan outcome — all
//! enforced by pre-signed transactions, hash-locks and relative timelocks,
//! with no oracle on the Bitcoin side.
//!
//! Every operation is a synchronous pure function of caller-supplied
//! parameters: no shared state, no I/O, no network. Orchestration,
//! broadcast and event watching belong to external collaborators.

pub mod config;
pub mod contract;
pub mod error;
pub mod interchange;
pub mod keys;
pub mod scripts;
pub mod sighash;
pub mod signing;
pub mod transactions;
pub mod tree;
pub mod witness;

// Re-export commonly used types
pub use contract::{CollateralTerms, LoanContract, LoanConfig};
pub use error::{ConstructionError, CryptoError, EscrowError, EscrowResult, ValidationError};
pub use interchange::InterchangeRecord;
pub use keys::{nums_point, KeyMaterial, PublicKeyPair};
pub use scripts::{LeafScript, LEAF_INDEX_CSV, LEAF_INDEX_HASHLOCK};
pub use signing::SignerRole;
pub use transactions::LeafIntent;
pub use tree::{ScriptTree, TaprootOutput};
pub use witness::WitnessBundle;
