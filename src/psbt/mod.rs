//! PSBT funding core shared by every Bitcoin adapter.
//!
//! ```text
//! send_with_funding
//!   │ get_utxos / get_network_fees          (ChainApi)
//!   ├─► funding::build_funding_plan          largest-first greedy selection
//!   ├─► builder::build_transfer_psbt         witness_utxo inputs, payment, change
//!   ├─► wallet.sign_psbt                     extension / QR signer
//!   ├─► finalize::ensure_finalized           local finalizer fallback
//!   └─► finalize::extract → push_tx
//! ```

pub mod builder;
pub mod codec;
pub mod finalize;
pub mod funding;
pub mod send;
pub mod sign_inputs;

pub use builder::{build_transfer_psbt, parse_address};
pub use codec::{base64_to_hex, hex_to_base64, psbt_from_base64, psbt_from_hex, psbt_to_base64, psbt_to_hex, tx_to_hex};
pub use finalize::{all_finalized, ensure_finalized, ensure_finalized_hex, extract, finalize_all, finalize_input, is_finalized};
pub use funding::{build_funding_plan, estimate_fee, estimate_vsize, CoinSelector, FundingPlan, DEFAULT_DUST_LIMIT};
pub use send::send_with_funding;
pub use sign_inputs::{sign_inputs_for, SignInputsPlan, ToSignInput};
