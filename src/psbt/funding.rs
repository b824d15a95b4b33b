//! Greedy coin selection for `sendBitcoin`.
//!
//! Candidates are taken largest-first, one at a time, until the running total covers the
//! target plus a size-heuristic fee:
//!
//! ```text
//! fee = rate * (180 * inputs + 34 * 2 + 10)
//! ```
//!
//! Change below the dust limit is left to the miner instead of creating an unspendable output.

use tracing::{debug, info};

use crate::error::{WalletError, WalletResult};
use crate::types::Utxo;

pub const INPUT_VBYTES: u64 = 180;
pub const OUTPUT_VBYTES: u64 = 34;
pub const OVERHEAD_VBYTES: u64 = 10;
/// Destination + change.
pub const PLANNED_OUTPUTS: u64 = 2;
/// Smallest change output worth creating (P2PKH dust threshold at 3 sat/vB relay fee).
pub const DEFAULT_DUST_LIMIT: u64 = 546;

/// Inputs, fee and change chosen for one payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingPlan {
    /// Selected UTXOs, largest first.
    pub inputs: Vec<Utxo>,
    pub change_sats: u64,
    pub fee_sats: u64,
}

impl FundingPlan {
    pub fn total_input(&self) -> u64 { self.inputs.iter().map(|u| u.value).sum() }
    pub fn has_change(&self) -> bool { self.change_sats > 0 }
}

pub fn estimate_vsize(inputs: usize) -> u64 {
    INPUT_VBYTES * inputs as u64 + OUTPUT_VBYTES * PLANNED_OUTPUTS + OVERHEAD_VBYTES
}

/// Fee for `inputs` inputs at `fee_rate` sat/vB, rounded up to whole sats.
pub fn estimate_fee(fee_rate: f64, inputs: usize) -> u64 {
    (fee_rate * estimate_vsize(inputs) as f64).ceil() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinSelector {
    dust_limit: u64,
}

impl Default for CoinSelector {
    fn default() -> Self { Self { dust_limit: DEFAULT_DUST_LIMIT } }
}

impl CoinSelector {
    pub fn new() -> Self { Self::default() }
    /// `0` keeps every positive change amount.
    pub fn with_dust_limit(mut self, dust_limit: u64) -> Self { self.dust_limit = dust_limit; self }

    pub fn select(&self, utxos: &[Utxo], target_sats: u64, fee_rate: f64) -> WalletResult<FundingPlan> {
        if !fee_rate.is_finite() || fee_rate < 0.0 {
            return Err(WalletError::invalid(format!("fee rate {}", fee_rate)));
        }
        if utxos.is_empty() {
            return Err(WalletError::InsufficientFunds { required: target_sats, available: 0 });
        }
        if target_sats == 0 {
            return Err(WalletError::NoInputsAvailable);
        }

        let mut candidates = utxos.to_vec();
        candidates.sort_by(|a, b| b.value.cmp(&a.value));

        let mut inputs = Vec::new();
        let mut total = 0u64;
        let mut fee = 0u64;
        for utxo in candidates {
            total = total.saturating_add(utxo.value);
            inputs.push(utxo);
            fee = estimate_fee(fee_rate, inputs.len());
            if total >= target_sats.saturating_add(fee) {
                break;
            }
        }

        let required = target_sats.saturating_add(fee);
        if total < required {
            return Err(WalletError::InsufficientFunds { required, available: total });
        }
        if inputs.is_empty() {
            return Err(WalletError::NoInputsAvailable);
        }

        let mut change = total - required;
        if change > 0 && change < self.dust_limit {
            debug!("change {} below dust limit {}, added to fee", change, self.dust_limit);
            fee += change;
            change = 0;
        }

        info!("funding plan: {} inputs, {} sats in, fee {}, change {}", inputs.len(), total, fee, change);
        Ok(FundingPlan { inputs, change_sats: change, fee_sats: fee })
    }
}

/// [`CoinSelector::select`] with the default dust limit.
///
/// Change below [`DEFAULT_DUST_LIMIT`] (546 sats) is not returned: it is added to
/// `fee_sats` and the plan has no change output. Use
/// `CoinSelector::new().with_dust_limit(0)` to keep every positive change amount.
pub fn build_funding_plan(utxos: &[Utxo], target_sats: u64, fee_rate: f64) -> WalletResult<FundingPlan> {
    CoinSelector::new().select(utxos, target_sats, fee_rate)
}
