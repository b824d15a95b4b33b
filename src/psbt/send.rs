//! Shared `sendBitcoin` for adapters whose wallet cannot send natively.

use tracing::info;

use super::builder::build_transfer_psbt;
use super::codec::{psbt_from_hex, psbt_to_hex, tx_to_hex};
use super::finalize::{ensure_finalized, extract};
use super::funding::build_funding_plan;
use crate::btc::BitcoinWallet;
use crate::config::validate_address;
use crate::error::WalletResult;

/// Funds, builds, signs (through `wallet.sign_psbt`), finalizes and broadcasts a payment.
pub async fn send_with_funding<W: BitcoinWallet + ?Sized>(wallet: &W, to: &str, amount_sats: u64) -> WalletResult<String> {
    let network = wallet.get_network().await?;
    validate_address(network, to)?;
    let address = wallet.get_address().await?;
    let utxos = wallet.get_utxos(&address, None).await?;
    let fee_rate = wallet.get_network_fees().await?.fastest_fee;

    let plan = build_funding_plan(&utxos, amount_sats, fee_rate)?;
    let psbt = build_transfer_psbt(&plan, to, amount_sats, &address, network)?;

    let signed_hex = wallet.sign_psbt(&psbt_to_hex(&psbt)).await?;
    let mut signed = psbt_from_hex(&signed_hex)?;
    ensure_finalized(&mut signed)?;
    let tx = extract(signed)?;

    let txid = wallet.push_tx(&tx_to_hex(&tx)).await?;
    info!("sent {} sats to {} in {} ({} inputs, fee {})", amount_sats, to, txid, plan.inputs.len(), plan.fee_sats);
    Ok(txid)
}
