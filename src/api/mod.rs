//! Bitcoin HTTP collaborator: UTXOs, fees, tip height, balance, broadcast, inscriptions.
//!
//! [`ChainApi`] is the seam adapters consume; [`MempoolClient`] is the production
//! implementation over mempool.space-compatible endpoints.

mod mempool;

pub use mempool::{MempoolClient, DEFAULT_INSCRIPTION_API, MAINNET_API, SIGNET_API, TESTNET_API};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WalletResult;
use crate::types::{Fees, InscriptionResult, Network, Utxo};

/// Entry of `address/{a}/utxo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: UtxoStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoStatus {
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionQuery {
    pub address: String,
    /// Upper-case network name (`MAINNET`, `SIGNET`, ...)
    pub network_type: String,
    pub cursor: Option<u64>,
    pub size: Option<u64>,
}

#[async_trait(?Send)]
pub trait ChainApi {
    async fn fetch_utxo_list(&self, network: Network, address: &str) -> WalletResult<Vec<AddressUtxo>>;
    /// `scriptpubkey` (hex) of output `vout` of `txid`.
    async fn fetch_output_script(&self, network: Network, txid: &str, vout: u32) -> WalletResult<String>;
    async fn fetch_fee_estimate(&self, network: Network) -> WalletResult<Fees>;
    async fn fetch_tip_height(&self, network: Network) -> WalletResult<u32>;
    /// Confirmed balance in sats.
    async fn fetch_address_balance(&self, network: Network, address: &str) -> WalletResult<u64>;
    /// Broadcasts a raw transaction; returns the txid.
    async fn broadcast_transaction(&self, network: Network, raw_hex: &str) -> WalletResult<String>;
    async fn fetch_inscriptions(&self, query: &InscriptionQuery) -> WalletResult<InscriptionResult>;

    async fn fetch_confirmed_utxos(&self, network: Network, address: &str) -> WalletResult<Vec<Utxo>> {
        funding_utxos(self, network, address, None).await
    }
}

/// Confirmed UTXOs of `address`, largest first. With `amount`, only the shortest prefix whose
/// sum exceeds it (nothing when even the full set falls short).
pub async fn funding_utxos<A: ChainApi + ?Sized>(
    api: &A,
    network: Network,
    address: &str,
    amount: Option<u64>,
) -> WalletResult<Vec<Utxo>> {
    let mut confirmed: Vec<AddressUtxo> = api
        .fetch_utxo_list(network, address)
        .await?
        .into_iter()
        .filter(|utxo| utxo.status.confirmed)
        .collect();
    confirmed.sort_by(|a, b| b.value.cmp(&a.value));

    if let Some(amount) = amount {
        let mut sum = 0u64;
        let mut take = confirmed.len();
        for (i, utxo) in confirmed.iter().enumerate() {
            sum = sum.saturating_add(utxo.value);
            if sum > amount {
                take = i + 1;
                break;
            }
        }
        if sum < amount {
            return Ok(Vec::new());
        }
        confirmed.truncate(take);
    }

    let scripts = futures::future::try_join_all(
        confirmed.iter().map(|utxo| api.fetch_output_script(network, &utxo.txid, utxo.vout)),
    )
    .await?;

    Ok(confirmed
        .into_iter()
        .zip(scripts)
        .map(|(utxo, script_pubkey)| Utxo { txid: utxo.txid, vout: utxo.vout, value: utxo.value, script_pubkey })
        .collect())
}
