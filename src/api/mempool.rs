//! mempool.space REST client (+ the inscriptions service).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{AddressUtxo, ChainApi, InscriptionQuery};
use crate::config::BackendUrls;
use crate::error::{WalletError, WalletResult};
use crate::types::{Fees, InscriptionResult, Network};

pub const MAINNET_API: &str = "https://mempool.space/api/";
pub const TESTNET_API: &str = "https://mempool.space/testnet/api/";
pub const SIGNET_API: &str = "https://mempool.space/signet/api/";
pub const DEFAULT_INSCRIPTION_API: &str = "https://apps-prod.unyx.tech/api/";

const INSCRIPTIONS_PATH: &str = "openapi/bitcoin/inscriptions";

#[derive(Debug, Deserialize)]
struct AddressInfo {
    chain_stats: ChainStats,
}

#[derive(Debug, Deserialize)]
struct ChainStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
struct TxInfo {
    vout: Vec<TxOutput>,
}

#[derive(Debug, Deserialize)]
struct TxOutput {
    scriptpubkey: String,
}

#[derive(Debug, Deserialize)]
struct ServiceEnvelope {
    result: InscriptionResult,
}

/// HTTP client for mempool.space-compatible explorers.
#[derive(Clone)]
pub struct MempoolClient {
    http_client: reqwest::Client,
    base_url: Option<Arc<str>>,
    inscription_url: Arc<str>,
}

impl Default for MempoolClient {
    fn default() -> Self {
        Self { http_client: reqwest::Client::new(), base_url: None, inscription_url: Arc::from(DEFAULT_INSCRIPTION_API) }
    }
}

impl std::fmt::Debug for MempoolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MempoolClient")
            .field("base_url", &self.base_url)
            .field("inscription_url", &self.inscription_url)
            .finish_non_exhaustive()
    }
}

fn with_trailing_slash(url: &str) -> Arc<str> { Arc::from(format!("{}/", url.trim_end_matches('/'))) }

impl MempoolClient {
    pub fn new() -> Self { Self::default() }
    /// Replaces the per-network mempool.space URLs with a single explorer.
    pub fn with_base_url(mut self, url: &str) -> Self { self.base_url = Some(with_trailing_slash(url)); self }
    pub fn with_inscription_url(mut self, url: &str) -> Self { self.inscription_url = with_trailing_slash(url); self }
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self { self.http_client = client; self }

    pub fn from_urls(urls: &BackendUrls) -> Self {
        let mut client = Self::new();
        if let Some(url) = urls.mempool_url.as_deref().filter(|u| !u.is_empty()) {
            client = client.with_base_url(url);
        }
        if let Some(url) = urls.inscription_url.as_deref().filter(|u| !u.is_empty()) {
            client = client.with_inscription_url(url);
        }
        client
    }

    pub fn base_url(&self, network: Network) -> String {
        match (&self.base_url, network) {
            (Some(url), _) => url.to_string(),
            (None, Network::Mainnet) => MAINNET_API.to_string(),
            (None, Network::Testnet) => TESTNET_API.to_string(),
            (None, Network::Signet) => SIGNET_API.to_string(),
        }
    }

    fn url(&self, network: Network, path: &str) -> String { format!("{}{}", self.base_url(network), path) }

    pub fn inscriptions_url(&self, query: &InscriptionQuery) -> WalletResult<reqwest::Url> {
        let cursor = query.cursor.map(|c| c.to_string()).unwrap_or_default();
        let size = query.size.map(|s| s.to_string()).unwrap_or_default();
        reqwest::Url::parse_with_params(
            &format!("{}{}", self.inscription_url, INSCRIPTIONS_PATH),
            [
                ("address", query.address.as_str()),
                ("networkType", query.network_type.as_str()),
                ("cursor", cursor.as_str()),
                ("size", size.as_str()),
            ],
        )
        .map_err(WalletError::invalid)
    }

    async fn get_text(&self, url: &str) -> WalletResult<String> {
        let response = self.http_client.get(url).send().await?;
        let ok = response.status().is_success();
        let body = response.text().await?;
        if ok { Ok(body) } else { Err(WalletError::Upstream(body)) }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> WalletResult<T> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| WalletError::invalid(format!("{}: {}", url, e)))
    }
}

/// Balance from an `address/{a}` body.
pub(crate) fn parse_balance(body: &str) -> WalletResult<u64> {
    let info: AddressInfo = serde_json::from_str(body)?;
    Ok(info.chain_stats.funded_txo_sum.saturating_sub(info.chain_stats.spent_txo_sum))
}

pub(crate) fn parse_tip_height(body: &str) -> WalletResult<u32> {
    body.trim().parse().map_err(|_| WalletError::upstream("Invalid result returned"))
}

/// Message of a rejected broadcast: the explorer's `"message"` field when present.
pub(crate) fn parse_broadcast_error(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    if let Some((_, rest)) = body.split_once("\"message\":\"") {
        if let Some((message, _)) = rest.split_once('"') {
            return message.to_string();
        }
    }
    if body.trim().is_empty() {
        "Error broadcasting transaction. Please try again".to_string()
    } else {
        body.to_string()
    }
}

#[async_trait(?Send)]
impl ChainApi for MempoolClient {
    async fn fetch_utxo_list(&self, network: Network, address: &str) -> WalletResult<Vec<AddressUtxo>> {
        self.get_json(&self.url(network, &format!("address/{}/utxo", address))).await
    }

    async fn fetch_output_script(&self, network: Network, txid: &str, vout: u32) -> WalletResult<String> {
        let tx: TxInfo = self.get_json(&self.url(network, &format!("tx/{}", txid))).await?;
        tx.vout
            .into_iter()
            .nth(vout as usize)
            .map(|output| output.scriptpubkey)
            .ok_or_else(|| WalletError::invalid(format!("tx {} has no output {}", txid, vout)))
    }

    async fn fetch_fee_estimate(&self, network: Network) -> WalletResult<Fees> {
        self.get_json(&self.url(network, "v1/fees/recommended")).await
    }

    async fn fetch_tip_height(&self, network: Network) -> WalletResult<u32> {
        parse_tip_height(&self.get_text(&self.url(network, "blocks/tip/height")).await?)
    }

    async fn fetch_address_balance(&self, network: Network, address: &str) -> WalletResult<u64> {
        parse_balance(&self.get_text(&self.url(network, &format!("address/{}", address))).await?)
    }

    async fn broadcast_transaction(&self, network: Network, raw_hex: &str) -> WalletResult<String> {
        let url = self.url(network, "tx");
        debug!("broadcast {} bytes to {}", raw_hex.len() / 2, url);
        let response = self.http_client.post(&url).body(raw_hex.to_string()).send().await?;
        let ok = response.status().is_success();
        let body = response.text().await?;
        if !ok {
            return Err(WalletError::Upstream(parse_broadcast_error(&body)));
        }
        info!("broadcast {} on {}", body.trim(), network);
        Ok(body.trim().to_string())
    }

    async fn fetch_inscriptions(&self, query: &InscriptionQuery) -> WalletResult<InscriptionResult> {
        let url = self.inscriptions_url(query)?;
        let envelope: ServiceEnvelope = self.get_json(url.as_str()).await?;
        Ok(envelope.result)
    }
}
