//! Tomo's Bitcoin provider (`window.tomo_btc`).
//!
//! Versions before 1.2.0 sign PSBTs in a way the staking flow cannot use, so connecting
//! checks `getVersion` when the wallet exposes it.

use async_trait::async_trait;
use serde_json::Value;

use super::keplr::connect_keplr_style;
use super::{BitcoinWallet, ChainBackend, InjectedBtc};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::{WalletError, WalletResult};
use crate::host::{require, Listener};
use crate::types::{MessageSigningType, Network};

pub const PROVIDER_PATH: &str = "tomo_btc";
const WALLET: &str = "Tomo Wallet";

/// Oldest wallet release adapters accept.
pub const MIN_VERSION: [u64; 3] = [1, 2, 0];

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_tomo",
    name: "Tomo",
    icon: "tomo.png",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Extension,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(TomoWallet::new(&option)?))
}

/// `"1.10.3"` → `[1, 10, 3]`. Missing or non-numeric parts count as 0.
pub fn parse_version(version: &str) -> [u64; 3] {
    let mut parts = [0u64; 3];
    for (slot, part) in parts.iter_mut().zip(version.trim().trim_start_matches('v').split('.')) {
        *slot = part.chars().take_while(|c| c.is_ascii_digit()).collect::<String>().parse().unwrap_or(0);
    }
    parts
}

#[derive(Debug)]
pub struct TomoWallet {
    injected: InjectedBtc,
    backend: ChainBackend,
}

impl TomoWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        let object = require(option.host.as_ref(), PROVIDER_PATH, "Tomo Wallet extension")?;
        Ok(Self { injected: InjectedBtc::new(object, WALLET), backend: ChainBackend::from_option(option) })
    }

    async fn check_version(&self) -> WalletResult<()> {
        if !self.injected.has_method("getVersion") {
            return Ok(());
        }
        let version = match self.injected.call("getVersion", vec![]).await? {
            Value::String(version) => version,
            other => other.to_string(),
        };
        if parse_version(&version) < MIN_VERSION {
            return Err(WalletError::upstream("Please update Tomo Wallet to the latest version"));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl BitcoinWallet for TomoWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> {
        self.check_version().await?;
        connect_keplr_style(&self.injected).await.map(|_| ())
    }

    async fn get_address(&self) -> WalletResult<String> { self.injected.get_accounts().await }

    async fn get_public_key_hex(&self) -> WalletResult<String> { self.injected.get_public_key().await }

    async fn get_network(&self) -> WalletResult<Network> { Network::parse(&self.injected.get_network().await?) }

    async fn switch_network(&self, network: Network) -> WalletResult<()> {
        self.injected.switch_network(network.wallet_name()).await
    }

    async fn sign_psbt(&self, psbt_hex: &str) -> WalletResult<String> { self.injected.sign_psbt(psbt_hex).await }

    async fn sign_psbts(&self, psbts_hexes: &[String]) -> WalletResult<Vec<String>> {
        self.injected.sign_psbts(psbts_hexes).await
    }

    async fn sign_message(&self, message: &str, kind: MessageSigningType) -> WalletResult<String> {
        self.injected.sign_message(message, kind).await
    }

    async fn send_bitcoin(&self, to: &str, amount_sats: u64) -> WalletResult<String> {
        self.injected.send_bitcoin(to, amount_sats).await
    }

    async fn push_tx(&self, tx_hex: &str) -> WalletResult<String> { self.injected.push_tx(tx_hex).await }

    async fn get_balance(&self) -> WalletResult<u64> { self.injected.get_balance(None).await }

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.on(event, listener) }
    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.off(event, listener) }
}
