//! OKX extension (`window.okxwallet.bitcoin`).
//!
//! OKX injects one object per network (`bitcoin`, `bitcoinTestnet`, `bitcoinSignet`) and
//! cannot report which one is active, so the adapter tracks the network itself and swaps
//! handles on switch.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{BitcoinWallet, ChainBackend, InjectedBtc};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::{WalletError, WalletResult};
use crate::host::{require, InjectedObject, Listener};
use crate::types::{InscriptionResult, MessageSigningType, Network, WalletInfo};

pub const PROVIDER_PATH: &str = "okxwallet";
const WALLET: &str = "OKX Wallet";

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_okx",
    name: "OKX",
    icon: "okx_wallet.svg",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Extension,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(OkxWallet::new(&option)?))
}

/// Child of `okxwallet` holding the provider for `network`.
pub fn network_handle(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "bitcoin",
        Network::Testnet => "bitcoinTestnet",
        Network::Signet => "bitcoinSignet",
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectResult {
    #[serde(default)]
    address: String,
    #[serde(default)]
    compressed_public_key: String,
}

pub struct OkxWallet {
    okx: Rc<dyn InjectedObject>,
    injected: InjectedBtc,
    backend: ChainBackend,
    network: Cell<Network>,
    info: RefCell<Option<WalletInfo>>,
}

impl std::fmt::Debug for OkxWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OkxWallet").field("network", &self.network.get()).field("info", &self.info).finish_non_exhaustive()
    }
}

impl OkxWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        let bitcoin = require(option.host.as_ref(), "okxwallet.bitcoin", "OKX Wallet extension")?;
        let okx = require(option.host.as_ref(), PROVIDER_PATH, "OKX Wallet extension")?;
        Ok(Self {
            okx,
            injected: InjectedBtc::new(bitcoin, WALLET),
            backend: ChainBackend::from_option(option),
            network: Cell::new(Network::Mainnet),
            info: RefCell::new(None),
        })
    }
}

#[async_trait(?Send)]
impl BitcoinWallet for OkxWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> {
        self.okx.call("enable", vec![]).await.map_err(|e| e.on_connect(WALLET))?;

        let network = self.network.get();
        let result: ConnectResult = self
            .injected
            .call_as("connect", vec![])
            .await
            .map_err(|_| WalletError::upstream(format!("BTC {} is not enabled in OKX Wallet", network)))?;
        if result.address.is_empty() || result.compressed_public_key.is_empty() {
            return Err(WalletError::upstream("Could not connect to OKX Wallet"));
        }
        info!("connected {} on {} as {}", WALLET, network, result.address);
        *self.info.borrow_mut() = Some(WalletInfo { public_key_hex: result.compressed_public_key, address: result.address });
        Ok(())
    }

    async fn get_address(&self) -> WalletResult<String> {
        self.injected.call_as("getSelectedAddress", vec![]).await
    }

    async fn get_public_key_hex(&self) -> WalletResult<String> {
        self.info
            .borrow()
            .as_ref()
            .map(|info| info.public_key_hex.clone())
            .ok_or_else(|| WalletError::NotConnected(WALLET.into()))
    }

    async fn get_network(&self) -> WalletResult<Network> { Ok(self.network.get()) }

    async fn switch_network(&self, network: Network) -> WalletResult<()> {
        let handle = self
            .okx
            .child(network_handle(network))
            .ok_or_else(|| WalletError::UnsupportedNetwork(network.to_string()))?;
        self.injected.replace(handle);
        self.network.set(network);
        info!("{} switched to {}", WALLET, network);
        self.connect_wallet().await
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

    async fn get_balance(&self) -> WalletResult<u64> { self.injected.get_balance(Some("confirmed")).await }

    async fn get_inscriptions(&self, cursor: Option<u64>, size: Option<u64>) -> WalletResult<InscriptionResult> {
        self.injected.get_inscriptions(cursor, size).await
    }

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.on(event, listener) }
    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.off(event, listener) }
}
