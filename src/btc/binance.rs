//! Binance Web3 Wallet (`window.binancew3w.bitcoin`).
//!
//! Cannot batch-sign and has no `sendBitcoin`. Payments are funded and built locally,
//! then signed through `signPsbt`.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::{injected_event, BitcoinWallet, ChainBackend, InjectedBtc};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::{WalletError, WalletResult};
use crate::host::{require, Listener};
use crate::psbt::send_with_funding;
use crate::types::{MessageSigningType, Network};

pub const PROVIDER_PATH: &str = "binancew3w.bitcoin";
const WALLET: &str = "Binance Wallet";

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_binance",
    name: "Binance Web3 Wallet",
    icon: "binance.svg",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Injected,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(BinanceWallet::new(&option)?))
}

#[derive(Debug)]
pub struct BinanceWallet {
    injected: InjectedBtc,
    backend: ChainBackend,
}

impl BinanceWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        let object = require(option.host.as_ref(), PROVIDER_PATH, WALLET)?;
        Ok(Self { injected: InjectedBtc::new(object, WALLET), backend: ChainBackend::from_option(option) })
    }
}

#[async_trait(?Send)]
impl BitcoinWallet for BinanceWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> {
        let address = self.injected.request_accounts().await.map_err(|e| e.on_connect(WALLET))?;
        // an empty key comes back as NotConnected; wallet errors pass through
        match self.get_public_key_hex().await {
            Err(WalletError::NotConnected(_)) => return Err(WalletError::upstream("Could not connect to Binance Wallet")),
            result => result?,
        };
        info!("connected {} as {}", WALLET, address);
        Ok(())
    }

    async fn get_address(&self) -> WalletResult<String> { self.injected.get_accounts().await }

    async fn get_public_key_hex(&self) -> WalletResult<String> { self.injected.get_public_key().await }

    async fn get_network(&self) -> WalletResult<Network> { Network::parse(&self.injected.get_network().await?) }

    async fn switch_network(&self, network: Network) -> WalletResult<()> {
        self.injected.switch_network(network.wallet_name()).await
    }

    async fn sign_psbt(&self, psbt_hex: &str) -> WalletResult<String> { self.injected.sign_psbt(psbt_hex).await }

    async fn sign_psbts(&self, _psbts_hexes: &[String]) -> WalletResult<Vec<String>> {
        Err(WalletError::UnsupportedOperation("signPsbts is not available in Binance Wallet".into()))
    }

    async fn sign_message(&self, message: &str, kind: MessageSigningType) -> WalletResult<String> {
        self.injected.sign_message(message, kind).await
    }

    async fn send_bitcoin(&self, to: &str, amount_sats: u64) -> WalletResult<String> {
        send_with_funding(self, to, amount_sats).await
    }

    async fn get_balance(&self) -> WalletResult<u64> {
        let address = self.get_address().await?;
        let value = self.injected.call("getBalance", vec![json!(address)]).await?;
        super::balance_from(&value, None)
    }

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        self.injected.on(injected_event(event), listener)
    }

    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        self.injected.object().unlisten("removeListener", injected_event(event), listener)
    }
}
