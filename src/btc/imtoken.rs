//! imToken's in-app browser (`window.bitcoin`). Every call is an EIP-1193 style
//! `request({ method: "btc_*", params })`.

use std::cell::RefCell;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::info;

use super::{injected_event, BitcoinWallet, ChainBackend, InjectedBtc};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::{WalletError, WalletResult};
use crate::host::{require, Listener};
use crate::psbt::send_with_funding;
use crate::types::{MessageSigningType, Network, WalletInfo};

pub const PROVIDER_PATH: &str = "bitcoin";
const WALLET: &str = "imToken Wallet";

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_imtoken",
    name: "imToken",
    icon: "imtoken.svg",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Injected,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(ImTokenWallet::new(&option)?))
}

#[derive(Debug)]
pub struct ImTokenWallet {
    injected: InjectedBtc,
    backend: ChainBackend,
    info: RefCell<Option<WalletInfo>>,
}

impl ImTokenWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        let object = require(option.host.as_ref(), PROVIDER_PATH, WALLET)?;
        Ok(Self {
            injected: InjectedBtc::new(object, WALLET),
            backend: ChainBackend::from_option(option),
            info: RefCell::new(None),
        })
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> WalletResult<T> {
        self.injected.call_as("request", vec![json!({ "method": method, "params": params })]).await
    }

    async fn first_account(&self) -> WalletResult<String> {
        let accounts: Option<Vec<String>> = self.request("btc_requestAccounts", json!([])).await?;
        accounts
            .and_then(|a| a.into_iter().next())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| WalletError::NotConnected(WALLET.into()))
    }
}

#[async_trait(?Send)]
impl BitcoinWallet for ImTokenWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> {
        let address = self.first_account().await.map_err(|e| e.on_connect(WALLET))?;
        let public_key_hex: Option<String> = self.request("btc_getPublicKey", json!([])).await?;
        let public_key_hex = public_key_hex
            .filter(|k| !k.is_empty())
            .ok_or_else(|| WalletError::upstream("Could not connect to imToken Wallet"))?;
        info!("connected {} as {}", WALLET, address);
        *self.info.borrow_mut() = Some(WalletInfo { public_key_hex, address });
        Ok(())
    }

    async fn get_address(&self) -> WalletResult<String> { self.first_account().await }

    async fn get_public_key_hex(&self) -> WalletResult<String> {
        self.info
            .borrow()
            .as_ref()
            .map(|info| info.public_key_hex.clone())
            .ok_or_else(|| WalletError::NotConnected(WALLET.into()))
    }

    async fn get_network(&self) -> WalletResult<Network> {
        let network: String = self.request("btc_getNetwork", json!([])).await?;
        Network::parse(&network)
    }

    async fn switch_network(&self, network: Network) -> WalletResult<()> {
        Err(WalletError::UnsupportedOperation(format!("imToken Wallet cannot switch to {}", network)))
    }

    async fn sign_psbt(&self, psbt_hex: &str) -> WalletResult<String> {
        self.request("btc_signPsbt", json!([psbt_hex])).await
    }

    async fn sign_psbts(&self, psbts_hexes: &[String]) -> WalletResult<Vec<String>> {
        self.request("btc_signPsbts", json!([psbts_hexes])).await
    }

    async fn sign_message(&self, message: &str, kind: MessageSigningType) -> WalletResult<String> {
        self.request("btc_signMessage", json!([message, kind.as_str()])).await
    }

    async fn send_bitcoin(&self, to: &str, amount_sats: u64) -> WalletResult<String> {
        send_with_funding(self, to, amount_sats).await
    }

    async fn get_balance(&self) -> WalletResult<u64> {
        let network = self.get_network().await?;
        let address = self.get_address().await?;
        if network != Network::Mainnet {
            return self.backend.balance(network, &address).await;
        }
        let value: Value = self.request("btc_getBalance", json!([address])).await?;
        super::balance_from(&value, None)
    }

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        self.injected.on(injected_event(event), listener)
    }

    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        self.injected.off(injected_event(event), listener)
    }
}
