//! Keplr's Bitcoin provider (`window.bitcoin_keplr`).

use async_trait::async_trait;
use tracing::info;

use super::{BitcoinWallet, ChainBackend, InjectedBtc};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::{WalletError, WalletResult};
use crate::host::{require, Listener};
use crate::types::{MessageSigningType, Network};

pub const PROVIDER_PATH: &str = "bitcoin_keplr";
const WALLET: &str = "Keplr Wallet";

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_keplr",
    name: "Keplr",
    icon: "keplr_wallet.png",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Extension,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(KeplrWallet::new(&option)?))
}

/// `connectWallet()` then `getPublicKey()`; any failure or empty answer means BTC is off in
/// the wallet. Shared by the Keplr-style brands.
pub(crate) async fn connect_keplr_style(injected: &InjectedBtc) -> WalletResult<String> {
    let not_enabled = || WalletError::upstream(format!("BTC is not enabled in {}", injected.wallet()));
    let addresses: Option<Vec<String>> = injected.call_as("connectWallet", vec![]).await.map_err(|_| not_enabled())?;
    let address = addresses.and_then(|a| a.into_iter().next()).ok_or_else(not_enabled)?;
    injected.get_public_key().await.map_err(|_| not_enabled())?;
    info!("connected {} as {}", injected.wallet(), address);
    Ok(address)
}

#[derive(Debug)]
pub struct KeplrWallet {
    injected: InjectedBtc,
    backend: ChainBackend,
}

impl KeplrWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        let object = require(option.host.as_ref(), PROVIDER_PATH, "Keplr Wallet extension")?;
        Ok(Self { injected: InjectedBtc::new(object, WALLET), backend: ChainBackend::from_option(option) })
    }
}

#[async_trait(?Send)]
impl BitcoinWallet for KeplrWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> { connect_keplr_style(&self.injected).await.map(|_| ()) }

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

    async fn get_balance(&self) -> WalletResult<u64> { self.injected.get_balance(Some("confirmed")).await }

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.on(event, listener) }
    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.off(event, listener) }
}
