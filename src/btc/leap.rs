//! Leap's Bitcoin provider (`window.leapBitcoin`). Balance, broadcast and inscriptions come
//! from the chain backend.

use async_trait::async_trait;
use tracing::info;

use super::{BitcoinWallet, ChainBackend, InjectedBtc};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::{WalletError, WalletResult};
use crate::host::{require, Listener};
use crate::types::{MessageSigningType, Network};

pub const PROVIDER_PATH: &str = "leapBitcoin";
const WALLET: &str = "Leap Wallet";

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_leap",
    name: "Leap",
    icon: "leap.svg",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Extension,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(LeapWallet::new(&option)?))
}

#[derive(Debug)]
pub struct LeapWallet {
    injected: InjectedBtc,
    backend: ChainBackend,
}

impl LeapWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        let object = require(option.host.as_ref(), PROVIDER_PATH, "Leap Wallet extension")?;
        Ok(Self { injected: InjectedBtc::new(object, WALLET), backend: ChainBackend::from_option(option) })
    }
}

#[async_trait(?Send)]
impl BitcoinWallet for LeapWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> {
        let address = self.injected.request_accounts().await.map_err(|e| e.on_connect(WALLET))?;
        self.injected
            .get_public_key()
            .await
            .map_err(|_| WalletError::upstream("Could not connect to Leap Wallet"))?;
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

    async fn sign_psbts(&self, psbts_hexes: &[String]) -> WalletResult<Vec<String>> {
        self.injected.sign_psbts(psbts_hexes).await
    }

    async fn sign_message(&self, message: &str, kind: MessageSigningType) -> WalletResult<String> {
        self.injected.sign_message(message, kind).await
    }

    async fn send_bitcoin(&self, to: &str, amount_sats: u64) -> WalletResult<String> {
        self.injected.send_bitcoin(to, amount_sats).await
    }

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.on(event, listener) }
    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.off(event, listener) }
}
