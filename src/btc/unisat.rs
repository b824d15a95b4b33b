//! UniSat extension (`window.unisat`).

use std::cell::RefCell;

use async_trait::async_trait;
use tracing::info;

use super::{network_from_wallet, BitcoinWallet, ChainBackend, InjectedBtc};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::{WalletError, WalletResult};
use crate::host::{require, Listener};
use crate::types::{InscriptionResult, MessageSigningType, Network, WalletInfo};

pub const PROVIDER_PATH: &str = "unisat";
const WALLET: &str = "UniSat Wallet";

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_unisat",
    name: "UniSat",
    icon: "unisat_wallet.svg",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Extension,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(UniSatWallet::new(&option)?))
}

#[derive(Debug)]
pub struct UniSatWallet {
    injected: InjectedBtc,
    backend: ChainBackend,
    info: RefCell<Option<WalletInfo>>,
}

impl UniSatWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        let object = require(option.host.as_ref(), PROVIDER_PATH, "UniSat Wallet extension")?;
        Ok(Self {
            injected: InjectedBtc::new(object, WALLET),
            backend: ChainBackend::from_option(option),
            info: RefCell::new(None),
        })
    }

    pub fn wallet_info(&self) -> Option<WalletInfo> { self.info.borrow().clone() }
}

#[async_trait(?Send)]
impl BitcoinWallet for UniSatWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> {
        let connected = async {
            let address = self.injected.request_accounts().await?;
            let public_key_hex = self.injected.get_public_key().await?;
            Ok::<_, WalletError>(WalletInfo { public_key_hex, address })
        };
        let info = connected.await.map_err(|e| match e.on_connect(WALLET) {
            rejected @ WalletError::ConnectionRejected(_) => rejected,
            _ => WalletError::upstream("Failed to connect to UniSat Wallet"),
        })?;
        info!("connected {} as {}", WALLET, info.address);
        *self.info.borrow_mut() = Some(info);
        Ok(())
    }

    async fn get_address(&self) -> WalletResult<String> { self.injected.get_accounts().await }

    async fn get_public_key_hex(&self) -> WalletResult<String> { self.injected.get_public_key().await }

    async fn get_network(&self) -> WalletResult<Network> {
        network_from_wallet(&self.injected.get_network().await?)
    }

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

    async fn get_balance(&self) -> WalletResult<u64> { self.injected.get_balance(Some("total")).await }

    async fn get_inscriptions(&self, cursor: Option<u64>, size: Option<u64>) -> WalletResult<InscriptionResult> {
        self.injected.get_inscriptions(cursor, size).await
    }

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.on(event, listener) }
    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.off(event, listener) }
}
