//! Cactus Link (`window.cactuslink`), a custody wallet with a UniSat-style API.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{injected_event, BitcoinWallet, ChainBackend, InjectedBtc};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::{WalletError, WalletResult};
use crate::host::{require, Listener};
use crate::types::{InscriptionResult, MessageSigningType, Network};

pub const PROVIDER_PATH: &str = "cactuslink";
const WALLET: &str = "Cactus Link Wallet";

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_cactus_link",
    name: "Cactus Link",
    icon: "cactus.png",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Extension,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(CactusLinkWallet::new(&option)?))
}

fn finalize_option() -> Value { json!({ "autoFinalized": true }) }

#[derive(Debug)]
pub struct CactusLinkWallet {
    injected: InjectedBtc,
    backend: ChainBackend,
}

impl CactusLinkWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        let object = require(option.host.as_ref(), PROVIDER_PATH, "Cactus Link Wallet extension")?;
        Ok(Self { injected: InjectedBtc::new(object, WALLET), backend: ChainBackend::from_option(option) })
    }
}

#[async_trait(?Send)]
impl BitcoinWallet for CactusLinkWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> {
        // The session must be on a known network before accounts are requested.
        let network = self.get_network().await?;
        self.injected.request_accounts().await.map_err(|e| e.on_connect(WALLET))?;
        match (self.get_address().await, self.get_public_key_hex().await) {
            (Ok(address), Ok(_)) => {
                info!("connected {} on {} as {}", WALLET, network, address);
                Ok(())
            }
            _ => Err(WalletError::upstream("Could not connect to Cactus Link Wallet")),
        }
    }

    async fn get_address(&self) -> WalletResult<String> { self.injected.get_accounts().await }

    async fn get_public_key_hex(&self) -> WalletResult<String> { self.injected.get_public_key().await }

    async fn get_network(&self) -> WalletResult<Network> { Network::parse(&self.injected.get_network().await?) }

    async fn switch_network(&self, network: Network) -> WalletResult<()> {
        self.injected.switch_network(network.wallet_name()).await
    }

    async fn sign_psbt(&self, psbt_hex: &str) -> WalletResult<String> {
        self.injected.call_as("signPsbt", vec![json!(psbt_hex), finalize_option()]).await
    }

    async fn sign_psbts(&self, psbts_hexes: &[String]) -> WalletResult<Vec<String>> {
        let options: Vec<Value> = psbts_hexes.iter().map(|_| finalize_option()).collect();
        self.injected.call_as("signPsbts", vec![json!(psbts_hexes), json!(options)]).await
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

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        self.injected.on(injected_event(event), listener)
    }

    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        self.injected.off(injected_event(event), listener)
    }
}
