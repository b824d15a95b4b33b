//! OneKey extension (`window.$onekey.btcwallet`).

use async_trait::async_trait;
use tracing::info;

use super::{BitcoinWallet, ChainBackend, InjectedBtc};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::WalletResult;
use crate::host::{require, Listener};
use crate::types::{MessageSigningType, Network};

pub const PROVIDER_PATH: &str = "$onekey.btcwallet";
const WALLET: &str = "OneKey Wallet";

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_onekey",
    name: "OneKey",
    icon: "onekey.svg",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Extension,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(OneKeyWallet::new(&option)?))
}

#[derive(Debug)]
pub struct OneKeyWallet {
    injected: InjectedBtc,
    backend: ChainBackend,
}

impl OneKeyWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        let object = require(option.host.as_ref(), PROVIDER_PATH, "OneKey Wallet extension")?;
        Ok(Self { injected: InjectedBtc::new(object, WALLET), backend: ChainBackend::from_option(option) })
    }
}

#[async_trait(?Send)]
impl BitcoinWallet for OneKeyWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> {
        self.injected.call("connectWallet", vec![]).await.map_err(|e| e.on_connect(WALLET))?;
        info!("connected {}", WALLET);
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

    async fn push_tx(&self, tx_hex: &str) -> WalletResult<String> { self.injected.push_tx(tx_hex).await }

    /// The wallet only knows mainnet balances.
    async fn get_balance(&self) -> WalletResult<u64> {
        let network = self.get_network().await?;
        if network == Network::Mainnet {
            return self.injected.get_balance(None).await;
        }
        let address = self.get_address().await?;
        self.backend.balance(network, &address).await
    }

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.on(event, listener) }
    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.off(event, listener) }
}
