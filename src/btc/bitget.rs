//! Bitget extension (`window.bitkeep.unisat`).
//!
//! PSBTs go through Bitget's `dappsSign` request. Batched results come back as one
//! comma-separated string. Anything the wallet leaves unfinalized is finalized locally.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{BitcoinWallet, ChainBackend, InjectedBtc};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::{WalletError, WalletResult};
use crate::host::{require, Listener};
use crate::psbt::ensure_finalized_hex;
use crate::types::{InscriptionResult, MessageSigningType, Network};

pub const PROVIDER_PATH: &str = "bitkeep.unisat";
const WALLET: &str = "Bitget Wallet";

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_bitget",
    name: "Bitget",
    icon: "bitget-wallet.png",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Extension,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(BitgetWallet::new(&option)?))
}

#[derive(Debug)]
pub struct BitgetWallet {
    injected: InjectedBtc,
    backend: ChainBackend,
}

impl BitgetWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        let object = require(option.host.as_ref(), PROVIDER_PATH, "Bitget Wallet extension")?;
        Ok(Self { injected: InjectedBtc::new(object, WALLET), backend: ChainBackend::from_option(option) })
    }

    fn selected_address(&self) -> Value { self.injected.object().property("selectedAddress").unwrap_or(Value::Null) }

    async fn dapps_sign(&self, params: Value) -> WalletResult<String> {
        let data = json!({ "method": "signPsbt", "params": params });
        self.injected.call_as("request", vec![json!("dappsSign"), data]).await
    }
}

#[async_trait(?Send)]
impl BitcoinWallet for BitgetWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> {
        self.injected.call("requestAccounts", vec![]).await.map_err(|e| e.on_connect(WALLET))?;
        let address = self.get_address().await;
        let public_key = self.get_public_key_hex().await;
        match (address, public_key) {
            (Ok(address), Ok(_)) => {
                info!("connected {} as {}", WALLET, address);
                Ok(())
            }
            _ => Err(WalletError::upstream("Could not connect to Bitget Wallet")),
        }
    }

    async fn get_address(&self) -> WalletResult<String> { self.injected.get_accounts().await }

    async fn get_public_key_hex(&self) -> WalletResult<String> { self.injected.get_public_key().await }

    async fn get_network(&self) -> WalletResult<Network> { Network::parse(&self.injected.get_network().await?) }

    async fn switch_network(&self, network: Network) -> WalletResult<()> {
        self.injected.switch_network(network.wallet_name()).await
    }

    async fn sign_psbt(&self, psbt_hex: &str) -> WalletResult<String> {
        let signed = self
            .dapps_sign(json!({
                "from": self.selected_address(),
                "__internalFunc": "__signPsbt_babylon",
                "psbtHex": psbt_hex,
                "options": { "autoFinalized": true },
            }))
            .await?;
        ensure_finalized_hex(&signed)
    }

    async fn sign_psbts(&self, psbts_hexes: &[String]) -> WalletResult<Vec<String>> {
        let options: Vec<Value> = psbts_hexes.iter().map(|_| json!({ "autoFinalized": true })).collect();
        let signed = self
            .dapps_sign(json!({
                "from": self.selected_address(),
                "__internalFunc": "__signPsbts_babylon",
                "psbtHex": "_",
                "psbtHexs": psbts_hexes,
                "options": options,
            }))
            .await?;
        signed.split(',').map(ensure_finalized_hex).collect()
    }

    async fn sign_message(&self, message: &str, kind: MessageSigningType) -> WalletResult<String> {
        self.injected.sign_message(message, kind).await
    }

    async fn send_bitcoin(&self, to: &str, amount_sats: u64) -> WalletResult<String> {
        self.injected.send_bitcoin(to, amount_sats).await
    }

    async fn get_inscriptions(&self, cursor: Option<u64>, size: Option<u64>) -> WalletResult<InscriptionResult> {
        self.injected.get_inscriptions(cursor, size).await
    }

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.on(event, listener) }
    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> { self.injected.off(event, listener) }
}
