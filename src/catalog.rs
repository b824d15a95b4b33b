//! Wallet catalog: static descriptors for a UI picker, each with its adapter constructor.

use serde::Serialize;

use crate::btc::{self, BitcoinWallet};
use crate::config::ProviderOption;
use crate::cosmos::{self, CosmosWallet};
use crate::error::{WalletError, WalletResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType { Bitcoin, Cosmos }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    /// Browser extension
    Extension,
    /// Airgapped signer over QR codes
    Qrcode,
    /// In-app browser of a mobile wallet
    Injected,
}

pub type BitcoinConnector = fn(ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>>;
pub type CosmosConnector = fn(ProviderOption) -> WalletResult<Box<dyn CosmosWallet>>;

#[derive(Clone, Copy)]
pub enum Connector {
    Bitcoin(BitcoinConnector),
    Cosmos(CosmosConnector),
}

#[derive(Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub chain_type: ChainType,
    #[serde(rename = "type")]
    pub kind: WalletKind,
    #[serde(skip)]
    pub connector: Connector,
}

impl std::fmt::Debug for WalletDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("chain_type", &self.chain_type)
            .field("kind", &self.kind)
            .finish()
    }
}

impl PartialEq for WalletDescriptor {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

static WALLETS: [&WalletDescriptor; 23] = [
    &btc::okx::DESCRIPTOR,
    &btc::unisat::DESCRIPTOR,
    &btc::onekey::DESCRIPTOR,
    &btc::bitget::DESCRIPTOR,
    &btc::keystone::DESCRIPTOR,
    &btc::imtoken::DESCRIPTOR,
    &btc::binance::DESCRIPTOR,
    &btc::keplr::DESCRIPTOR,
    &btc::cosmostation::DESCRIPTOR,
    &btc::leap::DESCRIPTOR,
    &btc::tomo::DESCRIPTOR,
    &btc::cactus_link::DESCRIPTOR,
    &btc::xverse::DESCRIPTOR,
    &cosmos::brands::KEPLR,
    &cosmos::brands::OKX,
    &cosmos::brands::BITGET,
    &cosmos::brands::COSMOSTATION,
    &cosmos::brands::LEAP,
    &cosmos::brands::ONEKEY,
    &cosmos::brands::STATION,
    &cosmos::brands::TOMO,
    &cosmos::brands::UNISAT,
    &cosmos::brands::KEYSTONE,
];

pub fn wallet_list() -> &'static [&'static WalletDescriptor] { &WALLETS }

pub fn find_wallet(id: &str) -> Option<&'static WalletDescriptor> {
    WALLETS.iter().copied().find(|w| w.id == id)
}

/// Constructs the Bitcoin adapter registered under `id`.
pub fn connect_bitcoin(id: &str, option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    match find_wallet(id).map(|w| w.connector) {
        Some(Connector::Bitcoin(connect)) => connect(option),
        Some(Connector::Cosmos(_)) => Err(WalletError::UnsupportedOperation(format!("{} is a cosmos wallet", id))),
        None => Err(WalletError::ProviderNotFound(id.to_string())),
    }
}

/// Constructs the Cosmos adapter registered under `id`.
pub fn connect_cosmos(id: &str, option: ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    match find_wallet(id).map(|w| w.connector) {
        Some(Connector::Cosmos(connect)) => connect(option),
        Some(Connector::Bitcoin(_)) => Err(WalletError::UnsupportedOperation(format!("{} is a bitcoin wallet", id))),
        None => Err(WalletError::ProviderNotFound(id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_and_prefixed() {
        let ids: HashSet<&str> = wallet_list().iter().map(|w| w.id).collect();
        assert_eq!(ids.len(), wallet_list().len());
        for wallet in wallet_list() {
            match (wallet.chain_type, wallet.connector) {
                (ChainType::Bitcoin, Connector::Bitcoin(_)) => assert!(wallet.id.starts_with("bitcoin_")),
                (ChainType::Cosmos, Connector::Cosmos(_)) => assert!(wallet.id.starts_with("cosmos_")),
                _ => panic!("{} has a mismatched connector", wallet.id),
            }
        }
    }

    #[test]
    fn test_descriptor_json() {
        let json = serde_json::to_value(find_wallet("bitcoin_keystone").unwrap()).unwrap();
        assert_eq!(json["chainType"], "bitcoin");
        assert_eq!(json["type"], "qrcode");
        assert!(json.get("connector").is_none());
    }

    #[test]
    fn test_unknown_id() {
        assert!(find_wallet("bitcoin_nope").is_none());
    }
}
