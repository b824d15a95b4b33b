//! Shared data model: networks, UTXOs, fee estimates, inscriptions.

use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};

/// Bitcoin networks an adapter can be connected to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network { #[default] Mainnet, Testnet, Signet }

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self { Network::Mainnet => "mainnet", Network::Testnet => "testnet", Network::Signet => "signet" }
    }

    /// Name most injected wallets use (`livenet` for mainnet).
    pub fn wallet_name(&self) -> &'static str {
        match self { Network::Mainnet => "livenet", Network::Testnet => "testnet", Network::Signet => "signet" }
    }

    /// Parses either the canonical name or a wallet's own name for it.
    pub fn parse(value: &str) -> WalletResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "livenet" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "signet" => Ok(Network::Signet),
            other => Err(WalletError::UnsupportedNetwork(other.to_string())),
        }
    }

    pub fn to_bitcoin(&self) -> bitcoin::Network {
        match self { Network::Mainnet => bitcoin::Network::Bitcoin, Network::Testnet => bitcoin::Network::Testnet, Network::Signet => bitcoin::Network::Signet }
    }

    /// Upper-cased name used by the inscriptions service.
    pub fn service_name(&self) -> String { self.as_str().to_ascii_uppercase() }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Recommended fee rates in sat/vB.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fees {
    /// Inclusion in the next block
    pub fastest_fee: f64,
    pub half_hour_fee: f64,
    pub hour_fee: f64,
    /// Inclusion not guaranteed
    pub economy_fee: f64,
    pub minimum_fee: f64,
}

/// A confirmed, spendable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    /// Satoshis
    pub value: u64,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InscriptionResult {
    #[serde(default)]
    pub list: Vec<Inscription>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Inscription {
    pub output: String,
    pub inscription_id: String,
    pub address: String,
    pub offset: u64,
    pub output_value: u64,
    pub location: String,
    pub content_type: String,
    pub content_length: u64,
    pub inscription_number: i64,
    pub timestamp: u64,
    pub genesis_transaction: String,
}

/// Connection info cached after `connect_wallet`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub public_key_hex: String,
    pub address: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSigningType {
    #[default]
    #[serde(rename = "ecdsa")]
    Ecdsa,
    #[serde(rename = "bip322-simple")]
    Bip322Simple,
}

impl MessageSigningType {
    pub fn as_str(&self) -> &'static str {
        match self { MessageSigningType::Ecdsa => "ecdsa", MessageSigningType::Bip322Simple => "bip322-simple" }
    }
}
