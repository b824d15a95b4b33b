//! Bitcoin wallet adapters.
//!
//! ```text
//! BitcoinWallet (contract)
//!   ├── brand adapter ── InjectedBtc   (UniSat-style injected object)
//!   │                 └─ ChainBackend  (mempool.space for whatever the wallet lacks)
//!   └── KeystoneWallet ── AirgapSession + psbt::send_with_funding
//! ```
//!
//! Every adapter resolves its injected global in `new`, so a missing wallet fails before any
//! network call. Connection state (address, public key) lives in `RefCell`s on the instance.
//!
//! | id | global path |
//! |----|-------------|
//! | `bitcoin_unisat` | `unisat` |
//! | `bitcoin_okx` | `okxwallet.bitcoin` |
//! | `bitcoin_bitget` | `bitkeep.unisat` |
//! | `bitcoin_onekey` | `$onekey.btcwallet` |
//! | `bitcoin_keplr` | `bitcoin_keplr` |
//! | `bitcoin_cosmostation` | `cosmostation.bitcoin` |
//! | `bitcoin_leap` | `leapBitcoin` |
//! | `bitcoin_tomo` | `tomo_btc` |
//! | `bitcoin_cactus_link` | `cactuslink` |
//! | `bitcoin_binance` | `binancew3w.bitcoin` |
//! | `bitcoin_imtoken` | `bitcoin` |
//! | `bitcoin_xverse` | `XverseProviders.BitcoinProvider` |
//! | `bitcoin_keystone` | QR transport |

mod injected;

pub mod binance;
pub mod bitget;
pub mod cactus_link;
pub mod cosmostation;
pub mod imtoken;
pub mod keplr;
pub mod keystone;
pub mod leap;
pub mod okx;
pub mod onekey;
pub mod tomo;
pub mod unisat;
pub mod xverse;

pub use binance::BinanceWallet;
pub use bitget::BitgetWallet;
pub use cactus_link::CactusLinkWallet;
pub use cosmostation::CosmostationWallet;
pub use imtoken::ImTokenWallet;
pub use injected::{balance_from, InjectedBtc};
pub use keplr::KeplrWallet;
pub use keystone::KeystoneWallet;
pub use leap::LeapWallet;
pub use okx::OkxWallet;
pub use onekey::OneKeyWallet;
pub use tomo::TomoWallet;
pub use unisat::UniSatWallet;
pub use xverse::XverseWallet;

use std::rc::Rc;

use async_trait::async_trait;

use crate::api::{funding_utxos, ChainApi, InscriptionQuery};
use crate::catalog::WalletDescriptor;
use crate::config::ProviderOption;
use crate::error::WalletResult;
use crate::host::Listener;
use crate::types::{Fees, InscriptionResult, MessageSigningType, Network, Utxo};

/// The account-change event name callers subscribe with.
pub const ACCOUNT_CHANGED: &str = "accountChanged";

/// HTTP fallbacks shared by every adapter.
#[derive(Clone)]
pub struct ChainBackend {
    api: Rc<dyn ChainApi>,
}

impl ChainBackend {
    pub fn new(api: Rc<dyn ChainApi>) -> Self { Self { api } }
    pub fn from_option(option: &ProviderOption) -> Self { Self::new(option.chain_api()) }
    pub fn api(&self) -> &dyn ChainApi { self.api.as_ref() }

    pub async fn push_tx(&self, network: Network, tx_hex: &str) -> WalletResult<String> {
        self.api.broadcast_transaction(network, tx_hex).await
    }
    pub async fn balance(&self, network: Network, address: &str) -> WalletResult<u64> {
        self.api.fetch_address_balance(network, address).await
    }
    pub async fn utxos(&self, network: Network, address: &str, amount: Option<u64>) -> WalletResult<Vec<Utxo>> {
        funding_utxos(self.api.as_ref(), network, address, amount).await
    }
    pub async fn tip_height(&self, network: Network) -> WalletResult<u32> { self.api.fetch_tip_height(network).await }
    pub async fn fees(&self, network: Network) -> WalletResult<Fees> { self.api.fetch_fee_estimate(network).await }
    pub async fn inscriptions(&self, network: Network, address: &str, cursor: Option<u64>, size: Option<u64>) -> WalletResult<InscriptionResult> {
        let query = InscriptionQuery { address: address.to_string(), network_type: network.service_name(), cursor, size };
        self.api.fetch_inscriptions(&query).await
    }
}

impl std::fmt::Debug for ChainBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("ChainBackend") }
}

/// Common contract of every Bitcoin-family adapter.
#[async_trait(?Send)]
pub trait BitcoinWallet {
    fn descriptor(&self) -> &'static WalletDescriptor;
    fn backend(&self) -> &ChainBackend;

    async fn connect_wallet(&self) -> WalletResult<()>;
    async fn get_address(&self) -> WalletResult<String>;
    async fn get_public_key_hex(&self) -> WalletResult<String>;
    async fn get_network(&self) -> WalletResult<Network>;
    async fn switch_network(&self, network: Network) -> WalletResult<()>;
    async fn sign_psbt(&self, psbt_hex: &str) -> WalletResult<String>;
    async fn sign_psbts(&self, psbts_hexes: &[String]) -> WalletResult<Vec<String>>;
    async fn sign_message(&self, message: &str, kind: MessageSigningType) -> WalletResult<String>;
    /// Pays `amount_sats` to `to`; returns the txid.
    async fn send_bitcoin(&self, to: &str, amount_sats: u64) -> WalletResult<String>;

    async fn sign_message_bip322(&self, message: &str) -> WalletResult<String> {
        self.sign_message(message, MessageSigningType::Bip322Simple).await
    }

    async fn push_tx(&self, tx_hex: &str) -> WalletResult<String> {
        let network = self.get_network().await?;
        self.backend().push_tx(network, tx_hex).await
    }

    /// Confirmed balance in sats.
    async fn get_balance(&self) -> WalletResult<u64> {
        let network = self.get_network().await?;
        let address = self.get_address().await?;
        self.backend().balance(network, &address).await
    }

    /// Confirmed UTXOs, largest first; with `amount`, just enough of them to cover it.
    async fn get_utxos(&self, address: &str, amount: Option<u64>) -> WalletResult<Vec<Utxo>> {
        let network = self.get_network().await?;
        self.backend().utxos(network, address, amount).await
    }

    async fn get_btc_tip_height(&self) -> WalletResult<u32> {
        let network = self.get_network().await?;
        self.backend().tip_height(network).await
    }

    async fn get_network_fees(&self) -> WalletResult<Fees> {
        let network = self.get_network().await?;
        self.backend().fees(network).await
    }

    async fn get_inscriptions(&self, cursor: Option<u64>, size: Option<u64>) -> WalletResult<InscriptionResult> {
        let address = self.get_address().await?;
        let network = self.get_network().await?;
        self.backend().inscriptions(network, &address, cursor, size).await
    }

    /// Only [`ACCOUNT_CHANGED`] is meaningful across brands.
    fn on(&self, _event: &str, _listener: &Listener) -> WalletResult<()> { Ok(()) }
    fn off(&self, _event: &str, _listener: &Listener) -> WalletResult<()> { Ok(()) }
}

/// Network name a UniSat-style wallet reports, mapped onto [`Network`].
/// `unknown` is what UniSat says while on signet.
pub(crate) fn network_from_wallet(name: &str) -> WalletResult<Network> {
    match name {
        "unknown" => Ok(Network::Signet),
        other => Network::parse(other),
    }
}

/// `accountChanged` → `accountsChanged`; other events pass through.
pub(crate) fn injected_event(event: &str) -> &str {
    if event == ACCOUNT_CHANGED { "accountsChanged" } else { event }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_from_wallet() {
        assert_eq!(network_from_wallet("livenet").unwrap(), Network::Mainnet);
        assert_eq!(network_from_wallet("unknown").unwrap(), Network::Signet);
        assert_eq!(network_from_wallet("testnet").unwrap(), Network::Testnet);
        assert!(matches!(network_from_wallet("regtest"), Err(crate::error::WalletError::UnsupportedNetwork(_))));
    }

    #[test]
    fn test_injected_event_mapping() {
        assert_eq!(injected_event("accountChanged"), "accountsChanged");
        assert_eq!(injected_event("networkChanged"), "networkChanged");
    }
}
