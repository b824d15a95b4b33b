//! Wallet adapters: Bitcoin and Cosmos browser wallets behind two small contracts.
//!
//! # Architecture
//!
//! ```text
//! catalog (static descriptors)
//!   │ connect_bitcoin(id, option) / connect_cosmos(id, option)
//!   ▼
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │ btc::BitcoinWallet       │      │ cosmos::CosmosWallet     │
//! │  13 brand adapters       │      │  CosmosProvider          │
//! └──────┬─────────┬─────────┘      └──────┬─────────┬─────────┘
//!        │         │                       │         │
//!   host (injected  api::ChainApi     KeplrApi    lcd::BankQuery
//!   window globals) (mempool.space)   (injected / Keystone)
//!        │
//!   airgap (Keystone QR relay)
//!
//! psbt:   coin selection + transfer PSBT for wallets without sendBitcoin
//! bip322: simple-signature transcript
//! ```
//!
//! # Features
//!
//! - `native` - stderr logging via `tracing-subscriber`, rustls HTTP
//! - `wasm` - browser bindings (`WalletBridge`), `window` as the host
//!
//! # Usage
//!
//! ```ignore
//! use wallet_adapters::{connect_bitcoin, ChainConfig, ProviderOption};
//! use wallet_adapters::host::memory::MemoryHost;
//!
//! let option = ProviderOption::new(MemoryHost::new().into_rc())
//!     .with_chain(ChainConfig::new("signet"));
//! let wallet = connect_bitcoin("bitcoin_unisat", option)?;
//! wallet.connect_wallet().await?;
//! let txid = wallet.send_bitcoin("tb1q...", 10_000).await?;
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod airgap;
pub mod api;
pub mod bip322;
pub mod btc;
pub mod catalog;
pub mod config;
pub mod cosmos;
pub mod error;
pub mod host;
pub mod psbt;
pub mod types;
pub mod units;

// =============================================================================
// Native-only modules
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;

// =============================================================================
// WASM-only modules (browser, wasm-bindgen)
// =============================================================================
#[cfg(feature = "wasm")]
pub mod wasm;

// =============================================================================
// Re-exports
// =============================================================================
pub use airgap::{AirgapSession, AirgapTransport, UrRelay, UrTransport};
pub use api::{ChainApi, MempoolClient};
pub use btc::{BitcoinWallet, ChainBackend};
pub use catalog::{connect_bitcoin, connect_cosmos, find_wallet, wallet_list, ChainType, WalletDescriptor, WalletKind};
pub use config::{BackendUrls, ChainConfig, ProviderOption};
pub use cosmos::{CosmosWallet, OfflineSigner};
pub use error::{WalletError, WalletResult};
pub use host::{HostEnvironment, InjectedObject, Listener};
pub use types::{Fees, Inscription, InscriptionResult, MessageSigningType, Network, Utxo, WalletInfo};
pub use units::parse_units;

#[cfg(feature = "native")]
pub use logging::{init_logging, init_logging_with, LogFormat};

#[cfg(feature = "wasm")]
pub use wasm::{BitcoinWalletHandle, CosmosWalletHandle, WalletBridge};
