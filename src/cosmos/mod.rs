//! Cosmos wallet adapters.
//!
//! ```text
//! CosmosWallet (contract)
//!   └── CosmosProvider ── KeplrApi ──┬── InjectedKeplr  (window.keplr and look-alikes)
//!                      │             └── KeystoneKeplr  (QR relay)
//!                      ├─ BankQuery  (LCD balance)
//!                      └─ AccountEvents
//! ```
//!
//! Every brand injects a Keplr-compatible object, so one provider serves them all. Brands
//! differ only in the global path and in how account changes are announced
//! ([`brands`]).

pub mod amino;
pub mod brands;
mod injected;
pub mod keystone;
mod lcd;

pub use amino::{
    AccountData, AminoSignResponse, ArbitraryData, Coin, CosmosKey, PubKey, StdFee, StdSignDoc, StdSignature,
};
pub use injected::InjectedKeplr;
pub use keystone::KeystoneKeplr;
pub use lcd::{BankQuery, LcdClient};

use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::catalog::WalletDescriptor;
use crate::config::{ChainConfig, ProviderOption};
use crate::error::{WalletError, WalletResult};
use crate::host::{resolve, HostEnvironment, Listener};

/// The Keplr provider surface adapters depend on.
#[async_trait(?Send)]
pub trait KeplrApi {
    async fn enable(&self, chain_id: &str) -> WalletResult<()>;
    async fn get_key(&self, chain_id: &str) -> WalletResult<CosmosKey>;
    async fn sign_amino(
        &self,
        chain_id: &str,
        signer: &str,
        sign_doc: &StdSignDoc,
        options: Option<Value>,
    ) -> WalletResult<AminoSignResponse>;
    async fn sign_arbitrary(&self, chain_id: &str, signer: &str, data: &ArbitraryData) -> WalletResult<StdSignature>;
}

/// Common contract of every Cosmos adapter.
#[async_trait(?Send)]
pub trait CosmosWallet {
    fn descriptor(&self) -> &'static WalletDescriptor;

    async fn connect_wallet(&self) -> WalletResult<()>;
    /// Bech32 account address on the configured chain.
    async fn get_address(&self) -> WalletResult<String>;
    /// Chain id of the first configured chain.
    async fn get_network(&self) -> WalletResult<String>;
    async fn sign_amino(&self, signer: &str, sign_doc: &StdSignDoc, options: Option<Value>) -> WalletResult<AminoSignResponse>;
    async fn sign_arbitrary(&self, signer: &str, data: &ArbitraryData) -> WalletResult<StdSignature>;
    async fn get_balance(&self, denom: &str) -> WalletResult<u128>;
    async fn get_public_key_hex(&self) -> WalletResult<String>;
    async fn get_offline_signer(&self) -> WalletResult<OfflineSigner>;

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()>;
    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()>;
}

fn unmatched_chain() -> WalletError { WalletError::invalid("Unmatched chain id with the offline signer") }

/// cosmjs-style amino signer bound to one chain.
#[derive(Clone)]
pub struct OfflineSigner {
    api: Rc<dyn KeplrApi>,
    chain_id: String,
}

impl std::fmt::Debug for OfflineSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineSigner").field("chain_id", &self.chain_id).finish_non_exhaustive()
    }
}

impl OfflineSigner {
    pub fn new(api: Rc<dyn KeplrApi>, chain_id: impl Into<String>) -> Self { Self { api, chain_id: chain_id.into() } }

    pub fn chain_id(&self) -> &str { &self.chain_id }

    pub async fn get_accounts(&self) -> WalletResult<Vec<AccountData>> {
        Ok(vec![self.api.get_key(&self.chain_id).await?.into()])
    }

    pub async fn sign_amino(&self, signer: &str, sign_doc: &StdSignDoc) -> WalletResult<AminoSignResponse> {
        if sign_doc.chain_id != self.chain_id {
            return Err(unmatched_chain());
        }
        self.api.sign_amino(&self.chain_id, signer, sign_doc, None).await
    }
}

/// How a brand announces account changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountEvents {
    /// `on`/`off` are accepted and ignored.
    Unsupported,
    /// `accountChanged` maps onto this window-level event.
    Window(&'static str),
    /// Events are registered on another injected object. With `rename`, only
    /// `accountChanged` is forwarded, under the new name.
    Forward { path: &'static str, rename: Option<&'static str> },
}

pub struct CosmosProvider {
    descriptor: &'static WalletDescriptor,
    api: Rc<dyn KeplrApi>,
    chains: Vec<ChainConfig>,
    bank: Rc<dyn BankQuery>,
    host: Rc<dyn HostEnvironment>,
    events: AccountEvents,
}

impl std::fmt::Debug for CosmosProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmosProvider")
            .field("id", &self.descriptor.id)
            .field("chains", &self.chains)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl CosmosProvider {
    pub fn new(
        descriptor: &'static WalletDescriptor,
        api: Rc<dyn KeplrApi>,
        option: &ProviderOption,
        events: AccountEvents,
    ) -> Self {
        Self { descriptor, api, chains: option.chains.clone(), bank: option.bank(), host: option.host.clone(), events }
    }

    pub fn api(&self) -> Rc<dyn KeplrApi> { self.api.clone() }

    fn chain_id(&self) -> WalletResult<String> {
        self.chains
            .first()
            .map(|c| c.network.clone())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| WalletError::invalid("no cosmos chain configured"))
    }

    async fn key(&self) -> WalletResult<CosmosKey> { self.api.get_key(&self.chain_id()?).await }

    /// Target and event name for an `on`/`off` call, or `None` when it is ignored.
    fn route(&self, event: &str) -> Option<(EventTarget, String)> {
        match self.events {
            AccountEvents::Unsupported => None,
            AccountEvents::Window(name) => {
                (event == crate::btc::ACCOUNT_CHANGED).then(|| (EventTarget::Window, name.to_string()))
            }
            AccountEvents::Forward { path, rename: Some(name) } => {
                (event == crate::btc::ACCOUNT_CHANGED).then(|| (EventTarget::Object(path), name.to_string()))
            }
            AccountEvents::Forward { path, rename: None } => Some((EventTarget::Object(path), event.to_string())),
        }
    }
}

enum EventTarget {
    Window,
    Object(&'static str),
}

#[async_trait(?Send)]
impl CosmosWallet for CosmosProvider {
    fn descriptor(&self) -> &'static WalletDescriptor { self.descriptor }

    async fn connect_wallet(&self) -> WalletResult<()> {
        let chain_id = self.chain_id()?;
        self.api.enable(&chain_id).await?;
        let address = self.get_address().await?;
        info!("connected {} on {} as {}", self.descriptor.name, chain_id, address);
        Ok(())
    }

    async fn get_address(&self) -> WalletResult<String> {
        let key = self.key().await?;
        if key.bech32_address.is_empty() {
            return Err(WalletError::NotConnected(self.descriptor.name.to_string()));
        }
        Ok(key.bech32_address)
    }

    async fn get_network(&self) -> WalletResult<String> { self.chain_id() }

    async fn sign_amino(&self, signer: &str, sign_doc: &StdSignDoc, options: Option<Value>) -> WalletResult<AminoSignResponse> {
        let chain_id = self.chain_id()?;
        if chain_id != sign_doc.chain_id {
            return Err(unmatched_chain());
        }
        if self.get_address().await? != signer {
            return Err(WalletError::invalid("Unknown signer address"));
        }
        self.api.sign_amino(&chain_id, signer, sign_doc, options).await
    }

    async fn sign_arbitrary(&self, signer: &str, data: &ArbitraryData) -> WalletResult<StdSignature> {
        self.api.sign_arbitrary(&self.chain_id()?, signer, data).await
    }

    async fn get_balance(&self, denom: &str) -> WalletResult<u128> {
        let address = self.get_address().await?;
        self.bank.balance(&address, denom).await
    }

    async fn get_public_key_hex(&self) -> WalletResult<String> { Ok(hex::encode(self.key().await?.pub_key)) }

    async fn get_offline_signer(&self) -> WalletResult<OfflineSigner> {
        Ok(OfflineSigner::new(self.api.clone(), self.chain_id()?))
    }

    fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        match self.route(event) {
            Some((EventTarget::Window, name)) => self.host.add_event_listener(&name, listener),
            Some((EventTarget::Object(path), name)) => match resolve(self.host.as_ref(), path) {
                Some(object) => object.listen("on", &name, listener),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        match self.route(event) {
            Some((EventTarget::Window, name)) => self.host.remove_event_listener(&name, listener),
            Some((EventTarget::Object(path), name)) => match resolve(self.host.as_ref(), path) {
                Some(object) => object.unlisten("off", &name, listener),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }
}
