//! Adapter configuration - passed from the host application

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::airgap::{AirgapSession, AirgapTransport, UrRelay, UrTransport};
use crate::api::{ChainApi, MempoolClient};
use crate::cosmos::{BankQuery, LcdClient};
use crate::error::{WalletError, WalletResult};
use crate::host::HostEnvironment;
use crate::types::Network;

/// Backend endpoints for one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendUrls {
    pub mempool_url: Option<String>,
    pub inscription_url: Option<String>,
    pub rpc_url: Option<String>,
    pub rest_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bech32Config {
    pub bech32_prefix_acc_addr: String,
}

/// One chain entry. `network` is a bitcoin network name or a cosmos chain id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub network: String,
    #[serde(default)]
    pub backend_urls: BackendUrls,
    #[serde(default)]
    pub bech32_config: Option<Bech32Config>,
}

impl ChainConfig {
    pub fn new(network: impl Into<String>) -> Self { Self { network: network.into(), ..Default::default() } }
    pub fn with_mempool_url(mut self, url: impl Into<String>) -> Self { self.backend_urls.mempool_url = Some(url.into()); self }
    pub fn with_inscription_url(mut self, url: impl Into<String>) -> Self { self.backend_urls.inscription_url = Some(url.into()); self }
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self { self.backend_urls.rpc_url = Some(url.into()); self }
    pub fn with_rest_url(mut self, url: impl Into<String>) -> Self { self.backend_urls.rest_url = Some(url.into()); self }
    pub fn with_bech32_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bech32_config = Some(Bech32Config { bech32_prefix_acc_addr: prefix.into() });
        self
    }
}

/// Everything an adapter constructor needs. The host environment is explicit so tests
/// can substitute a fake one.
#[derive(Clone)]
pub struct ProviderOption {
    pub chains: Vec<ChainConfig>,
    pub host: Rc<dyn HostEnvironment>,
    pub airgap: Option<AirgapSession>,
    pub chain_api: Option<Rc<dyn ChainApi>>,
    pub bank: Option<Rc<dyn BankQuery>>,
}

impl ProviderOption {
    pub fn new(host: Rc<dyn HostEnvironment>) -> Self {
        Self { chains: Vec::new(), host, airgap: None, chain_api: None, bank: None }
    }
    pub fn with_chain(mut self, chain: ChainConfig) -> Self { self.chains.push(chain); self }
    pub fn with_airgap(mut self, transport: Rc<dyn AirgapTransport>) -> Self { self.airgap = Some(AirgapSession::new(transport)); self }
    /// QR renderer/scanner speaking UR; requests are CBOR-encoded on the way out.
    pub fn with_ur_transport(self, transport: Rc<dyn UrTransport>) -> Self {
        self.with_airgap(Rc::new(UrRelay::new(transport)))
    }
    pub fn with_airgap_session(mut self, session: AirgapSession) -> Self { self.airgap = Some(session); self }
    pub fn with_chain_api(mut self, api: Rc<dyn ChainApi>) -> Self { self.chain_api = Some(api); self }
    pub fn with_bank(mut self, bank: Rc<dyn BankQuery>) -> Self { self.bank = Some(bank); self }

    pub fn primary_chain(&self) -> Option<&ChainConfig> { self.chains.first() }

    /// Bitcoin HTTP collaborator: the override, or a mempool client for the first chain's URLs.
    pub fn chain_api(&self) -> Rc<dyn ChainApi> {
        if let Some(api) = &self.chain_api {
            return api.clone();
        }
        let urls = self.primary_chain().map(|c| c.backend_urls.clone()).unwrap_or_default();
        Rc::new(MempoolClient::from_urls(&urls))
    }

    /// Cosmos bank collaborator: the override, or an LCD client for the first chain's REST URL.
    pub fn bank(&self) -> Rc<dyn BankQuery> {
        if let Some(bank) = &self.bank {
            return bank.clone();
        }
        let rest = self.primary_chain().and_then(|c| c.backend_urls.rest_url.clone());
        Rc::new(LcdClient::new(rest))
    }

    pub fn airgap(&self) -> WalletResult<AirgapSession> {
        self.airgap.clone().ok_or_else(|| WalletError::ProviderNotFound("QR transport".into()))
    }
}

impl std::fmt::Debug for ProviderOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOption")
            .field("chains", &self.chains)
            .field("airgap", &self.airgap.is_some())
            .field("chain_api", &self.chain_api.is_some())
            .field("bank", &self.bank.is_some())
            .finish()
    }
}

/// Checks the address prefix against the network.
pub fn validate_address(network: Network, address: &str) -> WalletResult<()> {
    match network {
        Network::Mainnet if !address.starts_with("bc1") => Err(WalletError::invalid(
            "Incorrect address prefix for Mainnet. Expected address to start with 'bc1'.",
        )),
        Network::Testnet | Network::Signet if !address.starts_with("tb1") => Err(WalletError::invalid(
            "Incorrect address prefix for Testnet / Signet. Expected address to start with 'tb1'.",
        )),
        _ => Ok(()),
    }
}
