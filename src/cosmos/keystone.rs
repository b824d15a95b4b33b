//! Keystone as a Keplr-compatible Cosmos signer over the QR relay.

use std::cell::RefCell;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::amino::{account_hash, bech32_address, encode_secp256k1_signature, serialize_sign_doc};
use super::{AccountEvents, AminoSignResponse, ArbitraryData, CosmosKey, CosmosProvider, CosmosWallet, KeplrApi, StdSignDoc, StdSignature};
use crate::airgap::{AirgapPayload, AirgapRequest, AirgapSession, Prompt, ReadOutcome, ResultKind};
use crate::catalog::WalletDescriptor;
use crate::config::{ChainConfig, ProviderOption};
use crate::error::{WalletError, WalletResult};

const WALLET: &str = "Keystone Wallet";
const SIGN_REQUEST_ID: &str = "7AFD5E09-9267-43FB-A02E-08C4A09417EC";
const ATOM: &str = "ATOM";

fn sync_prompt() -> Prompt {
    Prompt::new("Sync Keystone with Babylon Staking App", "Please scan the QR code displayed on your Keystone")
        .with_steps(&[
            "1. Version M-9.0 (Multi-Coin) or newer running on your Keystone Essential or Pro. ",
            "2. Click connect software wallet and use \"Keplr\" for connection.",
            "3. Press the \"Sync Keystone\" button and scan the QR Code displayed on your Keystone hardware wallet",
        ])
        .with_type_error("The scanned QR code can't be read. please verify and try again.")
}

#[derive(Debug, Clone)]
struct Synced {
    public_key: Vec<u8>,
    path: String,
    xfp: String,
}

pub struct KeystoneKeplr {
    session: AirgapSession,
    chains: Vec<ChainConfig>,
    synced: RefCell<Option<Synced>>,
}

impl std::fmt::Debug for KeystoneKeplr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystoneKeplr").field("chains", &self.chains).field("synced", &self.synced).finish_non_exhaustive()
    }
}

impl KeystoneKeplr {
    pub fn new(session: AirgapSession, chains: Vec<ChainConfig>) -> Self {
        Self { session, chains, synced: RefCell::new(None) }
    }

    fn chain(&self, chain_id: &str) -> WalletResult<&ChainConfig> {
        self.chains
            .iter()
            .find(|c| c.network == chain_id)
            .ok_or_else(|| WalletError::invalid(format!("ChainId {} not found", chain_id)))
    }

    fn synced(&self) -> WalletResult<Synced> {
        self.synced.borrow().clone().ok_or_else(|| WalletError::NotConnected(WALLET.into()))
    }
}

#[async_trait(?Send)]
impl KeplrApi for KeystoneKeplr {
    async fn enable(&self, chain_id: &str) -> WalletResult<()> {
        self.chain(chain_id)?;
        let (xfp, keys) = match self.session.read(ResultKind::CryptoMultiAccounts, &sync_prompt()).await? {
            ReadOutcome::Success(AirgapPayload::MultiAccounts { master_fingerprint, keys }) => (master_fingerprint, keys),
            ReadOutcome::Success(other) => {
                return Err(WalletError::invalid(format!("expected a multi-account export, got {:?}", other)))
            }
            ReadOutcome::Canceled => return Err(WalletError::Airgap("Connection to Keystone was canceled".into())),
            ReadOutcome::Failed => return Err(WalletError::Airgap("Error reading QR code, Please try again.".into())),
        };
        let atom = keys
            .into_iter()
            .find(|k| k.chain == ATOM)
            .ok_or_else(|| WalletError::Airgap("Keystone does not support the Cosmos network.".into()))?;
        let public_key = hex::decode(&atom.public_key)?;
        debug!("keystone cosmos account {} at {}", xfp, atom.path);
        *self.synced.borrow_mut() = Some(Synced { public_key, path: atom.path, xfp });
        Ok(())
    }

    async fn get_key(&self, chain_id: &str) -> WalletResult<CosmosKey> {
        let synced = self.synced()?;
        let prefix = self
            .chain(chain_id)?
            .bech32_config
            .as_ref()
            .map(|b| b.bech32_prefix_acc_addr.as_str())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| WalletError::invalid("bech32 prefix not specified for the chain"))?;
        Ok(CosmosKey {
            name: "Keystone".into(),
            algo: "secp256k1".into(),
            address: account_hash(&synced.public_key).to_vec(),
            bech32_address: bech32_address(prefix, &synced.public_key)?,
            pub_key: synced.public_key,
            is_nano_ledger: false,
            is_keystone: true,
        })
    }

    async fn sign_amino(
        &self,
        chain_id: &str,
        _signer: &str,
        sign_doc: &StdSignDoc,
        _options: Option<Value>,
    ) -> WalletResult<AminoSignResponse> {
        let synced = self.synced()?;
        let address = self.get_key(chain_id).await?.bech32_address;
        let request = AirgapRequest::CosmosSign {
            request_id: SIGN_REQUEST_ID.into(),
            sign_data: hex::encode(serialize_sign_doc(sign_doc)?),
            data_type: "amino".into(),
            path: synced.path.clone(),
            xfp: synced.xfp.clone(),
            address,
        };
        let (signature, public_key) = match self.session.round_trip(&request, ResultKind::CosmosSignature).await? {
            AirgapPayload::CosmosSignature { signature, public_key } => (signature, public_key),
            other => return Err(WalletError::invalid(format!("expected a cosmos signature, got {:?}", other))),
        };
        if !public_key.eq_ignore_ascii_case(&hex::encode(&synced.public_key)) {
            return Err(WalletError::Airgap("Public key mismatch".into()));
        }
        Ok(AminoSignResponse {
            signed: sign_doc.clone(),
            signature: encode_secp256k1_signature(&synced.public_key, &hex::decode(signature)?)?,
        })
    }

    async fn sign_arbitrary(&self, _chain_id: &str, _signer: &str, _data: &ArbitraryData) -> WalletResult<StdSignature> {
        Err(WalletError::UnsupportedOperation("signArbitrary not supported yet".into()))
    }
}

/// Keystone has no injected object; the provider wraps the relay directly.
pub(crate) fn provider(descriptor: &'static WalletDescriptor, option: &ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    let api = KeystoneKeplr::new(option.airgap()?, option.chains.clone());
    Ok(Box::new(CosmosProvider::new(descriptor, std::rc::Rc::new(api), option, AccountEvents::Unsupported)))
}
