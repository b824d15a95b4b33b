//! Xverse (`window.XverseProviders.BitcoinProvider`).
//!
//! Xverse speaks sats-connect: `request(name, params)` resolves to `{ result }` or
//! `{ error: { message } }`. The ordinals (taproot) address is the wallet's identity.
//! PSBTs travel as base64 with an explicit `signInputs` map and come back unfinalized.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{BitcoinWallet, ChainBackend, InjectedBtc};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::{WalletError, WalletResult};
use crate::host::require;
use crate::psbt::{finalize_all, psbt_from_base64, psbt_from_hex, psbt_to_hex, sign_inputs_for};
use crate::types::{MessageSigningType, Network};

pub const PROVIDER_PATH: &str = "XverseProviders.BitcoinProvider";
const WALLET: &str = "Xverse Wallet";

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_xverse",
    name: "Xverse",
    icon: "xverse.png",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Extension,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(XverseWallet::new(&option)?))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XverseAddress {
    pub address: String,
    pub address_type: String,
    pub public_key: String,
    /// `ordinals`, `payment` or `stacks`
    pub purpose: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AddressesResult {
    addresses: Vec<XverseAddress>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// Unsecured JWT (`alg: none`) as sats-connect expects for `signMultipleTransactions`.
pub fn unsecured_token(payload: &Value) -> WalletResult<String> {
    let header = serde_json::to_vec(&json!({ "typ": "JWT", "alg": "none" }))?;
    let body = serde_json::to_vec(payload)?;
    Ok(format!("{}.{}.", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(body)))
}

/// Xverse reports x-only taproot keys; callers expect 33-byte compressed hex.
pub fn compressed_public_key(public_key: &str) -> String {
    if public_key.len() == 64 { format!("03{}", public_key) } else { public_key.to_string() }
}

pub fn network_from_address(address: &str) -> WalletResult<Network> {
    if address.starts_with("bc1") {
        Ok(Network::Mainnet)
    } else if address.starts_with("tb1") {
        Ok(Network::Signet)
    } else {
        Err(WalletError::UnsupportedNetwork(format!("unknown network for address {}", address)))
    }
}

#[derive(Debug)]
pub struct XverseWallet {
    injected: InjectedBtc,
    backend: ChainBackend,
}

impl XverseWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        let object = require(option.host.as_ref(), PROVIDER_PATH, "Xverse Wallet extension")?;
        Ok(Self { injected: InjectedBtc::new(object, WALLET), backend: ChainBackend::from_option(option) })
    }

    async fn request(&self, name: &str, params: Option<Value>) -> WalletResult<Value> {
        let response: RpcResponse =
            self.injected.call_as("request", vec![json!(name), params.unwrap_or(Value::Null)]).await?;
        if let Some(error) = response.error {
            return Err(WalletError::Upstream(error.message));
        }
        match response.result {
            Some(result) if !result.is_null() => Ok(result),
            _ => Err(WalletError::upstream("Received unknown response from provider.")),
        }
    }

    async fn connection_info(&self) -> WalletResult<XverseAddress> {
        let result = self.request("getAddresses", Some(json!({ "purposes": ["ordinals"] }))).await?;
        let result: AddressesResult = serde_json::from_value(result)?;
        result
            .addresses
            .into_iter()
            .next()
            .ok_or_else(|| WalletError::upstream("Failed to connect to Xverse Wallet"))
    }

    async fn has_permissions(&self) -> WalletResult<bool> {
        let permissions = self.request("wallet_getCurrentPermissions", None).await?;
        Ok(permissions.as_array().is_some_and(|p| !p.is_empty()))
    }
}

#[async_trait(?Send)]
impl BitcoinWallet for XverseWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> {
        if matches!(self.has_permissions().await, Ok(true)) {
            return Ok(());
        }
        let failed = || WalletError::upstream("Failed to connect to Xverse Wallet");
        let response = self.request("wallet_connect", None).await.map_err(|e| e.on_connect(WALLET))?;
        let response: AddressesResult = serde_json::from_value(response).map_err(|_| failed())?;
        let ordinals = response.addresses.iter().find(|a| a.purpose == "ordinals").ok_or_else(failed)?;
        info!("connected {} as {}", WALLET, ordinals.address);
        Ok(())
    }

    async fn get_address(&self) -> WalletResult<String> { Ok(self.connection_info().await?.address) }

    async fn get_public_key_hex(&self) -> WalletResult<String> {
        Ok(compressed_public_key(&self.connection_info().await?.public_key))
    }

    async fn get_network(&self) -> WalletResult<Network> { network_from_address(&self.get_address().await?) }

    async fn switch_network(&self, network: Network) -> WalletResult<()> {
        Err(WalletError::UnsupportedOperation(format!(
            "please use the Xverse wallet extension to switch networks: {}",
            network
        )))
    }

    async fn sign_psbt(&self, psbt_hex: &str) -> WalletResult<String> {
        let network = self.get_network().await?;
        let address = self.get_address().await?;
        let plan = sign_inputs_for(&psbt_from_hex(psbt_hex)?, network, &address);
        debug!("xverse signPsbt inputs {:?}", plan.indexes());

        let result = self
            .request("signPsbt", Some(json!({ "psbt": plan.psbt_base64, "signInputs": plan.sign_inputs_json() })))
            .await?;
        let signed = result
            .get("psbt")
            .and_then(Value::as_str)
            .ok_or_else(|| WalletError::invalid("signPsbt result without psbt"))?;
        let mut psbt = psbt_from_base64(signed)?;
        finalize_all(&mut psbt)?;
        Ok(psbt_to_hex(&psbt))
    }

    async fn sign_psbts(&self, psbts_hexes: &[String]) -> WalletResult<Vec<String>> {
        let network = self.get_network().await?;
        let address = self.get_address().await?;
        let psbts = psbts_hexes
            .iter()
            .map(|hex| {
                let plan = sign_inputs_for(&psbt_from_hex(hex)?, network, &address);
                Ok(json!({ "psbtBase64": plan.psbt_base64, "signingIndexes": plan.sign_inputs_json() }))
            })
            .collect::<WalletResult<Vec<Value>>>()?;
        let token = unsecured_token(&json!({
            "network": { "type": network.as_str() },
            "message": "Sign Transaction",
            "psbts": psbts,
        }))?;
        self.injected.call_as("signMultipleTransactions", vec![json!(token)]).await
    }

    async fn sign_message(&self, message: &str, kind: MessageSigningType) -> WalletResult<String> {
        let protocol = match kind {
            MessageSigningType::Bip322Simple => "BIP322",
            MessageSigningType::Ecdsa => "ECDSA",
        };
        let address = self.get_address().await?;
        let result = self
            .request("signMessage", Some(json!({ "address": address, "message": message, "protocol": protocol })))
            .await?;
        result
            .get("signature")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| WalletError::invalid("signMessage result without signature"))
    }

    async fn send_bitcoin(&self, to: &str, amount_sats: u64) -> WalletResult<String> {
        let result = self
            .request("sendTransfer", Some(json!({ "recipients": [{ "address": to, "amount": amount_sats }] })))
            .await?;
        result
            .get("txid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| WalletError::invalid("sendTransfer result without txid"))
    }

    async fn get_balance(&self) -> WalletResult<u64> {
        let result = self.request("getBalance", None).await?;
        super::balance_from(&result, Some("confirmed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsecured_token_shape() {
        let token = unsecured_token(&json!({ "message": "Sign Transaction" })).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], "");
        let header: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header, json!({ "typ": "JWT", "alg": "none" }));
        let body: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(body["message"], "Sign Transaction");
    }

    #[test]
    fn test_public_key_prefix() {
        let x_only = "a".repeat(64);
        assert_eq!(compressed_public_key(&x_only), format!("03{}", x_only));
        let compressed = format!("02{}", x_only);
        assert_eq!(compressed_public_key(&compressed), compressed);
    }

    #[test]
    fn test_network_from_address() {
        assert_eq!(network_from_address("bc1pxyz").unwrap(), Network::Mainnet);
        assert_eq!(network_from_address("tb1qxyz").unwrap(), Network::Signet);
        assert!(network_from_address("1BoatSLRHtKNngkdXEeobR76b53LETtpyT").is_err());
    }
}
