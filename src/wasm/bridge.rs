//! WalletBridge: JS entry point
//!
//! ```js
//! const wallet = WalletBridge.createBitcoin("bitcoin_okx", { chains: [{ network: "signet" }] });
//! await wallet.connectWallet();
//! const txid = await wallet.sendBitcoin("tb1q...", 10_000);
//! ```
//!
//! Every handle method mirrors the Rust contract. Errors reject with a JS `Error`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use js_sys::{Function, Object, Reflect};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

use super::convert::{js_error, to_js, to_json};
use super::host::JsHost;
use super::log;
use super::transport::JsAirgapTransport;
use crate::airgap::{AirgapSession, UrRelay};
use crate::btc::BitcoinWallet;
use crate::catalog::{connect_bitcoin, connect_cosmos, wallet_list};
use crate::config::{ChainConfig, ProviderOption};
use crate::cosmos::{ArbitraryData, CosmosWallet, OfflineSigner, StdSignDoc};
use crate::error::WalletError;
use crate::host::Listener;
use crate::types::{MessageSigningType, Network};
use crate::units::parse_units;

/// Largest integer a JS number holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BridgeOptions {
    chains: Vec<ChainConfig>,
    airgap_timeout_ms: Option<u64>,
    airgap_fragment_length: Option<usize>,
}

/// `{ chains, airgap?, airgapTimeoutMs?, airgapFragmentLength? }` → [`ProviderOption`] over the browser host.
fn provider_option(options: &JsValue) -> Result<ProviderOption, JsValue> {
    let parsed: BridgeOptions = if options.is_undefined() || options.is_null() {
        BridgeOptions::default()
    } else {
        serde_json::from_value(to_json(options)).map_err(|e| js_error(WalletError::invalid(e)))?
    };

    let mut option = ProviderOption::new(Rc::new(JsHost));
    for chain in parsed.chains {
        option = option.with_chain(chain);
    }
    let airgap = Reflect::get(options, &JsValue::from_str("airgap")).ok().filter(|t| t.is_object());
    if let Some(transport) = airgap {
        let mut relay = UrRelay::new(Rc::new(JsAirgapTransport::new(transport)));
        if let Some(length) = parsed.airgap_fragment_length {
            relay = relay.with_fragment_length(length);
        }
        let mut session = AirgapSession::new(Rc::new(relay));
        if let Some(ms) = parsed.airgap_timeout_ms {
            session = session.with_timeout(Duration::from_millis(ms));
        }
        option = option.with_airgap_session(session);
    }
    Ok(option)
}

/// A JS number that must be a non-negative integer (sats, cursors, page sizes).
fn whole(value: f64) -> Result<u64, JsValue> {
    if value.fract() != 0.0 || !(0.0..=MAX_SAFE_INTEGER).contains(&value) {
        return Err(js_error(WalletError::invalid(format!("{} is not a non-negative integer", value))));
    }
    Ok(value as u64)
}

fn big_int(value: u128) -> Result<JsValue, JsValue> {
    js_sys::BigInt::new(&JsValue::from_str(&value.to_string())).map(JsValue::from).map_err(JsValue::from)
}

/// JS callbacks registered through a handle, with the Rust listener standing in for each.
#[derive(Default)]
struct Subscriptions {
    entries: RefCell<Vec<(String, Function, Listener)>>,
}

impl Subscriptions {
    fn add(&self, event: &str, callback: Function) -> Listener {
        let target = callback.clone();
        let listener: Listener = Rc::new(move |payload| {
            if let Ok(value) = to_js(&payload) {
                let _ = target.call1(&JsValue::NULL, &value);
            }
        });
        self.entries.borrow_mut().push((event.to_string(), callback, listener.clone()));
        listener
    }

    fn remove(&self, event: &str, callback: &Function) -> Option<Listener> {
        let mut entries = self.entries.borrow_mut();
        let index = entries.iter().position(|(e, f, _)| e == event && Object::is(f, callback))?;
        Some(entries.remove(index).2)
    }
}

#[wasm_bindgen]
pub struct WalletBridge;

#[wasm_bindgen]
impl WalletBridge {
    /// Catalog entries: `{ id, name, icon, chainType, type }`.
    #[wasm_bindgen]
    pub fn wallets() -> Result<JsValue, JsValue> { to_js(wallet_list()) }

    #[wasm_bindgen(js_name = "createBitcoin")]
    pub fn create_bitcoin(id: &str, options: JsValue) -> Result<BitcoinWalletHandle, JsValue> {
        log!("[WalletBridge] create bitcoin {}", id);
        let inner = connect_bitcoin(id, provider_option(&options)?).map_err(js_error)?;
        Ok(BitcoinWalletHandle { inner, subscriptions: Subscriptions::default() })
    }

    #[wasm_bindgen(js_name = "createCosmos")]
    pub fn create_cosmos(id: &str, options: JsValue) -> Result<CosmosWalletHandle, JsValue> {
        log!("[WalletBridge] create cosmos {}", id);
        let inner = connect_cosmos(id, provider_option(&options)?).map_err(js_error)?;
        Ok(CosmosWalletHandle { inner, subscriptions: Subscriptions::default() })
    }
}

/// Decimal string → base units as a `BigInt`.
#[wasm_bindgen(js_name = "parseUnits")]
pub fn parse_units_js(value: &str, decimals: u32) -> Result<JsValue, JsValue> {
    big_int(parse_units(value, decimals).map_err(js_error)?)
}

#[wasm_bindgen]
pub struct BitcoinWalletHandle {
    inner: Box<dyn BitcoinWallet>,
    subscriptions: Subscriptions,
}

#[wasm_bindgen]
impl BitcoinWalletHandle {
    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String { self.inner.descriptor().id.to_string() }

    #[wasm_bindgen(js_name = "getWalletProviderName")]
    pub fn name(&self) -> String { self.inner.descriptor().name.to_string() }

    #[wasm_bindgen(js_name = "getWalletProviderIcon")]
    pub fn icon(&self) -> String { self.inner.descriptor().icon.to_string() }

    #[wasm_bindgen(js_name = "connectWallet")]
    pub async fn connect_wallet(&self) -> Result<(), JsValue> { self.inner.connect_wallet().await.map_err(js_error) }

    #[wasm_bindgen(js_name = "getAddress")]
    pub async fn get_address(&self) -> Result<String, JsValue> { self.inner.get_address().await.map_err(js_error) }

    #[wasm_bindgen(js_name = "getPublicKeyHex")]
    pub async fn get_public_key_hex(&self) -> Result<String, JsValue> {
        self.inner.get_public_key_hex().await.map_err(js_error)
    }

    #[wasm_bindgen(js_name = "getNetwork")]
    pub async fn get_network(&self) -> Result<String, JsValue> {
        Ok(self.inner.get_network().await.map_err(js_error)?.as_str().to_string())
    }

    #[wasm_bindgen(js_name = "switchNetwork")]
    pub async fn switch_network(&self, network: &str) -> Result<(), JsValue> {
        let network = Network::parse(network).map_err(js_error)?;
        self.inner.switch_network(network).await.map_err(js_error)
    }

    #[wasm_bindgen(js_name = "signPsbt")]
    pub async fn sign_psbt(&self, psbt_hex: &str) -> Result<String, JsValue> {
        self.inner.sign_psbt(psbt_hex).await.map_err(js_error)
    }

    #[wasm_bindgen(js_name = "signPsbts")]
    pub async fn sign_psbts(&self, psbts_hexes: JsValue) -> Result<JsValue, JsValue> {
        let hexes: Vec<String> = serde_wasm_bindgen::from_value(psbts_hexes)?;
        to_js(&self.inner.sign_psbts(&hexes).await.map_err(js_error)?)
    }

    /// `kind` is `"ecdsa"` (default) or `"bip322-simple"`.
    #[wasm_bindgen(js_name = "signMessage")]
    pub async fn sign_message(&self, message: &str, kind: Option<String>) -> Result<String, JsValue> {
        let kind = match kind.as_deref() {
            None => MessageSigningType::Ecdsa,
            Some(kind) => serde_json::from_value(serde_json::Value::String(kind.to_string()))
                .map_err(|e| js_error(WalletError::invalid(e)))?,
        };
        self.inner.sign_message(message, kind).await.map_err(js_error)
    }

    #[wasm_bindgen(js_name = "signMessageBIP322")]
    pub async fn sign_message_bip322(&self, message: &str) -> Result<String, JsValue> {
        self.inner.sign_message_bip322(message).await.map_err(js_error)
    }

    #[wasm_bindgen(js_name = "sendBitcoin")]
    pub async fn send_bitcoin(&self, to: &str, amount: f64) -> Result<String, JsValue> {
        self.inner.send_bitcoin(to, whole(amount)?).await.map_err(js_error)
    }

    #[wasm_bindgen(js_name = "pushTx")]
    pub async fn push_tx(&self, tx_hex: &str) -> Result<String, JsValue> { self.inner.push_tx(tx_hex).await.map_err(js_error) }

    #[wasm_bindgen(js_name = "getBalance")]
    pub async fn get_balance(&self) -> Result<f64, JsValue> {
        Ok(self.inner.get_balance().await.map_err(js_error)? as f64)
    }

    #[wasm_bindgen(js_name = "getUtxos")]
    pub async fn get_utxos(&self, address: &str, amount: Option<f64>) -> Result<JsValue, JsValue> {
        let amount = amount.map(whole).transpose()?;
        to_js(&self.inner.get_utxos(address, amount).await.map_err(js_error)?)
    }

    #[wasm_bindgen(js_name = "getBTCTipHeight")]
    pub async fn get_btc_tip_height(&self) -> Result<u32, JsValue> {
        self.inner.get_btc_tip_height().await.map_err(js_error)
    }

    #[wasm_bindgen(js_name = "getNetworkFees")]
    pub async fn get_network_fees(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.get_network_fees().await.map_err(js_error)?)
    }

    #[wasm_bindgen(js_name = "getInscriptions")]
    pub async fn get_inscriptions(&self, cursor: Option<f64>, size: Option<f64>) -> Result<JsValue, JsValue> {
        let cursor = cursor.map(whole).transpose()?;
        let size = size.map(whole).transpose()?;
        to_js(&self.inner.get_inscriptions(cursor, size).await.map_err(js_error)?)
    }

    #[wasm_bindgen]
    pub fn on(&self, event: &str, callback: Function) -> Result<(), JsValue> {
        let listener = self.subscriptions.add(event, callback);
        self.inner.on(event, &listener).map_err(js_error)
    }

    #[wasm_bindgen]
    pub fn off(&self, event: &str, callback: Function) -> Result<(), JsValue> {
        match self.subscriptions.remove(event, &callback) {
            Some(listener) => self.inner.off(event, &listener).map_err(js_error),
            None => Ok(()),
        }
    }
}

#[wasm_bindgen]
pub struct CosmosWalletHandle {
    inner: Box<dyn CosmosWallet>,
    subscriptions: Subscriptions,
}

#[wasm_bindgen]
impl CosmosWalletHandle {
    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String { self.inner.descriptor().id.to_string() }

    #[wasm_bindgen(js_name = "getWalletProviderName")]
    pub fn name(&self) -> String { self.inner.descriptor().name.to_string() }

    #[wasm_bindgen(js_name = "getWalletProviderIcon")]
    pub fn icon(&self) -> String { self.inner.descriptor().icon.to_string() }

    #[wasm_bindgen(js_name = "connectWallet")]
    pub async fn connect_wallet(&self) -> Result<(), JsValue> { self.inner.connect_wallet().await.map_err(js_error) }

    #[wasm_bindgen(js_name = "getAddress")]
    pub async fn get_address(&self) -> Result<String, JsValue> { self.inner.get_address().await.map_err(js_error) }

    /// Chain id.
    #[wasm_bindgen(js_name = "getNetwork")]
    pub async fn get_network(&self) -> Result<String, JsValue> { self.inner.get_network().await.map_err(js_error) }

    #[wasm_bindgen(js_name = "signAmino")]
    pub async fn sign_amino(&self, signer: &str, sign_doc: JsValue, options: JsValue) -> Result<JsValue, JsValue> {
        let doc: StdSignDoc = serde_json::from_value(to_json(&sign_doc)).map_err(|e| js_error(WalletError::invalid(e)))?;
        let options = Some(to_json(&options)).filter(|o| !o.is_null());
        to_js(&self.inner.sign_amino(signer, &doc, options).await.map_err(js_error)?)
    }

    /// `data` is a string or a `Uint8Array`.
    #[wasm_bindgen(js_name = "signArbitrary")]
    pub async fn sign_arbitrary(&self, signer: &str, data: JsValue) -> Result<JsValue, JsValue> {
        let data: ArbitraryData = serde_json::from_value(to_json(&data)).map_err(|e| js_error(WalletError::invalid(e)))?;
        to_js(&self.inner.sign_arbitrary(signer, &data).await.map_err(js_error)?)
    }

    /// Balance of `denom` as a `BigInt`.
    #[wasm_bindgen(js_name = "getBalance")]
    pub async fn get_balance(&self, denom: &str) -> Result<JsValue, JsValue> {
        big_int(self.inner.get_balance(denom).await.map_err(js_error)?)
    }

    #[wasm_bindgen(js_name = "getPublicKeyHex")]
    pub async fn get_public_key_hex(&self) -> Result<String, JsValue> {
        self.inner.get_public_key_hex().await.map_err(js_error)
    }

    #[wasm_bindgen(js_name = "getOfflineSigner")]
    pub async fn get_offline_signer(&self) -> Result<OfflineSignerHandle, JsValue> {
        Ok(OfflineSignerHandle { inner: self.inner.get_offline_signer().await.map_err(js_error)? })
    }

    #[wasm_bindgen]
    pub fn on(&self, event: &str, callback: Function) -> Result<(), JsValue> {
        let listener = self.subscriptions.add(event, callback);
        self.inner.on(event, &listener).map_err(js_error)
    }

    #[wasm_bindgen]
    pub fn off(&self, event: &str, callback: Function) -> Result<(), JsValue> {
        match self.subscriptions.remove(event, &callback) {
            Some(listener) => self.inner.off(event, &listener).map_err(js_error),
            None => Ok(()),
        }
    }
}

/// cosmjs `OfflineAminoSigner`.
#[wasm_bindgen]
pub struct OfflineSignerHandle {
    inner: OfflineSigner,
}

#[wasm_bindgen]
impl OfflineSignerHandle {
    #[wasm_bindgen(js_name = "getAccounts")]
    pub async fn get_accounts(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.get_accounts().await.map_err(js_error)?)
    }

    #[wasm_bindgen(js_name = "signAmino")]
    pub async fn sign_amino(&self, signer: &str, sign_doc: JsValue) -> Result<JsValue, JsValue> {
        let doc: StdSignDoc = serde_json::from_value(to_json(&sign_doc)).map_err(|e| js_error(WalletError::invalid(e)))?;
        to_js(&self.inner.sign_amino(signer, &doc).await.map_err(js_error)?)
    }
}
