//! UniSat-style injected Bitcoin object: `requestAccounts`, `getPublicKey`, `signPsbt`, ...
//!
//! Most brands copy UniSat's method names. Adapters hold one [`InjectedBtc`] and override
//! only what their brand does differently.

use std::cell::RefCell;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{WalletError, WalletResult};
use crate::host::{call_as, InjectedObject, Listener};
use crate::types::{InscriptionResult, MessageSigningType};

pub struct InjectedBtc {
    object: RefCell<Rc<dyn InjectedObject>>,
    wallet: &'static str,
}

impl std::fmt::Debug for InjectedBtc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectedBtc").field("wallet", &self.wallet).finish_non_exhaustive()
    }
}

/// Balance out of a wallet response: the number itself, or `field` of an object.
/// Numeric strings are accepted.
pub fn balance_from(value: &Value, field: Option<&str>) -> WalletResult<u64> {
    let raw = match field {
        Some(field) => value.get(field).unwrap_or(&Value::Null),
        None => value,
    };
    match raw {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| WalletError::invalid(format!("balance {}", n))),
        Value::String(s) => s.trim().parse().map_err(|_| WalletError::invalid(format!("balance {:?}", s))),
        other => Err(WalletError::invalid(format!("balance {}", other))),
    }
}

impl InjectedBtc {
    /// `wallet` is the human name used in error messages ("UniSat Wallet").
    pub fn new(object: Rc<dyn InjectedObject>, wallet: &'static str) -> Self {
        Self { object: RefCell::new(object), wallet }
    }

    pub fn wallet(&self) -> &'static str { self.wallet }

    pub fn object(&self) -> Rc<dyn InjectedObject> { self.object.borrow().clone() }

    /// Swaps the handle (OKX keeps one object per network).
    pub fn replace(&self, object: Rc<dyn InjectedObject>) { *self.object.borrow_mut() = object; }

    pub async fn call(&self, method: &str, args: Vec<Value>) -> WalletResult<Value> {
        let object = self.object();
        object.call(method, args).await
    }

    pub async fn call_as<T: DeserializeOwned>(&self, method: &str, args: Vec<Value>) -> WalletResult<T> {
        let object = self.object();
        call_as(object.as_ref(), method, args).await
    }

    /// Non-empty string result, or `NotConnected`.
    async fn call_string(&self, method: &str, args: Vec<Value>) -> WalletResult<String> {
        let value: Option<String> = self.call_as(method, args).await?;
        value.filter(|s| !s.is_empty()).ok_or_else(|| WalletError::NotConnected(self.wallet.to_string()))
    }

    fn first_account(&self, accounts: Option<Vec<String>>) -> WalletResult<String> {
        accounts
            .and_then(|a| a.into_iter().next())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| WalletError::NotConnected(self.wallet.to_string()))
    }

    pub async fn request_accounts(&self) -> WalletResult<String> {
        let accounts = self.call_as("requestAccounts", vec![]).await?;
        self.first_account(accounts)
    }

    pub async fn get_accounts(&self) -> WalletResult<String> {
        let accounts = self.call_as("getAccounts", vec![]).await?;
        self.first_account(accounts)
    }

    pub async fn get_public_key(&self) -> WalletResult<String> { self.call_string("getPublicKey", vec![]).await }

    pub async fn get_network(&self) -> WalletResult<String> { self.call_string("getNetwork", vec![]).await }

    pub async fn switch_network(&self, name: &str) -> WalletResult<()> {
        self.call("switchNetwork", vec![json!(name)]).await.map(|_| ())
    }

    pub async fn sign_psbt(&self, psbt_hex: &str) -> WalletResult<String> {
        self.call_as("signPsbt", vec![json!(psbt_hex)]).await
    }

    pub async fn sign_psbts(&self, psbts_hexes: &[String]) -> WalletResult<Vec<String>> {
        self.call_as("signPsbts", vec![json!(psbts_hexes)]).await
    }

    pub async fn sign_message(&self, message: &str, kind: MessageSigningType) -> WalletResult<String> {
        self.call_as("signMessage", vec![json!(message), json!(kind.as_str())]).await
    }

    pub async fn send_bitcoin(&self, to: &str, amount_sats: u64) -> WalletResult<String> {
        self.call_as("sendBitcoin", vec![json!(to), json!(amount_sats)]).await
    }

    pub async fn push_tx(&self, tx_hex: &str) -> WalletResult<String> {
        self.call_as("pushTx", vec![json!(tx_hex)]).await
    }

    pub async fn get_balance(&self, field: Option<&str>) -> WalletResult<u64> {
        let value = self.call("getBalance", vec![]).await?;
        balance_from(&value, field)
    }

    pub async fn get_inscriptions(&self, cursor: Option<u64>, size: Option<u64>) -> WalletResult<InscriptionResult> {
        self.call_as("getInscriptions", vec![json!(cursor), json!(size)]).await
    }

    pub fn has_method(&self, method: &str) -> bool { self.object().has_method(method) }

    pub fn on(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        self.object().listen("on", event, listener)
    }

    pub fn off(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        self.object().unlisten("off", event, listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryObject;

    #[test]
    fn test_balance_shapes() {
        assert_eq!(balance_from(&json!(1200), None).unwrap(), 1200);
        assert_eq!(balance_from(&json!({"confirmed": 5, "total": 9}), Some("total")).unwrap(), 9);
        assert_eq!(balance_from(&json!({"confirmed": "77"}), Some("confirmed")).unwrap(), 77);
        assert!(balance_from(&json!({"total": 9}), Some("confirmed")).is_err());
    }

    #[tokio::test]
    async fn test_empty_accounts_is_not_connected() {
        let object = MemoryObject::new().with_value("getAccounts", json!([]));
        let injected = InjectedBtc::new(object, "UniSat Wallet");
        assert_eq!(injected.get_accounts().await.unwrap_err(), WalletError::NotConnected("UniSat Wallet".into()));
    }

    #[tokio::test]
    async fn test_replace_swaps_handle() {
        let first = MemoryObject::new().with_value("getNetwork", json!("livenet"));
        let second = MemoryObject::new().with_value("getNetwork", json!("signet"));
        let injected = InjectedBtc::new(first, "OKX Wallet");
        assert_eq!(injected.get_network().await.unwrap(), "livenet");
        injected.replace(second);
        assert_eq!(injected.get_network().await.unwrap(), "signet");
    }
}
