//! Host environment: the explicit accessor adapters use instead of probing `window`.
//!
//! ```text
//! HostEnvironment (window / fake)
//!     │ root()
//!     ▼
//! InjectedObject ── child("okxwallet") ── child("bitcoin") ── call("connect", [])
//!                                                        └── listen("on", "accountsChanged", cb)
//! ```
//!
//! Adapters receive the host in [`ProviderOption`](crate::config::ProviderOption) and resolve
//! their brand's global path once, at construction. A missing path is
//! [`WalletError::ProviderNotFound`](crate::error::WalletError::ProviderNotFound).
//!
//! | Implementation | Where |
//! |----------------|-------|
//! | [`memory::MemoryHost`] | tests, native embedders |
//! | `wasm::JsHost` | browser (`wasm` feature) |

pub mod memory;

use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{WalletError, WalletResult};

/// Event callback. Identity is the `Rc` pointer: `unlisten` must receive the same `Rc`.
pub type Listener = Rc<dyn Fn(Value)>;

/// A wallet object injected by an extension or mobile app.
#[async_trait(?Send)]
pub trait InjectedObject {
    /// Nested object at `key` (e.g. `bitcoin` under `okxwallet`).
    fn child(&self, key: &str) -> Option<Rc<dyn InjectedObject>>;
    /// Plain data property (e.g. `selectedAddress`, `name`).
    fn property(&self, key: &str) -> Option<Value>;
    fn has_method(&self, method: &str) -> bool;
    /// Invokes `method(...args)`, awaiting the result if it is a promise.
    async fn call(&self, method: &str, args: Vec<Value>) -> WalletResult<Value>;
    /// `register_method(event, listener)`, e.g. `on("accountsChanged", cb)`. A missing
    /// register method is not an error.
    fn listen(&self, register_method: &str, event: &str, listener: &Listener) -> WalletResult<()>;
    /// Removes the registration made by [`listen`](Self::listen) with the same listener.
    fn unlisten(&self, unregister_method: &str, event: &str, listener: &Listener) -> WalletResult<()>;
}

/// The global scope adapters read wallets from.
pub trait HostEnvironment {
    fn root(&self) -> Rc<dyn InjectedObject>;
    /// Window-level custom event (`keplr_keystorechange`).
    fn add_event_listener(&self, event: &str, listener: &Listener) -> WalletResult<()>;
    fn remove_event_listener(&self, event: &str, listener: &Listener) -> WalletResult<()>;
}

/// Walks a dotted global path from the host root. `None` when any segment is missing.
pub fn resolve(host: &dyn HostEnvironment, path: &str) -> Option<Rc<dyn InjectedObject>> {
    path.split('.').try_fold(host.root(), |object, key| object.child(key))
}

/// [`resolve`], failing with `ProviderNotFound(wallet)`.
pub fn require(host: &dyn HostEnvironment, path: &str, wallet: &str) -> WalletResult<Rc<dyn InjectedObject>> {
    resolve(host, path).ok_or_else(|| WalletError::ProviderNotFound(wallet.to_string()))
}

/// Calls `method` and deserializes the result.
pub async fn call_as<T: serde::de::DeserializeOwned>(
    object: &dyn InjectedObject,
    method: &str,
    args: Vec<Value>,
) -> WalletResult<T> {
    let value = object.call(method, args).await?;
    serde_json::from_value(value).map_err(|e| WalletError::invalid(format!("{}: {}", method, e)))
}
