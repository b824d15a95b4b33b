//! WASM module: the adapters as a browser library
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        WalletBridge (JS API)            │
//! │  wallets, createBitcoin, createCosmos   │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │  BitcoinWalletHandle / CosmosWalletHandle│
//! │  every contract op, camelCase           │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │   JsHost / JsObject (window globals)    │
//! │   JsAirgapTransport (QR dialog)         │
//! └─────────────────────────────────────────┘
//! ```

mod bridge;
mod convert;
mod host;
mod transport;

pub use bridge::{BitcoinWalletHandle, CosmosWalletHandle, OfflineSignerHandle, WalletBridge};
pub use host::{JsHost, JsObject};
pub use transport::JsAirgapTransport;

use wasm_bindgen::prelude::*;

/// Initialize WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

macro_rules! log {
    ($($t:tt)*) => {
        crate::wasm::console_log(&format!($($t)*))
    }
}

pub(crate) use log;
