//! QR renderer/scanner backed by a JS object: `{ play(ur, prompt), read(urType, prompt) }`.
//!
//! Both methods may return promises. `play` receives `{ type, cbor, parts }` (cbor as hex,
//! `parts` ready for an animated QR) and resolves to `"success" | "failed" | "canceled"`.
//! `read` resolves to `{ status, result }` where `result` is the scanned QR text, every
//! scanned part, or an assembled `{ type, cbor }`.

use async_trait::async_trait;
use serde_json::json;
use wasm_bindgen::JsValue;

use super::host::JsObject;
use crate::airgap::{PlayStatus, Prompt, ResultKind, ScanOutcome, Ur, UrTransport};
use crate::error::{WalletError, WalletResult};
use crate::host::InjectedObject;

#[derive(Debug, Clone)]
pub struct JsAirgapTransport {
    object: JsObject,
}

impl JsAirgapTransport {
    pub fn new(value: JsValue) -> Self { Self { object: JsObject::new(value) } }
}

#[async_trait(?Send)]
impl UrTransport for JsAirgapTransport {
    async fn play(&self, ur: &Ur, parts: &[String], prompt: &Prompt) -> WalletResult<PlayStatus> {
        let qr = json!({ "type": ur.ur_type, "cbor": hex::encode(&ur.cbor), "parts": parts });
        let status = self.object.call("play", vec![qr, serde_json::to_value(prompt)?]).await?;
        serde_json::from_value(status).map_err(|e| WalletError::invalid(format!("play status: {}", e)))
    }

    async fn read(&self, kind: ResultKind, prompt: &Prompt) -> WalletResult<ScanOutcome> {
        let args = vec![json!(kind.ur_type()), serde_json::to_value(prompt)?];
        let outcome = self.object.call("read", args).await?;
        serde_json::from_value(outcome).map_err(|e| WalletError::invalid(format!("read result: {}", e)))
    }
}
