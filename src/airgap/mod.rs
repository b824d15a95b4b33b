//! QR relay to airgapped signers (Keystone).
//!
//! One signing step is a fixed handshake: show a QR with the request, then scan the QR
//! the device answers with.
//!
//! ```text
//! AirgapSession::round_trip(request, expect)
//!   ├─► transport.play(request, PLAY_PROMPT)    non-success → "Could not generate the QR code…"
//!   └─► transport.read(expect, READ_PROMPT)     non-success → "Could not extract the signature…"
//! ```
//!
//! Requests and payloads cross the air gap as Uniform Resources: [`UrRelay`] encodes each
//! request to CBOR ([`registry`]), splits it into QR parts, and decodes the scanned UR back.
//! Rendering and scanning belong to a [`UrTransport`] (the browser's `wasm::JsAirgapTransport`).
//! [`AirgapTransport`] is the seam between the session and the relay, where tests script a
//! device directly. The session has no timeout unless one is configured.

pub mod registry;
mod relay;

pub use relay::{ScanOutcome, Scanned, Ur, UrRelay, UrTransport, DEFAULT_FRAGMENT_LENGTH};

use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, Either};
use futures_timer::Delay;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{WalletError, WalletResult};

const PLAY_FAILED: &str = "Could not generate the QR code, please try again.";
const READ_FAILED: &str = "Could not extract the signature, please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayStatus { Success, Failed, Canceled }

/// UR type the scanner should accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    CryptoAccount,
    CryptoMultiAccounts,
    CryptoPsbt,
    BtcSignature,
    CosmosSignature,
}

impl ResultKind {
    pub fn ur_type(self) -> &'static str {
        match self {
            ResultKind::CryptoAccount => registry::CRYPTO_ACCOUNT,
            ResultKind::CryptoMultiAccounts => registry::CRYPTO_MULTI_ACCOUNTS,
            ResultKind::CryptoPsbt => registry::CRYPTO_PSBT,
            ResultKind::BtcSignature => registry::BTC_SIGNATURE,
            ResultKind::CosmosSignature => registry::COSMOS_SIGNATURE,
        }
    }
}

/// Text shown around the QR code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub title: String,
    pub description: String,
    /// Numbered setup steps shown before the first scan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_error_message: Option<String>,
}

impl Prompt {
    pub fn new(title: &str, description: &str) -> Self {
        Self { title: title.into(), description: description.into(), ..Default::default() }
    }
    pub fn with_steps(mut self, steps: &[&str]) -> Self {
        self.steps = steps.iter().map(|s| s.to_string()).collect();
        self
    }
    pub fn with_type_error(mut self, message: &str) -> Self {
        self.type_error_message = Some(message.into());
        self
    }
}

pub fn play_prompt() -> Prompt {
    Prompt::new("Scan the QR Code", "Please scan the QR code with your Keystone device.")
}

pub fn read_prompt() -> Prompt {
    Prompt::new("Get the Signature from Keystone", "Please scan the QR code displayed on your Keystone")
        .with_type_error("The scanned QR code can't be read. please verify and try again.")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKey {
    pub path: String,
    #[serde(default)]
    pub extended_public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiAccountKey {
    pub chain: String,
    pub path: String,
    /// Compressed secp256k1 key, hex.
    pub public_key: String,
}

/// Decoded content of a scanned QR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AirgapPayload {
    Account { master_fingerprint: String, keys: Vec<AccountKey> },
    MultiAccounts { master_fingerprint: String, keys: Vec<MultiAccountKey> },
    Psbt { psbt_hex: String },
    BtcSignature { signature: String },
    CosmosSignature { signature: String, public_key: String },
}

/// What the QR code shown to the device carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AirgapRequest {
    Psbt { psbt_hex: String },
    BtcSignMessage { request_id: String, sign_data: String, path: String, xfp: String, address: String, origin: String },
    /// `data_type` is `amino` or `direct`.
    CosmosSign { request_id: String, sign_data: String, data_type: String, path: String, xfp: String, address: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "camelCase")]
pub enum ReadOutcome {
    Success(AirgapPayload),
    Canceled,
    Failed,
}

/// Shows requests and scans payloads, already decoded. [`UrRelay`] implements it over a
/// [`UrTransport`].
#[async_trait(?Send)]
pub trait AirgapTransport {
    async fn play(&self, request: &AirgapRequest, prompt: &Prompt) -> WalletResult<PlayStatus>;
    async fn read(&self, kind: ResultKind, prompt: &Prompt) -> WalletResult<ReadOutcome>;
}

#[derive(Clone)]
pub struct AirgapSession {
    transport: Rc<dyn AirgapTransport>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for AirgapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirgapSession").field("timeout", &self.timeout).finish_non_exhaustive()
    }
}

impl AirgapSession {
    pub fn new(transport: Rc<dyn AirgapTransport>) -> Self { Self { transport, timeout: None } }

    /// Bounds every play and read. Without it a scan that never completes waits forever.
    pub fn with_timeout(mut self, timeout: Duration) -> Self { self.timeout = Some(timeout); self }

    pub fn timeout(&self) -> Option<Duration> { self.timeout }

    async fn bounded<T>(&self, step: impl Future<Output = WalletResult<T>>) -> WalletResult<T> {
        let Some(limit) = self.timeout else { return step.await };
        let step = std::pin::pin!(step);
        match future::select(step, Delay::new(limit)).await {
            Either::Left((result, _)) => result,
            Either::Right(_) => {
                warn!("airgap step timed out after {:?}", limit);
                Err(WalletError::Airgap(format!("timed out after {} ms waiting for the QR scan", limit.as_millis())))
            }
        }
    }

    /// Single scan (device sync). Canceled and failed scans are returned, not raised.
    pub async fn read(&self, kind: ResultKind, prompt: &Prompt) -> WalletResult<ReadOutcome> {
        self.bounded(self.transport.read(kind, prompt)).await
    }

    /// Show `request`, then scan a `expect` answer.
    pub async fn round_trip(&self, request: &AirgapRequest, expect: ResultKind) -> WalletResult<AirgapPayload> {
        debug!("airgap round trip, expecting {:?}", expect);
        let status = self.bounded(self.transport.play(request, &play_prompt())).await?;
        if status != PlayStatus::Success {
            return Err(WalletError::Airgap(PLAY_FAILED.into()));
        }
        match self.read(expect, &read_prompt()).await? {
            ReadOutcome::Success(payload) => Ok(payload),
            ReadOutcome::Canceled | ReadOutcome::Failed => Err(WalletError::Airgap(READ_FAILED.into())),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Plays succeed unless told otherwise; reads pop scripted outcomes.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub play_status: RefCell<Option<PlayStatus>>,
        pub reads: RefCell<VecDeque<ReadOutcome>>,
        pub played: RefCell<Vec<AirgapRequest>>,
        pub hang: bool,
    }

    #[async_trait(?Send)]
    impl AirgapTransport for ScriptedTransport {
        async fn play(&self, request: &AirgapRequest, _prompt: &Prompt) -> WalletResult<PlayStatus> {
            self.played.borrow_mut().push(request.clone());
            Ok(self.play_status.borrow().unwrap_or(PlayStatus::Success))
        }
        async fn read(&self, _kind: ResultKind, _prompt: &Prompt) -> WalletResult<ReadOutcome> {
            if self.hang {
                future::pending::<()>().await;
            }
            Ok(self.reads.borrow_mut().pop_front().unwrap_or(ReadOutcome::Failed))
        }
    }

    fn session(transport: ScriptedTransport) -> (Rc<ScriptedTransport>, AirgapSession) {
        let transport = Rc::new(transport);
        (transport.clone(), AirgapSession::new(transport))
    }

    #[tokio::test]
    async fn test_round_trip_returns_scanned_payload() {
        let transport = ScriptedTransport::default();
        transport.reads.borrow_mut().push_back(ReadOutcome::Success(AirgapPayload::BtcSignature { signature: "ab".into() }));
        let (transport, session) = session(transport);
        let request = AirgapRequest::Psbt { psbt_hex: "70736274ff".into() };
        let payload = session.round_trip(&request, ResultKind::BtcSignature).await.unwrap();
        assert_eq!(payload, AirgapPayload::BtcSignature { signature: "ab".into() });
        assert_eq!(transport.played.borrow().as_slice(), &[request]);
    }

    #[tokio::test]
    async fn test_failed_play_never_reads() {
        let transport = ScriptedTransport::default();
        *transport.play_status.borrow_mut() = Some(PlayStatus::Canceled);
        transport.reads.borrow_mut().push_back(ReadOutcome::Canceled);
        let (transport, session) = session(transport);
        let err = session.round_trip(&AirgapRequest::Psbt { psbt_hex: String::new() }, ResultKind::CryptoPsbt).await.unwrap_err();
        assert_eq!(err.message(), PLAY_FAILED);
        assert_eq!(transport.reads.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_canceled_read_fails_round_trip() {
        let transport = ScriptedTransport::default();
        transport.reads.borrow_mut().push_back(ReadOutcome::Canceled);
        let (_, session) = session(transport);
        let err = session.round_trip(&AirgapRequest::Psbt { psbt_hex: String::new() }, ResultKind::CryptoPsbt).await.unwrap_err();
        assert_eq!(err, WalletError::Airgap(READ_FAILED.into()));
    }

    #[tokio::test]
    async fn test_timeout_bounds_a_hung_scan() {
        let (_, session) = session(ScriptedTransport { hang: true, ..Default::default() });
        let session = session.with_timeout(Duration::from_millis(20));
        let err = session.read(ResultKind::CryptoAccount, &Prompt::default()).await.unwrap_err();
        assert!(err.message().starts_with("timed out"));
    }

    #[test]
    fn test_wire_shapes() {
        let outcome: ReadOutcome = serde_json::from_value(json!({
            "status": "success",
            "result": {"type": "cosmosSignature", "signature": "00", "publicKey": "02"}
        }))
        .unwrap();
        assert_eq!(outcome, ReadOutcome::Success(AirgapPayload::CosmosSignature { signature: "00".into(), public_key: "02".into() }));
        assert_eq!(serde_json::to_value(ReadOutcome::Canceled).unwrap(), json!({"status": "canceled"}));
        assert_eq!(serde_json::to_value(ResultKind::CryptoMultiAccounts).unwrap(), json!("crypto-multi-accounts"));
        let request = AirgapRequest::Psbt { psbt_hex: "ff".into() };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"type": "psbt", "psbtHex": "ff"}));
    }
}
