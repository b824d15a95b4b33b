//! Uniform Resources (BC-UR) over the QR transport.
//!
//! [`UrRelay`] is the [`AirgapTransport`] the adapters run on outside tests: it encodes each
//! request as a UR, splits it into animated-QR parts for the renderer, and assembles what the
//! scanner hands back into a payload.

use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use super::registry::{decode_payload, encode_request};
use super::{AirgapRequest, AirgapTransport, PlayStatus, Prompt, ReadOutcome, ResultKind};
use crate::error::{WalletError, WalletResult};

/// Bytes per QR fragment. Keystone renders 400 by default.
pub const DEFAULT_FRAGMENT_LENGTH: usize = 400;

const TYPE_MISMATCH: &str = "unexpected UR type";

/// A typed CBOR message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ur {
    #[serde(rename = "type")]
    pub ur_type: String,
    /// Hex on output. Input also accepts a byte array (a JS `Uint8Array`).
    #[serde(serialize_with = "cbor_hex", deserialize_with = "cbor_bytes")]
    pub cbor: Vec<u8>,
}

fn cbor_hex<S: Serializer>(cbor: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(cbor))
}

fn cbor_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Hex(String),
        Bytes(Vec<u8>),
    }
    match Repr::deserialize(deserializer)? {
        Repr::Hex(text) => hex::decode(text).map_err(serde::de::Error::custom),
        Repr::Bytes(bytes) => Ok(bytes),
    }
}

fn ur_error(context: &str, err: impl std::fmt::Debug) -> WalletError {
    WalletError::Airgap(format!("{}: {:?}", context, err))
}

impl Ur {
    pub fn new(ur_type: &str, cbor: Vec<u8>) -> Self { Self { ur_type: ur_type.into(), cbor } }

    /// `ur:<type>/<seq>-<count>/<fragment>` strings, one per QR frame.
    pub fn to_parts(&self, max_fragment_length: usize) -> WalletResult<Vec<String>> {
        let mut encoder =
            ur::Encoder::new(&self.cbor, max_fragment_length, &self.ur_type).map_err(|e| ur_error("UR encode", e))?;
        (0..encoder.fragment_count())
            .map(|_| encoder.next_part().map_err(|e| ur_error("UR encode", e)))
            .collect()
    }

    /// Reassembles scanned parts. Case-insensitive, so alphanumeric-mode QR text is accepted.
    pub fn from_parts(parts: &[String]) -> WalletResult<Self> {
        let parts: Vec<String> = parts.iter().map(|p| p.trim().to_ascii_lowercase()).collect();
        let first = parts.first().ok_or_else(|| WalletError::Airgap("no UR parts scanned".into()))?;
        let ur_type = first
            .strip_prefix("ur:")
            .and_then(|rest| rest.split('/').next())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WalletError::Airgap(format!("not a UR: {}", first)))?
            .to_string();

        // `ur:<type>/<body>` has no sequence segment
        if parts.len() == 1 && first.matches('/').count() == 1 {
            let (_, cbor) = ur::decode(first).map_err(|e| ur_error("UR decode", e))?;
            return Ok(Self { ur_type, cbor });
        }

        let mut decoder = ur::Decoder::default();
        for part in &parts {
            if !part.starts_with(&format!("ur:{}/", ur_type)) {
                return Err(WalletError::Airgap(format!("mixed UR types in scan: {}", part)));
            }
            decoder.receive(part).map_err(|e| ur_error("UR decode", e))?;
            if decoder.complete() {
                break;
            }
        }
        if !decoder.complete() {
            return Err(WalletError::Airgap(format!("incomplete UR: {} parts scanned", parts.len())));
        }
        match decoder.message().map_err(|e| ur_error("UR decode", e))? {
            Some(cbor) => Ok(Self { ur_type, cbor }),
            None => Err(WalletError::Airgap("incomplete UR".into())),
        }
    }
}

/// What the scanner returns: raw QR text, all scanned parts, or an already assembled UR.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Scanned {
    Text(String),
    Parts(Vec<String>),
    Assembled(Ur),
}

impl Scanned {
    pub fn into_ur(self) -> WalletResult<Ur> {
        match self {
            Scanned::Text(text) => Ur::from_parts(&[text]),
            Scanned::Parts(parts) => Ur::from_parts(&parts),
            Scanned::Assembled(ur) => Ok(Ur { ur_type: ur.ur_type.to_ascii_lowercase(), ..ur }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "camelCase")]
pub enum ScanOutcome {
    Success(Scanned),
    Canceled,
    Failed,
}

/// Renders UR parts as an animated QR and scans UR QRs.
#[async_trait(?Send)]
pub trait UrTransport {
    async fn play(&self, ur: &Ur, parts: &[String], prompt: &Prompt) -> WalletResult<PlayStatus>;
    async fn read(&self, kind: ResultKind, prompt: &Prompt) -> WalletResult<ScanOutcome>;
}

/// Encodes requests to UR and decodes scans, on top of a [`UrTransport`].
pub struct UrRelay {
    transport: Rc<dyn UrTransport>,
    max_fragment_length: usize,
}

impl UrRelay {
    pub fn new(transport: Rc<dyn UrTransport>) -> Self {
        Self { transport, max_fragment_length: DEFAULT_FRAGMENT_LENGTH }
    }

    pub fn with_fragment_length(mut self, max_fragment_length: usize) -> Self {
        self.max_fragment_length = max_fragment_length.max(10);
        self
    }
}

#[async_trait(?Send)]
impl AirgapTransport for UrRelay {
    async fn play(&self, request: &AirgapRequest, prompt: &Prompt) -> WalletResult<PlayStatus> {
        let ur = encode_request(request)?;
        let parts = ur.to_parts(self.max_fragment_length)?;
        debug!("showing ur:{} in {} part(s)", ur.ur_type, parts.len());
        self.transport.play(&ur, &parts, prompt).await
    }

    async fn read(&self, kind: ResultKind, prompt: &Prompt) -> WalletResult<ReadOutcome> {
        let scanned = match self.transport.read(kind, prompt).await? {
            ScanOutcome::Success(scanned) => scanned,
            ScanOutcome::Canceled => return Ok(ReadOutcome::Canceled),
            ScanOutcome::Failed => return Ok(ReadOutcome::Failed),
        };
        let ur = scanned.into_ur()?;
        if ur.ur_type != kind.ur_type() {
            warn!("scanned ur:{} while expecting ur:{}", ur.ur_type, kind.ur_type());
            let message = prompt.type_error_message.clone().unwrap_or_else(|| TYPE_MISMATCH.into());
            return Err(WalletError::Airgap(message));
        }
        Ok(ReadOutcome::Success(decode_payload(&ur)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airgap::registry::encode_payload;
    use crate::airgap::{read_prompt, AirgapPayload, AirgapSession};
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Screen {
        shown: RefCell<Vec<(Ur, Vec<String>)>>,
        scans: RefCell<Vec<ScanOutcome>>,
    }

    #[async_trait(?Send)]
    impl UrTransport for Screen {
        async fn play(&self, ur: &Ur, parts: &[String], _prompt: &Prompt) -> WalletResult<PlayStatus> {
            self.shown.borrow_mut().push((ur.clone(), parts.to_vec()));
            Ok(PlayStatus::Success)
        }
        async fn read(&self, _kind: ResultKind, _prompt: &Prompt) -> WalletResult<ScanOutcome> {
            Ok(self.scans.borrow_mut().pop().unwrap_or(ScanOutcome::Failed))
        }
    }

    fn relay(screen: &Rc<Screen>, fragment_length: usize) -> UrRelay {
        UrRelay::new(screen.clone()).with_fragment_length(fragment_length)
    }

    #[test]
    fn test_parts_reassemble_in_any_case() {
        let ur = Ur::new("crypto-psbt", (0..=255u8).cycle().take(900).collect());
        let parts = ur.to_parts(100).unwrap();
        assert!(parts.len() > 1);
        assert!(parts[0].starts_with("ur:crypto-psbt/1-"));
        assert_eq!(Ur::from_parts(&parts).unwrap(), ur);

        let shouted: Vec<String> = parts.iter().map(|p| p.to_ascii_uppercase()).collect();
        assert_eq!(Ur::from_parts(&shouted).unwrap(), ur);
    }

    #[test]
    fn test_missing_parts_are_incomplete() {
        let ur = Ur::new("crypto-psbt", vec![7; 600]);
        let parts = ur.to_parts(100).unwrap();
        let err = Ur::from_parts(&parts[..1]).unwrap_err();
        assert!(matches!(err, WalletError::Airgap(_)));
        assert!(Ur::from_parts(&[]).is_err());
        assert!(Ur::from_parts(&["not a qr".to_string()]).is_err());
    }

    #[test]
    fn test_scanned_shapes() {
        let text: ScanOutcome = serde_json::from_value(json!({"status": "success", "result": "UR:CRYPTO-PSBT/ABC"})).unwrap();
        assert_eq!(text, ScanOutcome::Success(Scanned::Text("UR:CRYPTO-PSBT/ABC".into())));

        let parts: ScanOutcome = serde_json::from_value(json!({"status": "success", "result": ["ur:a/1-2/x", "ur:a/2-2/y"]})).unwrap();
        assert!(matches!(parts, ScanOutcome::Success(Scanned::Parts(p)) if p.len() == 2));

        let hex: Scanned = serde_json::from_value(json!({"type": "crypto-psbt", "cbor": "4570"})).unwrap();
        let array: Scanned = serde_json::from_value(json!({"type": "crypto-psbt", "cbor": [69, 112]})).unwrap();
        assert_eq!(hex, array);
        assert_eq!(serde_json::to_value(Ur::new("crypto-psbt", vec![0x45, 0x70])).unwrap(), json!({"type": "crypto-psbt", "cbor": "4570"}));

        let canceled: ScanOutcome = serde_json::from_value(json!({"status": "canceled"})).unwrap();
        assert_eq!(canceled, ScanOutcome::Canceled);
    }

    #[tokio::test]
    async fn test_round_trip_through_ur() {
        let screen = Rc::new(Screen::default());
        let signed = AirgapPayload::Psbt { psbt_hex: "70736274ff01".into() };
        let answer = encode_payload(&signed).unwrap().to_parts(400).unwrap();
        screen.scans.borrow_mut().push(ScanOutcome::Success(Scanned::Parts(answer)));

        let session = AirgapSession::new(Rc::new(relay(&screen, 400)));
        let payload = session
            .round_trip(&AirgapRequest::Psbt { psbt_hex: "70736274ff".into() }, ResultKind::CryptoPsbt)
            .await
            .unwrap();
        assert_eq!(payload, signed);

        let shown = screen.shown.borrow();
        assert_eq!(shown[0].0, Ur::new("crypto-psbt", vec![0x45, 0x70, 0x73, 0x62, 0x74, 0xff]));
        assert_eq!(shown[0].1.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_ur_type_uses_prompt_message() {
        let screen = Rc::new(Screen::default());
        let sig = encode_payload(&AirgapPayload::BtcSignature { signature: "aa".into() }).unwrap();
        screen.scans.borrow_mut().push(ScanOutcome::Success(Scanned::Assembled(sig)));

        let err = relay(&screen, 400).read(ResultKind::CryptoPsbt, &read_prompt()).await.unwrap_err();
        assert_eq!(err.message(), "The scanned QR code can't be read. please verify and try again.");
    }

    #[tokio::test]
    async fn test_cancel_passes_through() {
        let screen = Rc::new(Screen::default());
        screen.scans.borrow_mut().push(ScanOutcome::Canceled);
        let outcome = relay(&screen, 400).read(ResultKind::CryptoAccount, &Prompt::default()).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Canceled);
    }
}
