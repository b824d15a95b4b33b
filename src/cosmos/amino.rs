//! Amino JSON types shared by Keplr-compatible wallets, plus the canonical sign-doc bytes
//! and secp256k1 key/address encodings the Cosmos SDK expects.

use bitcoin::bech32::{self, Bech32, Hrp};
use bitcoin::hashes::{ripemd160, Hash};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{WalletError, WalletResult};

pub const SECP256K1_PUBKEY_TYPE: &str = "tendermint/PubKeySecp256k1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<Coin>,
    pub gas: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignDoc {
    pub chain_id: String,
    pub account_number: String,
    pub sequence: String,
    pub fee: StdFee,
    /// Amino messages (`{type, value}`), kept opaque.
    pub msgs: Vec<Value>,
    pub memo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_height: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKey {
    #[serde(rename = "type")]
    pub key_type: String,
    /// Base64
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignature {
    pub pub_key: PubKey,
    /// Base64 of the 64-byte `r || s`
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AminoSignResponse {
    pub signed: StdSignDoc,
    pub signature: StdSignature,
}

/// Keplr's `Key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CosmosKey {
    pub name: String,
    pub algo: String,
    pub pub_key: Vec<u8>,
    pub address: Vec<u8>,
    pub bech32_address: String,
    pub is_nano_ledger: bool,
    pub is_keystone: bool,
}

/// cosmjs `AccountData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    pub address: String,
    pub algo: String,
    pub pubkey: Vec<u8>,
}

impl From<CosmosKey> for AccountData {
    fn from(key: CosmosKey) -> Self {
        Self { address: key.bech32_address, algo: "secp256k1".into(), pubkey: key.pub_key }
    }
}

/// Payload of `signArbitrary` (ADR-036).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArbitraryData {
    Text(String),
    Bytes(Vec<u8>),
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect::<Map<_, _>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Go's `encoding/json` escapes these; the signed bytes must match.
pub fn escape_html(json: &str) -> String {
    json.replace('<', "\\u003c").replace('>', "\\u003e").replace('&', "\\u0026")
}

/// Canonical amino bytes: sorted keys, no whitespace, HTML characters escaped.
pub fn serialize_sign_doc(doc: &StdSignDoc) -> WalletResult<Vec<u8>> {
    let sorted = sort_keys(serde_json::to_value(doc)?);
    Ok(escape_html(&serde_json::to_string(&sorted)?).into_bytes())
}

pub fn encode_secp256k1_pubkey(pubkey: &[u8]) -> WalletResult<PubKey> {
    if pubkey.len() != 33 || !matches!(pubkey[0], 0x02 | 0x03) {
        return Err(WalletError::invalid(
            "Public key must be compressed secp256k1, i.e. 33 bytes starting with 0x02 or 0x03",
        ));
    }
    Ok(PubKey { key_type: SECP256K1_PUBKEY_TYPE.into(), value: STANDARD.encode(pubkey) })
}

pub fn encode_secp256k1_signature(pubkey: &[u8], signature: &[u8]) -> WalletResult<StdSignature> {
    if signature.len() != 64 {
        return Err(WalletError::invalid(
            "Signature must be 64 bytes long. Cosmos SDK uses a 2x32 byte fixed length encoding for the secp256k1 signature integers r and s.",
        ));
    }
    Ok(StdSignature { pub_key: encode_secp256k1_pubkey(pubkey)?, signature: STANDARD.encode(signature) })
}

/// `ripemd160(sha256(pubkey))`
pub fn account_hash(pubkey: &[u8]) -> [u8; 20] {
    let digest = Sha256::digest(pubkey);
    ripemd160::Hash::hash(&digest).to_byte_array()
}

pub fn bech32_address(prefix: &str, pubkey: &[u8]) -> WalletResult<String> {
    let hrp = Hrp::parse(prefix).map_err(|e| WalletError::invalid(format!("bech32 prefix {:?}: {}", prefix, e)))?;
    bech32::encode::<Bech32>(hrp, &account_hash(pubkey)).map_err(WalletError::invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(memo: &str) -> StdSignDoc {
        StdSignDoc {
            chain_id: "cosmoshub-4".into(),
            account_number: "1".into(),
            sequence: "0".into(),
            fee: StdFee {
                amount: vec![Coin { denom: "uatom".into(), amount: "500".into() }],
                gas: "200000".into(),
                payer: None,
                granter: None,
            },
            msgs: vec![json!({ "value": { "from_address": "x", "amount": [] }, "type": "cosmos-sdk/MsgSend" })],
            memo: memo.into(),
            timeout_height: None,
        }
    }

    #[test]
    fn test_sign_doc_bytes_are_sorted_and_escaped() {
        let bytes = serialize_sign_doc(&doc("<a&b>")).unwrap();
        let expected = concat!(
            r#"{"account_number":"1","chain_id":"cosmoshub-4","#,
            r#""fee":{"amount":[{"amount":"500","denom":"uatom"}],"gas":"200000"},"#,
            r#""memo":"\u003ca\u0026b\u003e","#,
            r#""msgs":[{"type":"cosmos-sdk/MsgSend","value":{"amount":[],"from_address":"x"}}],"#,
            r#""sequence":"0"}"#
        );
        assert_eq!(String::from_utf8(bytes).unwrap(), expected);
    }

    #[test]
    fn test_signature_encoding_checks_lengths() {
        let mut pubkey = vec![0x02];
        pubkey.extend([7u8; 32]);
        let signature = encode_secp256k1_signature(&pubkey, &[1u8; 64]).unwrap();
        assert_eq!(signature.pub_key.key_type, SECP256K1_PUBKEY_TYPE);
        assert_eq!(STANDARD.decode(&signature.signature).unwrap(), vec![1u8; 64]);

        assert!(encode_secp256k1_signature(&pubkey, &[1u8; 65]).is_err());
        pubkey[0] = 0x04;
        assert!(encode_secp256k1_pubkey(&pubkey).is_err());
    }

    #[test]
    fn test_bech32_address_wraps_hash160() {
        let pubkey = hex::decode("02950e1cdfcb133d6024109fd489f734eeb4502418e538c28481f22bce276f248c").unwrap();
        let address = bech32_address("cosmos", &pubkey).unwrap();
        let (hrp, data) = bech32::decode(&address).unwrap();
        assert_eq!(hrp.as_str(), "cosmos");
        assert_eq!(data, account_hash(&pubkey).to_vec());
        assert_eq!(account_hash(&pubkey), bitcoin::hashes::hash160::Hash::hash(&pubkey).to_byte_array());
        assert!(bech32_address("", &pubkey).is_err());
    }
}
