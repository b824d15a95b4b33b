//! CBOR bodies of the UR types Keystone speaks.
//!
//! | UR type | direction | body |
//! |---------|-----------|------|
//! | `crypto-psbt` | both | byte string |
//! | `btc-sign-request` | to device | `{1: uuid, 2: data, 3: type, 4: [keypath], 5: [address], 6: origin}` |
//! | `cosmos-sign-request` | to device | same keys as `btc-sign-request` |
//! | `crypto-account` | from device | `{1: mfp, 2: [output descriptor(hdkey)]}` |
//! | `crypto-multi-accounts` | from device | `{1: mfp, 2: [hdkey], 3: device}` |
//! | `btc-signature`, `cosmos-signature` | from device | `{1: uuid, 2: signature, 3: public key}` |
//!
//! Decoding accepts untagged nested items as well as tagged ones. The device-side encoders
//! (`encode_payload`, `decode_request`) exist for scripted devices.

use std::str::FromStr;

use bitcoin::bip32::{ChainCode, ChildNumber, DerivationPath, Fingerprint, Xpub};
use bitcoin::secp256k1::PublicKey;
use bitcoin::NetworkKind;
use ciborium::value::{Integer, Value};

use super::relay::Ur;
use super::{AccountKey, AirgapPayload, AirgapRequest, MultiAccountKey};
use crate::error::{WalletError, WalletResult};

pub const CRYPTO_PSBT: &str = "crypto-psbt";
pub const CRYPTO_ACCOUNT: &str = "crypto-account";
pub const CRYPTO_MULTI_ACCOUNTS: &str = "crypto-multi-accounts";
pub const BTC_SIGN_REQUEST: &str = "btc-sign-request";
pub const BTC_SIGNATURE: &str = "btc-signature";
pub const COSMOS_SIGN_REQUEST: &str = "cosmos-sign-request";
pub const COSMOS_SIGNATURE: &str = "cosmos-signature";

const TAG_UUID: u64 = 37;
const TAG_HDKEY: u64 = 303;
const TAG_KEYPATH: u64 = 304;
const TAG_COIN_INFO: u64 = 305;
const TAG_SH: u64 = 400;
const TAG_PKH: u64 = 403;
const TAG_WPKH: u64 = 404;
const TAG_TR: u64 = 409;

/// `btc-sign-request` data type for a plain message.
const BTC_DATA_MESSAGE: u64 = 1;
const COSMOS_DATA_TYPES: [(&str, u64); 4] = [("amino", 1), ("direct", 2), ("textual", 3), ("message", 4)];

/// SLIP-44 coin types Keystone exports in `crypto-multi-accounts`.
const COIN_SYMBOLS: [(u32, &str); 12] = [
    (0, "BTC"),
    (2, "LTC"),
    (3, "DOGE"),
    (5, "DASH"),
    (60, "ETH"),
    (118, "ATOM"),
    (144, "XRP"),
    (145, "BCH"),
    (195, "TRX"),
    (501, "SOL"),
    (637, "APT"),
    (784, "SUI"),
];

// =============================================================================
// Value helpers
// =============================================================================

fn uint(n: u64) -> Value { Value::Integer(Integer::from(n)) }

fn map(entries: Vec<(u64, Value)>) -> Value {
    Value::Map(entries.into_iter().map(|(k, v)| (uint(k), v)).collect())
}

fn tagged(tag: u64, value: Value) -> Value { Value::Tag(tag, Box::new(value)) }

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(*i).ok(),
        _ => None,
    }
}

/// Strips `tag` if present.
fn untag(value: &Value, tag: u64) -> &Value {
    match value {
        Value::Tag(t, inner) if *t == tag => inner.as_ref(),
        other => other,
    }
}

fn to_cbor(value: &Value) -> WalletResult<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| WalletError::invalid(format!("CBOR encode: {:?}", e)))?;
    Ok(out)
}

fn from_cbor(bytes: &[u8]) -> WalletResult<Value> {
    ciborium::de::from_reader(bytes).map_err(|e| WalletError::invalid(format!("CBOR decode: {:?}", e)))
}

/// Integer-keyed CBOR map.
struct Fields<'a> {
    what: &'static str,
    entries: &'a [(Value, Value)],
}

impl<'a> Fields<'a> {
    fn of(value: &'a Value, what: &'static str) -> WalletResult<Self> {
        match value {
            Value::Map(entries) => Ok(Self { what, entries }),
            _ => Err(WalletError::invalid(format!("{}: expected a map", what))),
        }
    }

    fn get(&self, key: u64) -> Option<&'a Value> {
        self.entries.iter().find(|(k, _)| as_u64(k) == Some(key)).map(|(_, v)| v)
    }

    fn require(&self, key: u64) -> WalletResult<&'a Value> {
        self.get(key).ok_or_else(|| WalletError::invalid(format!("{}: missing key {}", self.what, key)))
    }

    fn bytes(&self, key: u64) -> WalletResult<&'a [u8]> {
        match self.require(key)? {
            Value::Bytes(bytes) => Ok(bytes.as_slice()),
            _ => Err(WalletError::invalid(format!("{}: key {} is not a byte string", self.what, key))),
        }
    }

    fn uint(&self, key: u64) -> WalletResult<u64> {
        as_u64(self.require(key)?)
            .ok_or_else(|| WalletError::invalid(format!("{}: key {} is not an unsigned integer", self.what, key)))
    }

    fn text(&self, key: u64) -> Option<&'a str> {
        match self.get(key) {
            Some(Value::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    fn array(&self, key: u64) -> WalletResult<&'a [Value]> {
        match self.require(key)? {
            Value::Array(items) => Ok(items.as_slice()),
            _ => Err(WalletError::invalid(format!("{}: key {} is not an array", self.what, key))),
        }
    }
}

// =============================================================================
// Shared items
// =============================================================================

fn encode_uuid(request_id: &str) -> WalletResult<Value> {
    let bytes = hex::decode(request_id.replace('-', ""))?;
    if bytes.len() != 16 {
        return Err(WalletError::invalid(format!("request id {} is not a UUID", request_id)));
    }
    Ok(tagged(TAG_UUID, Value::Bytes(bytes)))
}

fn decode_uuid(value: &Value) -> WalletResult<String> {
    match untag(value, TAG_UUID) {
        Value::Bytes(bytes) if bytes.len() == 16 => {
            let hex = hex::encode(bytes);
            Ok(format!("{}-{}-{}-{}-{}", &hex[..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..]))
        }
        _ => Err(WalletError::invalid("request id is not a UUID")),
    }
}

/// 8 hex digits, as the device prints fingerprints.
fn fingerprint_hex(value: u64) -> String { format!("{:08x}", value) }

fn parse_fingerprint(xfp: &str) -> WalletResult<u64> {
    u32::from_str_radix(xfp, 16)
        .map(u64::from)
        .map_err(|e| WalletError::invalid(format!("fingerprint {}: {}", xfp, e)))
}

fn parse_path(path: &str) -> WalletResult<DerivationPath> {
    let relative = path.trim_start_matches(['m', 'M']).trim_start_matches('/');
    let full = if relative.is_empty() { "m".to_string() } else { format!("m/{}", relative) };
    DerivationPath::from_str(&full).map_err(|e| WalletError::invalid(format!("derivation path {}: {}", path, e)))
}

fn path_string(components: &[ChildNumber]) -> String {
    let mut path = String::from("m");
    for child in components {
        match child {
            ChildNumber::Normal { index } => path.push_str(&format!("/{}", index)),
            ChildNumber::Hardened { index } => path.push_str(&format!("/{}'", index)),
        }
    }
    path
}

/// `crypto-keypath`: `{1: [index, hardened, ...], 2: source fingerprint, 3: depth}`.
struct KeyPath {
    components: Vec<ChildNumber>,
    source_fingerprint: Option<u64>,
    depth: Option<u8>,
}

impl KeyPath {
    fn encode(path: &DerivationPath, source_fingerprint: Option<u64>) -> Value {
        let mut components = Vec::new();
        for child in path {
            match child {
                ChildNumber::Normal { index } => components.extend([uint(u64::from(*index)), Value::Bool(false)]),
                ChildNumber::Hardened { index } => components.extend([uint(u64::from(*index)), Value::Bool(true)]),
            }
        }
        let mut entries = vec![(1, Value::Array(components))];
        if let Some(fingerprint) = source_fingerprint {
            entries.push((2, uint(fingerprint)));
        }
        tagged(TAG_KEYPATH, map(entries))
    }

    fn decode(value: &Value) -> WalletResult<Self> {
        let fields = Fields::of(untag(value, TAG_KEYPATH), "crypto-keypath")?;
        let flat = fields.array(1)?;
        let mut components = Vec::with_capacity(flat.len() / 2);
        for pair in flat.chunks(2) {
            let index = pair
                .first()
                .and_then(as_u64)
                .and_then(|i| u32::try_from(i).ok())
                .ok_or_else(|| WalletError::invalid("crypto-keypath: wildcard or malformed component"))?;
            let hardened = matches!(pair.get(1), Some(Value::Bool(true)));
            let child = if hardened { ChildNumber::from_hardened_idx(index) } else { ChildNumber::from_normal_idx(index) };
            components.push(child.map_err(|e| WalletError::invalid(format!("crypto-keypath: {}", e)))?);
        }
        let depth = fields.get(3).and_then(as_u64).and_then(|d| u8::try_from(d).ok());
        Ok(Self { components, source_fingerprint: fields.get(2).and_then(as_u64), depth })
    }

    fn path(&self) -> String { path_string(&self.components) }
}

/// `crypto-hdkey` (public keys only).
struct HdKey {
    key_data: Vec<u8>,
    chain_code: Option<Vec<u8>>,
    testnet: bool,
    origin: Option<KeyPath>,
    parent_fingerprint: Option<u64>,
}

impl HdKey {
    fn decode(value: &Value) -> WalletResult<Self> {
        let fields = Fields::of(untag(value, TAG_HDKEY), "crypto-hdkey")?;
        let chain_code = match fields.get(4) {
            Some(Value::Bytes(bytes)) => Some(bytes.clone()),
            _ => None,
        };
        let testnet = match fields.get(5) {
            Some(info) => Fields::of(untag(info, TAG_COIN_INFO), "crypto-coininfo")?.get(2).and_then(as_u64) == Some(1),
            None => false,
        };
        Ok(Self {
            key_data: fields.bytes(3)?.to_vec(),
            chain_code,
            testnet,
            origin: fields.get(6).map(KeyPath::decode).transpose()?,
            parent_fingerprint: fields.get(8).and_then(as_u64),
        })
    }

    fn from_xpub(xpub: &Xpub, path: &DerivationPath, master_fingerprint: u64) -> WalletResult<Value> {
        let mut entries = vec![
            (3, Value::Bytes(xpub.public_key.serialize().to_vec())),
            (4, Value::Bytes(xpub.chain_code[..].to_vec())),
        ];
        if xpub.network == NetworkKind::Test {
            entries.push((5, tagged(TAG_COIN_INFO, map(vec![(2, uint(1))]))));
        }
        entries.push((6, KeyPath::encode(path, Some(master_fingerprint))));
        entries.push((8, uint(parse_fingerprint(&xpub.parent_fingerprint.to_string())?)));
        Ok(tagged(TAG_HDKEY, map(entries)))
    }

    fn path(&self) -> String { self.origin.as_ref().map(KeyPath::path).unwrap_or_else(|| "m".into()) }

    fn xpub(&self) -> WalletResult<Xpub> {
        let chain_code: [u8; 32] = self
            .chain_code
            .as_deref()
            .and_then(|c| c.try_into().ok())
            .ok_or_else(|| WalletError::invalid("crypto-hdkey: missing chain code"))?;
        let public_key = PublicKey::from_slice(&self.key_data)
            .map_err(|e| WalletError::invalid(format!("crypto-hdkey: {}", e)))?;
        let components = self.origin.as_ref().map(|o| o.components.as_slice()).unwrap_or_default();
        let depth = self
            .origin
            .as_ref()
            .and_then(|o| o.depth)
            .or_else(|| u8::try_from(components.len()).ok())
            .unwrap_or_default();
        let parent = u32::try_from(self.parent_fingerprint.unwrap_or_default())
            .map_err(|_| WalletError::invalid("crypto-hdkey: parent fingerprint out of range"))?;
        Ok(Xpub {
            network: if self.testnet { NetworkKind::Test } else { NetworkKind::Main },
            depth,
            parent_fingerprint: Fingerprint::from(parent.to_be_bytes()),
            child_number: components.last().copied().unwrap_or(ChildNumber::Normal { index: 0 }),
            public_key,
            chain_code: ChainCode::from(chain_code),
        })
    }

    /// Chain symbol from the SLIP-44 coin type in the origin path.
    fn chain(&self) -> String {
        let coin_type = match self.origin.as_ref().and_then(|o| o.components.get(1)) {
            Some(ChildNumber::Hardened { index }) | Some(ChildNumber::Normal { index }) => *index,
            None => return String::new(),
        };
        COIN_SYMBOLS
            .iter()
            .find(|(coin, _)| *coin == coin_type)
            .map(|(_, symbol)| symbol.to_string())
            .unwrap_or_else(|| coin_type.to_string())
    }
}

/// Peels output-descriptor script tags down to the key.
fn descriptor_key(value: &Value) -> &Value {
    match value {
        Value::Tag(tag, inner) if (TAG_SH..=410).contains(tag) => descriptor_key(inner),
        other => other,
    }
}

/// Script expression for the BIP-44 purpose of `path`.
fn descriptor(path: &DerivationPath, key: Value) -> Value {
    let purpose = match path.into_iter().next() {
        Some(ChildNumber::Hardened { index }) | Some(ChildNumber::Normal { index }) => *index,
        None => 0,
    };
    match purpose {
        49 => tagged(TAG_SH, tagged(TAG_WPKH, key)),
        84 => tagged(TAG_WPKH, key),
        86 => tagged(TAG_TR, key),
        _ => tagged(TAG_PKH, key),
    }
}

// =============================================================================
// Requests (shown to the device)
// =============================================================================

fn sign_request(request_id: &str, sign_data: &str, data_type: u64, path: &str, xfp: &str, address: &str) -> WalletResult<Vec<(u64, Value)>> {
    let mut entries = vec![
        (1, encode_uuid(request_id)?),
        (2, Value::Bytes(hex::decode(sign_data)?)),
        (3, uint(data_type)),
        (4, Value::Array(vec![KeyPath::encode(&parse_path(path)?, Some(parse_fingerprint(xfp)?))])),
    ];
    if !address.is_empty() {
        entries.push((5, Value::Array(vec![Value::Text(address.to_string())])));
    }
    Ok(entries)
}

pub fn encode_request(request: &AirgapRequest) -> WalletResult<Ur> {
    match request {
        AirgapRequest::Psbt { psbt_hex } => Ok(Ur::new(CRYPTO_PSBT, to_cbor(&Value::Bytes(hex::decode(psbt_hex)?))?)),
        AirgapRequest::BtcSignMessage { request_id, sign_data, path, xfp, address, origin } => {
            let mut entries = sign_request(request_id, sign_data, BTC_DATA_MESSAGE, path, xfp, address)?;
            entries.push((6, Value::Text(origin.clone())));
            Ok(Ur::new(BTC_SIGN_REQUEST, to_cbor(&map(entries))?))
        }
        AirgapRequest::CosmosSign { request_id, sign_data, data_type, path, xfp, address } => {
            let code = COSMOS_DATA_TYPES
                .iter()
                .find(|(name, _)| *name == data_type.as_str())
                .map(|(_, code)| *code)
                .ok_or_else(|| WalletError::invalid(format!("cosmos sign data type {}", data_type)))?;
            let entries = sign_request(request_id, sign_data, code, path, xfp, address)?;
            Ok(Ur::new(COSMOS_SIGN_REQUEST, to_cbor(&map(entries))?))
        }
    }
}

/// Fields shared by both sign requests: `(request_id, sign_data, data_type, path, xfp, address)`.
fn decode_sign_request(fields: &Fields<'_>) -> WalletResult<(String, String, u64, String, String, String)> {
    let paths = fields.array(4)?;
    let keypath = KeyPath::decode(paths.first().ok_or_else(|| WalletError::invalid("sign request without a path"))?)?;
    let address = match fields.get(5) {
        Some(Value::Array(addresses)) => match addresses.first() {
            Some(Value::Text(address)) => address.clone(),
            _ => String::new(),
        },
        _ => String::new(),
    };
    Ok((
        decode_uuid(fields.require(1)?)?,
        hex::encode(fields.bytes(2)?),
        fields.uint(3)?,
        keypath.path(),
        keypath.source_fingerprint.map(fingerprint_hex).unwrap_or_default(),
        address,
    ))
}

pub fn decode_request(ur: &Ur) -> WalletResult<AirgapRequest> {
    let value = from_cbor(&ur.cbor)?;
    match ur.ur_type.as_str() {
        CRYPTO_PSBT => match value {
            Value::Bytes(bytes) => Ok(AirgapRequest::Psbt { psbt_hex: hex::encode(bytes) }),
            _ => Err(WalletError::invalid("crypto-psbt: expected a byte string")),
        },
        BTC_SIGN_REQUEST => {
            let fields = Fields::of(&value, BTC_SIGN_REQUEST)?;
            let (request_id, sign_data, _, path, xfp, address) = decode_sign_request(&fields)?;
            let origin = fields.text(6).unwrap_or_default().to_string();
            Ok(AirgapRequest::BtcSignMessage { request_id, sign_data, path, xfp, address, origin })
        }
        COSMOS_SIGN_REQUEST => {
            let fields = Fields::of(&value, COSMOS_SIGN_REQUEST)?;
            let (request_id, sign_data, code, path, xfp, address) = decode_sign_request(&fields)?;
            let data_type = COSMOS_DATA_TYPES
                .iter()
                .find(|(_, c)| *c == code)
                .map(|(name, _)| name.to_string())
                .ok_or_else(|| WalletError::invalid(format!("cosmos sign data type {}", code)))?;
            Ok(AirgapRequest::CosmosSign { request_id, sign_data, data_type, path, xfp, address })
        }
        other => Err(WalletError::invalid(format!("not a request UR type: {}", other))),
    }
}

// =============================================================================
// Payloads (scanned from the device)
// =============================================================================

pub fn decode_payload(ur: &Ur) -> WalletResult<AirgapPayload> {
    let value = from_cbor(&ur.cbor)?;
    match ur.ur_type.as_str() {
        CRYPTO_PSBT => match value {
            Value::Bytes(bytes) => Ok(AirgapPayload::Psbt { psbt_hex: hex::encode(bytes) }),
            _ => Err(WalletError::invalid("crypto-psbt: expected a byte string")),
        },
        CRYPTO_ACCOUNT => {
            let fields = Fields::of(&value, CRYPTO_ACCOUNT)?;
            let keys = fields
                .array(2)?
                .iter()
                .map(|output| -> WalletResult<AccountKey> {
                    let key = HdKey::decode(descriptor_key(output))?;
                    Ok(AccountKey { path: key.path(), extended_public_key: key.xpub()?.to_string() })
                })
                .collect::<WalletResult<Vec<_>>>()?;
            Ok(AirgapPayload::Account { master_fingerprint: fingerprint_hex(fields.uint(1)?), keys })
        }
        CRYPTO_MULTI_ACCOUNTS => {
            let fields = Fields::of(&value, CRYPTO_MULTI_ACCOUNTS)?;
            let keys = fields
                .array(2)?
                .iter()
                .map(|item| -> WalletResult<MultiAccountKey> {
                    let key = HdKey::decode(item)?;
                    Ok(MultiAccountKey { chain: key.chain(), path: key.path(), public_key: hex::encode(&key.key_data) })
                })
                .collect::<WalletResult<Vec<_>>>()?;
            Ok(AirgapPayload::MultiAccounts { master_fingerprint: fingerprint_hex(fields.uint(1)?), keys })
        }
        BTC_SIGNATURE => {
            let fields = Fields::of(&value, BTC_SIGNATURE)?;
            Ok(AirgapPayload::BtcSignature { signature: hex::encode(fields.bytes(2)?) })
        }
        COSMOS_SIGNATURE => {
            let fields = Fields::of(&value, COSMOS_SIGNATURE)?;
            Ok(AirgapPayload::CosmosSignature {
                signature: hex::encode(fields.bytes(2)?),
                public_key: hex::encode(fields.bytes(3)?),
            })
        }
        other => Err(WalletError::invalid(format!("unsupported UR type: {}", other))),
    }
}

pub fn encode_payload(payload: &AirgapPayload) -> WalletResult<Ur> {
    match payload {
        AirgapPayload::Psbt { psbt_hex } => Ok(Ur::new(CRYPTO_PSBT, to_cbor(&Value::Bytes(hex::decode(psbt_hex)?))?)),
        AirgapPayload::Account { master_fingerprint, keys } => {
            let mfp = parse_fingerprint(master_fingerprint)?;
            let outputs = keys
                .iter()
                .map(|key| -> WalletResult<Value> {
                    let path = parse_path(&key.path)?;
                    let xpub = Xpub::from_str(&key.extended_public_key)
                        .map_err(|e| WalletError::invalid(format!("xpub for {}: {}", key.path, e)))?;
                    Ok(descriptor(&path, HdKey::from_xpub(&xpub, &path, mfp)?))
                })
                .collect::<WalletResult<Vec<_>>>()?;
            Ok(Ur::new(CRYPTO_ACCOUNT, to_cbor(&map(vec![(1, uint(mfp)), (2, Value::Array(outputs))]))?))
        }
        AirgapPayload::MultiAccounts { master_fingerprint, keys } => {
            let mfp = parse_fingerprint(master_fingerprint)?;
            let items = keys
                .iter()
                .map(|key| -> WalletResult<Value> {
                    let origin = KeyPath::encode(&parse_path(&key.path)?, Some(mfp));
                    Ok(tagged(TAG_HDKEY, map(vec![(3, Value::Bytes(hex::decode(&key.public_key)?)), (6, origin)])))
                })
                .collect::<WalletResult<Vec<_>>>()?;
            let body = map(vec![(1, uint(mfp)), (2, Value::Array(items)), (3, Value::Text("Keystone".into()))]);
            Ok(Ur::new(CRYPTO_MULTI_ACCOUNTS, to_cbor(&body)?))
        }
        AirgapPayload::BtcSignature { signature } => {
            Ok(Ur::new(BTC_SIGNATURE, to_cbor(&map(vec![(2, Value::Bytes(hex::decode(signature)?))]))?))
        }
        AirgapPayload::CosmosSignature { signature, public_key } => {
            let body = map(vec![(2, Value::Bytes(hex::decode(signature)?)), (3, Value::Bytes(hex::decode(public_key)?))]);
            Ok(Ur::new(COSMOS_SIGNATURE, to_cbor(&body)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::bip32::Xpriv;
    use bitcoin::secp256k1::Secp256k1;

    fn account_xpub() -> Xpub {
        let secp = Secp256k1::new();
        let master = Xpriv::new_master(bitcoin::Network::Bitcoin, &[3u8; 32]).unwrap();
        let account = master.derive_priv(&secp, &parse_path("m/86'/0'/0'").unwrap()).unwrap();
        Xpub::from_priv(&secp, &account)
    }

    fn keypath_value(components: &[(u64, bool)], source: u64) -> Value {
        let flat = components.iter().flat_map(|(i, h)| [uint(*i), Value::Bool(*h)]).collect();
        tagged(TAG_KEYPATH, map(vec![(1, Value::Array(flat)), (2, uint(source))]))
    }

    #[test]
    fn test_psbt_is_a_byte_string() {
        let ur = encode_request(&AirgapRequest::Psbt { psbt_hex: "70736274ff".into() }).unwrap();
        assert_eq!(ur.ur_type, CRYPTO_PSBT);
        assert_eq!(ur.cbor, vec![0x45, 0x70, 0x73, 0x62, 0x74, 0xff]);
    }

    #[test]
    fn test_btc_sign_request_layout() {
        let request = AirgapRequest::BtcSignMessage {
            request_id: "7afd5e09-9267-43fb-a02e-08c4a09417ec".into(),
            sign_data: "6869".into(),
            path: "m/86'/0'/0'/0/0".into(),
            xfp: "73c5da0a".into(),
            address: "bc1ptest".into(),
            origin: "babylon staking app".into(),
        };
        let ur = encode_request(&request).unwrap();
        assert_eq!(ur.ur_type, BTC_SIGN_REQUEST);

        let value = from_cbor(&ur.cbor).unwrap();
        let fields = Fields::of(&value, "test").unwrap();
        assert!(matches!(fields.require(1).unwrap(), Value::Tag(TAG_UUID, _)));
        assert_eq!(fields.bytes(2).unwrap(), b"hi");
        assert_eq!(fields.uint(3).unwrap(), BTC_DATA_MESSAGE);
        let keypath = KeyPath::decode(&fields.array(4).unwrap()[0]).unwrap();
        assert_eq!(keypath.source_fingerprint, Some(0x73c5da0a));
        assert_eq!(keypath.path(), "m/86'/0'/0'/0/0");
        assert_eq!(fields.text(6), Some("babylon staking app"));

        assert_eq!(decode_request(&ur).unwrap(), request);
    }

    #[test]
    fn test_cosmos_request_id_and_data_type() {
        let request = AirgapRequest::CosmosSign {
            request_id: "7AFD5E09-9267-43FB-A02E-08C4A09417EC".into(),
            sign_data: "7b7d".into(),
            data_type: "amino".into(),
            path: "m/44'/118'/0'/0/0".into(),
            xfp: "52744703".into(),
            address: "cosmos1xyz".into(),
        };
        let ur = encode_request(&request).unwrap();
        let value = from_cbor(&ur.cbor).unwrap();
        assert_eq!(Fields::of(&value, "test").unwrap().uint(3).unwrap(), 1);
        match decode_request(&ur).unwrap() {
            AirgapRequest::CosmosSign { request_id, data_type, .. } => {
                assert_eq!(request_id, "7afd5e09-9267-43fb-a02e-08c4a09417ec");
                assert_eq!(data_type, "amino");
            }
            other => panic!("unexpected request {:?}", other),
        }

        let bad = AirgapRequest::CosmosSign {
            request_id: "7afd5e09-9267-43fb-a02e-08c4a09417ec".into(),
            sign_data: "7b7d".into(),
            data_type: "sign-mode".into(),
            path: "m/44'/118'/0'/0/0".into(),
            xfp: "52744703".into(),
            address: String::new(),
        };
        assert!(matches!(encode_request(&bad), Err(WalletError::InvalidData(_))));
    }

    #[test]
    fn test_account_export_from_device_layout() {
        let xpub = account_xpub();
        let hdkey = tagged(
            TAG_HDKEY,
            map(vec![
                (3, Value::Bytes(xpub.public_key.serialize().to_vec())),
                (4, Value::Bytes(xpub.chain_code[..].to_vec())),
                (6, keypath_value(&[(86, true), (0, true), (0, true)], 0x73c5da0a)),
                (8, uint(parse_fingerprint(&xpub.parent_fingerprint.to_string()).unwrap())),
            ]),
        );
        let body = map(vec![(1, uint(0x73c5da0a)), (2, Value::Array(vec![tagged(TAG_TR, hdkey)]))]);
        let ur = Ur::new(CRYPTO_ACCOUNT, to_cbor(&body).unwrap());

        match decode_payload(&ur).unwrap() {
            AirgapPayload::Account { master_fingerprint, keys } => {
                assert_eq!(master_fingerprint, "73c5da0a");
                assert_eq!(keys, vec![AccountKey { path: "m/86'/0'/0'".into(), extended_public_key: xpub.to_string() }]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_multi_accounts_chain_from_coin_type() {
        let atom = tagged(
            TAG_HDKEY,
            map(vec![(3, Value::Bytes(vec![2; 33])), (6, keypath_value(&[(44, true), (118, true), (0, true), (0, false), (0, false)], 1))]),
        );
        let eth = map(vec![(3, Value::Bytes(vec![3; 33])), (6, keypath_value(&[(44, true), (60, true), (0, true)], 1))]);
        let body = map(vec![(1, uint(0x52744703)), (2, Value::Array(vec![eth, atom])), (3, Value::Text("Keystone 3 Pro".into()))]);
        let ur = Ur::new(CRYPTO_MULTI_ACCOUNTS, to_cbor(&body).unwrap());

        match decode_payload(&ur).unwrap() {
            AirgapPayload::MultiAccounts { master_fingerprint, keys } => {
                assert_eq!(master_fingerprint, "52744703");
                assert_eq!(keys[0].chain, "ETH");
                assert_eq!(keys[1].chain, "ATOM");
                assert_eq!(keys[1].path, "m/44'/118'/0'/0/0");
                assert_eq!(keys[1].public_key, "02".repeat(33));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_signatures() {
        let body = map(vec![
            (1, encode_uuid("7afd5e09-9267-43fb-a02e-08c4a09417ec").unwrap()),
            (2, Value::Bytes(vec![0xaa; 64])),
            (3, Value::Bytes(vec![0x02; 33])),
        ]);
        let cbor = to_cbor(&body).unwrap();
        assert_eq!(
            decode_payload(&Ur::new(COSMOS_SIGNATURE, cbor.clone())).unwrap(),
            AirgapPayload::CosmosSignature { signature: "aa".repeat(64), public_key: "02".repeat(33) }
        );
        assert_eq!(
            decode_payload(&Ur::new(BTC_SIGNATURE, cbor)).unwrap(),
            AirgapPayload::BtcSignature { signature: "aa".repeat(64) }
        );
    }

    #[test]
    fn test_unknown_type_and_garbage() {
        assert!(matches!(decode_payload(&Ur::new("eth-signature", vec![0xa0])), Err(WalletError::InvalidData(_))));
        assert!(matches!(decode_payload(&Ur::new(CRYPTO_ACCOUNT, vec![0x45, 0x00])), Err(WalletError::InvalidData(_))));
    }
}
