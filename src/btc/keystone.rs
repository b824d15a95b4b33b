//! Keystone hardware wallet over the QR relay.
//!
//! Syncing reads the device's account export and keeps the taproot account xpub. The
//! receive key `{path}/0/0` is derived locally. Keystone is stateless, so every PSBT gets
//! `tap_key_origins` before it is shown, telling the device which key signs.

use std::cell::{Cell, RefCell};
use std::str::FromStr;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bitcoin::bip32::{DerivationPath, Fingerprint, Xpub};
use bitcoin::script::Instruction;
use bitcoin::secp256k1::{PublicKey, Secp256k1, XOnlyPublicKey};
use bitcoin::taproot::TapLeafHash;
use bitcoin::{Address, Psbt, Script, ScriptBuf};
use tracing::{debug, info};

use super::{BitcoinWallet, ChainBackend};
use crate::airgap::{AirgapPayload, AirgapRequest, AirgapSession, Prompt, ReadOutcome, ResultKind};
use crate::bip322;
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::{WalletError, WalletResult};
use crate::psbt::{finalize_all, psbt_from_hex, psbt_to_hex, send_with_funding};
use crate::types::{MessageSigningType, Network};

const WALLET: &str = "Keystone Wallet";
/// Index of the P2TR account in the `crypto-account` export.
const P2TR_INDEX: usize = 3;
const MESSAGE_REQUEST_ID: &str = "7afd5e09-9267-43fb-a02e-08c4a09417ec";
const ORIGIN: &str = "babylon staking app";

pub static DESCRIPTOR: WalletDescriptor = WalletDescriptor {
    id: "bitcoin_keystone",
    name: "Keystone",
    icon: "keystone.svg",
    chain_type: ChainType::Bitcoin,
    kind: WalletKind::Qrcode,
    connector: Connector::Bitcoin(connect),
};

fn connect(option: ProviderOption) -> WalletResult<Box<dyn BitcoinWallet>> {
    Ok(Box::new(KeystoneWallet::new(&option)?))
}

fn sync_prompt() -> Prompt {
    Prompt::new(
        "Sync Keystone with Babylon Staking App",
        "Please scan the QR code displayed on your Keystone, Currently only the first Taproot Address will be used",
    )
    .with_steps(&[
        "1. Turn on your Keystone 3 with BTC only firmware.",
        "2. Click connect software wallet and use \"Sparrow\" for connection.",
        "3. Press the \"Sync Keystone\" button and scan the QR Code displayed on your Keystone hardware wallet",
        "4. The first Taproot address will be used for staking.",
    ])
    .with_type_error(
        "The scanned QR code is not the sync code from the Keystone hardware wallet. Please verify the code and try again.",
    )
}

/// Exported taproot account.
#[derive(Debug, Clone)]
struct Account {
    fingerprint: Fingerprint,
    xpub: Xpub,
    /// As exported, e.g. `m/86'/0'/0'`
    path: String,
}

impl Account {
    fn key_path(&self) -> String { format!("{}/0/0", self.path) }

    fn derivation(&self) -> WalletResult<DerivationPath> {
        let relative = self.path.trim_start_matches(['m', 'M']).trim_start_matches('/');
        let full = if relative.is_empty() { "m/0/0".to_string() } else { format!("m/{}/0/0", relative) };
        DerivationPath::from_str(&full).map_err(|e| WalletError::invalid(format!("derivation path {}: {}", full, e)))
    }
}

/// Receive key and taproot address for the current network.
#[derive(Debug, Clone)]
struct Derived {
    address: String,
    public_key: PublicKey,
    x_only: XOnlyPublicKey,
    script: ScriptBuf,
}

/// `M/0/0` under the account xpub, as a key-path-only P2TR output.
fn derive_p2tr(xpub: &Xpub, network: Network) -> WalletResult<Derived> {
    let secp = Secp256k1::verification_only();
    let path = DerivationPath::from_str("m/0/0").map_err(WalletError::invalid)?;
    let child = xpub.derive_pub(&secp, &path).map_err(|e| WalletError::invalid(format!("xpub derivation: {}", e)))?;
    let public_key = child.public_key;
    let (x_only, _) = public_key.x_only_public_key();
    let address = Address::p2tr(&secp, x_only, None, network.to_bitcoin());
    Ok(Derived { script: address.script_pubkey(), address: address.to_string(), public_key, x_only })
}

fn script_has_key(script: &Script, key: &XOnlyPublicKey) -> bool {
    let key = key.serialize();
    script
        .instructions()
        .flatten()
        .any(|i| matches!(i, Instruction::PushBytes(bytes) if bytes.as_bytes() == &key[..]))
}

pub struct KeystoneWallet {
    session: AirgapSession,
    backend: ChainBackend,
    network: Cell<Network>,
    account: RefCell<Option<Account>>,
    derived: RefCell<Option<Derived>>,
}

impl std::fmt::Debug for KeystoneWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystoneWallet")
            .field("network", &self.network.get())
            .field("account", &self.account)
            .field("derived", &self.derived)
            .finish_non_exhaustive()
    }
}

impl KeystoneWallet {
    pub fn new(option: &ProviderOption) -> WalletResult<Self> {
        Ok(Self {
            session: option.airgap()?,
            backend: ChainBackend::from_option(option),
            network: Cell::new(Network::Mainnet),
            account: RefCell::new(None),
            derived: RefCell::new(None),
        })
    }

    fn connected(&self) -> WalletResult<(Account, Derived)> {
        let account = self.account.borrow().clone();
        let derived = self.derived.borrow().clone();
        account.zip(derived).ok_or_else(|| WalletError::NotConnected(WALLET.into()))
    }

    /// Adds the key origin of the receive key to every input, and the internal key to
    /// inputs spending our own output.
    fn enhance(&self, psbt: &mut Psbt) -> WalletResult<()> {
        let (account, derived) = self.connected()?;
        let origin = (account.fingerprint, account.derivation()?);
        for input in psbt.inputs.iter_mut() {
            let leaf_hashes: Vec<TapLeafHash> = input
                .tap_scripts
                .values()
                .filter(|(script, _)| script_has_key(script, &derived.x_only))
                .map(|(script, version)| TapLeafHash::from_script(script, *version))
                .collect();
            input.tap_key_origins.insert(derived.x_only, (leaf_hashes, origin.clone()));
            if input.witness_utxo.as_ref().is_some_and(|utxo| utxo.script_pubkey == derived.script) {
                input.tap_internal_key = Some(derived.x_only);
            }
        }
        Ok(())
    }

    /// Shows the PSBT, scans the signed one back and finalizes it.
    async fn sign(&self, psbt: &Psbt) -> WalletResult<Psbt> {
        let request = AirgapRequest::Psbt { psbt_hex: psbt_to_hex(psbt) };
        match self.session.round_trip(&request, ResultKind::CryptoPsbt).await? {
            AirgapPayload::Psbt { psbt_hex } => {
                let mut signed = psbt_from_hex(&psbt_hex)?;
                finalize_all(&mut signed)?;
                Ok(signed)
            }
            other => Err(WalletError::invalid(format!("expected a PSBT from Keystone, got {:?}", other))),
        }
    }

    async fn sign_message_ecdsa(&self, message: &str) -> WalletResult<String> {
        let (account, derived) = self.connected()?;
        let request = AirgapRequest::BtcSignMessage {
            request_id: MESSAGE_REQUEST_ID.into(),
            sign_data: hex::encode(message.as_bytes()),
            path: account.key_path(),
            xfp: account.fingerprint.to_string(),
            address: derived.address,
            origin: ORIGIN.into(),
        };
        match self.session.round_trip(&request, ResultKind::BtcSignature).await? {
            AirgapPayload::BtcSignature { signature } => Ok(STANDARD.encode(hex::decode(signature)?)),
            other => Err(WalletError::invalid(format!("expected a signature from Keystone, got {:?}", other))),
        }
    }

    async fn sign_message_bip322_simple(&self, message: &str) -> WalletResult<String> {
        let (_, derived) = self.connected()?;
        let mut psbt = bip322::sign_request(message, &derived.script, Some(derived.x_only))?;
        self.enhance(&mut psbt)?;
        let signed = self.sign(&psbt).await?;
        bip322::encode_witness(&signed)
    }
}

#[async_trait(?Send)]
impl BitcoinWallet for KeystoneWallet {
    fn descriptor(&self) -> &'static WalletDescriptor { &DESCRIPTOR }
    fn backend(&self) -> &ChainBackend { &self.backend }

    async fn connect_wallet(&self) -> WalletResult<()> {
        let (master_fingerprint, keys) = match self.session.read(ResultKind::CryptoAccount, &sync_prompt()).await? {
            ReadOutcome::Success(AirgapPayload::Account { master_fingerprint, keys }) => (master_fingerprint, keys),
            ReadOutcome::Success(other) => {
                return Err(WalletError::invalid(format!("expected an account export, got {:?}", other)))
            }
            ReadOutcome::Canceled => return Err(WalletError::Airgap("Connection to Keystone was canceled".into())),
            ReadOutcome::Failed => return Err(WalletError::Airgap("Error reading QR code, Please try again.".into())),
        };

        let key = keys
            .into_iter()
            .nth(P2TR_INDEX)
            .filter(|k| !k.extended_public_key.is_empty())
            .ok_or_else(|| WalletError::Airgap("Could not retrieve the extended public key".into()))?;
        let xpub = Xpub::from_str(&key.extended_public_key).map_err(|e| WalletError::invalid(format!("xpub: {}", e)))?;
        let fingerprint = Fingerprint::from_str(&master_fingerprint)
            .map_err(|e| WalletError::invalid(format!("master fingerprint: {}", e)))?;
        debug!("keystone account {} at {}", fingerprint, key.path);
        *self.account.borrow_mut() = Some(Account { fingerprint, xpub, path: key.path });

        self.switch_network(self.network.get()).await?;
        info!("connected {} as {}", WALLET, self.get_address().await?);
        Ok(())
    }

    async fn get_address(&self) -> WalletResult<String> { Ok(self.connected()?.1.address) }

    async fn get_public_key_hex(&self) -> WalletResult<String> { Ok(self.connected()?.1.public_key.to_string()) }

    async fn get_network(&self) -> WalletResult<Network> { Ok(self.network.get()) }

    async fn switch_network(&self, network: Network) -> WalletResult<()> {
        self.network.set(network);
        let xpub = self.account.borrow().as_ref().map(|a| a.xpub);
        if let Some(xpub) = xpub {
            *self.derived.borrow_mut() = Some(derive_p2tr(&xpub, network)?);
        }
        Ok(())
    }

    async fn sign_psbt(&self, psbt_hex: &str) -> WalletResult<String> {
        self.connected()?;
        let mut psbt = psbt_from_hex(psbt_hex)?;
        self.enhance(&mut psbt)?;
        let signed = self.sign(&psbt).await?;
        Ok(psbt_to_hex(&signed))
    }

    async fn sign_psbts(&self, psbts_hexes: &[String]) -> WalletResult<Vec<String>> {
        self.connected()?;
        let mut signed = Vec::with_capacity(psbts_hexes.len());
        for psbt_hex in psbts_hexes {
            signed.push(self.sign_psbt(psbt_hex).await?);
        }
        Ok(signed)
    }

    async fn sign_message(&self, message: &str, kind: MessageSigningType) -> WalletResult<String> {
        match kind {
            MessageSigningType::Ecdsa => self.sign_message_ecdsa(message).await,
            MessageSigningType::Bip322Simple => self.sign_message_bip322_simple(message).await,
        }
    }

    async fn send_bitcoin(&self, to: &str, amount_sats: u64) -> WalletResult<String> {
        send_with_funding(self, to, amount_sats).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airgap::tests::ScriptedTransport;
    use crate::airgap::AccountKey;
    use crate::host::memory::MemoryHost;
    use bitcoin::bip32::Xpriv;
    use std::rc::Rc;

    fn account_xpub() -> (Xpriv, Xpub) {
        let secp = Secp256k1::new();
        let master = Xpriv::new_master(bitcoin::Network::Bitcoin, &[7u8; 32]).unwrap();
        let path = DerivationPath::from_str("m/86'/0'/0'").unwrap();
        let account = master.derive_priv(&secp, &path).unwrap();
        (account, Xpub::from_priv(&secp, &account))
    }

    fn export(xpub: &Xpub) -> ReadOutcome {
        let mut keys: Vec<AccountKey> = (0..3)
            .map(|i| AccountKey { path: format!("m/{}'/0'/0'", 44 + i), extended_public_key: String::new() })
            .collect();
        keys.push(AccountKey { path: "m/86'/0'/0'".into(), extended_public_key: xpub.to_string() });
        ReadOutcome::Success(AirgapPayload::Account { master_fingerprint: "73c5da0a".into(), keys })
    }

    fn wallet(transport: Rc<ScriptedTransport>) -> KeystoneWallet {
        let option = ProviderOption::new(MemoryHost::new().into_rc()).with_airgap(transport);
        KeystoneWallet::new(&option).unwrap()
    }

    #[test]
    fn test_requires_transport() {
        let option = ProviderOption::new(MemoryHost::new().into_rc());
        assert!(matches!(KeystoneWallet::new(&option), Err(WalletError::ProviderNotFound(_))));
    }

    #[tokio::test]
    async fn test_connect_derives_taproot_address() {
        let (_, xpub) = account_xpub();
        let transport = Rc::new(ScriptedTransport::default());
        transport.reads.borrow_mut().push_back(export(&xpub));
        let keystone = wallet(transport);

        keystone.connect_wallet().await.unwrap();
        let mainnet = keystone.get_address().await.unwrap();
        assert!(mainnet.starts_with("bc1p"));
        assert_eq!(keystone.get_public_key_hex().await.unwrap().len(), 66);

        keystone.switch_network(Network::Signet).await.unwrap();
        let signet = keystone.get_address().await.unwrap();
        assert!(signet.starts_with("tb1p"));
        assert_eq!(keystone.get_network().await.unwrap(), Network::Signet);
    }

    #[tokio::test]
    async fn test_connect_errors() {
        let transport = Rc::new(ScriptedTransport::default());
        transport.reads.borrow_mut().push_back(ReadOutcome::Canceled);
        let keystone = wallet(transport.clone());
        assert_eq!(
            keystone.connect_wallet().await.unwrap_err(),
            WalletError::Airgap("Connection to Keystone was canceled".into())
        );

        let short = AirgapPayload::Account { master_fingerprint: "73c5da0a".into(), keys: vec![] };
        transport.reads.borrow_mut().push_back(ReadOutcome::Success(short));
        assert_eq!(
            keystone.connect_wallet().await.unwrap_err(),
            WalletError::Airgap("Could not retrieve the extended public key".into())
        );
        assert!(matches!(keystone.get_address().await, Err(WalletError::NotConnected(_))));
    }

    #[tokio::test]
    async fn test_ecdsa_message_request() {
        let (_, xpub) = account_xpub();
        let transport = Rc::new(ScriptedTransport::default());
        transport.reads.borrow_mut().push_back(export(&xpub));
        transport
            .reads
            .borrow_mut()
            .push_back(ReadOutcome::Success(AirgapPayload::BtcSignature { signature: "deadbeef".into() }));
        let keystone = wallet(transport.clone());
        keystone.connect_wallet().await.unwrap();

        let signature = keystone.sign_message("hi", MessageSigningType::Ecdsa).await.unwrap();
        assert_eq!(signature, STANDARD.encode([0xde, 0xad, 0xbe, 0xef]));

        let played = transport.played.borrow();
        match &played[0] {
            AirgapRequest::BtcSignMessage { sign_data, path, xfp, origin, .. } => {
                assert_eq!(sign_data, "6869");
                assert_eq!(path, "m/86'/0'/0'/0/0");
                assert_eq!(xfp, "73c5da0a");
                assert_eq!(origin, ORIGIN);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_enhance_sets_origins_and_internal_key() {
        let (_, xpub) = account_xpub();
        let transport = Rc::new(ScriptedTransport::default());
        transport.reads.borrow_mut().push_back(export(&xpub));
        let keystone = wallet(transport);
        keystone.connect_wallet().await.unwrap();
        let (_, derived) = keystone.connected().unwrap();

        let mut psbt = bip322::sign_request("hello", &derived.script, None).unwrap();
        keystone.enhance(&mut psbt).unwrap();
        let input = &psbt.inputs[0];
        let (leaves, (fingerprint, path)) = &input.tap_key_origins[&derived.x_only];
        assert!(leaves.is_empty());
        assert_eq!(fingerprint.to_string(), "73c5da0a");
        assert_eq!(path, &DerivationPath::from_str("m/86'/0'/0'/0/0").unwrap());
        assert_eq!(input.tap_internal_key, Some(derived.x_only));
    }
}
