//! Keystone (QR relay) Bitcoin tests
//!
//! A scripted device speaks UR: it decodes every QR it is shown, exports its accounts as
//! `crypto-account` and signs PSBTs with the taproot receive key. These tests verify:
//! 1. Sync derives the first taproot receive address
//! 2. A payment is funded locally, signed over QR, finalized and broadcast
//! 3. A canceled scan fails the payment without broadcasting
//! 4. A BIP-322 simple signature verifies against the tweaked receive key

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bitcoin::bip32::{DerivationPath, Xpriv, Xpub};
use bitcoin::hashes::Hash;
use bitcoin::key::TapTweak;
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey, XOnlyPublicKey};
use bitcoin::sighash::{Prevouts, SighashCache, TapSighashType};
use bitcoin::{Address, Witness};

use common::{p2wpkh_address, secret, sign_p2tr, ScriptedChain};
use wallet_adapters::airgap::registry::{decode_request, encode_payload};
use wallet_adapters::airgap::{
    AccountKey, AirgapPayload, AirgapRequest, PlayStatus, Prompt, ResultKind, ScanOutcome, Scanned, Ur, UrTransport,
};
use wallet_adapters::bip322;
use wallet_adapters::host::memory::MemoryHost;
use wallet_adapters::psbt::{psbt_from_hex, psbt_to_hex};
use wallet_adapters::{
    connect_bitcoin, BitcoinWallet, ChainConfig, MessageSigningType, Network, ProviderOption, WalletError, WalletResult,
};

const ACCOUNT_PATHS: [&str; 4] = ["m/44'/0'/0'", "m/49'/0'/0'", "m/84'/0'/0'", "m/86'/0'/0'"];

struct Device {
    master: Xpriv,
    cancel_signing: bool,
    shown: RefCell<Vec<AirgapRequest>>,
}

impl Device {
    fn new(cancel_signing: bool) -> Self {
        let master = Xpriv::new_master(bitcoin::Network::Bitcoin, &[9u8; 32]).unwrap();
        Self { master, cancel_signing, shown: RefCell::new(Vec::new()) }
    }

    fn account(&self, path: &str) -> Xpriv {
        self.master.derive_priv(&Secp256k1::new(), &DerivationPath::from_str(path).unwrap()).unwrap()
    }

    fn receive_key(&self) -> SecretKey { self.account("m/86'/0'/0'/0/0").private_key }

    fn receive_x_only(&self) -> XOnlyPublicKey { self.receive_key().public_key(&Secp256k1::new()).x_only_public_key().0 }

    fn signet_address(&self) -> Address {
        Address::p2tr(&Secp256k1::new(), self.receive_x_only(), None, bitcoin::Network::Signet)
    }

    fn export(&self) -> AirgapPayload {
        let secp = Secp256k1::new();
        let keys = ACCOUNT_PATHS
            .iter()
            .map(|path| AccountKey {
                path: path.to_string(),
                extended_public_key: Xpub::from_priv(&secp, &self.account(path)).to_string(),
            })
            .collect();
        AirgapPayload::Account { master_fingerprint: self.master.fingerprint(&secp).to_string(), keys }
    }

    fn answer(&self, payload: &AirgapPayload) -> ScanOutcome {
        let parts = encode_payload(payload).unwrap().to_parts(120).unwrap();
        ScanOutcome::Success(Scanned::Parts(parts))
    }
}

#[async_trait(?Send)]
impl UrTransport for Device {
    async fn play(&self, ur: &Ur, parts: &[String], _prompt: &Prompt) -> WalletResult<PlayStatus> {
        let scanned = Ur::from_parts(parts)?;
        assert_eq!(&scanned, ur);
        self.shown.borrow_mut().push(decode_request(&scanned)?);
        Ok(PlayStatus::Success)
    }

    async fn read(&self, kind: ResultKind, _prompt: &Prompt) -> WalletResult<ScanOutcome> {
        match kind {
            ResultKind::CryptoAccount => Ok(self.answer(&self.export())),
            ResultKind::CryptoPsbt if self.cancel_signing => Ok(ScanOutcome::Canceled),
            ResultKind::CryptoPsbt => {
                let Some(AirgapRequest::Psbt { psbt_hex }) = self.shown.borrow().last().cloned() else {
                    return Ok(ScanOutcome::Failed);
                };
                let mut psbt = psbt_from_hex(&psbt_hex)?;
                sign_p2tr(&mut psbt, &self.receive_key());
                Ok(self.answer(&AirgapPayload::Psbt { psbt_hex: psbt_to_hex(&psbt) }))
            }
            _ => Ok(ScanOutcome::Failed),
        }
    }
}

async fn synced(device: Rc<Device>, chain: Rc<ScriptedChain>) -> Box<dyn BitcoinWallet> {
    let option = ProviderOption::new(MemoryHost::new().into_rc())
        .with_chain(ChainConfig::new("signet"))
        .with_ur_transport(device)
        .with_chain_api(chain);
    let wallet = connect_bitcoin("bitcoin_keystone", option).unwrap();
    wallet.connect_wallet().await.unwrap();
    wallet.switch_network(Network::Signet).await.unwrap();
    wallet
}

/// Test: sync yields the device's first taproot address
#[tokio::test]
async fn sync_derives_receive_address() {
    let device = Rc::new(Device::new(false));
    let chain = Rc::new(ScriptedChain::new(String::new()));
    let wallet = synced(device.clone(), chain).await;

    assert_eq!(wallet.get_address().await.unwrap(), device.signet_address().to_string());
    assert_eq!(wallet.get_network().await.unwrap(), Network::Signet);
}

/// Test: payment signed on the device and broadcast
#[tokio::test]
async fn send_signed_over_qr() {
    let device = Rc::new(Device::new(false));
    let own_script = device.signet_address().script_pubkey();
    let chain = Rc::new(
        ScriptedChain::new(own_script.to_hex_string())
            .with_utxo(4, 20_000, true)
            .with_utxo(5, 15_000, true),
    );
    let wallet = synced(device.clone(), chain.clone()).await;
    let destination = p2wpkh_address(&secret(31));

    let txid = wallet.send_bitcoin(&destination.to_string(), 30_000).await.unwrap();

    let tx = chain.broadcast_tx(0);
    assert_eq!(tx.compute_txid().to_string(), txid);
    assert_eq!(tx.input.len(), 2);
    assert!(tx.input.iter().all(|input| input.witness.len() == 1));
    assert_eq!(tx.output[0].value.to_sat(), 30_000);
    assert_eq!(tx.output[0].script_pubkey, destination.script_pubkey());

    // the device saw key origins for every input
    match device.shown.borrow().last() {
        Some(AirgapRequest::Psbt { psbt_hex }) => {
            let shown = psbt_from_hex(psbt_hex).unwrap();
            assert!(shown.inputs.iter().all(|input| input.tap_key_origins.len() == 1 && input.tap_internal_key.is_some()));
        }
        other => panic!("unexpected request {:?}", other),
    };
}

/// Test: canceled signing scan stops the payment
#[tokio::test]
async fn canceled_signing_is_not_broadcast() {
    let device = Rc::new(Device::new(true));
    let chain = Rc::new(
        ScriptedChain::new(device.signet_address().script_pubkey().to_hex_string()).with_utxo(4, 50_000, true),
    );
    let wallet = synced(device, chain.clone()).await;

    let err = wallet.send_bitcoin(&p2wpkh_address(&secret(32)).to_string(), 10_000).await.unwrap_err();
    assert!(matches!(err, WalletError::Airgap(_)));
    assert!(chain.broadcasts.borrow().is_empty());
}

/// Test: BIP-322 witness carries a SIGHASH_ALL Schnorr signature over `to_sign`
#[tokio::test]
async fn bip322_signature_verifies() {
    let device = Rc::new(Device::new(false));
    let chain = Rc::new(ScriptedChain::new(String::new()));
    let wallet = synced(device.clone(), chain).await;
    let message = "Hello World";

    let encoded = wallet.sign_message(message, MessageSigningType::Bip322Simple).await.unwrap();

    let witness: Witness = bitcoin::consensus::deserialize(&STANDARD.decode(encoded).unwrap()).unwrap();
    assert_eq!(witness.len(), 1);
    let signature = bitcoin::taproot::Signature::from_slice(&witness[0]).unwrap();
    assert_eq!(signature.sighash_type, TapSighashType::All);

    let secp = Secp256k1::new();
    let script = device.signet_address().script_pubkey();
    let request = bip322::sign_request(message, &script, Some(device.receive_x_only())).unwrap();
    let spent = request.inputs[0].witness_utxo.clone().unwrap();
    let sighash = SighashCache::new(&request.unsigned_tx)
        .taproot_key_spend_signature_hash(0, &Prevouts::All(&[spent]), TapSighashType::All)
        .unwrap();
    let (tweaked, _) = device.receive_x_only().tap_tweak(&secp, None);
    secp.verify_schnorr(&signature.signature, &Message::from_digest(sighash.to_byte_array()), &tweaked.to_inner())
        .unwrap();
}
