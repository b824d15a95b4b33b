//! Shared fixtures: a scripted chain backend and real signers for signet keys.

#![allow(dead_code)]

use std::cell::RefCell;

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::key::TapTweak;
use bitcoin::secp256k1::{Keypair, Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::{Address, CompressedPublicKey, Psbt, Transaction, TxOut};

use wallet_adapters::api::{AddressUtxo, ChainApi, InscriptionQuery, UtxoStatus};
use wallet_adapters::{Fees, InscriptionResult, Network, WalletError, WalletResult};

/// Chain backend with fixed UTXOs and fees. Broadcasts are recorded and answered with the
/// real txid.
pub struct ScriptedChain {
    pub utxos: Vec<AddressUtxo>,
    pub script_hex: String,
    pub fees: Fees,
    pub broadcasts: RefCell<Vec<String>>,
}

impl ScriptedChain {
    pub fn new(script_hex: String) -> Self {
        Self {
            utxos: Vec::new(),
            script_hex,
            fees: Fees { fastest_fee: 2.0, half_hour_fee: 1.5, hour_fee: 1.0, economy_fee: 1.0, minimum_fee: 1.0 },
            broadcasts: RefCell::new(Vec::new()),
        }
    }

    pub fn with_utxo(mut self, byte: u8, value: u64, confirmed: bool) -> Self {
        self.utxos.push(AddressUtxo {
            txid: hex::encode([byte; 32]),
            vout: 0,
            value,
            status: UtxoStatus { confirmed },
        });
        self
    }

    pub fn broadcast_tx(&self, index: usize) -> Transaction {
        bitcoin::consensus::encode::deserialize_hex(&self.broadcasts.borrow()[index]).unwrap()
    }
}

#[async_trait(?Send)]
impl ChainApi for ScriptedChain {
    async fn fetch_utxo_list(&self, _network: Network, _address: &str) -> WalletResult<Vec<AddressUtxo>> {
        Ok(self.utxos.clone())
    }

    async fn fetch_output_script(&self, _network: Network, _txid: &str, _vout: u32) -> WalletResult<String> {
        Ok(self.script_hex.clone())
    }

    async fn fetch_fee_estimate(&self, _network: Network) -> WalletResult<Fees> { Ok(self.fees) }

    async fn fetch_tip_height(&self, _network: Network) -> WalletResult<u32> { Ok(840_000) }

    async fn fetch_address_balance(&self, _network: Network, _address: &str) -> WalletResult<u64> {
        Ok(self.utxos.iter().filter(|u| u.status.confirmed).map(|u| u.value).sum())
    }

    async fn broadcast_transaction(&self, _network: Network, raw_hex: &str) -> WalletResult<String> {
        let tx: Transaction = bitcoin::consensus::encode::deserialize_hex(raw_hex)
            .map_err(|e| WalletError::Upstream(e.to_string()))?;
        self.broadcasts.borrow_mut().push(raw_hex.to_string());
        Ok(tx.compute_txid().to_string())
    }

    async fn fetch_inscriptions(&self, _query: &InscriptionQuery) -> WalletResult<InscriptionResult> {
        Ok(InscriptionResult::default())
    }
}

pub fn secret(byte: u8) -> SecretKey { SecretKey::from_slice(&[byte; 32]).unwrap() }

pub fn p2wpkh_address(secret: &SecretKey) -> Address {
    let secp = Secp256k1::new();
    Address::p2wpkh(&CompressedPublicKey(secret.public_key(&secp)), bitcoin::Network::Signet)
}

/// Adds a P2WPKH partial signature to every input; finalizing is left to the caller.
pub fn sign_p2wpkh(psbt: &mut Psbt, secret: &SecretKey) {
    let secp = Secp256k1::new();
    let public_key = bitcoin::PublicKey::new(secret.public_key(&secp));
    let mut cache = SighashCache::new(psbt.unsigned_tx.clone());
    for (index, input) in psbt.inputs.iter_mut().enumerate() {
        let utxo = input.witness_utxo.clone().unwrap();
        let sighash = cache
            .p2wpkh_signature_hash(index, &utxo.script_pubkey, utxo.value, EcdsaSighashType::All)
            .unwrap();
        let signature = secp.sign_ecdsa(&Message::from_digest(sighash.to_byte_array()), secret);
        input
            .partial_sigs
            .insert(public_key, bitcoin::ecdsa::Signature { signature, sighash_type: EcdsaSighashType::All });
    }
}

/// Taproot key-path signature on every input, with the BIP-86 tweak. Uses the input's
/// sighash type when set, SIGHASH_DEFAULT otherwise.
pub fn sign_p2tr(psbt: &mut Psbt, secret: &SecretKey) {
    let secp = Secp256k1::new();
    let keypair = Keypair::from_secret_key(&secp, secret).tap_tweak(&secp, None).to_inner();
    let prevouts: Vec<TxOut> = psbt.inputs.iter().map(|i| i.witness_utxo.clone().unwrap()).collect();
    let mut cache = SighashCache::new(psbt.unsigned_tx.clone());
    for (index, input) in psbt.inputs.iter_mut().enumerate() {
        let sighash_type = input.sighash_type.map(|t| t.taproot_hash_ty().unwrap()).unwrap_or(TapSighashType::Default);
        let sighash = cache
            .taproot_key_spend_signature_hash(index, &Prevouts::All(&prevouts), sighash_type)
            .unwrap();
        let signature = secp.sign_schnorr_no_aux_rand(&Message::from_digest(sighash.to_byte_array()), &keypair);
        input.tap_key_sig = Some(bitcoin::taproot::Signature { signature, sighash_type });
    }
}
