//! BIP-322 "simple" message signing transcript.
//!
//! ```text
//! to_spend:  in  000…000:ffffffff  scriptSig = OP_0 <tagged_hash(msg)>
//!            out 0 sat → script_pubkey
//! to_sign:   in  to_spend:0        (witness_utxo = 0 sat, script_pubkey)
//!            out 0 sat → OP_RETURN
//! signature: base64(consensus(witness of to_sign input 0))
//! ```
//!
//! Wallets without native BIP-322 support sign `to_sign` like any other PSBT.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bitcoin::absolute::LockTime;
use bitcoin::hashes::{sha256, Hash, HashEngine};
use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::opcodes::OP_0;
use bitcoin::psbt::PsbtSighashType;
use bitcoin::script::Builder;
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::sighash::EcdsaSighashType;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, Psbt, Script, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use crate::error::{WalletError, WalletResult};

pub const MESSAGE_TAG: &[u8] = b"BIP0322-signed-message";

/// `sha256(sha256(tag) || sha256(tag) || message)`
pub fn message_hash(message: &[u8]) -> sha256::Hash {
    let tag = sha256::Hash::hash(MESSAGE_TAG);
    let mut engine = sha256::Hash::engine();
    engine.input(tag.as_ref());
    engine.input(tag.as_ref());
    engine.input(message);
    sha256::Hash::from_engine(engine)
}

/// The virtual transaction committing to `message` and paying `script_pubkey`.
pub fn to_spend(message: &[u8], script_pubkey: &Script) -> Transaction {
    let script_sig = Builder::new()
        .push_opcode(OP_0)
        .push_slice(message_hash(message).to_byte_array())
        .into_script();
    Transaction {
        version: Version(0),
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint { txid: Txid::all_zeros(), vout: 0xFFFF_FFFF },
            script_sig,
            sequence: Sequence::ZERO,
            witness: Witness::new(),
        }],
        output: vec![TxOut { value: Amount::ZERO, script_pubkey: script_pubkey.to_owned() }],
    }
}

/// Unsigned PSBT spending output 0 of `to_spend_txid`.
pub fn to_sign(to_spend_txid: Txid, script_pubkey: &Script, internal_key: Option<XOnlyPublicKey>) -> WalletResult<Psbt> {
    let tx = Transaction {
        version: Version(0),
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint { txid: to_spend_txid, vout: 0 },
            script_sig: Default::default(),
            sequence: Sequence::ZERO,
            witness: Witness::new(),
        }],
        output: vec![TxOut { value: Amount::ZERO, script_pubkey: Builder::new().push_opcode(OP_RETURN).into_script() }],
    };
    let mut psbt = Psbt::from_unsigned_tx(tx)?;
    psbt.inputs[0].witness_utxo = Some(TxOut { value: Amount::ZERO, script_pubkey: script_pubkey.to_owned() });
    psbt.inputs[0].tap_internal_key = internal_key;
    Ok(psbt)
}

/// `to_sign` for `message`, with SIGHASH_ALL (taproot signers default to SIGHASH_DEFAULT otherwise).
pub fn sign_request(message: &str, script_pubkey: &Script, internal_key: Option<XOnlyPublicKey>) -> WalletResult<Psbt> {
    let txid = to_spend(message.as_bytes(), script_pubkey).compute_txid();
    let mut psbt = to_sign(txid, script_pubkey, internal_key)?;
    psbt.inputs[0].sighash_type = Some(PsbtSighashType::from(EcdsaSighashType::All));
    Ok(psbt)
}

/// Base64 of the consensus-encoded witness of the signed `to_sign` input.
pub fn encode_witness(psbt: &Psbt) -> WalletResult<String> {
    let witness = psbt
        .inputs
        .first()
        .and_then(|input| input.final_script_witness.as_ref())
        .ok_or_else(|| WalletError::invalid("BIP-322 PSBT has no final witness"))?;
    Ok(STANDARD.encode(bitcoin::consensus::encode::serialize(witness)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{Message, Secp256k1};
    use bitcoin::sighash::SighashCache;
    use bitcoin::{Address, PrivateKey, ScriptBuf};
    use std::str::FromStr;

    fn vector_script() -> ScriptBuf {
        Address::from_str("bc1q9vza2e8x573nczrlzms0wvx3gsqjx7vavgkx0l")
            .unwrap()
            .assume_checked()
            .script_pubkey()
    }

    #[test]
    fn test_message_hash_vectors() {
        assert_eq!(
            message_hash(b"").to_string(),
            "c90c269c4f8fcbe6880f72a721ddfbf1914268a794cbb21cfafee13770ae19f1"
        );
        assert_eq!(
            message_hash(b"Hello World").to_string(),
            "f0eb03b1a75ac6d9847f55c624a99169b5dccba2a31f5b23bea77ba270de0a7a"
        );
    }

    #[test]
    fn test_transaction_id_vectors() {
        let script = vector_script();
        let empty = to_spend(b"", &script);
        assert_eq!(empty.compute_txid().to_string(), "c5680aa69bb8d860bf82d4e9cd3504b55dde018de765a91bb566283c545a99a7");
        let hello = to_spend(b"Hello World", &script);
        assert_eq!(hello.compute_txid().to_string(), "b79d196740ad5217771c1098fc4a4b51e0535c32236c71f1ea4d61a2d603352b");

        let signing = to_sign(empty.compute_txid(), &script, None).unwrap();
        assert_eq!(signing.unsigned_tx.compute_txid().to_string(), "1e9654e951a5ba44c8604c4de6c67fd78a27e81dcadcfe1edf638ba3aaebaed6");
        let signing = to_sign(hello.compute_txid(), &script, None).unwrap();
        assert_eq!(signing.unsigned_tx.compute_txid().to_string(), "88737ae86f2077145f93cc4b153ae9a1cb8d56afa511988c149c5c8c9d93bddf");
    }

    #[test]
    fn test_transcript_is_deterministic() {
        let script = vector_script();
        assert_eq!(to_spend(b"stake", &script), to_spend(b"stake", &script));
        assert_ne!(to_spend(b"stake", &script).compute_txid(), to_spend(b"unstake", &script).compute_txid());
    }

    #[test]
    fn test_sign_request_shape() {
        let script = vector_script();
        let psbt = sign_request("Hello World", &script, None).unwrap();
        assert_eq!(psbt.inputs[0].sighash_type, Some(PsbtSighashType::from(EcdsaSighashType::All)));
        assert_eq!(psbt.inputs[0].witness_utxo.as_ref().unwrap().script_pubkey, script);
        assert!(psbt.unsigned_tx.output[0].script_pubkey.is_op_return());
        assert_eq!(psbt.unsigned_tx.input[0].sequence, Sequence::ZERO);
    }

    #[test]
    fn test_signed_witness_encodes_as_base64() {
        let secp = Secp256k1::new();
        let key = PrivateKey::from_wif("L3VFeEujGtevx9w18HD1fhRbCH67Az2dpCymeRE1SoPK1XQtaxxx").unwrap();
        let pubkey = key.public_key(&secp);
        let script = vector_script();
        let mut psbt = sign_request("Hello World", &script, None).unwrap();

        let sighash = SighashCache::new(&psbt.unsigned_tx)
            .p2wpkh_signature_hash(0, &script, Amount::ZERO, EcdsaSighashType::All)
            .unwrap();
        let sig = secp.sign_ecdsa(&Message::from_digest(sighash.to_byte_array()), &key.inner);
        let sig = bitcoin::ecdsa::Signature::sighash_all(sig);
        psbt.inputs[0].final_script_witness = Some(Witness::from_slice(&[sig.to_vec(), pubkey.to_bytes()]));

        let encoded = encode_witness(&psbt).unwrap();
        let decoded: Witness = bitcoin::consensus::encode::deserialize(&STANDARD.decode(&encoded).unwrap()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.nth(1).unwrap(), pubkey.to_bytes().as_slice());
    }

    #[test]
    fn test_encode_requires_final_witness() {
        let psbt = sign_request("", &vector_script(), None).unwrap();
        assert!(matches!(encode_witness(&psbt), Err(WalletError::InvalidData(_))));
    }
}
