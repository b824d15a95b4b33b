//! Local PSBT finalizer for wallets that return signed but unfinalized inputs.
//!
//! Supported spends: P2WPKH, P2SH-P2WPKH, P2PKH (single partial signature) and P2TR key path
//! (`tap_key_sig`). After finalizing, the signing fields are cleared as BIP-174 requires.

use bitcoin::psbt::Input;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::{Psbt, ScriptBuf, Transaction, Witness};
use tracing::debug;

use super::codec::{psbt_from_hex, psbt_to_hex};
use crate::error::{WalletError, WalletResult};

pub fn is_finalized(input: &Input) -> bool {
    input.final_script_sig.is_some() || input.final_script_witness.is_some()
}

pub fn all_finalized(psbt: &Psbt) -> bool { psbt.inputs.iter().all(is_finalized) }

fn push_bytes(bytes: Vec<u8>) -> WalletResult<PushBytesBuf> {
    PushBytesBuf::try_from(bytes).map_err(WalletError::invalid)
}

fn spent_script(psbt: &Psbt, index: usize) -> Option<ScriptBuf> {
    let input = &psbt.inputs[index];
    if let Some(utxo) = &input.witness_utxo {
        return Some(utxo.script_pubkey.clone());
    }
    let vout = psbt.unsigned_tx.input.get(index)?.previous_output.vout as usize;
    input.non_witness_utxo.as_ref()?.output.get(vout).map(|o| o.script_pubkey.clone())
}

fn clear_signing_fields(input: &mut Input) {
    input.partial_sigs.clear();
    input.sighash_type = None;
    input.redeem_script = None;
    input.witness_script = None;
    input.bip32_derivation.clear();
    input.tap_key_sig = None;
    input.tap_script_sigs.clear();
    input.tap_scripts.clear();
    input.tap_key_origins.clear();
    input.tap_internal_key = None;
    input.tap_merkle_root = None;
}

pub fn finalize_input(psbt: &mut Psbt, index: usize) -> WalletResult<()> {
    if index >= psbt.inputs.len() {
        return Err(WalletError::invalid(format!("input {} out of range", index)));
    }
    if is_finalized(&psbt.inputs[index]) {
        return Ok(());
    }
    let script = spent_script(psbt, index);
    let input = &mut psbt.inputs[index];

    if let Some(sig) = input.tap_key_sig {
        input.final_script_witness = Some(Witness::from_slice(&[sig.to_vec()]));
        clear_signing_fields(input);
        return Ok(());
    }

    let script = script.ok_or_else(|| WalletError::invalid(format!("input {} has no utxo", index)))?;
    let (pubkey, sig) = match input.partial_sigs.iter().next() {
        Some((pk, sig)) if input.partial_sigs.len() == 1 => (*pk, *sig),
        _ => return Err(WalletError::invalid(format!("input {} needs exactly one signature", index))),
    };

    if script.is_p2wpkh() {
        input.final_script_witness = Some(Witness::from_slice(&[sig.to_vec(), pubkey.to_bytes()]));
    } else if script.is_p2sh() && input.redeem_script.as_ref().is_some_and(|r| r.is_p2wpkh()) {
        let redeem = input.redeem_script.as_ref().map(|r| r.to_bytes()).unwrap_or_default();
        input.final_script_sig = Some(Builder::new().push_slice(push_bytes(redeem)?).into_script());
        input.final_script_witness = Some(Witness::from_slice(&[sig.to_vec(), pubkey.to_bytes()]));
    } else if script.is_p2pkh() {
        input.final_script_sig = Some(
            Builder::new().push_slice(push_bytes(sig.to_vec())?).push_key(&pubkey).into_script(),
        );
    } else {
        return Err(WalletError::invalid(format!("input {}: cannot finalize script {}", index, script)));
    }
    clear_signing_fields(input);
    Ok(())
}

pub fn finalize_all(psbt: &mut Psbt) -> WalletResult<()> {
    for index in 0..psbt.inputs.len() {
        finalize_input(psbt, index)?;
    }
    Ok(())
}

/// Leaves wallet-finalized PSBTs untouched; finalizes the rest locally.
pub fn ensure_finalized(psbt: &mut Psbt) -> WalletResult<()> {
    if all_finalized(psbt) {
        return Ok(());
    }
    debug!("finalizing {} of {} inputs locally", psbt.inputs.iter().filter(|i| !is_finalized(i)).count(), psbt.inputs.len());
    finalize_all(psbt)
}

/// Hex in, finalized hex out.
pub fn ensure_finalized_hex(psbt_hex: &str) -> WalletResult<String> {
    let mut psbt = psbt_from_hex(psbt_hex)?;
    ensure_finalized(&mut psbt)?;
    Ok(psbt_to_hex(&psbt))
}

pub fn extract(psbt: Psbt) -> WalletResult<Transaction> {
    if !all_finalized(&psbt) {
        return Err(WalletError::invalid("PSBT has unfinalized inputs"));
    }
    psbt.extract_tx().map_err(|e| WalletError::invalid(format!("extract: {}", e)))
}
