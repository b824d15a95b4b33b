//! PSBT / transaction encodings used across the wallet seam.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bitcoin::{Psbt, Transaction};

use crate::error::{WalletError, WalletResult};

pub fn psbt_from_hex(psbt_hex: &str) -> WalletResult<Psbt> {
    let bytes = hex::decode(psbt_hex.trim())?;
    Ok(Psbt::deserialize(&bytes)?)
}

pub fn psbt_to_hex(psbt: &Psbt) -> String { hex::encode(psbt.serialize()) }

pub fn psbt_from_base64(psbt_base64: &str) -> WalletResult<Psbt> {
    let bytes = STANDARD.decode(psbt_base64.trim()).map_err(|e| WalletError::invalid(format!("base64: {}", e)))?;
    Ok(Psbt::deserialize(&bytes)?)
}

pub fn psbt_to_base64(psbt: &Psbt) -> String { STANDARD.encode(psbt.serialize()) }

pub fn hex_to_base64(psbt_hex: &str) -> WalletResult<String> { Ok(psbt_to_base64(&psbt_from_hex(psbt_hex)?)) }
pub fn base64_to_hex(psbt_base64: &str) -> WalletResult<String> { Ok(psbt_to_hex(&psbt_from_base64(psbt_base64)?)) }

pub fn tx_to_hex(tx: &Transaction) -> String { bitcoin::consensus::encode::serialize_hex(tx) }
