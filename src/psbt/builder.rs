//! Unsigned transfer PSBT from a funding plan.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, OutPoint, Psbt, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use super::funding::FundingPlan;
use crate::error::{WalletError, WalletResult};
use crate::types::Network;

/// Parses `address` and checks it belongs to `network`.
pub fn parse_address(address: &str, network: Network) -> WalletResult<Address> {
    Ok(Address::from_str(address)?.require_network(network.to_bitcoin())?)
}

/// One `witness_utxo` input per planned UTXO, the payment, then change back to
/// `change_address` when the plan has any.
pub fn build_transfer_psbt(
    plan: &FundingPlan,
    to: &str,
    amount_sats: u64,
    change_address: &str,
    network: Network,
) -> WalletResult<Psbt> {
    let destination = parse_address(to, network)?;

    let mut prevouts = Vec::with_capacity(plan.inputs.len());
    let mut input = Vec::with_capacity(plan.inputs.len());
    for utxo in &plan.inputs {
        let txid = Txid::from_str(&utxo.txid).map_err(|e| WalletError::invalid(format!("txid {}: {}", utxo.txid, e)))?;
        let script_pubkey = ScriptBuf::from_hex(&utxo.script_pubkey)
            .map_err(|e| WalletError::invalid(format!("scriptPubKey {}: {}", utxo.script_pubkey, e)))?;
        input.push(TxIn {
            previous_output: OutPoint { txid, vout: utxo.vout },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        });
        prevouts.push(TxOut { value: Amount::from_sat(utxo.value), script_pubkey });
    }

    let mut output = vec![TxOut { value: Amount::from_sat(amount_sats), script_pubkey: destination.script_pubkey() }];
    if plan.has_change() {
        let change = parse_address(change_address, network)?;
        output.push(TxOut { value: Amount::from_sat(plan.change_sats), script_pubkey: change.script_pubkey() });
    }

    let tx = Transaction { version: Version::TWO, lock_time: LockTime::ZERO, input, output };
    let mut psbt = Psbt::from_unsigned_tx(tx)?;
    for (psbt_input, prevout) in psbt.inputs.iter_mut().zip(prevouts) {
        psbt_input.witness_utxo = Some(prevout);
    }
    Ok(psbt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psbt::funding::build_funding_plan;
    use crate::types::Utxo;

    const OWN: &str = "bc1q9vza2e8x573nczrlzms0wvx3gsqjx7vavgkx0l";
    const DEST: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

    fn own_utxo(value: u64, byte: u8) -> Utxo {
        let script = parse_address(OWN, Network::Mainnet).unwrap().script_pubkey();
        Utxo { txid: hex::encode([byte; 32]), vout: 1, value, script_pubkey: script.to_hex_string() }
    }

    #[test]
    fn test_psbt_layout_with_change() {
        let plan = build_funding_plan(&[own_utxo(5000, 1), own_utxo(3000, 2), own_utxo(1000, 3)], 6000, 1.0).unwrap();
        let psbt = build_transfer_psbt(&plan, DEST, 6000, OWN, Network::Mainnet).unwrap();

        assert_eq!(psbt.unsigned_tx.input.len(), 2);
        assert_eq!(psbt.unsigned_tx.input[0].previous_output.txid.to_string(), hex::encode([1u8; 32]));
        assert_eq!(psbt.unsigned_tx.output.len(), 2);
        assert_eq!(psbt.unsigned_tx.output[0].value.to_sat(), 6000);
        assert_eq!(psbt.unsigned_tx.output[1].value.to_sat(), 1562);
        assert_eq!(psbt.inputs[0].witness_utxo.as_ref().unwrap().value.to_sat(), 5000);
        assert!(psbt.inputs.iter().all(|i| i.witness_utxo.is_some()));
    }

    #[test]
    fn test_no_change_output_without_change() {
        let plan = FundingPlan { inputs: vec![own_utxo(6258, 9)], change_sats: 0, fee_sats: 258 };
        let psbt = build_transfer_psbt(&plan, DEST, 6000, OWN, Network::Mainnet).unwrap();
        assert_eq!(psbt.unsigned_tx.output.len(), 1);
    }

    #[test]
    fn test_destination_must_match_network() {
        let plan = FundingPlan { inputs: vec![own_utxo(9000, 9)], change_sats: 0, fee_sats: 258 };
        let err = build_transfer_psbt(&plan, DEST, 6000, OWN, Network::Signet).unwrap_err();
        assert!(matches!(err, WalletError::InvalidData(_)));
    }
}
