//! Which inputs a wallet should sign, and whether it needs the taproot-tweaked key.

use bitcoin::{Address, Psbt};
use serde_json::{json, Value};

use super::codec::psbt_to_base64;
use super::finalize::is_finalized;
use crate::types::Network;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToSignInput {
    pub index: usize,
    /// Address of the spent output, when the script has one.
    pub address: Option<String>,
    /// Key-path spend of the wallet's own taproot output.
    pub use_tweaked_signer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInputsPlan {
    pub psbt_base64: String,
    pub wallet_address: String,
    /// Inputs not yet finalized, in order.
    pub to_sign: Vec<ToSignInput>,
}

impl SignInputsPlan {
    pub fn indexes(&self) -> Vec<usize> { self.to_sign.iter().map(|i| i.index).collect() }

    /// `{ "<wallet address>": [indexes] }`
    pub fn sign_inputs_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(self.wallet_address.clone(), json!(self.indexes()));
        Value::Object(map)
    }
}

fn is_taproot_address(address: &str) -> bool { address.starts_with("bc1p") || address.starts_with("tb1p") }

pub fn sign_inputs_for(psbt: &Psbt, network: Network, wallet_address: &str) -> SignInputsPlan {
    let to_sign = psbt
        .inputs
        .iter()
        .enumerate()
        .filter(|(_, input)| !is_finalized(input))
        .map(|(index, input)| {
            let address = input
                .witness_utxo
                .as_ref()
                .and_then(|utxo| Address::from_script(&utxo.script_pubkey, network.to_bitcoin()).ok())
                .map(|a| a.to_string());
            let use_tweaked_signer = address
                .as_deref()
                .is_some_and(|a| is_taproot_address(a) && a == wallet_address);
            ToSignInput { index, address, use_tweaked_signer }
        })
        .collect();

    SignInputsPlan { psbt_base64: psbt_to_base64(psbt), wallet_address: wallet_address.to_string(), to_sign }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psbt::builder::build_transfer_psbt;
    use crate::psbt::funding::FundingPlan;
    use crate::types::Utxo;
    use bitcoin::secp256k1::{Secp256k1, SecretKey};
    use bitcoin::{CompressedPublicKey, KnownHrp, Witness};

    fn addresses() -> (Address, Address) {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[11u8; 32]).unwrap();
        let pk = sk.public_key(&secp);
        let taproot = Address::p2tr(&secp, pk.x_only_public_key().0, None, KnownHrp::Testnets);
        let segwit = Address::p2wpkh(&CompressedPublicKey(pk), KnownHrp::Testnets);
        (taproot, segwit)
    }

    fn utxo(address: &Address, byte: u8) -> Utxo {
        Utxo { txid: hex::encode([byte; 32]), vout: 0, value: 5_000, script_pubkey: address.script_pubkey().to_hex_string() }
    }

    fn psbt() -> Psbt {
        let (taproot, segwit) = addresses();
        let plan = FundingPlan { inputs: vec![utxo(&taproot, 1), utxo(&segwit, 2), utxo(&taproot, 3)], change_sats: 0, fee_sats: 500 };
        build_transfer_psbt(&plan, &segwit.to_string(), 14_500, &taproot.to_string(), Network::Signet).unwrap()
    }

    #[test]
    fn test_own_taproot_inputs_use_tweaked_signer() {
        let (taproot, segwit) = addresses();
        let plan = sign_inputs_for(&psbt(), Network::Signet, &taproot.to_string());
        assert_eq!(plan.indexes(), vec![0, 1, 2]);
        let tweaked: Vec<bool> = plan.to_sign.iter().map(|i| i.use_tweaked_signer).collect();
        assert_eq!(tweaked, vec![true, false, true]);
        assert_eq!(plan.to_sign[1].address, Some(segwit.to_string()));
    }

    #[test]
    fn test_foreign_taproot_is_not_tweaked() {
        let (_, segwit) = addresses();
        let plan = sign_inputs_for(&psbt(), Network::Signet, &segwit.to_string());
        assert!(plan.to_sign.iter().all(|i| !i.use_tweaked_signer));
    }

    #[test]
    fn test_finalized_inputs_are_skipped() {
        let (taproot, _) = addresses();
        let mut psbt = psbt();
        psbt.inputs[1].final_script_witness = Some(Witness::from_slice(&[vec![0u8; 64]]));
        let plan = sign_inputs_for(&psbt, Network::Signet, &taproot.to_string());
        assert_eq!(plan.indexes(), vec![0, 2]);
        let key = taproot.to_string();
        assert_eq!(plan.sign_inputs_json(), json!({ key: [0, 2] }));
    }
}
