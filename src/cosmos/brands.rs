//! Cosmos brand registry.
//!
//! | id | global | account events |
//! |----|--------|----------------|
//! | cosmos_keplr | `keplr` | window `keplr_keystorechange` |
//! | cosmos_okx | `okxwallet.keplr` | - |
//! | cosmos_bitget | `bitkeep.keplr` | - |
//! | cosmos_cosmostation | `cosmostation.providers.keplr` | - |
//! | cosmos_leap | `leap` | - |
//! | cosmos_onekey | `$onekey.cosmos` | - |
//! | cosmos_station | `station.keplr` | - |
//! | cosmos_tomo | `tomo_cosmos` | `tomo_btc.on/off` |
//! | cosmos_unisat | `unisat_wallet.keplr` | `unisat.on/off("accountsChanged")` |
//! | cosmos_keystone | QR relay | - |

use std::rc::Rc;

use super::{keystone, AccountEvents, CosmosProvider, CosmosWallet, InjectedKeplr};
use crate::catalog::{ChainType, Connector, WalletDescriptor, WalletKind};
use crate::config::ProviderOption;
use crate::error::WalletResult;
use crate::host::require;

const fn extension(
    id: &'static str,
    name: &'static str,
    icon: &'static str,
    connector: fn(ProviderOption) -> WalletResult<Box<dyn CosmosWallet>>,
) -> WalletDescriptor {
    WalletDescriptor {
        id,
        name,
        icon,
        chain_type: ChainType::Cosmos,
        kind: WalletKind::Extension,
        connector: Connector::Cosmos(connector),
    }
}

pub static KEPLR: WalletDescriptor = extension("cosmos_keplr", "Keplr", "keplr_wallet.png", connect_keplr);
pub static OKX: WalletDescriptor = extension("cosmos_okx", "OKX", "okx_wallet.svg", connect_okx);
pub static BITGET: WalletDescriptor = extension("cosmos_bitget", "Bitget", "bitget-wallet.png", connect_bitget);
pub static COSMOSTATION: WalletDescriptor =
    extension("cosmos_cosmostation", "Cosmostation", "cosmostation.svg", connect_cosmostation);
pub static LEAP: WalletDescriptor = extension("cosmos_leap", "Leap", "leap.svg", connect_leap);
pub static ONEKEY: WalletDescriptor = extension("cosmos_onekey", "OneKey", "onekey.svg", connect_onekey);
pub static STATION: WalletDescriptor = extension("cosmos_station", "Station", "station.svg", connect_station);
pub static TOMO: WalletDescriptor = extension("cosmos_tomo", "Tomo", "tomo.png", connect_tomo);
pub static UNISAT: WalletDescriptor = extension("cosmos_unisat", "Unisat", "unisat_wallet.svg", connect_unisat);
pub static KEYSTONE: WalletDescriptor = WalletDescriptor {
    id: "cosmos_keystone",
    name: "Keystone",
    icon: "keystone.svg",
    chain_type: ChainType::Cosmos,
    kind: WalletKind::Qrcode,
    connector: Connector::Cosmos(connect_keystone),
};

/// Provider over the Keplr-compatible object at `path`.
fn injected(
    descriptor: &'static WalletDescriptor,
    option: ProviderOption,
    path: &str,
    wallet: &'static str,
    events: AccountEvents,
) -> WalletResult<Box<dyn CosmosWallet>> {
    let object = require(option.host.as_ref(), path, &format!("{} extension", wallet))?;
    let api = Rc::new(InjectedKeplr::new(object, wallet));
    Ok(Box::new(CosmosProvider::new(descriptor, api, &option, events)))
}

fn connect_keplr(option: ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    injected(&KEPLR, option, "keplr", "Keplr Wallet", AccountEvents::Window("keplr_keystorechange"))
}

fn connect_okx(option: ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    injected(&OKX, option, "okxwallet.keplr", "OKX Wallet", AccountEvents::Unsupported)
}

fn connect_bitget(option: ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    injected(&BITGET, option, "bitkeep.keplr", "Bitget Wallet", AccountEvents::Unsupported)
}

fn connect_cosmostation(option: ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    injected(&COSMOSTATION, option, "cosmostation.providers.keplr", "Cosmostation Wallet", AccountEvents::Unsupported)
}

fn connect_leap(option: ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    injected(&LEAP, option, "leap", "Leap Wallet", AccountEvents::Unsupported)
}

fn connect_onekey(option: ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    injected(&ONEKEY, option, "$onekey.cosmos", "OneKey Wallet", AccountEvents::Unsupported)
}

fn connect_station(option: ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    injected(&STATION, option, "station.keplr", "Station Wallet", AccountEvents::Unsupported)
}

fn connect_tomo(option: ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    let events = AccountEvents::Forward { path: "tomo_btc", rename: None };
    injected(&TOMO, option, "tomo_cosmos", "Tomo Wallet", events)
}

fn connect_unisat(option: ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    let events = AccountEvents::Forward { path: "unisat", rename: Some("accountsChanged") };
    injected(&UNISAT, option, "unisat_wallet.keplr", "UniSat Wallet", events)
}

fn connect_keystone(option: ProviderOption) -> WalletResult<Box<dyn CosmosWallet>> {
    keystone::provider(&KEYSTONE, &option)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmos::{ArbitraryData, BankQuery, Coin, CosmosKey, StdFee, StdSignDoc};
    use crate::config::ChainConfig;
    use crate::error::WalletError;
    use crate::host::memory::{MemoryHost, MemoryObject};
    use crate::host::Listener;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    const ADDRESS: &str = "cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu";

    struct FixedBank(u128);

    #[async_trait(?Send)]
    impl BankQuery for FixedBank {
        async fn balance(&self, address: &str, denom: &str) -> WalletResult<u128> {
            assert_eq!(address, ADDRESS);
            assert_eq!(denom, "uatom");
            Ok(self.0)
        }
    }

    fn keplr_object() -> Rc<MemoryObject> {
        let key = CosmosKey {
            name: "main".into(),
            algo: "secp256k1".into(),
            pub_key: vec![2, 1, 2, 3],
            bech32_address: ADDRESS.into(),
            ..Default::default()
        };
        MemoryObject::new()
            .with_value("enable", Value::Null)
            .with_value("getKey", serde_json::to_value(key).unwrap())
            .with_method("signArbitrary", |args| {
                Ok(json!({ "pub_key": { "type": "t", "value": "v" }, "signature": args[2].clone() }))
            })
    }

    fn option(host: Rc<MemoryHost>) -> ProviderOption {
        ProviderOption::new(host)
            .with_chain(ChainConfig::new("cosmoshub-4"))
            .with_bank(Rc::new(FixedBank(42)))
    }

    fn doc(chain_id: &str) -> StdSignDoc {
        StdSignDoc {
            chain_id: chain_id.into(),
            account_number: "1".into(),
            sequence: "0".into(),
            fee: StdFee { amount: vec![Coin { denom: "uatom".into(), amount: "1".into() }], gas: "1".into(), payer: None, granter: None },
            msgs: vec![],
            memo: String::new(),
            timeout_height: None,
        }
    }

    #[test]
    fn test_missing_extension() {
        let host = Rc::new(MemoryHost::new());
        let err = connect_station(option(host)).err().unwrap();
        assert_eq!(err, WalletError::ProviderNotFound("Station Wallet extension".into()));
    }

    #[tokio::test]
    async fn test_connect_and_queries() {
        let object = keplr_object();
        let host = Rc::new(MemoryHost::new().with_global("okxwallet", MemoryObject::new().with_child("keplr", object.clone())));
        let wallet = connect_okx(option(host)).unwrap();

        wallet.connect_wallet().await.unwrap();
        assert_eq!(object.calls_to("enable"), vec![vec![json!("cosmoshub-4")]]);
        assert_eq!(wallet.get_network().await.unwrap(), "cosmoshub-4");
        assert_eq!(wallet.get_address().await.unwrap(), ADDRESS);
        assert_eq!(wallet.get_public_key_hex().await.unwrap(), "02010203");
        assert_eq!(wallet.get_balance("uatom").await.unwrap(), 42);

        let signature = wallet.sign_arbitrary(ADDRESS, &ArbitraryData::Text("hello".into())).await.unwrap();
        assert_eq!(signature.signature, "hello");

        let signer = wallet.get_offline_signer().await.unwrap();
        let accounts = signer.get_accounts().await.unwrap();
        assert_eq!(accounts[0].address, ADDRESS);
        assert_eq!(accounts[0].pubkey, vec![2, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_sign_amino_guards() {
        let object = keplr_object();
        let host = Rc::new(MemoryHost::new().with_global("leap", object.clone()));
        let wallet = connect_leap(option(host)).unwrap();

        let err = wallet.sign_amino(ADDRESS, &doc("osmosis-1"), None).await.unwrap_err();
        assert!(err.to_string().contains("Unmatched chain id with the offline signer"));
        let err = wallet.sign_amino("cosmos1other", &doc("cosmoshub-4"), None).await.unwrap_err();
        assert!(err.to_string().contains("Unknown signer address"));

        let signer = wallet.get_offline_signer().await.unwrap();
        assert!(signer.sign_amino(ADDRESS, &doc("osmosis-1")).await.is_err());
        assert!(object.calls_to("signAmino").is_empty());
    }

    #[tokio::test]
    async fn test_rejected_enable() {
        let object = MemoryObject::new().with_error("enable", "User rejected the request");
        let host = Rc::new(MemoryHost::new().with_global("keplr", object));
        let wallet = connect_keplr(option(host)).unwrap();
        assert!(matches!(wallet.connect_wallet().await, Err(WalletError::ConnectionRejected(_))));
    }

    #[test]
    fn test_keplr_events_use_window() {
        let host = Rc::new(MemoryHost::new().with_global("keplr", keplr_object()));
        let wallet = connect_keplr(option(host.clone())).unwrap();
        let listener: Listener = Rc::new(|_| {});

        wallet.on("accountChanged", &listener).unwrap();
        assert_eq!(host.window_listener_count("keplr_keystorechange"), 1);
        wallet.on("disconnect", &listener).unwrap();
        assert_eq!(host.window_listener_count("disconnect"), 0);
        wallet.off("accountChanged", &listener).unwrap();
        assert_eq!(host.window_listener_count("keplr_keystorechange"), 0);
    }

    #[test]
    fn test_unisat_events_are_symmetric() {
        let unisat = MemoryObject::new().with_events();
        let host = Rc::new(
            MemoryHost::new()
                .with_global("unisat_wallet", MemoryObject::new().with_child("keplr", keplr_object()))
                .with_global("unisat", unisat.clone()),
        );
        let wallet = connect_unisat(option(host)).unwrap();
        let listener: Listener = Rc::new(|_| {});

        wallet.on("accountChanged", &listener).unwrap();
        assert_eq!(unisat.listener_count("accountsChanged"), 1);
        wallet.off("accountChanged", &listener).unwrap();
        assert_eq!(unisat.listener_count("accountsChanged"), 0);
    }

    #[test]
    fn test_tomo_forwards_events() {
        let tomo_btc = MemoryObject::new().with_events();
        let host = Rc::new(
            MemoryHost::new().with_global("tomo_cosmos", keplr_object()).with_global("tomo_btc", tomo_btc.clone()),
        );
        let wallet = connect_tomo(option(host)).unwrap();
        let listener: Listener = Rc::new(|_| {});

        wallet.on("accountChanged", &listener).unwrap();
        wallet.on("disconnect", &listener).unwrap();
        assert_eq!(tomo_btc.listener_count("accountChanged"), 1);
        assert_eq!(tomo_btc.listener_count("disconnect"), 1);
    }
}
