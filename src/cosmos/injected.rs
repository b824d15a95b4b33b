//! Keplr-compatible injected object (`window.keplr`, `okxwallet.keplr`, ...).

use std::rc::Rc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{AminoSignResponse, ArbitraryData, CosmosKey, KeplrApi, StdSignDoc, StdSignature};
use crate::error::WalletResult;
use crate::host::{call_as, InjectedObject};

pub struct InjectedKeplr {
    object: Rc<dyn InjectedObject>,
    /// Human name for error messages
    wallet: &'static str,
}

impl std::fmt::Debug for InjectedKeplr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectedKeplr").field("wallet", &self.wallet).finish_non_exhaustive()
    }
}

impl InjectedKeplr {
    pub fn new(object: Rc<dyn InjectedObject>, wallet: &'static str) -> Self { Self { object, wallet } }
}

#[async_trait(?Send)]
impl KeplrApi for InjectedKeplr {
    async fn enable(&self, chain_id: &str) -> WalletResult<()> {
        self.object.call("enable", vec![json!(chain_id)]).await.map_err(|e| e.on_connect(self.wallet))?;
        Ok(())
    }

    async fn get_key(&self, chain_id: &str) -> WalletResult<CosmosKey> {
        call_as(self.object.as_ref(), "getKey", vec![json!(chain_id)]).await
    }

    async fn sign_amino(
        &self,
        chain_id: &str,
        signer: &str,
        sign_doc: &StdSignDoc,
        options: Option<Value>,
    ) -> WalletResult<AminoSignResponse> {
        let args = vec![json!(chain_id), json!(signer), serde_json::to_value(sign_doc)?, options.unwrap_or(Value::Null)];
        call_as(self.object.as_ref(), "signAmino", args).await
    }

    async fn sign_arbitrary(&self, chain_id: &str, signer: &str, data: &ArbitraryData) -> WalletResult<StdSignature> {
        let args = vec![json!(chain_id), json!(signer), serde_json::to_value(data)?];
        call_as(self.object.as_ref(), "signArbitrary", args).await
    }
}
