//! Bank balance over the Cosmos LCD (REST) gateway.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{WalletError, WalletResult};

/// Balance lookup behind Cosmos adapters.
#[async_trait(?Send)]
pub trait BankQuery {
    /// Amount of `denom` held by `address`, in base units.
    async fn balance(&self, address: &str, denom: &str) -> WalletResult<u128>;
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Option<BalanceCoin>,
}

#[derive(Debug, Deserialize)]
struct BalanceCoin {
    amount: String,
}

/// Parses `{"balance": {"denom": .., "amount": ".."}}`. A missing balance is zero.
pub(crate) fn parse_balance(body: &str) -> WalletResult<u128> {
    let response: BalanceResponse = serde_json::from_str(body)?;
    match response.balance {
        Some(coin) => coin.amount.parse().map_err(|_| WalletError::invalid(format!("amount {:?}", coin.amount))),
        None => Ok(0),
    }
}

#[derive(Clone)]
pub struct LcdClient {
    http_client: reqwest::Client,
    rest_url: Option<String>,
}

impl std::fmt::Debug for LcdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LcdClient").field("rest_url", &self.rest_url).finish_non_exhaustive()
    }
}

impl LcdClient {
    pub fn new(rest_url: Option<String>) -> Self {
        let rest_url = rest_url.filter(|u| !u.is_empty()).map(|u| u.trim_end_matches('/').to_string());
        Self { http_client: reqwest::Client::new(), rest_url }
    }

    pub fn balance_url(&self, address: &str, denom: &str) -> WalletResult<reqwest::Url> {
        let rest = self.rest_url.as_deref().ok_or_else(|| WalletError::invalid("chain rest_url is not configured"))?;
        reqwest::Url::parse_with_params(
            &format!("{}/cosmos/bank/v1beta1/balances/{}/by_denom", rest, address),
            [("denom", denom)],
        )
        .map_err(WalletError::invalid)
    }
}

#[async_trait(?Send)]
impl BankQuery for LcdClient {
    async fn balance(&self, address: &str, denom: &str) -> WalletResult<u128> {
        let url = self.balance_url(address, denom)?;
        debug!("bank balance {}", url);
        let response = self.http_client.get(url).send().await?;
        let ok = response.status().is_success();
        let body = response.text().await?;
        if !ok {
            return Err(WalletError::Upstream(body));
        }
        parse_balance(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_url() {
        let client = LcdClient::new(Some("https://lcd.example.com/".into()));
        let url = client.balance_url("cosmos1abc", "ibc/27394FB0").unwrap();
        assert_eq!(
            url.as_str(),
            "https://lcd.example.com/cosmos/bank/v1beta1/balances/cosmos1abc/by_denom?denom=ibc%2F27394FB0"
        );
        assert!(LcdClient::new(None).balance_url("cosmos1abc", "uatom").is_err());
    }

    #[test]
    fn test_parse_balance() {
        assert_eq!(parse_balance(r#"{"balance":{"denom":"uatom","amount":"340282366920938463463"}}"#).unwrap(), 340282366920938463463);
        assert_eq!(parse_balance(r#"{"balance":null}"#).unwrap(), 0);
        assert!(parse_balance(r#"{"balance":{"denom":"uatom","amount":"x"}}"#).is_err());
    }
}
