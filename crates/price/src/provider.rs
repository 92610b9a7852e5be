//! Quote providers.
//!
//! Each provider knows one upstream quote API. Response parsing is split
//! out of the HTTP call so it can be tested against canned payloads.

use reqwest::Client;
use serde_json::Value;

use crate::PriceError;

/// One upstream source for the reward token's USD price.
#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch a quote. Any error here is this provider's failure only;
    /// the resolver falls through to the next source.
    async fn fetch(&self, client: &Client) -> Result<f64, PriceError>;
}

/// Jupiter price API v2: `GET {base}/price/v2?ids={mint}`.
pub struct JupiterProvider {
    base_url: String,
    mint: String,
}

impl JupiterProvider {
    pub fn new(base_url: impl Into<String>, mint: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            mint: mint.into(),
        }
    }
}

#[async_trait::async_trait]
impl QuoteProvider for JupiterProvider {
    fn name(&self) -> &str {
        "jupiter"
    }

    async fn fetch(&self, client: &Client) -> Result<f64, PriceError> {
        let url = format!("{}/price/v2?ids={}", self.base_url, self.mint);
        let body: Value = client.get(&url).send().await?.json().await?;
        parse_jupiter(&body, &self.mint)
    }
}

/// Extract `data.{mint}.price` from a Jupiter v2 response. The field is a
/// decimal string in v2; older deployments returned a number.
pub fn parse_jupiter(body: &Value, mint: &str) -> Result<f64, PriceError> {
    let price = &body["data"][mint]["price"];
    let parsed = match price {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
    .ok_or(PriceError::MissingQuote)?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(PriceError::InvalidQuote(parsed));
    }
    Ok(parsed)
}

/// DexScreener token API: `GET {base}/latest/dex/tokens/{mint}`.
pub struct DexScreenerProvider {
    base_url: String,
    mint: String,
}

impl DexScreenerProvider {
    pub fn new(base_url: impl Into<String>, mint: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            mint: mint.into(),
        }
    }
}

#[async_trait::async_trait]
impl QuoteProvider for DexScreenerProvider {
    fn name(&self) -> &str {
        "dexscreener"
    }

    async fn fetch(&self, client: &Client) -> Result<f64, PriceError> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, self.mint);
        let body: Value = client.get(&url).send().await?.json().await?;
        parse_dexscreener(&body)
    }
}

/// Extract the first pair's `priceUsd` from a DexScreener response.
pub fn parse_dexscreener(body: &Value) -> Result<f64, PriceError> {
    let parsed = body["pairs"][0]["priceUsd"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or(PriceError::MissingQuote)?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(PriceError::InvalidQuote(parsed));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MINT: &str = "So11111111111111111111111111111111111111112";

    #[test]
    fn jupiter_string_price() {
        let body = json!({"data": {MINT: {"id": MINT, "price": "3.25"}}});
        assert_eq!(parse_jupiter(&body, MINT).unwrap(), 3.25);
    }

    #[test]
    fn jupiter_numeric_price() {
        let body = json!({"data": {MINT: {"price": 0.004}}});
        assert_eq!(parse_jupiter(&body, MINT).unwrap(), 0.004);
    }

    #[test]
    fn jupiter_missing_mint() {
        let body = json!({"data": {}});
        assert!(matches!(
            parse_jupiter(&body, MINT),
            Err(PriceError::MissingQuote)
        ));
    }

    #[test]
    fn jupiter_rejects_zero() {
        let body = json!({"data": {MINT: {"price": "0"}}});
        assert!(matches!(
            parse_jupiter(&body, MINT),
            Err(PriceError::InvalidQuote(_))
        ));
    }

    #[test]
    fn dexscreener_first_pair() {
        let body = json!({"pairs": [{"priceUsd": "0.0021"}, {"priceUsd": "0.0034"}]});
        assert_eq!(parse_dexscreener(&body).unwrap(), 0.0021);
    }

    #[test]
    fn dexscreener_no_pairs() {
        let body = json!({"pairs": []});
        assert!(matches!(
            parse_dexscreener(&body),
            Err(PriceError::MissingQuote)
        ));
    }
}
