//! Bitcoin network stats from a blockchain.info-style endpoint.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::openai::ApiError;

pub const DEFAULT_BLOCKCHAIN_API: &str = "https://api.blockchain.info/stats";

pub const BLOCKCHAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockchainStats {
    #[serde(default)]
    pub market_price_usd: f64,
    #[serde(default)]
    pub n_tx: i64,
    #[serde(default)]
    pub hash_rate: f64,
}

impl BlockchainStats {
    pub fn format(&self) -> String {
        format!(
            "BTC price: ${:.2}\nTransactions: {}\nHash rate: {:.2}",
            self.market_price_usd, self.n_tx, self.hash_rate
        )
    }
}

pub struct BlockchainClient {
    url: String,
    http: reqwest::Client,
}

impl BlockchainClient {
    pub fn new(url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(BLOCKCHAIN_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { url: url.into(), http }
    }

    pub async fn fetch(&self) -> Result<BlockchainStats, ApiError> {
        debug!("GET {}", self.url);
        let response = self.http.get(&self.url).send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(ApiError::Api {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

fn transport(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_two_decimals() {
        let stats = BlockchainStats {
            market_price_usd: 64123.456,
            n_tx: 350123,
            hash_rate: 6.5e8,
        };
        assert_eq!(
            stats.format(),
            "BTC price: $64123.46\nTransactions: 350123\nHash rate: 650000000.00"
        );
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let stats: BlockchainStats =
            serde_json::from_str(r#"{"market_price_usd":1.5,"n_tx":2,"hash_rate":3.25,"difficulty":9}"#).unwrap();
        assert_eq!(stats.format(), "BTC price: $1.50\nTransactions: 2\nHash rate: 3.25");
    }
}
