//! HTTP client for the exchange-info endpoint.

use crate::error::{RegistryError, RegistryResult};
use medtrack_core::Symbol;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const STATUS_TRADING: &str = "TRADING";

/// Exchange-info response; only the fields used for selection.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfoResponse {
    pub symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeSymbol {
    pub symbol: String,
    pub status: String,
    pub quote_asset: String,
}

impl ExchangeInfoResponse {
    /// Symbols currently trading against `quote_asset`, lower-cased.
    pub fn trading_symbols(&self, quote_asset: &str) -> Vec<Symbol> {
        self.symbols
            .iter()
            .filter(|s| s.status == STATUS_TRADING && s.quote_asset == quote_asset)
            .filter_map(|s| Symbol::parse(&s.symbol).ok())
            .collect()
    }
}

/// Client for the exchange metadata endpoint.
pub struct ExchangeInfoClient {
    client: Client,
    url: String,
}

impl ExchangeInfoClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `url` - full exchange-info URL (e.g., "https://api.binance.com/api/v3/exchangeInfo")
    pub fn new(url: impl Into<String>) -> RegistryResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the full exchange-info document.
    pub async fn fetch(&self) -> RegistryResult<ExchangeInfoResponse> {
        info!(url = %self.url, "Fetching exchange info");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let info: ExchangeInfoResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::ParseError(e.to_string()))?;

        debug!(symbols = info.symbols.len(), "Exchange info received");
        Ok(info)
    }

    /// Fetch the symbols trading against `quote_asset`.
    pub async fn fetch_symbols(&self, quote_asset: &str) -> RegistryResult<Vec<Symbol>> {
        let symbols = self.fetch().await?.trading_symbols(quote_asset);
        if symbols.is_empty() {
            return Err(RegistryError::NoSymbols(format!(
                "no trading symbols quoted in {quote_asset}"
            )));
        }
        Ok(symbols)
    }
}
