use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tierfee::query::{
    QueryBlockGasUsedResponse, QueryGasPriceResponse, QueryGasPricesResponse, QueryParamsResponse,
};

pub const DEFAULT_NODE_URL: &str = "http://localhost:1317";
const API_PREFIX: &str = "/tieredfee/v1";

pub struct FeeClient {
    client: Client,
    base_url: String,
}

impl FeeClient {
    pub fn new(url: Option<String>) -> Self {
        let base_url = url.unwrap_or_else(|| DEFAULT_NODE_URL.to_string());
        FeeClient {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| anyhow!("Failed to reach {}: {}", url, e))?;

        let status = response.status();
        let text = response.text().unwrap_or_default();
        decode(status, &text)
    }

    pub fn params(&self) -> Result<QueryParamsResponse> {
        self.get("/params")
    }

    pub fn gas_prices(&self) -> Result<QueryGasPricesResponse> {
        self.get("/gas_prices")
    }

    pub fn gas_price(&self, tier: u32) -> Result<QueryGasPriceResponse> {
        self.get(&format!("/gas_prices/{}", tier))
    }

    pub fn block_gas_used(&self) -> Result<QueryBlockGasUsedResponse> {
        self.get("/block_gas_used")
    }
}

/// Decode a query response body, turning `{"error": ...}` replies into errors.
pub fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| body.to_string());
        return Err(anyhow!("API error {}: {}", status, message));
    }
    serde_json::from_str(body).map_err(|e| anyhow!("Failed to parse response: {}", e))
}
