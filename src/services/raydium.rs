//! Raydium CPMM program addresses and fee configuration lookup

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::debug;

use crate::services::blockchain::KeyUtils;

/// Deployed CPMM program and the account that collects pool creation fees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpmmProgram {
    pub program_id: Pubkey,
    pub fee_account: Pubkey,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpmmFeeConfig {
    pub id: String,
    pub index: u16,
    #[serde(default)]
    pub protocol_fee_rate: u64,
    #[serde(default)]
    pub trade_fee_rate: u64,
    #[serde(default)]
    pub fund_fee_rate: u64,
    #[serde(default, deserialize_with = "lamports_from_any")]
    pub create_pool_fee: u64,
}

impl CpmmFeeConfig {
    pub fn address(&self) -> Result<Pubkey> {
        KeyUtils::parse_pubkey(&self.id)
    }
}

// the API serves lamport amounts as either strings or numbers
fn lamports_from_any<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    success: Option<bool>,
    data: T,
}

#[async_trait]
pub trait PoolConfigSource: Send + Sync {
    async fn fee_configs(&self) -> Result<Vec<CpmmFeeConfig>>;
}

#[derive(Clone)]
pub struct RaydiumApiClient {
    client: reqwest::Client,
    api_url: String,
}

impl std::fmt::Debug for RaydiumApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaydiumApiClient")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl RaydiumApiClient {
    pub fn new(api_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| anyhow!("Failed to build Raydium HTTP client: {}", e))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PoolConfigSource for RaydiumApiClient {
    async fn fee_configs(&self) -> Result<Vec<CpmmFeeConfig>> {
        let url = format!("{}/main/cpmm-config", self.api_url);
        debug!("Fetching CPMM fee configurations from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch CPMM fee configurations: {}", e))?
            .error_for_status()
            .map_err(|e| anyhow!("CPMM fee configuration request failed: {}", e))?;

        let body: ApiResponse<Vec<CpmmFeeConfig>> = response
            .json()
            .await
            .map_err(|e| anyhow!("Invalid CPMM fee configuration response: {}", e))?;

        if body.success == Some(false) {
            return Err(anyhow!("Raydium API reported failure for cpmm-config"));
        }
        Ok(body.data)
    }
}
