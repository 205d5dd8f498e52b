use anyhow::{anyhow, Result};
use serde::Serialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::blockchain::instructions::{
    RAYDIUM_API_DEVNET, RAYDIUM_API_MAINNET, RAYDIUM_CPMM_FEE_ACCOUNT_DEVNET,
    RAYDIUM_CPMM_FEE_ACCOUNT_MAINNET, RAYDIUM_CPMM_PROGRAM_ID_DEVNET, RAYDIUM_CPMM_PROGRAM_ID_MAINNET,
};
use crate::services::storage::pinata::{DEFAULT_PINATA_API_URL, DEFAULT_PINATA_GATEWAY_URL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Devnet,
    Mainnet,
}

impl FromStr for Cluster {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "devnet" => Ok(Cluster::Devnet),
            "mainnet" | "mainnet-beta" => Ok(Cluster::Mainnet),
            other => Err(anyhow!("Unknown SOLANA_CLUSTER '{}', expected devnet or mainnet", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Sign every request as soon as it is built
    Auto,
    /// Park each request until a client approves it
    Manual,
}

impl FromStr for ApprovalMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(ApprovalMode::Auto),
            "manual" => Ok(ApprovalMode::Manual),
            other => Err(anyhow!("Unknown WALLET_APPROVAL_MODE '{}', expected auto or manual", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub port: u16,
    pub log_level: String,
    pub request_timeout: u64,
    pub solana: SolanaConfig,
    pub wallet: WalletConfig,
    pub workflow: WorkflowConfig,
    pub storage: StorageConfig,
    pub pools: PoolConfig,
}

#[derive(Debug, Clone)]
pub struct SolanaConfig {
    pub rpc_url: String,
    pub cluster: Cluster,
    pub commitment: String,
    pub skip_preflight: bool,
}

#[derive(Clone)]
pub struct WalletConfig {
    pub keypair_path: Option<String>,
    pub private_key: Option<String>,
    pub approval_mode: ApprovalMode,
    pub approval_timeout_secs: u64,
}

impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("keypair_path", &self.keypair_path)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("approval_mode", &self.approval_mode)
            .field("approval_timeout_secs", &self.approval_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub confirm_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Seconds a failed run's progress stays resumable
    pub ledger_ttl_secs: u64,
    pub compute_unit_price: u64,
    pub launch_min_balance: u64,
    pub fee_reserve: u64,
}

#[derive(Clone)]
pub struct StorageConfig {
    pub pinata_jwt: Option<String>,
    pub pinata_api_url: String,
    pub pinata_gateway_url: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("pinata_jwt", &self.pinata_jwt.as_ref().map(|_| "<redacted>"))
            .field("pinata_api_url", &self.pinata_api_url)
            .field("pinata_gateway_url", &self.pinata_gateway_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub raydium_api_url: String,
    pub cpmm_program_id: String,
    pub cpmm_fee_account: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| anyhow!("{} environment variable is required", key))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let parsed = |key: &str, default: &str| -> Result<u64> {
            or_default(key, default)
                .trim()
                .parse()
                .map_err(|e| anyhow!("Invalid {}: {}", key, e))
        };
        let flag = |key: &str| -> Result<bool> {
            or_default(key, "false")
                .trim()
                .parse()
                .map_err(|e| anyhow!("Invalid {}: {}", key, e))
        };

        let cluster: Cluster = or_default("SOLANA_CLUSTER", "devnet").parse()?;
        let (api_default, program_default, fee_default) = match cluster {
            Cluster::Devnet => (
                RAYDIUM_API_DEVNET,
                RAYDIUM_CPMM_PROGRAM_ID_DEVNET,
                RAYDIUM_CPMM_FEE_ACCOUNT_DEVNET,
            ),
            Cluster::Mainnet => (
                RAYDIUM_API_MAINNET,
                RAYDIUM_CPMM_PROGRAM_ID_MAINNET,
                RAYDIUM_CPMM_FEE_ACCOUNT_MAINNET,
            ),
        };

        let keypair_path = lookup("WALLET_KEYPAIR_PATH").filter(|v| !v.trim().is_empty());
        let private_key = lookup("WALLET_PRIVATE_KEY").filter(|v| !v.trim().is_empty());
        if keypair_path.is_none() && private_key.is_none() {
            return Err(anyhow!(
                "WALLET_KEYPAIR_PATH or WALLET_PRIVATE_KEY environment variable is required"
            ));
        }

        Ok(Config {
            environment: or_default("ENVIRONMENT", "development"),
            port: or_default("PORT", "8080")
                .trim()
                .parse()
                .map_err(|e| anyhow!("Invalid PORT: {}", e))?,
            log_level: or_default("LOG_LEVEL", "info"),
            request_timeout: parsed("REQUEST_TIMEOUT_SECS", "300")?,
            solana: SolanaConfig {
                rpc_url: required("SOLANA_RPC_URL")?,
                cluster,
                commitment: or_default("SOLANA_COMMITMENT", "confirmed"),
                skip_preflight: flag("SKIP_PREFLIGHT")?,
            },
            wallet: WalletConfig {
                keypair_path,
                private_key,
                approval_mode: or_default("WALLET_APPROVAL_MODE", "auto").parse()?,
                approval_timeout_secs: parsed("WALLET_APPROVAL_TIMEOUT_SECS", "120")?,
            },
            workflow: WorkflowConfig {
                confirm_timeout_secs: parsed("CONFIRM_TIMEOUT_SECS", "60")?,
                poll_interval_ms: parsed("CONFIRM_POLL_INTERVAL_MS", "1000")?,
                ledger_ttl_secs: parsed("LEDGER_TTL_SECS", "3600")?,
                compute_unit_price: parsed("COMPUTE_UNIT_PRICE_MICRO_LAMPORTS", "100000")?,
                launch_min_balance: parsed("LAUNCH_MIN_BALANCE_LAMPORTS", "50000000")?,
                fee_reserve: parsed("FEE_RESERVE_LAMPORTS", "10000")?,
            },
            storage: StorageConfig {
                pinata_jwt: lookup("PINATA_JWT").filter(|v| !v.trim().is_empty()),
                pinata_api_url: or_default("PINATA_API_URL", DEFAULT_PINATA_API_URL),
                pinata_gateway_url: or_default("PINATA_GATEWAY_URL", DEFAULT_PINATA_GATEWAY_URL),
            },
            pools: PoolConfig {
                raydium_api_url: or_default("RAYDIUM_API_URL", api_default),
                cpmm_program_id: or_default("RAYDIUM_CPMM_PROGRAM_ID", program_default),
                cpmm_fee_account: or_default("RAYDIUM_CPMM_FEE_ACCOUNT", fee_default),
            },
        })
    }

    /// Rejects settings that would make every workflow fail.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout == 0 {
            return Err(anyhow!("REQUEST_TIMEOUT_SECS must be greater than 0"));
        }
        if self.workflow.confirm_timeout_secs == 0 {
            return Err(anyhow!("CONFIRM_TIMEOUT_SECS must be greater than 0"));
        }
        if self.workflow.poll_interval_ms == 0 {
            return Err(anyhow!("CONFIRM_POLL_INTERVAL_MS must be greater than 0"));
        }
        if self.workflow.ledger_ttl_secs == 0 {
            return Err(anyhow!("LEDGER_TTL_SECS must be greater than 0"));
        }
        if self.wallet.approval_mode == ApprovalMode::Manual && self.wallet.approval_timeout_secs == 0 {
            return Err(anyhow!("WALLET_APPROVAL_TIMEOUT_SECS must be greater than 0"));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.workflow.confirm_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.workflow.poll_interval_ms)
    }

    pub fn ledger_ttl(&self) -> Duration {
        Duration::from_secs(self.workflow.ledger_ttl_secs)
    }
}
