use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Token-2022 program ID
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

/// Raydium CPMM program IDs and pool-creation fee receivers per cluster
pub const RAYDIUM_CPMM_PROGRAM_ID_MAINNET: &str = "CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C";
pub const RAYDIUM_CPMM_FEE_ACCOUNT_MAINNET: &str = "DNXgeM9EiiaAbaWvwjHj9fQQLAX5ZsfHyvmYUNRAdNC8";
pub const RAYDIUM_CPMM_PROGRAM_ID_DEVNET: &str = "CPMDWBwJDtYax9qW7AyRuVC19Cc4L4Vcy4n2BHAbHkCW";
pub const RAYDIUM_CPMM_FEE_ACCOUNT_DEVNET: &str = "G11FKBRaAkHAKuLCgLM6K6NCDqwh3xU9KSfAgYBA4X9q";

/// Raydium public API hosts
pub const RAYDIUM_API_MAINNET: &str = "https://api-v3.raydium.io";
pub const RAYDIUM_API_DEVNET: &str = "https://api-v3-devnet.raydium.io";

/// Compute unit limits per transaction shape
pub const CREATE_MINT_COMPUTE_UNITS: u32 = 500_000;
pub const DEFAULT_COMPUTE_UNITS: u32 = 200_000;
pub const CREATE_POOL_COMPUTE_UNITS: u32 = 400_000;

/// Program ID utilities
pub mod program_ids {
    use super::*;
    use anyhow::{anyhow, Result};

    pub fn token_2022_program_id() -> Pubkey {
        spl_token_2022::id()
    }

    pub fn parse_program_id(label: &str, value: &str) -> Result<Pubkey> {
        Pubkey::from_str(value).map_err(|e| anyhow!("Failed to parse {} program ID: {}", label, e))
    }
}
