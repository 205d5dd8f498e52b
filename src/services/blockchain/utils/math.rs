use anyhow::{anyhow, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Largest mint precision the gateway converts amounts for.
pub const MAX_DECIMALS: u8 = 18;

pub struct TokenMath;

impl TokenMath {
    /// Parses a user-entered token amount. Only strictly positive values are accepted.
    pub fn parse_ui_amount(raw: &str) -> Result<Decimal> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("Amount is required"));
        }
        let amount = Decimal::from_str(trimmed)
            .map_err(|e| anyhow!("Invalid amount '{}': {}", trimmed, e))?;
        if amount <= Decimal::ZERO {
            return Err(anyhow!("Amount must be greater than 0"));
        }
        Ok(amount)
    }

    /// Scales a UI amount to base units, truncating digits beyond `decimals`.
    pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<u64> {
        if decimals > MAX_DECIMALS {
            return Err(anyhow!("Unsupported mint precision: {} decimals", decimals));
        }
        let scale = Decimal::from_i128_with_scale(10i128.pow(decimals as u32), 0);
        let scaled = amount
            .checked_mul(scale)
            .ok_or_else(|| anyhow!("Amount {} overflows with {} decimals", amount, decimals))?
            .trunc();
        scaled
            .to_u64()
            .ok_or_else(|| anyhow!("Amount {} does not fit in a token balance", amount))
    }

    pub fn from_base_units(raw: u64, decimals: u8) -> Decimal {
        Decimal::try_from_i128_with_scale(raw as i128, decimals as u32)
            .unwrap_or_default()
            .normalize()
    }

    pub fn lamports_to_sol(lamports: u64) -> f64 {
        lamports as f64 / LAMPORTS_PER_SOL as f64
    }
}
