pub mod constants;
pub mod pool;
pub mod tokens;

use anyhow::{anyhow, Result};
use solana_sdk::{compute_budget::ComputeBudgetInstruction, instruction::Instruction};

pub use constants::*;
pub use pool::{CreatePoolParams, PoolAddresses, PoolInstructions, PoolSide};
pub use tokens::{MintLayout, TokenInstructions};

/// Compute budget prefix applied to every workflow transaction
pub fn compute_budget_instructions(unit_limit: u32, micro_lamports_per_unit: u64) -> Vec<Instruction> {
    let mut instructions = vec![ComputeBudgetInstruction::set_compute_unit_limit(unit_limit)];
    if micro_lamports_per_unit > 0 {
        instructions.push(ComputeBudgetInstruction::set_compute_unit_price(micro_lamports_per_unit));
    }
    instructions
}

/// Rejects instruction lists that would produce an empty or malformed transaction.
pub fn validate_instructions(instructions: &[Instruction]) -> Result<()> {
    if instructions.is_empty() {
        return Err(anyhow!("Transaction cannot be empty"));
    }

    for (i, instruction) in instructions.iter().enumerate() {
        if instruction.data.is_empty() && instruction.accounts.is_empty() {
            return Err(anyhow!("Instruction {} cannot be empty", i));
        }
    }

    Ok(())
}
