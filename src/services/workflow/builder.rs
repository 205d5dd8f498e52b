use anyhow::{anyhow, Result};
use solana_sdk::{
    hash::Hash, instruction::Instruction, message::Message, pubkey::Pubkey, signature::Keypair,
    transaction::Transaction,
};
use std::sync::Arc;

use crate::services::blockchain::instructions::{compute_budget_instructions, validate_instructions};

/// Instructions for one step, plus any generated keys that must co-sign.
#[derive(Debug, Clone)]
pub struct TransactionPlan {
    pub instructions: Vec<Instruction>,
    pub signers: Vec<Arc<Keypair>>,
    pub compute_unit_limit: u32,
}

impl TransactionPlan {
    pub fn new(instructions: Vec<Instruction>, compute_unit_limit: u32) -> Self {
        Self {
            instructions,
            signers: Vec::new(),
            compute_unit_limit,
        }
    }

    pub fn with_signer(mut self, signer: Arc<Keypair>) -> Self {
        self.signers.push(signer);
        self
    }
}

/// Turns a plan into an unsigned transaction bound to a fresh blockhash
#[derive(Debug, Clone, Copy)]
pub struct StepBuilder {
    compute_unit_price: u64,
}

impl StepBuilder {
    pub fn new(compute_unit_price: u64) -> Self {
        Self { compute_unit_price }
    }

    pub fn assemble(&self, plan: &TransactionPlan, fee_payer: &Pubkey, blockhash: Hash) -> Result<Transaction> {
        validate_instructions(&plan.instructions)?;

        let mut instructions = compute_budget_instructions(plan.compute_unit_limit, self.compute_unit_price);
        instructions.extend(plan.instructions.iter().cloned());

        let message = Message::new(&instructions, Some(fee_payer));
        let mut transaction = Transaction::new_unsigned(message);
        transaction.message.recent_blockhash = blockhash;

        if !plan.signers.is_empty() {
            let signers: Vec<&Keypair> = plan.signers.iter().map(|signer| signer.as_ref()).collect();
            transaction
                .try_partial_sign(&signers, blockhash)
                .map_err(|e| anyhow!("Failed to co-sign transaction: {}", e))?;
        }

        Ok(transaction)
    }
}
