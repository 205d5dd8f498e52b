//! Mint additional supply of an existing Token-2022 mint

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;

use super::{fingerprint, FeeThresholds};
use crate::services::blockchain::instructions::{TokenInstructions, DEFAULT_COMPUTE_UNITS};
use crate::services::workflow::{
    validator, ClassifiedError, ContextKey, ContextUpdates, ContextValue, Feature, StepAction,
    StepDescriptor, StepEffect, StepEnv, TransactionPlan, WorkflowContext, WorkflowDefinition,
};

#[derive(Debug, Clone)]
pub struct MintRequest {
    pub mint_address: String,
    pub amount: String,
}

#[derive(Debug, Clone, Copy)]
struct MintInputs {
    mint: Pubkey,
    amount: Decimal,
}

fn parse_inputs(request: &MintRequest) -> Result<MintInputs, ClassifiedError> {
    Ok(MintInputs {
        mint: validator::parse_address("mint address", &request.mint_address)?,
        amount: validator::parse_amount(&request.amount)?,
    })
}

pub struct MintWorkflow {
    inputs: Result<MintInputs, ClassifiedError>,
    fingerprint: String,
    thresholds: FeeThresholds,
    steps: Vec<Box<dyn StepDescriptor>>,
}

impl MintWorkflow {
    pub fn new(request: MintRequest, thresholds: FeeThresholds) -> Self {
        Self {
            inputs: parse_inputs(&request),
            fingerprint: fingerprint(&[
                request.mint_address.trim().as_bytes(),
                request.amount.trim().as_bytes(),
            ]),
            thresholds,
            steps: vec![Box::new(MintTokens)],
        }
    }
}

#[async_trait]
impl WorkflowDefinition for MintWorkflow {
    fn feature(&self) -> Feature {
        Feature::Mint
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }

    async fn validate(&self, env: &StepEnv<'_>) -> Result<ContextUpdates> {
        let inputs = *self.inputs.as_ref().map_err(Clone::clone)?;

        let mint = validator::require_mint(env.rpc, &inputs.mint).await?;
        validator::ensure_token_2022(&mint)?;
        validator::ensure_mint_authority(&mint, &env.payer)?;
        let amount = validator::to_base_units(inputs.amount, mint.decimals)?;
        validator::ensure_fee_balance(env.rpc, &env.payer, self.thresholds.fee_reserve).await?;

        Ok(vec![
            (ContextKey::WALLET, ContextValue::Address(env.payer)),
            (ContextKey::MINT_ADDRESS, ContextValue::Address(inputs.mint)),
            (ContextKey::DECIMALS, ContextValue::Amount(u64::from(mint.decimals))),
            (ContextKey::AMOUNT, ContextValue::Amount(amount)),
        ])
    }

    fn steps(&self) -> &[Box<dyn StepDescriptor>] {
        &self.steps
    }

    fn result(&self, context: &WorkflowContext, last_signature: Option<&str>) -> Value {
        let entry = |key: ContextKey| context.get(key).map(|value| value.to_json()).unwrap_or(Value::Null);
        json!({
            "mint_address": entry(ContextKey::MINT_ADDRESS),
            "associated_account": entry(ContextKey::ASSOCIATED_ACCOUNT),
            "amount": entry(ContextKey::MINTED_AMOUNT),
            "signature": last_signature,
        })
    }
}

/// Creates the wallet's associated account when missing, then mints into it.
struct MintTokens;

#[async_trait]
impl StepDescriptor for MintTokens {
    fn name(&self) -> &'static str {
        "mint_tokens"
    }

    fn outputs(&self) -> &'static [ContextKey] {
        &[ContextKey::MINTED_AMOUNT]
    }

    fn build(&self, context: &WorkflowContext, payer: &Pubkey) -> Result<StepAction> {
        let mint = context.address(ContextKey::MINT_ADDRESS)?;
        let owner = context.address(ContextKey::WALLET)?;
        let amount = context.amount(ContextKey::AMOUNT)?;
        let destination = TokenInstructions::associated_account(&owner, &mint);

        let instructions = vec![
            TokenInstructions::build_create_associated_account_idempotent(payer, &owner, &mint),
            TokenInstructions::build_mint_to(&mint, &destination, payer, amount)?,
        ];
        Ok(StepAction::Transaction(TransactionPlan::new(instructions, DEFAULT_COMPUTE_UNITS)))
    }

    fn on_confirmed(&self, context: &WorkflowContext, _effect: &StepEffect) -> Result<ContextUpdates> {
        let mint = context.address(ContextKey::MINT_ADDRESS)?;
        let owner = context.address(ContextKey::WALLET)?;
        Ok(vec![
            (
                ContextKey::ASSOCIATED_ACCOUNT,
                ContextValue::Address(TokenInstructions::associated_account(&owner, &mint)),
            ),
            (
                ContextKey::MINTED_AMOUNT,
                ContextValue::Amount(context.amount(ContextKey::AMOUNT)?),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::workflow::ErrorKind;

    #[test]
    fn test_rejects_malformed_mint_address() {
        let workflow = MintWorkflow::new(
            MintRequest {
                mint_address: "nope".to_string(),
                amount: "5".to_string(),
            },
            FeeThresholds::default(),
        );
        let err = workflow.inputs.as_ref().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.message, "Invalid mint address format");
    }

    #[test]
    fn test_build_is_deterministic() {
        let payer = Pubkey::new_unique();
        let mut context = WorkflowContext::new();
        context.insert(ContextKey::MINT_ADDRESS, ContextValue::Address(Pubkey::new_unique())).unwrap();
        context.insert(ContextKey::WALLET, ContextValue::Address(payer)).unwrap();
        context.insert(ContextKey::AMOUNT, ContextValue::Amount(1_000)).unwrap();

        let first = MintTokens.build(&context, &payer).unwrap();
        let second = MintTokens.build(&context, &payer).unwrap();
        match (first, second) {
            (StepAction::Transaction(a), StepAction::Transaction(b)) => {
                assert_eq!(a.instructions, b.instructions);
                assert_eq!(a.instructions.len(), 2);
                assert!(a.signers.is_empty());
            }
            _ => panic!("expected transaction plans"),
        }
    }
}
