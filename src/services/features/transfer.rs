//! Transfer Token-2022 tokens from the connected wallet to a recipient

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;

use super::{fingerprint, FeeThresholds};
use crate::services::blockchain::instructions::{TokenInstructions, DEFAULT_COMPUTE_UNITS};
use crate::services::blockchain::AccountReader;
use crate::services::workflow::{
    validator, ClassifiedError, ContextKey, ContextUpdates, ContextValue, Feature, StepAction,
    StepDescriptor, StepEffect, StepEnv, TransactionPlan, WorkflowContext, WorkflowDefinition,
};

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub mint_address: String,
    pub recipient: String,
    pub amount: String,
}

#[derive(Debug, Clone, Copy)]
struct TransferInputs {
    mint: Pubkey,
    recipient: Pubkey,
    amount: Decimal,
}

fn parse_inputs(request: &TransferRequest) -> Result<TransferInputs, ClassifiedError> {
    Ok(TransferInputs {
        mint: validator::parse_address("mint address", &request.mint_address)?,
        recipient: validator::parse_address("recipient address", &request.recipient)?,
        amount: validator::parse_amount(&request.amount)?,
    })
}

pub struct TransferWorkflow {
    inputs: Result<TransferInputs, ClassifiedError>,
    fingerprint: String,
    thresholds: FeeThresholds,
    steps: Vec<Box<dyn StepDescriptor>>,
}

impl TransferWorkflow {
    pub fn new(request: TransferRequest, thresholds: FeeThresholds) -> Self {
        Self {
            inputs: parse_inputs(&request),
            fingerprint: fingerprint(&[
                request.mint_address.trim().as_bytes(),
                request.recipient.trim().as_bytes(),
                request.amount.trim().as_bytes(),
            ]),
            thresholds,
            steps: vec![Box::new(TransferTokens)],
        }
    }
}

#[async_trait]
impl WorkflowDefinition for TransferWorkflow {
    fn feature(&self) -> Feature {
        Feature::Transfer
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }

    async fn validate(&self, env: &StepEnv<'_>) -> Result<ContextUpdates> {
        let inputs = *self.inputs.as_ref().map_err(Clone::clone)?;

        let mint = validator::require_mint(env.rpc, &inputs.mint).await?;
        validator::ensure_token_2022(&mint)?;
        let amount = validator::to_base_units(inputs.amount, mint.decimals)?;

        let source = TokenInstructions::associated_account(&env.payer, &inputs.mint);
        let available = AccountReader::token_balance(env.rpc, &source).await?.unwrap_or(0);
        validator::ensure_within_balance(amount, available)?;
        validator::ensure_fee_balance(env.rpc, &env.payer, self.thresholds.fee_reserve).await?;

        Ok(vec![
            (ContextKey::WALLET, ContextValue::Address(env.payer)),
            (ContextKey::MINT_ADDRESS, ContextValue::Address(inputs.mint)),
            (ContextKey::RECIPIENT, ContextValue::Address(inputs.recipient)),
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
            "recipient": entry(ContextKey::RECIPIENT),
            "recipient_account": entry(ContextKey::RECIPIENT_ACCOUNT),
            "amount": entry(ContextKey::TRANSFERRED_AMOUNT),
            "signature": last_signature,
        })
    }
}

struct TransferTokens;

impl TransferTokens {
    fn recipient_account(context: &WorkflowContext) -> Result<Pubkey> {
        let mint = context.address(ContextKey::MINT_ADDRESS)?;
        let recipient = context.address(ContextKey::RECIPIENT)?;
        Ok(TokenInstructions::associated_account(&recipient, &mint))
    }
}

#[async_trait]
impl StepDescriptor for TransferTokens {
    fn name(&self) -> &'static str {
        "transfer_tokens"
    }

    fn outputs(&self) -> &'static [ContextKey] {
        &[ContextKey::TRANSFERRED_AMOUNT]
    }

    fn build(&self, context: &WorkflowContext, payer: &Pubkey) -> Result<StepAction> {
        let mint = context.address(ContextKey::MINT_ADDRESS)?;
        let owner = context.address(ContextKey::WALLET)?;
        let recipient = context.address(ContextKey::RECIPIENT)?;
        let amount = context.amount(ContextKey::AMOUNT)?;
        let decimals = u8::try_from(context.amount(ContextKey::DECIMALS)?)?;

        let source = TokenInstructions::associated_account(&owner, &mint);
        let destination = Self::recipient_account(context)?;

        let instructions = vec![
            TokenInstructions::build_create_associated_account_idempotent(payer, &recipient, &mint),
            TokenInstructions::build_transfer_checked(&source, &mint, &destination, &owner, amount, decimals)?,
        ];
        Ok(StepAction::Transaction(TransactionPlan::new(instructions, DEFAULT_COMPUTE_UNITS)))
    }

    fn on_confirmed(&self, context: &WorkflowContext, _effect: &StepEffect) -> Result<ContextUpdates> {
        Ok(vec![
            (
                ContextKey::RECIPIENT_ACCOUNT,
                ContextValue::Address(Self::recipient_account(context)?),
            ),
            (
                ContextKey::TRANSFERRED_AMOUNT,
                ContextValue::Amount(context.amount(ContextKey::AMOUNT)?),
            ),
        ])
    }
}
