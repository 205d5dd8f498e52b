//! Point an existing token's on-chain metadata at a new URI

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use solana_sdk::{pubkey::Pubkey, system_instruction};

use super::{fingerprint, FeeThresholds};
use crate::services::blockchain::instructions::{TokenInstructions, DEFAULT_COMPUTE_UNITS};
use crate::services::blockchain::AccountReader;
use crate::services::workflow::{
    validator, ClassifiedError, ContextKey, ContextUpdates, ContextValue, Feature, StepAction,
    StepDescriptor, StepEffect, StepEnv, TransactionPlan, WorkflowContext, WorkflowDefinition,
};

#[derive(Debug, Clone)]
pub struct UpdateMetadataRequest {
    pub mint_address: String,
    pub metadata_uri: String,
}

#[derive(Debug, Clone)]
struct MetadataInputs {
    mint: Pubkey,
    uri: String,
}

fn parse_inputs(request: &UpdateMetadataRequest) -> Result<MetadataInputs, ClassifiedError> {
    Ok(MetadataInputs {
        mint: validator::parse_address("mint address", &request.mint_address)?,
        uri: validator::validate_uri(&request.metadata_uri)?,
    })
}

pub struct UpdateMetadataWorkflow {
    inputs: Result<MetadataInputs, ClassifiedError>,
    fingerprint: String,
    thresholds: FeeThresholds,
    steps: Vec<Box<dyn StepDescriptor>>,
}

impl UpdateMetadataWorkflow {
    pub fn new(request: UpdateMetadataRequest, thresholds: FeeThresholds) -> Self {
        Self {
            inputs: parse_inputs(&request),
            fingerprint: fingerprint(&[
                request.mint_address.trim().as_bytes(),
                request.metadata_uri.trim().as_bytes(),
            ]),
            thresholds,
            steps: vec![Box::new(UpdateUri)],
        }
    }
}

#[async_trait]
impl WorkflowDefinition for UpdateMetadataWorkflow {
    fn feature(&self) -> Feature {
        Feature::UpdateMetadata
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }

    async fn validate(&self, env: &StepEnv<'_>) -> Result<ContextUpdates> {
        let inputs = self.inputs.as_ref().map_err(Clone::clone)?;

        let mint = validator::require_mint(env.rpc, &inputs.mint).await?;
        validator::ensure_token_2022(&mint)?;
        validator::ensure_update_authority(&mint, &env.payer)?;

        let top_up = match &mint.metadata {
            Some(metadata) => {
                TokenInstructions::metadata_rent_top_up(metadata, &inputs.uri, mint.data_len, mint.lamports)?
            }
            None => 0,
        };
        validator::ensure_fee_balance(env.rpc, &env.payer, self.thresholds.fee_reserve + top_up).await?;

        Ok(vec![
            (ContextKey::WALLET, ContextValue::Address(env.payer)),
            (ContextKey::MINT_ADDRESS, ContextValue::Address(inputs.mint)),
            (ContextKey::METADATA_URI, ContextValue::Text(inputs.uri.clone())),
            (ContextKey::RENT_TOP_UP, ContextValue::Amount(top_up)),
        ])
    }

    fn steps(&self) -> &[Box<dyn StepDescriptor>] {
        &self.steps
    }

    fn result(&self, context: &WorkflowContext, last_signature: Option<&str>) -> Value {
        let entry = |key: ContextKey| context.get(key).map(|value| value.to_json()).unwrap_or(Value::Null);
        json!({
            "mint_address": entry(ContextKey::MINT_ADDRESS),
            "metadata_uri": entry(ContextKey::UPDATED_URI),
            "signature": last_signature,
        })
    }
}

struct UpdateUri;

#[async_trait]
impl StepDescriptor for UpdateUri {
    fn name(&self) -> &'static str {
        "update_uri"
    }

    fn outputs(&self) -> &'static [ContextKey] {
        &[ContextKey::UPDATED_URI]
    }

    async fn probe(&self, context: &WorkflowContext, env: &StepEnv<'_>) -> Result<Option<ContextUpdates>> {
        let mint = context.address(ContextKey::MINT_ADDRESS)?;
        let uri = context.text(ContextKey::METADATA_URI)?;

        let current = AccountReader::fetch_mint(env.rpc, &mint)
            .await?
            .and_then(|info| info.metadata)
            .map(|metadata| metadata.uri);
        if current.as_deref() == Some(uri) {
            return Ok(Some(vec![(ContextKey::UPDATED_URI, ContextValue::Text(uri.to_string()))]));
        }
        Ok(None)
    }

    fn build(&self, context: &WorkflowContext, payer: &Pubkey) -> Result<StepAction> {
        let mint = context.address(ContextKey::MINT_ADDRESS)?;
        let uri = context.text(ContextKey::METADATA_URI)?;
        let top_up = context.amount(ContextKey::RENT_TOP_UP)?;

        let mut instructions = Vec::with_capacity(2);
        if top_up > 0 {
            instructions.push(system_instruction::transfer(payer, &mint, top_up));
        }
        // metadata lives in the mint account itself
        instructions.push(TokenInstructions::build_update_uri(&mint, payer, uri));

        Ok(StepAction::Transaction(TransactionPlan::new(instructions, DEFAULT_COMPUTE_UNITS)))
    }

    fn on_confirmed(&self, context: &WorkflowContext, _effect: &StepEffect) -> Result<ContextUpdates> {
        let uri = context.text(ContextKey::METADATA_URI)?;
        Ok(vec![(ContextKey::UPDATED_URI, ContextValue::Text(uri.to_string()))])
    }
}
