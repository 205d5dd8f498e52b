//! Token launch: pin image and metadata, create the mint, then mint the initial supply

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signature::Signer};
use std::sync::Arc;

use super::{fingerprint, FeeThresholds};
use crate::services::blockchain::instructions::{
    TokenInstructions, CREATE_MINT_COMPUTE_UNITS, DEFAULT_COMPUTE_UNITS,
};
use crate::services::blockchain::AccountReader;
use crate::services::storage::FileUpload;
use crate::services::workflow::{
    validator, ClassifiedError, ContextKey, ContextUpdates, ContextValue, Feature, StepAction,
    StepDescriptor, StepEffect, StepEnv, TransactionPlan, UploadRequest, WorkflowContext,
    WorkflowDefinition,
};

pub const DEFAULT_DECIMALS: u8 = 9;

#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub name: String,
    pub symbol: String,
    pub description: Option<String>,
    pub decimals: Option<u8>,
    pub initial_supply: String,
    pub image: FileUpload,
}

#[derive(Debug, Clone)]
struct LaunchInputs {
    name: String,
    symbol: String,
    description: String,
    decimals: u8,
    supply: Decimal,
    image: FileUpload,
}

fn parse_inputs(request: &LaunchRequest) -> Result<LaunchInputs, ClassifiedError> {
    let name = validator::require_non_empty("Name", &request.name)?;
    let symbol = validator::normalize_symbol(&request.symbol)?;
    let supply = validator::parse_amount(&request.initial_supply)?;
    let decimals = request.decimals.unwrap_or(DEFAULT_DECIMALS);

    if request.image.bytes.is_empty() {
        return Err(ClassifiedError::invalid_input("Image is required"));
    }
    if !request.image.content_type.starts_with("image/") {
        return Err(ClassifiedError::invalid_input(format!(
            "Unsupported image type '{}'",
            request.image.content_type
        )));
    }

    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} ({}) token on Solana", name, symbol));

    Ok(LaunchInputs {
        name,
        symbol,
        description,
        decimals,
        supply,
        image: request.image.clone(),
    })
}

pub struct LaunchWorkflow {
    inputs: Result<LaunchInputs, ClassifiedError>,
    fingerprint: String,
    storage_configured: bool,
    thresholds: FeeThresholds,
    steps: Vec<Box<dyn StepDescriptor>>,
}

impl LaunchWorkflow {
    pub fn new(request: LaunchRequest, storage_configured: bool, thresholds: FeeThresholds) -> Self {
        let inputs = parse_inputs(&request);
        let decimals = request.decimals.unwrap_or(DEFAULT_DECIMALS);
        let fingerprint = fingerprint(&[
            request.name.trim().as_bytes(),
            request.symbol.trim().to_uppercase().as_bytes(),
            request.description.as_deref().unwrap_or("").as_bytes(),
            &[decimals],
            request.initial_supply.trim().as_bytes(),
            fingerprint(&[&request.image.bytes]).as_bytes(),
        ]);

        let steps: Vec<Box<dyn StepDescriptor>> = match &inputs {
            Ok(inputs) => vec![
                Box::new(UploadImage {
                    image: inputs.image.clone(),
                }),
                Box::new(UploadMetadata {
                    name: inputs.name.clone(),
                    symbol: inputs.symbol.clone(),
                    description: inputs.description.clone(),
                    image_type: inputs.image.content_type.clone(),
                }),
                Box::new(CreateMint {
                    name: inputs.name.clone(),
                    symbol: inputs.symbol.clone(),
                    decimals: inputs.decimals,
                }),
                Box::new(CreateAssociatedAccount),
                Box::new(MintInitialSupply),
            ],
            Err(_) => Vec::new(),
        };

        Self {
            inputs,
            fingerprint,
            storage_configured,
            thresholds,
            steps,
        }
    }
}

#[async_trait]
impl WorkflowDefinition for LaunchWorkflow {
    fn feature(&self) -> Feature {
        Feature::Launch
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }

    fn seed(&self) -> Result<ContextUpdates> {
        Ok(vec![(
            ContextKey::MINT_KEYPAIR,
            ContextValue::Signer(Arc::new(Keypair::new())),
        )])
    }

    async fn validate(&self, env: &StepEnv<'_>) -> Result<ContextUpdates> {
        let inputs = self.inputs.as_ref().map_err(Clone::clone)?;
        let amount = validator::to_base_units(inputs.supply, inputs.decimals)?;

        if !self.storage_configured {
            return Err(ClassifiedError::invalid_input("Metadata storage is not configured (Pinata JWT missing)").into());
        }

        validator::ensure_fee_balance(env.rpc, &env.payer, self.thresholds.launch_min_balance).await?;

        Ok(vec![
            (ContextKey::WALLET, ContextValue::Address(env.payer)),
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
            "metadata_uri": entry(ContextKey::METADATA_URI),
            "image_uri": entry(ContextKey::IMAGE_URI),
            "associated_account": entry(ContextKey::ASSOCIATED_ACCOUNT),
            "initial_supply": entry(ContextKey::MINTED_AMOUNT),
            "signature": last_signature,
        })
    }
}

struct UploadImage {
    image: FileUpload,
}

#[async_trait]
impl StepDescriptor for UploadImage {
    fn name(&self) -> &'static str {
        "upload_image"
    }

    fn outputs(&self) -> &'static [ContextKey] {
        &[ContextKey::IMAGE_URI]
    }

    fn build(&self, _context: &WorkflowContext, _payer: &Pubkey) -> Result<StepAction> {
        Ok(StepAction::Upload(UploadRequest::File(self.image.clone())))
    }

    fn on_confirmed(&self, _context: &WorkflowContext, effect: &StepEffect) -> Result<ContextUpdates> {
        Ok(vec![(ContextKey::IMAGE_URI, uploaded_uri(effect)?)])
    }
}

struct UploadMetadata {
    name: String,
    symbol: String,
    description: String,
    image_type: String,
}

impl UploadMetadata {
    fn document(&self, image_uri: &str) -> Value {
        json!({
            "name": self.name,
            "symbol": self.symbol,
            "description": self.description,
            "image": image_uri,
            "attributes": [],
            "properties": {
                "files": [{ "uri": image_uri, "type": self.image_type }],
                "category": "fungible"
            }
        })
    }
}

#[async_trait]
impl StepDescriptor for UploadMetadata {
    fn name(&self) -> &'static str {
        "upload_metadata"
    }

    fn outputs(&self) -> &'static [ContextKey] {
        &[ContextKey::METADATA_URI]
    }

    fn build(&self, context: &WorkflowContext, _payer: &Pubkey) -> Result<StepAction> {
        let image_uri = context.text(ContextKey::IMAGE_URI)?;
        Ok(StepAction::Upload(UploadRequest::Json {
            name: format!("{}-metadata.json", self.symbol.to_lowercase()),
            content: self.document(image_uri),
        }))
    }

    fn on_confirmed(&self, _context: &WorkflowContext, effect: &StepEffect) -> Result<ContextUpdates> {
        Ok(vec![(ContextKey::METADATA_URI, uploaded_uri(effect)?)])
    }
}

struct CreateMint {
    name: String,
    symbol: String,
    decimals: u8,
}

#[async_trait]
impl StepDescriptor for CreateMint {
    fn name(&self) -> &'static str {
        "create_mint"
    }

    fn description(&self) -> String {
        format!("Create {} mint with on-chain metadata", self.symbol)
    }

    fn outputs(&self) -> &'static [ContextKey] {
        &[ContextKey::MINT_ADDRESS]
    }

    async fn probe(&self, context: &WorkflowContext, env: &StepEnv<'_>) -> Result<Option<ContextUpdates>> {
        let mint = context.address(ContextKey::MINT_KEYPAIR)?;
        if AccountReader::account_exists(env.rpc, &mint).await? {
            return Ok(Some(vec![(ContextKey::MINT_ADDRESS, ContextValue::Address(mint))]));
        }
        Ok(None)
    }

    fn build(&self, context: &WorkflowContext, payer: &Pubkey) -> Result<StepAction> {
        let mint = context.signer(ContextKey::MINT_KEYPAIR)?;
        let metadata_uri = context.text(ContextKey::METADATA_URI)?;

        let instructions = TokenInstructions::build_create_mint_with_metadata(
            payer,
            &mint.pubkey(),
            self.decimals,
            &self.name,
            &self.symbol,
            metadata_uri,
        )?;

        Ok(StepAction::Transaction(
            TransactionPlan::new(instructions, CREATE_MINT_COMPUTE_UNITS).with_signer(mint),
        ))
    }

    fn on_confirmed(&self, context: &WorkflowContext, _effect: &StepEffect) -> Result<ContextUpdates> {
        let mint = context.address(ContextKey::MINT_KEYPAIR)?;
        Ok(vec![(ContextKey::MINT_ADDRESS, ContextValue::Address(mint))])
    }
}

struct CreateAssociatedAccount;

impl CreateAssociatedAccount {
    fn account(context: &WorkflowContext) -> Result<Pubkey> {
        let owner = context.address(ContextKey::WALLET)?;
        let mint = context.address(ContextKey::MINT_ADDRESS)?;
        Ok(TokenInstructions::associated_account(&owner, &mint))
    }
}

#[async_trait]
impl StepDescriptor for CreateAssociatedAccount {
    fn name(&self) -> &'static str {
        "create_associated_account"
    }

    fn outputs(&self) -> &'static [ContextKey] {
        &[ContextKey::ASSOCIATED_ACCOUNT]
    }

    async fn probe(&self, context: &WorkflowContext, env: &StepEnv<'_>) -> Result<Option<ContextUpdates>> {
        let account = Self::account(context)?;
        if AccountReader::account_exists(env.rpc, &account).await? {
            return Ok(Some(vec![(ContextKey::ASSOCIATED_ACCOUNT, ContextValue::Address(account))]));
        }
        Ok(None)
    }

    fn build(&self, context: &WorkflowContext, payer: &Pubkey) -> Result<StepAction> {
        let owner = context.address(ContextKey::WALLET)?;
        let mint = context.address(ContextKey::MINT_ADDRESS)?;
        let instruction = TokenInstructions::build_create_associated_account(payer, &owner, &mint);
        Ok(StepAction::Transaction(TransactionPlan::new(
            vec![instruction],
            DEFAULT_COMPUTE_UNITS,
        )))
    }

    fn on_confirmed(&self, context: &WorkflowContext, _effect: &StepEffect) -> Result<ContextUpdates> {
        Ok(vec![(
            ContextKey::ASSOCIATED_ACCOUNT,
            ContextValue::Address(Self::account(context)?),
        )])
    }
}

struct MintInitialSupply;

#[async_trait]
impl StepDescriptor for MintInitialSupply {
    fn name(&self) -> &'static str {
        "mint_initial_supply"
    }

    fn outputs(&self) -> &'static [ContextKey] {
        &[ContextKey::MINTED_AMOUNT]
    }

    async fn probe(&self, context: &WorkflowContext, env: &StepEnv<'_>) -> Result<Option<ContextUpdates>> {
        let account = context.address(ContextKey::ASSOCIATED_ACCOUNT)?;
        let amount = context.amount(ContextKey::AMOUNT)?;
        match AccountReader::token_balance(env.rpc, &account).await? {
            Some(balance) if balance >= amount => {
                Ok(Some(vec![(ContextKey::MINTED_AMOUNT, ContextValue::Amount(amount))]))
            }
            _ => Ok(None),
        }
    }

    fn build(&self, context: &WorkflowContext, payer: &Pubkey) -> Result<StepAction> {
        let mint = context.address(ContextKey::MINT_ADDRESS)?;
        let account = context.address(ContextKey::ASSOCIATED_ACCOUNT)?;
        let amount = context.amount(ContextKey::AMOUNT)?;

        let instruction = TokenInstructions::build_mint_to(&mint, &account, payer, amount)?;
        Ok(StepAction::Transaction(TransactionPlan::new(
            vec![instruction],
            DEFAULT_COMPUTE_UNITS,
        )))
    }

    fn on_confirmed(&self, context: &WorkflowContext, _effect: &StepEffect) -> Result<ContextUpdates> {
        Ok(vec![(
            ContextKey::MINTED_AMOUNT,
            ContextValue::Amount(context.amount(ContextKey::AMOUNT)?),
        )])
    }
}

fn uploaded_uri(effect: &StepEffect) -> Result<ContextValue> {
    match effect {
        StepEffect::Uploaded { uri } => Ok(ContextValue::Text(uri.clone())),
        StepEffect::Confirmed { .. } => Err(anyhow::anyhow!("Upload step finished without a URI")),
    }
}
