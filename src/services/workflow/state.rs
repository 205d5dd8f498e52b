//! Workflow state machine and the write-once context carried between steps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::classifier::ClassifiedError;

/// User-facing capabilities, each driven as its own workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Launch,
    Mint,
    Transfer,
    UpdateMetadata,
    CreatePool,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Launch => "launch",
            Self::Mint => "mint",
            Self::Transfer => "transfer",
            Self::UpdateMetadata => "update_metadata",
            Self::CreatePool => "create_pool",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Idle,
    Validating,
    Building,
    AwaitingSignature,
    Broadcasting,
    Confirming,
    Succeeded,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        use WorkflowStatus::*;

        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }

        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Building)
                // Skipped step, or uploads which need no signature
                | (Building, Building)
                | (Building, Broadcasting)
                | (Building, AwaitingSignature)
                | (Building, Succeeded)
                | (AwaitingSignature, Broadcasting)
                | (Broadcasting, Confirming)
                // Single rebuild after an expired blockhash
                | (Broadcasting, Building)
                | (Confirming, Building)
                | (Confirming, Succeeded)
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Building => "building",
            Self::AwaitingSignature => "awaiting_signature",
            Self::Broadcasting => "broadcasting",
            Self::Confirming => "confirming",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Name of a value passed between steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey(pub &'static str);

impl ContextKey {
    // derived during validation
    pub const WALLET: ContextKey = ContextKey("wallet");
    pub const DECIMALS: ContextKey = ContextKey("decimals");
    pub const AMOUNT: ContextKey = ContextKey("amount");
    pub const RENT_TOP_UP: ContextKey = ContextKey("rent_top_up");
    pub const RECIPIENT: ContextKey = ContextKey("recipient");
    pub const AMM_CONFIG: ContextKey = ContextKey("amm_config");
    pub const BASE_MINT: ContextKey = ContextKey("base_mint");
    pub const QUOTE_MINT: ContextKey = ContextKey("quote_mint");
    pub const BASE_TOKEN_PROGRAM: ContextKey = ContextKey("base_token_program");
    pub const QUOTE_TOKEN_PROGRAM: ContextKey = ContextKey("quote_token_program");
    pub const BASE_AMOUNT: ContextKey = ContextKey("base_amount");
    pub const QUOTE_AMOUNT: ContextKey = ContextKey("quote_amount");
    pub const WRAP_LAMPORTS: ContextKey = ContextKey("wrap_lamports");

    // produced by steps
    pub const MINT_KEYPAIR: ContextKey = ContextKey("mint_keypair");
    pub const MINT_ADDRESS: ContextKey = ContextKey("mint_address");
    pub const IMAGE_URI: ContextKey = ContextKey("image_uri");
    pub const METADATA_URI: ContextKey = ContextKey("metadata_uri");
    pub const ASSOCIATED_ACCOUNT: ContextKey = ContextKey("associated_account");
    pub const MINTED_AMOUNT: ContextKey = ContextKey("minted_amount");
    pub const RECIPIENT_ACCOUNT: ContextKey = ContextKey("recipient_account");
    pub const TRANSFERRED_AMOUNT: ContextKey = ContextKey("transferred_amount");
    pub const UPDATED_URI: ContextKey = ContextKey("updated_uri");
    pub const POOL_ID: ContextKey = ContextKey("pool_id");
    pub const LP_MINT: ContextKey = ContextKey("lp_mint");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone)]
pub enum ContextValue {
    Address(Pubkey),
    /// Generated keypair that must co-sign a later step
    Signer(Arc<Keypair>),
    Text(String),
    Signature(Signature),
    Amount(u64),
}

impl PartialEq for ContextValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Address(a), Self::Address(b)) => a == b,
            (Self::Signer(a), Self::Signer(b)) => a.pubkey() == b.pubkey(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Signature(a), Self::Signature(b)) => a == b,
            (Self::Amount(a), Self::Amount(b)) => a == b,
            _ => false,
        }
    }
}

impl ContextValue {
    pub fn as_address(&self) -> Option<Pubkey> {
        match self {
            Self::Address(pubkey) => Some(*pubkey),
            Self::Signer(keypair) => Some(keypair.pubkey()),
            _ => None,
        }
    }

    /// Public rendering; secret key material is never exposed.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Address(pubkey) => Value::String(pubkey.to_string()),
            Self::Signer(keypair) => Value::String(keypair.pubkey().to_string()),
            Self::Text(text) => Value::String(text.clone()),
            Self::Signature(signature) => Value::String(signature.to_string()),
            Self::Amount(amount) => Value::String(amount.to_string()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Context entry '{0}' is already set to a different value")]
    Conflict(&'static str),

    #[error("Context entry '{0}' is missing")]
    Missing(&'static str),

    #[error("Context entry '{0}' has an unexpected type")]
    WrongType(&'static str),
}

pub type ContextUpdates = Vec<(ContextKey, ContextValue)>;

/// Values carried across steps, in two layers. Inputs come from seeding and
/// validation and are replaced whenever a run re-derives them. Outputs are
/// written by completed steps and each key is written at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowContext {
    inputs: BTreeMap<ContextKey, ContextValue>,
    entries: BTreeMap<ContextKey, ContextValue>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input(&mut self, key: ContextKey, value: ContextValue) {
        self.inputs.insert(key, value);
    }

    pub fn set_inputs(&mut self, updates: ContextUpdates) {
        for (key, value) in updates {
            self.set_input(key, value);
        }
    }

    /// Writing the same output again is a no-op; a different value is rejected.
    pub fn insert(&mut self, key: ContextKey, value: ContextValue) -> Result<(), ContextError> {
        match self.entries.get(&key) {
            Some(existing) if *existing == value => Ok(()),
            Some(_) => Err(ContextError::Conflict(key.0)),
            None => {
                self.entries.insert(key, value);
                Ok(())
            }
        }
    }

    pub fn merge(&mut self, updates: ContextUpdates) -> Result<(), ContextError> {
        // validate all before writing any, so a conflict leaves the context untouched
        for (key, value) in &updates {
            if let Some(existing) = self.entries.get(key) {
                if existing != value {
                    return Err(ContextError::Conflict(key.0));
                }
            }
        }
        for (key, value) in updates {
            self.entries.entry(key).or_insert(value);
        }
        Ok(())
    }

    /// Step outputs shadow inputs of the same name.
    pub fn get(&self, key: ContextKey) -> Option<&ContextValue> {
        self.entries.get(&key).or_else(|| self.inputs.get(&key))
    }

    pub fn contains(&self, key: ContextKey) -> bool {
        self.get(key).is_some()
    }

    pub fn has_output(&self, key: ContextKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// True when no step has produced anything yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = ContextKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn address(&self, key: ContextKey) -> Result<Pubkey, ContextError> {
        self.get(key)
            .ok_or(ContextError::Missing(key.0))?
            .as_address()
            .ok_or(ContextError::WrongType(key.0))
    }

    pub fn signer(&self, key: ContextKey) -> Result<Arc<Keypair>, ContextError> {
        match self.get(key) {
            Some(ContextValue::Signer(keypair)) => Ok(keypair.clone()),
            Some(_) => Err(ContextError::WrongType(key.0)),
            None => Err(ContextError::Missing(key.0)),
        }
    }

    pub fn text(&self, key: ContextKey) -> Result<&str, ContextError> {
        match self.get(key) {
            Some(ContextValue::Text(text)) => Ok(text),
            Some(_) => Err(ContextError::WrongType(key.0)),
            None => Err(ContextError::Missing(key.0)),
        }
    }

    pub fn amount(&self, key: ContextKey) -> Result<u64, ContextError> {
        match self.get(key) {
            Some(ContextValue::Amount(amount)) => Ok(*amount),
            Some(_) => Err(ContextError::WrongType(key.0)),
            None => Err(ContextError::Missing(key.0)),
        }
    }

    /// Step outputs only
    pub fn to_json(&self) -> Map<String, Value> {
        render(&self.entries)
    }

    pub fn inputs_json(&self) -> Map<String, Value> {
        render(&self.inputs)
    }
}

fn render(entries: &BTreeMap<ContextKey, ContextValue>) -> Map<String, Value> {
    entries
        .iter()
        .map(|(key, value)| (key.0.to_string(), value.to_json()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Effect already present; nothing was sent
    Skipped,
    Uploaded,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub outcome: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Progress of one user-initiated action
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub workflow_id: Uuid,
    pub feature: Feature,
    /// Zero-based index of the current step
    pub step: usize,
    pub step_name: Option<String>,
    pub total_steps: usize,
    pub status: WorkflowStatus,
    pub context: WorkflowContext,
    pub last_error: Option<ClassifiedError>,
    pub result: Option<Value>,
    pub history: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(feature: Feature, total_steps: usize) -> Self {
        Self {
            workflow_id: Uuid::new_v4(),
            feature,
            step: 0,
            step_name: None,
            total_steps,
            status: WorkflowStatus::Idle,
            context: WorkflowContext::new(),
            last_error: None,
            result: None,
            history: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Moves to `next`, refusing transitions the state machine does not allow.
    pub fn transition(&mut self, next: WorkflowStatus) -> anyhow::Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(anyhow::anyhow!(
                "Illegal workflow transition {} -> {}",
                self.status,
                next
            ));
        }

        debug!(
            workflow_id = %self.workflow_id,
            feature = %self.feature,
            step = self.step,
            step_name = self.step_name.as_deref().unwrap_or("-"),
            from = %self.status,
            to = %next,
            "workflow transition"
        );
        self.status = next;
        Ok(())
    }

    pub fn enter_step(&mut self, index: usize, name: &str) {
        // steps only move forward
        self.step = self.step.max(index);
        self.step_name = Some(name.to_string());
    }

    pub fn record(&mut self, outcome: StepOutcome, signature: Option<String>, uri: Option<String>) {
        self.history.push(StepRecord {
            name: self.step_name.clone().unwrap_or_default(),
            outcome,
            signature,
            uri,
        });
    }

    /// Terminal failure. Ignored once the workflow already ended.
    pub fn fail(&mut self, error: ClassifiedError) {
        if self.status.is_terminal() {
            return;
        }
        warn!(
            workflow_id = %self.workflow_id,
            feature = %self.feature,
            step = self.step,
            step_name = self.step_name.as_deref().unwrap_or("-"),
            kind = %error.kind,
            retryable = error.retryable,
            "workflow failed: {}",
            error.message
        );
        self.status = WorkflowStatus::Failed;
        self.last_error = Some(error);
    }

    pub fn succeed(&mut self, result: Value) -> anyhow::Result<()> {
        self.transition(WorkflowStatus::Succeeded)?;
        self.last_error = None;
        self.result = Some(result);
        Ok(())
    }

    pub fn last_signature(&self) -> Option<&str> {
        self.history.iter().rev().find_map(|record| record.signature.as_deref())
    }

    pub fn report(&self) -> WorkflowReport {
        WorkflowReport {
            workflow_id: self.workflow_id,
            feature: self.feature,
            status: self.status,
            step: self.step,
            step_name: self.step_name.clone(),
            total_steps: self.total_steps,
            steps: self.history.clone(),
            context: self.context.to_json(),
            inputs: self.context.inputs_json(),
            result: self.result.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Serializable snapshot returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub workflow_id: Uuid,
    pub feature: Feature,
    pub status: WorkflowStatus,
    pub step: usize,
    pub step_name: Option<String>,
    pub total_steps: usize,
    pub steps: Vec<StepRecord>,
    /// Outputs of completed steps
    pub context: Map<String, Value>,
    /// Values derived from the request and live state
    pub inputs: Map<String, Value>,
    pub result: Option<Value>,
    pub last_error: Option<ClassifiedError>,
}
