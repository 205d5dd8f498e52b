//! Sequences workflow steps and carries their outputs forward

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use super::builder::TransactionPlan;
use super::classifier::{classify, classify_message, ClassifiedError, ErrorKind};
use super::driver::{ConfirmationOutcome, Driver, DriverSettings, StepFailure};
use super::ledger::{Checkpoint, LedgerEntry, LedgerKey, ResumeLedger, UnresolvedBroadcast};
use super::metrics;
use super::single_flight::SingleFlight;
use super::state::{
    ContextKey, ContextUpdates, ContextValue, Feature, StepOutcome, WorkflowContext, WorkflowState,
    WorkflowStatus,
};
use crate::services::blockchain::ChainRpc;
use crate::services::storage::{FileUpload, MetadataStore};
use crate::services::wallet::WalletSigner;

/// Read-only collaborators visible to validation and probes
pub struct StepEnv<'a> {
    pub rpc: &'a dyn ChainRpc,
    pub payer: Pubkey,
}

#[derive(Debug, Clone)]
pub enum UploadRequest {
    File(FileUpload),
    Json { name: String, content: Value },
}

#[derive(Debug, Clone)]
pub enum StepAction {
    Transaction(TransactionPlan),
    Upload(UploadRequest),
}

/// What a completed step produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEffect {
    Confirmed { signature: Signature },
    Uploaded { uri: String },
}

impl StepEffect {
    pub fn signature(&self) -> Option<Signature> {
        match self {
            Self::Confirmed { signature } => Some(*signature),
            Self::Uploaded { .. } => None,
        }
    }
}

/// One step of a workflow, defined when the workflow is constructed.
#[async_trait]
pub trait StepDescriptor: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> String {
        self.name().replace('_', " ")
    }

    /// Context keys written by `on_confirmed`. When all are present the step is skipped.
    fn outputs(&self) -> &'static [ContextKey];

    /// Gate checked against live state right before building.
    async fn precondition(&self, _context: &WorkflowContext, _env: &StepEnv<'_>) -> Result<()> {
        Ok(())
    }

    /// Reports the step's outputs when its effect already exists on chain.
    async fn probe(&self, _context: &WorkflowContext, _env: &StepEnv<'_>) -> Result<Option<ContextUpdates>> {
        Ok(None)
    }

    /// Deterministic in `context`; only the blockhash added later differs between builds.
    fn build(&self, context: &WorkflowContext, payer: &Pubkey) -> Result<StepAction>;

    fn on_confirmed(&self, context: &WorkflowContext, effect: &StepEffect) -> Result<ContextUpdates>;
}

/// A feature's inputs and step sequence
#[async_trait]
pub trait WorkflowDefinition: Send + Sync {
    fn feature(&self) -> Feature;

    /// Stable digest of the request, used to find progress from an earlier failed run
    fn fingerprint(&self) -> String;

    /// Inputs generated before the first step; never regenerated once a run has resumed them.
    fn seed(&self) -> Result<ContextUpdates> {
        Ok(Vec::new())
    }

    /// Gates entry. Read-only; returns derived inputs such as decimals, which
    /// replace the values an earlier run derived.
    async fn validate(&self, env: &StepEnv<'_>) -> Result<ContextUpdates>;

    fn steps(&self) -> &[Box<dyn StepDescriptor>];

    fn result(&self, context: &WorkflowContext, last_signature: Option<&str>) -> Value;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("A {0} workflow is already in progress for this session")]
    Busy(Feature),

    #[error("Workflow task stopped unexpectedly: {0}")]
    Interrupted(String),
}

/// A step settled while preparing the run, recorded when the loop reaches it
struct ResolvedStep {
    index: usize,
    effect: StepEffect,
}

pub struct WorkflowEngine {
    rpc: Arc<dyn ChainRpc>,
    wallet: Arc<dyn WalletSigner>,
    driver: Driver,
    flights: SingleFlight,
    ledger: ResumeLedger,
}

impl WorkflowEngine {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        wallet: Arc<dyn WalletSigner>,
        store: Option<Arc<dyn MetadataStore>>,
        settings: DriverSettings,
        ledger: ResumeLedger,
    ) -> Self {
        Self {
            driver: Driver::new(rpc.clone(), wallet.clone(), store, settings),
            rpc,
            wallet,
            flights: SingleFlight::new(),
            ledger,
        }
    }

    pub fn ledger(&self) -> &ResumeLedger {
        &self.ledger
    }

    pub fn flights(&self) -> &SingleFlight {
        &self.flights
    }

    /// Runs a workflow to a terminal state. Only a concurrent run for the same
    /// session and feature is reported as an error; every other outcome is in the state.
    pub async fn run(&self, session_id: &str, definition: &dyn WorkflowDefinition) -> Result<WorkflowState, EngineError> {
        let feature = definition.feature();
        let Some(_guard) = self.flights.try_acquire(session_id, feature) else {
            metrics::track_rejected_busy(feature);
            return Err(EngineError::Busy(feature));
        };

        let started = Instant::now();
        let steps = definition.steps();
        let mut state = WorkflowState::new(feature, steps.len());
        let key = LedgerKey {
            session_id: session_id.to_string(),
            feature,
            fingerprint: definition.fingerprint(),
        };
        // left in place until the run succeeds, so an interrupted run loses nothing
        let resumed = self.ledger.get(&key);
        let checkpoint = Checkpoint::new(&self.ledger, &key);

        info!(
            workflow_id = %state.workflow_id,
            feature = %feature,
            steps = steps.len(),
            resumed = resumed.is_some(),
            "workflow started"
        );

        let unresolved = self
            .drive(&mut state, definition, session_id, resumed, &checkpoint)
            .await;

        let outcome = if state.status == WorkflowStatus::Failed {
            checkpoint.save(&state, unresolved);
            "failed"
        } else {
            checkpoint.clear();
            "succeeded"
        };

        metrics::track_run(feature, outcome, started.elapsed());
        info!(
            workflow_id = %state.workflow_id,
            feature = %feature,
            status = %state.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "workflow finished"
        );

        Ok(state)
    }

    async fn drive(
        &self,
        state: &mut WorkflowState,
        definition: &dyn WorkflowDefinition,
        session_id: &str,
        resumed: Option<LedgerEntry>,
        checkpoint: &Checkpoint<'_>,
    ) -> Option<UnresolvedBroadcast> {
        let env = StepEnv {
            rpc: self.rpc.as_ref(),
            payer: self.wallet.pubkey(),
        };

        let mut resolved = match self.prepare(state, definition, &env, resumed).await {
            Ok(resolved) => resolved,
            Err(failure) => {
                state.fail(failure.error);
                return failure.unresolved;
            }
        };

        for (index, step) in definition.steps().iter().enumerate() {
            state.enter_step(index, step.name());
            if state.status != WorkflowStatus::Building {
                if let Err(e) = state.transition(WorkflowStatus::Building) {
                    state.fail(ClassifiedError::new(ErrorKind::Unknown, e.to_string()));
                    return None;
                }
            }

            // an earlier run's broadcast for this step was confirmed while preparing
            if resolved.as_ref().is_some_and(|done| done.index == index) {
                if let Some(done) = resolved.take() {
                    Self::record_completion(state, step.as_ref(), &done.effect);
                    checkpoint.save(state, None);
                    continue;
                }
            }

            match self.already_done(state, step.as_ref(), &env).await {
                Ok(true) => {
                    info!(
                        workflow_id = %state.workflow_id,
                        step = step.name(),
                        "step effect already present, skipping"
                    );
                    state.record(StepOutcome::Skipped, None, None);
                    metrics::track_step(state.feature, step.name(), "skipped");
                    continue;
                }
                Ok(false) => {}
                Err(error) => {
                    state.fail(error);
                    metrics::track_step(state.feature, step.name(), "failed");
                    return None;
                }
            }

            if let Err(e) = step.precondition(&state.context, &env).await {
                state.fail(classify(&e));
                metrics::track_step(state.feature, step.name(), "failed");
                return None;
            }

            match self.driver.execute(state, step.as_ref(), session_id, checkpoint).await {
                Ok(effect) => {
                    if let Err(error) = Self::apply_effect(state, step.as_ref(), &effect) {
                        state.fail(error);
                        return None;
                    }
                    Self::record_completion(state, step.as_ref(), &effect);
                    checkpoint.save(state, None);
                }
                Err(failure) => {
                    state.record(
                        StepOutcome::Failed,
                        failure.error.signature.clone(),
                        None,
                    );
                    state.fail(failure.error);
                    metrics::track_step(state.feature, step.name(), "failed");
                    return failure.unresolved;
                }
            }
        }

        let result = definition.result(&state.context, state.last_signature());
        if let Err(e) = state.succeed(result) {
            state.fail(ClassifiedError::new(ErrorKind::Unknown, e.to_string()));
        }
        None
    }

    /// Restores resumed progress, settles a broadcast an earlier run left
    /// unresolved, then validates against live state. Validation is skipped
    /// when every step's effect is already recorded, since live state then
    /// reflects the finished work rather than the request.
    async fn prepare(
        &self,
        state: &mut WorkflowState,
        definition: &dyn WorkflowDefinition,
        env: &StepEnv<'_>,
        resumed: Option<LedgerEntry>,
    ) -> Result<Option<ResolvedStep>, StepFailure> {
        state
            .transition(WorkflowStatus::Validating)
            .map_err(|e| StepFailure::from(ClassifiedError::new(ErrorKind::Unknown, e.to_string())))?;

        let mut pending = None;
        if let Some(entry) = resumed {
            state.context = entry.context;
            pending = entry.unresolved;
        }

        if !self.wallet.is_connected() {
            return Err(StepFailure {
                error: ClassifiedError::invalid_input("Wallet not connected"),
                unresolved: pending,
            });
        }

        let seeds = definition.seed().map_err(|e| StepFailure {
            error: classify(&e),
            unresolved: pending,
        })?;
        for (key, value) in seeds {
            // generated keys survive across runs
            if !state.context.contains(key) {
                state.context.set_input(key, value);
            }
        }

        let steps = definition.steps();
        let mut resolved = None;
        if let Some(broadcast) = pending {
            if let Some(step) = steps.get(broadcast.step) {
                if let Some(effect) = self.recheck(state, step.as_ref(), broadcast).await? {
                    Self::apply_effect(state, step.as_ref(), &effect)?;
                    resolved = Some(ResolvedStep {
                        index: broadcast.step,
                        effect,
                    });
                }
            }
        }

        let finished = !steps.is_empty()
            && steps.iter().all(|step| {
                let outputs = step.outputs();
                !outputs.is_empty() && outputs.iter().all(|key| state.context.has_output(*key))
            });
        if !finished {
            let derived = definition
                .validate(env)
                .await
                .map_err(|e| StepFailure::from(classify(&e)))?;
            state.context.set_inputs(derived);
        }

        state
            .transition(WorkflowStatus::Building)
            .map_err(|e| StepFailure::from(ClassifiedError::new(ErrorKind::Unknown, e.to_string())))?;
        Ok(resolved)
    }

    async fn already_done(
        &self,
        state: &mut WorkflowState,
        step: &dyn StepDescriptor,
        env: &StepEnv<'_>,
    ) -> Result<bool, ClassifiedError> {
        let outputs = step.outputs();
        if !outputs.is_empty() && outputs.iter().all(|key| state.context.has_output(*key)) {
            return Ok(true);
        }

        match step.probe(&state.context, env).await.map_err(|e| classify(&e))? {
            Some(updates) => {
                state.context.merge(updates).map_err(conflict)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Resolves a broadcast left pending by an earlier run. `Some` when it landed,
    /// `None` when it expired and the step must be rebuilt.
    async fn recheck(
        &self,
        state: &WorkflowState,
        step: &dyn StepDescriptor,
        broadcast: UnresolvedBroadcast,
    ) -> Result<Option<StepEffect>, StepFailure> {
        info!(
            workflow_id = %state.workflow_id,
            step = step.name(),
            signature = %broadcast.signature,
            "re-checking unresolved broadcast"
        );

        match self
            .driver
            .await_confirmation(&broadcast.signature, broadcast.last_valid_block_height)
            .await
        {
            ConfirmationOutcome::Confirmed => Ok(Some(StepEffect::Confirmed {
                signature: broadcast.signature,
            })),
            ConfirmationOutcome::Expired => {
                warn!(
                    workflow_id = %state.workflow_id,
                    signature = %broadcast.signature,
                    "earlier broadcast never landed, rebuilding"
                );
                Ok(None)
            }
            ConfirmationOutcome::Failed(reason) => Err(classify_message(&reason)
                .with_signature(broadcast.signature.to_string())
                .into()),
            ConfirmationOutcome::TimedOut => Err(StepFailure {
                error: ClassifiedError::network("Earlier transaction is still unconfirmed")
                    .with_signature(broadcast.signature.to_string()),
                unresolved: Some(broadcast),
            }),
        }
    }

    fn apply_effect(
        state: &mut WorkflowState,
        step: &dyn StepDescriptor,
        effect: &StepEffect,
    ) -> Result<(), ClassifiedError> {
        let updates = step
            .on_confirmed(&state.context, effect)
            .map_err(|e| classify(&e))?;
        state.context.merge(updates).map_err(conflict)
    }

    fn record_completion(state: &mut WorkflowState, step: &dyn StepDescriptor, effect: &StepEffect) {
        state.last_error = None;

        let (outcome, signature, uri) = match effect {
            StepEffect::Confirmed { signature } => (StepOutcome::Confirmed, Some(signature.to_string()), None),
            StepEffect::Uploaded { uri } => (StepOutcome::Uploaded, None, Some(uri.clone())),
        };
        info!(
            workflow_id = %state.workflow_id,
            feature = %state.feature,
            step = step.name(),
            signature = signature.as_deref().unwrap_or("-"),
            "step completed"
        );
        state.record(outcome, signature, uri);
        metrics::track_step(state.feature, step.name(), "completed");
    }
}

fn conflict(err: super::state::ContextError) -> ClassifiedError {
    ClassifiedError::new(ErrorKind::Unknown, err.to_string())
}

/// Context entry for a signature-producing step
pub fn signature_value(effect: &StepEffect) -> Result<ContextValue> {
    effect
        .signature()
        .map(ContextValue::Signature)
        .ok_or_else(|| anyhow::anyhow!("Step completed without a transaction signature"))
}
