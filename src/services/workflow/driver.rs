//! Sign, submit and confirm one workflow step

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::builder::{StepBuilder, TransactionPlan};
use super::classifier::{classify, classify_message, ClassifiedError, ErrorKind};
use super::ledger::{Checkpoint, UnresolvedBroadcast};
use super::metrics;
use super::orchestrator::{StepAction, StepDescriptor, StepEffect, UploadRequest};
use super::state::{WorkflowState, WorkflowStatus};
use crate::services::blockchain::{ChainRpc, TransactionStatus};
use crate::services::storage::MetadataStore;
use crate::services::wallet::{SigningRequest, WalletSigner};

#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
    pub compute_unit_price: u64,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(1000),
            compute_unit_price: 100_000,
        }
    }
}

/// Why a step did not complete
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub error: ClassifiedError,
    pub unresolved: Option<UnresolvedBroadcast>,
}

impl From<ClassifiedError> for StepFailure {
    fn from(error: ClassifiedError) -> Self {
        Self { error, unresolved: None }
    }
}

fn failure(err: anyhow::Error) -> StepFailure {
    classify(&err).into()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    /// Landed but the program returned an error
    Failed(String),
    /// Blockhash expired without the transaction landing
    Expired,
    TimedOut,
}

pub struct Driver {
    rpc: Arc<dyn ChainRpc>,
    wallet: Arc<dyn WalletSigner>,
    store: Option<Arc<dyn MetadataStore>>,
    builder: StepBuilder,
    settings: DriverSettings,
}

impl Driver {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        wallet: Arc<dyn WalletSigner>,
        store: Option<Arc<dyn MetadataStore>>,
        settings: DriverSettings,
    ) -> Self {
        Self {
            rpc,
            wallet,
            store,
            builder: StepBuilder::new(settings.compute_unit_price),
            settings,
        }
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    fn transition(state: &mut WorkflowState, next: WorkflowStatus) -> Result<(), StepFailure> {
        state
            .transition(next)
            .map_err(|e| ClassifiedError::new(ErrorKind::Unknown, e.to_string()).into())
    }

    pub async fn execute(
        &self,
        state: &mut WorkflowState,
        step: &dyn StepDescriptor,
        session_id: &str,
        checkpoint: &Checkpoint<'_>,
    ) -> Result<StepEffect, StepFailure> {
        let payer = self.wallet.pubkey();
        let action = step.build(&state.context, &payer).map_err(failure)?;

        match action {
            StepAction::Upload(request) => self.upload(state, request).await,
            StepAction::Transaction(plan) => {
                self.send_transaction(state, step, plan, &payer, session_id, checkpoint)
                    .await
            }
        }
    }

    async fn upload(&self, state: &mut WorkflowState, request: UploadRequest) -> Result<StepEffect, StepFailure> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ClassifiedError::invalid_input("Metadata storage is not configured"))?;

        Self::transition(state, WorkflowStatus::Broadcasting)?;
        let uri = match request {
            UploadRequest::File(file) => store.upload_file(file).await,
            UploadRequest::Json { name, content } => store.upload_json(&name, &content).await,
        }
        .map_err(|e| failure(e.into()))?;

        // the returned content address is the confirmation
        Self::transition(state, WorkflowStatus::Confirming)?;
        Ok(StepEffect::Uploaded { uri })
    }

    async fn send_transaction(
        &self,
        state: &mut WorkflowState,
        step: &dyn StepDescriptor,
        mut plan: TransactionPlan,
        payer: &Pubkey,
        session_id: &str,
        checkpoint: &Checkpoint<'_>,
    ) -> Result<StepEffect, StepFailure> {
        let request = SigningRequest {
            workflow_id: state.workflow_id,
            session_id: session_id.to_string(),
            feature: state.feature.to_string(),
            step_name: step.name().to_string(),
            description: step.description(),
        };

        let mut retried = false;
        loop {
            if retried {
                // rebuild from context rather than resubmitting stale bytes
                Self::transition(state, WorkflowStatus::Building)?;
                plan = match step.build(&state.context, payer).map_err(failure)? {
                    StepAction::Transaction(plan) => plan,
                    StepAction::Upload(_) => {
                        return Err(ClassifiedError::new(
                            ErrorKind::Unknown,
                            "Step changed shape between builds",
                        )
                        .into())
                    }
                };
            }

            let (blockhash, last_valid_block_height) =
                self.rpc.latest_blockhash().await.map_err(failure)?;
            let transaction = self.builder.assemble(&plan, payer, blockhash).map_err(failure)?;

            Self::transition(state, WorkflowStatus::AwaitingSignature)?;
            let signed = self
                .wallet
                .sign_transaction(transaction, &request)
                .await
                .map_err(|e| failure(e.into()))?;
            if !signed.is_signed() {
                return Err(ClassifiedError::new(
                    ErrorKind::Unknown,
                    "Wallet returned an incompletely signed transaction",
                )
                .into());
            }

            Self::transition(state, WorkflowStatus::Broadcasting)?;
            let signature = match self.rpc.send_transaction(&signed).await {
                Ok(signature) => signature,
                Err(err) => {
                    let raw = format!("{:#}", err);
                    if raw.to_lowercase().contains("already been processed") {
                        // an identical transaction landed earlier; confirm that one
                        signed.signatures[0]
                    } else {
                        let classified = classify(&err);
                        if classified.kind == ErrorKind::ExpiredBlockhash && !retried {
                            warn!(
                                workflow_id = %state.workflow_id,
                                step = step.name(),
                                "blockhash expired before broadcast, rebuilding once"
                            );
                            metrics::track_retry(state.feature);
                            retried = true;
                            continue;
                        }
                        return Err(classified.into());
                    }
                }
            };

            info!(
                workflow_id = %state.workflow_id,
                step = step.name(),
                %signature,
                "transaction broadcast"
            );
            // a run cut short from here on must re-check this signature, not resend
            let broadcast = UnresolvedBroadcast {
                step: state.step,
                signature,
                last_valid_block_height,
            };
            checkpoint.save(state, Some(broadcast));

            Self::transition(state, WorkflowStatus::Confirming)?;
            match self.await_confirmation(&signature, last_valid_block_height).await {
                ConfirmationOutcome::Confirmed => return Ok(StepEffect::Confirmed { signature }),
                ConfirmationOutcome::Failed(reason) => {
                    let error = classify_message(&reason).with_signature(signature.to_string());
                    return Err(error.into());
                }
                ConfirmationOutcome::Expired if !retried => {
                    warn!(
                        workflow_id = %state.workflow_id,
                        step = step.name(),
                        %signature,
                        "transaction expired unconfirmed, rebuilding once"
                    );
                    metrics::track_retry(state.feature);
                    retried = true;
                }
                ConfirmationOutcome::Expired => {
                    return Err(ClassifiedError::new(
                        ErrorKind::ExpiredBlockhash,
                        "Transaction expired before it was processed",
                    )
                    .with_signature(signature.to_string())
                    .into());
                }
                ConfirmationOutcome::TimedOut => {
                    return Err(StepFailure {
                        error: ClassifiedError::network(format!(
                            "Confirmation timed out after {}s; check the transaction before retrying",
                            self.settings.confirm_timeout.as_secs()
                        ))
                        .with_signature(signature.to_string()),
                        unresolved: Some(broadcast),
                    });
                }
            }
        }
    }

    /// Polls until the transaction reaches the RPC commitment, fails, expires, or the timeout elapses.
    pub async fn await_confirmation(&self, signature: &Signature, last_valid_block_height: u64) -> ConfirmationOutcome {
        let deadline = Instant::now() + self.settings.confirm_timeout;
        let commitment = self.rpc.commitment();

        loop {
            match self.rpc.signature_status(signature).await {
                Ok(TransactionStatus::Failed(reason)) => return ConfirmationOutcome::Failed(reason),
                Ok(status) if status.satisfies(commitment) => return ConfirmationOutcome::Confirmed,
                Ok(TransactionStatus::Pending) => {
                    if self.blockhash_expired(signature, last_valid_block_height).await {
                        return ConfirmationOutcome::Expired;
                    }
                }
                Ok(status) => debug!("Transaction {} status: {:?}", signature, status),
                Err(e) => warn!("Status check for {} failed: {}", signature, e),
            }

            if Instant::now() >= deadline {
                return ConfirmationOutcome::TimedOut;
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// True only when the chain has moved past the blockhash and the transaction is still unknown.
    async fn blockhash_expired(&self, signature: &Signature, last_valid_block_height: u64) -> bool {
        match self.rpc.block_height().await {
            Ok(height) if height > last_valid_block_height => matches!(
                self.rpc.signature_status(signature).await,
                Ok(TransactionStatus::Pending)
            ),
            _ => false,
        }
    }
}
