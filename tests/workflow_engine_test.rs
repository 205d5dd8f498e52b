// Workflow Engine Integration Tests
// Drives complete workflows against the in-memory chain, wallet and storage

mod common;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use solana_sdk::{pubkey::Pubkey, system_instruction};
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{png_upload, Harness, MockWallet, LAST_VALID_BLOCK_HEIGHT};
use launchpad_gateway::services::blockchain::TransactionStatus;
use launchpad_gateway::services::features::{LaunchRequest, MintRequest, TransferRequest};
use launchpad_gateway::services::workflow::{
    ContextKey, ContextUpdates, ContextValue, EngineError, ErrorKind, Feature, StepAction,
    StepDescriptor, StepEffect, StepEnv, StepOutcome, TransactionPlan, WorkflowContext,
    WorkflowDefinition, WorkflowStatus,
};

const SESSION: &str = "session-a";

fn launch_request() -> LaunchRequest {
    LaunchRequest {
        name: "Grid Token".to_string(),
        symbol: "grid".to_string(),
        description: None,
        decimals: Some(6),
        initial_supply: "1000".to_string(),
        image: png_upload(),
    }
}

/// Step paying one lamport to a fresh address and recording its signature
struct PaymentStep {
    name: &'static str,
    outputs: &'static [ContextKey],
}

#[async_trait]
impl StepDescriptor for PaymentStep {
    fn name(&self) -> &'static str {
        self.name
    }

    fn outputs(&self) -> &'static [ContextKey] {
        self.outputs
    }

    fn build(&self, _context: &WorkflowContext, payer: &Pubkey) -> Result<StepAction> {
        let instruction = system_instruction::transfer(payer, &Pubkey::new_unique(), 1);
        Ok(StepAction::Transaction(TransactionPlan::new(vec![instruction], 10_000)))
    }

    fn on_confirmed(&self, _context: &WorkflowContext, effect: &StepEffect) -> Result<ContextUpdates> {
        let signature = effect
            .signature()
            .ok_or_else(|| anyhow!("payment confirmed without a signature"))?;
        Ok(vec![(self.outputs[0], ContextValue::Signature(signature))])
    }
}

struct ThreePayments {
    steps: Vec<Box<dyn StepDescriptor>>,
}

impl ThreePayments {
    fn new() -> Self {
        Self {
            steps: vec![
                Box::new(PaymentStep {
                    name: "first_payment",
                    outputs: &[ContextKey("first_payment")],
                }),
                Box::new(PaymentStep {
                    name: "second_payment",
                    outputs: &[ContextKey("second_payment")],
                }),
                Box::new(PaymentStep {
                    name: "third_payment",
                    outputs: &[ContextKey("third_payment")],
                }),
            ],
        }
    }
}

#[async_trait]
impl WorkflowDefinition for ThreePayments {
    fn feature(&self) -> Feature {
        Feature::Transfer
    }

    fn fingerprint(&self) -> String {
        "three-payments".to_string()
    }

    async fn validate(&self, env: &StepEnv<'_>) -> Result<ContextUpdates> {
        Ok(vec![
            (ContextKey::WALLET, ContextValue::Address(env.payer)),
            (ContextKey::AMOUNT, ContextValue::Amount(3)),
        ])
    }

    fn steps(&self) -> &[Box<dyn StepDescriptor>] {
        &self.steps
    }

    fn result(&self, _context: &WorkflowContext, last_signature: Option<&str>) -> Value {
        json!({ "signature": last_signature })
    }
}

fn mint_request(harness: &Harness) -> MintRequest {
    let mint = harness.add_token_2022_mint(6, "https://ipfs.test/ipfs/original");
    MintRequest {
        mint_address: mint.to_string(),
        amount: "25".to_string(),
    }
}

#[tokio::test]
async fn test_launch_runs_every_step_in_order() -> Result<()> {
    let harness = Harness::new();

    let report = harness.launchpad.launch(SESSION, launch_request()).await?;

    assert_eq!(report.status, WorkflowStatus::Succeeded, "{:?}", report.last_error);
    let names: Vec<&str> = report.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "upload_image",
            "upload_metadata",
            "create_mint",
            "create_associated_account",
            "mint_initial_supply"
        ]
    );
    assert_eq!(report.steps[0].outcome, StepOutcome::Uploaded);
    assert_eq!(report.steps[2].outcome, StepOutcome::Confirmed);

    // uploads need no signature; every transaction is signed exactly once
    assert_eq!(harness.store.uploads(), 2);
    assert_eq!(harness.chain.sends(), 3);
    assert_eq!(
        harness.wallet.signed_steps(),
        ["create_mint", "create_associated_account", "mint_initial_supply"]
    );

    let result = report.result.expect("result");
    assert_eq!(result["initial_supply"], "1000000000");
    assert_eq!(result["metadata_uri"], "https://ipfs.test/ipfs/metadata-1");
    assert!(result["mint_address"].is_string());
    assert!(report.last_error.is_none());

    let (_, document) = harness.store.documents.lock().unwrap()[0].clone();
    assert_eq!(document["symbol"], "GRID");
    assert_eq!(document["image"], "https://ipfs.test/ipfs/image-1");
    Ok(())
}

#[tokio::test]
async fn test_invalid_input_never_reaches_the_network() -> Result<()> {
    let harness = Harness::new();
    let request = TransferRequest {
        mint_address: "not-a-mint".to_string(),
        recipient: harness.payer().to_string(),
        amount: "1".to_string(),
    };

    let report = harness.launchpad.transfer(SESSION, request).await?;

    assert_eq!(report.status, WorkflowStatus::Failed);
    let error = report.last_error.expect("error");
    assert_eq!(error.kind, ErrorKind::InvalidInput);
    assert_eq!(error.message, "Invalid mint address format");
    assert_eq!(harness.chain.account_reads.load(Ordering::SeqCst), 0);
    assert_eq!(harness.chain.sends(), 0);
    assert!(harness.wallet.signed_steps().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_zero_amount_is_rejected_before_validation() -> Result<()> {
    let harness = Harness::new();
    let mut request = mint_request(&harness);
    request.amount = "0".to_string();

    let report = harness.launchpad.mint(SESSION, request).await?;

    assert_eq!(report.status, WorkflowStatus::Failed);
    assert_eq!(report.last_error.unwrap().kind, ErrorKind::InvalidInput);
    assert_eq!(harness.chain.sends(), 0);
    Ok(())
}

#[tokio::test]
async fn test_disconnected_wallet_fails_validation() -> Result<()> {
    let harness = Harness::with_wallet(MockWallet::disconnected());

    let report = harness.launchpad.launch(SESSION, launch_request()).await?;

    assert_eq!(report.status, WorkflowStatus::Failed);
    let error = report.last_error.unwrap();
    assert_eq!(error.kind, ErrorKind::InvalidInput);
    assert_eq!(error.message, "Wallet not connected");
    assert_eq!(harness.store.uploads(), 0);
    Ok(())
}

#[tokio::test]
async fn test_rejection_halts_and_rerun_resumes_without_repeating_steps() -> Result<()> {
    let harness = Harness::new();
    harness.wallet.reject_next();

    let first = harness.launchpad.launch(SESSION, launch_request()).await?;

    assert_eq!(first.status, WorkflowStatus::Failed);
    assert_eq!(first.step_name.as_deref(), Some("create_mint"));
    let error = first.last_error.clone().unwrap();
    assert_eq!(error.kind, ErrorKind::UserRejected);
    assert!(!error.retryable);
    assert_eq!(harness.chain.sends(), 0);
    assert_eq!(harness.store.uploads(), 2);

    let second = harness.launchpad.launch(SESSION, launch_request()).await?;

    assert_eq!(second.status, WorkflowStatus::Succeeded, "{:?}", second.last_error);
    // the uploads from the first run are reused
    assert_eq!(harness.store.uploads(), 2);
    assert_eq!(harness.chain.sends(), 3);
    assert_eq!(
        first.context.get("metadata_uri"),
        second.context.get("metadata_uri")
    );
    assert!(harness.launchpad.engine().ledger().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_different_request_does_not_resume() -> Result<()> {
    let harness = Harness::new();
    harness.wallet.reject_next();
    harness.launchpad.launch(SESSION, launch_request()).await?;

    let mut other = launch_request();
    other.initial_supply = "2000".to_string();
    let report = harness.launchpad.launch(SESSION, other).await?;

    assert_eq!(report.status, WorkflowStatus::Succeeded);
    assert_eq!(harness.store.uploads(), 4);
    // the rejected run's progress is still waiting for its own retry
    assert_eq!(harness.launchpad.engine().ledger().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_expired_blockhash_is_rebuilt_once() -> Result<()> {
    let harness = Harness::new();
    let request = mint_request(&harness);
    harness
        .chain
        .block_height
        .store(LAST_VALID_BLOCK_HEIGHT + 1, Ordering::SeqCst);
    // unknown on the first poll and the expiry re-check, confirmed after the rebuild
    harness
        .chain
        .script_statuses([TransactionStatus::Pending, TransactionStatus::Pending]);

    let report = harness.launchpad.mint(SESSION, request).await?;

    assert_eq!(report.status, WorkflowStatus::Succeeded, "{:?}", report.last_error);
    assert_eq!(harness.chain.sends(), 2);
    assert_eq!(harness.wallet.signed_steps(), ["mint_tokens", "mint_tokens"]);
    let sent = harness.chain.sent_transactions();
    assert_ne!(sent[0].message.recent_blockhash, sent[1].message.recent_blockhash);
    assert_eq!(sent[0].message.instructions, sent[1].message.instructions);
    Ok(())
}

#[tokio::test]
async fn test_second_expiry_fails_the_workflow() -> Result<()> {
    let harness = Harness::new();
    let request = mint_request(&harness);
    harness
        .chain
        .block_height
        .store(LAST_VALID_BLOCK_HEIGHT + 1, Ordering::SeqCst);
    harness.chain.set_default_status(TransactionStatus::Pending);

    let report = harness.launchpad.mint(SESSION, request).await?;

    assert_eq!(report.status, WorkflowStatus::Failed);
    let error = report.last_error.unwrap();
    assert_eq!(error.kind, ErrorKind::ExpiredBlockhash);
    assert!(error.retryable);
    assert_eq!(harness.chain.sends(), 2);
    Ok(())
}

#[tokio::test]
async fn test_stale_blockhash_at_broadcast_is_retried() -> Result<()> {
    let harness = Harness::new();
    let request = mint_request(&harness);
    harness.chain.script_send_errors(["Transaction simulation failed: Blockhash not found"]);

    let report = harness.launchpad.mint(SESSION, request).await?;

    assert_eq!(report.status, WorkflowStatus::Succeeded, "{:?}", report.last_error);
    assert_eq!(harness.chain.sends(), 2);
    Ok(())
}

#[tokio::test]
async fn test_confirmation_timeout_keeps_signature_and_rerun_rechecks_it() -> Result<()> {
    let harness = Harness::new();
    let request = mint_request(&harness);
    harness.chain.set_default_status(TransactionStatus::Pending);

    let first = harness.launchpad.mint(SESSION, request.clone()).await?;

    assert_eq!(first.status, WorkflowStatus::Failed);
    let error = first.last_error.unwrap();
    assert_eq!(error.kind, ErrorKind::NetworkError);
    let signature = error.signature.expect("broadcast signature");
    assert_eq!(harness.chain.sends(), 1);

    // the transaction lands after the first run gave up
    harness.chain.set_default_status(TransactionStatus::Finalized);
    let second = harness.launchpad.mint(SESSION, request).await?;

    assert_eq!(second.status, WorkflowStatus::Succeeded, "{:?}", second.last_error);
    assert_eq!(harness.chain.sends(), 1);
    assert_eq!(second.steps[0].signature.as_deref(), Some(signature.as_str()));
    Ok(())
}

#[tokio::test]
async fn test_program_error_is_classified_with_signature() -> Result<()> {
    let harness = Harness::new();
    let request = mint_request(&harness);
    harness.chain.script_statuses([TransactionStatus::Failed(
        "Error processing Instruction 3: custom program error: 0x5".to_string(),
    )]);

    let report = harness.launchpad.mint(SESSION, request).await?;

    assert_eq!(report.status, WorkflowStatus::Failed);
    let error = report.last_error.unwrap();
    assert_eq!(error.kind, ErrorKind::AuthorityMismatch);
    assert!(error.signature.is_some());
    assert_eq!(report.steps.last().unwrap().outcome, StepOutcome::Failed);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_run_for_same_session_is_busy() -> Result<()> {
    let harness = Harness::new();
    let request = mint_request(&harness);
    let _guard = harness
        .launchpad
        .engine()
        .flights()
        .try_acquire(SESSION, Feature::Mint)
        .expect("first flight");

    let busy = harness.launchpad.mint(SESSION, request.clone()).await;
    assert_eq!(busy.unwrap_err(), EngineError::Busy(Feature::Mint));
    assert_eq!(harness.chain.sends(), 0);

    // other sessions and other features are unaffected
    let report = harness.launchpad.mint("session-b", request).await?;
    assert_eq!(report.status, WorkflowStatus::Succeeded);
    Ok(())
}

#[tokio::test]
async fn test_flight_is_released_after_failure() -> Result<()> {
    let harness = Harness::new();
    harness.wallet.reject_next();
    let request = mint_request(&harness);

    let first = harness.launchpad.mint(SESSION, request.clone()).await?;
    assert_eq!(first.status, WorkflowStatus::Failed);
    assert!(!harness.launchpad.engine().flights().is_active(SESSION, Feature::Mint));

    let second = harness.launchpad.mint(SESSION, request).await?;
    assert_eq!(second.status, WorkflowStatus::Succeeded);
    Ok(())
}

#[tokio::test]
async fn test_rejection_at_first_step_leaves_no_outputs() -> Result<()> {
    let harness = Harness::new();
    harness.wallet.reject_next();

    let state = harness
        .launchpad
        .engine()
        .run(SESSION, &ThreePayments::new())
        .await?;
    let report = state.report();

    assert_eq!(report.status, WorkflowStatus::Failed);
    assert_eq!(report.step_name.as_deref(), Some("first_payment"));
    assert_eq!(report.last_error.unwrap().kind, ErrorKind::UserRejected);
    assert!(report.context.is_empty(), "{:?}", report.context);
    // validation results are reported apart from step outputs
    assert_eq!(report.inputs["amount"], "3");
    assert!(report.inputs.contains_key("wallet"));
    assert_eq!(harness.chain.sends(), 0);
    // nothing was produced, so there is nothing to resume
    assert!(harness.launchpad.engine().ledger().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_three_step_workflow_records_each_output() -> Result<()> {
    let harness = Harness::new();

    let state = harness
        .launchpad
        .engine()
        .run(SESSION, &ThreePayments::new())
        .await?;
    let report = state.report();

    assert_eq!(report.status, WorkflowStatus::Succeeded, "{:?}", report.last_error);
    assert_eq!(report.context.len(), 3);
    assert_eq!(harness.chain.sends(), 3);
    let last = report.steps[2].signature.clone();
    assert_eq!(report.context["third_payment"], json!(last));
    Ok(())
}

#[tokio::test]
async fn test_launch_resumes_at_unconfirmed_account_step_with_same_mint() -> Result<()> {
    let harness = Harness::new();
    // the mint lands, the associated account stays unconfirmed
    harness.chain.set_default_status(TransactionStatus::Pending);
    harness.chain.script_statuses([TransactionStatus::Confirmed(1)]);

    let first = harness.launchpad.launch(SESSION, launch_request()).await?;

    assert_eq!(first.status, WorkflowStatus::Failed);
    assert_eq!(first.step_name.as_deref(), Some("create_associated_account"));
    assert_eq!(first.last_error.clone().unwrap().kind, ErrorKind::NetworkError);
    assert_eq!(harness.chain.sends(), 2);
    let mint_address = first.context["mint_address"].clone();

    harness.chain.set_default_status(TransactionStatus::Finalized);
    let second = harness.launchpad.launch(SESSION, launch_request()).await?;

    assert_eq!(second.status, WorkflowStatus::Succeeded, "{:?}", second.last_error);
    assert_eq!(harness.chain.sends(), 3);
    assert_eq!(
        harness.wallet.signed_steps(),
        ["create_mint", "create_associated_account", "mint_initial_supply"]
    );
    assert_eq!(second.steps[2].outcome, StepOutcome::Skipped);
    assert_eq!(second.steps[3].outcome, StepOutcome::Confirmed);
    assert_eq!(second.context["mint_address"], mint_address);
    assert_eq!(second.result.unwrap()["mint_address"], mint_address);
    assert_eq!(harness.store.uploads(), 2);
    assert!(harness.launchpad.engine().ledger().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_abandoned_request_does_not_cut_the_workflow_short() -> Result<()> {
    let harness = Harness::new();
    let request = mint_request(&harness);
    harness.chain.set_default_status(TransactionStatus::Pending);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        harness.launchpad.mint(SESSION, request.clone()),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(harness.chain.sends(), 1);

    // the workflow keeps its flight until confirmation gives up
    let engine = harness.launchpad.engine();
    assert!(engine.flights().is_active(SESSION, Feature::Mint));
    for _ in 0..100 {
        if !engine.flights().is_active(SESSION, Feature::Mint) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!engine.flights().is_active(SESSION, Feature::Mint));
    assert_eq!(engine.ledger().len(), 1);

    harness.chain.set_default_status(TransactionStatus::Finalized);
    let report = harness.launchpad.mint(SESSION, request).await?;

    assert_eq!(report.status, WorkflowStatus::Succeeded, "{:?}", report.last_error);
    assert_eq!(harness.chain.sends(), 1);
    assert!(engine.ledger().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_still_pending_broadcast_fails_again_without_resending() -> Result<()> {
    let harness = Harness::new();
    let request = mint_request(&harness);
    harness.chain.set_default_status(TransactionStatus::Pending);

    let first = harness.launchpad.mint(SESSION, request.clone()).await?;
    let second = harness.launchpad.mint(SESSION, request).await?;

    assert_eq!(second.status, WorkflowStatus::Failed);
    let error = second.last_error.unwrap();
    assert_eq!(error.kind, ErrorKind::NetworkError);
    assert_eq!(error.signature, first.last_error.unwrap().signature);
    assert_eq!(harness.chain.sends(), 1);
    assert_eq!(harness.launchpad.engine().ledger().len(), 1);
    Ok(())
}
