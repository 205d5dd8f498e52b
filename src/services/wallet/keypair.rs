use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{ApprovalDecision, ApprovalManager, SigningRequest, WalletError, WalletSigner};

/// Server-held keypair wallet, optionally gated behind manual approval.
pub struct KeypairWallet {
    keypair: Arc<Keypair>,
    approvals: Option<Arc<ApprovalManager>>,
    approval_timeout: Duration,
}

impl std::fmt::Debug for KeypairWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairWallet")
            .field("pubkey", &self.keypair.pubkey())
            .field("manual_approval", &self.approvals.is_some())
            .finish()
    }
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
            approvals: None,
            approval_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_approvals(mut self, approvals: Arc<ApprovalManager>, timeout: Duration) -> Self {
        self.approvals = Some(approvals);
        self.approval_timeout = timeout;
        self
    }

    async fn await_approval(&self, request: &SigningRequest) -> Result<(), WalletError> {
        let Some(approvals) = &self.approvals else {
            return Ok(());
        };

        let (id, rx) = approvals.request(request);
        match approvals.wait(id, rx, self.approval_timeout).await {
            ApprovalDecision::Approved => Ok(()),
            ApprovalDecision::Rejected => Err(WalletError::Rejected(format!(
                "{} step '{}' was declined",
                request.feature, request.step_name
            ))),
        }
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_transaction(
        &self,
        mut transaction: Transaction,
        request: &SigningRequest,
    ) -> Result<Transaction, WalletError> {
        self.await_approval(request).await?;

        let blockhash = transaction.message.recent_blockhash;
        transaction
            .try_partial_sign(&[self.keypair.as_ref()], blockhash)
            .map_err(|e| WalletError::Signing(e.to_string()))?;

        info!(
            "Signed {} step '{}' for workflow {}",
            request.feature, request.step_name, request.workflow_id
        );
        Ok(transaction)
    }
}
