//! Wallet services module

pub mod approval;
pub mod keypair;

use async_trait::async_trait;
use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, transaction::Transaction};
use thiserror::Error;
use uuid::Uuid;

// Re-exports
pub use approval::{ApprovalDecision, ApprovalManager, PendingApproval};
pub use keypair::KeypairWallet;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("User rejected the request: {0}")]
    Rejected(String),

    #[error("Wallet not connected")]
    NotConnected,

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// What the wallet is being asked to sign, shown to whoever approves it.
#[derive(Debug, Clone, Serialize)]
pub struct SigningRequest {
    pub workflow_id: Uuid,
    pub session_id: String,
    pub feature: String,
    pub step_name: String,
    pub description: String,
}

/// A wallet able to authorize workflow transactions.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    fn is_connected(&self) -> bool {
        true
    }

    /// Adds the wallet's signature. The blockhash is already set on the transaction.
    async fn sign_transaction(
        &self,
        transaction: Transaction,
        request: &SigningRequest,
    ) -> Result<Transaction, WalletError>;
}
