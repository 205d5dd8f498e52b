use anyhow::{anyhow, Result};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::{
    account::Account,
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use std::sync::Arc;
use tracing::{debug, info};

use super::confirmation::TransactionStatus;

/// Read and submit access to a Solana cluster.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Latest blockhash with the last block height at which it is still valid
    async fn latest_blockhash(&self) -> Result<(Hash, u64)>;

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature>;

    async fn signature_status(&self, signature: &Signature) -> Result<TransactionStatus>;

    async fn block_height(&self) -> Result<u64>;

    /// `None` when the account does not exist
    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>>;

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64>;

    fn commitment(&self) -> CommitmentLevel {
        CommitmentLevel::Confirmed
    }
}

#[derive(Clone)]
pub struct SolanaRpc {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
    skip_preflight: bool,
}

impl std::fmt::Debug for SolanaRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRpc")
            .field("rpc_url", &self.client.url())
            .field("commitment", &self.commitment.commitment)
            .field("skip_preflight", &self.skip_preflight)
            .finish()
    }
}

impl SolanaRpc {
    pub fn new(rpc_url: String, commitment: CommitmentLevel, skip_preflight: bool) -> Self {
        info!("Initializing Solana RPC client for {} ({:?})", rpc_url, commitment);
        let commitment = CommitmentConfig { commitment };
        Self {
            client: Arc::new(RpcClient::new_with_commitment(rpc_url, commitment)),
            commitment,
            skip_preflight,
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

#[async_trait]
impl ChainRpc for SolanaRpc {
    async fn latest_blockhash(&self) -> Result<(Hash, u64)> {
        self.client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| anyhow!("Failed to get blockhash: {}", e))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: self.skip_preflight,
            preflight_commitment: Some(self.commitment.commitment),
            max_retries: Some(0),
            ..Default::default()
        };

        let signature = self
            .client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| anyhow!("Failed to send transaction: {}", e))?;

        debug!("Submitted transaction {}", signature);
        Ok(signature)
    }

    async fn signature_status(&self, signature: &Signature) -> Result<TransactionStatus> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| anyhow!("Failed to get signature status: {}", e))?;

        Ok(response
            .value
            .first()
            .and_then(|status| status.as_ref())
            .map(TransactionStatus::from_rpc)
            .unwrap_or(TransactionStatus::Pending))
    }

    async fn block_height(&self) -> Result<u64> {
        self.client
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(|e| anyhow!("Failed to get block height: {}", e))
    }

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>> {
        self.client
            .get_account_with_commitment(pubkey, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(|e| anyhow!("Failed to get account {}: {}", pubkey, e))
    }

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64> {
        self.client
            .get_balance_with_commitment(pubkey, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(|e| anyhow!("Failed to get balance for {}: {}", pubkey, e))
    }

    fn commitment(&self) -> CommitmentLevel {
        self.commitment.commitment
    }
}
