use solana_sdk::commitment_config::CommitmentLevel;
use solana_transaction_status::{
    TransactionConfirmationStatus, TransactionStatus as RpcTransactionStatus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Unknown to the cluster so far
    Pending,
    Processed,
    Confirmed(u64), // number of confirmations
    Finalized,
    Failed(String),
}

impl TransactionStatus {
    pub fn from_rpc(status: &RpcTransactionStatus) -> Self {
        if let Some(err) = &status.err {
            return Self::Failed(err.to_string());
        }

        match status.confirmation_status.as_ref() {
            Some(TransactionConfirmationStatus::Finalized) => Self::Finalized,
            Some(TransactionConfirmationStatus::Confirmed) => {
                Self::Confirmed(status.confirmations.unwrap_or(1) as u64)
            }
            Some(TransactionConfirmationStatus::Processed) | None => Self::Processed,
        }
    }

    /// Whether the transaction has reached the requested commitment level.
    pub fn satisfies(&self, commitment: CommitmentLevel) -> bool {
        match self {
            Self::Finalized => true,
            Self::Confirmed(_) => !matches!(commitment, CommitmentLevel::Finalized),
            Self::Processed => matches!(commitment, CommitmentLevel::Processed),
            Self::Pending | Self::Failed(_) => false,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}
