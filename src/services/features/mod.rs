//! Workflow definitions for each launchpad feature

pub mod launch;
pub mod metadata;
pub mod mint;
pub mod pool;
pub mod transfer;

use sha2::{Digest, Sha256};

pub use crate::services::workflow::Feature;
pub use launch::{LaunchRequest, LaunchWorkflow};
pub use metadata::{UpdateMetadataRequest, UpdateMetadataWorkflow};
pub use mint::{MintRequest, MintWorkflow};
pub use pool::{CreatePoolRequest, CreatePoolWorkflow};
pub use transfer::{TransferRequest, TransferWorkflow};

/// Balance thresholds applied during validation
#[derive(Debug, Clone, Copy)]
pub struct FeeThresholds {
    /// Minimum SOL for a full token launch
    pub launch_min_balance: u64,
    /// Minimum SOL kept for fees on single-transaction features
    pub fee_reserve: u64,
}

impl Default for FeeThresholds {
    fn default() -> Self {
        Self {
            launch_min_balance: 50_000_000,
            fee_reserve: 10_000,
        }
    }
}

/// Digest over request fields, separated so that ("ab","c") and ("a","bc") differ.
pub(crate) fn fingerprint(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}
