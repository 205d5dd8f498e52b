// Business logic services
// Chain access, wallet signing, metadata storage and the workflow engine

pub mod blockchain;
pub mod features;
pub mod launchpad;
pub mod raydium;
pub mod storage;
pub mod wallet;
pub mod workflow;

pub use launchpad::{Launchpad, LaunchpadSettings, TokenInfo, WalletInfo};
pub use raydium::{CpmmProgram, PoolConfigSource, RaydiumApiClient};
pub use storage::{MetadataStore, PinataClient};
pub use wallet::{ApprovalManager, KeypairWallet, WalletSigner};
pub use workflow::WorkflowEngine;
