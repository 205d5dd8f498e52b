//! Solana chain access: RPC, account decoding, and instruction builders

pub mod accounts;
pub mod confirmation;
pub mod instructions;
pub mod rpc;
pub mod utils;

// Re-exports
pub use accounts::{AccountReader, MintInfo};
pub use confirmation::TransactionStatus;
pub use rpc::{ChainRpc, SolanaRpc};
pub use utils::{KeyUtils, PdaUtils, TokenMath};
