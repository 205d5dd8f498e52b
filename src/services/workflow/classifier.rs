//! Maps raw failures onto the closed workflow error taxonomy.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::services::storage::StorageError;
use crate::services::wallet::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UserRejected,
    InsufficientFunds,
    ExpiredBlockhash,
    AuthorityMismatch,
    AccountNotFound,
    NetworkError,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::UserRejected => "user_rejected",
            Self::InsufficientFunds => "insufficient_funds",
            Self::ExpiredBlockhash => "expired_blockhash",
            Self::AuthorityMismatch => "authority_mismatch",
            Self::AccountNotFound => "account_not_found",
            Self::NetworkError => "network_error",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExpiredBlockhash | Self::NetworkError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    /// Raw failure text the classification was derived from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Broadcast transaction whose outcome is still unknown; re-query before resubmitting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_retryable(),
            detail: None,
            signature: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn insufficient_funds(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientFunds, message)
    }

    pub fn authority_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthorityMismatch, message)
    }

    pub fn account_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccountNotFound, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

// SPL Token: OwnerMismatch, FixedSupply (mint authority missing or wrong)
const TOKEN_AUTHORITY_CODES: [u32; 2] = [0x4, 0x5];
// Token metadata interface: MintHasNoMintAuthority, IncorrectMintAuthority,
// IncorrectUpdateAuthority, ImmutableMetadata
const METADATA_ERROR_BASE: u32 = 901_952;
const METADATA_AUTHORITY_CODES: [u32; 4] = [
    METADATA_ERROR_BASE + 1,
    METADATA_ERROR_BASE + 2,
    METADATA_ERROR_BASE + 3,
    METADATA_ERROR_BASE + 4,
];
// System program ResultWithNegativeLamports and SPL Token InsufficientFunds share 0x1
const INSUFFICIENT_FUNDS_CODE: u32 = 0x1;

static HEX_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"custom program error: 0x([0-9a-f]+)").expect("valid program error pattern")
});
static DECIMAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"custom\((\d+)\)").expect("valid program error pattern"));

fn program_error_code(lowered: &str) -> Option<u32> {
    if let Some(code) = HEX_CODE
        .captures(lowered)
        .and_then(|caps| u32::from_str_radix(&caps[1], 16).ok())
    {
        return Some(code);
    }
    DECIMAL_CODE
        .captures(lowered)
        .and_then(|caps| caps[1].parse().ok())
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Classifies a raw failure message. Total and free of hidden state.
pub fn classify_message(raw: &str) -> ClassifiedError {
    let lowered = raw.to_lowercase();

    let (kind, message) = if contains_any(&lowered, &["user rejected", "rejected the request", "declined"]) {
        (ErrorKind::UserRejected, "Transaction rejected")
    } else if contains_any(
        &lowered,
        &["blockhash not found", "block height exceeded", "transaction expired", "blockhash expired"],
    ) {
        (ErrorKind::ExpiredBlockhash, "Transaction expired before it was processed")
    } else if contains_any(
        &lowered,
        &["insufficient funds", "insufficient lamports", "no record of a prior credit"],
    ) || program_error_code(&lowered) == Some(INSUFFICIENT_FUNDS_CODE)
    {
        (ErrorKind::InsufficientFunds, "Not enough SOL for fees")
    } else if contains_any(&lowered, &["constraintseeds", "authority mismatch", "not mint authority"])
        || program_error_code(&lowered).is_some_and(|code| {
            TOKEN_AUTHORITY_CODES.contains(&code) || METADATA_AUTHORITY_CODES.contains(&code)
        })
    {
        (ErrorKind::AuthorityMismatch, "Wallet is not the required authority")
    } else if contains_any(
        &lowered,
        &["accountnotfound", "could not find account", "account not found", "account does not exist"],
    ) {
        (ErrorKind::AccountNotFound, "Account not found")
    } else if contains_any(
        &lowered,
        &[
            "timed out",
            "timeout",
            "connection refused",
            "connection reset",
            "error sending request",
            "dns error",
            "429",
            "too many requests",
            "503",
            "service unavailable",
        ],
    ) {
        (ErrorKind::NetworkError, "Network request failed")
    } else {
        (ErrorKind::Unknown, "Unexpected error")
    };

    ClassifiedError::new(kind, message).with_detail(raw)
}

/// Classifies any workflow failure, honoring typed errors before falling back to text.
pub fn classify(err: &anyhow::Error) -> ClassifiedError {
    if let Some(classified) = err.downcast_ref::<ClassifiedError>() {
        return classified.clone();
    }

    if let Some(wallet) = err.downcast_ref::<WalletError>() {
        return match wallet {
            WalletError::Rejected(_) => {
                ClassifiedError::new(ErrorKind::UserRejected, "Transaction rejected")
            }
            WalletError::NotConnected => ClassifiedError::invalid_input("Wallet not connected"),
            WalletError::Signing(_) => ClassifiedError::new(ErrorKind::Unknown, "Wallet failed to sign"),
        }
        .with_detail(wallet.to_string());
    }

    if let Some(storage) = err.downcast_ref::<StorageError>() {
        let classified = match storage {
            StorageError::NotConfigured(message) => ClassifiedError::invalid_input(message.clone()),
            _ => {
                let mut classified = ClassifiedError::network("Metadata upload failed");
                classified.retryable = storage.is_transient();
                classified
            }
        };
        return classified.with_detail(storage.to_string());
    }

    classify_message(&format!("{:#}", err))
}
