//! Precondition checks run before any transaction is built

use anyhow::Result;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;

use super::classifier::ClassifiedError;
use crate::services::blockchain::{AccountReader, ChainRpc, KeyUtils, MintInfo, TokenMath};

pub const MAX_SYMBOL_LEN: usize = 10;

pub fn parse_address(label: &str, raw: &str) -> Result<Pubkey, ClassifiedError> {
    if raw.trim().is_empty() {
        return Err(ClassifiedError::invalid_input(format!("{} is required", label)));
    }
    KeyUtils::parse_pubkey(raw)
        .map_err(|_| ClassifiedError::invalid_input(format!("Invalid {} format", label)))
}

/// Strictly positive decimal amount; never touches the network.
pub fn parse_amount(raw: &str) -> Result<Decimal, ClassifiedError> {
    TokenMath::parse_ui_amount(raw).map_err(|e| ClassifiedError::invalid_input(e.to_string()))
}

pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<u64, ClassifiedError> {
    let raw = TokenMath::to_base_units(amount, decimals)
        .map_err(|e| ClassifiedError::invalid_input(e.to_string()))?;
    if raw == 0 {
        return Err(ClassifiedError::invalid_input(format!(
            "Amount {} is below the smallest unit of a {}-decimal token",
            amount, decimals
        )));
    }
    Ok(raw)
}

pub fn require_non_empty(label: &str, raw: &str) -> Result<String, ClassifiedError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClassifiedError::invalid_input(format!("{} is required", label)));
    }
    Ok(trimmed.to_string())
}

/// Upper-cased ticker of 1 to 10 characters
pub fn normalize_symbol(raw: &str) -> Result<String, ClassifiedError> {
    let symbol = require_non_empty("Symbol", raw)?.to_uppercase();
    if symbol.chars().count() > MAX_SYMBOL_LEN {
        return Err(ClassifiedError::invalid_input(format!(
            "Symbol must be at most {} characters",
            MAX_SYMBOL_LEN
        )));
    }
    Ok(symbol)
}

pub fn validate_uri(raw: &str) -> Result<String, ClassifiedError> {
    let trimmed = require_non_empty("Metadata URI", raw)?;
    let url = reqwest::Url::parse(&trimmed)
        .map_err(|e| ClassifiedError::invalid_input(format!("Invalid metadata URI: {}", e)))?;
    if url.cannot_be_a_base() {
        return Err(ClassifiedError::invalid_input("Metadata URI must be an absolute URL"));
    }
    Ok(trimmed)
}

pub fn ensure_within_balance(requested: u64, available: u64) -> Result<(), ClassifiedError> {
    if requested > available {
        return Err(ClassifiedError::invalid_input("Insufficient token balance"));
    }
    Ok(())
}

/// Fails with `InsufficientFunds` when the payer cannot cover `min_lamports`.
pub async fn ensure_fee_balance(rpc: &dyn ChainRpc, payer: &Pubkey, min_lamports: u64) -> Result<u64> {
    let balance = rpc.get_balance(payer).await?;
    if balance < min_lamports {
        return Err(ClassifiedError::insufficient_funds(format!(
            "Low SOL balance: {:.4} SOL, need at least {:.4} SOL",
            TokenMath::lamports_to_sol(balance),
            TokenMath::lamports_to_sol(min_lamports)
        ))
        .into());
    }
    Ok(balance)
}

pub async fn require_mint(rpc: &dyn ChainRpc, mint: &Pubkey) -> Result<MintInfo> {
    let info = AccountReader::fetch_mint(rpc, mint)
        .await?
        .ok_or_else(|| ClassifiedError::account_not_found(format!("Mint account {} not found", mint)))?;
    Ok(info)
}

pub fn ensure_token_2022(mint: &MintInfo) -> Result<(), ClassifiedError> {
    if mint.program_id != spl_token_2022::id() {
        return Err(ClassifiedError::invalid_input(format!(
            "Mint {} is not a Token-2022 mint",
            mint.address
        )));
    }
    Ok(())
}

pub fn ensure_mint_authority(mint: &MintInfo, wallet: &Pubkey) -> Result<(), ClassifiedError> {
    match mint.mint_authority {
        None => Err(ClassifiedError::authority_mismatch("Mint authority has been revoked")),
        Some(authority) if authority != *wallet => Err(ClassifiedError::authority_mismatch(format!(
            "Not mint authority: mint authority is {}",
            authority
        ))),
        Some(_) => Ok(()),
    }
}

/// Verifies against the metadata stored on the mint, not the caller's claim.
pub fn ensure_update_authority(mint: &MintInfo, wallet: &Pubkey) -> Result<(), ClassifiedError> {
    if mint.metadata.is_none() {
        return Err(ClassifiedError::account_not_found(format!(
            "Mint {} has no token metadata",
            mint.address
        )));
    }
    match mint.update_authority() {
        None => Err(ClassifiedError::authority_mismatch("Token metadata is immutable")),
        Some(authority) if authority != *wallet => Err(ClassifiedError::authority_mismatch(format!(
            "Not metadata update authority: update authority is {}",
            authority
        ))),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::workflow::classifier::ErrorKind;
    use spl_token_metadata_interface::state::TokenMetadata;

    fn mint_info(authority: Option<Pubkey>, metadata: Option<TokenMetadata>) -> MintInfo {
        MintInfo {
            address: Pubkey::new_unique(),
            program_id: spl_token_2022::id(),
            decimals: 9,
            supply: 0,
            mint_authority: authority,
            metadata,
            data_len: 300,
            lamports: 1,
        }
    }

    #[test]
    fn test_parse_amount_rejects_zero() {
        let err = parse_amount("0").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert!(parse_amount("12.5").is_ok());
    }

    #[test]
    fn test_to_base_units_rejects_dust() {
        let amount = parse_amount("0.0000001").unwrap();
        assert_eq!(to_base_units(amount, 6).unwrap_err().kind, ErrorKind::InvalidInput);
        assert_eq!(to_base_units(amount, 9).unwrap(), 100);
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address("mint address", "11111111111111111111111111111111").is_ok());
        let err = parse_address("mint address", "not-a-key").unwrap_err();
        assert_eq!(err.message, "Invalid mint address format");
        assert!(parse_address("mint address", "  ").is_err());
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" gmsw ").unwrap(), "GMSW");
        assert!(normalize_symbol("ABCDEFGHIJK").is_err());
        assert!(normalize_symbol("").is_err());
    }

    #[test]
    fn test_validate_uri() {
        assert!(validate_uri("https://gateway.pinata.cloud/ipfs/Qm123").is_ok());
        assert!(validate_uri("ipfs://Qm123").is_ok());
        assert!(validate_uri("relative/path.json").is_err());
        assert!(validate_uri("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_ensure_within_balance() {
        assert!(ensure_within_balance(10, 10).is_ok());
        let err = ensure_within_balance(11, 10).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.message, "Insufficient token balance");
    }

    #[test]
    fn test_mint_authority_checks() {
        let wallet = Pubkey::new_unique();
        assert!(ensure_mint_authority(&mint_info(Some(wallet), None), &wallet).is_ok());
        assert_eq!(
            ensure_mint_authority(&mint_info(Some(Pubkey::new_unique()), None), &wallet)
                .unwrap_err()
                .kind,
            ErrorKind::AuthorityMismatch
        );
        assert!(ensure_mint_authority(&mint_info(None, None), &wallet)
            .unwrap_err()
            .message
            .contains("revoked"));
    }

    #[test]
    fn test_update_authority_checks() {
        let wallet = Pubkey::new_unique();
        let metadata = |authority: Option<Pubkey>| TokenMetadata {
            update_authority: authority.try_into().unwrap(),
            name: "T".to_string(),
            symbol: "T".to_string(),
            uri: "https://a".to_string(),
            ..Default::default()
        };

        assert!(ensure_update_authority(&mint_info(None, Some(metadata(Some(wallet)))), &wallet).is_ok());
        assert_eq!(
            ensure_update_authority(&mint_info(None, Some(metadata(Some(Pubkey::new_unique())))), &wallet)
                .unwrap_err()
                .kind,
            ErrorKind::AuthorityMismatch
        );
        assert_eq!(
            ensure_update_authority(&mint_info(None, Some(metadata(None))), &wallet)
                .unwrap_err()
                .kind,
            ErrorKind::AuthorityMismatch
        );
        assert_eq!(
            ensure_update_authority(&mint_info(None, None), &wallet).unwrap_err().kind,
            ErrorKind::AccountNotFound
        );
    }
}
