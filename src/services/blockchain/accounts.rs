use anyhow::{anyhow, Result};
use solana_sdk::{account::Account, pubkey::Pubkey};
use spl_token_2022::extension::{BaseStateWithExtensions, StateWithExtensions};
use spl_token_2022::state::{Account as TokenAccount, Mint};
use spl_token_metadata_interface::state::TokenMetadata;

use super::rpc::ChainRpc;

/// Decoded view of a token mint, classic or Token-2022.
#[derive(Debug, Clone, PartialEq)]
pub struct MintInfo {
    pub address: Pubkey,
    /// Program that owns the mint account
    pub program_id: Pubkey,
    pub decimals: u8,
    pub supply: u64,
    pub mint_authority: Option<Pubkey>,
    /// In-line metadata, only present on Token-2022 mints that carry the extension
    pub metadata: Option<TokenMetadata>,
    pub data_len: usize,
    pub lamports: u64,
}

impl MintInfo {
    pub fn update_authority(&self) -> Option<Pubkey> {
        self.metadata
            .as_ref()
            .and_then(|metadata| Option::<Pubkey>::from(metadata.update_authority))
    }
}

pub struct AccountReader;

impl AccountReader {
    pub fn is_token_program(program_id: &Pubkey) -> bool {
        *program_id == spl_token::id() || *program_id == spl_token_2022::id()
    }

    pub fn parse_mint(address: &Pubkey, account: &Account) -> Result<MintInfo> {
        if !Self::is_token_program(&account.owner) {
            return Err(anyhow!("Account {} is not a token mint", address));
        }

        // Token-2022 state parsing also accepts classic mints, which have no extensions.
        let state = StateWithExtensions::<Mint>::unpack(&account.data)
            .map_err(|e| anyhow!("Failed to decode mint {}: {}", address, e))?;

        let metadata = if account.owner == spl_token_2022::id() {
            state.get_variable_len_extension::<TokenMetadata>().ok()
        } else {
            None
        };

        Ok(MintInfo {
            address: *address,
            program_id: account.owner,
            decimals: state.base.decimals,
            supply: state.base.supply,
            mint_authority: Option::<Pubkey>::from(state.base.mint_authority),
            metadata,
            data_len: account.data.len(),
            lamports: account.lamports,
        })
    }

    pub fn parse_token_amount(address: &Pubkey, account: &Account) -> Result<u64> {
        let state = StateWithExtensions::<TokenAccount>::unpack(&account.data)
            .map_err(|e| anyhow!("Failed to decode token account {}: {}", address, e))?;
        Ok(state.base.amount)
    }

    pub async fn fetch_mint(rpc: &dyn ChainRpc, address: &Pubkey) -> Result<Option<MintInfo>> {
        match rpc.get_account(address).await? {
            Some(account) => Self::parse_mint(address, &account).map(Some),
            None => Ok(None),
        }
    }

    /// Balance held in a token account; `None` when the account does not exist.
    pub async fn token_balance(rpc: &dyn ChainRpc, token_account: &Pubkey) -> Result<Option<u64>> {
        match rpc.get_account(token_account).await? {
            Some(account) => Self::parse_token_amount(token_account, &account).map(Some),
            None => Ok(None),
        }
    }

    pub async fn account_exists(rpc: &dyn ChainRpc, pubkey: &Pubkey) -> Result<bool> {
        Ok(rpc.get_account(pubkey).await?.is_some())
    }
}
