use anyhow::{anyhow, Result};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, rent::Rent, system_instruction};
use spl_token_2022::extension::{metadata_pointer, ExtensionType};
use spl_token_2022::state::Mint;
use spl_token_metadata_interface::state::{Field, TokenMetadata};

/// Account sizing for a Token-2022 mint that stores its metadata in-line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintLayout {
    /// Space allocated up front: base mint plus the metadata pointer extension.
    pub mint_space: usize,
    /// TLV bytes the metadata extension grows the account by on initialization.
    pub metadata_space: usize,
}

impl MintLayout {
    pub fn total_space(&self) -> usize {
        self.mint_space + self.metadata_space
    }

    /// Lamports that keep the account rent exempt after metadata is written.
    pub fn rent_lamports(&self) -> u64 {
        Rent::default().minimum_balance(self.total_space())
    }
}

/// Token-2022 instruction builders
pub struct TokenInstructions;

impl TokenInstructions {
    pub fn program_id() -> Pubkey {
        spl_token_2022::id()
    }

    pub fn mint_layout(mint: &Pubkey, name: &str, symbol: &str, uri: &str) -> Result<MintLayout> {
        let mint_space =
            ExtensionType::try_calculate_account_len::<Mint>(&[ExtensionType::MetadataPointer])
                .map_err(|e| anyhow!("Failed to size mint account: {}", e))?;

        let metadata = TokenMetadata {
            mint: *mint,
            name: name.to_string(),
            symbol: symbol.to_string(),
            uri: uri.to_string(),
            ..Default::default()
        };
        let metadata_space = metadata
            .tlv_size_of()
            .map_err(|e| anyhow!("Failed to size token metadata: {}", e))?;

        Ok(MintLayout { mint_space, metadata_space })
    }

    /// Instructions creating a mint whose metadata pointer targets itself, then
    /// writing name, symbol and URI. The mint account must co-sign.
    pub fn build_create_mint_with_metadata(
        payer: &Pubkey,
        mint: &Pubkey,
        decimals: u8,
        name: &str,
        symbol: &str,
        uri: &str,
    ) -> Result<Vec<Instruction>> {
        let program_id = Self::program_id();
        let layout = Self::mint_layout(mint, name, symbol, uri)?;

        let create_account = system_instruction::create_account(
            payer,
            mint,
            layout.rent_lamports(),
            layout.mint_space as u64,
            &program_id,
        );

        let init_pointer =
            metadata_pointer::instruction::initialize(&program_id, mint, Some(*payer), Some(*mint))
                .map_err(|e| anyhow!("Failed to build metadata pointer instruction: {}", e))?;

        let init_mint =
            spl_token_2022::instruction::initialize_mint(&program_id, mint, payer, None, decimals)
                .map_err(|e| anyhow!("Failed to build initialize mint instruction: {}", e))?;

        let init_metadata = spl_token_metadata_interface::instruction::initialize(
            &program_id,
            mint,
            payer,
            mint,
            payer,
            name.to_string(),
            symbol.to_string(),
            uri.to_string(),
        );

        Ok(vec![create_account, init_pointer, init_mint, init_metadata])
    }

    pub fn associated_account(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
        spl_associated_token_account::get_associated_token_address_with_program_id(
            owner,
            mint,
            &Self::program_id(),
        )
    }

    pub fn build_create_associated_account(payer: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Instruction {
        spl_associated_token_account::instruction::create_associated_token_account(
            payer,
            owner,
            mint,
            &Self::program_id(),
        )
    }

    /// Creates the associated account only if it is missing; safe to resend.
    pub fn build_create_associated_account_idempotent(
        payer: &Pubkey,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Instruction {
        spl_associated_token_account::instruction::create_associated_token_account_idempotent(
            payer,
            owner,
            mint,
            &Self::program_id(),
        )
    }

    pub fn build_mint_to(
        mint: &Pubkey,
        destination: &Pubkey,
        mint_authority: &Pubkey,
        amount: u64,
    ) -> Result<Instruction> {
        spl_token_2022::instruction::mint_to(
            &Self::program_id(),
            mint,
            destination,
            mint_authority,
            &[],
            amount,
        )
        .map_err(|e| anyhow!("Failed to build mint-to instruction: {}", e))
    }

    pub fn build_transfer_checked(
        source: &Pubkey,
        mint: &Pubkey,
        destination: &Pubkey,
        owner: &Pubkey,
        amount: u64,
        decimals: u8,
    ) -> Result<Instruction> {
        spl_token_2022::instruction::transfer_checked(
            &Self::program_id(),
            source,
            mint,
            destination,
            owner,
            &[],
            amount,
            decimals,
        )
        .map_err(|e| anyhow!("Failed to build transfer instruction: {}", e))
    }

    pub fn build_update_uri(metadata: &Pubkey, update_authority: &Pubkey, uri: &str) -> Instruction {
        spl_token_metadata_interface::instruction::update_field(
            &Self::program_id(),
            metadata,
            update_authority,
            Field::Uri,
            uri.to_string(),
        )
    }

    /// Lamports the metadata account must receive before its URI grows to `new_uri`.
    pub fn metadata_rent_top_up(
        current: &TokenMetadata,
        new_uri: &str,
        account_data_len: usize,
        account_lamports: u64,
    ) -> Result<u64> {
        let mut updated = current.clone();
        updated.update(Field::Uri, new_uri.to_string());

        let old_size = current
            .tlv_size_of()
            .map_err(|e| anyhow!("Failed to size token metadata: {}", e))?;
        let new_size = updated
            .tlv_size_of()
            .map_err(|e| anyhow!("Failed to size token metadata: {}", e))?;

        if new_size <= old_size {
            return Ok(0);
        }

        let new_len = account_data_len + (new_size - old_size);
        let required = Rent::default().minimum_balance(new_len);
        Ok(required.saturating_sub(account_lamports))
    }
}
