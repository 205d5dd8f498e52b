use anyhow::{anyhow, Result};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_instruction, system_program, sysvar,
};

use crate::services::blockchain::utils::PdaUtils;

/// Anchor discriminator of the CPMM `initialize` instruction.
pub const CPMM_INITIALIZE_DISCRIMINATOR: [u8; 8] = [175, 175, 109, 31, 13, 152, 155, 237];

/// One side of a new pool: the mint, the program that owns it, and the deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSide {
    pub mint: Pubkey,
    pub token_program: Pubkey,
    pub amount: u64,
}

#[derive(Debug, Clone)]
pub struct CreatePoolParams {
    pub program_id: Pubkey,
    pub fee_account: Pubkey,
    pub amm_config: Pubkey,
    pub creator: Pubkey,
    pub side_a: PoolSide,
    pub side_b: PoolSide,
    pub open_time: u64,
}

/// Addresses the pool program derives for a mint pair, with the pair in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolAddresses {
    pub pool_state: Pubkey,
    pub authority: Pubkey,
    pub lp_mint: Pubkey,
    pub token_0_vault: Pubkey,
    pub token_1_vault: Pubkey,
    pub observation_state: Pubkey,
}

/// Raydium CPMM instruction assembly
pub struct PoolInstructions;

impl PoolInstructions {
    /// Orders the two sides so that token_0's mint sorts below token_1's.
    pub fn canonical_order(a: PoolSide, b: PoolSide) -> (PoolSide, PoolSide) {
        if a.mint.to_bytes() <= b.mint.to_bytes() {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn derive_addresses(
        program_id: &Pubkey,
        amm_config: &Pubkey,
        token_0_mint: &Pubkey,
        token_1_mint: &Pubkey,
    ) -> PoolAddresses {
        let (pool_state, _) = PdaUtils::find_pool_state(amm_config, token_0_mint, token_1_mint, program_id);
        let (authority, _) = PdaUtils::find_pool_authority(program_id);
        let (lp_mint, _) = PdaUtils::find_lp_mint(&pool_state, program_id);
        let (token_0_vault, _) = PdaUtils::find_pool_vault(&pool_state, token_0_mint, program_id);
        let (token_1_vault, _) = PdaUtils::find_pool_vault(&pool_state, token_1_mint, program_id);
        let (observation_state, _) = PdaUtils::find_observation_state(&pool_state, program_id);

        PoolAddresses {
            pool_state,
            authority,
            lp_mint,
            token_0_vault,
            token_1_vault,
            observation_state,
        }
    }

    pub fn build_initialize(params: &CreatePoolParams) -> Result<(Instruction, PoolAddresses)> {
        if params.side_a.mint == params.side_b.mint {
            return Err(anyhow!("Pool sides must use different mints"));
        }
        if params.side_a.amount == 0 || params.side_b.amount == 0 {
            return Err(anyhow!("Token amounts must be greater than 0"));
        }

        let (token_0, token_1) = Self::canonical_order(params.side_a, params.side_b);
        let addresses =
            Self::derive_addresses(&params.program_id, &params.amm_config, &token_0.mint, &token_1.mint);

        let creator_token_0 = spl_associated_token_account::get_associated_token_address_with_program_id(
            &params.creator,
            &token_0.mint,
            &token_0.token_program,
        );
        let creator_token_1 = spl_associated_token_account::get_associated_token_address_with_program_id(
            &params.creator,
            &token_1.mint,
            &token_1.token_program,
        );
        let creator_lp_token = spl_associated_token_account::get_associated_token_address_with_program_id(
            &params.creator,
            &addresses.lp_mint,
            &spl_token::id(),
        );

        let accounts = vec![
            AccountMeta::new(params.creator, true),
            AccountMeta::new_readonly(params.amm_config, false),
            AccountMeta::new_readonly(addresses.authority, false),
            AccountMeta::new(addresses.pool_state, false),
            AccountMeta::new_readonly(token_0.mint, false),
            AccountMeta::new_readonly(token_1.mint, false),
            AccountMeta::new(addresses.lp_mint, false),
            AccountMeta::new(creator_token_0, false),
            AccountMeta::new(creator_token_1, false),
            AccountMeta::new(creator_lp_token, false),
            AccountMeta::new(addresses.token_0_vault, false),
            AccountMeta::new(addresses.token_1_vault, false),
            AccountMeta::new(params.fee_account, false),
            AccountMeta::new(addresses.observation_state, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(token_0.token_program, false),
            AccountMeta::new_readonly(token_1.token_program, false),
            AccountMeta::new_readonly(spl_associated_token_account::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ];

        let mut data = Vec::with_capacity(8 + 24);
        data.extend_from_slice(&CPMM_INITIALIZE_DISCRIMINATOR);
        data.extend_from_slice(&token_0.amount.to_le_bytes());
        data.extend_from_slice(&token_1.amount.to_le_bytes());
        data.extend_from_slice(&params.open_time.to_le_bytes());

        let instruction = Instruction {
            program_id: params.program_id,
            accounts,
            data,
        };

        Ok((instruction, addresses))
    }

    /// Moves `lamports` of SOL into the owner's wrapped-SOL account, creating it when absent.
    pub fn build_wrap_sol(owner: &Pubkey, lamports: u64) -> Result<Vec<Instruction>> {
        let native_mint = spl_token::native_mint::id();
        let wsol_account = spl_associated_token_account::get_associated_token_address_with_program_id(
            owner,
            &native_mint,
            &spl_token::id(),
        );

        let sync = spl_token::instruction::sync_native(&spl_token::id(), &wsol_account)
            .map_err(|e| anyhow!("Failed to build sync-native instruction: {}", e))?;

        Ok(vec![
            spl_associated_token_account::instruction::create_associated_token_account_idempotent(
                owner,
                owner,
                &native_mint,
                &spl_token::id(),
            ),
            system_instruction::transfer(owner, &wsol_account, lamports),
            sync,
        ])
    }
}
