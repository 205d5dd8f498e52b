use solana_sdk::pubkey::Pubkey;

/// Raydium CPMM program-derived addresses
pub struct PdaUtils;

impl PdaUtils {
    pub fn find_amm_config(index: u16, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[b"amm_config", &index.to_be_bytes()], program_id)
    }

    pub fn find_pool_authority(program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[b"vault_and_lp_mint_auth_seed"], program_id)
    }

    pub fn find_pool_state(
        amm_config: &Pubkey,
        token_0_mint: &Pubkey,
        token_1_mint: &Pubkey,
        program_id: &Pubkey,
    ) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[
                b"pool",
                amm_config.as_ref(),
                token_0_mint.as_ref(),
                token_1_mint.as_ref(),
            ],
            program_id,
        )
    }

    pub fn find_lp_mint(pool_state: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[b"pool_lp_mint", pool_state.as_ref()], program_id)
    }

    pub fn find_pool_vault(pool_state: &Pubkey, mint: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[b"pool_vault", pool_state.as_ref(), mint.as_ref()], program_id)
    }

    pub fn find_observation_state(pool_state: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[b"observation", pool_state.as_ref()], program_id)
    }
}
