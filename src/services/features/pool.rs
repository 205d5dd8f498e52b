//! Create a Raydium CPMM liquidity pool for a token pair

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{info, warn};

use super::{fingerprint, FeeThresholds};
use crate::services::blockchain::instructions::{
    CreatePoolParams, PoolInstructions, PoolSide, CREATE_POOL_COMPUTE_UNITS,
};
use crate::services::blockchain::{AccountReader, MintInfo, PdaUtils};
use crate::services::raydium::{CpmmProgram, PoolConfigSource};
use crate::services::workflow::{
    validator, ClassifiedError, ContextKey, ContextUpdates, ContextValue, Feature, StepAction,
    StepDescriptor, StepEffect, StepEnv, TransactionPlan, WorkflowContext, WorkflowDefinition,
};

#[derive(Debug, Clone)]
pub struct CreatePoolRequest {
    pub base_mint: String,
    pub quote_mint: String,
    pub base_amount: String,
    pub quote_amount: String,
    /// Wrap native SOL for a WSOL side instead of spending existing WSOL
    pub use_sol_balance: bool,
}

#[derive(Debug, Clone, Copy)]
struct PoolInputs {
    base_mint: Pubkey,
    quote_mint: Pubkey,
    base_amount: Decimal,
    quote_amount: Decimal,
    use_sol_balance: bool,
}

fn parse_inputs(request: &CreatePoolRequest) -> Result<PoolInputs, ClassifiedError> {
    let base_mint = validator::parse_address("token mint address", &request.base_mint)?;
    let quote_mint = validator::parse_address("token mint address", &request.quote_mint)?;
    if base_mint == quote_mint {
        return Err(ClassifiedError::invalid_input("Base and quote mints must differ"));
    }

    Ok(PoolInputs {
        base_mint,
        quote_mint,
        base_amount: validator::parse_amount(&request.base_amount)?,
        quote_amount: validator::parse_amount(&request.quote_amount)?,
        use_sol_balance: request.use_sol_balance,
    })
}

fn is_native(mint: &Pubkey) -> bool {
    *mint == spl_token::native_mint::id()
}

pub struct CreatePoolWorkflow {
    inputs: Result<PoolInputs, ClassifiedError>,
    fingerprint: String,
    program: CpmmProgram,
    configs: Arc<dyn PoolConfigSource>,
    thresholds: FeeThresholds,
    steps: Vec<Box<dyn StepDescriptor>>,
}

impl CreatePoolWorkflow {
    pub fn new(
        request: CreatePoolRequest,
        program: CpmmProgram,
        configs: Arc<dyn PoolConfigSource>,
        thresholds: FeeThresholds,
    ) -> Self {
        Self {
            inputs: parse_inputs(&request),
            fingerprint: fingerprint(&[
                request.base_mint.trim().as_bytes(),
                request.quote_mint.trim().as_bytes(),
                request.base_amount.trim().as_bytes(),
                request.quote_amount.trim().as_bytes(),
                &[u8::from(request.use_sol_balance)],
            ]),
            program,
            configs,
            thresholds,
            steps: vec![Box::new(InitializePool { program })],
        }
    }

    /// First fee tier offered by the API, or the index-0 tier when the API is unreachable.
    async fn fee_config(&self) -> Result<(Pubkey, u64)> {
        match self.configs.fee_configs().await {
            Ok(configs) => {
                let config = configs.into_iter().next().ok_or_else(|| {
                    ClassifiedError::account_not_found("No fee configurations available")
                })?;
                Ok((config.address()?, config.create_pool_fee))
            }
            Err(e) => {
                warn!("Falling back to default CPMM fee configuration: {}", e);
                let (address, _) = PdaUtils::find_amm_config(0, &self.program.program_id);
                Ok((address, 0))
            }
        }
    }

    /// Checks one side's funding; returns lamports to wrap for a native side.
    async fn check_side(
        env: &StepEnv<'_>,
        mint: &MintInfo,
        amount: u64,
        use_sol_balance: bool,
    ) -> Result<u64> {
        if is_native(&mint.address) && use_sol_balance {
            return Ok(amount);
        }

        let account = spl_associated_token_account::get_associated_token_address_with_program_id(
            &env.payer,
            &mint.address,
            &mint.program_id,
        );
        let available = AccountReader::token_balance(env.rpc, &account).await?.unwrap_or(0);
        validator::ensure_within_balance(amount, available)?;
        Ok(0)
    }
}

#[async_trait]
impl WorkflowDefinition for CreatePoolWorkflow {
    fn feature(&self) -> Feature {
        Feature::CreatePool
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }

    async fn validate(&self, env: &StepEnv<'_>) -> Result<ContextUpdates> {
        let inputs = *self.inputs.as_ref().map_err(Clone::clone)?;

        let base = validator::require_mint(env.rpc, &inputs.base_mint).await?;
        let quote = validator::require_mint(env.rpc, &inputs.quote_mint).await?;
        let base_amount = validator::to_base_units(inputs.base_amount, base.decimals)?;
        let quote_amount = validator::to_base_units(inputs.quote_amount, quote.decimals)?;

        let wrap = Self::check_side(env, &base, base_amount, inputs.use_sol_balance).await?
            + Self::check_side(env, &quote, quote_amount, inputs.use_sol_balance).await?;

        let (amm_config, creation_fee) = self.fee_config().await?;
        let required = self
            .thresholds
            .fee_reserve
            .saturating_add(creation_fee)
            .saturating_add(wrap);
        validator::ensure_fee_balance(env.rpc, &env.payer, required).await?;

        info!(
            base_mint = %base.address,
            quote_mint = %quote.address,
            amm_config = %amm_config,
            wrap_lamports = wrap,
            "pool creation validated"
        );

        Ok(vec![
            (ContextKey::WALLET, ContextValue::Address(env.payer)),
            (ContextKey::AMM_CONFIG, ContextValue::Address(amm_config)),
            (ContextKey::BASE_MINT, ContextValue::Address(base.address)),
            (ContextKey::QUOTE_MINT, ContextValue::Address(quote.address)),
            (ContextKey::BASE_TOKEN_PROGRAM, ContextValue::Address(base.program_id)),
            (ContextKey::QUOTE_TOKEN_PROGRAM, ContextValue::Address(quote.program_id)),
            (ContextKey::BASE_AMOUNT, ContextValue::Amount(base_amount)),
            (ContextKey::QUOTE_AMOUNT, ContextValue::Amount(quote_amount)),
            (ContextKey::WRAP_LAMPORTS, ContextValue::Amount(wrap)),
        ])
    }

    fn steps(&self) -> &[Box<dyn StepDescriptor>] {
        &self.steps
    }

    fn result(&self, context: &WorkflowContext, last_signature: Option<&str>) -> Value {
        let entry = |key: ContextKey| context.get(key).map(|value| value.to_json()).unwrap_or(Value::Null);
        json!({
            "pool_id": entry(ContextKey::POOL_ID),
            "lp_mint": entry(ContextKey::LP_MINT),
            "amm_config": entry(ContextKey::AMM_CONFIG),
            "signature": last_signature,
        })
    }
}

struct InitializePool {
    program: CpmmProgram,
}

impl InitializePool {
    fn params(&self, context: &WorkflowContext, creator: &Pubkey) -> Result<CreatePoolParams> {
        Ok(CreatePoolParams {
            program_id: self.program.program_id,
            fee_account: self.program.fee_account,
            amm_config: context.address(ContextKey::AMM_CONFIG)?,
            creator: *creator,
            side_a: PoolSide {
                mint: context.address(ContextKey::BASE_MINT)?,
                token_program: context.address(ContextKey::BASE_TOKEN_PROGRAM)?,
                amount: context.amount(ContextKey::BASE_AMOUNT)?,
            },
            side_b: PoolSide {
                mint: context.address(ContextKey::QUOTE_MINT)?,
                token_program: context.address(ContextKey::QUOTE_TOKEN_PROGRAM)?,
                amount: context.amount(ContextKey::QUOTE_AMOUNT)?,
            },
            // open immediately
            open_time: 0,
        })
    }

    fn addresses(&self, context: &WorkflowContext) -> Result<ContextUpdates> {
        let (token_0, token_1) = PoolInstructions::canonical_order(
            PoolSide {
                mint: context.address(ContextKey::BASE_MINT)?,
                token_program: Pubkey::default(),
                amount: 0,
            },
            PoolSide {
                mint: context.address(ContextKey::QUOTE_MINT)?,
                token_program: Pubkey::default(),
                amount: 0,
            },
        );
        let addresses = PoolInstructions::derive_addresses(
            &self.program.program_id,
            &context.address(ContextKey::AMM_CONFIG)?,
            &token_0.mint,
            &token_1.mint,
        );
        Ok(vec![
            (ContextKey::POOL_ID, ContextValue::Address(addresses.pool_state)),
            (ContextKey::LP_MINT, ContextValue::Address(addresses.lp_mint)),
        ])
    }
}

#[async_trait]
impl StepDescriptor for InitializePool {
    fn name(&self) -> &'static str {
        "create_pool"
    }

    fn outputs(&self) -> &'static [ContextKey] {
        &[ContextKey::POOL_ID, ContextKey::LP_MINT]
    }

    async fn probe(&self, context: &WorkflowContext, env: &StepEnv<'_>) -> Result<Option<ContextUpdates>> {
        let updates = self.addresses(context)?;
        let pool_state = updates
            .iter()
            .find(|(key, _)| *key == ContextKey::POOL_ID)
            .and_then(|(_, value)| value.as_address())
            .ok_or_else(|| anyhow::anyhow!("Pool address derivation failed"))?;

        if AccountReader::account_exists(env.rpc, &pool_state).await? {
            return Ok(Some(updates));
        }
        Ok(None)
    }

    fn build(&self, context: &WorkflowContext, payer: &Pubkey) -> Result<StepAction> {
        let params = self.params(context, payer)?;
        let wrap = context.amount(ContextKey::WRAP_LAMPORTS)?;

        let mut instructions = Vec::new();
        if wrap > 0 {
            instructions.extend(PoolInstructions::build_wrap_sol(payer, wrap)?);
        }
        let (initialize, _) = PoolInstructions::build_initialize(&params)?;
        instructions.push(initialize);

        Ok(StepAction::Transaction(TransactionPlan::new(instructions, CREATE_POOL_COMPUTE_UNITS)))
    }

    fn on_confirmed(&self, context: &WorkflowContext, _effect: &StepEffect) -> Result<ContextUpdates> {
        self.addresses(context)
    }
}
