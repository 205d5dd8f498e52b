//! Entry point used by the HTTP handlers: builds feature workflows and runs them

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::services::blockchain::instructions::TokenInstructions;
use crate::services::blockchain::{AccountReader, ChainRpc, TokenMath};
use crate::services::features::{
    CreatePoolRequest, CreatePoolWorkflow, FeeThresholds, LaunchRequest, LaunchWorkflow, MintRequest,
    MintWorkflow, TransferRequest, TransferWorkflow, UpdateMetadataRequest, UpdateMetadataWorkflow,
};
use crate::services::raydium::{CpmmProgram, PoolConfigSource};
use crate::services::storage::MetadataStore;
use crate::services::wallet::{ApprovalManager, WalletSigner};
use crate::services::workflow::{
    validator, DriverSettings, EngineError, ResumeLedger, WorkflowDefinition, WorkflowEngine, WorkflowReport,
};

#[derive(Debug, Clone, Copy)]
pub struct LaunchpadSettings {
    pub driver: DriverSettings,
    pub thresholds: FeeThresholds,
    pub cpmm: CpmmProgram,
    /// How long progress of a failed run stays resumable
    pub ledger_ttl: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenMetadataView {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

/// Mint state as seen by the connected wallet
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub mint: String,
    pub program_id: String,
    pub is_token_2022: bool,
    pub decimals: u8,
    pub supply: String,
    pub ui_supply: Decimal,
    pub mint_authority: Option<String>,
    pub update_authority: Option<String>,
    pub metadata: Option<TokenMetadataView>,
    pub wallet_balance: String,
    pub ui_wallet_balance: Decimal,
    pub is_mint_authority: bool,
    pub is_update_authority: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletInfo {
    pub pubkey: String,
    pub lamports: u64,
    pub sol: f64,
    pub manual_approval: bool,
}

pub struct Launchpad {
    engine: Arc<WorkflowEngine>,
    rpc: Arc<dyn ChainRpc>,
    wallet: Arc<dyn WalletSigner>,
    storage_configured: bool,
    pool_configs: Arc<dyn PoolConfigSource>,
    approvals: Option<Arc<ApprovalManager>>,
    settings: LaunchpadSettings,
}

impl Launchpad {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        wallet: Arc<dyn WalletSigner>,
        store: Option<Arc<dyn MetadataStore>>,
        pool_configs: Arc<dyn PoolConfigSource>,
        settings: LaunchpadSettings,
    ) -> Self {
        Self {
            storage_configured: store.is_some(),
            engine: Arc::new(WorkflowEngine::new(
                rpc.clone(),
                wallet.clone(),
                store,
                settings.driver,
                ResumeLedger::new(settings.ledger_ttl),
            )),
            rpc,
            wallet,
            pool_configs,
            approvals: None,
            settings,
        }
    }

    /// Exposes pending signing requests of a manually approved wallet.
    pub fn with_approvals(mut self, approvals: Arc<ApprovalManager>) -> Self {
        self.approvals = Some(approvals);
        self
    }

    pub fn approvals(&self) -> Option<&Arc<ApprovalManager>> {
        self.approvals.as_ref()
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn wallet_pubkey(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    pub async fn launch(&self, session_id: &str, request: LaunchRequest) -> Result<WorkflowReport, EngineError> {
        let workflow = LaunchWorkflow::new(request, self.storage_configured, self.settings.thresholds);
        self.run(session_id, Box::new(workflow)).await
    }

    pub async fn mint(&self, session_id: &str, request: MintRequest) -> Result<WorkflowReport, EngineError> {
        let workflow = MintWorkflow::new(request, self.settings.thresholds);
        self.run(session_id, Box::new(workflow)).await
    }

    pub async fn transfer(&self, session_id: &str, request: TransferRequest) -> Result<WorkflowReport, EngineError> {
        let workflow = TransferWorkflow::new(request, self.settings.thresholds);
        self.run(session_id, Box::new(workflow)).await
    }

    pub async fn update_metadata(
        &self,
        session_id: &str,
        request: UpdateMetadataRequest,
    ) -> Result<WorkflowReport, EngineError> {
        let workflow = UpdateMetadataWorkflow::new(request, self.settings.thresholds);
        self.run(session_id, Box::new(workflow)).await
    }

    pub async fn create_pool(
        &self,
        session_id: &str,
        request: CreatePoolRequest,
    ) -> Result<WorkflowReport, EngineError> {
        let workflow = CreatePoolWorkflow::new(
            request,
            self.settings.cpmm,
            self.pool_configs.clone(),
            self.settings.thresholds,
        );
        self.run(session_id, Box::new(workflow)).await
    }

    /// Runs on its own task so a dropped request cannot cut a workflow off
    /// between broadcast and confirmation.
    async fn run(
        &self,
        session_id: &str,
        workflow: Box<dyn WorkflowDefinition>,
    ) -> Result<WorkflowReport, EngineError> {
        let engine = self.engine.clone();
        let session_id = session_id.to_string();
        let task = tokio::spawn(async move {
            engine
                .run(&session_id, workflow.as_ref())
                .await
                .map(|state| state.report())
        });

        task.await.map_err(|e| EngineError::Interrupted(e.to_string()))?
    }

    pub async fn token_info(&self, mint_address: &str) -> Result<TokenInfo> {
        let mint_pubkey = validator::parse_address("mint address", mint_address)?;
        let mint = validator::require_mint(self.rpc.as_ref(), &mint_pubkey).await?;
        let wallet = self.wallet.pubkey();

        let account = spl_associated_token_account::get_associated_token_address_with_program_id(
            &wallet,
            &mint.address,
            &mint.program_id,
        );
        let balance = AccountReader::token_balance(self.rpc.as_ref(), &account)
            .await?
            .unwrap_or(0);
        let update_authority = mint.update_authority();

        info!("Token info requested for {}", mint.address);

        Ok(TokenInfo {
            mint: mint.address.to_string(),
            program_id: mint.program_id.to_string(),
            is_token_2022: mint.program_id == TokenInstructions::program_id(),
            decimals: mint.decimals,
            supply: mint.supply.to_string(),
            ui_supply: TokenMath::from_base_units(mint.supply, mint.decimals),
            mint_authority: mint.mint_authority.map(|a| a.to_string()),
            update_authority: update_authority.map(|a| a.to_string()),
            metadata: mint.metadata.as_ref().map(|metadata| TokenMetadataView {
                name: metadata.name.clone(),
                symbol: metadata.symbol.clone(),
                uri: metadata.uri.clone(),
            }),
            wallet_balance: balance.to_string(),
            ui_wallet_balance: TokenMath::from_base_units(balance, mint.decimals),
            is_mint_authority: mint.mint_authority == Some(wallet),
            is_update_authority: update_authority == Some(wallet),
        })
    }

    pub async fn wallet_info(&self) -> Result<WalletInfo> {
        let pubkey = self.wallet.pubkey();
        let lamports = self.rpc.get_balance(&pubkey).await?;
        Ok(WalletInfo {
            pubkey: pubkey.to_string(),
            lamports,
            sol: TokenMath::lamports_to_sol(lamports),
            manual_approval: self.approvals.is_some(),
        })
    }
}
