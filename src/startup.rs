//! Application startup and initialization logic

use anyhow::{anyhow, Result};
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::signature::Keypair;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::config::{ApprovalMode, Config};
use crate::services::blockchain::{KeyUtils, SolanaRpc};
use crate::services::features::FeeThresholds;
use crate::services::storage::StorageError;
use crate::services::workflow::DriverSettings;
use crate::services::{
    ApprovalManager, CpmmProgram, KeypairWallet, Launchpad, LaunchpadSettings, MetadataStore,
    PinataClient, RaydiumApiClient, WalletSigner,
};

/// Initialize application services and create the AppState.
pub async fn initialize_app(config: Config) -> Result<AppState> {
    config.validate()?;

    let metrics = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow!("Failed to install Prometheus recorder: {}", e))?;
    info!("Prometheus metrics initialized");

    let commitment = CommitmentLevel::from_str(&config.solana.commitment)
        .map_err(|e| anyhow!("Invalid SOLANA_COMMITMENT '{}': {:?}", config.solana.commitment, e))?;
    let rpc = Arc::new(SolanaRpc::new(
        config.solana.rpc_url.clone(),
        commitment,
        config.solana.skip_preflight,
    ));
    info!("Solana RPC client initialized ({:?})", config.solana.cluster);

    let keypair = load_wallet_keypair(&config)?;
    let mut wallet = KeypairWallet::new(keypair);
    let approvals = match config.wallet.approval_mode {
        ApprovalMode::Auto => None,
        ApprovalMode::Manual => {
            let approvals = Arc::new(ApprovalManager::new());
            wallet = wallet.with_approvals(
                approvals.clone(),
                Duration::from_secs(config.wallet.approval_timeout_secs),
            );
            Some(approvals)
        }
    };
    let wallet: Arc<dyn WalletSigner> = Arc::new(wallet);
    info!(
        "Wallet loaded: {} (approval mode {:?})",
        wallet.pubkey(),
        config.wallet.approval_mode
    );

    let store = initialize_storage(&config)?;

    let pool_configs = Arc::new(RaydiumApiClient::new(config.pools.raydium_api_url.clone())?);
    let cpmm = CpmmProgram {
        program_id: KeyUtils::parse_pubkey(&config.pools.cpmm_program_id)?,
        fee_account: KeyUtils::parse_pubkey(&config.pools.cpmm_fee_account)?,
    };

    let settings = LaunchpadSettings {
        driver: DriverSettings {
            confirm_timeout: config.confirm_timeout(),
            poll_interval: config.poll_interval(),
            compute_unit_price: config.workflow.compute_unit_price,
        },
        thresholds: FeeThresholds {
            launch_min_balance: config.workflow.launch_min_balance,
            fee_reserve: config.workflow.fee_reserve,
        },
        cpmm,
        ledger_ttl: config.ledger_ttl(),
    };

    let mut launchpad = Launchpad::new(rpc, wallet, store, pool_configs, settings);
    if let Some(approvals) = approvals {
        launchpad = launchpad.with_approvals(approvals);
    }
    info!("Launchpad initialized");

    Ok(AppState {
        config: Arc::new(config),
        launchpad: Arc::new(launchpad),
        metrics,
    })
}

fn load_wallet_keypair(config: &Config) -> Result<Keypair> {
    if let Some(path) = &config.wallet.keypair_path {
        return KeyUtils::load_keypair_from_file(path);
    }
    match &config.wallet.private_key {
        Some(key) => KeyUtils::keypair_from_base58(key),
        None => Err(anyhow!("No wallet keypair configured")),
    }
}

/// Pinata is optional; without it launches are refused during validation.
fn initialize_storage(config: &Config) -> Result<Option<Arc<dyn MetadataStore>>> {
    let Some(jwt) = config.storage.pinata_jwt.clone() else {
        warn!("PINATA_JWT not set. Token launches will be unavailable.");
        return Ok(None);
    };

    match PinataClient::new(
        jwt,
        config.storage.pinata_api_url.clone(),
        config.storage.pinata_gateway_url.clone(),
    ) {
        Ok(client) => {
            info!("Pinata storage initialized");
            Ok(Some(Arc::new(client)))
        }
        Err(StorageError::NotConfigured(reason)) => {
            warn!("Pinata storage disabled: {}", reason);
            Ok(None)
        }
        Err(e) => Err(anyhow!("Failed to initialize Pinata storage: {}", e)),
    }
}
