use axum::{extract::State, response::Json};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::app_state::AppState;
use crate::error::Result;
use crate::handlers::extractors::{amount_string, SessionId, ValidatedJson};
use crate::handlers::response::workflow_response;
use crate::services::features::CreatePoolRequest;
use crate::services::workflow::WorkflowReport;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePoolBody {
    #[validate(length(min = 32, max = 44, message = "Invalid token mint address format"))]
    pub base_mint: String,
    #[validate(length(min = 32, max = 44, message = "Invalid token mint address format"))]
    pub quote_mint: String,
    #[serde(deserialize_with = "amount_string")]
    pub base_amount: String,
    #[serde(deserialize_with = "amount_string")]
    pub quote_amount: String,
    /// Wrap native SOL from the wallet balance for a WSOL side
    #[serde(default = "default_use_sol_balance")]
    pub use_sol_balance: bool,
}

fn default_use_sol_balance() -> bool {
    true
}

/// Create a Raydium CPMM pool seeded with initial liquidity
/// POST /api/v1/pools
pub async fn create_pool(
    State(state): State<AppState>,
    session: SessionId,
    ValidatedJson(payload): ValidatedJson<CreatePoolBody>,
) -> Result<Json<WorkflowReport>> {
    info!("Pool creation requested: {} / {}", payload.base_mint, payload.quote_mint);

    let request = CreatePoolRequest {
        base_mint: payload.base_mint,
        quote_mint: payload.quote_mint,
        base_amount: payload.base_amount,
        quote_amount: payload.quote_amount,
        use_sol_balance: payload.use_sol_balance,
    };

    workflow_response(state.launchpad.create_pool(&session.0, request).await)
}
