//! Operator endpoints for manual signing approval

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{ApiError, Result};
use crate::handlers::response::{ApiResponse, ListResponse};
use crate::services::wallet::{ApprovalDecision, PendingApproval};
use crate::services::ApprovalManager;

#[derive(Debug, Serialize)]
pub struct ApprovalAnswer {
    pub id: Uuid,
    pub approved: bool,
}

fn manager(state: &AppState) -> Result<&Arc<ApprovalManager>> {
    state
        .launchpad
        .approvals()
        .ok_or_else(|| ApiError::NotFound("Manual approval mode is not enabled".to_string()))
}

/// GET /api/v1/approvals
pub async fn list_approvals(State(state): State<AppState>) -> Result<Json<ListResponse<PendingApproval>>> {
    let pending = manager(&state)?.list_pending();
    Ok(Json(ListResponse::new(pending)))
}

/// POST /api/v1/approvals/{id}/approve
pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ApprovalAnswer>>> {
    answer(&state, id, ApprovalDecision::Approved)
}

/// POST /api/v1/approvals/{id}/reject
pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ApprovalAnswer>>> {
    answer(&state, id, ApprovalDecision::Rejected)
}

fn answer(state: &AppState, id: Uuid, decision: ApprovalDecision) -> Result<Json<ApiResponse<ApprovalAnswer>>> {
    if !manager(state)?.respond(id, decision) {
        return Err(ApiError::not_found("Approval request"));
    }

    let approved = decision == ApprovalDecision::Approved;
    let message = if approved { "Signature approved" } else { "Signature rejected" };
    Ok(Json(ApiResponse::success_with_message(
        ApprovalAnswer { id, approved },
        message,
    )))
}
