//! Common response types and helpers for API handlers.

use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::services::workflow::{EngineError, WorkflowReport, WorkflowStatus};

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response with data
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Create a successful response with message
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

/// Simple list response without pagination
#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub items: Vec<T>,
    pub count: usize,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        let count = items.len();
        Self { items, count }
    }
}

/// Succeeded reports are returned as-is; failed ones become the error envelope.
pub fn workflow_response(outcome: Result<WorkflowReport, EngineError>) -> Result<Json<WorkflowReport>, ApiError> {
    let report = outcome?;
    match report.status {
        WorkflowStatus::Succeeded => Ok(Json(report)),
        _ => Err(ApiError::Workflow(Box::new(report))),
    }
}
