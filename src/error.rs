use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::services::workflow::{classify, ClassifiedError, EngineError, ErrorKind, WorkflowReport};

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Wallet and authority errors (2xxx)
    #[serde(rename = "AUTHZ_2001")]
    AuthorityMismatch,
    #[serde(rename = "AUTHZ_2002")]
    UserRejected,

    // Validation errors (3xxx)
    #[serde(rename = "VAL_3001")]
    InvalidInput,
    #[serde(rename = "VAL_3003")]
    InvalidFormat,

    // Resource errors (4xxx)
    #[serde(rename = "RES_4001")]
    NotFound,
    #[serde(rename = "RES_4003")]
    Conflict,

    // Business logic errors (5xxx)
    #[serde(rename = "BIZ_5001")]
    InsufficientBalance,

    // Blockchain errors (6xxx)
    #[serde(rename = "BC_6001")]
    BlockchainConnectionFailed,
    #[serde(rename = "BC_6002")]
    BlockchainTransactionFailed,
    #[serde(rename = "BC_6003")]
    TransactionTimeout,
    #[serde(rename = "BC_6007")]
    BlockhashExpired,

    // Internal errors (9xxx)
    #[serde(rename = "INT_9999")]
    InternalServerError,
}

impl ErrorCode {
    /// Get numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::AuthorityMismatch => 2001,
            ErrorCode::UserRejected => 2002,

            ErrorCode::InvalidInput => 3001,
            ErrorCode::InvalidFormat => 3003,

            ErrorCode::NotFound => 4001,
            ErrorCode::Conflict => 4003,

            ErrorCode::InsufficientBalance => 5001,

            ErrorCode::BlockchainConnectionFailed => 6001,
            ErrorCode::BlockchainTransactionFailed => 6002,
            ErrorCode::TransactionTimeout => 6003,
            ErrorCode::BlockhashExpired => 6007,

            ErrorCode::InternalServerError => 9999,
        }
    }

    /// Get user-friendly message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::AuthorityMismatch => "The connected wallet lacks the required authority",
            ErrorCode::UserRejected => "The signing request was rejected",
            ErrorCode::InvalidInput => "Invalid input provided",
            ErrorCode::InvalidFormat => "Invalid format provided",
            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::Conflict => "A conflicting request is already in progress",
            ErrorCode::InsufficientBalance => "Insufficient balance to complete this transaction",
            ErrorCode::BlockchainConnectionFailed => "Failed to connect to blockchain network",
            ErrorCode::BlockchainTransactionFailed => "Blockchain transaction failed",
            ErrorCode::TransactionTimeout => "Blockchain transaction timed out",
            ErrorCode::BlockhashExpired => "Transaction expired before it was confirmed",
            ErrorCode::InternalServerError => "An internal server error occurred",
        }
    }

    fn for_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidInput => ErrorCode::InvalidInput,
            ErrorKind::UserRejected => ErrorCode::UserRejected,
            ErrorKind::InsufficientFunds => ErrorCode::InsufficientBalance,
            ErrorKind::ExpiredBlockhash => ErrorCode::BlockhashExpired,
            ErrorKind::AuthorityMismatch => ErrorCode::AuthorityMismatch,
            ErrorKind::AccountNotFound => ErrorCode::NotFound,
            ErrorKind::NetworkError => ErrorCode::BlockchainConnectionFailed,
            ErrorKind::Unknown => ErrorCode::BlockchainTransactionFailed,
        }
    }
}

/// Structured error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub request_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub code_number: u16,
    pub message: String,
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Final state of the workflow that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Box<WorkflowReport>>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {field}")]
    ValidationWithField { field: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Classified(ClassifiedError),

    /// A workflow that ran and ended in `Failed`
    #[error("Workflow failed: {}", .0.last_error.as_ref().map(|e| e.message.as_str()).unwrap_or("unknown error"))]
    Workflow(Box<WorkflowReport>),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Classified(classify(&err))
    }
}

impl From<ClassifiedError> for ApiError {
    fn from(err: ClassifiedError) -> Self {
        ApiError::Classified(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors.field_errors().into_iter().next().map(|(field, errs)| {
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| format!("Invalid value for {}", field));
            (field.to_string(), message)
        });

        match first {
            Some((field, message)) => ApiError::ValidationWithField { field, message },
            None => ApiError::BadRequest(errors.to_string()),
        }
    }
}

impl ApiError {
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationWithField {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str) -> Self {
        ApiError::NotFound(format!("{} not found", resource))
    }

    fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            ApiError::Classified(error) => Some(error),
            ApiError::Workflow(report) => report.last_error.as_ref(),
            _ => None,
        }
    }

    /// Get error code
    fn error_code(&self) -> ErrorCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationWithField { .. } => ErrorCode::InvalidInput,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::Engine(EngineError::Busy(_)) => ErrorCode::Conflict,
            ApiError::Engine(EngineError::Interrupted(_)) => ErrorCode::InternalServerError,
            ApiError::Internal(_) => ErrorCode::InternalServerError,
            ApiError::Classified(_) | ApiError::Workflow(_) => match self.classified() {
                Some(error) if error.kind == ErrorKind::NetworkError && error.signature.is_some() => {
                    ErrorCode::TransactionTimeout
                }
                Some(error) => ErrorCode::for_kind(error.kind),
                None => ErrorCode::InternalServerError,
            },
        }
    }

    /// Get status code
    pub fn status_code(&self) -> StatusCode {
        match self.error_code() {
            ErrorCode::InvalidInput | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,
            ErrorCode::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::AuthorityMismatch => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict | ErrorCode::UserRejected => StatusCode::CONFLICT,
            ErrorCode::BlockchainConnectionFailed | ErrorCode::BlockhashExpired => StatusCode::BAD_GATEWAY,
            ErrorCode::TransactionTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::BlockchainTransactionFailed | ErrorCode::InternalServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(message) | ApiError::NotFound(message) | ApiError::Internal(message) => {
                message.clone()
            }
            ApiError::ValidationWithField { message, .. } => message.clone(),
            ApiError::Engine(err) => err.to_string(),
            ApiError::Classified(_) | ApiError::Workflow(_) => self
                .classified()
                .map(|error| error.message.clone())
                .unwrap_or_else(|| self.error_code().message().to_string()),
        }
    }

    /// Log error with appropriate level
    fn log_error(&self, request_id: &str) {
        match self.status_code() {
            status if status.is_server_error() => {
                error!(
                    request_id = %request_id,
                    error = %self,
                    "Server error occurred"
                );
            }
            status if status.is_client_error() => {
                warn!(
                    request_id = %request_id,
                    error = %self,
                    "Client error occurred"
                );
            }
            _ => {}
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let status = self.status_code();
        let code = self.error_code();

        self.log_error(&request_id);

        let classified = self.classified();
        let error = ErrorDetail {
            code,
            code_number: code.code(),
            message: self.message(),
            details: classified.and_then(|error| error.detail.clone()),
            field: match &self {
                ApiError::ValidationWithField { field, .. } => Some(field.clone()),
                _ => None,
            },
            kind: classified.map(|error| error.kind),
            retryable: classified.map(|error| error.retryable).unwrap_or(false),
            step: match &self {
                ApiError::Workflow(report) => report.step_name.clone(),
                _ => None,
            },
            signature: classified.and_then(|error| error.signature.clone()),
            workflow: match self {
                ApiError::Workflow(report) => Some(report),
                _ => None,
            },
        };

        let body = ErrorResponse {
            error,
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

/// Handle Axum JSON rejections and convert to structured API errors
pub fn handle_rejection(err: JsonRejection) -> ApiError {
    match err {
        JsonRejection::JsonDataError(e) => ApiError::BadRequest(format!("Invalid input provided: {}", e.body_text())),
        JsonRejection::JsonSyntaxError(_) => ApiError::BadRequest("Invalid JSON format".to_string()),
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::BadRequest("JSON content type required".to_string())
        }
        JsonRejection::BytesRejection(_) => ApiError::BadRequest("Invalid request body format".to_string()),
        _ => ApiError::BadRequest(format!("Invalid input provided: {}", err.body_text())),
    }
}
