use axum::{
    extract::{Path, State},
    response::Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::app_state::AppState;
use crate::error::{ApiError, Result};
use crate::handlers::extractors::{amount_string, SessionId, ValidatedJson};
use crate::handlers::response::{workflow_response, ApiResponse};
use crate::services::features::{LaunchRequest, MintRequest, TransferRequest, UpdateMetadataRequest};
use crate::services::storage::FileUpload;
use crate::services::workflow::WorkflowReport;
use crate::services::TokenInfo;

/// Token image sent inline as base64
#[derive(Debug, Deserialize, Validate)]
pub struct ImagePayload {
    #[validate(length(min = 1, message = "Image is required"))]
    pub data: String,
    #[validate(length(min = 1, max = 200))]
    pub file_name: String,
    #[validate(length(min = 1, max = 100))]
    pub content_type: String,
}

impl ImagePayload {
    fn decode(self) -> Result<FileUpload> {
        // Data URLs are accepted as-is from browser uploads
        let encoded = match self.data.split_once(";base64,") {
            Some((_, rest)) => rest,
            None => self.data.as_str(),
        };
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| ApiError::validation_field("image.data", "Image data must be base64 encoded"))?;

        Ok(FileUpload {
            bytes,
            file_name: self.file_name,
            content_type: self.content_type,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LaunchTokenRequest {
    #[validate(length(min = 1, max = 32, message = "Token name must be 1-32 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 10, message = "Token symbol must be 1-10 characters"))]
    pub symbol: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(range(max = 9, message = "Decimals must be at most 9"))]
    pub decimals: Option<u8>,
    #[serde(deserialize_with = "amount_string")]
    pub initial_supply: String,
    #[validate(nested)]
    pub image: ImagePayload,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MintTokensRequest {
    #[serde(deserialize_with = "amount_string")]
    #[validate(length(min = 1, message = "Amount is required"))]
    pub amount: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferTokensRequest {
    #[validate(length(min = 32, max = 44, message = "Invalid recipient address format"))]
    pub recipient: String,
    #[serde(deserialize_with = "amount_string")]
    #[validate(length(min = 1, message = "Amount is required"))]
    pub amount: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMetadataUriRequest {
    #[validate(length(min = 1, max = 200, message = "Metadata URI must be 1-200 characters"))]
    pub uri: String,
}

/// Launch a Token-2022 mint with on-chain metadata
/// POST /api/v1/tokens
pub async fn launch_token(
    State(state): State<AppState>,
    session: SessionId,
    ValidatedJson(payload): ValidatedJson<LaunchTokenRequest>,
) -> Result<Json<WorkflowReport>> {
    info!("Launch requested for {} ({})", payload.name, payload.symbol);

    let request = LaunchRequest {
        name: payload.name,
        symbol: payload.symbol,
        description: payload.description,
        decimals: payload.decimals,
        initial_supply: payload.initial_supply,
        image: payload.image.decode()?,
    };

    workflow_response(state.launchpad.launch(&session.0, request).await)
}

/// Mint additional supply to the wallet
/// POST /api/v1/tokens/{mint}/mint
pub async fn mint_tokens(
    State(state): State<AppState>,
    session: SessionId,
    Path(mint): Path<String>,
    ValidatedJson(payload): ValidatedJson<MintTokensRequest>,
) -> Result<Json<WorkflowReport>> {
    let request = MintRequest {
        mint_address: mint,
        amount: payload.amount,
    };

    workflow_response(state.launchpad.mint(&session.0, request).await)
}

/// Transfer tokens from the wallet to a recipient
/// POST /api/v1/tokens/{mint}/transfer
pub async fn transfer_tokens(
    State(state): State<AppState>,
    session: SessionId,
    Path(mint): Path<String>,
    ValidatedJson(payload): ValidatedJson<TransferTokensRequest>,
) -> Result<Json<WorkflowReport>> {
    let request = TransferRequest {
        mint_address: mint,
        recipient: payload.recipient,
        amount: payload.amount,
    };

    workflow_response(state.launchpad.transfer(&session.0, request).await)
}

/// PUT /api/v1/tokens/{mint}/metadata/uri
pub async fn update_metadata_uri(
    State(state): State<AppState>,
    session: SessionId,
    Path(mint): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateMetadataUriRequest>,
) -> Result<Json<WorkflowReport>> {
    let request = UpdateMetadataRequest {
        mint_address: mint,
        metadata_uri: payload.uri,
    };

    workflow_response(state.launchpad.update_metadata(&session.0, request).await)
}

/// Mint info with the wallet's balance and authority flags
/// GET /api/v1/tokens/{mint}
pub async fn get_token_info(
    State(state): State<AppState>,
    Path(mint): Path<String>,
) -> Result<Json<ApiResponse<TokenInfo>>> {
    let info = state.launchpad.token_info(&mint).await?;
    Ok(Json(ApiResponse::success(info)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(data: &str) -> ImagePayload {
        ImagePayload {
            data: data.to_string(),
            file_name: "logo.png".to_string(),
            content_type: "image/png".to_string(),
        }
    }

    #[test]
    fn test_image_decodes_plain_and_data_url() {
        let plain = image("iVBORw0K").decode().unwrap();
        let data_url = image("data:image/png;base64,iVBORw0K").decode().unwrap();
        assert_eq!(plain.bytes, data_url.bytes);
        assert_eq!(plain.file_name, "logo.png");
    }

    #[test]
    fn test_image_rejects_invalid_base64() {
        assert!(matches!(
            image("not base64!").decode(),
            Err(ApiError::ValidationWithField { .. })
        ));
    }

    #[test]
    fn test_launch_request_rules() {
        let request: LaunchTokenRequest = serde_json::from_value(serde_json::json!({
            "name": "",
            "symbol": "GRID",
            "initial_supply": 1000,
            "image": {"data": "iVBORw0K", "file_name": "a.png", "content_type": "image/png"}
        }))
        .unwrap();
        assert!(request.validate().is_err());
        assert_eq!(request.initial_supply, "1000");
    }
}
