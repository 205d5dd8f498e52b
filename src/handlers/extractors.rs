//! Common extractors for API handlers.

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use validator::Validate;

use crate::app_state::AppState;
use crate::error::{handle_rejection, ApiError};

pub const SESSION_HEADER: &str = "x-session-id";
const MAX_SESSION_ID_LEN: usize = 128;

/// Caller identity used to serialize workflows: the `x-session-id` header,
/// or the wallet's public key when the header is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl FromRequestParts<AppState> for SessionId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(SESSION_HEADER) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| ApiError::validation_field(SESSION_HEADER, "Session id must be ASCII"))?
                    .trim()
                    .to_string(),
            ),
            None => None,
        };

        match header.filter(|id| !id.is_empty()) {
            Some(id) if id.len() > MAX_SESSION_ID_LEN => Err(ApiError::validation_field(
                SESSION_HEADER,
                format!("Session id must be at most {} characters", MAX_SESSION_ID_LEN),
            )),
            Some(id) => Ok(SessionId(id)),
            None => Ok(SessionId(state.launchpad.wallet_pubkey().to_string())),
        }
    }
}

/// JSON body that must pass its `validator` rules before reaching a handler.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(handle_rejection)?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Accepts amounts sent either as JSON strings or numbers, keeping the decimal text.
pub fn amount_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}
