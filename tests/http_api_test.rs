// HTTP API Integration Tests
// Exercises the router end to end with in-memory collaborators

mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

use common::{Harness, MockChain, MockWallet};
use launchpad_gateway::router::build_router;
use launchpad_gateway::services::workflow::Feature;
use launchpad_gateway::services::ApprovalManager;
use launchpad_gateway::{AppState, Config};

fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("SOLANA_RPC_URL", "http://localhost:8899"),
        ("WALLET_PRIVATE_KEY", "unused-in-tests"),
        ("ENVIRONMENT", "test"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|value| value.to_string())).expect("config")
}

struct TestApp {
    router: Router,
    chain: Arc<MockChain>,
    wallet: Arc<MockWallet>,
    state: AppState,
}

fn app_from(harness: Harness) -> TestApp {
    let Harness {
        chain,
        wallet,
        launchpad,
        ..
    } = harness;
    let state = AppState {
        config: Arc::new(test_config()),
        launchpad: Arc::new(launchpad),
        metrics: PrometheusBuilder::new().build_recorder().handle(),
    };
    TestApp {
        router: build_router(state.clone()),
        chain,
        wallet,
        state,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_and_metrics() -> Result<()> {
    let app = app_from(Harness::new());

    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "test");

    let response = app.router.clone().oneshot(get("/metrics")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_mint_endpoint_returns_report() -> Result<()> {
    let harness = Harness::new();
    let mint = harness.add_token_2022_mint(6, "https://ipfs.test/ipfs/original");
    let app = app_from(harness);

    let (status, body) = send(
        &app.router,
        json_request(
            Method::POST,
            &format!("/api/v1/tokens/{}/mint", mint),
            json!({ "amount": 12.5 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["feature"], "mint");
    assert_eq!(body["status"], "succeeded");
    assert_eq!(body["result"]["amount"], "12500000");
    assert_eq!(body["steps"][0]["name"], "mint_tokens");
    assert!(body["steps"][0]["signature"].is_string());
    assert_eq!(app.chain.sends(), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_workflow_uses_error_envelope() -> Result<()> {
    let app = app_from(Harness::new());

    let (status, body) = send(
        &app.router,
        json_request(
            Method::POST,
            &format!("/api/v1/tokens/{}/transfer", solana_sdk::pubkey::Pubkey::new_unique()),
            json!({ "recipient": solana_sdk::pubkey::Pubkey::new_unique().to_string(), "amount": "1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);
    assert_eq!(body["error"]["kind"], "account_not_found");
    assert_eq!(body["error"]["code"], "RES_4001");
    assert_eq!(body["error"]["workflow"]["status"], "failed");
    assert!(body["request_id"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_user_rejection_is_conflict() -> Result<()> {
    let harness = Harness::new();
    let mint = harness.add_token_2022_mint(6, "https://ipfs.test/ipfs/original");
    harness.wallet.reject_next();
    let app = app_from(harness);

    let (status, body) = send(
        &app.router,
        json_request(
            Method::POST,
            &format!("/api/v1/tokens/{}/mint", mint),
            json!({ "amount": "1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "user_rejected");
    assert_eq!(body["error"]["step"], "mint_tokens");
    assert_eq!(app.wallet.signed_steps(), ["mint_tokens"]);
    Ok(())
}

#[tokio::test]
async fn test_request_validation_runs_before_workflow() -> Result<()> {
    let app = app_from(Harness::new());

    let (status, body) = send(
        &app.router,
        json_request(
            Method::POST,
            "/api/v1/tokens",
            json!({
                "name": "",
                "symbol": "GRID",
                "initial_supply": "100",
                "image": { "data": "iVBORw0K", "file_name": "a.png", "content_type": "image/png" }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "name");
    assert_eq!(app.chain.sends(), 0);

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/pools")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let (status, body) = send(&app.router, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VAL_3001");
    Ok(())
}

#[tokio::test]
async fn test_busy_session_gets_conflict() -> Result<()> {
    let harness = Harness::new();
    let mint = harness.add_token_2022_mint(6, "https://ipfs.test/ipfs/original");
    let app = app_from(harness);
    let _guard = app
        .state
        .launchpad
        .engine()
        .flights()
        .try_acquire("operator-1", Feature::Mint)
        .unwrap();

    let mut request = json_request(
        Method::POST,
        &format!("/api/v1/tokens/{}/mint", mint),
        json!({ "amount": "1" }),
    );
    request
        .headers_mut()
        .insert("x-session-id", "operator-1".parse().unwrap());
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "RES_4003");
    assert_eq!(app.chain.sends(), 0);
    Ok(())
}

#[tokio::test]
async fn test_token_info_and_wallet() -> Result<()> {
    let harness = Harness::new();
    let mint = harness.add_token_2022_mint(6, "https://ipfs.test/ipfs/original");
    let payer = harness.payer();
    let app = app_from(harness);

    let (status, body) = send(&app.router, get(&format!("/api/v1/tokens/{}", mint))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_mint_authority"], true);
    assert_eq!(body["data"]["metadata"]["symbol"], "GRID");

    let (status, body) = send(&app.router, get("/api/v1/wallet")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pubkey"], payer.to_string());

    let (status, _) = send(&app.router, get("/api/v1/tokens/not-a-mint")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_approvals_require_manual_mode() -> Result<()> {
    let app = app_from(Harness::new());

    let (status, _) = send(&app.router, get("/api/v1/approvals")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_unknown_approval_is_not_found() -> Result<()> {
    let harness = Harness::new();
    let Harness {
        chain,
        wallet,
        store,
        cpmm,
        launchpad,
    } = harness;
    let launchpad = launchpad.with_approvals(Arc::new(ApprovalManager::new()));
    let app = app_from(Harness {
        chain,
        wallet,
        store,
        cpmm,
        launchpad,
    });

    let (status, body) = send(&app.router, get("/api/v1/approvals")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, _) = send(
        &app.router,
        json_request(
            Method::POST,
            &format!("/api/v1/approvals/{}/approve", uuid::Uuid::new_v4()),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
