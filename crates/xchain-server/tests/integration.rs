use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use xchain_engine::{Reconciler, ReconcilerDeps};
use xchain_gateway::mock::MockGatewayClient;
use xchain_server::{app_router, AppState};
use xchain_store::InMemoryRecordStore;
use xchain_swap::mock::MockSwapRouterClient;

const BODY_LIMIT: usize = usize::MAX;
const TOKEN: &str = "Bearer user-1:0xwallet";

fn test_app() -> axum::Router {
    let store: Arc<dyn xchain_store::RecordStore> = Arc::new(InMemoryRecordStore::new());
    let gateway: Arc<dyn xchain_gateway::GatewayClient> = Arc::new(MockGatewayClient::new());
    let swap: Arc<dyn xchain_swap::SwapRouterClient> = Arc::new(MockSwapRouterClient::new());

    let reconciler = Arc::new(Reconciler::new(ReconcilerDeps {
        store: Arc::clone(&store),
        gateway: Arc::clone(&gateway),
        swap: Arc::clone(&swap),
        signer: "0xsigner".to_string(),
        delegate_priv_key: "delegate-priv".to_string(),
        relayer_priv_key: "relayer-priv".to_string(),
    }));

    let state = AppState {
        store,
        gateway,
        swap,
        reconciler,
        signer: "0xsigner".to_string(),
        delegate_address: "0xdelegate".to_string(),
        delegate_private_key: "delegate-priv".to_string(),
        relayer_private_key: "relayer-priv".to_string(),
    };
    app_router(state)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn collect_endpoint_rejects_missing_bearer_token() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/operations/collect")
                .header("content-type", "application/json")
                .body(Body::from(json!({"sources": ["base"]}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn collect_endpoint_rejects_zero_balances() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/operations/collect")
                .header("content-type", "application/json")
                .header("authorization", TOKEN)
                .body(Body::from(json!({"sources": ["base"], "destination_chain": null}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "BAD_REQUEST");
}

#[tokio::test]
async fn send_then_get_operation_round_trips_through_the_store() {
    let app = test_app();

    let send_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/operations/send")
                .header("content-type", "application/json")
                .header("authorization", TOKEN)
                .body(Body::from(
                    json!({
                        "recipients": [
                            {"chain": "ethereum", "amount": "10.000000", "address": "0xrecipient"}
                        ],
                        "source_chain": "ethereum"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(send_response.status(), StatusCode::OK);
    let plan = json_body(send_response).await;
    let operation_id = plan["operation"]["id"].as_str().unwrap().to_string();
    assert_eq!(plan["operation"]["operation_type"], "SEND");

    let get_response = app
        .oneshot(
            Request::builder()
                .uri(format!("/v1/operations/{operation_id}"))
                .header("authorization", TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);
    let detail = json_body(get_response).await;
    assert_eq!(detail["operation"]["id"], operation_id);
}

#[tokio::test]
async fn get_operation_rejects_other_users_operation() {
    let app = test_app();

    let send_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/operations/send")
                .header("content-type", "application/json")
                .header("authorization", TOKEN)
                .body(Body::from(
                    json!({
                        "recipients": [
                            {"chain": "ethereum", "amount": "5.000000", "address": "0xrecipient"}
                        ],
                        "source_chain": "ethereum"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let plan = json_body(send_response).await;
    let operation_id = plan["operation"]["id"].as_str().unwrap().to_string();

    let get_response = app
        .oneshot(
            Request::builder()
                .uri(format!("/v1/operations/{operation_id}"))
                .header("authorization", "Bearer someone-else:0xother")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submit_advances_steps_the_client_signed() {
    let app = test_app();

    let send_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/operations/send")
                .header("content-type", "application/json")
                .header("authorization", TOKEN)
                .body(Body::from(
                    json!({
                        "recipients": [
                            {"chain": "ethereum", "amount": "2.000000", "address": "0xrecipient"}
                        ],
                        "source_chain": "ethereum"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let plan = json_body(send_response).await;
    let operation_id = plan["operation"]["id"].as_str().unwrap().to_string();
    let first_step_id = plan["steps"][0]["id"].as_str().unwrap().to_string();

    let submit_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/operations/{operation_id}/submit"))
                .header("content-type", "application/json")
                .header("authorization", TOKEN)
                .body(Body::from(
                    json!({
                        "submitted": [
                            {"step_id": first_step_id, "tx_hash": "0xdeadbeef"}
                        ]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(submit_response.status(), StatusCode::OK);
    let detail = json_body(submit_response).await;
    let steps = detail["steps"].as_array().unwrap();
    assert_eq!(steps[0]["status"], "CONFIRMED");
}

#[tokio::test]
async fn list_operations_returns_only_the_caller_s_own_operations() {
    let app = test_app();

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/operations/send")
                .header("content-type", "application/json")
                .header("authorization", TOKEN)
                .body(Body::from(
                    json!({
                        "recipients": [
                            {"chain": "ethereum", "amount": "1.000000", "address": "0xrecipient"}
                        ],
                        "source_chain": "ethereum"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/operations/send")
                .header("content-type", "application/json")
                .header("authorization", "Bearer someone-else:0xother")
                .body(Body::from(
                    json!({
                        "recipients": [
                            {"chain": "ethereum", "amount": "1.000000", "address": "0xrecipient"}
                        ],
                        "source_chain": "ethereum"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let list_response = app
        .oneshot(
            Request::builder()
                .uri("/v1/operations")
                .header("authorization", TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(list_response.status(), StatusCode::OK);
    let body = json_body(list_response).await;
    assert_eq!(body["total"], 1);
}
