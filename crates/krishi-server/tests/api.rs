//! HTTP API tests against a spawned server with a mocked model service.

use std::net::SocketAddr;
use std::sync::Arc;

use krishi_core::error::InvocationErrorKind;
use krishi_core::model::MockModelClient;
use krishi_core::InvocationError;
use krishi_server::{create_app_state, start_server_with_state, ServerConfig};
use serde_json::{json, Value};

async fn spawn(mock: MockModelClient) -> SocketAddr {
    let state = create_app_state(None, Arc::new(mock)).unwrap();
    let config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };
    start_server_with_state(config, state).await.unwrap()
}

fn yield_reply() -> Value {
    json!({
        "predictedYield": "18-22 quintals per acre",
        "factors": "Sowing date and irrigation",
        "recommendations": "Split nitrogen doses"
    })
}

fn wheat_input() -> Value {
    json!({
        "cropType": "Wheat",
        "soilType": "Alluvial Soil",
        "season": "Rabi",
        "location": "Nashik, Maharashtra"
    })
}

#[tokio::test]
async fn test_health_and_listing() {
    let addr = spawn(MockModelClient::new()).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("http://{}/api/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["flows"], 9);

    let list: Value = client
        .get(format!("http://{}/api/flows", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = list["flows"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["name"].as_str())
        .collect();
    assert!(names.contains(&"diagnosePlant"));
    assert!(names.contains(&"farmAssistant"));

    let flow: Value = client
        .get(format!("http://{}/api/flows/predictYield", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        flow["inputSchema"]["properties"]["season"]["enum"],
        json!(["Kharif", "Rabi", "Zaid"])
    );
}

#[tokio::test]
async fn test_run_flow_success() {
    let addr = spawn(MockModelClient::always(yield_reply())).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/api/flows/predictYield", addr))
        .json(&wheat_input())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), yield_reply());
}

#[tokio::test]
async fn test_error_statuses() {
    let mock = MockModelClient::new()
        .with_response(json!({ "predictedYield": 42 }))
        .with_error(InvocationError::new(InvocationErrorKind::Quota, "quota exceeded"));
    let addr = spawn(mock).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/flows/predictYield", addr);

    // Missing field: 422, no model call consumed.
    let mut input = wheat_input();
    input.as_object_mut().unwrap().remove("season");
    let resp = client.post(&url).json(&input).send().await.unwrap();
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "input_validation_error");
    assert_eq!(body["error"]["field"], "season");

    // Malformed reply: 502 output validation.
    let resp = client.post(&url).json(&wheat_input()).send().await.unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "output_validation_error");

    // Quota: 502 invocation error.
    let resp = client.post(&url).json(&wheat_input()).send().await.unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invocation_error");
    assert_eq!(body["error"]["kind"], "quota");

    // Unknown flow: 404.
    let resp = client
        .post(format!("http://{}/api/flows/nonexistent-flow", addr))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Not JSON: 422.
    let resp = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{ cropType: Wheat")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn test_render_dry_run_hides_payload() {
    let mock = Arc::new(MockModelClient::new());
    let state = create_app_state(None, mock.clone()).unwrap();
    let addr = start_server_with_state(
        ServerConfig {
            port: 0,
            ..ServerConfig::default()
        },
        state,
    )
    .await
    .unwrap();

    let body: Value = reqwest::Client::new()
        .post(format!("http://{}/api/flows/diagnosePlant/render", addr))
        .json(&json!({ "photoDataUri": "data:image/png;base64,iVBORw==", "description": "yellow leaves" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(body["text"].as_str().unwrap().contains("[media:0]"));
    assert_eq!(body["media"][0]["mimeType"], "image/png");
    assert_eq!(body["media"][0]["bytes"], 4);
    assert!(!body.to_string().contains("iVBORw"));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_rpc_run() {
    let addr = spawn(MockModelClient::always(yield_reply())).await;
    let client = reqwest::Client::new();

    let methods: Value = client
        .get(format!("http://{}/api/rpc/methods", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(methods["methods"]
        .as_array()
        .unwrap()
        .contains(&json!("flows.run")));

    let resp: Value = client
        .post(format!("http://{}/api/rpc", addr))
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "flows.run",
            "params": { "name": "predictYield", "input": wheat_input() }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["id"], 7);
    assert_eq!(resp["result"]["output"], yield_reply());

    let resp = client
        .post(format!("http://{}/api/rpc", addr))
        .header("content-type", "application/json")
        .body("{ \"jsonrpc\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
}
