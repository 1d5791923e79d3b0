//! Integration tests for the JSON web API

use appbase::{
    ApiError, ApiRequest, ApiResult, AppBase, AppSettingsBase, NoHooks,
    lifecycle::{Lifecycle, Listen, WebServer},
    web::{ServerTimeouts, with_server_layers},
};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::oneshot;

async fn ping(_request: ApiRequest) -> ApiResult {
    Ok(json!({ "pong": true }))
}

async fn greet(request: ApiRequest) -> ApiResult {
    #[derive(Deserialize)]
    struct Greeting {
        name: String,
    }

    let greeting: Greeting = request.json()?;
    Ok(json!({ "hello": greeting.name }))
}

async fn lookup(request: ApiRequest) -> ApiResult {
    let id = request
        .param("id")
        .ok_or_else(|| ApiError::bad_request("id required"))?;
    Ok(json!({ "id": id, "path": request.path }))
}

/// Serves the app's router until the returned sender fires.
async fn serve(
    app: &AppBase<AppSettingsBase, NoHooks>,
) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<appbase::Result<()>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = with_server_layers(
        app.web_handler(),
        app.base_context(),
        ServerTimeouts::default(),
        false,
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = WebServer {
        listen: Listen::Listener(listener),
        router,
        timeouts: ServerTimeouts::default(),
        base: app.base_context(),
        shutdown_timeout: Duration::from_secs(2),
        lifecycle: Lifecycle::new(),
    };
    let handle = tokio::spawn(server.serve_until(async {
        let _ = stop_rx.await;
    }));

    (format!("http://{}", addr), stop_tx, handle)
}

fn app(enable_get: bool) -> AppBase<AppSettingsBase, NoHooks> {
    AppBase::new(AppSettingsBase::default(), NoHooks)
        .web_api_prefix("api/")
        .web_api_enable_get(enable_get)
        .api_handler("ping", ping)
        .api_handler("/greet/", greet)
        .api_handler("items/lookup", lookup)
}

#[tokio::test]
async fn test_post_dispatches_to_handler() {
    let app = app(false);
    assert_eq!(app.api().prefix(), "/api");
    let (base_url, stop, handle) = serve(&app).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base_url}/api/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok", "data": { "pong": true } }));

    let response = client
        .post(format!("{base_url}/api/greet"))
        .json(&json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"], json!({ "hello": "Ada" }));

    let response = client
        .post(format!("{base_url}/api/items/lookup?id=42"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"], json!({ "id": "42", "path": "items/lookup" }));

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_get_only_when_enabled() {
    let client = reqwest::Client::new();

    let disabled = app(false);
    let (base_url, stop, handle) = serve(&disabled).await;
    let response = client
        .get(format!("{base_url}/api/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let enabled = app(true);
    let (base_url, stop, handle) = serve(&enabled).await;
    let response = client
        .get(format!("{base_url}/api/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_errors_are_reported_as_json() {
    let app = app(false);
    let (base_url, stop, handle) = serve(&app).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base_url}/api/unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");

    let response = client
        .post(format!("{base_url}/api/greet"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{base_url}/api/items/lookup"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "error", "message": "id required" }));

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_empty_prefix_disables_api() {
    let app = AppBase::new(AppSettingsBase::default(), NoHooks)
        .web_api_prefix("/")
        .api_handler("ping", ping);
    assert!(!app.api().is_enabled());

    let (base_url, stop, handle) = serve(&app).await;
    let response = reqwest::Client::new()
        .post(format!("{base_url}/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_reregistering_replaces_handler() {
    async fn other(_request: ApiRequest) -> ApiResult {
        Ok(json!("other"))
    }

    let app = app(false).api_handler("/ping", other);
    assert_eq!(app.api().len(), 3);
    assert!(app.api().contains("ping/"));

    let (base_url, stop, handle) = serve(&app).await;
    let body: Value = reqwest::Client::new()
        .post(format!("{base_url}/api/ping"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"], "other");

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
