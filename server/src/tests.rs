use super::*;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use serial_test::serial;
use std::env;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

use crate::test_logger;

// every variable `Cli` falls back to
const CLI_ENV: [&str; 5] = [
    "PORT",
    "DATABASE_URL",
    "CSBINGO_DB_MAX_CONNECTIONS",
    "CSBINGO_DB_CONNECT_TIMEOUT_SECS",
    "CSBINGO_SQL_LOGGING",
];

fn clear_cli_env() {
    for var in CLI_ENV {
        unsafe {
            env::remove_var(var);
        }
    }
}

async fn test_app() -> Router {
    app(Arc::new(AppState { db: test_db().await }))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
#[serial]
async fn setup_succeeds_without_env_vars() {
    clear_cli_env();
    let cli = Cli::try_parse_from(["csbingo"]).unwrap();
    assert_eq!(cli.port, 4000);
    assert_eq!(cli.database_url, "sqlite::memory:");
    assert_eq!(cli.db_max_connections, 5);
    assert_eq!(cli.db_connect_timeout_secs, 8);
    assert!(!cli.sql_logging);
    assert!(setup(&cli).await.is_ok());
}

#[test]
#[serial]
fn cli_overrides_env() {
    clear_cli_env();
    unsafe {
        env::set_var("PORT", "5000");
    }
    let cli = Cli::try_parse_from(["csbingo", "--port", "6000"]).unwrap();
    assert_eq!(cli.port, 6000);
    clear_cli_env();
}

#[test]
#[serial]
fn env_used_when_no_cli() {
    clear_cli_env();
    unsafe {
        env::set_var("CSBINGO_DB_MAX_CONNECTIONS", "12");
        env::set_var("DATABASE_URL", "postgres://bingo@db/csbingo");
    }
    let cli = Cli::try_parse_from(["csbingo"]).unwrap();
    let settings = cli.pool_settings();
    assert_eq!(settings.max_connections, 12);
    assert_eq!(settings.url, "postgres://bingo@db/csbingo");
    clear_cli_env();
}

#[test]
fn invalid_port_errors() {
    assert!(Cli::try_parse_from(["csbingo", "--port", "not-a-port"]).is_err());
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app().await;
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn bingo_scenario_over_http() {
    let app = test_app().await;

    let (status, strategy) = call(
        &app,
        Method::POST,
        "/categories",
        Some(json!({ "name": "Strategy", "logoUrl": "/img/strategy.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(strategy["id"], 1);

    let (_, party) = call(
        &app,
        Method::POST,
        "/categories",
        Some(json!({ "name": "Party", "logoUrl": "/img/party.png" })),
    )
    .await;
    assert_eq!(party["id"], 2);

    let (status, alex) = call(
        &app,
        Method::POST,
        "/players",
        Some(json!({ "name": "Alex", "logoUrl": "/img/alex.png", "categoryIds": [1, 2] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(alex["id"], 1);

    let (status, loaded) = call(&app, Method::GET, "/players/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        loaded,
        json!({
            "id": 1,
            "name": "Alex",
            "logoUrl": "/img/alex.png",
            "categories": [
                { "id": 1, "name": "Strategy", "logoUrl": "/img/strategy.png" },
                { "id": 2, "name": "Party", "logoUrl": "/img/party.png" },
            ],
        })
    );

    let (status, holders) = call(&app, Method::GET, "/categories/2/players", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(holders.as_array().map(Vec::len), Some(1));

    let (status, _) = call(&app, Method::DELETE, "/categories/1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, trimmed) = call(&app, Method::DELETE, "/players/1/categories/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trimmed["categories"].as_array().map(Vec::len), Some(1));

    let (status, _) = call(&app, Method::DELETE, "/categories/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn errors_map_to_statuses() {
    let app = test_app().await;

    let (status, body) = call(&app, Method::GET, "/players/9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "player 9 not found");

    let (status, _) = call(
        &app,
        Method::POST,
        "/players",
        Some(json!({ "name": "Alex", "logoUrl": "", "categoryIds": [5] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(
        &app,
        Method::PATCH,
        "/categories/3",
        Some(json!({ "name": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, players) = call(&app, Method::GET, "/players", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(players, json!([]));
}

#[tokio::test]
#[serial]
async fn websocket_answers_ping_and_logs_unexpected_messages() {
    test_logger::capture(log::LevelFilter::Warn);

    let app = test_app().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws.send(Message::Text("hello".into())).await.unwrap();
    ws.send(Message::Text("ping".into())).await.unwrap();

    let msg = ws.next().await.unwrap().unwrap();
    assert_eq!(msg, Message::Text("pong".into()));
    assert!(test_logger::contains("unexpected text message: hello"));

    ws.close(None).await.unwrap();
}
