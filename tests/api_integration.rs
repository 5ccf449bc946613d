//! Integration tests for the HTTP API.
//!
//! Each test spins up an Axum server on a random port and exercises the
//! real REST contract over HTTP, with an in-memory store and no mail
//! transport configured.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;

use inbox_agent::api::{AppState, routes};
use inbox_agent::compose::Composer;
use inbox_agent::dispatch::Dispatcher;
use inbox_agent::mode::ModeService;
use inbox_agent::store::{LibSqlStore, Store};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the API on a random port, return its base URL.
async fn start_server() -> String {
    let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let mode = Arc::new(ModeService::load(Arc::clone(&store)).await.unwrap());
    let app = routes(AppState {
        dispatcher: Arc::new(Dispatcher::new(None, Arc::clone(&store), false)),
        composer: Arc::new(Composer::template_only()),
        mailbox: None,
        inbox_limit: 25,
        mode,
        store,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    format!("http://{addr}")
}

async fn post_json(url: &str, body: Value) -> Value {
    let response = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "POST {url} failed");
    response.json().await.unwrap()
}

async fn get_json(url: &str) -> Value {
    let response = reqwest::get(url).await.unwrap();
    assert!(response.status().is_success(), "GET {url} failed");
    response.json().await.unwrap()
}

#[tokio::test]
async fn health_and_home_report_mode() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let health = get_json(&format!("{base}/health")).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["mode"], "manual");

        let home = get_json(&format!("{base}/")).await;
        assert_eq!(home["message"], "Backend running");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn set_mode_round_trips_through_the_api() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let out = post_json(
            &format!("{base}/set_mode"),
            serde_json::json!({ "mode": "auto" }),
        )
        .await;
        assert_eq!(out["mode"], "auto");

        let health = get_json(&format!("{base}/health")).await;
        assert_eq!(health["mode"], "auto");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn set_mode_rejects_unknown_values() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let response = reqwest::Client::new()
            .post(format!("{base}/set_mode"))
            .json(&serde_json::json!({ "mode": "turbo" }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn process_email_produces_a_draft_and_an_outbox_row() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let out = post_json(
            &format!("{base}/process_email"),
            serde_json::json!({
                "sender": "jane.doe@example.com",
                "subject": "Invoice #42",
                "body": "Please process the attached payment",
            }),
        )
        .await;

        assert_eq!(out["intent"], "invoice");
        assert_eq!(out["auto_send"], false);
        assert_eq!(out["send_result"]["status"], "queued");
        assert!(out["reply_draft"].as_str().unwrap().contains("Jane Doe"));

        let outbox = get_json(&format!("{base}/outbox")).await;
        let rows = outbox.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["recipient"], "jane.doe@example.com");
        assert_eq!(rows[0]["subject"], "Re: Invoice #42");
        assert_eq!(rows[0]["auto"], false);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn auto_mode_without_transport_simulates_the_send() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        post_json(
            &format!("{base}/set_mode"),
            serde_json::json!({ "mode": "auto" }),
        )
        .await;

        let out = post_json(
            &format!("{base}/process_email"),
            serde_json::json!({
                "sender": "buyer@example.com",
                "subject": "RFQ for 300 units",
                "body": "send your best price",
            }),
        )
        .await;

        assert_eq!(out["intent"], "quotation");
        assert_eq!(out["auto_send"], true);
        assert_eq!(out["send_result"]["status"], "queued(simulated)");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn send_manual_queues_the_given_body_verbatim() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let out = post_json(
            &format!("{base}/send_manual"),
            serde_json::json!({
                "sender": "client@example.com",
                "subject": "order status",
                "body": "Your order ships Monday.",
            }),
        )
        .await;
        assert_eq!(out["status"], "sent");
        assert_eq!(out["result"]["status"], "queued");

        let outbox = get_json(&format!("{base}/outbox")).await;
        assert_eq!(outbox[0]["subject"], "Re: order status");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn inbox_reports_missing_transport_instead_of_failing() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let out = get_json(&format!("{base}/inbox?unread=true")).await;
        assert!(out["error"].as_str().unwrap().contains("not configured"));
    })
    .await
    .unwrap();
}
