//! HTTP surface — manual classify/reply/send operations plus inbox/outbox
//! listing and mode administration.
//!
//! The mailbox gateway is optional in [`AppState`]: with no transport
//! configured the store-backed endpoints keep working and `/inbox` reports
//! the gateway as unavailable instead of failing the whole process.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::classify::{Intent, classify, polarity};
use crate::compose::Composer;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::StoreError;
use crate::mailbox::Mailbox;
use crate::mode::{ModeService, OperatingMode};
use crate::store::Store;

/// Outbox rows returned by `GET /outbox`.
const OUTBOX_PAGE: usize = 200;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// None when the transport is not configured; listing degrades politely.
    pub mailbox: Option<Arc<dyn Mailbox>>,
    pub composer: Arc<Composer>,
    pub dispatcher: Arc<Dispatcher>,
    pub mode: Arc<ModeService>,
    pub inbox_limit: usize,
}

/// Build the Axum router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/set_mode", post(set_mode))
        .route("/classify", post(classify_email))
        .route("/generate_reply", post(process_email))
        .route("/process_email", post(process_email))
        .route("/send_manual", post(send_manual))
        .route("/inbox", get(inbox))
        .route("/outbox", get(outbox))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EmailIn {
    pub sender: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct ClassifyOut {
    pub intent: Intent,
    pub confidence: f64,
    pub sentiment: String,
    pub sentiment_score: f64,
}

#[derive(Debug, Serialize)]
pub struct ReplyOut {
    pub intent: Intent,
    pub reply_draft: String,
    pub auto_send: bool,
    pub send_result: DispatchOutcome,
}

#[derive(Debug, Deserialize)]
pub struct ModeIn {
    pub mode: OperatingMode,
}

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize)]
pub struct InboxEntry {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub unread: bool,
}

#[derive(Debug, Serialize)]
pub struct OutboxDto {
    pub id: i64,
    pub recipient: String,
    pub subject: String,
    pub status: String,
    pub auto: bool,
    pub created_at: String,
}

/// Store failures map to a 500 with a JSON error body.
#[derive(Debug)]
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(error = %self.0, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

// ── Handlers ────────────────────────────────────────────────────────

async fn home(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Backend running",
        "mode": state.mode.get().as_str(),
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "mode": state.mode.get().as_str(),
    }))
}

async fn set_mode(
    State(state): State<AppState>,
    Json(payload): Json<ModeIn>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.mode.set(payload.mode).await?;
    Ok(Json(
        serde_json::json!({ "mode": payload.mode.as_str() }),
    ))
}

async fn classify_email(Json(payload): Json<EmailIn>) -> Json<ClassifyOut> {
    let classification = classify(&payload.subject, &payload.body);
    let sentiment = polarity(&format!("{}\n{}", payload.subject, payload.body));
    Json(ClassifyOut {
        intent: classification.intent,
        confidence: classification.confidence,
        sentiment: sentiment.label,
        sentiment_score: sentiment.score,
    })
}

/// Full pipeline for one submitted email: classify, draft, dispatch per the
/// current mode. Shared by `/generate_reply` and `/process_email`.
async fn process_email(
    State(state): State<AppState>,
    Json(payload): Json<EmailIn>,
) -> Result<Json<ReplyOut>, ApiError> {
    let classification = classify(&payload.subject, &payload.body);
    let draft = state
        .composer
        .compose(
            &payload.sender,
            &payload.subject,
            &payload.body,
            classification.intent,
        )
        .await;

    let auto = state.mode.get() == OperatingMode::Auto;
    let outcome = state
        .dispatcher
        .dispatch(
            &payload.sender,
            &format!("Re: {}", payload.subject),
            &draft,
            auto,
        )
        .await?;

    Ok(Json(ReplyOut {
        intent: classification.intent,
        reply_draft: draft,
        auto_send: auto,
        send_result: outcome,
    }))
}

/// Queue the given body as a reply regardless of the current mode.
async fn send_manual(
    State(state): State<AppState>,
    Json(payload): Json<EmailIn>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state
        .dispatcher
        .dispatch(
            &payload.sender,
            &format!("Re: {}", payload.subject),
            &payload.body,
            false,
        )
        .await?;

    Ok(Json(serde_json::json!({
        "status": "sent",
        "result": outcome,
    })))
}

async fn inbox(
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> Json<serde_json::Value> {
    let Some(mailbox) = &state.mailbox else {
        return Json(serde_json::json!({ "error": "mailbox not configured" }));
    };

    match mailbox.list_candidates(query.unread, state.inbox_limit).await {
        Ok(messages) => {
            let emails: Vec<InboxEntry> = messages
                .into_iter()
                .map(|m| InboxEntry {
                    id: m.id,
                    from: m.sender,
                    subject: m.subject,
                    body: m.body,
                    unread: m.unread,
                })
                .collect();
            Json(serde_json::json!({ "emails": emails }))
        }
        Err(e) => Json(serde_json::json!({ "error": e.to_string() })),
    }
}

async fn outbox(State(state): State<AppState>) -> Result<Json<Vec<OutboxDto>>, ApiError> {
    let records = state.store.recent_outbox(OUTBOX_PAGE).await?;
    let dtos = records
        .into_iter()
        .map(|r| OutboxDto {
            id: r.id,
            recipient: r.recipient,
            subject: r.subject,
            status: r.status,
            auto: r.auto,
            created_at: r.created_at.to_rfc3339(),
        })
        .collect();
    Ok(Json(dtos))
}
