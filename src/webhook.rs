//! Webhook endpoint - verification handshake and inbound message events

use crate::command::{self, Outcome};
use crate::notifier::Notifier;
use crate::registry::SharedRegistry;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Shared state for the webhook handlers
#[derive(Clone)]
pub struct AppState {
    pub verify_token: Arc<str>,
    pub registry: SharedRegistry,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(verify_token: &str, registry: SharedRegistry, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            verify_token: Arc::from(verify_token),
            registry,
            notifier,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(verify).post(receive))
        .route("/health", get(|| async { Json(serde_json::json!({"ok": true})) }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Query parameters of the subscription handshake
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Inbound webhook body. Every field is optional; absent means empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhookPayload {
    pub object: Option<String>,
    pub entry: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Entry {
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MessagingEvent {
    pub sender: Option<Sender>,
    pub message: Option<InboundMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Sender {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InboundMessage {
    pub text: Option<String>,
}

/// A text message from one sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: String,
    pub text: String,
}

impl WebhookPayload {
    /// Page subscriptions only. A body without `object` is treated as a page event.
    pub fn is_page(&self) -> bool {
        self.object.as_deref().map_or(true, |o| o == "page")
    }

    /// Text message events, with text lower-cased. Events without text are skipped.
    pub fn text_events(&self) -> Vec<InboundEvent> {
        self.entry
            .iter()
            .flat_map(|entry| entry.messaging.iter())
            .filter_map(|event| {
                let text = event.message.as_ref()?.text.as_ref()?;
                Some(InboundEvent {
                    sender: event
                        .sender
                        .as_ref()
                        .map(|s| s.id.clone())
                        .unwrap_or_default(),
                    text: text.to_lowercase(),
                })
            })
            .collect()
    }
}

/// Answer the handshake: echo the challenge iff mode and token match
pub fn check_verification(params: &VerifyParams, expected_token: &str) -> Option<String> {
    let subscribed = params.mode.as_deref() == Some("subscribe");
    let token_ok = params.verify_token.as_deref() == Some(expected_token);

    if subscribed && token_ok {
        Some(params.challenge.clone().unwrap_or_default())
    } else {
        None
    }
}

async fn verify(
    State(state): State<AppState>,
    params: std::result::Result<Query<VerifyParams>, QueryRejection>,
) -> Response {
    // An unparseable query is just another failed handshake
    let params = match params {
        Ok(Query(params)) => params,
        Err(e) => {
            debug!("Unparseable verification query: {}", e);
            VerifyParams::default()
        }
    };

    match check_verification(&params, &state.verify_token) {
        Some(challenge) => (StatusCode::OK, challenge).into_response(),
        None => (StatusCode::FORBIDDEN, "Verification token mismatch").into_response(),
    }
}

async fn receive(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Ignoring unparseable webhook body: {}", e);
            return (StatusCode::OK, "ok").into_response();
        }
    };

    if !payload.is_page() {
        debug!("Ignoring webhook for object {:?}", payload.object);
        return (StatusCode::OK, "ok").into_response();
    }

    for event in payload.text_events() {
        let outcome = command::handle_message(
            &state.registry,
            state.notifier.as_ref(),
            &event.sender,
            &event.text,
        )
        .await;

        if outcome != Outcome::Ignored {
            debug!("Message from {} -> {:?}", event.sender, outcome);
        }
    }

    (StatusCode::OK, "ok").into_response()
}
