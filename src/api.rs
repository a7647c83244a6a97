//! HTTP API handlers for Postbox.
//!
//! Status mapping follows the error taxonomy: 400 for validation, 429 for
//! rate limiting, 404 for unknown message ids and 500 for storage or
//! delivery failures (generic body, internal detail logged).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router, routing::post};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::intake::handle_submission;
use crate::mailer::SharedMailer;
use crate::model::{ApiResponse, ContactRequest, Message, MessageStats, MessagesQuery, StatusUpdateRequest};
use crate::rate_limit::RateLimiter;
use crate::report::{build_report, generate_and_send, render_html};
use crate::storage::MessageStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: MessageStore,
    pub limiter: Arc<RateLimiter>,
    pub mailer: SharedMailer,
}

/// Build the full application router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/contact", post(submit_contact))
        .route("/api/admin/stats", get(get_stats))
        .route("/api/admin/messages", get(get_messages).patch(update_message))
        .route("/api/admin/report", get(get_report).post(post_report))
        .route("/health", get(health_check))
        .with_state(state)
}

/// POST /api/contact - Submit a contact message.
///
/// The client key for rate limiting is the first `x-forwarded-for` value,
/// falling back to "unknown" when the header is absent.
#[instrument(skip(state, headers, request), fields(client))]
pub async fn submit_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ContactRequest>,
) -> Result<Json<ApiResponse>, ApiError> {
    let client = client_key(&headers);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    tracing::Span::current().record("client", client.as_str());

    let confirmation = handle_submission(
        &state.store,
        &state.limiter,
        state.mailer.as_ref(),
        &request,
        &client,
        user_agent,
    )
    .await?;

    Ok(Json(ApiResponse {
        success: true,
        message: confirmation,
    }))
}

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// GET /api/admin/stats - Aggregate statistics as JSON.
#[instrument(skip(state))]
pub async fn get_stats(State(state): State<AppState>) -> Json<MessageStats> {
    let stats = state.store.stats().await;
    info!(total = stats.total, "stats queried");
    Json(stats)
}

/// GET /api/admin/messages?limit=N - Up to `limit` messages, newest first.
#[instrument(skip(state))]
pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Json<Vec<Message>> {
    let messages = state.store.list(query.limit).await;
    info!(count = messages.len(), "messages queried");
    Json(messages)
}

/// PATCH /api/admin/messages - Update a message's status.
///
/// Responds 404 when the id is unknown.
#[instrument(skip(state, request))]
pub async fn update_message(
    State(state): State<AppState>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = state
        .store
        .update_status(&request.id, request.status)
        .await?;

    if !updated {
        return Err(ApiError::NotFound);
    }

    info!(id = %request.id, status = ?request.status, "message status updated");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// GET /api/admin/report - The rendered HTML report document.
#[instrument(skip(state))]
pub async fn get_report(State(state): State<AppState>) -> Html<String> {
    let report = build_report(&state.store).await;
    info!(period = %report.period, "report rendered");
    Html(render_html(&report))
}

/// POST /api/admin/report - Generate the report and email it.
#[instrument(skip(state))]
pub async fn post_report(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse>) {
    if generate_and_send(&state.store, state.mailer.as_ref()).await {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                message: "Report sent successfully.".to_string(),
            }),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse {
                success: false,
                message: "Failed to send the report.".to_string(),
            }),
        )
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_key_takes_first_forwarded_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_key(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_key_defaults_to_unknown() {
        assert_eq!(client_key(&HeaderMap::new()), "unknown");

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));
        assert_eq!(client_key(&headers), "unknown");
    }
}
