use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use celebration_common::Error;
use celebration_db::content::{self, NewCancellation, NewMessage};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::state::SharedState;

/// Fundraising target reported alongside donation totals.
const DONATION_GOAL: i64 = 10_000;

#[derive(Deserialize)]
pub struct MessagePage {
    #[serde(default = "default_message_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_message_limit() -> u32 {
    10
}

#[derive(Deserialize)]
pub struct MemoryPage {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default = "default_memory_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_memory_limit() -> u32 {
    20
}

#[derive(Deserialize)]
pub struct SubmitMessageRequest {
    #[serde(default)]
    pub name: String,
    pub relationship: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
pub struct SubmitTextMemoryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
pub struct GalleryQuery {
    #[serde(default)]
    pub folder: String,
}

/// Body of the RSVP cancellation form; field names follow the frontend.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelReservationRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub request_type: String,
    /// The form may post this as a number or as a string.
    pub number_of_guests: Option<serde_json::Value>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub zoom_interest: bool,
    #[serde(default)]
    pub future_updates: bool,
}

impl From<CancelReservationRequest> for NewCancellation {
    fn from(body: CancelReservationRequest) -> Self {
        let number_of_guests = body.number_of_guests.and_then(|value| match value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        Self {
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            phone: body.phone,
            request_type: body.request_type,
            number_of_guests,
            reason: body.reason,
            zoom_interest: body.zoom_interest,
            future_updates: body.future_updates,
        }
    }
}

#[derive(Deserialize)]
pub struct ConfirmDonationRequest {
    #[serde(default)]
    pub payment_intent_id: String,
}

/// Map a domain error onto `{success: false, message}` with a matching status.
fn error_response(err: Error) -> Response {
    let (status, message) = match err {
        Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        Error::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
        other => {
            error!("request failed: {other}");
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    };
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

/// GET /api/health: liveness plus a store round-trip.
pub async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let timestamp = chrono::Local::now().to_rfc3339();
    let reachable = state
        .with_store(|store| store.row_count("messages").map(|_| ()))
        .await;

    match reachable {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "timestamp": timestamp,
                "database": { "status": "connected" },
            })),
        ),
        Err(e) => {
            warn!("health check could not reach the store: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "timestamp": timestamp,
                    "database": { "status": "unreachable", "error": e.to_string() },
                })),
            )
        }
    }
}

/// GET /api/status: what the boot hooks did.
pub async fn status(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "migration": state.boot.migration,
        "restoration": state.boot.restoration,
    }))
}

/// GET /api/messages: newest first, with the overall total.
pub async fn list_messages(
    State(state): State<SharedState>,
    Query(page): Query<MessagePage>,
) -> Response {
    let result = state
        .with_store(move |store| {
            let messages = content::list_messages(store.connection(), page.limit, page.offset)?;
            let total = store.row_count("messages")?;
            Ok((messages, total))
        })
        .await;

    match result {
        Ok((messages, total)) => Json(json!({
            "success": true,
            "messages": messages,
            "total": total,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/messages
pub async fn submit_message(
    State(state): State<SharedState>,
    Json(body): Json<SubmitMessageRequest>,
) -> Response {
    let message = NewMessage {
        name: body.name,
        relationship: body.relationship,
        message: body.message,
    };
    let result = state
        .with_store(move |store| content::insert_message(store.connection(), &message))
        .await;

    match result {
        Ok(id) => Json(json!({
            "success": true,
            "message": "Message submitted successfully",
            "id": id,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/memories: `type=all` (the default) lists every kind.
pub async fn list_memories(
    State(state): State<SharedState>,
    Query(page): Query<MemoryPage>,
) -> Response {
    let result = state
        .with_store(move |store| {
            content::list_memories(
                store.connection(),
                page.kind.as_deref(),
                page.limit,
                page.offset,
            )
        })
        .await;

    match result {
        Ok(memories) => Json(json!({ "success": true, "memories": memories })).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/memories/text
pub async fn submit_text_memory(
    State(state): State<SharedState>,
    Json(body): Json<SubmitTextMemoryRequest>,
) -> Response {
    let result = state
        .with_store(move |store| {
            content::insert_text_memory(store.connection(), &body.name, &body.message)
        })
        .await;

    match result {
        Ok(_) => Json(json!({
            "success": true,
            "message": "Memory submitted successfully",
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/memories/{id}
pub async fn delete_memory(State(state): State<SharedState>, Path(id): Path<i64>) -> Response {
    let result = state
        .with_store(move |store| content::delete_memory(store.connection(), id))
        .await;

    match result {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Memory deleted successfully",
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/stats: completed donations against the goal.
pub async fn stats(State(state): State<SharedState>) -> Response {
    let result = state
        .with_store(|store| content::donation_stats(store.connection()))
        .await;

    match result {
        Ok(stats) => Json(json!({
            "success": true,
            "stats": {
                "total_raised": stats.total_raised,
                "donor_count": stats.donor_count,
                "goal": DONATION_GOAL,
            },
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/gallery/folders
pub async fn gallery_folders(State(state): State<SharedState>) -> Response {
    let result = state
        .with_store(|store| content::list_gallery_folders(store.connection()))
        .await;

    match result {
        Ok(folders) => Json(json!({ "success": true, "folders": folders })).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/gallery/images?folder=<name>
pub async fn gallery_images(
    State(state): State<SharedState>,
    Query(query): Query<GalleryQuery>,
) -> Response {
    let result = state
        .with_store(move |store| content::list_gallery_images(store.connection(), &query.folder))
        .await;

    match result {
        Ok(images) => Json(json!({ "success": true, "images": images })).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/cancel-reservation
pub async fn cancel_reservation(
    State(state): State<SharedState>,
    Json(body): Json<CancelReservationRequest>,
) -> Response {
    let request = NewCancellation::from(body);
    let result = state
        .with_store(move |store| content::insert_cancellation(store.connection(), &request))
        .await;

    match result {
        Ok(_) => Json(json!({
            "success": true,
            "message": "Cancellation request received",
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/donations/confirm: mark a paid donation as completed.
pub async fn confirm_donation(
    State(state): State<SharedState>,
    Json(body): Json<ConfirmDonationRequest>,
) -> Response {
    let result = state
        .with_store(move |store| {
            content::confirm_donation(store.connection(), &body.payment_intent_id)
        })
        .await;

    match result {
        Ok(updated) => Json(json!({ "success": true, "updated": updated })).into_response(),
        Err(e) => error_response(e),
    }
}
