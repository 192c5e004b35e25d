//! In-process mock of the layout persistence and region ACL API.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use fieldboard_core::acl::{AclEntry, AclGrant};

/// Card id the mock answers with 503.
pub const FLAKY_CARD: &str = "flaky";
/// Card id the mock rejects with 422.
pub const INVALID_CARD: &str = "invalid";

#[derive(Debug, Default)]
pub struct MockState {
    /// `"<METHOD> <path>"` for every request, in arrival order.
    pub requests: Vec<String>,
    pub cards: HashMap<String, Value>,
    pub groups: HashMap<String, Value>,
    pub deleted_groups: Vec<(String, bool)>,
    pub acl: Vec<AclEntry>,
}

pub type Shared = Arc<Mutex<MockState>>;

fn error(status: StatusCode, message: &str, code: &str) -> Response {
    (status, Json(json!({ "error": message, "code": code }))).into_response()
}

async fn put_card(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut s = state.lock().await;
    s.requests.push(format!("PUT /layout/cards/{id}"));
    match id.as_str() {
        FLAKY_CARD => error(StatusCode::SERVICE_UNAVAILABLE, "upstream unavailable", "UNAVAILABLE"),
        INVALID_CARD => error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Card position out of range",
            "VALIDATION_ERROR",
        ),
        _ => {
            let card = s.cards.entry(id.clone()).or_insert_with(|| json!({ "id": id }));
            if let (Some(target), Some(patch)) = (card.as_object_mut(), body.as_object()) {
                for (k, v) in patch {
                    target.insert(k.clone(), v.clone());
                }
            }
            Json(card.clone()).into_response()
        }
    }
}

async fn post_group(State(state): State<Shared>, Json(group): Json<Value>) -> Response {
    let mut s = state.lock().await;
    s.requests.push("POST /layout/groups".to_string());
    let id = group["id"].as_str().unwrap_or_default().to_string();
    s.groups.insert(id, group.clone());
    (StatusCode::CREATED, Json(group)).into_response()
}

async fn patch_group(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut s = state.lock().await;
    s.requests.push(format!("PATCH /layout/groups/{id}"));
    let Some(group) = s.groups.get_mut(&id) else {
        return error(StatusCode::NOT_FOUND, "Group not found", "NOT_FOUND");
    };
    if let (Some(target), Some(patch)) = (group.as_object_mut(), body.as_object()) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
    Json(group.clone()).into_response()
}

#[derive(Deserialize)]
struct DeleteParams {
    #[serde(default)]
    cascade: bool,
}

async fn delete_group(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> StatusCode {
    let mut s = state.lock().await;
    s.requests.push(format!("DELETE /layout/groups/{id}"));
    s.groups.remove(&id);
    s.deleted_groups.push((id, params.cascade));
    StatusCode::NO_CONTENT
}

async fn publish(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut s = state.lock().await;
    s.requests.push(format!("POST /layout/versions/{id}/publish"));
    Json(json!({
        "id": id,
        "version_number": 7,
        "status": "PUBLISHED",
        "notes": body["notes"],
        "archived_version_id": null,
    }))
    .into_response()
}

async fn get_acl(State(state): State<Shared>, Path(region): Path<String>) -> Json<Vec<AclEntry>> {
    let s = state.lock().await;
    Json(s.acl.iter().filter(|e| e.region_id == region).cloned().collect())
}

async fn put_acl(
    State(state): State<Shared>,
    Path(region): Path<String>,
    Json(grant): Json<AclGrant>,
) -> Json<AclEntry> {
    let mut s = state.lock().await;
    let entry = AclEntry {
        id: format!("acl-{}", s.acl.len() + 1),
        region_id: region,
        principal_type: grant.principal_type,
        principal_id: grant.principal_id,
        permission_set: grant.permission_set,
    };
    s.acl.push(entry.clone());
    Json(entry)
}

async fn delete_acl(
    State(state): State<Shared>,
    Path((region, acl_id)): Path<(String, String)>,
) -> Response {
    let mut s = state.lock().await;
    let before = s.acl.len();
    s.acl.retain(|e| !(e.region_id == region && e.id == acl_id));
    if s.acl.len() == before {
        return error(StatusCode::NOT_FOUND, "ACL entry not found", "NOT_FOUND");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/layout/cards/{id}", put(put_card))
        .route("/layout/groups", post(post_group))
        .route("/layout/groups/{id}", patch(patch_group).delete(delete_group))
        .route("/layout/versions/{id}/publish", post(publish))
        .route("/regions/{id}/acl", get(get_acl).put(put_acl))
        .route("/regions/{id}/acl/{acl_id}", delete(delete_acl))
        .with_state(state)
}

/// Serve the mock on an ephemeral port. Returns its base URL and state.
pub async fn spawn() -> (String, Shared) {
    let state = Shared::default();
    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}
