use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use chrono::Utc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use lariat_core::{ListResult, ServiceError};

use crate::model::{Notification, NotificationFilter, NotificationListQuery};
use crate::notify::{ConnectionRegistry, NewNotification};
use crate::{CrmState, OwnerId};

type AppState = Arc<CrmState>;

const MAX_LIST_LIMIT: i64 = 100;

pub fn router(state: Arc<CrmState>) -> Router {
    Router::new()
        // PUT on the collection marks everything read; PUT or POST on a
        // single id marks that one read.
        .route("/notifications", get(list).post(create).put(mark_all_read))
        .route("/notifications/events", get(events))
        .route("/notifications/read-all", put(mark_all_read))
        .route(
            "/notifications/{id}",
            put(mark_read).post(mark_read).delete(delete),
        )
        .route("/notifications/{id}/read", put(mark_read))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /notifications
// ---------------------------------------------------------------------------

async fn list(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Response, ServiceError> {
    // The badge count is always derived from the persisted unread rows.
    if query.count_only.unwrap_or(false) {
        let count = state.hub.unread_count(&owner)?;
        return Ok(Json(serde_json::json!({ "count": count })).into_response());
    }

    let limit = match query.limit {
        None => None,
        Some(n) if (1..=MAX_LIST_LIMIT).contains(&n) => Some(n as usize),
        Some(n) => {
            return Err(ServiceError::Validation(format!(
                "limit must be 1..={MAX_LIST_LIMIT}, got {n}"
            )))
        }
    };
    let filter = NotificationFilter {
        unread_only: query.unread_only.unwrap_or(false),
        limit,
    };
    let items = state.hub.list(&owner, &filter)?;
    let total = items.len();
    Ok(Json(ListResult { items, total }).into_response())
}

// ---------------------------------------------------------------------------
// POST /notifications
// ---------------------------------------------------------------------------

async fn create(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Json(req): Json<NewNotification>,
) -> Result<Json<Notification>, ServiceError> {
    let notification = state.hub.create(&owner, req, Utc::now())?;
    Ok(Json(notification))
}

// ---------------------------------------------------------------------------
// PUT /notifications/:id/read
// ---------------------------------------------------------------------------

async fn mark_read(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<Json<Notification>, ServiceError> {
    let notification = state.hub.mark_read(&id, &owner, Utc::now())?;
    Ok(Json(notification))
}

// ---------------------------------------------------------------------------
// PUT /notifications/read-all
// ---------------------------------------------------------------------------

async fn mark_all_read(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let updated = state.hub.mark_all_read(&owner, Utc::now())?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

// ---------------------------------------------------------------------------
// DELETE /notifications/:id
// ---------------------------------------------------------------------------

async fn delete(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    state.hub.delete(&id, &owner)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// GET /notifications/events
// ---------------------------------------------------------------------------

/// Unregisters the connection when the SSE stream is dropped.
struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    owner_id: String,
    id: crate::notify::registry::ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.owner_id, self.id);
    }
}

async fn events(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = state.registry.register(&owner);
    debug!(owner_id = %owner, "notification stream opened");
    let guard = ConnectionGuard {
        registry: Arc::clone(&state.registry),
        owner_id: owner,
        id,
    };

    // The guard lives inside the stream closure, so a client disconnect
    // tears the connection out of the registry even if no push ever ran.
    let stream = ReceiverStream::new(rx).filter_map(move |push| {
        let _held = &guard;
        match serde_json::to_string(&push) {
            Ok(json) => Some(Ok(Event::default().event("notification").data(json))),
            Err(err) => {
                debug!(error = %err, "undeliverable push event skipped");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::analytics::Analytics;
    use crate::notify::NotificationHub;
    use crate::store::test_support::test_store;
    use crate::store::RecordStore;

    fn test_router() -> Router {
        let store = Arc::new(test_store());
        let registry = Arc::new(ConnectionRegistry::new());
        let analytics =
            Analytics::with_default_suggestions(store.clone() as Arc<dyn RecordStore>);
        let hub = NotificationHub::new(store.clone() as Arc<dyn RecordStore>, registry.clone());
        let state = Arc::new(CrmState {
            analytics,
            hub,
            registry,
            store,
        });
        router(state).layer(Extension(OwnerId("u1".into())))
    }

    async fn api(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let body = match body {
            Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
            None => Body::empty(),
        };
        let resp = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::json!(null)
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::json!(null))
        };
        (status, json)
    }

    fn new_notification(title: &str) -> serde_json::Value {
        serde_json::json!({
            "title": title,
            "message": "msg",
            "type": "lead",
        })
    }

    #[tokio::test]
    async fn put_on_collection_marks_all_read() {
        let r = test_router();
        api(&r, "POST", "/notifications", Some(new_notification("a"))).await;
        api(&r, "POST", "/notifications", Some(new_notification("b"))).await;

        let (s, body) = api(&r, "PUT", "/notifications", None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["updated"], 2);

        let (_, count) = api(&r, "GET", "/notifications?countOnly=true", None).await;
        assert_eq!(count["count"], 0);
    }

    #[tokio::test]
    async fn put_and_post_on_id_mark_one_read() {
        let r = test_router();
        let (_, a) = api(&r, "POST", "/notifications", Some(new_notification("a"))).await;
        let (_, b) = api(&r, "POST", "/notifications", Some(new_notification("b"))).await;

        let uri_a = format!("/notifications/{}", a["id"].as_str().unwrap());
        let (s, read_a) = api(&r, "PUT", &uri_a, None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(read_a["isRead"], true);

        let uri_b = format!("/notifications/{}", b["id"].as_str().unwrap());
        let (s, read_b) = api(&r, "POST", &uri_b, None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(read_b["isRead"], true);

        let (_, count) = api(&r, "GET", "/notifications?countOnly=true", None).await;
        assert_eq!(count["count"], 0);
    }

    #[tokio::test]
    async fn alias_routes_still_served() {
        let r = test_router();
        let (_, a) = api(&r, "POST", "/notifications", Some(new_notification("a"))).await;

        let uri = format!("/notifications/{}/read", a["id"].as_str().unwrap());
        let (s, read) = api(&r, "PUT", &uri, None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(read["isRead"], true);

        let (s, body) = api(&r, "PUT", "/notifications/read-all", None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["updated"], 0);
    }

    #[tokio::test]
    async fn list_envelope_and_delete() {
        let r = test_router();
        let (_, a) = api(&r, "POST", "/notifications", Some(new_notification("a"))).await;
        api(&r, "POST", "/notifications", Some(new_notification("b"))).await;

        let (s, body) = api(&r, "GET", "/notifications", None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);

        let uri = format!("/notifications/{}", a["id"].as_str().unwrap());
        let (s, deleted) = api(&r, "DELETE", &uri, None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(deleted["deleted"], true);

        let (_, body) = api(&r, "GET", "/notifications", None).await;
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn missing_notification_is_not_found() {
        let r = test_router();
        let (s, err) = api(&r, "PUT", "/notifications/nope", None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
        assert!(err["code"].is_string());
        assert!(err["message"].is_string());
    }
}
