mod analytics;
mod notifications;

use std::sync::Arc;

use axum::Router;

use crate::CrmState;

/// Build the complete CRM module router.
///
/// Routes:
/// - `GET    /metrics`                   — dashboard quick stats
/// - `GET    /metrics/history`           — monthly historical series
/// - `GET    /timeline`                  — bucketed activity timeline
/// - `GET    /recommendations`           — ranked follow-up suggestions
/// - `GET    /priority-tasks`            — urgency-classified task list
/// - `GET    /overview`                  — composite dashboard fetch
/// - `GET    /notifications`             — list (or count) notifications
/// - `POST   /notifications`             — create notification
/// - `PUT    /notifications`             — mark all read
/// - `PUT|POST /notifications/{id}`      — mark one read
/// - `DELETE /notifications/{id}`        — delete notification
/// - `GET    /notifications/events`      — live push stream (SSE)
///
/// `/notifications/read-all` and `/notifications/{id}/read` are served as
/// aliases of the two mark-read routes.
pub fn router(state: Arc<CrmState>) -> Router {
    Router::new()
        .merge(analytics::router(Arc::clone(&state)))
        .merge(notifications::router(state))
}
