use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};

use lariat_core::ServiceError;

use crate::model::{
    HistoryQuery, HistorySpec, LimitQuery, MonthCount, Overview, OverviewStats, PriorityTask,
    Recommendation, TimelinePoint, TimelineQuery, TimelineSpec,
};
use crate::{CrmState, OwnerId};

type AppState = Arc<CrmState>;

pub fn router(state: Arc<CrmState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/metrics/history", get(history))
        .route("/timeline", get(timeline))
        .route("/recommendations", get(recommendations))
        .route("/priority-tasks", get(priority_tasks))
        .route("/overview", get(overview))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /metrics
// ---------------------------------------------------------------------------

async fn metrics(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
) -> Result<Json<OverviewStats>, ServiceError> {
    let stats = state.analytics.overview_stats(&owner)?;
    Ok(Json(stats))
}

// ---------------------------------------------------------------------------
// GET /metrics/history
// ---------------------------------------------------------------------------

async fn history(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MonthCount>>, ServiceError> {
    let spec = HistorySpec::parse(&query)?;
    let series = state.analytics.history(&owner, spec)?;
    Ok(Json(series))
}

// ---------------------------------------------------------------------------
// GET /timeline
// ---------------------------------------------------------------------------

async fn timeline(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<Vec<TimelinePoint>>, ServiceError> {
    let spec = TimelineSpec::parse(&query)?;
    let points = state.analytics.timeline(&owner, spec)?;
    Ok(Json(points))
}

// ---------------------------------------------------------------------------
// GET /recommendations
// ---------------------------------------------------------------------------

async fn recommendations(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Recommendation>>, ServiceError> {
    let limit = query.resolve()?;
    let items = state.analytics.recommendations(&owner, limit)?;
    Ok(Json(items))
}

// ---------------------------------------------------------------------------
// GET /priority-tasks
// ---------------------------------------------------------------------------

async fn priority_tasks(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PriorityTask>>, ServiceError> {
    let limit = query.resolve()?;
    let tasks = state.analytics.priority_tasks(&owner, limit)?;
    Ok(Json(tasks))
}

// ---------------------------------------------------------------------------
// GET /overview
// ---------------------------------------------------------------------------

async fn overview(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
) -> Result<Json<Overview>, ServiceError> {
    let overview = state.analytics.overview(&owner).await?;
    Ok(Json(overview))
}
