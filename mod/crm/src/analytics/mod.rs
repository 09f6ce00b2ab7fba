//! Analytics aggregation — every surface here is recomputed per request
//! from the record store; nothing is cached across requests.

pub mod history;
pub mod metrics;
pub mod overview;
pub mod priority;
pub mod recommend;
pub mod timeline;

use std::sync::Arc;

use chrono::Utc;

use lariat_core::ServiceError;

use crate::model::{
    HistorySpec, MonthCount, Overview, OverviewStats, PriorityTask, Recommendation,
    TimelinePoint, TimelineSpec,
};
use crate::store::RecordStore;
use self::recommend::SuggestionProvider;

/// Facade over the analytic components, owned by the CRM module.
///
/// Each method resolves `now` once and hands it down, so a single request
/// sees one consistent set of calendar boundaries.
pub struct Analytics {
    store: Arc<dyn RecordStore>,
    suggester: Arc<dyn SuggestionProvider>,
}

impl Analytics {
    pub fn new(store: Arc<dyn RecordStore>, suggester: Arc<dyn SuggestionProvider>) -> Self {
        Self { store, suggester }
    }

    /// Facade with the built-in suggestion text.
    pub fn with_default_suggestions(store: Arc<dyn RecordStore>) -> Self {
        Self::new(store, Arc::new(recommend::StaticSuggestions))
    }

    pub fn overview_stats(&self, owner_id: &str) -> Result<OverviewStats, ServiceError> {
        metrics::overview_stats(self.store.as_ref(), owner_id, None, Utc::now())
    }

    pub fn timeline(
        &self,
        owner_id: &str,
        spec: TimelineSpec,
    ) -> Result<Vec<TimelinePoint>, ServiceError> {
        timeline::timeline(self.store.as_ref(), owner_id, spec, Utc::now())
    }

    pub fn history(
        &self,
        owner_id: &str,
        spec: HistorySpec,
    ) -> Result<Vec<MonthCount>, ServiceError> {
        history::history(self.store.as_ref(), owner_id, spec, Utc::now())
    }

    pub fn recommendations(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        recommend::recommendations(
            self.store.as_ref(),
            self.suggester.as_ref(),
            owner_id,
            limit,
            Utc::now(),
        )
    }

    pub fn priority_tasks(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<PriorityTask>, ServiceError> {
        priority::priority_tasks(self.store.as_ref(), owner_id, limit, Utc::now())
    }

    /// Composite dashboard fetch; see [`overview::overview`].
    pub async fn overview(&self, owner_id: &str) -> Result<Overview, ServiceError> {
        overview::overview(
            Arc::clone(&self.store),
            Arc::clone(&self.suggester),
            owner_id.to_string(),
            Utc::now(),
        )
        .await
    }
}
