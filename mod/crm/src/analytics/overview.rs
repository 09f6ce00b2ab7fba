//! Composite dashboard fetch — four concurrent sub-fetches, all-or-nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use lariat_core::ServiceError;

use crate::analytics::{metrics, priority, recommend, timeline};
use crate::model::{Overview, Timeframe, TimelineSpec};
use crate::analytics::recommend::SuggestionProvider;
use crate::store::RecordStore;

/// The overview's fixed sub-request shapes.
const OVERVIEW_TIMELINE: TimelineSpec = TimelineSpec {
    timeframe: Timeframe::Weekly,
    days: 30,
};
const OVERVIEW_LIMIT: usize = 5;

/// Fan out to the four analytic components concurrently and join.
///
/// All-or-nothing: one failed sub-fetch fails the whole call and no
/// partial payload is returned. If the caller goes away the join future is
/// dropped;
/// sub-fetches already running on the blocking pool finish and their
/// results are discarded.
pub async fn overview(
    store: Arc<dyn RecordStore>,
    suggester: Arc<dyn SuggestionProvider>,
    owner_id: String,
    now: DateTime<Utc>,
) -> Result<Overview, ServiceError> {
    let metrics_task = {
        let store = Arc::clone(&store);
        let owner = owner_id.clone();
        tokio::task::spawn_blocking(move || {
            metrics::overview_stats(store.as_ref(), &owner, None, now)
        })
    };
    let timeline_task = {
        let store = Arc::clone(&store);
        let owner = owner_id.clone();
        tokio::task::spawn_blocking(move || {
            timeline::timeline(store.as_ref(), &owner, OVERVIEW_TIMELINE, now)
        })
    };
    let recommend_task = {
        let store = Arc::clone(&store);
        let owner = owner_id.clone();
        tokio::task::spawn_blocking(move || {
            recommend::recommendations(
                store.as_ref(),
                suggester.as_ref(),
                &owner,
                OVERVIEW_LIMIT,
                now,
            )
        })
    };
    let tasks_task = {
        let store = Arc::clone(&store);
        let owner = owner_id.clone();
        tokio::task::spawn_blocking(move || {
            priority::priority_tasks(store.as_ref(), &owner, OVERVIEW_LIMIT, now)
        })
    };

    let (metrics, timeline, recommendations, priority_tasks) =
        tokio::try_join!(metrics_task, timeline_task, recommend_task, tasks_task)
            .map_err(|e| ServiceError::Internal(format!("overview join: {e}")))?;

    Ok(Overview {
        metrics: metrics?,
        timeline: timeline?,
        recommendations: recommendations?,
        priority_tasks: priority_tasks?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::recommend::StaticSuggestions;
    use crate::model::{
        Conversation, ConversationFilter, Lead, LeadFilter, LeadStage, Notification,
        NotificationFilter, Reminder, ReminderFilter, StageEvent, StageEventFilter,
    };
    use crate::store::test_support::*;
    use crate::store::SqlRecordStore;

    fn seeded_store() -> SqlRecordStore {
        let store = test_store();
        store.insert_lead(&lead("l1", "u1", LeadStage::New, "2026-03-01T00:00:00Z")).unwrap();
        store.insert_lead(&lead("l2", "u1", LeadStage::Qualified, "2026-02-20T00:00:00Z")).unwrap();
        store.insert_reminder(&reminder("r1", "u1", "2026-03-08T09:00:00Z", 2)).unwrap();
        store
    }

    #[tokio::test]
    async fn composes_all_four_surfaces() {
        let store = Arc::new(seeded_store());
        let now = dt("2026-03-10T12:00:00Z");

        let overview = overview(store, Arc::new(StaticSuggestions), "u1".into(), now)
            .await
            .unwrap();

        assert_eq!(overview.metrics.stats.total_leads, 2);
        // Weekly 30-day timeline: ceil(30/7) buckets.
        assert_eq!(overview.timeline.len(), 5);
        assert_eq!(overview.recommendations.len(), 2);
        assert_eq!(overview.priority_tasks.len(), 1);
    }

    /// Delegates everything to a real store but fails the one query shape
    /// only the recommendation ranker issues (active-only lead scan).
    struct RankerPoisonedStore {
        inner: SqlRecordStore,
    }

    impl RecordStore for RankerPoisonedStore {
        fn find_leads(
            &self,
            owner_id: &str,
            filter: &LeadFilter,
        ) -> Result<Vec<Lead>, ServiceError> {
            if filter.active_only {
                return Err(ServiceError::Storage("lead scan failed".into()));
            }
            self.inner.find_leads(owner_id, filter)
        }
        fn find_conversations(
            &self,
            owner_id: &str,
            filter: &ConversationFilter,
        ) -> Result<Vec<Conversation>, ServiceError> {
            self.inner.find_conversations(owner_id, filter)
        }
        fn find_reminders(
            &self,
            owner_id: &str,
            filter: &ReminderFilter,
        ) -> Result<Vec<Reminder>, ServiceError> {
            self.inner.find_reminders(owner_id, filter)
        }
        fn find_stage_events(
            &self,
            owner_id: &str,
            filter: &StageEventFilter,
        ) -> Result<Vec<StageEvent>, ServiceError> {
            self.inner.find_stage_events(owner_id, filter)
        }
        fn find_notifications(
            &self,
            owner_id: &str,
            filter: &NotificationFilter,
        ) -> Result<Vec<Notification>, ServiceError> {
            self.inner.find_notifications(owner_id, filter)
        }
        fn get_notification(
            &self,
            id: &str,
            owner_id: &str,
        ) -> Result<Notification, ServiceError> {
            self.inner.get_notification(id, owner_id)
        }
        fn insert_notification(&self, n: &Notification) -> Result<(), ServiceError> {
            self.inner.insert_notification(n)
        }
        fn update_notification(&self, n: &Notification) -> Result<(), ServiceError> {
            self.inner.update_notification(n)
        }
        fn mark_all_notifications_read(
            &self,
            owner_id: &str,
            now: DateTime<Utc>,
        ) -> Result<u64, ServiceError> {
            self.inner.mark_all_notifications_read(owner_id, now)
        }
        fn delete_notification(
            &self,
            id: &str,
            owner_id: &str,
        ) -> Result<Notification, ServiceError> {
            self.inner.delete_notification(id, owner_id)
        }
        fn count_unread(&self, owner_id: &str) -> Result<i64, ServiceError> {
            self.inner.count_unread(owner_id)
        }
    }

    #[tokio::test]
    async fn one_failing_sub_fetch_fails_the_whole_call() {
        let store = Arc::new(RankerPoisonedStore {
            inner: seeded_store(),
        });
        let now = dt("2026-03-10T12:00:00Z");

        // Metrics and timeline alone would succeed against this store.
        assert!(metrics::overview_stats(store.as_ref(), "u1", None, now).is_ok());
        assert!(timeline::timeline(store.as_ref(), "u1", OVERVIEW_TIMELINE, now).is_ok());

        let err = overview(store, Arc::new(StaticSuggestions), "u1".into(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
    }
}
