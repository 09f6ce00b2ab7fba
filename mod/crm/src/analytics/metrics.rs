//! Funnel metrics over a period — a pure read, no side effects.

use chrono::{DateTime, Duration, Utc};

use lariat_core::ServiceError;

use crate::analytics::priority;
use crate::model::{
    ConversationFilter, LeadFilter, LeadStage, OverviewStats, QuickStats, TimeRange,
};
use crate::store::RecordStore;

/// Default trailing period when the caller does not name one.
pub const DEFAULT_PERIOD_DAYS: i64 = 30;

fn resolve_period(period: Option<TimeRange>, now: DateTime<Utc>) -> TimeRange {
    period.unwrap_or((now - Duration::days(DEFAULT_PERIOD_DAYS), now))
}

/// Funnel counts and conversion rate over the period.
///
/// `contactedLeads` counts leads that have moved past NEW; converted and
/// lost count current terminal stages. `newLeadsThisWeek` is always the
/// trailing 7 days regardless of the period.
pub fn quick_stats(
    store: &dyn RecordStore,
    owner_id: &str,
    period: Option<TimeRange>,
    now: DateTime<Utc>,
) -> Result<QuickStats, ServiceError> {
    let period = resolve_period(period, now);
    let leads = store.find_leads(
        owner_id,
        &LeadFilter {
            created_in: Some(period),
            ..Default::default()
        },
    )?;

    let total_leads = leads.len() as i64;
    let contacted_leads = leads.iter().filter(|l| l.stage != LeadStage::New).count() as i64;
    let converted_leads = leads.iter().filter(|l| l.stage == LeadStage::Converted).count() as i64;
    let lost_leads = leads.iter().filter(|l| l.stage == LeadStage::Lost).count() as i64;

    let week = (now - Duration::days(7), now);
    let new_leads_this_week = store
        .find_leads(
            owner_id,
            &LeadFilter {
                created_in: Some(week),
                ..Default::default()
            },
        )?
        .len() as i64;

    // Never divide by zero.
    let conversion_rate = if total_leads == 0 {
        0.0
    } else {
        converted_leads as f64 / total_leads as f64
    };

    Ok(QuickStats {
        total_leads,
        contacted_leads,
        converted_leads,
        lost_leads,
        new_leads_this_week,
        conversion_rate,
    })
}

/// QuickStats plus conversation and task counts. Task counts share the
/// priority classifier's day boundaries so the two surfaces agree.
pub fn overview_stats(
    store: &dyn RecordStore,
    owner_id: &str,
    period: Option<TimeRange>,
    now: DateTime<Utc>,
) -> Result<OverviewStats, ServiceError> {
    let stats = quick_stats(store, owner_id, period, now)?;
    let period = resolve_period(period, now);

    let total_conversations = store
        .find_conversations(
            owner_id,
            &ConversationFilter {
                date_in: Some(period),
                ..Default::default()
            },
        )?
        .len() as i64;

    let tasks = priority::collect_tasks(store, owner_id, now)?;
    let pending_tasks = tasks.len() as i64;
    let today_tasks = tasks
        .iter()
        .filter(|t| t.status == crate::model::TaskUrgency::Today)
        .count() as i64;
    let overdue_tasks = tasks
        .iter()
        .filter(|t| t.status == crate::model::TaskUrgency::Overdue)
        .count() as i64;

    Ok(OverviewStats {
        stats,
        total_conversations,
        pending_tasks,
        today_tasks,
        overdue_tasks,
    })
}
