//! Historical sampling — per-metric month series, zero-filled.

use chrono::{DateTime, Datelike, Utc};

use lariat_core::ServiceError;

use crate::model::{
    ConversationFilter, HistoryMetric, HistorySpec, LeadFilter, LeadStage, MonthCount,
    StageEventFilter,
};
use crate::store::RecordStore;

fn first_of_month(year: i32, month: u32) -> DateTime<Utc> {
    chrono::NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(chrono::NaiveDate::MIN)
        .and_time(chrono::NaiveTime::MIN)
        .and_utc()
}

fn months_back(year: i32, month: u32, k: i64) -> (i32, u32) {
    let idx = year as i64 * 12 + (month as i64 - 1) - k;
    ((idx.div_euclid(12)) as i32, (idx.rem_euclid(12) + 1) as u32)
}

/// Ordered `{month, year, count}` series, oldest first, one element per
/// month with no gaps. Months with no matching records report 0.
pub fn history(
    store: &dyn RecordStore,
    owner_id: &str,
    spec: HistorySpec,
    now: DateTime<Utc>,
) -> Result<Vec<MonthCount>, ServiceError> {
    let mut series: Vec<MonthCount> = (0..spec.months)
        .map(|i| {
            let (year, month) = months_back(now.year(), now.month(), spec.months - 1 - i);
            MonthCount {
                month,
                year,
                count: 0,
            }
        })
        .collect();

    let (start_year, start_month) = months_back(now.year(), now.month(), spec.months - 1);
    let (end_year, end_month) = months_back(now.year(), now.month(), -1);
    let range = (
        first_of_month(start_year, start_month),
        first_of_month(end_year, end_month),
    );

    // Timestamps of the matching records; each lands in exactly one month.
    let stamps: Vec<DateTime<Utc>> = match spec.metric {
        HistoryMetric::Leads => store
            .find_leads(
                owner_id,
                &LeadFilter {
                    created_in: Some(range),
                    ..Default::default()
                },
            )?
            .into_iter()
            .map(|l| l.created_at)
            .collect(),
        HistoryMetric::Conversations => store
            .find_conversations(
                owner_id,
                &ConversationFilter {
                    date_in: Some(range),
                    ..Default::default()
                },
            )?
            .into_iter()
            .map(|c| c.date)
            .collect(),
        HistoryMetric::Conversions => store
            .find_stage_events(
                owner_id,
                &StageEventFilter {
                    at_in: Some(range),
                },
            )?
            .into_iter()
            .filter(|e| e.stage == LeadStage::Converted)
            .map(|e| e.at)
            .collect(),
    };

    for at in stamps {
        if let Some(entry) = series
            .iter_mut()
            .find(|m| m.year == at.year() && m.month == at.month())
        {
            entry.count += 1;
        }
    }

    Ok(series)
}
