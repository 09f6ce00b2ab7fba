//! Timeline bucketing — fixed-width calendar buckets over stage events.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

use lariat_core::ServiceError;

use crate::model::{
    LeadStage, StageEventFilter, Timeframe, TimelinePoint, TimelineSpec,
};
use crate::store::RecordStore;

/// One generated bucket: a half-open `[start, end)` interval plus its
/// wire-facing point.
struct Bucket {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    point: TimelinePoint,
}

fn day_start(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn first_of_month(year: i32, month: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Walk `k` calendar months back from `(year, month)`.
fn months_back(year: i32, month: u32, k: i64) -> (i32, u32) {
    let idx = year as i64 * 12 + (month as i64 - 1) - k;
    ((idx.div_euclid(12)) as i32, (idx.rem_euclid(12) + 1) as u32)
}

fn empty_point() -> TimelinePoint {
    TimelinePoint {
        date: None,
        week_start: None,
        week_end: None,
        month: None,
        year: None,
        new: 0,
        contacted: 0,
        converted: 0,
        lost: 0,
    }
}

/// Generate `ceil(days / bucketWidth)` buckets, oldest first, walking
/// backward from `now`. Weekly buckets align to Monday and monthly buckets
/// to the first of the month, so historical boundaries are stable no matter
/// which day the call is made on; the most recent bucket may be partial.
fn build_buckets(spec: TimelineSpec, now: DateTime<Utc>) -> Vec<Bucket> {
    let mut buckets = Vec::new();
    match spec.timeframe {
        Timeframe::Daily => {
            let today = day_start(now);
            for i in 0..spec.days {
                let start = today - Duration::days(spec.days - 1 - i);
                let mut point = empty_point();
                point.date = Some(start.format("%Y-%m-%d").to_string());
                buckets.push(Bucket {
                    start,
                    end: start + Duration::days(1),
                    point,
                });
            }
        }
        Timeframe::Weekly => {
            let count = (spec.days + 6) / 7;
            let today = day_start(now);
            let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            for i in 0..count {
                let start = monday - Duration::weeks(count - 1 - i);
                let mut point = empty_point();
                point.week_start = Some(start.format("%Y-%m-%d").to_string());
                point.week_end = Some((start + Duration::days(6)).format("%Y-%m-%d").to_string());
                buckets.push(Bucket {
                    start,
                    end: start + Duration::weeks(1),
                    point,
                });
            }
        }
        Timeframe::Monthly => {
            let count = (spec.days + 29) / 30;
            for i in 0..count {
                let (year, month) = months_back(now.year(), now.month(), count - 1 - i);
                let (next_year, next_month) = months_back(year, month, -1);
                let mut point = empty_point();
                point.month = Some(month);
                point.year = Some(year);
                buckets.push(Bucket {
                    start: first_of_month(year, month),
                    end: first_of_month(next_year, next_month),
                    point,
                });
            }
        }
    }
    buckets
}

/// Which timeline category a stage event counts toward. Intermediate
/// funnel stages (ENGAGED, QUALIFIED, ...) have no timeline category.
fn bump_category(point: &mut TimelinePoint, stage: LeadStage) {
    match stage {
        LeadStage::New => point.new += 1,
        LeadStage::Contacted => point.contacted += 1,
        LeadStage::Converted => point.converted += 1,
        LeadStage::Lost => point.lost += 1,
        _ => {}
    }
}

/// The timeline surface: a complete, contiguous, zero-filled bucket
/// sequence, oldest first. Events outside the generated range are dropped.
pub fn timeline(
    store: &dyn RecordStore,
    owner_id: &str,
    spec: TimelineSpec,
    now: DateTime<Utc>,
) -> Result<Vec<TimelinePoint>, ServiceError> {
    let mut buckets = build_buckets(spec, now);
    let range = match (buckets.first(), buckets.last()) {
        (Some(first), Some(last)) => (first.start, last.end),
        _ => return Ok(Vec::new()),
    };

    let events = store.find_stage_events(
        owner_id,
        &StageEventFilter {
            at_in: Some(range),
        },
    )?;

    for event in events {
        // Buckets are contiguous and sorted; the event is inside the fetched
        // range, so at most one bucket matches.
        if let Some(bucket) = buckets
            .iter_mut()
            .find(|b| b.start <= event.at && event.at < b.end)
        {
            bump_category(&mut bucket.point, event.stage);
        }
    }

    Ok(buckets.into_iter().map(|b| b.point).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::*;
    use chrono::Weekday;

    fn spec(timeframe: Timeframe, days: i64) -> TimelineSpec {
        TimelineSpec { timeframe, days }
    }

    #[test]
    fn bucket_counts_match_ceil_formula() {
        let now = dt("2026-03-10T12:00:00Z");
        let store = test_store();
        for (tf, days, expected) in [
            (Timeframe::Daily, 1, 1),
            (Timeframe::Daily, 30, 30),
            (Timeframe::Weekly, 7, 1),
            (Timeframe::Weekly, 30, 5),
            (Timeframe::Monthly, 30, 1),
            (Timeframe::Monthly, 90, 3),
            (Timeframe::Monthly, 365, 13),
        ] {
            let points = timeline(&store, "u1", spec(tf, days), now).unwrap();
            assert_eq!(points.len(), expected, "{tf:?} days={days}");
        }
    }

    #[test]
    fn empty_owner_gets_complete_zero_filled_sequence() {
        let now = dt("2026-03-10T12:00:00Z");
        let store = test_store();
        let points = timeline(&store, "u1", spec(Timeframe::Daily, 5), now).unwrap();
        assert_eq!(points.len(), 5);
        for p in &points {
            assert_eq!((p.new, p.contacted, p.converted, p.lost), (0, 0, 0, 0));
            assert!(p.date.is_some());
        }
        // Oldest first, contiguous days.
        assert_eq!(points[0].date.as_deref(), Some("2026-03-06"));
        assert_eq!(points[4].date.as_deref(), Some("2026-03-10"));
    }

    #[test]
    fn ten_leads_on_third_day_of_seven_day_window() {
        let now = dt("2026-03-10T12:00:00Z");
        let store = test_store();
        // Window is 2026-03-04 .. 2026-03-10; the 3rd day is 2026-03-06.
        for i in 0..10 {
            store
                .insert_lead(&lead(
                    &format!("l{i}"),
                    "u1",
                    LeadStage::New,
                    "2026-03-06T09:30:00Z",
                ))
                .unwrap();
        }

        let points = timeline(&store, "u1", spec(Timeframe::Daily, 7), now).unwrap();
        assert_eq!(points.len(), 7);
        for (i, p) in points.iter().enumerate() {
            let expected = if i == 2 { 10 } else { 0 };
            assert_eq!(p.new, expected, "bucket {i}");
        }
    }

    #[test]
    fn weekly_buckets_align_to_monday_regardless_of_call_day() {
        let store = test_store();
        store
            .insert_lead(&lead("l1", "u1", LeadStage::New, "2026-03-03T09:00:00Z"))
            .unwrap();

        // 2026-03-04 is a Wednesday, 2026-03-06 a Friday — same week.
        let wednesday = dt("2026-03-04T12:00:00Z");
        let friday = dt("2026-03-06T12:00:00Z");

        let a = timeline(&store, "u1", spec(Timeframe::Weekly, 21), wednesday).unwrap();
        let b = timeline(&store, "u1", spec(Timeframe::Weekly, 21), friday).unwrap();

        for p in a.iter().chain(b.iter()) {
            let start: NaiveDate = p.week_start.as_deref().unwrap().parse().unwrap();
            assert_eq!(start.weekday(), Weekday::Mon);
        }
        // Same historical boundaries, same counts.
        let starts_a: Vec<_> = a.iter().map(|p| p.week_start.clone()).collect();
        let starts_b: Vec<_> = b.iter().map(|p| p.week_start.clone()).collect();
        assert_eq!(starts_a, starts_b);
        assert_eq!(a.last().unwrap().new, 1);
    }

    #[test]
    fn monthly_buckets_align_to_first_of_month() {
        let now = dt("2026-03-10T12:00:00Z");
        let store = test_store();
        store
            .insert_lead(&lead("jan", "u1", LeadStage::New, "2026-01-31T23:00:00Z"))
            .unwrap();
        store
            .insert_lead(&lead("mar", "u1", LeadStage::New, "2026-03-01T00:00:00Z"))
            .unwrap();

        let points = timeline(&store, "u1", spec(Timeframe::Monthly, 90), now).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!((points[0].month, points[0].year), (Some(1), Some(2026)));
        assert_eq!(points[0].new, 1);
        assert_eq!(points[1].new, 0);
        assert_eq!((points[2].month, points[2].year), (Some(3), Some(2026)));
        assert_eq!(points[2].new, 1);
    }

    #[test]
    fn year_boundary_months_walk_correctly() {
        assert_eq!(months_back(2026, 2, 3), (2025, 11));
        assert_eq!(months_back(2026, 1, 1), (2025, 12));
        assert_eq!(months_back(2025, 12, -1), (2026, 1));
    }

    #[test]
    fn categories_follow_transition_type_not_current_stage() {
        let now = dt("2026-03-10T12:00:00Z");
        let store = test_store();
        store
            .insert_lead(&lead("l1", "u1", LeadStage::New, "2026-03-02T09:00:00Z"))
            .unwrap();
        store
            .update_lead_stage("l1", "u1", LeadStage::Contacted, dt("2026-03-04T09:00:00Z"))
            .unwrap();
        // ENGAGED has no timeline category.
        store
            .update_lead_stage("l1", "u1", LeadStage::Engaged, dt("2026-03-05T09:00:00Z"))
            .unwrap();
        store
            .update_lead_stage("l1", "u1", LeadStage::Converted, dt("2026-03-08T09:00:00Z"))
            .unwrap();

        let points = timeline(&store, "u1", spec(Timeframe::Daily, 10), now).unwrap();
        let day = |d: &str| points.iter().position(|p| p.date.as_deref() == Some(d)).unwrap();
        // The creation bucket still reports `new` even though the lead has
        // since converted.
        assert_eq!(points[day("2026-03-02")].new, 1);
        assert_eq!(points[day("2026-03-04")].contacted, 1);
        assert_eq!(points[day("2026-03-05")].new, 0);
        assert_eq!(points[day("2026-03-08")].converted, 1);
    }

    #[test]
    fn events_outside_range_are_dropped() {
        let now = dt("2026-03-10T12:00:00Z");
        let store = test_store();
        store
            .insert_lead(&lead("old", "u1", LeadStage::New, "2025-01-01T09:00:00Z"))
            .unwrap();

        let points = timeline(&store, "u1", spec(Timeframe::Daily, 7), now).unwrap();
        assert!(points.iter().all(|p| p.new == 0));
    }
}
