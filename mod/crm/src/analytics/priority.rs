//! Priority task classification — urgency buckets by UTC day boundaries.

use chrono::{DateTime, Duration, NaiveTime, Utc};

use lariat_core::ServiceError;

use crate::model::{ConversationFilter, LeadFilter, PriorityTask, ReminderFilter, TaskUrgency};
use crate::store::RecordStore;

/// UTC day boundaries of `now`: `(todayStart, tomorrowStart)`.
///
/// These are the boundaries every surface that says "today" uses, so the
/// metrics counters and the priority list can never disagree.
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (today_start, today_start + Duration::days(1))
}

/// Classify a due date against the UTC day boundaries of `now`.
pub fn classify(due: DateTime<Utc>, now: DateTime<Utc>) -> TaskUrgency {
    let (today_start, tomorrow_start) = day_bounds(now);
    if due < today_start {
        TaskUrgency::Overdue
    } else if due < tomorrow_start {
        TaskUrgency::Today
    } else {
        TaskUrgency::Upcoming
    }
}

fn urgency_rank(u: TaskUrgency) -> u8 {
    match u {
        TaskUrgency::Overdue => 0,
        TaskUrgency::Today => 1,
        TaskUrgency::Upcoming => 2,
    }
}

/// All open tasks for an owner, classified and fully ordered:
/// overdue first (most overdue first), then today, then upcoming (soonest
/// first); ties broken by id. Never truncated — callers slice afterwards,
/// so an overdue task can never lose its place to a later-category task.
pub(crate) fn collect_tasks(
    store: &dyn RecordStore,
    owner_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<PriorityTask>, ServiceError> {
    let leads = store.find_leads(owner_id, &LeadFilter::default())?;
    let lead_name = |id: &Option<String>| -> Option<String> {
        id.as_ref()
            .and_then(|id| leads.iter().find(|l| &l.id == id))
            .map(|l| l.name.clone())
    };

    let mut tasks = Vec::new();

    for reminder in store.find_reminders(owner_id, &ReminderFilter { open_only: true })? {
        tasks.push(PriorityTask {
            id: reminder.id.clone(),
            title: reminder.title.clone(),
            due_date: reminder.due_date,
            priority: reminder.priority,
            status: classify(reminder.due_date, now),
            lead_name: lead_name(&reminder.lead_id),
            lead_id: reminder.lead_id,
        });
    }

    // Conversations with an open follow-up are tasks too.
    let open_follow_ups = store.find_conversations(
        owner_id,
        &ConversationFilter {
            open_follow_up: true,
            ..Default::default()
        },
    )?;
    for conv in open_follow_ups {
        let due = match conv.follow_up_date {
            Some(due) => due,
            // An open follow-up with no date cannot be scheduled.
            None => continue,
        };
        let lead_id = Some(conv.lead_id.clone());
        let title = match lead_name(&lead_id) {
            Some(name) => format!("Follow up with {name}"),
            None => "Follow up".to_string(),
        };
        tasks.push(PriorityTask {
            id: conv.id.clone(),
            title,
            due_date: due,
            priority: 1,
            status: classify(due, now),
            lead_name: lead_name(&lead_id),
            lead_id,
        });
    }

    tasks.sort_by(|a, b| {
        urgency_rank(a.status)
            .cmp(&urgency_rank(b.status))
            .then(a.due_date.cmp(&b.due_date))
            .then(a.id.cmp(&b.id))
    });
    Ok(tasks)
}

/// The priority task list surface: classified, ordered, then truncated.
pub fn priority_tasks(
    store: &dyn RecordStore,
    owner_id: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<PriorityTask>, ServiceError> {
    let mut tasks = collect_tasks(store, owner_id, now)?;
    tasks.truncate(limit);
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::*;

    #[test]
    fn classification_boundaries() {
        let now = dt("2026-03-10T15:30:00Z");
        // Strictly before today's start.
        assert_eq!(classify(dt("2026-03-09T23:59:59Z"), now), TaskUrgency::Overdue);
        // [todayStart, tomorrowStart)
        assert_eq!(classify(dt("2026-03-10T00:00:00Z"), now), TaskUrgency::Today);
        assert_eq!(classify(dt("2026-03-10T23:59:59Z"), now), TaskUrgency::Today);
        // tomorrowStart and later.
        assert_eq!(classify(dt("2026-03-11T00:00:00Z"), now), TaskUrgency::Upcoming);
    }

    #[test]
    fn ordering_overdue_then_today_then_upcoming() {
        let store = test_store();
        let now = dt("2026-03-10T12:00:00Z");
        store.insert_reminder(&reminder("up", "u1", "2026-03-12T09:00:00Z", 5)).unwrap();
        store.insert_reminder(&reminder("today", "u1", "2026-03-10T16:00:00Z", 1)).unwrap();
        store.insert_reminder(&reminder("old2", "u1", "2026-03-08T09:00:00Z", 1)).unwrap();
        store.insert_reminder(&reminder("old1", "u1", "2026-03-01T09:00:00Z", 1)).unwrap();

        let tasks = priority_tasks(&store, "u1", 10, now).unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        // Most overdue first, then today, then soonest upcoming.
        assert_eq!(ids, vec!["old1", "old2", "today", "up"]);
    }

    #[test]
    fn limit_never_drops_overdue_for_later_categories() {
        let store = test_store();
        let now = dt("2026-03-10T12:00:00Z");
        // Insertion order deliberately puts upcoming tasks first.
        store.insert_reminder(&reminder("u-a", "u1", "2026-03-15T09:00:00Z", 1)).unwrap();
        store.insert_reminder(&reminder("u-b", "u1", "2026-03-16T09:00:00Z", 1)).unwrap();
        store.insert_reminder(&reminder("over", "u1", "2026-03-02T09:00:00Z", 1)).unwrap();

        let tasks = priority_tasks(&store, "u1", 2, now).unwrap();
        assert_eq!(tasks[0].id, "over");
        assert_eq!(tasks[0].status, TaskUrgency::Overdue);
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn ties_break_by_id() {
        let store = test_store();
        let now = dt("2026-03-10T12:00:00Z");
        store.insert_reminder(&reminder("b", "u1", "2026-03-05T09:00:00Z", 1)).unwrap();
        store.insert_reminder(&reminder("a", "u1", "2026-03-05T09:00:00Z", 1)).unwrap();

        let tasks = priority_tasks(&store, "u1", 10, now).unwrap();
        assert_eq!(tasks[0].id, "a");
        assert_eq!(tasks[1].id, "b");
    }

    #[test]
    fn open_follow_ups_become_tasks_with_lead_names() {
        let store = test_store();
        let now = dt("2026-03-10T12:00:00Z");
        store
            .insert_lead(&lead("l1", "u1", crate::model::LeadStage::Contacted, "2026-02-01T00:00:00Z"))
            .unwrap();

        let mut conv = conversation("c1", "u1", "l1", "2026-03-01T10:00:00Z");
        conv.has_follow_up = true;
        conv.follow_up_date = Some(dt("2026-03-09T10:00:00Z"));
        store.insert_conversation(&conv).unwrap();

        // Done follow-ups and ones without a date are excluded.
        let mut done = conversation("c2", "u1", "l1", "2026-03-02T10:00:00Z");
        done.has_follow_up = true;
        done.follow_up_done = true;
        store.insert_conversation(&done).unwrap();
        let mut dateless = conversation("c3", "u1", "l1", "2026-03-03T10:00:00Z");
        dateless.has_follow_up = true;
        store.insert_conversation(&dateless).unwrap();

        let tasks = priority_tasks(&store, "u1", 10, now).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "c1");
        assert_eq!(tasks[0].status, TaskUrgency::Overdue);
        assert_eq!(tasks[0].title, "Follow up with lead l1");
        assert_eq!(tasks[0].lead_id.as_deref(), Some("l1"));
    }

    #[test]
    fn done_reminders_are_excluded() {
        let store = test_store();
        let now = dt("2026-03-10T12:00:00Z");
        let mut done = reminder("r1", "u1", "2026-03-09T09:00:00Z", 1);
        done.done = true;
        store.insert_reminder(&done).unwrap();

        assert!(priority_tasks(&store, "u1", 10, now).unwrap().is_empty());
    }
}
