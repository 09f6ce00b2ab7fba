use std::sync::Arc;

use chrono::{DateTime, Utc};

use lariat_core::ServiceError;
use lariat_sql::{Row, SQLStore, Value};

use crate::model::{
    Conversation, ConversationFilter, Lead, LeadFilter, LeadStage, Notification,
    NotificationFilter, Reminder, ReminderFilter, StageEvent, StageEventFilter,
};

/// SQL schema for the CRM record tables.
///
/// Each table keeps the full record as a `data` JSON column plus the
/// columns needed for indexed filtering. Comparable time columns are unix
/// milliseconds so range filters never depend on text formatting.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS leads (
    id          TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL,
    stage       TEXT NOT NULL,
    created_ms  INTEGER NOT NULL,
    data        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_leads_owner_created ON leads(owner_id, created_ms);
CREATE INDEX IF NOT EXISTS idx_leads_owner_stage ON leads(owner_id, stage);

CREATE TABLE IF NOT EXISTS conversations (
    id              TEXT PRIMARY KEY,
    owner_id        TEXT NOT NULL,
    lead_id         TEXT NOT NULL,
    date_ms         INTEGER NOT NULL,
    open_follow_up  INTEGER NOT NULL DEFAULT 0,
    data            TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conv_owner_date ON conversations(owner_id, date_ms);
CREATE INDEX IF NOT EXISTS idx_conv_owner_lead ON conversations(owner_id, lead_id);

CREATE TABLE IF NOT EXISTS reminders (
    id          TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL,
    done        INTEGER NOT NULL DEFAULT 0,
    due_ms      INTEGER NOT NULL,
    data        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rem_owner_due ON reminders(owner_id, done, due_ms);

CREATE TABLE IF NOT EXISTS lead_events (
    id          TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL,
    lead_id     TEXT NOT NULL,
    at_ms       INTEGER NOT NULL,
    data        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ev_owner_at ON lead_events(owner_id, at_ms);

CREATE TABLE IF NOT EXISTS notifications (
    id          TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL,
    is_read     INTEGER NOT NULL DEFAULT 0,
    created_ms  INTEGER NOT NULL,
    data        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notif_owner_read ON notifications(owner_id, is_read);
CREATE INDEX IF NOT EXISTS idx_notif_owner_created ON notifications(owner_id, created_ms);
";

/// Record Store Gateway — the read contract consumed by the analytics
/// components, plus the notification writes the hub needs.
///
/// Every method is scoped by `owner_id`; a record belonging to a different
/// owner behaves exactly like a missing record.
pub trait RecordStore: Send + Sync {
    fn find_leads(&self, owner_id: &str, filter: &LeadFilter) -> Result<Vec<Lead>, ServiceError>;

    fn find_conversations(
        &self,
        owner_id: &str,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, ServiceError>;

    fn find_reminders(
        &self,
        owner_id: &str,
        filter: &ReminderFilter,
    ) -> Result<Vec<Reminder>, ServiceError>;

    fn find_stage_events(
        &self,
        owner_id: &str,
        filter: &StageEventFilter,
    ) -> Result<Vec<StageEvent>, ServiceError>;

    /// Newest first, optionally unread-only and capped.
    fn find_notifications(
        &self,
        owner_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, ServiceError>;

    fn get_notification(&self, id: &str, owner_id: &str) -> Result<Notification, ServiceError>;

    fn insert_notification(&self, notification: &Notification) -> Result<(), ServiceError>;

    /// Full replacement of an existing notification row.
    fn update_notification(&self, notification: &Notification) -> Result<(), ServiceError>;

    /// Transition every unread notification of the owner to read in one
    /// statement. Returns the number of rows actually transitioned.
    fn mark_all_notifications_read(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, ServiceError>;

    /// Remove a notification, returning the removed row.
    fn delete_notification(&self, id: &str, owner_id: &str)
        -> Result<Notification, ServiceError>;

    /// Count of persisted unread rows. Always derived from the rows
    /// themselves — there is no separately maintained counter to drift.
    fn count_unread(&self, owner_id: &str) -> Result<i64, ServiceError>;
}

/// RecordStore over an embedded SQL database.
pub struct SqlRecordStore {
    db: Arc<dyn SQLStore>,
}

fn ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn storage_err(e: impl std::fmt::Display) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ServiceError> {
    serde_json::to_string(value).map_err(|e| ServiceError::Internal(e.to_string()))
}

fn from_row<T: serde::de::DeserializeOwned>(row: &Row) -> Result<T, ServiceError> {
    let json = row
        .get_str("data")
        .ok_or_else(|| ServiceError::Storage("missing data column".into()))?;
    serde_json::from_str(json).map_err(|e| ServiceError::Storage(format!("bad record json: {e}")))
}

impl SqlRecordStore {
    /// Create the store and initialise the schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        db.exec_batch(SCHEMA)
            .map_err(|e| ServiceError::Storage(format!("crm schema init: {e}")))?;
        Ok(Self { db })
    }

    // -----------------------------------------------------------------------
    // Write helpers for the external CRUD collaborators (and tests).
    // The analytic core itself only reads through the RecordStore trait.
    // -----------------------------------------------------------------------

    /// Insert a lead and journal its creation as a stage event.
    pub fn insert_lead(&self, lead: &Lead) -> Result<(), ServiceError> {
        self.db
            .exec(
                "INSERT INTO leads (id, owner_id, stage, created_ms, data) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                &[
                    Value::Text(lead.id.clone()),
                    Value::Text(lead.owner_id.clone()),
                    Value::Text(lead.stage.as_str().to_string()),
                    Value::Integer(ms(lead.created_at)),
                    Value::Text(to_json(lead)?),
                ],
            )
            .map_err(storage_err)?;

        self.insert_stage_event(&StageEvent {
            id: lariat_core::new_id(),
            owner_id: lead.owner_id.clone(),
            lead_id: lead.id.clone(),
            stage: lead.stage,
            at: lead.created_at,
        })
    }

    /// Move a lead to a new stage and journal the transition.
    ///
    /// Terminal stages are never reassigned: a CONVERTED or LOST lead
    /// rejects further transitions.
    pub fn update_lead_stage(
        &self,
        id: &str,
        owner_id: &str,
        stage: LeadStage,
        now: DateTime<Utc>,
    ) -> Result<Lead, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT data FROM leads WHERE id = ?1 AND owner_id = ?2",
                &[Value::Text(id.to_string()), Value::Text(owner_id.to_string())],
            )
            .map_err(storage_err)?;
        let mut lead: Lead = from_row(
            rows.first()
                .ok_or_else(|| ServiceError::NotFound(format!("lead {id}")))?,
        )?;

        if lead.stage.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "lead {id} is {} and cannot change stage",
                lead.stage
            )));
        }

        lead.stage = stage;
        lead.updated_at = now;
        self.db
            .exec(
                "UPDATE leads SET stage = ?1, data = ?2 WHERE id = ?3 AND owner_id = ?4",
                &[
                    Value::Text(stage.as_str().to_string()),
                    Value::Text(to_json(&lead)?),
                    Value::Text(id.to_string()),
                    Value::Text(owner_id.to_string()),
                ],
            )
            .map_err(storage_err)?;

        self.insert_stage_event(&StageEvent {
            id: lariat_core::new_id(),
            owner_id: owner_id.to_string(),
            lead_id: id.to_string(),
            stage,
            at: now,
        })?;
        Ok(lead)
    }

    pub fn insert_conversation(&self, conv: &Conversation) -> Result<(), ServiceError> {
        let open = conv.has_follow_up && !conv.follow_up_done;
        self.db
            .exec(
                "INSERT INTO conversations (id, owner_id, lead_id, date_ms, open_follow_up, data) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                &[
                    Value::Text(conv.id.clone()),
                    Value::Text(conv.owner_id.clone()),
                    Value::Text(conv.lead_id.clone()),
                    Value::Integer(ms(conv.date)),
                    Value::Integer(open as i64),
                    Value::Text(to_json(conv)?),
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn insert_reminder(&self, reminder: &Reminder) -> Result<(), ServiceError> {
        self.db
            .exec(
                "INSERT INTO reminders (id, owner_id, done, due_ms, data) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                &[
                    Value::Text(reminder.id.clone()),
                    Value::Text(reminder.owner_id.clone()),
                    Value::Integer(reminder.done as i64),
                    Value::Integer(ms(reminder.due_date)),
                    Value::Text(to_json(reminder)?),
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    fn insert_stage_event(&self, event: &StageEvent) -> Result<(), ServiceError> {
        self.db
            .exec(
                "INSERT INTO lead_events (id, owner_id, lead_id, at_ms, data) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                &[
                    Value::Text(event.id.clone()),
                    Value::Text(event.owner_id.clone()),
                    Value::Text(event.lead_id.clone()),
                    Value::Integer(ms(event.at)),
                    Value::Text(to_json(event)?),
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }
}

impl RecordStore for SqlRecordStore {
    fn find_leads(&self, owner_id: &str, filter: &LeadFilter) -> Result<Vec<Lead>, ServiceError> {
        let mut sql = String::from("SELECT data FROM leads WHERE owner_id = ?1");
        let mut params = vec![Value::Text(owner_id.to_string())];

        if let Some((start, end)) = filter.created_in {
            sql.push_str(&format!(
                " AND created_ms >= ?{} AND created_ms < ?{}",
                params.len() + 1,
                params.len() + 2
            ));
            params.push(Value::Integer(ms(start)));
            params.push(Value::Integer(ms(end)));
        }
        if filter.active_only {
            sql.push_str(" AND stage NOT IN ('CONVERTED', 'LOST')");
        }
        sql.push_str(" ORDER BY created_ms ASC, id ASC");

        let rows = self.db.query(&sql, &params).map_err(storage_err)?;
        rows.iter().map(from_row).collect()
    }

    fn find_conversations(
        &self,
        owner_id: &str,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, ServiceError> {
        let mut sql = String::from("SELECT data FROM conversations WHERE owner_id = ?1");
        let mut params = vec![Value::Text(owner_id.to_string())];

        if let Some(ref lead_id) = filter.lead_id {
            sql.push_str(&format!(" AND lead_id = ?{}", params.len() + 1));
            params.push(Value::Text(lead_id.clone()));
        }
        if let Some((start, end)) = filter.date_in {
            sql.push_str(&format!(
                " AND date_ms >= ?{} AND date_ms < ?{}",
                params.len() + 1,
                params.len() + 2
            ));
            params.push(Value::Integer(ms(start)));
            params.push(Value::Integer(ms(end)));
        }
        if filter.open_follow_up {
            sql.push_str(" AND open_follow_up = 1");
        }
        sql.push_str(" ORDER BY date_ms ASC, id ASC");

        let rows = self.db.query(&sql, &params).map_err(storage_err)?;
        rows.iter().map(from_row).collect()
    }

    fn find_reminders(
        &self,
        owner_id: &str,
        filter: &ReminderFilter,
    ) -> Result<Vec<Reminder>, ServiceError> {
        let mut sql = String::from("SELECT data FROM reminders WHERE owner_id = ?1");
        if filter.open_only {
            sql.push_str(" AND done = 0");
        }
        sql.push_str(" ORDER BY due_ms ASC, id ASC");

        let rows = self
            .db
            .query(&sql, &[Value::Text(owner_id.to_string())])
            .map_err(storage_err)?;
        rows.iter().map(from_row).collect()
    }

    fn find_stage_events(
        &self,
        owner_id: &str,
        filter: &StageEventFilter,
    ) -> Result<Vec<StageEvent>, ServiceError> {
        let mut sql = String::from("SELECT data FROM lead_events WHERE owner_id = ?1");
        let mut params = vec![Value::Text(owner_id.to_string())];

        if let Some((start, end)) = filter.at_in {
            sql.push_str(&format!(
                " AND at_ms >= ?{} AND at_ms < ?{}",
                params.len() + 1,
                params.len() + 2
            ));
            params.push(Value::Integer(ms(start)));
            params.push(Value::Integer(ms(end)));
        }
        sql.push_str(" ORDER BY at_ms ASC, id ASC");

        let rows = self.db.query(&sql, &params).map_err(storage_err)?;
        rows.iter().map(from_row).collect()
    }

    fn find_notifications(
        &self,
        owner_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, ServiceError> {
        let mut sql = String::from("SELECT data FROM notifications WHERE owner_id = ?1");
        let mut params = vec![Value::Text(owner_id.to_string())];

        if filter.unread_only {
            sql.push_str(" AND is_read = 0");
        }
        sql.push_str(" ORDER BY created_ms DESC, id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", params.len() + 1));
            params.push(Value::Integer(limit as i64));
        }

        let rows = self.db.query(&sql, &params).map_err(storage_err)?;
        rows.iter().map(from_row).collect()
    }

    fn get_notification(&self, id: &str, owner_id: &str) -> Result<Notification, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT data FROM notifications WHERE id = ?1 AND owner_id = ?2",
                &[Value::Text(id.to_string()), Value::Text(owner_id.to_string())],
            )
            .map_err(storage_err)?;
        from_row(
            rows.first()
                .ok_or_else(|| ServiceError::NotFound(format!("notification {id}")))?,
        )
    }

    fn insert_notification(&self, notification: &Notification) -> Result<(), ServiceError> {
        self.db
            .exec(
                "INSERT INTO notifications (id, owner_id, is_read, created_ms, data) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                &[
                    Value::Text(notification.id.clone()),
                    Value::Text(notification.owner_id.clone()),
                    Value::Integer(notification.is_read as i64),
                    Value::Integer(ms(notification.created_at)),
                    Value::Text(to_json(notification)?),
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    fn update_notification(&self, notification: &Notification) -> Result<(), ServiceError> {
        let affected = self
            .db
            .exec(
                "UPDATE notifications SET is_read = ?1, data = ?2 \
                 WHERE id = ?3 AND owner_id = ?4",
                &[
                    Value::Integer(notification.is_read as i64),
                    Value::Text(to_json(notification)?),
                    Value::Text(notification.id.clone()),
                    Value::Text(notification.owner_id.clone()),
                ],
            )
            .map_err(storage_err)?;
        if affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "notification {}",
                notification.id
            )));
        }
        Ok(())
    }

    fn mark_all_notifications_read(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        // json_set keeps the data column in step with the indexed flag so a
        // later read deserializes the transitioned state.
        self.db
            .exec(
                "UPDATE notifications SET is_read = 1, \
                 data = json_set(data, '$.isRead', json('true'), '$.updatedAt', ?1) \
                 WHERE owner_id = ?2 AND is_read = 0",
                &[
                    Value::Text(now.to_rfc3339()),
                    Value::Text(owner_id.to_string()),
                ],
            )
            .map_err(storage_err)
    }

    fn delete_notification(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Notification, ServiceError> {
        let existing = self.get_notification(id, owner_id)?;
        self.db
            .exec(
                "DELETE FROM notifications WHERE id = ?1 AND owner_id = ?2",
                &[Value::Text(id.to_string()), Value::Text(owner_id.to_string())],
            )
            .map_err(storage_err)?;
        Ok(existing)
    }

    fn count_unread(&self, owner_id: &str) -> Result<i64, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT COUNT(*) AS cnt FROM notifications WHERE owner_id = ?1 AND is_read = 0",
                &[Value::Text(owner_id.to_string())],
            )
            .map_err(storage_err)?;
        Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::model::{ConversationKind, NotificationKind};
    use lariat_sql::SqliteStore;

    pub fn test_store() -> SqlRecordStore {
        let db = Arc::new(SqliteStore::open_in_memory().unwrap());
        SqlRecordStore::new(db).unwrap()
    }

    pub fn dt(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    pub fn lead(id: &str, owner: &str, stage: LeadStage, created: &str) -> Lead {
        Lead {
            id: id.into(),
            owner_id: owner.into(),
            name: format!("lead {id}"),
            company: Some("Acme".into()),
            email: None,
            source: Some("web".into()),
            stage,
            created_at: dt(created),
            updated_at: dt(created),
        }
    }

    pub fn conversation(id: &str, owner: &str, lead_id: &str, date: &str) -> Conversation {
        Conversation {
            id: id.into(),
            owner_id: owner.into(),
            lead_id: lead_id.into(),
            kind: ConversationKind::Call,
            date: dt(date),
            notes: None,
            has_follow_up: false,
            follow_up_date: None,
            follow_up_done: false,
        }
    }

    pub fn reminder(id: &str, owner: &str, due: &str, priority: i64) -> Reminder {
        Reminder {
            id: id.into(),
            owner_id: owner.into(),
            lead_id: None,
            title: format!("reminder {id}"),
            due_date: dt(due),
            priority,
            done: false,
            created_at: dt("2026-01-01T00:00:00Z"),
        }
    }

    pub fn notification(id: &str, owner: &str, created: &str) -> Notification {
        Notification {
            id: id.into(),
            owner_id: owner.into(),
            title: "New lead".into(),
            message: "A lead was added".into(),
            kind: NotificationKind::Lead,
            is_read: false,
            related_id: None,
            related_type: None,
            created_at: dt(created),
            updated_at: dt(created),
        }
    }
}
