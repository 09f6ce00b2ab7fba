//! Notification hub — the durable unread ledger plus best-effort live push.
//!
//! The ledger is authoritative: every notification is persisted before any
//! push is attempted, so a client with no live connection still finds the
//! record on its next list. Push failures never surface to callers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lariat_core::{new_id, ServiceError};
use serde::Deserialize;

use crate::model::{Notification, NotificationFilter, NotificationKind};
use crate::notify::registry::{NotificationPush, PushEvent};
use crate::store::RecordStore;

/// Payload for creating a notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub related_id: Option<String>,
    #[serde(default)]
    pub related_type: Option<String>,
}

pub struct NotificationHub {
    store: Arc<dyn RecordStore>,
    push: Arc<dyn NotificationPush>,
}

impl NotificationHub {
    pub fn new(store: Arc<dyn RecordStore>, push: Arc<dyn NotificationPush>) -> Self {
        Self { store, push }
    }

    /// Persist a new unread notification, then push it to the owner's live
    /// connections. The push is fire-and-forget: the record is already
    /// durable by the time delivery is attempted.
    pub fn create(
        &self,
        owner_id: &str,
        req: NewNotification,
        now: DateTime<Utc>,
    ) -> Result<Notification, ServiceError> {
        let notification = Notification {
            id: new_id(),
            owner_id: owner_id.to_string(),
            title: req.title,
            message: req.message,
            kind: req.kind,
            is_read: false,
            related_id: req.related_id,
            related_type: req.related_type,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_notification(&notification)?;
        self.push.push(
            owner_id,
            PushEvent {
                title: notification.title.clone(),
                message: notification.message.clone(),
                kind: Some(notification.kind),
            },
        );
        Ok(notification)
    }

    /// Newest first.
    pub fn list(
        &self,
        owner_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, ServiceError> {
        self.store.find_notifications(owner_id, filter)
    }

    /// Flip `is_read` false→true. Idempotent: marking an already-read
    /// notification returns it unchanged, `updated_at` included.
    pub fn mark_read(
        &self,
        id: &str,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Notification, ServiceError> {
        let mut notification = self.store.get_notification(id, owner_id)?;
        if notification.is_read {
            return Ok(notification);
        }
        notification.is_read = true;
        notification.updated_at = now;
        self.store.update_notification(&notification)?;
        Ok(notification)
    }

    /// Mark every unread notification of the owner read in one atomic
    /// statement. Returns how many were actually transitioned.
    pub fn mark_all_read(&self, owner_id: &str, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        self.store.mark_all_notifications_read(owner_id, now)
    }

    /// Terminal from any state; the removed record is returned.
    pub fn delete(&self, id: &str, owner_id: &str) -> Result<Notification, ServiceError> {
        self.store.delete_notification(id, owner_id)
    }

    /// Derived from the persisted rows on every call.
    pub fn unread_count(&self, owner_id: &str) -> Result<i64, ServiceError> {
        self.store.count_unread(owner_id)
    }
}
