use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{NewNotification, NotificationRecord};

/// Persistence seam for the notification outbox.
///
/// `mark_sent` and `mark_failed` only touch rows that are still pending and
/// return `false` when nothing was updated, which the relay reports as a
/// write conflict.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: &NewNotification) -> anyhow::Result<Uuid>;

    async fn load(&self, id: Uuid) -> anyhow::Result<Option<NotificationRecord>>;

    /// Oldest pending ids first.
    async fn pending_ids(&self, limit: i64) -> anyhow::Result<Vec<Uuid>>;

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> anyhow::Result<bool>;

    async fn mark_failed(&self, id: Uuid, reason: &str) -> anyhow::Result<bool>;
}
