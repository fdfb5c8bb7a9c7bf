use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::models::NotificationStatus;
use crate::store::NotificationStore;
use crate::transport::{EmailTransport, OutboundEmail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Sent,
    Skipped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Forwards pending notifications to an email transport, one record per call.
pub struct Relay<S, T> {
    store: S,
    transport: T,
    from: String,
    unrecorded: Mutex<HashSet<Uuid>>,
}

impl<S, T> Relay<S, T>
where
    S: NotificationStore,
    T: EmailTransport,
{
    pub fn new(store: S, transport: T, from: impl Into<String>) -> Self {
        Self {
            store,
            transport,
            from: from.into(),
            unrecorded: Mutex::new(HashSet::new()),
        }
    }

    fn is_unrecorded(&self, id: Uuid) -> bool {
        self.unrecorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Attempts exactly one delivery for `id`.
    ///
    /// Records that are missing or not pending are skipped without touching
    /// the transport. Delivery failures are persisted on the record and then
    /// returned as [`RelayError::TransportFailure`].
    pub async fn handle(&self, id: Uuid) -> Result<RelayOutcome, RelayError> {
        if self.is_unrecorded(id) {
            tracing::debug!(notification_id = %id, "outcome already attempted, skipping");
            return Ok(RelayOutcome::Skipped);
        }

        let Some(record) = self.store.load(id).await? else {
            tracing::debug!(notification_id = %id, "notification not found, skipping");
            return Ok(RelayOutcome::Skipped);
        };

        if record.status != Some(NotificationStatus::Pending) {
            tracing::debug!(
                notification_id = %id,
                status = ?record.status,
                "notification not pending, skipping"
            );
            return Ok(RelayOutcome::Skipped);
        }

        let email = OutboundEmail {
            from: self.from.clone(),
            to: record.to,
            subject: record.subject,
            body: record.message,
        };

        match self.transport.send(&email).await {
            Ok(()) => {
                tracing::info!(
                    notification_id = %id,
                    transport = self.transport.name(),
                    "notification sent"
                );
                let written = self.store.mark_sent(id, Utc::now()).await;
                self.record_outcome(id, written);
                Ok(RelayOutcome::Sent)
            }
            Err(source) => {
                let reason = source.to_string();
                tracing::error!(notification_id = %id, error = %reason, "error sending email");
                let written = self.store.mark_failed(id, &reason).await;
                self.record_outcome(id, written);
                Err(RelayError::TransportFailure { id, source })
            }
        }
    }

    /// Logs the terminal status write. When it could not be persisted the id
    /// is remembered so later polls do not deliver the same record again.
    fn record_outcome(&self, id: Uuid, written: anyhow::Result<bool>) {
        match written {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                notification_id = %id,
                "write conflict: notification left pending state during delivery"
            ),
            Err(err) => {
                tracing::error!(
                    notification_id = %id,
                    error = %err,
                    "failed to record delivery outcome"
                );
                self.unrecorded
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(id);
            }
        }
    }

    /// Handles each currently pending id in isolation.
    pub async fn drain(&self, limit: i64) -> Result<BatchSummary, RelayError> {
        let ids = self.store.pending_ids(limit).await?;
        let mut summary = BatchSummary::default();

        for id in ids {
            match self.handle(id).await {
                Ok(RelayOutcome::Sent) => summary.sent += 1,
                Ok(RelayOutcome::Skipped) => summary.skipped += 1,
                Err(RelayError::TransportFailure { .. }) => summary.failed += 1,
                Err(err @ RelayError::Store(_)) => {
                    tracing::error!(notification_id = %id, error = %err, "store error while relaying");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Polls the outbox until `shutdown` resolves.
///
/// Pending rows are re-observed on every tick, so a record whose handler
/// crashed before writing a terminal status is picked up again after a
/// restart. Within one process, ids whose outcome could not be written are
/// not delivered twice.
pub async fn run_worker<S, T, F>(
    relay: &Relay<S, T>,
    config: &RelayConfig,
    shutdown: F,
) -> anyhow::Result<()>
where
    S: NotificationStore,
    T: EmailTransport,
    F: Future<Output = ()>,
{
    tracing::info!(
        poll_interval_secs = config.poll_interval.as_secs(),
        batch_size = config.batch_size,
        "notification relay starting"
    );

    let mut interval = tokio::time::interval(config.poll_interval);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("notification relay shutting down");
                return Ok(());
            }
            _ = interval.tick() => {
                match relay.drain(config.batch_size).await {
                    Ok(summary) if summary != BatchSummary::default() => {
                        tracing::info!(
                            sent = summary.sent,
                            skipped = summary.skipped,
                            failed = summary.failed,
                            "relay batch complete"
                        );
                    }
                    Ok(_) => {}
                    Err(err) => tracing::error!(error = %err, "failed to poll pending notifications"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::error::TransportError;
    use crate::models::{NewNotification, NotificationRecord, UrgencyTier};
    use crate::store::memory::MemoryStore;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<OutboundEmail>>,
        fail: AtomicBool,
    }

    impl RecordingTransport {
        fn failing() -> Self {
            let transport = Self::default();
            transport.fail.store(true, Ordering::SeqCst);
            transport
        }

        fn sent(&self) -> Vec<OutboundEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<'a> EmailTransport for &'a RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(email.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError::Rejected {
                    status: 535,
                    body: "authentication failed".into(),
                });
            }
            Ok(())
        }
    }

    fn pending_record() -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            to: "patient@example.com".into(),
            subject: "Urgent dermatology follow-up".into(),
            message: "Please call the clinic.".into(),
            photo_url: None,
            urgency_level: Some("urgent".into()),
            status: Some(NotificationStatus::Pending),
            created_at: Utc::now(),
            sent_at: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn successful_delivery_marks_record_sent() {
        let transport = RecordingTransport::default();
        let relay = Relay::new(MemoryStore::default(), &transport, "clinic@example.com");
        let record = pending_record();
        relay.store.put(record.clone());

        let outcome = relay.handle(record.id).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Sent);

        let stored = relay.store.get(record.id).unwrap();
        assert_eq!(stored.status, Some(NotificationStatus::Sent));
        assert!(stored.sent_at.is_some());
        assert!(stored.error.is_none());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "clinic@example.com");
        assert_eq!(sent[0].to, "patient@example.com");
        assert_eq!(sent[0].body, "Please call the clinic.");
    }

    #[tokio::test]
    async fn failed_delivery_records_error_and_propagates() {
        let transport = RecordingTransport::failing();
        let relay = Relay::new(MemoryStore::default(), &transport, "clinic@example.com");
        let record = pending_record();
        relay.store.put(record.clone());

        let err = relay.handle(record.id).await.unwrap_err();
        assert!(matches!(err, RelayError::TransportFailure { id, .. } if id == record.id));

        let stored = relay.store.get(record.id).unwrap();
        assert_eq!(stored.status, Some(NotificationStatus::Error));
        assert!(stored.sent_at.is_none());
        assert!(stored.error.unwrap().contains("authentication failed"));
    }

    #[tokio::test]
    async fn store_error_keeps_transport_failure_and_blocks_resend() {
        let transport = RecordingTransport::failing();
        let store = MemoryStore::default();
        store.fail_writes(true);
        let relay = Relay::new(store, &transport, "clinic@example.com");
        let record = pending_record();
        relay.store.put(record.clone());

        let err = relay.handle(record.id).await.unwrap_err();
        match err {
            RelayError::TransportFailure { id, source } => {
                assert_eq!(id, record.id);
                assert!(matches!(source, TransportError::Rejected { status: 535, .. }));
            }
            other => panic!("expected transport failure, got {other}"),
        }
        assert_eq!(
            relay.store.get(record.id).unwrap().status,
            Some(NotificationStatus::Pending)
        );

        let summary = relay.drain(10).await.unwrap();
        assert_eq!(summary, BatchSummary { sent: 0, skipped: 1, failed: 0 });
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn unrecorded_success_is_not_delivered_again() {
        let transport = RecordingTransport::default();
        let store = MemoryStore::default();
        store.fail_writes(true);
        let relay = Relay::new(store, &transport, "clinic@example.com");
        let record = pending_record();
        relay.store.put(record.clone());

        assert_eq!(relay.handle(record.id).await.unwrap(), RelayOutcome::Sent);
        assert_eq!(relay.handle(record.id).await.unwrap(), RelayOutcome::Skipped);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn terminal_records_are_never_resent() {
        let transport = RecordingTransport::default();
        let relay = Relay::new(MemoryStore::default(), &transport, "clinic@example.com");
        let record = pending_record();
        relay.store.put(record.clone());

        relay.handle(record.id).await.unwrap();
        let after_first = relay.store.get(record.id).unwrap();

        assert_eq!(relay.handle(record.id).await.unwrap(), RelayOutcome::Skipped);
        assert_eq!(relay.handle(record.id).await.unwrap(), RelayOutcome::Skipped);
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(relay.store.get(record.id).unwrap(), after_first);
    }

    #[tokio::test]
    async fn errored_records_are_not_retried() {
        let transport = RecordingTransport::failing();
        let relay = Relay::new(MemoryStore::default(), &transport, "clinic@example.com");
        let record = pending_record();
        relay.store.put(record.clone());

        assert!(relay.handle(record.id).await.is_err());
        assert_eq!(relay.handle(record.id).await.unwrap(), RelayOutcome::Skipped);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn missing_or_malformed_status_is_ignored() {
        let transport = RecordingTransport::default();
        let relay = Relay::new(MemoryStore::default(), &transport, "clinic@example.com");

        let mut malformed = pending_record();
        malformed.status = None;
        relay.store.put(malformed.clone());

        assert_eq!(relay.handle(malformed.id).await.unwrap(), RelayOutcome::Skipped);
        assert_eq!(relay.handle(Uuid::new_v4()).await.unwrap(), RelayOutcome::Skipped);
        assert!(transport.sent().is_empty());
        assert_eq!(relay.store.get(malformed.id).unwrap(), malformed);
    }

    #[tokio::test]
    async fn drain_handles_each_record_in_isolation() {
        let transport = RecordingTransport::default();
        let relay = Relay::new(MemoryStore::default(), &transport, "clinic@example.com");

        let first = relay
            .store
            .insert(&NewNotification {
                to: "a@example.com".into(),
                subject: "one".into(),
                message: "first".into(),
                photo_url: None,
                urgency_level: Some(UrgencyTier::High),
            })
            .await
            .unwrap();
        let mut sent_already = pending_record();
        sent_already.status = Some(NotificationStatus::Sent);
        relay.store.put(sent_already);

        let summary = relay.drain(10).await.unwrap();
        assert_eq!(summary, BatchSummary { sent: 1, skipped: 0, failed: 0 });
        assert_eq!(
            relay.store.get(first).unwrap().urgency_level.as_deref(),
            Some("high")
        );

        let summary = relay.drain(10).await.unwrap();
        assert_eq!(summary, BatchSummary::default());
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn drain_counts_failures_without_stopping() {
        let transport = RecordingTransport::failing();
        let relay = Relay::new(MemoryStore::default(), &transport, "clinic@example.com");
        relay.store.put(pending_record());
        relay.store.put(pending_record());

        let summary = relay.drain(10).await.unwrap();
        assert_eq!(summary.failed, 2);
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn worker_delivers_then_stops_on_shutdown() {
        let transport = RecordingTransport::default();
        let relay = Relay::new(MemoryStore::default(), &transport, "clinic@example.com");
        let record = pending_record();
        relay.store.put(record.clone());

        let config = RelayConfig {
            poll_interval: Duration::from_millis(10),
            batch_size: 5,
        };
        run_worker(&relay, &config, tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();

        assert_eq!(
            relay.store.get(record.id).unwrap().status,
            Some(NotificationStatus::Sent)
        );
        assert_eq!(transport.sent().len(), 1);
    }
}
