//! Storage of per-participant mention histories.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::base::{
    retention::Retention,
    types::{MentionRecord, Res, Void},
};

pub mod surreal;

// Traits.

/// Generic database client trait that clients must implement.
///
/// A history is the oldest-first list of records owned by one participant.
/// Implementations only load and store whole histories; ordering, retention
/// and locking are handled by `DbClient`.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Loads the history for `target_id`, empty if none is stored.
    async fn load_history(&self, target_id: &str) -> Res<Vec<MentionRecord>>;

    /// Replaces the history for `target_id`.
    ///
    /// Storing an empty history removes it.
    async fn store_history(&self, target_id: &str, records: Vec<MentionRecord>) -> Void;
}

// Structs.

/// Database client for the whoasked bot.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
/// Every access goes through one shared lock, and histories are kept in timestamp order.
#[derive(Clone)]
pub struct DbClient {
    inner: Arc<dyn GenericDbClient>,
    lock: Arc<Mutex<()>>,
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self {
            inner,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Appends a record to its owner's history and applies retention.
    ///
    /// Returns the length of the history afterwards.
    #[instrument(skip(self, record, retention), fields(target_id = %record.target_id))]
    pub async fn append_record(&self, record: MentionRecord, retention: &Retention, now: DateTime<Utc>) -> Res<usize> {
        let _guard = self.lock.lock().await;

        let target_id = record.target_id.clone();
        let mut history = self.inner.load_history(&target_id).await?;

        // Events may be written out of order; keep the history sorted by event time.
        let position = history.partition_point(|existing| existing.timestamp <= record.timestamp);
        history.insert(position, record);
        let removed = retention.apply(&mut history, now);

        if removed > 0 {
            debug!("Evicted {} record(s) for `{}`.", removed, target_id);
        }

        let len = history.len();
        self.inner.store_history(&target_id, history).await?;

        Ok(len)
    }

    /// Reads a history with expired records pruned, oldest first.
    ///
    /// The pruned history is written back when anything was dropped.
    #[instrument(skip(self, retention))]
    pub async fn read_history(&self, target_id: &str, retention: &Retention, now: DateTime<Utc>) -> Res<Vec<MentionRecord>> {
        let _guard = self.lock.lock().await;

        let mut history = self.inner.load_history(target_id).await?;

        if retention.apply(&mut history, now) > 0 {
            debug!("Pruned stale records for `{}` on read.", target_id);
            self.inner.store_history(target_id, history.clone()).await?;
        }

        Ok(history)
    }

    /// Forgets everything stored for `target_id`.
    #[instrument(skip(self))]
    pub async fn clear_history(&self, target_id: &str) -> Void {
        let _guard = self.lock.lock().await;

        self.inner.store_history(target_id, Vec::new()).await
    }

    /// Reads a history exactly as stored, without pruning it.
    #[instrument(skip(self))]
    pub async fn stored_history(&self, target_id: &str) -> Res<Vec<MentionRecord>> {
        let _guard = self.lock.lock().await;

        self.inner.load_history(target_id).await
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::base::types::MentionKind;

    fn record(source: &str, text: &str, timestamp: DateTime<Utc>) -> MentionRecord {
        MentionRecord {
            target_id: "UA".to_string(),
            source_id: source.to_string(),
            source_name: source.to_lowercase(),
            group_id: "C1".to_string(),
            timestamp,
            kind: MentionKind::Mention,
            content_snippet: text.to_string(),
            quoted_snippet: None,
        }
    }

    fn texts(history: &[MentionRecord]) -> Vec<&str> {
        history.iter().map(|r| r.content_snippet.as_str()).collect()
    }

    #[tokio::test]
    async fn late_writes_are_placed_by_event_time() {
        let db = DbClient::surreal_memory().await.unwrap();
        let retention = Retention::new(25, 3);
        let now = Utc::now();

        db.append_record(record("UB", "second", now - Duration::minutes(3)), &retention, now).await.unwrap();
        db.append_record(record("UC", "third", now - Duration::minutes(1)), &retention, now).await.unwrap();
        db.append_record(record("UD", "first", now - Duration::minutes(5)), &retention, now).await.unwrap();

        assert_eq!(texts(&db.stored_history("UA").await.unwrap()), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn late_older_write_does_not_evict_newer_record() {
        let db = DbClient::surreal_memory().await.unwrap();
        let retention = Retention::new(1, 3);
        let now = Utc::now();

        db.append_record(record("UC", "newer", now - Duration::minutes(1)), &retention, now).await.unwrap();
        db.append_record(record("UB", "older", now - Duration::minutes(5)), &retention, now).await.unwrap();

        let history = db.read_history("UA", &retention, now).await.unwrap();
        assert_eq!(texts(&history), vec!["newer"]);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let db = DbClient::surreal_memory().await.unwrap();
        let retention = Retention::new(25, 3);
        let now = Utc::now();

        db.append_record(record("UB", "hi", now), &retention, now).await.unwrap();
        db.clear_history("UA").await.unwrap();

        assert!(db.stored_history("UA").await.unwrap().is_empty());
    }
}
