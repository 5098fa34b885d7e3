//! Age and count limits applied to a participant's history.
//!
//! Pruning is lazy: a history is only trimmed when it is written or read, so
//! stale records may sit in storage until the owner is next touched.

use chrono::{DateTime, Duration, Utc};

use super::types::MentionRecord;

/// Retention policy for a single history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub max_messages: usize,
    pub storage_days: u32,
}

impl Retention {
    pub fn new(max_messages: usize, storage_days: u32) -> Self {
        Self { max_messages, storage_days }
    }

    /// Records at or before this instant are expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.storage_days))
    }

    /// Drops expired records, then the oldest records beyond the cap.
    ///
    /// `history` must be oldest-first. Returns how many records were removed.
    pub fn apply(&self, history: &mut Vec<MentionRecord>, now: DateTime<Utc>) -> usize {
        let before = history.len();
        let cutoff = self.cutoff(now);

        history.retain(|record| record.timestamp > cutoff);

        if history.len() > self.max_messages {
            let excess = history.len() - self.max_messages;
            history.drain(..excess);
        }

        before - history.len()
    }

    /// The newest unexpired records, newest first, at most `max_messages` of them.
    pub fn most_recent<'a>(&self, history: &'a [MentionRecord], now: DateTime<Utc>) -> Vec<&'a MentionRecord> {
        let cutoff = self.cutoff(now);

        history.iter().rev().filter(|record| record.timestamp > cutoff).take(self.max_messages).collect()
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::types::MentionKind;

    fn record(source: &str, timestamp: DateTime<Utc>) -> MentionRecord {
        MentionRecord {
            target_id: "UA".to_string(),
            source_id: source.to_string(),
            source_name: source.to_lowercase(),
            group_id: "C1".to_string(),
            timestamp,
            kind: MentionKind::Mention,
            content_snippet: format!("ping from {source}"),
            quoted_snippet: None,
        }
    }

    fn sources(history: &[MentionRecord]) -> Vec<&str> {
        history.iter().map(|r| r.source_id.as_str()).collect()
    }

    #[test]
    fn cap_keeps_the_newest_in_order() {
        let now = Utc::now();
        let retention = Retention::new(3, 3);
        let mut history: Vec<_> = (0..5).map(|i| record(&format!("U{i}"), now - Duration::minutes(10 - i))).collect();

        let removed = retention.apply(&mut history, now);

        assert_eq!(removed, 2);
        assert_eq!(sources(&history), vec!["U2", "U3", "U4"]);
    }

    #[test]
    fn one_past_the_cap_evicts_exactly_the_oldest() {
        let now = Utc::now();
        let retention = Retention::new(4, 3);
        let mut history: Vec<_> = (0..4).map(|i| record(&format!("U{i}"), now - Duration::minutes(10 - i))).collect();

        assert_eq!(retention.apply(&mut history, now), 0);

        history.push(record("U4", now));
        assert_eq!(retention.apply(&mut history, now), 1);
        assert_eq!(sources(&history), vec!["U1", "U2", "U3", "U4"]);
    }

    #[test]
    fn expired_records_are_dropped() {
        let now = Utc::now();
        let retention = Retention::new(25, 2);
        let mut history = vec![
            record("UOLD", now - Duration::days(3)),
            record("UEDGE", now - Duration::days(2)),
            record("UNEW", now - Duration::hours(47)),
        ];

        retention.apply(&mut history, now);

        assert_eq!(sources(&history), vec!["UNEW"]);
    }

    #[test]
    fn most_recent_is_newest_first_and_skips_expired() {
        let now = Utc::now();
        let retention = Retention::new(2, 1);
        let history = vec![
            record("UOLD", now - Duration::days(2)),
            record("U1", now - Duration::hours(3)),
            record("U2", now - Duration::hours(2)),
            record("U3", now - Duration::hours(1)),
        ];

        let recent: Vec<_> = retention.most_recent(&history, now).into_iter().map(|r| r.source_id.as_str()).collect();

        assert_eq!(recent, vec!["U3", "U2"]);
    }
}
