use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// How a target was referenced by a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MentionKind {
    Mention,
    Quote,
}

/// One stored "someone asked you" entry, owned by `target_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MentionRecord {
    pub target_id: String,
    pub source_id: String,
    pub source_name: String,
    pub group_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MentionKind,
    pub content_snippet: String,
    #[serde(default)]
    pub quoted_snippet: Option<String>,
}

/// The message being replied to, as seen from the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedMessage {
    pub sender_id: String,
    pub text: String,
}

/// A chat message normalized away from any particular chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub group_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    /// Participant ids in order of appearance; may contain duplicates.
    pub mentions: Vec<String>,
    pub quoted: Option<QuotedMessage>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Every participant this message refers to, once each, in order of appearance.
    ///
    /// The quoted sender comes last. A participant that is both mentioned and quoted
    /// is reported once, as a quote.
    pub fn targets(&self) -> Vec<(String, MentionKind)> {
        let mut targets: Vec<(String, MentionKind)> = Vec::new();

        for id in self.mentions.iter().filter(|id| !id.is_empty()) {
            if !targets.iter().any(|(existing, _)| existing == id) {
                targets.push((id.clone(), MentionKind::Mention));
            }
        }

        if let Some(quoted) = self.quoted.as_ref().filter(|q| !q.sender_id.is_empty()) {
            match targets.iter_mut().find(|(existing, _)| *existing == quoted.sender_id) {
                Some(entry) => entry.1 = MentionKind::Quote,
                None => targets.push((quoted.sender_id.clone(), MentionKind::Quote)),
            }
        }

        targets
    }
}

// Tests.
