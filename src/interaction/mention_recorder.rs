//! Records who mentioned or quoted whom.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{Instrument, debug, error, info, instrument};

use crate::{
    base::{
        config::Config,
        replies::snippet,
        retention::Retention,
        types::{ChatMessage, MentionKind, MentionRecord, Res, Void},
    },
    service::{chat::ChatClient, db::DbClient},
};

/// Handles a raw message event.
///
/// Spawns a task that normalizes the event and records every mention or quote
/// in it. Failures are logged and never reach the caller.
#[instrument(skip_all)]
pub fn handle_message_event(event: Value, db: DbClient, chat: ChatClient, config: Config) {
    tokio::spawn(async move {
        // Process the event.
        let result = handle_message_event_internal(event, &db, &chat, &config).in_current_span().await;

        // Log any errors.
        if let Err(err) = &result {
            error!("Error while recording mentions: {}", err);
        }
    });
}

#[instrument(skip_all)]
async fn handle_message_event_internal(event: Value, db: &DbClient, chat: &ChatClient, config: &Config) -> Void {
    let Some(message) = chat.resolve_message(&event).await? else {
        debug!("Ignoring event that is not a user message.");
        return Ok(());
    };

    record_mentions(&message, chat.bot_user_id(), db, &config.retention(), Utc::now()).await?;

    Ok(())
}

/// Appends one record per target of `message` to that target's history.
///
/// Neither the bot nor the sender is ever a target. Returns how many records were written.
#[instrument(skip_all, fields(group_id = %message.group_id, sender_id = %message.sender_id))]
pub async fn record_mentions(message: &ChatMessage, bot_user_id: &str, db: &DbClient, retention: &Retention, now: DateTime<Utc>) -> Res<usize> {
    let mut written = 0;

    for (target_id, kind) in message.targets() {
        if target_id == bot_user_id || target_id == message.sender_id {
            continue;
        }

        let record = MentionRecord {
            target_id,
            source_id: message.sender_id.clone(),
            source_name: message.sender_name.clone(),
            group_id: message.group_id.clone(),
            timestamp: message.timestamp,
            kind,
            content_snippet: snippet(&message.text),
            quoted_snippet: message.quoted.as_ref().map(|q| snippet(&q.text)).filter(|_| kind == MentionKind::Quote),
        };

        let len = db.append_record(record, retention, now).await?;
        debug!("History now holds {} record(s).", len);

        written += 1;
    }

    if written > 0 {
        info!("Recorded {} mention(s).", written);
    }

    Ok(written)
}

// Tests.

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::base::types::QuotedMessage;

    fn message(mentions: &[&str], quoted: Option<(&str, &str)>, timestamp: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            group_id: "C1".to_string(),
            sender_id: "UB".to_string(),
            sender_name: "bob".to_string(),
            text: "look at this".to_string(),
            mentions: mentions.iter().map(|m| m.to_string()).collect(),
            quoted: quoted.map(|(sender_id, text)| QuotedMessage {
                sender_id: sender_id.to_string(),
                text: text.to_string(),
            }),
            timestamp,
        }
    }

    #[tokio::test]
    async fn records_each_target_once() {
        let db = DbClient::surreal_memory().await.unwrap();
        let retention = Retention::new(25, 3);
        let now = Utc::now();

        let written = record_mentions(&message(&["UA", "UA", "UC"], Some(("UD", "my idea")), now), "UBOT", &db, &retention, now).await.unwrap();

        assert_eq!(written, 3);

        let history = db.read_history("UA", &retention, now).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, MentionKind::Mention);
        assert_eq!(history[0].quoted_snippet, None);

        let history = db.read_history("UD", &retention, now).await.unwrap();
        assert_eq!(history[0].kind, MentionKind::Quote);
        assert_eq!(history[0].quoted_snippet.as_deref(), Some("my idea"));
    }

    #[tokio::test]
    async fn bot_is_never_a_target() {
        let db = DbClient::surreal_memory().await.unwrap();
        let retention = Retention::new(25, 3);
        let now = Utc::now();

        let written = record_mentions(&message(&["UBOT"], None, now), "UBOT", &db, &retention, now).await.unwrap();

        assert_eq!(written, 0);
        assert!(db.read_history("UBOT", &retention, now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sender_is_never_their_own_target() {
        let db = DbClient::surreal_memory().await.unwrap();
        let retention = Retention::new(25, 3);
        let now = Utc::now();

        // Bob mentions himself and replies in his own thread.
        let written = record_mentions(&message(&["UB", "UA"], Some(("UB", "my own post")), now), "UBOT", &db, &retention, now).await.unwrap();

        assert_eq!(written, 1);
        assert!(db.read_history("UB", &retention, now).await.unwrap().is_empty());
        assert_eq!(db.read_history("UA", &retention, now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_is_capped_on_write() {
        let db = DbClient::surreal_memory().await.unwrap();
        let retention = Retention::new(3, 3);
        let now = Utc::now();

        for i in 0..5 {
            let mut message = message(&["UA"], None, now - Duration::minutes(5 - i));
            message.text = format!("message {i}");
            record_mentions(&message, "UBOT", &db, &retention, now).await.unwrap();
        }

        let history = db.read_history("UA", &retention, now).await.unwrap();
        let texts: Vec<_> = history.iter().map(|r| r.content_snippet.as_str()).collect();

        assert_eq!(texts, vec!["message 2", "message 3", "message 4"]);
    }
}
