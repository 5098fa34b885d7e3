//! User-facing reply text and history formatting.

use super::types::{MentionKind, MentionRecord};

/// Keyword that triggers a query, after the configured prefix.
pub const QUERY_KEYWORD: &str = "whoasked";

/// Argument that clears the requester's history instead of listing it.
pub const CLEAR_ARGUMENT: &str = "clear";

/// Longest snippet kept from a message, in characters.
pub const SNIPPET_MAX_CHARS: usize = 120;

pub const NO_RECORDS_REPLY: &str = "Nobody has asked for you recently.";

pub const NO_RECORDS_IN_CHANNEL_REPLY: &str = "Nobody has asked for you in this channel recently.";

pub const QUERY_FAILED_REPLY: &str = "Sorry, I couldn't look that up right now. Please try again later.";

pub const CLEARED_REPLY: &str = "Done, I've forgotten everyone who asked for you.";

pub const CHANNELS_ONLY_REPLY: &str = "This command only works in channels.";

pub const UNKNOWN_ARGUMENT_REPLY: &str = "Usage: `whoasked` to list who asked for you, or `whoasked clear` to forget them.";

/// Collapses whitespace and cuts `text` down to `SNIPPET_MAX_CHARS` characters.
pub fn snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= SNIPPET_MAX_CHARS {
        return collapsed;
    }

    let mut cut: String = collapsed.chars().take(SNIPPET_MAX_CHARS - 1).collect();
    cut.push('…');
    cut
}

/// Renders records (already newest-first) as a Slack mrkdwn reply.
pub fn render_history(records: &[&MentionRecord]) -> String {
    let mut reply = format!("Here's who asked for you recently ({}):", records.len());

    for record in records {
        let action = match record.kind {
            MentionKind::Mention => "mentioned you",
            MentionKind::Quote => "replied to your message",
        };

        reply.push_str(&format!(
            "\n• *{}* {} in <#{}> at {}: {}",
            record.source_name,
            action,
            record.group_id,
            record.timestamp.format("%Y-%m-%d %H:%M UTC"),
            record.content_snippet
        ));

        if let Some(quoted) = &record.quoted_snippet {
            reply.push_str(&format!("\n    > {quoted}"));
        }
    }

    reply
}

// Tests.

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn short_text_is_kept() {
        assert_eq!(snippet("  hello\n  there "), "hello there");
    }

    #[test]
    fn long_text_is_truncated() {
        let text = "é".repeat(SNIPPET_MAX_CHARS + 10);
        let cut = snippet(&text);

        assert_eq!(cut.chars().count(), SNIPPET_MAX_CHARS);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn renders_mentions_and_quotes() {
        let quote = MentionRecord {
            target_id: "UA".to_string(),
            source_id: "UC".to_string(),
            source_name: "carol".to_string(),
            group_id: "C1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap(),
            kind: MentionKind::Quote,
            content_snippet: "agreed".to_string(),
            quoted_snippet: Some("ship it?".to_string()),
        };
        let mention = MentionRecord {
            source_id: "UB".to_string(),
            source_name: "bob".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap(),
            kind: MentionKind::Mention,
            content_snippet: "<@UA> can you look?".to_string(),
            quoted_snippet: None,
            ..quote.clone()
        };

        let reply = render_history(&[&quote, &mention]);

        assert_eq!(
            reply,
            "Here's who asked for you recently (2):\n\
             • *carol* replied to your message in <#C1> at 2026-10-16 09:30 UTC: agreed\n    > ship it?\n\
             • *bob* mentioned you in <#C1> at 2026-10-16 08:00 UTC: <@UA> can you look?"
        );
    }
}
