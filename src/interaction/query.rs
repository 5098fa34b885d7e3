//! Answers "who asked me?" queries.

use chrono::{DateTime, Utc};
use tracing::{Instrument, error, info, instrument};

use crate::{
    base::{
        config::Config,
        replies::{CLEAR_ARGUMENT, CLEARED_REPLY, NO_RECORDS_IN_CHANNEL_REPLY, NO_RECORDS_REPLY, QUERY_FAILED_REPLY, UNKNOWN_ARGUMENT_REPLY, render_history},
        types::Res,
    },
    service::{chat::ChatClient, db::DbClient},
};

/// What the requester asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAction {
    /// List who asked for the requester.
    List,
    /// Forget the requester's history.
    Clear,
    /// Arguments were not understood.
    Usage,
}

impl QueryAction {
    /// Parses the arguments that follow the query keyword.
    pub fn parse(args: &str) -> Self {
        match args.trim() {
            "" => Self::List,
            arg if arg.eq_ignore_ascii_case(CLEAR_ARGUMENT) => Self::Clear,
            _ => Self::Usage,
        }
    }
}

/// A query from one participant in one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub requester_id: String,
    pub group_id: String,
    pub action: QueryAction,
}

/// Matches `text` against the in-channel trigger (e.g. `!whoasked clear`).
///
/// Returns the parsed action, or `None` when the text is not a query.
pub fn match_trigger(text: &str, trigger: &str) -> Option<QueryAction> {
    let rest = text.trim().strip_prefix(trigger)?;

    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    Some(QueryAction::parse(rest))
}

/// Handles a query typed into a channel.
///
/// Spawns a task that answers the query and replies in the thread of `thread_ts`.
#[instrument(skip_all)]
pub fn handle_query_message(request: QueryRequest, thread_ts: String, db: DbClient, chat: ChatClient, config: Config) {
    tokio::spawn(
        async move {
            let reply = answer_query(&request, &db, &config, Utc::now()).await;

            if let Err(err) = chat.send_message(&request.group_id, &thread_ts, &reply).await {
                error!("Error while sending query reply: {}", err);
            }
        }
        .in_current_span(),
    );
}

/// Produces the reply text for a query.
///
/// Never fails: storage errors become a generic apology.
#[instrument(skip(db, config, now))]
pub async fn answer_query(request: &QueryRequest, db: &DbClient, config: &Config, now: DateTime<Utc>) -> String {
    info!("Received query from `{}` in `{}`.", request.requester_id, request.group_id);

    match answer_query_internal(request, db, config, now).await {
        Ok(reply) => reply,
        Err(err) => {
            error!("Error while answering query: {}", err);
            QUERY_FAILED_REPLY.to_string()
        }
    }
}

async fn answer_query_internal(request: &QueryRequest, db: &DbClient, config: &Config, now: DateTime<Utc>) -> Res<String> {
    let retention = config.retention();

    match request.action {
        QueryAction::Usage => return Ok(UNKNOWN_ARGUMENT_REPLY.to_string()),
        QueryAction::Clear => {
            db.clear_history(&request.requester_id).await?;
            return Ok(CLEARED_REPLY.to_string());
        }
        QueryAction::List => {}
    }

    let history = db.read_history(&request.requester_id, &retention, now).await?;

    if history.is_empty() {
        return Ok(NO_RECORDS_REPLY.to_string());
    }

    let in_scope: Vec<_> = history
        .into_iter()
        .filter(|record| !config.filter_by_channel || record.group_id == request.group_id)
        .collect();

    let records = retention.most_recent(&in_scope, now);

    if records.is_empty() {
        return Ok(NO_RECORDS_IN_CHANNEL_REPLY.to_string());
    }

    Ok(render_history(&records))
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arguments() {
        assert_eq!(QueryAction::parse(""), QueryAction::List);
        assert_eq!(QueryAction::parse("  CLEAR "), QueryAction::Clear);
        assert_eq!(QueryAction::parse("everyone"), QueryAction::Usage);
    }

    #[test]
    fn matches_only_the_whole_keyword() {
        assert_eq!(match_trigger("!whoasked", "!whoasked"), Some(QueryAction::List));
        assert_eq!(match_trigger("  !whoasked clear", "!whoasked"), Some(QueryAction::Clear));
        assert_eq!(match_trigger("!whoaskedx", "!whoasked"), None);
        assert_eq!(match_trigger("who asked?", "!whoasked"), None);
        assert_eq!(match_trigger("please !whoasked", "!whoasked"), None);
    }
}
