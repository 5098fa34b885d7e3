//! Slack integration for the whoasked bot.
//!
//! Listens over Socket Mode for channel messages and the `/whoasked` slash
//! command, and normalizes Slack's message JSON into `ChatMessage`s:
//! - `<@U123>` tokens in the text are mentions.
//! - A reply inside a thread quotes the thread's parent message.

use crate::{
    base::{
        config::Config,
        replies::CHANNELS_ONLY_REPLY,
        types::{ChatMessage, QuotedMessage, Res, Void},
    },
    interaction::{
        self,
        query::{QueryAction, QueryRequest},
    },
    service::db::DbClient,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use serde_json::Value;
use slack_morphism::prelude::*;
use tracing::{debug, info, instrument, warn};

use std::sync::Arc;

use super::{ChatClient, GenericChatClient};

// Type aliases.

type FullClient = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config, db: DbClient) -> Res<Self> {
        let client = SlackChatClient::new(config, db).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<SlackChatClient> for ChatClient {
    fn from(client: SlackChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    db: DbClient,
    chat: ChatClient,
    config: Config,
    bot_user_id: String,
}

/// The fields of a Slack message event that matter for recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackMessageParts {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub parent_user_id: Option<String>,
}

impl SlackMessageParts {
    /// The thread parent's timestamp, when this message is a reply inside a thread.
    pub fn replied_to(&self) -> Option<&str> {
        self.thread_ts.as_deref().filter(|thread_ts| *thread_ts != self.ts)
    }
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    pub app_token: SlackApiToken,
    pub bot_token: SlackApiToken,
    pub bot_user_id: String,
    pub client: Arc<FullClient>,
    pub db: DbClient,
    pub config: Config,
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config, db: DbClient) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Get the bot's user ID.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;
        let bot_user_id = bot_user.user_id.0;

        info!("Slack bot user ID: {}", bot_user_id);

        Ok(Self {
            app_token,
            bot_token,
            bot_user_id,
            client,
            db,
            config: config.clone(),
        })
    }

    /// Looks up the name a user goes by in the workspace.
    #[instrument(skip(self))]
    async fn display_name(&self, user_id: &str) -> Res<Option<String>> {
        let request = SlackApiUsersInfoRequest::new(SlackUserId(user_id.to_string()));
        let session = self.client.open_session(&self.bot_token);

        let response = session.users_info(&request).await.map_err(|e| anyhow::anyhow!("Failed to get user info: {}", e))?;
        let user = serde_json::to_value(&response.user)?;

        Ok(display_name_from_user(&user))
    }

    /// Fetches the message at `ts`, which must be the root of a thread.
    #[instrument(skip(self))]
    async fn fetch_thread_parent(&self, channel_id: &str, ts: &str) -> Res<Option<QuotedMessage>> {
        let request = SlackApiConversationsRepliesRequest::new(SlackChannelId(channel_id.to_string()), SlackTs(ts.to_string()));
        let session = self.client.open_session(&self.bot_token);

        let response = session.conversations_replies(&request).await.map_err(|e| anyhow::anyhow!("Failed to get thread: {}", e))?;
        let messages = serde_json::to_value(&response.messages)?;

        let parent = messages.as_array().and_then(|messages| messages.first()).and_then(|parent| {
            Some(QuotedMessage {
                sender_id: parent.get("user")?.as_str()?.to_string(),
                text: parent.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
            })
        });

        Ok(parent)
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn start(&self) -> Void {
        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new().with_command_events(handle_command_event).with_push_events(handle_push_event);

        // Initialize the socket mode listener environment.

        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_user_state(SlackUserState {
            db: self.db.clone(),
            chat: ChatClient::from(self.clone()),
            config: self.config.clone(),
            bot_user_id: self.bot_user_id.clone(),
        }));

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register an app token to listen for events,
        socket_mode_listener.listen_for(&self.app_token).await?;

        // Start WS connections calling Slack API to get WS url for the token,
        // and wait for Ctrl-C to shutdown.
        socket_mode_listener.serve().await;

        Ok(())
    }

    #[instrument(skip(self, text))]
    async fn send_message(&self, channel_id: &str, thread_ts: &str, text: &str) -> Void {
        let message = SlackMessageContent::new().with_text(text.to_string());

        let mut request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel_id.to_string()), message).with_as_user(true);

        if !thread_ts.is_empty() {
            request = request.with_thread_ts(SlackTs(thread_ts.to_string()));
        }

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_post_message(&request).await.map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(())
    }

    #[instrument(skip_all)]
    async fn resolve_message(&self, event: &Value) -> Res<Option<ChatMessage>> {
        let Some(parts) = parse_message_event(event) else {
            return Ok(None);
        };

        if parts.user_id == self.bot_user_id {
            return Ok(None);
        }

        let Some(timestamp) = slack_ts_to_datetime(&parts.ts) else {
            warn!("Skipping message with unparseable timestamp `{}`.", parts.ts);
            return Ok(None);
        };

        let mentions = parse_mentions(&parts.text);

        let quoted = match parts.replied_to() {
            Some(thread_ts) => match self.fetch_thread_parent(&parts.channel_id, thread_ts).await {
                Ok(parent) => parent,
                Err(err) => {
                    warn!("Could not fetch the thread parent: {}", err);
                    parts.parent_user_id.clone().map(|sender_id| QuotedMessage { sender_id, text: String::new() })
                }
            },
            None => None,
        };

        // Only look the name up when there is something to record.
        let sender_name = if mentions.is_empty() && quoted.is_none() {
            parts.user_id.clone()
        } else {
            match self.display_name(&parts.user_id).await {
                Ok(Some(name)) => name,
                Ok(None) => parts.user_id.clone(),
                Err(err) => {
                    warn!("Could not resolve the sender's name: {}", err);
                    parts.user_id.clone()
                }
            }
        };

        Ok(Some(ChatMessage {
            group_id: parts.channel_id,
            sender_id: parts.user_id,
            sender_name,
            text: parts.text,
            mentions,
            quoted,
            timestamp,
        }))
    }
}

// Slack message parsing.

/// Extracts user ids from `<@U123>` and `<@U123|name>` tokens, in order.
pub fn parse_mentions(text: &str) -> Vec<String> {
    text.split("<@")
        .skip(1)
        .filter_map(|rest| {
            let token = &rest[..rest.find('>')?];
            let id = token.split('|').next().unwrap_or_default();

            (!id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())).then(|| id.to_string())
        })
        .collect()
}

/// Picks the fields of a plain user message out of a Slack message event.
///
/// Returns `None` for bot messages, edits, deletions and other subtyped events.
pub fn parse_message_event(event: &Value) -> Option<SlackMessageParts> {
    if event.get("subtype").is_some_and(|subtype| !subtype.is_null()) || event.get("bot_id").is_some_and(|bot_id| !bot_id.is_null()) {
        return None;
    }

    let field = |name: &str| event.get(name).and_then(Value::as_str).map(str::to_string);

    Some(SlackMessageParts {
        channel_id: field("channel")?,
        user_id: field("user")?,
        text: field("text").unwrap_or_default(),
        ts: field("ts")?,
        thread_ts: field("thread_ts"),
        parent_user_id: field("parent_user_id"),
    })
}

/// Converts a Slack timestamp (`"1700000000.123456"`) into a UTC instant.
pub fn slack_ts_to_datetime(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, fraction) = ts.split_once('.').unwrap_or((ts, "0"));

    let secs = secs.parse::<i64>().ok()?;
    let micros = format!("{fraction:0<6}").get(..6)?.parse::<u32>().ok()?;

    DateTime::from_timestamp(secs, micros * 1_000)
}

/// Picks the best available name from a serialized Slack user.
pub fn display_name_from_user(user: &Value) -> Option<String> {
    let candidates = [
        user.pointer("/profile/display_name"),
        user.pointer("/profile/real_name"),
        user.get("real_name"),
        user.get("name"),
    ];

    candidates.into_iter().flatten().filter_map(Value::as_str).find(|name| !name.trim().is_empty()).map(str::to_string)
}

/// Direct-message conversation ids start with `D`.
pub fn is_direct_message(channel_id: &str) -> bool {
    channel_id.starts_with('D')
}

// Socket mode listener callbacks for Slack.

/// Handles the `/whoasked` slash command with an ephemeral reply.
#[instrument(skip_all)]
async fn handle_command_event(event: SlackCommandEvent, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<SlackCommandEventResponse, Box<dyn std::error::Error + Send + Sync>> {
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    info!("Received command `{}` ...", event.command.0);

    let reply = if is_direct_message(&event.channel_id.0) {
        CHANNELS_ONLY_REPLY.to_string()
    } else {
        let request = QueryRequest {
            requester_id: event.user_id.0.clone(),
            group_id: event.channel_id.0.clone(),
            action: QueryAction::parse(event.text.as_deref().unwrap_or_default()),
        };

        interaction::query::answer_query(&request, &user_state.db, &user_state.config, Utc::now()).await
    };

    Ok(SlackCommandEventResponse::new(SlackMessageContent::new().with_text(reply)))
}

/// Handles push events from Slack.
#[instrument(skip_all)]
async fn handle_push_event(event_callback: SlackPushEventCallback, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let event = event_callback.event;
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    match event {
        SlackEventCallbackBody::Message(slack_message_event) => {
            debug!("Received message event ...");

            let text = slack_message_event.content.as_ref().map(|c| c.text.as_deref()).unwrap_or_default().unwrap_or_default();
            let channel_id = slack_message_event.origin.channel.as_ref().map(|c| c.0.clone()).unwrap_or_default();
            let sender_id = slack_message_event.sender.user.as_ref().map(|u| u.0.clone()).unwrap_or_default();

            // A query is answered, not recorded.
            if let Some(action) = interaction::query::match_trigger(text, &user_state.config.query_trigger())
                && !channel_id.is_empty()
                && !sender_id.is_empty()
                && sender_id != user_state.bot_user_id
            {
                if is_direct_message(&channel_id) {
                    warn!("Ignoring query sent in a direct message.");
                    return Ok(());
                }

                let thread_ts = slack_message_event.origin.thread_ts.clone().unwrap_or(slack_message_event.origin.ts.clone()).0;
                let request = QueryRequest {
                    requester_id: sender_id,
                    group_id: channel_id,
                    action,
                };

                interaction::query::handle_query_message(request, thread_ts, user_state.db.clone(), user_state.chat.clone(), user_state.config.clone());
                return Ok(());
            }

            let raw = serde_json::to_value(&slack_message_event)?;
            interaction::mention_recorder::handle_message_event(raw, user_state.db.clone(), user_state.chat.clone(), user_state.config.clone());
        }
        _ => {
            debug!("Received unhandled push event.")
        }
    }

    Ok(())
}

// Tests.
