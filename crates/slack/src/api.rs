//! Slack operations built on the dispatcher, paginator and deliverer.

use std::{path::Path, sync::Arc, time::Duration};

use {
    futures::future::join3,
    serde_json::Value,
    tracing::{info, warn},
};

use slackline_config::{DefaultsConfig, SlacklineConfig};

use crate::{
    credentials::{CredentialTier, Credentials},
    delivery::{
        DeliveryReport, DeliveryRequest, Deliverer, FilePreview, UploadLimits, VerifiedFile,
    },
    dispatch::{Dispatcher, RetryPolicy},
    error::{GatewayError, Result},
    pagination::Paginator,
    transport::{ApiRequest, HttpTransport, Transport},
    types::{
        AuthIdentity, Capabilities, ChannelStats, ChannelSummary, DirectMessage, HistoryMessage,
        PostedMessage, Reaction, SearchMatch, SearchResults, UserStats, UserSummary, UserType,
        WorkspaceInfo,
    },
};

const PAGE_SIZE: u32 = 200;
const MAX_HISTORY: u32 = 1000;
const MAX_USERS: u32 = 200;
const MAX_SEARCH: u32 = 100;

pub const DEFAULT_CHANNEL_TYPES: &str = "public_channel,private_channel";

fn field(body: &Value, pointer: &str) -> Option<String> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Entry point for every Slack operation.
#[derive(Clone)]
pub struct SlackGateway {
    dispatcher: Dispatcher,
    deliverer: Deliverer,
    defaults: DefaultsConfig,
}

impl SlackGateway {
    /// Build a gateway talking to the configured Web API over HTTP.
    pub fn from_config(config: &SlacklineConfig) -> Result<Self> {
        let credentials = Credentials::from_config(&config.slack)?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
            config.slack.api_base_url.as_str(),
            Duration::from_secs(config.http.request_timeout_secs),
        ));
        let dispatcher = Dispatcher::new(
            transport,
            credentials,
            RetryPolicy::from(&config.retry),
        );
        Ok(Self::new(
            dispatcher,
            UploadLimits::from(&config.upload),
            config.defaults.clone(),
        ))
    }

    #[must_use]
    pub fn new(dispatcher: Dispatcher, limits: UploadLimits, defaults: DefaultsConfig) -> Self {
        Self {
            deliverer: Deliverer::new(dispatcher.clone(), limits),
            dispatcher,
            defaults,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn limits(&self) -> &UploadLimits {
        self.deliverer.limits()
    }

    // ── Identity & messages ─────────────────────────────────────────────

    pub async fn test_connection(&self, tier: CredentialTier) -> Result<AuthIdentity> {
        let body = self
            .dispatcher
            .execute(&ApiRequest::get("auth.test").tier(tier))
            .await?;
        let identity = AuthIdentity::from_value(tier, &body);
        info!(
            tier = tier.label(),
            team = identity.team.as_deref().unwrap_or_default(),
            "connection verified"
        );
        Ok(identity)
    }

    pub async fn send_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage> {
        let body = self
            .dispatcher
            .execute(
                &ApiRequest::post("chat.postMessage")
                    .with("channel", channel)
                    .with("text", text)
                    .with_opt("thread_ts", thread_ts),
            )
            .await?;
        let posted = PostedMessage {
            channel: field(&body, "/channel").unwrap_or_else(|| channel.to_string()),
            ts: field(&body, "/ts").unwrap_or_default(),
            text: text.to_string(),
        };
        info!(channel = %posted.channel, ts = %posted.ts, "message sent");
        Ok(posted)
    }

    // ── Channels ────────────────────────────────────────────────────────

    pub async fn list_channels(
        &self,
        exclude_archived: bool,
        types: Option<&str>,
    ) -> Result<Vec<ChannelSummary>> {
        let request = ApiRequest::get("conversations.list")
            .with("limit", PAGE_SIZE)
            .with("exclude_archived", exclude_archived.to_string())
            .with("types", types.unwrap_or(DEFAULT_CHANNEL_TYPES));
        let channels: Vec<ChannelSummary> = Paginator::new(&self.dispatcher)
            .collect(&request, "channels")
            .await?
            .iter()
            .map(ChannelSummary::from_value)
            .collect();
        info!(count = channels.len(), "channels listed");
        Ok(channels)
    }

    /// Recent messages in `channel`, newest first.
    ///
    /// `limit` falls back to the configured default and is clamped to
    /// `1..=1000`.
    pub async fn channel_history(
        &self,
        channel: &str,
        limit: Option<u32>,
        latest: Option<&str>,
        oldest: Option<&str>,
    ) -> Result<Vec<HistoryMessage>> {
        let limit = limit
            .unwrap_or(self.defaults.message_limit)
            .clamp(1, MAX_HISTORY);
        let body = self
            .dispatcher
            .execute(
                &ApiRequest::get("conversations.history")
                    .with("channel", channel)
                    .with("limit", limit)
                    .with("inclusive", "true")
                    .with_opt("latest", latest)
                    .with_opt("oldest", oldest),
            )
            .await?;
        let messages: Vec<HistoryMessage> = body
            .get("messages")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(HistoryMessage::from_value).collect())
            .unwrap_or_default();
        info!(channel, count = messages.len(), "history fetched");
        Ok(messages)
    }

    // ── Users ───────────────────────────────────────────────────────────

    /// Every active account in the workspace.
    async fn all_users(&self) -> Result<Vec<UserSummary>> {
        let request = ApiRequest::get("users.list").with("limit", PAGE_SIZE);
        Ok(Paginator::new(&self.dispatcher)
            .collect(&request, "members")
            .await?
            .iter()
            .filter_map(UserSummary::from_value)
            .collect())
    }

    /// Users filtered by bot flag and type. `limit` falls back to the
    /// configured default and is clamped to `1..=200`.
    pub async fn list_users(
        &self,
        include_bots: bool,
        limit: Option<u32>,
        user_types: Option<&[UserType]>,
    ) -> Result<Vec<UserSummary>> {
        let limit = limit.unwrap_or(self.defaults.user_limit).clamp(1, MAX_USERS) as usize;
        let users: Vec<UserSummary> = self
            .all_users()
            .await?
            .into_iter()
            .filter(|u| include_bots || !u.is_bot)
            .filter(|u| user_types.is_none_or(|types| types.contains(&u.user_type)))
            .take(limit)
            .collect();
        info!(count = users.len(), include_bots, "users listed");
        Ok(users)
    }

    /// Case-insensitive lookup by profile email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserSummary>> {
        let email = email.trim();
        let found = self
            .all_users()
            .await?
            .into_iter()
            .find(|u| !u.email.is_empty() && u.email.eq_ignore_ascii_case(email));
        info!(found = found.is_some(), "user lookup by email");
        Ok(found)
    }

    /// Human users that can be sent a direct message.
    pub async fn dm_candidates(&self, limit: Option<u32>) -> Result<Vec<UserSummary>> {
        let users = self.list_users(false, limit, None).await?;
        Ok(users.into_iter().filter(|u| u.can_receive_dm).collect())
    }

    pub async fn send_direct_message(&self, user: &str, text: &str) -> Result<DirectMessage> {
        let opened = self
            .dispatcher
            .execute(&ApiRequest::post("conversations.open").with("users", user))
            .await?;
        let Some(dm_channel_id) = field(&opened, "/channel/id") else {
            return Err(GatewayError::malformed(
                "channel_missing",
                "conversations.open returned no channel id",
            ));
        };
        let posted = self.send_message(&dm_channel_id, text, None).await?;
        info!(user, channel = %dm_channel_id, "direct message sent");
        Ok(DirectMessage {
            user_id: user.to_string(),
            dm_channel_id,
            ts: posted.ts,
        })
    }

    // ── Search & reactions ──────────────────────────────────────────────

    /// Full-text search. Needs the user token; `count` is clamped to
    /// `1..=100`.
    pub async fn search_messages(
        &self,
        query: &str,
        sort: &str,
        sort_dir: &str,
        count: u32,
    ) -> Result<SearchResults> {
        let count = count.clamp(1, MAX_SEARCH);
        let body = self
            .dispatcher
            .execute(
                &ApiRequest::get("search.messages")
                    .with("query", query)
                    .with("sort", sort)
                    .with("sort_dir", sort_dir)
                    .with("count", count)
                    .tier(CredentialTier::Elevated),
            )
            .await?;
        let matches: Vec<SearchMatch> = body
            .pointer("/messages/matches")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(SearchMatch::from_value).collect())
            .unwrap_or_default();
        let total = body
            .pointer("/messages/total")
            .and_then(Value::as_u64)
            .unwrap_or(matches.len() as u64);
        info!(total, returned = matches.len(), "search complete");
        Ok(SearchResults {
            query: query.to_string(),
            total,
            matches,
        })
    }

    /// Add `name` (with or without surrounding colons) to a message.
    pub async fn add_reaction(&self, channel: &str, timestamp: &str, name: &str) -> Result<Reaction> {
        let emoji = name.trim().trim_matches(':');
        self.dispatcher
            .execute(
                &ApiRequest::post("reactions.add")
                    .with("channel", channel)
                    .with("timestamp", timestamp)
                    .with("name", emoji),
            )
            .await?;
        info!(channel, timestamp, emoji, "reaction added");
        Ok(Reaction {
            channel: channel.to_string(),
            timestamp: timestamp.to_string(),
            emoji: emoji.to_string(),
        })
    }

    // ── Workspace ───────────────────────────────────────────────────────

    /// Identity, channel and user statistics, fetched concurrently.
    ///
    /// Channel or user listing failures leave zeroed statistics; an auth
    /// failure fails the call.
    pub async fn workspace_info(&self) -> Result<WorkspaceInfo> {
        let (auth, channels, users) = join3(
            self.test_connection(CredentialTier::Primary),
            self.list_channels(false, None),
            self.all_users(),
        )
        .await;
        let auth = auth?;

        let channel_stats = match channels {
            Ok(channels) => ChannelStats::tally(&channels),
            Err(err) => {
                warn!(code = %err.code, "channel statistics unavailable");
                ChannelStats::default()
            },
        };
        let user_stats = match users {
            Ok(users) => UserStats::tally(&users),
            Err(err) => {
                warn!(code = %err.code, "user statistics unavailable");
                UserStats::default()
            },
        };
        let elevated = self.dispatcher.credentials().has_elevated();

        Ok(WorkspaceInfo {
            workspace_name: auth.team,
            workspace_id: auth.team_id,
            workspace_url: auth.url,
            bot_name: auth.user,
            bot_id: auth.user_id,
            channels: channel_stats,
            users: user_stats,
            capabilities: Capabilities {
                send_messages: true,
                read_channels: true,
                read_history: true,
                send_dm: true,
                search_messages: elevated,
                large_uploads: elevated,
            },
        })
    }

    // ── Files ───────────────────────────────────────────────────────────

    pub async fn upload_file(&self, request: &DeliveryRequest) -> Result<DeliveryReport> {
        self.deliverer.deliver(request).await
    }

    pub fn preview_file(&self, path: &Path, max_lines: usize) -> Result<FilePreview> {
        crate::delivery::preview(path, max_lines)
    }

    pub fn verify_or_create_file(&self, path: &Path, content: Option<&str>) -> Result<VerifiedFile> {
        crate::delivery::verify_or_create(path, content)
    }
}
