//! Typed results of gateway operations.
//!
//! Only the fields the gateway reports are extracted; everything else in the
//! Slack payloads is ignored.

use {
    chrono::DateTime,
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::credentials::CredentialTier;

fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn opt_text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn count(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// `1700000000.000100` → `2023-11-14 22:13:20` (UTC).
#[must_use]
pub fn readable_ts(ts: &str) -> Option<String> {
    let seconds = ts.parse::<f64>().ok()?;
    let dt = DateTime::from_timestamp(seconds.trunc() as i64, 0)?;
    Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthIdentity {
    pub tier: CredentialTier,
    pub user: Option<String>,
    pub user_id: Option<String>,
    pub team: Option<String>,
    pub team_id: Option<String>,
    pub url: Option<String>,
}

impl AuthIdentity {
    pub(crate) fn from_value(tier: CredentialTier, body: &Value) -> Self {
        Self {
            tier,
            user: opt_text(body, "user"),
            user_id: opt_text(body, "user_id"),
            team: opt_text(body, "team"),
            team_id: opt_text(body, "team_id"),
            url: opt_text(body, "url"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub is_member: bool,
    pub is_archived: bool,
    pub is_general: bool,
    pub num_members: u64,
    pub topic: String,
    pub purpose: String,
    pub created: u64,
}

impl ChannelSummary {
    pub(crate) fn from_value(ch: &Value) -> Self {
        let id = text(ch, "id");
        let name = opt_text(ch, "name").unwrap_or_else(|| format!("channel_{id}"));
        let nested = |key: &str| {
            ch.pointer(&format!("/{key}/value"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            name,
            is_private: flag(ch, "is_private"),
            is_member: flag(ch, "is_member"),
            is_archived: flag(ch, "is_archived"),
            is_general: flag(ch, "is_general"),
            num_members: count(ch, "num_members"),
            topic: nested("topic"),
            purpose: nested("purpose"),
            created: count(ch, "created"),
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryMessage {
    pub text: String,
    pub user: String,
    pub user_name: String,
    pub ts: String,
    pub timestamp: Option<String>,
    pub subtype: Option<String>,
    pub thread_ts: Option<String>,
    pub reply_count: u64,
    pub reaction_count: usize,
    pub is_edited: bool,
    pub bot_id: Option<String>,
}

impl HistoryMessage {
    /// `None` for items that are not plain messages with text.
    pub(crate) fn from_value(msg: &Value) -> Option<Self> {
        if msg.get("type").and_then(Value::as_str) != Some("message") {
            return None;
        }
        let body = msg.get("text")?.as_str()?.to_string();
        let ts = text(msg, "ts");
        Some(Self {
            text: body,
            user: opt_text(msg, "user").unwrap_or_else(|| "unknown".into()),
            user_name: text(msg, "username"),
            timestamp: readable_ts(&ts),
            ts,
            subtype: opt_text(msg, "subtype"),
            thread_ts: opt_text(msg, "thread_ts"),
            reply_count: count(msg, "reply_count"),
            reaction_count: msg
                .get("reactions")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            is_edited: msg.get("edited").is_some(),
            bot_id: opt_text(msg, "bot_id"),
        })
    }
}

/// Workspace role, most privileged first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Bot,
    Owner,
    Admin,
    SingleChannelGuest,
    MultiChannelGuest,
    Member,
}

impl UserType {
    #[must_use]
    pub fn of(user: &Value) -> Self {
        if flag(user, "is_bot") {
            Self::Bot
        } else if flag(user, "is_owner") {
            Self::Owner
        } else if flag(user, "is_admin") {
            Self::Admin
        } else if flag(user, "is_ultra_restricted") {
            Self::SingleChannelGuest
        } else if flag(user, "is_restricted") {
            Self::MultiChannelGuest
        } else {
            Self::Member
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bot => "bot",
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::SingleChannelGuest => "single_channel_guest",
            Self::MultiChannelGuest => "multi_channel_guest",
            Self::Member => "member",
        }
    }
}

impl std::str::FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bot" => Ok(Self::Bot),
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "single_channel_guest" => Ok(Self::SingleChannelGuest),
            "multi_channel_guest" => Ok(Self::MultiChannelGuest),
            "member" => Ok(Self::Member),
            other => Err(format!("unknown user type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub real_name: String,
    pub display_name: String,
    pub email: String,
    pub user_type: UserType,
    pub is_bot: bool,
    pub status_text: String,
    pub timezone: String,
    pub can_receive_dm: bool,
}

impl UserSummary {
    /// `None` for deleted accounts and Slackbot.
    pub(crate) fn from_value(user: &Value) -> Option<Self> {
        let id = text(user, "id");
        if flag(user, "deleted") || id == "USLACKBOT" {
            return None;
        }
        let user_type = UserType::of(user);
        let profile = user.get("profile").unwrap_or(&Value::Null);
        Some(Self {
            id,
            name: text(user, "name"),
            real_name: text(profile, "real_name"),
            display_name: text(profile, "display_name"),
            email: text(profile, "email"),
            is_bot: user_type == UserType::Bot,
            status_text: text(profile, "status_text"),
            timezone: text(user, "tz"),
            can_receive_dm: user_type != UserType::Bot,
            user_type,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectMessage {
    pub user_id: String,
    pub dm_channel_id: String,
    pub ts: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub text: String,
    pub user: String,
    pub username: String,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub ts: String,
    pub timestamp: Option<String>,
    pub permalink: String,
}

impl SearchMatch {
    pub(crate) fn from_value(m: &Value) -> Self {
        let channel = m.get("channel").unwrap_or(&Value::Null);
        let ts = text(m, "ts");
        Self {
            text: text(m, "text"),
            user: text(m, "user"),
            username: text(m, "username"),
            channel_id: opt_text(channel, "id"),
            channel_name: opt_text(channel, "name"),
            timestamp: readable_ts(&ts),
            ts,
            permalink: text(m, "permalink"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub total: u64,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reaction {
    pub channel: String,
    pub timestamp: String,
    pub emoji: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelStats {
    pub total: usize,
    pub public: usize,
    pub private: usize,
    pub member: usize,
}

impl ChannelStats {
    pub(crate) fn tally(channels: &[ChannelSummary]) -> Self {
        let private = channels.iter().filter(|c| c.is_private).count();
        Self {
            total: channels.len(),
            public: channels.len() - private,
            private,
            member: channels.iter().filter(|c| c.is_member).count(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserStats {
    pub total: usize,
    pub owner: usize,
    pub admin: usize,
    pub member: usize,
    pub bot: usize,
    pub single_channel_guest: usize,
    pub multi_channel_guest: usize,
    pub dm_candidates: usize,
}

impl UserStats {
    pub(crate) fn tally(users: &[UserSummary]) -> Self {
        let mut stats = Self {
            total: users.len(),
            ..Self::default()
        };
        for user in users {
            let slot = match user.user_type {
                UserType::Bot => &mut stats.bot,
                UserType::Owner => &mut stats.owner,
                UserType::Admin => &mut stats.admin,
                UserType::SingleChannelGuest => &mut stats.single_channel_guest,
                UserType::MultiChannelGuest => &mut stats.multi_channel_guest,
                UserType::Member => &mut stats.member,
            };
            *slot += 1;
            if user.can_receive_dm {
                stats.dm_candidates += 1;
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub send_messages: bool,
    pub read_channels: bool,
    pub read_history: bool,
    pub send_dm: bool,
    pub search_messages: bool,
    pub large_uploads: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceInfo {
    pub workspace_name: Option<String>,
    pub workspace_id: Option<String>,
    pub workspace_url: Option<String>,
    pub bot_name: Option<String>,
    pub bot_id: Option<String>,
    pub channels: ChannelStats,
    pub users: UserStats,
    pub capabilities: Capabilities,
}
