//! Config schema types (Slack credentials, retry policy, HTTP, upload bands).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration for slackline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlacklineConfig {
    pub slack: SlackConfig,
    pub retry: RetryConfig,
    pub http: HttpConfig,
    pub upload: UploadConfig,
    pub defaults: DefaultsConfig,
}

/// Slack workspace credentials and API location.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`). Required for every operation.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub bot_token: Option<Secret<String>>,

    /// User token (`xoxp-...`). Unlocks search and large uploads.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub user_token: Option<Secret<String>>,

    /// Base URL of the Web API, without a trailing method name.
    pub api_base_url: String,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("user_token", &self.user_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            user_token: None,
            api_base_url: "https://slack.com/api".into(),
        }
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Bounded retry policy applied to every Web API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum physical attempts per logical call (including the first).
    pub max_attempts: u32,
    /// Delay before the second attempt after a network fault.
    pub base_delay_secs: u64,
    /// Multiplier applied to the delay for each further network fault.
    pub backoff_factor: u32,
    /// Wait used when a throttling response carries no `Retry-After`.
    pub rate_limit_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1,
            backoff_factor: 2,
            rate_limit_delay_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
        }
    }
}

/// Size bands (bytes) that pick a file delivery strategy.
///
/// Bands must ascend: `text_message_limit < snippet_limit < large_file_limit
/// < max_file_size`, with `standard_file_limit` between snippet and large.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Text files below this size are posted inline as a message.
    pub text_message_limit: u64,
    /// Files below this size are uploaded as a highlighted snippet.
    pub snippet_limit: u64,
    /// Above this size the user token is required (free-plan ceiling).
    pub standard_file_limit: u64,
    /// Files at or above this size are announced, not transferred.
    pub large_file_limit: u64,
    /// Files at or above this size are rejected outright.
    pub max_file_size: u64,
    /// Longest inline message body before truncation, in characters.
    pub max_message_chars: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            text_message_limit: 51_200,
            snippet_limit: 1_048_576,
            standard_file_limit: 104_857_600,
            large_file_limit: 1_073_741_824,
            max_file_size: 2_000_000_000,
            max_message_chars: 40_000,
        }
    }
}

/// Defaults for listing operations when the caller passes no limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub message_limit: u32,
    pub user_limit: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            message_limit: 10,
            user_limit: 50,
        }
    }
}
