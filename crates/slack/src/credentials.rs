//! Bot and user token handling.

use {
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
    tracing::warn,
};

use slackline_config::SlackConfig;

use crate::error::{GatewayError, Result};

pub const BOT_TOKEN_PREFIX: &str = "xoxb-";
pub const USER_TOKEN_PREFIX: &str = "xoxp-";

/// Which token a request must be sent with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialTier {
    /// Bot token: broad capability, always present.
    #[default]
    Primary,
    /// User token: needed for search and uploads above the standard ceiling.
    Elevated,
}

impl CredentialTier {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Primary => "bot token",
            Self::Elevated => "user token",
        }
    }
}

/// The two independent tokens. Read-only after construction.
#[derive(Clone)]
pub struct Credentials {
    primary: Secret<String>,
    elevated: Option<Secret<String>>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("primary", &"[REDACTED]")
            .field("elevated", &self.elevated.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Credentials {
    /// Validate and hold the tokens.
    ///
    /// A missing or malformed bot token is an error. A malformed user token
    /// is dropped with a warning so elevated-only operations fail later with
    /// a clear message instead of blocking startup.
    pub fn new(primary: Option<Secret<String>>, elevated: Option<Secret<String>>) -> Result<Self> {
        let primary = primary
            .filter(|t| !t.expose_secret().trim().is_empty())
            .ok_or_else(|| GatewayError::invalid_credential("bot token is not set"))?;
        if !primary.expose_secret().starts_with(BOT_TOKEN_PREFIX) {
            return Err(GatewayError::invalid_credential(format!(
                "bot token must start with '{BOT_TOKEN_PREFIX}'"
            )));
        }

        let elevated = match elevated {
            Some(token) if token.expose_secret().starts_with(USER_TOKEN_PREFIX) => Some(token),
            Some(token) if token.expose_secret().trim().is_empty() => None,
            Some(_) => {
                warn!(
                    "user token does not start with '{USER_TOKEN_PREFIX}', ignoring it; search \
                     and large uploads are disabled"
                );
                None
            },
            None => None,
        };

        Ok(Self { primary, elevated })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self> {
        Self::new(config.bot_token.clone(), config.user_token.clone())
    }

    /// Token for `tier`. Never falls back from elevated to primary.
    pub fn select(&self, tier: CredentialTier) -> Result<&Secret<String>> {
        match tier {
            CredentialTier::Primary => Ok(&self.primary),
            CredentialTier::Elevated => self
                .elevated
                .as_ref()
                .ok_or_else(|| GatewayError::missing_elevated("this operation")),
        }
    }

    #[must_use]
    pub fn has_elevated(&self) -> bool {
        self.elevated.is_some()
    }
}
