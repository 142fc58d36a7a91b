use std::path::Path;

use serde::Serialize;

use crate::classify::Classification;

/// Crate-wide result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Broad failure category. Callers branch on this, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidCredentialFormat,
    MissingElevatedCredential,
    TransientNetworkFailure,
    RateLimited,
    RemoteRejected,
    UnknownRemoteError,
    MalformedResponse,
    RetriesExhausted,
    FileTooLarge,
    SensitiveFileRejected,
    UploadHandshakeIncomplete,
    FileUnavailable,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidCredentialFormat => "invalid_credential_format",
            Self::MissingElevatedCredential => "missing_elevated_credential",
            Self::TransientNetworkFailure => "transient_network_failure",
            Self::RateLimited => "rate_limited",
            Self::RemoteRejected => "remote_rejected",
            Self::UnknownRemoteError => "unknown_remote_error",
            Self::MalformedResponse => "malformed_response",
            Self::RetriesExhausted => "retries_exhausted",
            Self::FileTooLarge => "file_too_large",
            Self::SensitiveFileRejected => "sensitive_file_rejected",
            Self::UploadHandshakeIncomplete => "upload_handshake_incomplete",
            Self::FileUnavailable => "file_unavailable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified gateway failure.
///
/// `code` is the remote error code when there is one (`not_in_channel`,
/// `ratelimited`, ...) and a local code otherwise. `suggestion` is never
/// empty.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {detail}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub code: String,
    pub detail: String,
    pub suggestion: String,
    #[source]
    pub source: Option<Box<GatewayError>>,
}

impl GatewayError {
    #[must_use]
    pub fn new(
        kind: ErrorKind,
        code: impl Into<String>,
        detail: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code: code.into(),
            detail: detail.into(),
            suggestion: suggestion.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn invalid_credential(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InvalidCredentialFormat,
            "invalid_credential_format",
            detail,
            "Set SLACK_BOT_TOKEN to a bot token starting with 'xoxb-'.",
        )
    }

    #[must_use]
    pub fn missing_elevated(endpoint: &str) -> Self {
        Self::new(
            ErrorKind::MissingElevatedCredential,
            "missing_user_token",
            format!("{endpoint} requires a user token"),
            "Set SLACK_USER_TOKEN to a user token starting with 'xoxp-' and grant the \
             scopes this operation needs (search:read, files:write).",
        )
    }

    #[must_use]
    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::TransientNetworkFailure,
            "network_error",
            detail,
            "Check the network connection and the Slack API status page.",
        )
    }

    /// A remote `ok: false` response, already run through the classifier.
    #[must_use]
    pub fn remote(code: impl Into<String>, endpoint: &str, classification: Classification) -> Self {
        let code = code.into();
        Self::new(
            classification.kind,
            code.clone(),
            format!("{endpoint} failed: {code}"),
            classification.suggestion,
        )
    }

    #[must_use]
    pub fn malformed(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::MalformedResponse,
            code,
            detail,
            "Slack returned a response the gateway could not interpret. Retry later or \
             check the Slack API status page.",
        )
    }

    /// Wraps the last retryable failure once the attempt budget is spent.
    #[must_use]
    pub fn retries_exhausted(last: Self, attempts: u32) -> Self {
        Self {
            kind: ErrorKind::RetriesExhausted,
            code: last.code.clone(),
            detail: format!("{} (after {attempts} attempts)", last.detail),
            suggestion: format!(
                "{} Maximum retry count ({attempts}) exceeded.",
                last.suggestion
            ),
            source: Some(Box::new(last)),
        }
    }

    #[must_use]
    pub fn file_too_large(size: u64, limit: u64) -> Self {
        Self::new(
            ErrorKind::FileTooLarge,
            "file_too_large",
            format!("file is {size} bytes; the limit is {limit} bytes"),
            "Split the file into smaller parts, compress it, or share a cloud storage link.",
        )
    }

    #[must_use]
    pub fn sensitive_file(path: &Path, reason: &str) -> Self {
        Self::new(
            ErrorKind::SensitiveFileRejected,
            "sensitive_file",
            format!("refusing to upload {} ({reason})", path.display()),
            "Only regular user files can be shared. Keys, credentials, system files and \
             backups are never uploaded.",
        )
    }

    /// A failed step of the external upload handshake.
    #[must_use]
    pub fn handshake_incomplete(step: &str, source: Self) -> Self {
        Self {
            kind: ErrorKind::UploadHandshakeIncomplete,
            code: source.code.clone(),
            detail: format!("upload stopped at {step}: {}", source.detail),
            suggestion: source.suggestion.clone(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn file_unavailable(path: &Path, detail: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorKind::FileUnavailable,
            "file_unavailable",
            format!("{}: {detail}", path.display()),
            "Check that the path exists, points to a regular file and is readable.",
        )
    }

    /// Innermost error in the `source` chain.
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Some(next) = current.source.as_deref() {
            current = next;
        }
        current
    }
}
