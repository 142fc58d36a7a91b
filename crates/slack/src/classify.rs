//! Maps Slack error codes to an [`ErrorKind`], a retry decision and a
//! remediation hint.

use serde_json::Value;

use crate::error::ErrorKind;

/// Outcome of classifying one remote error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub retryable: bool,
    pub suggestion: String,
}

/// Classify a remote error code.
///
/// Pure: the same `(code, body)` always yields the same classification.
/// `body` is only consulted for `missing_scope`, whose hint names the scope
/// Slack reports in `needed`.
#[must_use]
pub fn classify(code: &str, body: &Value) -> Classification {
    let known = known_suggestion(code, body);
    let (kind, retryable) = match (code, &known) {
        ("ratelimited", _) => (ErrorKind::RateLimited, true),
        (_, Some(_)) => (ErrorKind::RemoteRejected, false),
        (_, None) => (ErrorKind::UnknownRemoteError, false),
    };
    let suggestion = known.unwrap_or_else(|| {
        format!(
            "No specific guidance for \"{code}\". See https://api.slack.com/methods for the \
             endpoint's error list."
        )
    });
    Classification {
        kind,
        retryable,
        suggestion,
    }
}

fn known_suggestion(code: &str, body: &Value) -> Option<String> {
    let text = match code {
        "missing_scope" => {
            let needed = body
                .get("needed")
                .and_then(Value::as_str)
                .unwrap_or("see the Slack response");
            return Some(format!(
                "Add the missing OAuth scope in the Slack app settings and reinstall the app. \
                 Required scope: {needed}"
            ));
        },
        "not_in_channel" => {
            "The bot is not a member of this channel. Invite it with /invite @<bot-name>."
        },
        "channel_not_found" => {
            "Check the channel ID or name. The channel may have been deleted or the bot may \
             lack access."
        },
        "user_not_found" => {
            "Check the user ID. The user may not exist in this workspace."
        },
        "invalid_auth" => "The token is invalid or expired. Generate a new token.",
        "account_inactive" => "The Slack workspace or account is deactivated or suspended.",
        "token_revoked" => {
            "The token was revoked. Generate a new one in the Slack app settings."
        },
        "ratelimited" => "Slack rate limit reached. Wait a moment and try again.",
        "access_denied" => {
            "Not permitted. Check the app's scopes and the channel permissions."
        },
        "cannot_dm_bot" => "Bot users cannot receive direct messages. Use a regular user ID.",
        "user_disabled" => "The target user account is deactivated.",
        "not_allowed_token_type" => {
            "This endpoint rejects the token type used. search.messages needs a user token \
             (xoxp-); bot tokens cannot search."
        },
        "invalid_arguments" => {
            "Check the request parameters. A required field may be missing or malformed."
        },
        "file_too_large" => "The file exceeds Slack's size limit for this workspace plan.",
        "upload_failed" => "The file upload failed. Check the network connection and file permissions.",
        _ => return None,
    };
    Some(text.to_string())
}
