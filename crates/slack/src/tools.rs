//! Uniform JSON envelopes around every gateway operation.
//!
//! Callers branch only on `success`. Failures carry the error text, its
//! kind and code, a remediation hint, and the inputs the operation was
//! working on.

use std::path::Path;

use {
    serde::Serialize,
    serde_json::{Map, Value, json},
};

use crate::{
    api::SlackGateway,
    credentials::CredentialTier,
    delivery::DeliveryRequest,
    error::{ErrorKind, GatewayError, Result},
    types::UserType,
};

/// Flat result object: `success` plus payload or error fields.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Envelope {
    /// Success envelope. Object payloads are flattened, anything else lands
    /// under `result`.
    pub fn ok(payload: impl Serialize) -> Self {
        let fields = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            Ok(other) => Map::from_iter([("result".to_string(), other)]),
            Err(err) => {
                return Self::from_error(&GatewayError::malformed(
                    "serialization_failed",
                    err.to_string(),
                ));
            },
        };
        Self {
            success: true,
            fields,
            error: None,
            error_kind: None,
            error_code: None,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn from_error(err: &GatewayError) -> Self {
        Self {
            success: false,
            fields: Map::new(),
            error: Some(err.detail.clone()),
            error_kind: Some(err.kind),
            error_code: Some(err.code.clone()),
            suggestion: Some(err.suggestion.clone()),
        }
    }

    /// Attach an extra top-level field.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    fn from_result<T: Serialize>(result: Result<T>, context: &[(&str, Value)]) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(err) => context
                .iter()
                .fold(Self::from_error(&err), |env, (key, value)| {
                    env.with(key, value.clone())
                }),
        }
    }
}

/// One envelope-returning method per gateway operation.
#[derive(Clone)]
pub struct SlackTools {
    gateway: SlackGateway,
}

impl SlackTools {
    #[must_use]
    pub fn new(gateway: SlackGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &SlackGateway {
        &self.gateway
    }

    pub async fn test_connection(&self, tier: CredentialTier) -> Envelope {
        Envelope::from_result(self.gateway.test_connection(tier).await, &[(
            "tier",
            json!(tier),
        )])
    }

    pub async fn send_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> Envelope {
        Envelope::from_result(
            self.gateway.send_message(channel, text, thread_ts).await,
            &[("channel", json!(channel))],
        )
    }

    pub async fn list_channels(&self, exclude_archived: bool, types: Option<&str>) -> Envelope {
        let result = self
            .gateway
            .list_channels(exclude_archived, types)
            .await
            .map(|channels| json!({"count": channels.len(), "channels": channels}));
        Envelope::from_result(result, &[])
    }

    pub async fn channel_history(
        &self,
        channel: &str,
        limit: Option<u32>,
        latest: Option<&str>,
        oldest: Option<&str>,
    ) -> Envelope {
        let result = self
            .gateway
            .channel_history(channel, limit, latest, oldest)
            .await
            .map(|messages| {
                json!({"channel": channel, "count": messages.len(), "messages": messages})
            });
        Envelope::from_result(result, &[("channel", json!(channel))])
    }

    pub async fn list_users(
        &self,
        include_bots: bool,
        limit: Option<u32>,
        user_types: Option<&[UserType]>,
    ) -> Envelope {
        let result = self
            .gateway
            .list_users(include_bots, limit, user_types)
            .await
            .map(|users| json!({"count": users.len(), "users": users}));
        Envelope::from_result(result, &[])
    }

    pub async fn find_user_by_email(&self, email: &str) -> Envelope {
        let result = self
            .gateway
            .find_user_by_email(email)
            .await
            .map(|user| json!({"email": email, "found": user.is_some(), "user": user}));
        Envelope::from_result(result, &[("email", json!(email))])
    }

    pub async fn dm_candidates(&self, limit: Option<u32>) -> Envelope {
        let result = self
            .gateway
            .dm_candidates(limit)
            .await
            .map(|users| json!({"count": users.len(), "users": users}));
        Envelope::from_result(result, &[])
    }

    pub async fn send_direct_message(&self, user: &str, text: &str) -> Envelope {
        Envelope::from_result(self.gateway.send_direct_message(user, text).await, &[(
            "user",
            json!(user),
        )])
    }

    pub async fn search_messages(
        &self,
        query: &str,
        sort: &str,
        sort_dir: &str,
        count: u32,
    ) -> Envelope {
        Envelope::from_result(
            self.gateway
                .search_messages(query, sort, sort_dir, count)
                .await,
            &[("query", json!(query))],
        )
    }

    pub async fn add_reaction(&self, channel: &str, timestamp: &str, name: &str) -> Envelope {
        Envelope::from_result(
            self.gateway.add_reaction(channel, timestamp, name).await,
            &[("channel", json!(channel)), ("timestamp", json!(timestamp))],
        )
    }

    pub async fn workspace_info(&self) -> Envelope {
        Envelope::from_result(self.gateway.workspace_info().await, &[])
    }

    pub async fn upload_file(&self, request: &DeliveryRequest) -> Envelope {
        Envelope::from_result(self.gateway.upload_file(request).await, &[
            ("file_path", json!(request.path.display().to_string())),
            ("channel", json!(request.channel)),
        ])
    }

    pub fn preview_file(&self, path: &Path, max_lines: usize) -> Envelope {
        Envelope::from_result(self.gateway.preview_file(path, max_lines), &[(
            "file_path",
            json!(path.display().to_string()),
        )])
    }

    pub fn verify_or_create_file(&self, path: &Path, content: Option<&str>) -> Envelope {
        Envelope::from_result(self.gateway.verify_or_create_file(path, content), &[(
            "file_path",
            json!(path.display().to_string()),
        )])
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            delivery::UploadLimits,
            test_support::{Scripted, ScriptedTransport, dispatcher, dispatcher_bot_only},
        },
        slackline_config::DefaultsConfig,
    };

    fn tools(dispatcher: crate::dispatch::Dispatcher) -> SlackTools {
        SlackTools::new(SlackGateway::new(
            dispatcher,
            UploadLimits::default(),
            DefaultsConfig {
                message_limit: 100,
                user_limit: 50,
            },
        ))
    }

    #[tokio::test]
    async fn not_in_channel_yields_invite_hint_after_one_request() {
        let transport = ScriptedTransport::new([Scripted::error("not_in_channel")]);
        let envelope = tools(dispatcher(&transport))
            .send_message("C1", "hi", None)
            .await;

        assert!(!envelope.success);
        assert_eq!(transport.calls().len(), 1);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["error_code"], "not_in_channel");
        assert_eq!(json["error_kind"], "remote_rejected");
        assert_eq!(json["channel"], "C1");
        assert!(json["suggestion"].as_str().unwrap().contains("/invite"));
        assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn success_payload_is_flat() {
        let transport = ScriptedTransport::new([Scripted::ok(
            serde_json::json!({"ok": true, "channel": "C1", "ts": "9.9"}),
        )]);
        let envelope = tools(dispatcher(&transport))
            .send_message("C1", "hi", None)
            .await;

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["ts"], "9.9");
        assert!(json.get("error").is_none());
        assert!(json.get("suggestion").is_none());
    }

    #[tokio::test]
    async fn search_failure_keeps_query_context() {
        let transport = ScriptedTransport::new(Vec::new());
        let envelope = tools(dispatcher_bot_only(&transport))
            .search_messages("incident", "score", "desc", 10)
            .await;

        assert!(!envelope.success);
        assert_eq!(envelope.error_kind, Some(ErrorKind::MissingElevatedCredential));
        assert_eq!(envelope.fields["query"], "incident");
        assert!(!envelope.suggestion.unwrap().is_empty());
    }

    #[test]
    fn preview_failure_reports_path() {
        let transport = ScriptedTransport::new(Vec::new());
        let envelope = tools(dispatcher(&transport))
            .preview_file(Path::new("/definitely/not/here.txt"), 5);

        assert!(!envelope.success);
        assert_eq!(envelope.error_kind, Some(ErrorKind::FileUnavailable));
        assert_eq!(envelope.fields["file_path"], "/definitely/not/here.txt");
    }

    #[test]
    fn non_object_payload_lands_under_result() {
        let envelope = Envelope::ok(vec![1, 2, 3]);
        assert!(envelope.success);
        assert_eq!(envelope.fields["result"], serde_json::json!([1, 2, 3]));
    }
}
