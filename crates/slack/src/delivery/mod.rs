//! File delivery: pick the cheapest path that fits a file, then run it.
//!
//! Small text files are posted inline, small files become snippets, larger
//! ones go through Slack's external upload handshake, and files too big to
//! transfer are announced with their metadata instead.

pub mod candidate;
pub mod files;
pub mod sensitive;
pub mod strategy;

use std::path::PathBuf;

use {
    serde::Serialize,
    serde_json::{Value, json},
    tracing::{info, warn},
};

pub use {
    candidate::FileCandidate,
    files::{FileInfo, FilePreview, VerifiedFile, format_file_size, preview, verify_or_create},
    strategy::{DeliveryStrategy, RejectReason, UploadLimits, select_strategy, snippet_filetype},
};

use crate::{
    credentials::CredentialTier,
    dispatch::Dispatcher,
    error::{GatewayError, Result},
    transport::ApiRequest,
};

const PREVIEW_LINES: usize = 20;
const TRUNCATION_MARKER: &str = "\n\n... (content truncated)";
const CLOSING_FENCE: &str = "\n```";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    TextMessage,
    CodeSnippet,
    FileUpload,
    FileInfoOnly,
}

/// What to deliver and where.
#[derive(Debug, Clone, Default)]
pub struct DeliveryRequest {
    pub path: PathBuf,
    pub channel: String,
    /// Defaults to the file name.
    pub title: Option<String>,
    pub comment: Option<String>,
    /// Create the file with this content when it does not exist.
    pub create_with: Option<String>,
    /// Attach a local preview to the report.
    pub preview_first: bool,
}

/// File metadata returned by `files.completeUploadExternal`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_private: Option<String>,
}

impl UploadedFile {
    fn from_value(file: &Value) -> Option<Self> {
        let text = |key: &str| file.get(key).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            id: text("id")?,
            name: text("name"),
            title: text("title"),
            filetype: text("filetype"),
            url_private: text("url_private"),
        })
    }
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub method: DeliveryMethod,
    pub file_name: String,
    pub size: u64,
    pub size_human: String,
    pub tier: CredentialTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<UploadedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    /// Set when the snippet path failed and the standard upload took over.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<DeliveryMethod>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<FilePreview>,
}

impl DeliveryReport {
    fn new(method: DeliveryMethod, candidate: &FileCandidate, tier: CredentialTier) -> Self {
        Self {
            method,
            file_name: candidate.name.clone(),
            size: candidate.size,
            size_human: format_file_size(candidate.size),
            tier,
            file: None,
            channel: None,
            ts: None,
            fallback_from: None,
            truncated: false,
            preview: None,
        }
    }
}

/// Runs the delivery path chosen for each file.
#[derive(Clone)]
pub struct Deliverer {
    dispatcher: Dispatcher,
    limits: UploadLimits,
}

impl Deliverer {
    #[must_use]
    pub fn new(dispatcher: Dispatcher, limits: UploadLimits) -> Self {
        Self { dispatcher, limits }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    pub async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryReport> {
        let (candidate, local_preview) = Self::prepare(request).await?;

        let strategy = select_strategy(&candidate, &self.limits);
        info!(
            file = %candidate.name,
            size = %format_file_size(candidate.size),
            ?strategy,
            channel = %request.channel,
            "delivering file"
        );

        let mut report = match strategy {
            DeliveryStrategy::Rejected(RejectReason::Sensitive) => {
                let reason = sensitive::sensitivity_reason(&candidate.path)
                    .or_else(|| sensitive::sensitivity_reason(&request.path))
                    .unwrap_or("denylisted");
                return Err(GatewayError::sensitive_file(&candidate.path, reason));
            },
            DeliveryStrategy::Rejected(RejectReason::TooLarge) => {
                return Err(GatewayError::file_too_large(
                    candidate.size,
                    self.limits.max_file_size,
                ));
            },
            DeliveryStrategy::InlineText => self.post_inline(&candidate, request).await?,
            DeliveryStrategy::Snippet { filetype } => {
                match self
                    .external_upload(&candidate, request, CredentialTier::Primary, Some(filetype))
                    .await
                {
                    Ok(file) => {
                        let mut report = DeliveryReport::new(
                            DeliveryMethod::CodeSnippet,
                            &candidate,
                            CredentialTier::Primary,
                        );
                        report.file = Some(file);
                        report
                    },
                    Err(err) => {
                        warn!(
                            file = %candidate.name,
                            code = %err.code,
                            "snippet upload failed, falling back to standard upload"
                        );
                        let tier = self.limits.tier_for(candidate.size);
                        let mut report = self.standard(&candidate, request, tier).await?;
                        report.fallback_from = Some(DeliveryMethod::CodeSnippet);
                        report
                    },
                }
            },
            DeliveryStrategy::Standard { tier } => self.standard(&candidate, request, tier).await?,
            DeliveryStrategy::InfoOnly => self.post_info(&candidate, request).await?,
        };

        report.preview = local_preview;
        info!(file = %candidate.name, method = ?report.method, "file delivered");
        Ok(report)
    }

    /// Create (when asked), inspect and preview the file off the async
    /// workers.
    async fn prepare(request: &DeliveryRequest) -> Result<(FileCandidate, Option<FilePreview>)> {
        let path = request.path.clone();
        let create_with = request.create_with.clone();
        let preview_first = request.preview_first;
        tokio::task::spawn_blocking(move || {
            if create_with.is_some() {
                verify_or_create(&path, create_with.as_deref())?;
            }
            let candidate = FileCandidate::inspect(&path)?;
            let local_preview = if preview_first {
                Some(preview(&candidate.path, PREVIEW_LINES)?)
            } else {
                None
            };
            Ok::<_, GatewayError>((candidate, local_preview))
        })
        .await
        .map_err(|e| GatewayError::file_unavailable(&request.path, e))?
    }

    async fn post_inline(
        &self,
        candidate: &FileCandidate,
        request: &DeliveryRequest,
    ) -> Result<DeliveryReport> {
        let bytes = tokio::fs::read(&candidate.path)
            .await
            .map_err(|e| GatewayError::file_unavailable(&candidate.path, e))?;
        let content = String::from_utf8_lossy(&bytes);

        let title = request.title.as_deref().unwrap_or(&candidate.name);
        let mut text = format!(
            "*File shared: {title}*\nName: `{}`\nSize: `{}`\n",
            candidate.name,
            format_file_size(candidate.size)
        );
        if let Some(comment) = &request.comment {
            text.push_str(&format!("{comment}\n"));
        }
        text.push_str("```\n");

        // The whole message, header and fences included, must fit the limit.
        let overhead = text.chars().count() + CLOSING_FENCE.chars().count();
        let budget = self.limits.max_message_chars.saturating_sub(overhead);
        let truncated = content.chars().count() > budget;
        if truncated {
            let keep = budget.saturating_sub(TRUNCATION_MARKER.chars().count());
            text.extend(content.chars().take(keep));
            text.push_str(TRUNCATION_MARKER);
        } else {
            text.push_str(&content);
        }
        text.push_str(CLOSING_FENCE);

        let posted = self.post_message(&request.channel, &text).await?;
        let mut report =
            DeliveryReport::new(DeliveryMethod::TextMessage, candidate, CredentialTier::Primary);
        report.channel = posted.0;
        report.ts = posted.1;
        report.truncated = truncated;
        Ok(report)
    }

    async fn post_info(
        &self,
        candidate: &FileCandidate,
        request: &DeliveryRequest,
    ) -> Result<DeliveryReport> {
        let title = request.title.as_deref().unwrap_or(&candidate.name);
        let mut text = format!(
            "*Large file: {title}*\nName: `{}`\nSize: `{}`\nExtension: `{}`\nPath: `{}`\n",
            candidate.name,
            format_file_size(candidate.size),
            candidate.extension,
            candidate.path.display()
        );
        if let Some(comment) = &request.comment {
            text.push_str(&format!("{comment}\n"));
        }
        text.push_str(&format!(
            "This file is larger than {} and cannot be uploaded directly.\n\
             Options:\n\
             • split it into smaller parts\n\
             • compress it\n\
             • share a cloud storage link instead",
            format_file_size(self.limits.large)
        ));

        let posted = self.post_message(&request.channel, &text).await?;
        let mut report =
            DeliveryReport::new(DeliveryMethod::FileInfoOnly, candidate, CredentialTier::Primary);
        report.channel = posted.0;
        report.ts = posted.1;
        Ok(report)
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
    ) -> Result<(Option<String>, Option<String>)> {
        let body = self
            .dispatcher
            .execute(
                &ApiRequest::post("chat.postMessage")
                    .with("channel", channel)
                    .with("text", text),
            )
            .await?;
        let field = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
        Ok((field("channel"), field("ts")))
    }

    async fn standard(
        &self,
        candidate: &FileCandidate,
        request: &DeliveryRequest,
        tier: CredentialTier,
    ) -> Result<DeliveryReport> {
        let file = self.external_upload(candidate, request, tier, None).await?;
        let mut report = DeliveryReport::new(DeliveryMethod::FileUpload, candidate, tier);
        report.file = Some(file);
        Ok(report)
    }

    /// `files.getUploadURLExternal` → PUT → `files.completeUploadExternal`.
    ///
    /// The tier is checked before the first step; a missing user token
    /// surfaces unchanged. Later failures become
    /// [`ErrorKind::UploadHandshakeIncomplete`](crate::ErrorKind).
    async fn external_upload(
        &self,
        candidate: &FileCandidate,
        request: &DeliveryRequest,
        tier: CredentialTier,
        snippet_type: Option<&str>,
    ) -> Result<UploadedFile> {
        const GET_URL: &str = "files.getUploadURLExternal";
        const TRANSFER: &str = "file transfer";
        const COMPLETE: &str = "files.completeUploadExternal";

        self.dispatcher
            .credentials()
            .select(tier)
            .map_err(|err| GatewayError {
                detail: format!(
                    "uploading {} ({}) requires a {}",
                    candidate.name,
                    format_file_size(candidate.size),
                    tier.label()
                ),
                ..err
            })?;

        let ticket = self
            .dispatcher
            .execute(
                &ApiRequest::get(GET_URL)
                    .with("filename", candidate.name.as_str())
                    .with("length", candidate.size)
                    .with_opt("snippet_type", snippet_type)
                    .tier(tier),
            )
            .await
            .map_err(|e| GatewayError::handshake_incomplete(GET_URL, e))?;
        let field = |key: &str| ticket.get(key).and_then(Value::as_str).map(str::to_string);
        let (Some(upload_url), Some(file_id)) = (field("upload_url"), field("file_id")) else {
            return Err(GatewayError::handshake_incomplete(
                GET_URL,
                GatewayError::malformed(
                    "upload_ticket_missing",
                    "response lacks upload_url or file_id",
                ),
            ));
        };

        self.dispatcher
            .transfer(&upload_url, &candidate.path, candidate.size)
            .await
            .map_err(|e| GatewayError::handshake_incomplete(TRANSFER, e))?;

        let title = request.title.as_deref().unwrap_or(&candidate.name);
        let completed = self
            .dispatcher
            .execute(
                &ApiRequest::post(COMPLETE)
                    .with("files", json!([{"id": file_id, "title": title}]))
                    .with("channel_id", request.channel.as_str())
                    .with_opt("initial_comment", request.comment.as_deref())
                    .tier(tier),
            )
            .await
            .map_err(|e| GatewayError::handshake_incomplete(COMPLETE, e))?;

        completed
            .get("files")
            .and_then(|files| files.get(0))
            .and_then(UploadedFile::from_value)
            .ok_or_else(|| {
                GatewayError::handshake_incomplete(
                    COMPLETE,
                    GatewayError::malformed(
                        "file_info_missing",
                        "upload completed but Slack returned no file metadata",
                    ),
                )
            })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            error::ErrorKind,
            test_support::{Scripted, ScriptedTransport, UPLOAD_ENDPOINT, dispatcher},
        },
    };

    fn ticket() -> Scripted {
        Scripted::ok(json!({"ok": true, "upload_url": "https://files.example/u/1", "file_id": "F1"}))
    }

    fn completed() -> Scripted {
        Scripted::ok(json!({"ok": true, "files": [{"id": "F1", "title": "t"}]}))
    }

    /// Scratch space inside the crate, away from system temp roots.
    fn scratch() -> tempfile::TempDir {
        tempfile::tempdir_in(env!("CARGO_MANIFEST_DIR")).unwrap()
    }

    fn request_for(path: PathBuf) -> DeliveryRequest {
        DeliveryRequest {
            path,
            channel: "C1".into(),
            ..DeliveryRequest::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn snippet_failure_falls_back_to_standard_upload() {
        let dir = scratch();
        let path = dir.path().join("table.csv");
        std::fs::write(&path, vec![b'a'; 60 * 1024]).unwrap();

        let transport = ScriptedTransport::new([
            ticket(),
            Scripted::raw(500, "nope"),
            ticket(),
            Scripted::raw(200, "OK"),
            completed(),
        ]);
        let deliverer = Deliverer::new(dispatcher(&transport), UploadLimits::default());
        let report = deliverer.deliver(&request_for(path)).await.unwrap();

        assert_eq!(report.method, DeliveryMethod::FileUpload);
        assert_eq!(report.fallback_from, Some(DeliveryMethod::CodeSnippet));
        assert_eq!(transport.endpoints(), [
            "files.getUploadURLExternal",
            UPLOAD_ENDPOINT,
            "files.getUploadURLExternal",
            UPLOAD_ENDPOINT,
            "files.completeUploadExternal",
        ]);
        let calls = transport.calls();
        assert_eq!(calls[0].payload["snippet_type"], "text");
        assert!(calls[2].payload.get("snippet_type").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn transfer_failure_never_completes_upload() {
        let dir = scratch();
        let path = dir.path().join("archive.zip");
        std::fs::File::create(&path)
            .unwrap()
            .set_len(2 * 1024 * 1024)
            .unwrap();

        let transport = ScriptedTransport::new([ticket(), Scripted::Fault]);
        let deliverer = Deliverer::new(dispatcher(&transport), UploadLimits::default());
        let err = deliverer.deliver(&request_for(path)).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::UploadHandshakeIncomplete);
        assert_eq!(err.code, "network_error");
        assert_eq!(transport.endpoints(), [
            "files.getUploadURLExternal",
            UPLOAD_ENDPOINT
        ]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_file_metadata_is_incomplete() {
        let dir = scratch();
        let path = dir.path().join("archive.zip");
        std::fs::File::create(&path)
            .unwrap()
            .set_len(2 * 1024 * 1024)
            .unwrap();

        let transport = ScriptedTransport::new([
            ticket(),
            Scripted::raw(200, "OK"),
            Scripted::ok(json!({"ok": true, "files": []})),
        ]);
        let deliverer = Deliverer::new(dispatcher(&transport), UploadLimits::default());
        let err = deliverer.deliver(&request_for(path)).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::UploadHandshakeIncomplete);
        assert_eq!(err.code, "file_info_missing");
    }

    #[tokio::test(start_paused = true)]
    async fn inline_message_with_wrapper_fits_message_limit() {
        let dir = scratch();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "x".repeat(1000)).unwrap();

        let transport = ScriptedTransport::new([Scripted::ok(
            json!({"ok": true, "channel": "C1", "ts": "1.1"}),
        )]);
        let limits = UploadLimits {
            max_message_chars: 200,
            ..UploadLimits::default()
        };
        let deliverer = Deliverer::new(dispatcher(&transport), limits);
        let report = deliverer.deliver(&request_for(path)).await.unwrap();

        assert_eq!(report.method, DeliveryMethod::TextMessage);
        assert!(report.truncated);
        assert_eq!(report.ts.as_deref(), Some("1.1"));
        let text = transport.calls()[0].payload["text"].as_str().unwrap().to_string();
        assert_eq!(text.chars().count(), 200);
        assert!(text.starts_with("*File shared: notes.txt*"));
        assert!(text.ends_with(&format!("x{TRUNCATION_MARKER}{CLOSING_FENCE}")));
    }

    #[tokio::test(start_paused = true)]
    async fn short_inline_text_is_posted_whole() {
        let dir = scratch();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# status\nall green").unwrap();

        let transport = ScriptedTransport::new([Scripted::ok(
            json!({"ok": true, "channel": "C1", "ts": "1.2"}),
        )]);
        let deliverer = Deliverer::new(dispatcher(&transport), UploadLimits::default());
        let report = deliverer.deliver(&request_for(path)).await.unwrap();

        assert!(!report.truncated);
        let text = transport.calls()[0].payload["text"].as_str().unwrap().to_string();
        assert!(text.ends_with("```\n# status\nall green\n```"));
    }

    #[tokio::test(start_paused = true)]
    async fn small_csv_is_delivered_as_snippet() {
        let dir = scratch();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, vec![b'1'; 900 * 1024]).unwrap();

        let transport = ScriptedTransport::new([ticket(), Scripted::raw(200, "OK"), completed()]);
        let deliverer = Deliverer::new(dispatcher(&transport), UploadLimits::default());
        let report = deliverer.deliver(&request_for(path)).await.unwrap();

        assert_eq!(report.method, DeliveryMethod::CodeSnippet);
        assert_eq!(report.tier, CredentialTier::Primary);
        assert!(report.fallback_from.is_none());
        assert_eq!(report.file.unwrap().id, "F1");
        let calls = transport.calls();
        assert_eq!(calls[0].payload["snippet_type"], "text");
        assert_eq!(calls[0].payload["length"], 900 * 1024);
        assert_eq!(calls[1].payload["length"], 900 * 1024);
        assert_eq!(calls[2].endpoint, "files.completeUploadExternal");
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_for_transfer_posts_info_only() {
        let dir = scratch();
        let path = dir.path().join("disk.img");
        std::fs::File::create(&path)
            .unwrap()
            .set_len(1024 * 1024 * 1024 + 1)
            .unwrap();

        let transport = ScriptedTransport::new([Scripted::ok(
            json!({"ok": true, "channel": "C1", "ts": "2.0"}),
        )]);
        let deliverer = Deliverer::new(dispatcher(&transport), UploadLimits::default());
        let report = deliverer.deliver(&request_for(path)).await.unwrap();

        assert_eq!(report.method, DeliveryMethod::FileInfoOnly);
        assert!(report.file.is_none());
        assert_eq!(transport.endpoints(), ["chat.postMessage"]);
        let text = transport.calls()[0].payload["text"].as_str().unwrap().to_string();
        assert!(text.contains("disk.img"));
        assert!(text.contains("split it into smaller parts"));
        assert!(text.contains("compress it"));
        assert!(text.contains("cloud storage link"));
    }

    #[tokio::test(start_paused = true)]
    async fn large_upload_uses_user_token_for_every_api_step() {
        let dir = scratch();
        let path = dir.path().join("footage.mp4");
        std::fs::File::create(&path)
            .unwrap()
            .set_len(200 * 1024 * 1024)
            .unwrap();

        let transport = ScriptedTransport::new([ticket(), Scripted::raw(200, "OK"), completed()]);
        let deliverer = Deliverer::new(dispatcher(&transport), UploadLimits::default());
        let report = deliverer.deliver(&request_for(path)).await.unwrap();

        assert_eq!(report.method, DeliveryMethod::FileUpload);
        assert_eq!(report.tier, CredentialTier::Elevated);
        let calls = transport.calls();
        assert_eq!(transport.endpoints(), [
            "files.getUploadURLExternal",
            UPLOAD_ENDPOINT,
            "files.completeUploadExternal",
        ]);
        assert_eq!(calls[0].token, "xoxp-user");
        assert_eq!(calls[2].token, "xoxp-user");
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn symlinked_key_is_rejected_before_any_request() {
        let dir = scratch();
        std::fs::create_dir(dir.path().join(".ssh")).unwrap();
        let key = dir.path().join(".ssh/id_ed25519");
        std::fs::write(&key, "secret").unwrap();
        let link = dir.path().join("notes.txt");
        std::os::unix::fs::symlink(&key, &link).unwrap();

        let transport = ScriptedTransport::new(Vec::new());
        let deliverer = Deliverer::new(dispatcher(&transport), UploadLimits::default());
        let err = deliverer.deliver(&request_for(link)).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::SensitiveFileRejected);
        assert!(transport.calls().is_empty());
    }
}
