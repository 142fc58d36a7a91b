//! Request descriptors and the HTTP session they are sent over.

use std::{path::Path, time::Duration};

use {
    async_trait::async_trait,
    reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER},
    secrecy::{ExposeSecret, Secret},
    serde_json::{Map, Value},
    tokio::sync::OnceCell,
    tokio_util::io::ReaderStream,
    tracing::debug,
};

use crate::credentials::CredentialTier;

const USER_AGENT: &str = concat!("slackline/", env!("CARGO_PKG_VERSION"));
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Payload goes into the query string.
    Get,
    /// Payload goes into a JSON body.
    Post,
}

/// One logical Web API call: endpoint, verb, payload and credential tier.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    endpoint: String,
    method: HttpMethod,
    payload: Map<String, Value>,
    tier: CredentialTier,
}

impl ApiRequest {
    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, HttpMethod::Get)
    }

    #[must_use]
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, HttpMethod::Post)
    }

    fn new(endpoint: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            payload: Map::new(),
            tier: CredentialTier::Primary,
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// Like [`with`](Self::with), skipping `None`.
    #[must_use]
    pub fn with_opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    #[must_use]
    pub fn tier(mut self, tier: CredentialTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn credential_tier(&self) -> CredentialTier {
        self.tier
    }

    /// Payload flattened to string pairs for a query string.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.payload
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

/// What came back over the wire, before any interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// `Retry-After` in whole seconds, when present and numeric.
    pub retry_after: Option<Duration>,
    pub body: String,
}

/// A failure below HTTP: nothing usable came back.
#[derive(Debug, thiserror::Error)]
pub enum TransportFault {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportFault {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Sends requests. The dispatcher owns retry and interpretation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        token: &Secret<String>,
    ) -> Result<RawResponse, TransportFault>;

    /// Stream the file at `path` to a pre-signed upload URL.
    async fn upload(&self, url: &str, path: &Path, length: u64)
    -> Result<RawResponse, TransportFault>;
}

/// `reqwest`-backed transport with a lazily built, shared client.
pub struct HttpTransport {
    base_url: String,
    timeout: Duration,
    client: OnceCell<reqwest::Client>,
}

impl HttpTransport {
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&reqwest::Client, TransportFault> {
        self.client
            .get_or_try_init(|| async {
                debug!(timeout_secs = self.timeout.as_secs(), "building HTTP client");
                reqwest::Client::builder()
                    .timeout(self.timeout)
                    .user_agent(USER_AGENT)
                    .build()
            })
            .await
            .map_err(TransportFault::from)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    async fn into_raw(resp: reqwest::Response) -> Result<RawResponse, TransportFault> {
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = resp.text().await?;
        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        token: &Secret<String>,
    ) -> Result<RawResponse, TransportFault> {
        let client = self.client().await?;
        let url = self.url(request.endpoint());
        let builder = match request.method() {
            HttpMethod::Get => client.get(url).query(&request.query_pairs()),
            HttpMethod::Post => client
                .post(url)
                .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(Value::Object(request.payload().clone()).to_string()),
        };
        let resp = builder.bearer_auth(token.expose_secret()).send().await?;
        Self::into_raw(resp).await
    }

    async fn upload(
        &self,
        url: &str,
        path: &Path,
        length: u64,
    ) -> Result<RawResponse, TransportFault> {
        let client = self.client().await?;
        let file = tokio::fs::File::open(path).await?;
        let resp = client
            .put(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, length)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;
        Self::into_raw(resp).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn token() -> Secret<String> {
        Secret::new("xoxb-test".into())
    }

    #[test]
    fn builder_collects_payload_and_tier() {
        let req = ApiRequest::get("search.messages")
            .with("query", "deploy")
            .with("count", 20)
            .with_opt("cursor", None::<String>)
            .tier(CredentialTier::Elevated);

        assert_eq!(req.endpoint(), "search.messages");
        assert_eq!(req.method(), HttpMethod::Get);
        assert_eq!(req.credential_tier(), CredentialTier::Elevated);
        assert_eq!(req.payload().len(), 2);
        assert!(
            req.query_pairs()
                .contains(&("count".to_string(), "20".to_string()))
        );
    }

    #[tokio::test]
    async fn get_sends_query_and_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/conversations.history")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("channel".into(), "C1".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "5".into()),
            ]))
            .match_header("authorization", "Bearer xoxb-test")
            .match_header("user-agent", USER_AGENT)
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new(server.url(), Duration::from_secs(5));
        let req = ApiRequest::get("conversations.history")
            .with("channel", "C1")
            .with("limit", 5);
        let raw = transport.send(&req, &token()).await.unwrap();

        assert_eq!(raw.status, 200);
        assert_eq!(raw.body, r#"{"ok":true}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn post_sends_json_body_and_surfaces_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat.postMessage")
            .match_header("content-type", JSON_CONTENT_TYPE)
            .match_body(mockito::Matcher::Json(json!({"channel": "C1", "text": "hi"})))
            .with_status(429)
            .with_header("retry-after", "7")
            .with_body(r#"{"ok":false,"error":"ratelimited"}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new(format!("{}/", server.url()), Duration::from_secs(5));
        let req = ApiRequest::post("chat.postMessage")
            .with("channel", "C1")
            .with("text", "hi");
        let raw = transport.send(&req, &token()).await.unwrap();

        assert_eq!(raw.status, 429);
        assert_eq!(raw.retry_after, Some(Duration::from_secs(7)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fault() {
        let transport = HttpTransport::new("http://127.0.0.1:1", Duration::from_secs(2));
        let result = transport.send(&ApiRequest::get("auth.test"), &token()).await;
        assert!(result.is_err());
    }
}
