//! In-memory transport that replays a fixed script of responses.

use std::{
    collections::VecDeque,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde_json::{Map, Value},
};

use crate::{
    credentials::Credentials,
    dispatch::{Dispatcher, RetryPolicy},
    transport::{ApiRequest, RawResponse, Transport, TransportFault},
};

pub(crate) const UPLOAD_ENDPOINT: &str = "<upload>";

pub(crate) enum Scripted {
    Reply {
        status: u16,
        retry_after: Option<u64>,
        body: String,
    },
    Fault,
}

impl Scripted {
    pub(crate) fn ok(body: Value) -> Self {
        Self::raw(200, &body.to_string())
    }

    pub(crate) fn error(code: &str) -> Self {
        Self::ok(serde_json::json!({"ok": false, "error": code}))
    }

    pub(crate) fn ratelimited(retry_after: Option<u64>) -> Self {
        Self::Reply {
            status: 429,
            retry_after,
            body: r#"{"ok":false,"error":"ratelimited"}"#.into(),
        }
    }

    pub(crate) fn raw(status: u16, body: &str) -> Self {
        Self::Reply {
            status,
            retry_after: None,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub endpoint: String,
    pub token: String,
    pub payload: Map<String, Value>,
    pub at: tokio::time::Instant,
}

pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: impl IntoIterator<Item = Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn endpoints(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.endpoint).collect()
    }

    fn next(&self, call: Call) -> Result<RawResponse, TransportFault> {
        self.calls.lock().unwrap().push(call);
        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Reply {
                status,
                retry_after,
                body,
            }) => Ok(RawResponse {
                status,
                retry_after: retry_after.map(Duration::from_secs),
                body,
            }),
            Some(Scripted::Fault) => Err(TransportFault::Connect("scripted fault".into())),
            None => panic!("transport script exhausted"),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        token: &Secret<String>,
    ) -> Result<RawResponse, TransportFault> {
        self.next(Call {
            endpoint: request.endpoint().to_string(),
            token: token.expose_secret().clone(),
            payload: request.payload().clone(),
            at: tokio::time::Instant::now(),
        })
    }

    async fn upload(
        &self,
        url: &str,
        _path: &Path,
        length: u64,
    ) -> Result<RawResponse, TransportFault> {
        let mut payload = Map::new();
        payload.insert("url".into(), url.into());
        payload.insert("length".into(), length.into());
        self.next(Call {
            endpoint: UPLOAD_ENDPOINT.into(),
            token: String::new(),
            payload,
            at: tokio::time::Instant::now(),
        })
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
        backoff_factor: 2,
        rate_limit_delay: Duration::from_secs(1),
    }
}

pub(crate) fn dispatcher(transport: &Arc<ScriptedTransport>) -> Dispatcher {
    let credentials = Credentials::new(
        Some(Secret::new("xoxb-bot".into())),
        Some(Secret::new("xoxp-user".into())),
    )
    .unwrap();
    let transport: Arc<dyn Transport> = transport.clone();
    Dispatcher::new(transport, credentials, fast_policy())
}

pub(crate) fn dispatcher_bot_only(transport: &Arc<ScriptedTransport>) -> Dispatcher {
    let credentials = Credentials::new(Some(Secret::new("xoxb-bot".into())), None).unwrap();
    let transport: Arc<dyn Transport> = transport.clone();
    Dispatcher::new(transport, credentials, fast_policy())
}
