//! Purpose: HTTP trigger backend posting events to a pub/sub service endpoint.
//! Exports: `RemoteTrigger`.
//! Role: Minimal server-SDK stand-in; one POST per trigger, nothing more.
//! Invariants: No retries, no reconnection, no delivery guarantees.
//! Invariants: Service error envelopes are decoded when present; otherwise
//! the HTTP status picks the error kind.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::core::backend::TriggerBackend;
use crate::core::error::{Error, ErrorKind};

type ApiResult<T> = Result<T, Error>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Triggers events against `POST {base}/apps/{app}/events`.
#[derive(Clone)]
pub struct RemoteTrigger {
    inner: Arc<RemoteTriggerInner>,
}

struct RemoteTriggerInner {
    base_url: Url,
    app: String,
    token: Option<String>,
    agent: ureq::Agent,
}

#[derive(Serialize)]
struct EventRequest<'a> {
    channel: &'a str,
    name: &'a str,
    data: &'a Value,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    kind: String,
    message: Option<String>,
    hint: Option<String>,
}

impl RemoteTrigger {
    pub fn new(base_url: impl Into<String>, app: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Ok(Self {
            inner: Arc::new(RemoteTriggerInner {
                base_url,
                app: app.into(),
                token: None,
                agent,
            }),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.token = Some(token.into());
        } else {
            self.inner = Arc::new(RemoteTriggerInner {
                base_url: self.inner.base_url.clone(),
                app: self.inner.app.clone(),
                token: Some(token.into()),
                agent: self.inner.agent.clone(),
            });
        }
        self
    }

    pub fn base_url(&self) -> &str {
        self.inner.base_url.as_str()
    }

    fn events_url(&self) -> ApiResult<Url> {
        let path = format!("apps/{}/events", self.inner.app);
        self.inner.base_url.join(&path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("failed to build events url")
                .with_source(err)
        })
    }
}

impl TriggerBackend for RemoteTrigger {
    fn trigger(&self, channel: &str, event: &str, payload: &Value) -> Result<(), Error> {
        let url = self.events_url()?;
        let body = EventRequest {
            channel,
            name: event,
            data: payload,
        };
        let encoded = serde_json::to_string(&body).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })?;

        let mut request = self
            .inner
            .agent
            .post(url.as_str())
            .set("Accept", "application/json")
            .set("Content-Type", "application/json");
        if let Some(token) = &self.inner.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        match request.send_string(&encoded) {
            Ok(_response) => Ok(()),
            Err(ureq::Error::Status(code, response)) => Err(parse_error_response(code, response)
                .with_channel(channel)
                .with_event(event)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("trigger request failed")
                .with_channel(channel)
                .with_event(event)
                .with_source(err)),
        }
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid service url")
            .with_hint("Use an absolute http:// or https:// url.")
            .with_source(err)
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported url scheme {other}"))
                .with_hint("Use an absolute http:// or https:// url."));
        }
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
        return error_from_remote(envelope.error);
    }
    let kind = error_kind_from_status(status);
    Error::new(kind).with_message(format!("remote error status {status}"))
}

fn error_from_remote(remote: RemoteError) -> Error {
    let mut err = Error::new(parse_error_kind(&remote.kind));
    if let Some(message) = remote.message {
        err = err.with_message(message);
    }
    if let Some(hint) = remote.hint {
        err = err.with_hint(hint);
    }
    err
}

fn parse_error_kind(kind: &str) -> ErrorKind {
    match kind {
        "Internal" => ErrorKind::Internal,
        "Usage" => ErrorKind::Usage,
        "Schema" => ErrorKind::Schema,
        "NotFound" => ErrorKind::NotFound,
        "Permission" => ErrorKind::Permission,
        "Io" => ErrorKind::Io,
        _ => ErrorKind::Internal,
    }
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 | 422 => ErrorKind::Usage,
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}
