//! HTTP client for the relay server.
//!
//! [`RelayClient`] posts conversations to a running relay and decodes the
//! streamed reply with [`sse::decode`](crate::sse::decode). The chat session is
//! written against the [`ChatTransport`] trait rather than the concrete client.

use std::pin::Pin;

use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, StatusCode, header};
use url::Url;

use crate::error::{Error, Result};
use crate::sse;
use crate::types::{ChatReply, ChatRequest, ErrorBody, RoleMessage};

/// Default relay address.
pub const DEFAULT_RELAY_URL: &str = "http://localhost:3001/";

/// Text increments of one streamed reply, in arrival order.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Something that can stream a reply for a conversation.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `messages` and return the reply as a stream of deltas.
    ///
    /// Fails with `StreamUnavailable` when the stream could not be opened.
    async fn stream_chat(&self, messages: Vec<RoleMessage>) -> Result<DeltaStream>;
}

/// Client for the relay endpoints.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: ReqwestClient,
    base_url: Url,
    token: Option<String>,
}

impl RelayClient {
    /// Create a client for the relay at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Present `token` as a bearer token on every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// The relay this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn headers(&self, accept: &'static str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static(accept));
        if let Some(token) = &self.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                Error::configuration("Relay token contains characters not valid in a header")
            })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn post(&self, path: &str, request: &ChatRequest, accept: &'static str) -> Result<Response> {
        let url = self.base_url.join(path)?;
        self.client
            .post(url)
            .headers(self.headers(accept)?)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                Error::stream_unavailable(format!("Failed to reach relay: {e}"), None)
            })
    }

    /// Post `messages` to `/api/chat/stream` and decode the reply.
    pub async fn stream_chat(&self, messages: Vec<RoleMessage>) -> Result<DeltaStream> {
        let request = ChatRequest::from_messages(messages);
        let response = self
            .post("api/chat/stream", &request, "text/event-stream")
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response).await;
            return Err(Error::stream_unavailable(
                format!("Relay answered {status}: {detail}"),
                Some(status.as_u16()),
            ));
        }
        Ok(Box::pin(sse::decode(response.bytes_stream())))
    }

    /// Post a single message to `/api/chat` and return the complete reply.
    pub async fn chat(&self, message: &str) -> Result<String> {
        let request = ChatRequest::from_message(message);
        let response = self.post("api/chat", &request, "application/json").await?;
        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response).await;
            return Err(status_error(status, detail));
        }
        let reply = response.json::<ChatReply>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse reply: {e}"), Some(Box::new(e)))
        })?;
        Ok(reply.reply)
    }
}

#[async_trait::async_trait]
impl ChatTransport for RelayClient {
    async fn stream_chat(&self, messages: Vec<RoleMessage>) -> Result<DeltaStream> {
        RelayClient::stream_chat(self, messages).await
    }
}

async fn error_detail(response: Response) -> String {
    match response.text().await {
        Ok(body) => serde_json::from_str::<ErrorBody>(&body)
            .map(|parsed| parsed.error)
            .unwrap_or(body),
        Err(e) => format!("unreadable body: {e}"),
    }
}

fn status_error(status: StatusCode, detail: String) -> Error {
    match status {
        StatusCode::BAD_REQUEST => Error::invalid_request(detail),
        StatusCode::UNAUTHORIZED => Error::unauthorized(detail),
        StatusCode::TOO_MANY_REQUESTS => Error::rate_limited(detail),
        _ => Error::upstream(detail, Some(status.as_u16()), None),
    }
}
