//! Client for the upstream completion provider.
//!
//! The relay talks to any OpenAI-compatible `/chat/completions` endpoint. The
//! [`CompletionProvider`] trait is the seam the relay is written against, so
//! the server can be driven by a scripted provider in tests.

use std::env;
use std::error;
use std::pin::Pin;
use std::time::Instant;

use bytes::Bytes;
use futures::Stream;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{UPSTREAM_REQUEST_ERRORS, UPSTREAM_REQUESTS, UPSTREAM_TTFB};
use crate::sse::{self, DONE};
use crate::types::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, ProviderErrorResponse, RoleMessage,
};

/// Default provider endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Default model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Increments of one streaming completion, in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk>> + Send>>;

/// A language-model provider the relay can forward conversations to.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Open a streaming completion for `messages`.
    ///
    /// Errors returned here happen before any increment was produced.
    async fn stream(&self, messages: Vec<RoleMessage>) -> Result<ChunkStream>;

    /// Run a completion to the end and return the assistant text.
    async fn complete(&self, messages: Vec<RoleMessage>) -> Result<String>;
}

/// Client for an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAi {
    client: ReqwestClient,
    headers: HeaderMap,
    base_url: Url,
    model: String,
}

impl OpenAi {
    /// Create a new client against the default endpoint and model.
    ///
    /// The API key can be provided directly or read from the `OPENAI_API_KEY`
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<&str>,
        model: Option<String>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_ENV).map_err(|_| {
                Error::configuration(format!(
                    "API key not provided and {API_KEY_ENV} environment variable not set"
                ))
            })?,
        };

        let mut base_url = Url::parse(base_url.unwrap_or(DEFAULT_BASE_URL))?;
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
            headers: default_headers(&api_key)?,
            base_url,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// The model every request is sent with.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The endpoint completions are posted to.
    pub fn endpoint(&self) -> Result<Url> {
        Ok(self.base_url.join("chat/completions")?)
    }

    async fn post(&self, messages: Vec<RoleMessage>, streaming: bool) -> Result<Response> {
        let request = ChatCompletionRequest::new(self.model.clone(), messages, streaming);
        let mut headers = self.headers.clone();
        if streaming {
            headers.insert(
                header::ACCEPT,
                HeaderValue::from_static("text/event-stream"),
            );
        }

        UPSTREAM_REQUESTS.click();
        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint()?)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                UPSTREAM_REQUEST_ERRORS.click();
                let message = if e.is_timeout() {
                    format!("Request timed out: {e}")
                } else if e.is_connect() {
                    format!("Connection error: {e}")
                } else {
                    format!("Request failed: {e}")
                };
                Error::upstream(message, None, Some(Box::new(e)))
            })?;
        UPSTREAM_TTFB.add(started.elapsed().as_secs_f64());

        if !response.status().is_success() {
            UPSTREAM_REQUEST_ERRORS.click();
            return Err(process_error_response(response).await);
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAi {
    async fn stream(&self, messages: Vec<RoleMessage>) -> Result<ChunkStream> {
        let response = self.post(messages, true).await?;
        Ok(Box::pin(chunks(response.bytes_stream())))
    }

    async fn complete(&self, messages: Vec<RoleMessage>) -> Result<String> {
        let response = self.post(messages, false).await?;
        let completion = response.json::<ChatCompletion>().await.map_err(|e| {
            Error::upstream(
                format!("Failed to parse completion: {e}"),
                None,
                Some(Box::new(e)),
            )
        })?;
        Ok(completion.text().to_string())
    }
}

fn default_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    let mut authorization = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| Error::configuration("API key contains characters not valid in a header"))?;
    authorization.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, authorization);
    Ok(headers)
}

/// Convert a non-2xx provider response into an upstream failure.
async fn process_error_response(response: Response) -> Error {
    let status_code = response.status().as_u16();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return Error::upstream(
                format!("Failed to read error response: {e}"),
                Some(status_code),
                Some(Box::new(e)),
            );
        }
    };
    let detail = serde_json::from_str::<ProviderErrorResponse>(&body)
        .ok()
        .and_then(|parsed| parsed.error);
    let message = match detail {
        Some(detail) => match detail.error_type {
            Some(error_type) => format!("{error_type}: {}", detail.message),
            None => detail.message,
        },
        None => body,
    };
    Error::upstream(message, Some(status_code), None)
}

/// Turn the provider's event stream into completion increments.
///
/// Ends quietly at `data: [DONE]`. End of input before `[DONE]`, a frame that
/// does not parse, or one carrying an `error` object ends the stream with an
/// upstream failure.
pub fn chunks<S, E>(byte_stream: S) -> impl Stream<Item = Result<ChatCompletionChunk>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: error::Error + Send + Sync + 'static,
{
    let frames = Box::pin(sse::frames(byte_stream));
    stream::unfold((frames, false), |(mut frames, failed)| async move {
        if failed {
            return None;
        }
        loop {
            let frame = match frames.next().await {
                Some(Ok(frame)) => frame,
                None => {
                    let err = Error::upstream(
                        format!("upstream stream ended before {DONE}"),
                        None,
                        None,
                    );
                    return Some((Err(err), (frames, true)));
                }
                Some(Err(err)) => {
                    let err = Error::upstream(
                        format!("Upstream stream interrupted: {err}"),
                        None,
                        Some(Box::new(err)),
                    );
                    return Some((Err(err), (frames, true)));
                }
            };
            let Some(data) = frame.data.as_deref() else {
                continue;
            };
            if data == DONE {
                return None;
            }
            match serde_json::from_str::<ChatCompletionChunk>(data) {
                Ok(ChatCompletionChunk {
                    error: Some(detail),
                    ..
                }) => {
                    let err = Error::upstream(detail.message, None, None);
                    return Some((Err(err), (frames, true)));
                }
                Ok(chunk) => return Some((Ok(chunk), (frames, false))),
                Err(e) => {
                    let err = Error::upstream(
                        format!("Malformed completion chunk: {e}"),
                        None,
                        Some(Box::new(e)),
                    );
                    return Some((Err(err), (frames, true)));
                }
            }
        }
    })
}
