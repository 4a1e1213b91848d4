//! HTTP handlers for the relay endpoints.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, header},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
};
use futures::StreamExt;
use serde::Serialize;

use crate::error::Error;
use crate::relay;
use crate::server::AppState;
use crate::sse::Frame;
use crate::types::ChatRequest;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
}

// GET /health
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

fn parse_body(body: Result<Json<ChatRequest>, JsonRejection>) -> Result<ChatRequest, Error> {
    body.map(|Json(request)| request)
        .map_err(|rejection| Error::invalid_request(rejection.body_text()))
}

fn to_event(frame: Frame) -> Event {
    let mut event = Event::default();
    if let Some(name) = frame.event {
        event = event.event(name);
    }
    if let Some(data) = frame.data {
        event = event.data(data);
    }
    event
}

// POST /api/chat/stream
pub async fn chat_stream(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    match relay::open(state.provider.as_ref(), request).await {
        Ok(frames) => {
            let events = frames.map(|frame| Ok::<_, Infallible>(to_event(frame)));
            (
                [(header::CONNECTION, HeaderValue::from_static("keep-alive"))],
                Sse::new(events),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    match relay::complete(state.provider.as_ref(), request).await {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => err.into_response(),
    }
}
