use biometrics::{Collector, Counter, Moments};

pub(crate) static RELAY_REQUESTS: Counter = Counter::new("messagegpt.relay.requests");
pub(crate) static RELAY_INVALID_REQUESTS: Counter =
    Counter::new("messagegpt.relay.invalid_requests");
pub(crate) static RELAY_REJECTED: Counter = Counter::new("messagegpt.relay.rejected");
pub(crate) static RELAY_FRAMES: Counter = Counter::new("messagegpt.relay.frames");
pub(crate) static RELAY_UPSTREAM_ERRORS: Counter =
    Counter::new("messagegpt.relay.upstream_errors");
pub(crate) static RELAY_STREAM_DURATION: Moments =
    Moments::new("messagegpt.relay.stream_duration_seconds");

pub(crate) static UPSTREAM_REQUESTS: Counter = Counter::new("messagegpt.upstream.requests");
pub(crate) static UPSTREAM_REQUEST_ERRORS: Counter =
    Counter::new("messagegpt.upstream.request_errors");
pub(crate) static UPSTREAM_TTFB: Moments = Moments::new("messagegpt.upstream.ttfb_seconds");

pub(crate) static SSE_FRAMES: Counter = Counter::new("messagegpt.sse.frames");
pub(crate) static DECODER_DELTAS: Counter = Counter::new("messagegpt.decoder.deltas");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&RELAY_REQUESTS);
    collector.register_counter(&RELAY_INVALID_REQUESTS);
    collector.register_counter(&RELAY_REJECTED);
    collector.register_counter(&RELAY_FRAMES);
    collector.register_counter(&RELAY_UPSTREAM_ERRORS);
    collector.register_moments(&RELAY_STREAM_DURATION);

    collector.register_counter(&UPSTREAM_REQUESTS);
    collector.register_counter(&UPSTREAM_REQUEST_ERRORS);
    collector.register_moments(&UPSTREAM_TTFB);

    collector.register_counter(&SSE_FRAMES);
    collector.register_counter(&DECODER_DELTAS);
}
