use axum::{
    body::Body,
    http::{Request, Response, header::CONTENT_TYPE},
};
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, ServerErrorsFailureClass, SharedClassifier};
use tower_http::trace::{DefaultOnBodyChunk, DefaultOnEos, MakeSpan, TraceLayer};
use tracing::{Span, debug, info, warn};

use crate::middleware::request_context::RequestContext;

type ChatTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    ChatSpan,
    fn(&Request<Body>, &Span),
    fn(&Response<Body>, Duration, &Span),
    DefaultOnBodyChunk,
    DefaultOnEos,
    fn(ServerErrorsFailureClass, Duration, &Span),
>;

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ChatSpan;

impl<B> MakeSpan<B> for ChatSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .extensions()
            .get::<RequestContext>()
            .map_or_else(|| "n/a".to_string(), |ctx| ctx.request_id.clone());

        // Path only: in development the query string may carry the caller id.
        tracing::info_span!(
            "huddle_request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id,
            user_id = tracing::field::Empty,
            status = tracing::field::Empty,
        )
    }
}

fn on_request(request: &Request<Body>, _span: &Span) {
    debug!(version = ?request.version(), "request started");
}

fn on_response(response: &Response<Body>, latency: Duration, span: &Span) {
    let status = response.status().as_u16();
    span.record("status", status);
    let streaming = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"));
    if streaming {
        info!(status, "event stream opened");
    } else {
        info!(status, latency_ms = latency.as_millis(), "request finished");
    }
}

fn on_failure(error: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
    warn!(%error, latency_ms = latency.as_millis(), "request failed");
}

/// Request spans carry the request id and, for API routes, the calling user.
pub fn create_trace_layer() -> ChatTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(ChatSpan)
        .on_request(on_request as fn(&Request<Body>, &Span))
        .on_response(on_response as fn(&Response<Body>, Duration, &Span))
        .on_failure(on_failure as fn(ServerErrorsFailureClass, Duration, &Span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn span_uses_request_id_and_hides_query() {
        let mut request = Request::builder()
            .uri("/api/stream?user_id=00000000-0000-0000-0000-000000000001")
            .body(())
            .unwrap();
        request.extensions_mut().insert(RequestContext {
            request_id: "req-7".into(),
            user_id: None,
        });
        let subscriber = tracing_subscriber::fmt().with_max_level(Level::INFO).finish();
        tracing::subscriber::with_default(subscriber, || {
            let span = ChatSpan.make_span(&request);
            assert!(!span.is_disabled());
            assert_eq!(span.metadata().map(|meta| meta.name()), Some("huddle_request"));
            assert!(span.has_field("user_id"));
            assert!(span.has_field("status"));
            assert!(!span.has_field("uri"));
        });
    }
}
