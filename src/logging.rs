use axum::{
    body::Body,
    http::{Request, Response},
    middleware::Next,
};
use std::panic;
use tracing::{error, info};
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-veristream-request-id";

/// Sets up a global panic hook that logs panics through tracing.
pub fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();

        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            *s
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.as_str()
        } else {
            "Unknown panic payload"
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            target: "panic",
            message = %message,
            location = %location,
            backtrace = %backtrace,
            "FATAL: Application panicked"
        );

        original_hook(panic_info);
    }));
}

/// Tags every request with a generated id and wraps it in a span so stream
/// logs can be correlated with the request that opened them.
pub async fn request_id_middleware(mut req: Request<Body>, next: Next) -> Response<Body> {
    let request_id = Uuid::new_v4().to_string();
    if let Ok(val) = request_id.parse() {
        req.headers_mut().insert(REQUEST_ID_HEADER, val);
    }

    let span = info_span!("request", request_id = %request_id);
    next.run(req).instrument(span).await
}

/// Per-session stream counters, logged once when the relay finishes.
#[derive(Default)]
pub struct StreamMetric {
    pub fragments: usize,
    pub empty_ticks: usize,
    pub skipped_lines: usize,
    pub text_chars: usize,
}

impl StreamMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fragment(&mut self, fragment: &str) {
        if fragment.is_empty() {
            self.empty_ticks += 1;
        } else {
            self.fragments += 1;
            self.text_chars += fragment.len();
        }
    }

    pub fn record_skip(&mut self) {
        self.skipped_lines += 1;
    }

    pub fn log_summary(&self) {
        info!(
            target: "stream",
            "[STREAM END] Fragments: {} | Text: {} chars | Empty ticks: {} | Skipped lines: {}",
            self.fragments, self.text_chars, self.empty_ticks, self.skipped_lines
        );
    }
}
