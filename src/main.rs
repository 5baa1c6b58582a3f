use veristream::auth::TokenProvider;
use veristream::ingress::{
    ChatRequest, GenerateRequest, GenerateResponse, LintRequest, LintResponse, SimulateRequest,
    SimulateResponse, TbRequest,
};
use veristream::logging::request_id_middleware;
use veristream::streaming::{RelayMode, StreamHandler};
use veristream::types::{ChatMessage, OutboundEvent, Role};
use veristream::upstream::{extract_message_content, UpstreamClient};
use veristream::{constants, projection, repair, toolchain, AppState, Args};

use axum::response::sse::KeepAlive;
use axum::{
    extract::State,
    http as ax_http, middleware,
    response::{IntoResponse, Response, Sse},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::Instrument;

// --- STREAM RESPONSE HELPERS ---

fn sse_response<S>(events: S) -> Response
where
    S: futures_util::Stream<Item = OutboundEvent> + Send + 'static,
{
    Sse::new(events.map(|ev| Ok::<_, Infallible>(ev.into_sse())))
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keepalive"),
        )
        .into_response()
}

/// A failure before the relay started still produces a well-formed stream:
/// one error event, then the done sentinel.
fn sse_failure(message: String) -> Response {
    sse_response(futures_util::stream::iter(vec![
        OutboundEvent::Error(message),
        OutboundEvent::Done,
    ]))
}

/// Spawn the relay task for an open upstream session and wire its channel
/// into the SSE response body.
fn relay_response(state: &Arc<AppState>, response: reqwest::Response, mode: RelayMode) -> Response {
    let bytes_stream = response
        .bytes_stream()
        .map(|r| r.map_err(std::io::Error::other));
    let lines = FramedRead::new(
        tokio_util::io::StreamReader::new(bytes_stream),
        LinesCodec::new_with_max_length(1024 * 1024), // 1MB per line
    );

    let (tx, rx) = mpsc::channel(100);
    let idle_timeout = Duration::from_secs(state.args.idle_read_timeout_secs);
    let stream_id = uuid::Uuid::new_v4().to_string();
    let stream_span = tracing::info_span!(
        "stream",
        stream_id = %veristream::str_utils::prefix_chars(&stream_id, 8),
        model = %state.upstream.model()
    );

    tokio::spawn(StreamHandler::relay(lines, mode, tx, idle_timeout).instrument(stream_span));

    sse_response(ReceiverStream::new(rx))
}

// --- HANDLERS ---

async fn chat_stream_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    if let Err(e) = payload.validate() {
        return e.into_response();
    }

    let messages = projection::assemble_chat_messages(&payload);
    tracing::info!("[chat] relaying {} messages upstream", messages.len());

    let body = projection::chat_body(state.upstream.model(), messages, true);
    match state.upstream.open_stream(&body).await {
        Ok(response) => relay_response(&state, response, RelayMode::Chat),
        Err(e) => {
            tracing::error!("[chat] failed to open upstream stream: {}", e.inner);
            sse_failure(e.inner.to_string())
        }
    }
}

async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GenerateRequest>,
) -> Response {
    if let Err(e) = payload.validate() {
        return e.into_response();
    }

    let body = projection::completion_body(state.upstream.model(), &payload, false);
    let upstream_body = match state.upstream.predict(&body).await {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    let raw = match extract_message_content(&upstream_body) {
        Ok(t) => t,
        Err(e) => return e.into_response(),
    };

    // Same repair pipeline as the streaming path, executed once.
    let text = repair::apply(payload.prompt.trim(), &raw);
    Json(GenerateResponse { text }).into_response()
}

async fn generate_stream_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GenerateRequest>,
) -> Response {
    if let Err(e) = payload.validate() {
        return e.into_response();
    }

    let body = projection::completion_body(state.upstream.model(), &payload, true);
    let mode = RelayMode::Completion {
        prefix: payload.prompt.trim().to_string(),
    };
    match state.upstream.open_stream(&body).await {
        Ok(response) => relay_response(&state, response, mode),
        Err(e) => {
            tracing::error!("[generate] failed to open upstream stream: {}", e.inner);
            sse_failure(e.inner.to_string())
        }
    }
}

async fn tb_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TbRequest>,
) -> Response {
    if let Err(e) = payload.validate() {
        return e.into_response();
    }

    let prompt = format!("{}{}", constants::TB_INSTRUCTION, payload.prompt.trim());
    let messages = vec![ChatMessage::new(Role::User, prompt)];
    let body = projection::chat_body(state.upstream.model(), messages, false);

    let upstream_body = match state.upstream.predict(&body).await {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    match extract_message_content(&upstream_body) {
        Ok(text) => Json(GenerateResponse { text }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn lint_handler(Json(payload): Json<LintRequest>) -> Response {
    match toolchain::lint_source(&payload.code).await {
        Ok(diagnostics) => Json(LintResponse { diagnostics }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn simulate_handler(Json(payload): Json<SimulateRequest>) -> Response {
    match toolchain::simulate(&payload.code, &payload.testbench).await {
        Ok(logs) => Json(SimulateResponse { logs }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// VCD files live in per-run scratch directories and are removed with them;
/// nothing is persisted to serve here.
async fn vcd_handler() -> Response {
    (
        ax_http::StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "VCD file not available (local execution)" })),
    )
        .into_response()
}

// --- STARTUP ---

fn build_token_provider(args: &Args) -> Arc<TokenProvider> {
    match TokenProvider::from_env("VERTEX_ACCESS_TOKEN") {
        Ok(provider) => {
            tracing::info!("Using static bearer token from VERTEX_ACCESS_TOKEN");
            Arc::new(provider)
        }
        Err(_) => {
            match TokenProvider::from_command(
                &args.token_command,
                Duration::from_secs(args.token_ttl_secs),
            ) {
                Ok(provider) => {
                    tracing::info!("Using token command: {}", args.token_command);
                    Arc::new(provider)
                }
                Err(e) => {
                    eprintln!("Error: no usable credential source: {}", e);
                    eprintln!(
                        "Set VERTEX_ACCESS_TOKEN or provide --token-command in your environment."
                    );
                    std::process::exit(1);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    use tracing_subscriber::prelude::*;

    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => "veristream=debug".into(),
    };

    let file_appender = tracing_appender::rolling::daily(".", "veristream.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(tracing_error::ErrorLayer::default())
        .init();

    veristream::logging::setup_panic_hook();

    let args = Arc::new(Args::parse());

    let vertex_project = match args
        .vertex_project
        .clone()
        .or_else(|| std::env::var("VERTEX_PROJECT_NUMBER").ok())
    {
        Some(p) if !p.is_empty() => p,
        _ => {
            eprintln!("Error: no Vertex project configured.");
            eprintln!("Pass --vertex-project or set VERTEX_PROJECT_NUMBER.");
            std::process::exit(1);
        }
    };

    let tokens = build_token_provider(&args);

    // No whole-request timeout on the shared client: it would cap stream
    // length. Synchronous calls set their own timeout per request.
    let client = match reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(args.connect_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let upstream = UpstreamClient::new(
        client,
        &args.vertex_location,
        &vertex_project,
        &args.model,
        tokens.clone(),
        Duration::from_secs(args.request_timeout_secs),
    );

    let state = Arc::new(AppState {
        upstream,
        tokens,
        args: args.clone(),
    });

    let app = Router::new()
        .route("/v1/chat/stream", post(chat_stream_handler))
        .route("/v1/generate", post(generate_handler))
        .route("/v1/generate/stream", post(generate_stream_handler))
        .route("/v1/tb", post(tb_handler))
        .route("/v1/lint", post(lint_handler))
        .route("/v1/simulate", post(simulate_handler))
        .route("/v1/simulate/vcd", get(vcd_handler))
        .route("/health", get(veristream::health::liveness))
        .route("/readyz", get(veristream::health::readiness))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(axum::extract::DefaultBodyLimit::max(args.max_body_size))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Veristream listening on {}", addr);
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
