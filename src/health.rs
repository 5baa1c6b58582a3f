use crate::constants::{COMPILE_BINARY, LINT_BINARY, SIM_BINARY};
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub credentials: String,
    pub toolchain: ToolchainStatus,
}

#[derive(Serialize)]
pub struct ToolchainStatus {
    pub verilator: bool,
    pub iverilog: bool,
    pub vvp: bool,
}

pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "ok" })
}

pub async fn readiness(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let credentials_ok = state.tokens.is_configured();
    if !credentials_ok {
        tracing::error!("Readiness check: credential provider unconfigured");
    }

    let toolchain = ToolchainStatus {
        verilator: crate::toolchain::binary_on_path(LINT_BINARY),
        iverilog: crate::toolchain::binary_on_path(COMPILE_BINARY),
        vvp: crate::toolchain::binary_on_path(SIM_BINARY),
    };
    let toolchain_ok = toolchain.verilator && toolchain.iverilog && toolchain.vvp;
    if !toolchain_ok {
        tracing::warn!(
            "Readiness check: toolchain incomplete (verilator={}, iverilog={}, vvp={})",
            toolchain.verilator,
            toolchain.iverilog,
            toolchain.vvp
        );
    }

    let status_code = if credentials_ok && toolchain_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(ReadinessResponse {
            status: if credentials_ok && toolchain_ok {
                "ready"
            } else {
                "unready"
            }
            .to_string(),
            credentials: if credentials_ok { "ok" } else { "missing" }.to_string(),
            toolchain,
        }),
    )
}
