//! Inbound request and response bodies for the editor-facing routes.

use crate::types::{ChatMessage, Result, VeristreamError};
use serde::{Deserialize, Serialize};

/// Editor state the frontend attaches to a chat request.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EditorContext {
    #[serde(default)]
    pub code: String,
    pub file_path: Option<String>,
    #[serde(default = "default_language")]
    pub language: Option<String>,
    pub selection: Option<String>,
    pub cursor_line: Option<u32>,
    #[serde(default)]
    pub agentic: bool,
}

fn default_language() -> Option<String> {
    Some("verilog".to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub context: Option<EditorContext>,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(VeristreamError::InvalidIngress(
                "Request must contain at least one message".into(),
            )
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_max_tokens() -> u32 {
    150
}

fn default_temperature() -> f64 {
    0.4
}

impl GenerateRequest {
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(
                VeristreamError::InvalidIngress("Prompt must not be empty.".into()).into(),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TbRequest {
    pub prompt: String,
}

impl TbRequest {
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(
                VeristreamError::InvalidIngress("Prompt must not be empty.".into()).into(),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LintRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct LintResponse {
    pub diagnostics: Vec<crate::toolchain::Diagnostic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulateRequest {
    pub code: String,
    pub testbench: String,
}

#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub logs: String,
}
