//! Projection of inbound requests onto the upstream wire format.
//!
//! The upstream endpoint speaks an OpenAI-compatible dialect: a chat body
//! with `messages` or a completion body with a raw `prompt` (FIM-formatted
//! when a suffix is present).

use crate::constants::{
    CHAT_MAX_TOKENS, CHAT_SYSTEM_PROMPT, CHAT_TEMPERATURE, COMPLETION_STOP_SEQUENCES, FIM_MIDDLE,
    FIM_PREFIX, FIM_SUFFIX,
};
use crate::ingress::{ChatRequest, EditorContext, GenerateRequest};
use crate::types::{ChatMessage, Role};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ChatCompletionBody {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct CompletionBody {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub stream: bool,
    pub stop: Vec<String>,
}

/// Prepend the synthesized system message and flatten the editor context
/// into it.
pub fn assemble_chat_messages(req: &ChatRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(req.messages.len() + 1);
    messages.push(ChatMessage::new(
        Role::System,
        build_system_content(req.context.as_ref()),
    ));
    messages.extend(req.messages.iter().cloned());
    messages
}

fn build_system_content(context: Option<&EditorContext>) -> String {
    let mut content = CHAT_SYSTEM_PROMPT.to_string();

    if let Some(ctx) = context {
        content.push_str(&format!(
            "\nContext:\nFile: {}\n",
            ctx.file_path.as_deref().unwrap_or("Unknown")
        ));
        if let Some(line) = ctx.cursor_line {
            content.push_str(&format!("Cursor Line: {}\n", line));
        }
        content.push_str(&format!(
            "\nCurrent Code Content:\n```verilog\n{}\n```\n",
            ctx.code
        ));
        if let Some(selection) = &ctx.selection {
            content.push_str(&format!(
                "\nSelected Code:\n```verilog\n{}\n```\n",
                selection
            ));
        }
    }

    content
}

pub fn chat_body(model: &str, messages: Vec<ChatMessage>, stream: bool) -> ChatCompletionBody {
    ChatCompletionBody {
        model: model.to_string(),
        messages,
        temperature: CHAT_TEMPERATURE,
        max_tokens: CHAT_MAX_TOKENS,
        stream,
    }
}

pub fn completion_body(model: &str, req: &GenerateRequest, stream: bool) -> CompletionBody {
    CompletionBody {
        model: model.to_string(),
        prompt: build_fim_prompt(req.prompt.trim(), req.suffix.trim()),
        max_tokens: req.max_tokens,
        temperature: req.temperature,
        stream,
        stop: COMPLETION_STOP_SEQUENCES
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

/// FIM prompt when a suffix is present, plain prompt otherwise.
pub fn build_fim_prompt(prompt: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        prompt.to_string()
    } else {
        format!("{FIM_PREFIX}{prompt}{FIM_SUFFIX}{suffix}{FIM_MIDDLE}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fim_prompt_with_suffix() {
        assert_eq!(
            build_fim_prompt("module m;", "endmodule"),
            "<fim_prefix>module m;<fim_suffix>endmodule<fim_middle>"
        );
    }

    #[test]
    fn test_plain_prompt_without_suffix() {
        assert_eq!(build_fim_prompt("module m;", ""), "module m;");
    }

    #[test]
    fn test_system_message_prepended() {
        let req = ChatRequest {
            messages: vec![ChatMessage::new(Role::User, "explain this")],
            context: Some(EditorContext {
                code: "module m;\nendmodule".into(),
                file_path: Some("counter.v".into()),
                cursor_line: Some(7),
                selection: Some("endmodule".into()),
                ..Default::default()
            }),
        };
        let messages = assemble_chat_messages(&req);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("File: counter.v"));
        assert!(messages[0].content.contains("Cursor Line: 7"));
        assert!(messages[0].content.contains("```verilog\nmodule m;\nendmodule\n```"));
        assert!(messages[0].content.contains("Selected Code"));
        assert_eq!(messages[1].content, "explain this");
    }

    #[test]
    fn test_system_message_without_context() {
        let req = ChatRequest {
            messages: vec![ChatMessage::new(Role::User, "hi")],
            context: None,
        };
        let messages = assemble_chat_messages(&req);
        assert_eq!(messages[0].content, CHAT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_completion_body_carries_stops() {
        let req = GenerateRequest {
            prompt: " module m; ".into(),
            suffix: String::new(),
            max_tokens: 64,
            temperature: 0.2,
        };
        let body = completion_body("codestral-2501", &req, true);
        assert_eq!(body.prompt, "module m;");
        assert!(body.stop.contains(&"endmodule".to_string()));
        assert!(body.stream);
    }
}
