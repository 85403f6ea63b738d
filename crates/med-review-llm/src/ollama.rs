//! Ollama chat client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{ChatMessage, ChatModel, ModelError, ModelResult, Role, ToolCall, ToolSpec};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: Option<f32>,
}

impl OllamaConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: model.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            temperature: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Blocking client for a local Ollama server's `/api/chat`.
pub struct OllamaChatModel {
    config: OllamaConfig,
    client: reqwest::blocking::Client,
}

impl OllamaChatModel {
    pub fn new(config: OllamaConfig) -> ModelResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Request(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn map_send_error(&self, e: reqwest::Error) -> ModelError {
        if e.is_connect() {
            ModelError::Connection(self.config.base_url.clone())
        } else if e.is_timeout() {
            ModelError::Request(format!(
                "request timed out after {}s",
                self.config.timeout.as_secs()
            ))
        } else {
            ModelError::Request(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<WireOptions>,
}

#[derive(Serialize)]
struct WireOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSpec,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: WireMessage,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
            tool_calls: msg
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
            tool_name: msg.tool_name.clone(),
        }
    }
}

impl From<WireMessage> for ChatMessage {
    fn from(msg: WireMessage) -> Self {
        let calls = msg
            .tool_calls
            .into_iter()
            .map(|call| ToolCall {
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();
        let mut out = ChatMessage::assistant(msg.content).with_tool_calls(calls);
        out.role = msg.role;
        out.tool_name = msg.tool_name;
        out
    }
}

impl ChatModel for OllamaChatModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn chat(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> ModelResult<ChatMessage> {
        let url = format!("{}/api/chat", self.config.base_url);
        let body = ChatRequest {
            model: &self.config.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: tools
                .iter()
                .map(|spec| WireTool {
                    kind: "function",
                    function: spec,
                })
                .collect(),
            stream: false,
            options: self.config.temperature.map(|temperature| WireOptions { temperature }),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        tracing::debug!(
            model = %self.config.model,
            tool_calls = parsed.message.tool_calls.len(),
            "Model replied"
        );
        Ok(parsed.message.into())
    }
}
