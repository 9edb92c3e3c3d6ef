//! OpenAI-compatible streaming chat client
//!
//! Talks to `{base_url}/chat/completions` with `stream: true` and parses the
//! server-sent events line by line. Groq exposes the same API, so one client
//! serves both providers.
//!
//! When tools are attached and the model finishes a round with tool calls,
//! the calls are executed locally and a follow-up request is streamed, up to
//! `max_tool_iterations` rounds.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{GascError, Result};
use crate::tools::Tool;

use super::{ChatMessage, ChatModel, ChatRole, ChunkStream, Provider, ToolCall};

const DEFAULT_MAX_TOOL_ITERATIONS: usize = 4;

/// Chat-model handle for an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompatModel {
    client: Client,
    provider: Provider,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    tools: Vec<Arc<dyn Tool>>,
    max_tool_iterations: usize,
}

impl OpenAiCompatModel {
    /// Creates a handle for `model` on `provider`'s default endpoint.
    pub fn new(
        client: Client,
        provider: Provider,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            provider,
            base_url: provider.default_base_url().to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: None,
            temperature: None,
            tools: Vec::new(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
        }
    }

    /// Overrides the API base URL (e.g. for a proxy).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tool_iterations(mut self, iterations: usize) -> Self {
        self.max_tool_iterations = iterations;
        self
    }

    /// Attaches tools the model may call.
    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(message_to_wire).collect::<Vec<_>>(),
            "stream": true,
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        if !self.tools.is_empty() {
            body["tools"] = Value::Array(
                self.tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": tool.name(),
                                "description": tool.description(),
                                "parameters": tool.parameters(),
                            }
                        })
                    })
                    .collect(),
            );
        }

        body
    }

    async fn run_tool(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            warn!(tool = %call.name, "Model requested a tool that is not attached");
            return format!("Error: tool '{}' is not available", call.name);
        };

        let args: Value = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => return format!("Error: invalid arguments for {}: {}", call.name, e),
        };

        info!(tool = %call.name, "Executing tool call");
        match tool.execute(args).await {
            Ok(output) => output,
            Err(e) => format!("Error: {}", e),
        }
    }
}

impl ChatModel for OpenAiCompatModel {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    fn generate(&self, messages: Vec<ChatMessage>) -> ChunkStream {
        let this = self.clone();

        Box::pin(async_stream::try_stream! {
            let mut messages = messages;
            let mut round = 0;

            loop {
                let body = this.request_body(&messages);
                debug!(model = %this.model, messages = messages.len(), round, "Sending chat request");

                let response = this
                    .client
                    .post(this.endpoint())
                    .bearer_auth(&this.api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| GascError::Generation(format!("{} request failed: {}", this.provider, e)))?;

                let response = ensure_success(this.provider, response).await?;

                let mut accumulator = StreamAccumulator::default();
                let mut buffer: Vec<u8> = Vec::new();
                let mut bytes = response.bytes_stream();
                let mut done = false;

                'read: while let Some(chunk) = bytes.next().await {
                    let chunk = chunk.map_err(|e| GascError::Generation(format!("stream interrupted: {}", e)))?;
                    buffer.extend_from_slice(&chunk);

                    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buffer.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line);
                        match parse_sse_line(line.trim_end())? {
                            SseLine::Done => {
                                done = true;
                                break 'read;
                            }
                            SseLine::Chunk(chunk) => {
                                if let Some(text) = accumulator.apply(chunk) {
                                    yield text;
                                }
                            }
                            SseLine::Ignore => {}
                        }
                    }
                }

                if !done && accumulator.finish_reason.is_none() {
                    Err::<(), _>(GascError::Generation("stream ended before completion".into()))?;
                }

                let calls = accumulator.tool_calls();
                if calls.is_empty() {
                    break;
                }
                if round >= this.max_tool_iterations {
                    Err::<(), _>(GascError::Generation(format!(
                        "tool call limit of {} rounds exceeded",
                        this.max_tool_iterations
                    )))?;
                }
                round += 1;

                messages.push(ChatMessage::assistant_with_tools(accumulator.text.clone(), calls.clone()));
                for call in &calls {
                    let output = this.run_tool(call).await;
                    messages.push(ChatMessage::tool_result(&call.id, output));
                }
            }
        })
    }
}

fn message_to_wire(message: &ChatMessage) -> Value {
    match message.role {
        ChatRole::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        }),
        ChatRole::Assistant if !message.tool_calls.is_empty() => json!({
            "role": "assistant",
            "content": if message.content.is_empty() { Value::Null } else { json!(message.content) },
            "tool_calls": message
                .tool_calls
                .iter()
                .map(|call| json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": call.arguments },
                }))
                .collect::<Vec<_>>(),
        }),
        role => json!({
            "role": role.as_str(),
            "content": message.content,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: FunctionDelta,
}

#[derive(Debug, Default, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug)]
enum SseLine {
    Chunk(StreamChunk),
    Done,
    Ignore,
}

/// Parses one server-sent-events line.
///
/// Comments, blank lines and non-`data` fields are ignored.
fn parse_sse_line(line: &str) -> Result<SseLine> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Ignore);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(SseLine::Ignore);
    }
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| GascError::Generation(format!("malformed stream event: {}", e)))?;
    if let Some(error) = chunk.error {
        return Err(GascError::Generation(error.message));
    }
    Ok(SseLine::Chunk(chunk))
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Collects text and tool-call fragments across stream events.
#[derive(Debug, Default)]
struct StreamAccumulator {
    text: String,
    calls: Vec<PartialToolCall>,
    finish_reason: Option<String>,
}

impl StreamAccumulator {
    /// Applies one event, returning the new text fragment if any.
    fn apply(&mut self, chunk: StreamChunk) -> Option<String> {
        let mut emitted = String::new();

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                emitted.push_str(&content);
            }
            for delta in choice.delta.tool_calls {
                if self.calls.len() <= delta.index {
                    self.calls.resize_with(delta.index + 1, PartialToolCall::default);
                }
                let call = &mut self.calls[delta.index];
                if let Some(id) = delta.id {
                    call.id = id;
                }
                if let Some(name) = delta.function.name {
                    call.name.push_str(&name);
                }
                if let Some(arguments) = delta.function.arguments {
                    call.arguments.push_str(&arguments);
                }
            }
            if choice.finish_reason.is_some() {
                self.finish_reason = choice.finish_reason;
            }
        }

        if emitted.is_empty() {
            None
        } else {
            self.text.push_str(&emitted);
            Some(emitted)
        }
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.calls
            .iter()
            .filter(|c| !c.name.is_empty())
            .map(|c| ToolCall::new(&c.id, &c.name, &c.arguments))
            .collect()
    }
}

async fn ensure_success(provider: Provider, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    Err(map_http_error(provider, status, &text, retry_after))
}

fn map_http_error(
    provider: Provider,
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> GascError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string());

    match retry_after {
        Some(delay) => GascError::Generation(format!(
            "{} returned {}: {} (retry after {}s)",
            provider,
            status.as_u16(),
            message,
            delay.as_secs()
        )),
        None => GascError::Generation(format!(
            "{} returned {}: {}",
            provider,
            status.as_u16(),
            message
        )),
    }
}
