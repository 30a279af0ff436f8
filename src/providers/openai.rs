//! OpenAI chat completions, responses and embeddings shapes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{mock_id, part_text, word_count, ChatRequest, Endpoint};
use crate::config::ToolCall;
use crate::engine::Reply;

/// Dimension of `/v1/embeddings` vectors
pub const EMBEDDING_DIM: usize = 1536;
/// Embedding seed when the configuration sets none
pub const DEFAULT_EMBEDDING_SEED: u64 = 42;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// A string or an array of content parts
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest for ChatCompletionRequest {
    const ENDPOINT: Endpoint = Endpoint::OpenAiChat;

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn user_text(&self) -> String {
        let Some(last) = self.messages.iter().rev().find(|m| m.role == "user") else {
            return String::new();
        };
        match &last.content {
            Value::String(s) => s.clone(),
            Value::Array(parts) => parts.iter().map(part_text).collect::<Vec<_>>().join(" "),
            _ => String::new(),
        }
    }

    fn stream(&self) -> bool {
        self.stream
    }

    fn messages(&self) -> Option<Value> {
        serde_json::to_value(&self.messages).ok()
    }

    fn encode(model: &str, reply: &Reply) -> Value {
        serde_json::to_value(ChatCompletion::new(model, reply)).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl ChatUsage {
    fn for_text(text: &str) -> Self {
        let words = word_count(text);
        Self {
            prompt_tokens: 0,
            completion_tokens: words,
            total_tokens: words,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl From<&ToolCall> for ToolCallPayload {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: mock_id("call_mock_"),
            kind: "function".to_string(),
            function: FunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallPayload>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: String,
}

/// `chat.completion` object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: ChatUsage,
}

impl ChatCompletion {
    pub fn new(model: &str, reply: &Reply) -> Self {
        let text = reply.text();
        let tool_calls = match reply {
            Reply::Tool { call: Some(call), .. } => Some(vec![ToolCallPayload::from(call)]),
            _ => None,
        };
        let finish_reason = if tool_calls.is_some() { "tool_calls" } else { "stop" };

        Self {
            id: mock_id("chatcmpl_mock_"),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: AssistantMessage {
                    role: "assistant".to_string(),
                    content: text.to_string(),
                    tool_calls,
                },
                finish_reason: finish_reason.to_string(),
            }],
            usage: ChatUsage::for_text(text),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

/// `chat.completion.chunk` object sent over SSE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    fn new(id: &str, model: &str, delta: ChunkDelta, finish_reason: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }

    pub fn role(id: &str, model: &str) -> Self {
        Self::new(
            id,
            model,
            ChunkDelta {
                role: Some("assistant".to_string()),
                content: None,
            },
            None,
        )
    }

    pub fn content(id: &str, model: &str, content: &str) -> Self {
        Self::new(
            id,
            model,
            ChunkDelta {
                role: None,
                content: Some(content.to_string()),
            },
            None,
        )
    }

    pub fn finish(id: &str, model: &str) -> Self {
        Self::new(id, model, ChunkDelta::default(), Some("stop"))
    }
}

/// Split reply text into stream pieces, each word keeping its trailing whitespace
pub fn stream_pieces(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_space = false;

    for ch in text.chars() {
        if in_space && !ch.is_whitespace() {
            pieces.push(std::mem::take(&mut current));
        }
        in_space = ch.is_whitespace();
        current.push(ch);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Request to the responses endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsesRequest {
    #[serde(default)]
    pub model: Option<String>,
    /// A string or an array of strings / `{text}` items
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub messages: Option<Value>,
}

impl ChatRequest for ResponsesRequest {
    const ENDPOINT: Endpoint = Endpoint::OpenAiResponses;

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn user_text(&self) -> String {
        match &self.input {
            Value::String(s) => s.clone(),
            Value::Array(items) => items.iter().map(part_text).collect::<Vec<_>>().join(" "),
            _ => String::new(),
        }
    }

    fn messages(&self) -> Option<Value> {
        self.messages.clone()
    }

    fn encode(model: &str, reply: &Reply) -> Value {
        serde_json::to_value(ResponseObject::new(model, reply.text())).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputText {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<OutputText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// `response` object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseObject {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub output: Vec<OutputMessage>,
    pub usage: ResponseUsage,
}

impl ResponseObject {
    pub fn new(model: &str, text: &str) -> Self {
        let words = word_count(text);
        Self {
            id: mock_id("resp_mock_"),
            object: "response".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            output: vec![OutputMessage {
                id: mock_id("msg_mock_"),
                kind: "message".to_string(),
                role: "assistant".to_string(),
                content: vec![OutputText {
                    kind: "output_text".to_string(),
                    text: text.to_string(),
                }],
            }],
            usage: ResponseUsage {
                input_tokens: 0,
                output_tokens: words,
                total_tokens: words,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingsRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub input: Value,
}

impl EmbeddingsRequest {
    /// Inputs as strings; a scalar input is a batch of one
    pub fn inputs(&self) -> Vec<String> {
        match &self.input {
            Value::Array(items) => items.iter().map(input_string).collect(),
            other => vec![input_string(other)],
        }
    }
}

fn input_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingData {
    pub object: String,
    pub index: usize,
    pub embedding: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingList {
    pub object: String,
    pub model: String,
    pub data: Vec<EmbeddingData>,
}

impl EmbeddingList {
    pub fn new(model: &str, vectors: Vec<Vec<f64>>) -> Self {
        Self {
            object: "list".to_string(),
            model: model.to_string(),
            data: vectors
                .into_iter()
                .enumerate()
                .map(|(index, embedding)| EmbeddingData {
                    object: "embedding".to_string(),
                    index,
                    embedding,
                })
                .collect(),
        }
    }
}

/// Seeded unit vector derived from the text.
///
/// The state starts as the low 32 bits of `seed` xor a djb2-style fold of
/// the text (`s * 33 + unit`, first UTF-16 unit of each char) and advances
/// with the LCG `a * 1664525 + 1013904223`, all modulo 2^32.
pub fn deterministic_embedding(text: &str, seed: u64, dim: usize) -> Vec<f64> {
    let mut buf = [0u16; 2];
    let fold = text.chars().fold(5381u32, |s, ch| {
        let unit = ch.encode_utf16(&mut buf)[0];
        s.wrapping_mul(33).wrapping_add(u32::from(unit))
    });
    let mut state = (seed as u32) ^ fold;

    let mut v: Vec<f64> = (0..dim)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (f64::from(state) / f64::from(u32::MAX)) * 2.0 - 1.0
        })
        .collect();

    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm = if norm == 0.0 { 1.0 } else { norm };
    v.iter_mut().for_each(|x| *x /= norm);
    v
}
