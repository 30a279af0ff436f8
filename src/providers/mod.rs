//! Provider wire shapes
//!
//! Each provider request type knows how to pull the latest user utterance
//! out of its body and how to encode an engine [`Reply`] into the
//! provider's response shape.

mod gemini;
mod openai;

pub use gemini::*;
pub use openai::*;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::engine::Reply;

/// Endpoint families served by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Endpoint {
    OpenAiChat,
    OpenAiResponses,
    OpenAiEmbeddings,
    GeminiGenerateContent,
}

impl Endpoint {
    /// Provider label used in request contexts, logs and fault conditions
    pub fn provider(&self) -> &'static str {
        match self {
            Self::OpenAiChat => "openai.chat",
            Self::OpenAiResponses => "openai.responses",
            Self::OpenAiEmbeddings => "openai.embeddings",
            Self::GeminiGenerateContent => "gemini.generateContent",
        }
    }

    fn contract_stem(&self) -> &'static str {
        match self {
            Self::OpenAiChat => "openai.chat.completions",
            Self::OpenAiResponses => "openai.responses",
            Self::OpenAiEmbeddings => "openai.embeddings",
            Self::GeminiGenerateContent => "gemini.generateContent",
        }
    }

    pub fn request_contract(&self) -> String {
        format!("{}.request", self.contract_stem())
    }

    pub fn response_contract(&self) -> String {
        format!("{}.response", self.contract_stem())
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAiChat | Self::OpenAiResponses => DEFAULT_MODEL,
            Self::OpenAiEmbeddings => DEFAULT_EMBEDDING_MODEL,
            Self::GeminiGenerateContent => DEFAULT_GEMINI_MODEL,
        }
    }
}

pub const DEFAULT_MODEL: &str = "llm-emulator";
pub const DEFAULT_EMBEDDING_MODEL: &str = "llm-emulator-embed";
pub const DEFAULT_GEMINI_MODEL: &str = "models/gemini-mock";

/// A conversational provider request
pub trait ChatRequest: DeserializeOwned + Send + 'static {
    const ENDPOINT: Endpoint;

    fn model(&self) -> Option<&str>;

    /// Latest user utterance, empty when the body carries none
    fn user_text(&self) -> String;

    fn stream(&self) -> bool {
        false
    }

    /// Raw message history handed to case handlers
    fn messages(&self) -> Option<Value> {
        None
    }

    /// Encode a reply in this provider's response shape
    fn encode(model: &str, reply: &Reply) -> Value;
}

/// Whitespace-separated word count used for mock usage figures
pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Random id with a provider-style prefix
pub fn mock_id(prefix: &str) -> String {
    format!("{prefix}{}", &Uuid::new_v4().simple().to_string()[..24])
}

/// Text of one content part: a bare string or an object's `text` field
pub(crate) fn part_text(part: &Value) -> &str {
    match part {
        Value::String(s) => s,
        other => other.get("text").and_then(Value::as_str).unwrap_or_default(),
    }
}
