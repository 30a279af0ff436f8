//! Gemini `generateContent` shapes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{part_text, ChatRequest, Endpoint};
use crate::engine::Reply;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub contents: Vec<GeminiContent>,
}

impl ChatRequest for GenerateContentRequest {
    const ENDPOINT: Endpoint = Endpoint::GeminiGenerateContent;

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Parts of the first content joined by spaces
    fn user_text(&self) -> String {
        self.contents
            .first()
            .map(|c| c.parts.iter().map(part_text).collect::<Vec<_>>().join(" "))
            .unwrap_or_default()
    }

    fn messages(&self) -> Option<Value> {
        serde_json::to_value(&self.contents).ok()
    }

    fn encode(model: &str, reply: &Reply) -> Value {
        serde_json::to_value(GenerateContentResponse::new(model, reply.text())).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateContent {
    pub role: String,
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: CandidateContent,
    pub finish_reason: String,
    pub index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: Vec<Candidate>,
    pub model_version: String,
}

impl GenerateContentResponse {
    pub fn new(model: &str, text: &str) -> Self {
        Self {
            candidates: vec![Candidate {
                content: CandidateContent {
                    role: "model".to_string(),
                    parts: vec![TextPart { text: text.to_string() }],
                },
                finish_reason: "STOP".to_string(),
                index: 0,
            }],
            model_version: model.to_string(),
        }
    }
}

/// Split a `{model}:{method}` path segment; only `generateContent` is served
pub fn parse_model_target(target: &str) -> Option<&str> {
    let (model, method) = target.rsplit_once(':')?;
    (method == "generateContent" && !model.is_empty()).then_some(model)
}
