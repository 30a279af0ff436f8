//! Scripted scenario definitions

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EmulatorError, EmulatorResult};
use crate::matching::template;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    #[default]
    Chat,
    Tools,
    Wait,
}

/// Tool invocation announced by a `tools` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// HTTP error returned instead of a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    pub code: u16,
    #[serde(default)]
    pub body: serde_json::Value,
}

/// One step of a linear scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub kind: StepKind,
    /// Informational: the utterance this step expects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    #[serde(alias = "delayMs", alias = "ms", skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

/// Reply of a graph branch: a template, or a registered reply function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyConfig {
    Text(String),
    Handler { handler: String },
}

/// One guarded transition out of a graph state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchConfig {
    /// Template the utterance must satisfy
    pub when: String,
    /// Registered guard id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    /// Declarative guard: extracted variables that must equal these values
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub vars: HashMap<String, String>,
    pub kind: StepKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(alias = "delayMs", skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub branches: Vec<BranchConfig>,
    #[serde(rename = "final")]
    pub terminal: bool,
}

/// A scenario is linear when it has `steps`, a graph when it has `start` and `states`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub states: HashMap<String, StateConfig>,
}

impl ScenarioConfig {
    pub fn is_graph(&self) -> bool {
        self.start.is_some()
    }

    pub fn validate(&self, index: usize) -> EmulatorResult<()> {
        let param = format!("scenarios[{index}]");
        let invalid = |message: String, at: String| EmulatorError::Validation {
            message,
            param: Some(at),
        };

        if self.id.is_empty() {
            return Err(invalid("scenario id cannot be empty".into(), format!("{param}.id")));
        }

        let Some(start) = &self.start else {
            if !self.states.is_empty() {
                return Err(invalid(
                    format!("scenario '{}' has states but no start state", self.id),
                    format!("{param}.start"),
                ));
            }
            return Ok(());
        };

        if !self.steps.is_empty() {
            return Err(invalid(
                format!("scenario '{}' cannot have both steps and states", self.id),
                param,
            ));
        }
        if !self.states.contains_key(start) {
            return Err(invalid(
                format!("start state '{start}' is not defined"),
                format!("{param}.start"),
            ));
        }

        for (state_id, state) in &self.states {
            for (i, branch) in state.branches.iter().enumerate() {
                let at = format!("{param}.states.{state_id}.branches[{i}]");
                if let Some(next) = &branch.next {
                    if !self.states.contains_key(next) {
                        return Err(invalid(format!("next state '{next}' is not defined"), at));
                    }
                }
                let dups = template::duplicate_placeholders(&branch.when);
                if !dups.is_empty() {
                    return Err(invalid(
                        format!("placeholder names must be unique, repeated: {}", dups.join(", ")),
                        at,
                    ));
                }
            }
        }

        Ok(())
    }
}
