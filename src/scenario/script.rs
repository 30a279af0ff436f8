//! Compiled scenario scripts

use std::collections::HashMap;

use serde::Serialize;

use crate::config::{BranchConfig, ScenarioConfig, StepConfig};
use crate::error::EmulatorResult;
use crate::handlers::HandlerRegistry;
use crate::matching::template::VarExtractor;

/// Branch with its `when` template compiled
#[derive(Debug, Clone)]
pub struct GraphBranch {
    pub config: BranchConfig,
    pub extractor: VarExtractor,
}

#[derive(Debug, Clone, Default)]
pub struct GraphState {
    pub branches: Vec<GraphBranch>,
    pub terminal: bool,
}

impl GraphState {
    /// Terminal state with nothing left to match
    pub fn is_dead_end(&self) -> bool {
        self.terminal && self.branches.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Script {
    Linear(Vec<StepConfig>),
    Graph {
        start: String,
        states: HashMap<String, GraphState>,
    },
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: String,
    pub script: Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Linear,
    Graph,
}

impl Scenario {
    /// Compile a validated scenario, resolving guard and reply ids against the registry
    pub fn compile(config: &ScenarioConfig, registry: &HandlerRegistry) -> EmulatorResult<Self> {
        let Some(start) = &config.start else {
            return Ok(Self {
                id: config.id.clone(),
                script: Script::Linear(config.steps.clone()),
            });
        };

        let mut states = HashMap::with_capacity(config.states.len());
        for (state_id, state) in &config.states {
            let mut branches = Vec::with_capacity(state.branches.len());
            for branch in &state.branches {
                if let Some(guard) = &branch.guard {
                    registry.guard(guard)?;
                }
                if let Some(crate::config::ReplyConfig::Handler { handler }) = &branch.reply {
                    registry.reply(handler)?;
                }
                branches.push(GraphBranch {
                    extractor: VarExtractor::new(&branch.when)?,
                    config: branch.clone(),
                });
            }
            states.insert(
                state_id.clone(),
                GraphState {
                    branches,
                    terminal: state.terminal,
                },
            );
        }

        Ok(Self {
            id: config.id.clone(),
            script: Script::Graph {
                start: start.clone(),
                states,
            },
        })
    }

    pub fn kind(&self) -> ScriptKind {
        match self.script {
            Script::Linear(_) => ScriptKind::Linear,
            Script::Graph { .. } => ScriptKind::Graph,
        }
    }

    /// Steps of a linear script or states of a graph
    pub fn size(&self) -> usize {
        match &self.script {
            Script::Linear(steps) => steps.len(),
            Script::Graph { states, .. } => states.len(),
        }
    }
}
