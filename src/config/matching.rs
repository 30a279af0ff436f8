//! Matching pipeline configuration

use serde::{Deserialize, Serialize};

use crate::error::{EmulatorError, EmulatorResult};

/// One named strategy in the matching pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Pattern,
    PatternRegex,
    Fuzzy,
    SemanticNgrams,
    /// Embedding-backed scorer, `semantic-minilm` or `semantic-embedding`
    SemanticEmbedding,
    /// Accepted but never produces a match
    Unknown(String),
}

impl Strategy {
    pub fn parse(name: &str) -> Self {
        match name {
            "pattern" => Self::Pattern,
            "pattern-regex" => Self::PatternRegex,
            "fuzzy" => Self::Fuzzy,
            "semantic-ngrams" => Self::SemanticNgrams,
            "semantic-minilm" | "semantic-embedding" => Self::SemanticEmbedding,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Score threshold for a strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub threshold: f64,
}

/// Which embedder backs the `semantic-embedding` strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Strategy is a no-op unless an embedder is supplied programmatically
    #[default]
    None,
    /// Built-in hashed character n-gram embedder
    Hashing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Strategies in evaluation order; the first one to choose a case wins
    pub order: Vec<String>,
    pub fuzzy: ThresholdConfig,
    pub ngrams: ThresholdConfig,
    #[serde(alias = "minilm")]
    pub embedding: ThresholdConfig,
    pub embedder: EmbedderKind,
    /// Dimension of the built-in hashing embedder
    pub embedding_dim: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            order: vec![
                "pattern-regex".to_string(),
                "semantic-minilm".to_string(),
                "pattern".to_string(),
                "fuzzy".to_string(),
                "semantic-ngrams".to_string(),
            ],
            fuzzy: ThresholdConfig { threshold: 0.4 },
            ngrams: ThresholdConfig { threshold: 0.3 },
            embedding: ThresholdConfig { threshold: 0.72 },
            embedder: EmbedderKind::None,
            embedding_dim: 384,
        }
    }
}

impl MatchingConfig {
    pub fn strategies(&self) -> Vec<Strategy> {
        self.order.iter().map(|name| Strategy::parse(name)).collect()
    }

    pub fn validate(&self) -> EmulatorResult<()> {
        let thresholds = [
            ("matching.fuzzy.threshold", self.fuzzy.threshold),
            ("matching.ngrams.threshold", self.ngrams.threshold),
            ("matching.embedding.threshold", self.embedding.threshold),
        ];
        for (param, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(EmulatorError::Validation {
                    message: format!("threshold must be between 0.0 and 1.0, got {value}"),
                    param: Some(param.to_string()),
                });
            }
        }

        if self.embedder == EmbedderKind::Hashing && self.embedding_dim == 0 {
            return Err(EmulatorError::Validation {
                message: "embedding_dim must be greater than 0".to_string(),
                param: Some("matching.embedding_dim".to_string()),
            });
        }

        for strategy in self.strategies() {
            if let Strategy::Unknown(name) = strategy {
                tracing::warn!(strategy = %name, "unknown matching strategy is ignored");
            }
        }

        Ok(())
    }
}
