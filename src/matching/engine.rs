//! Ordered multi-strategy matching of utterances to cases

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::semantic::{cosine, placeholderize, Embedder, EmbeddingIndex};
use super::template::{
    compile_template_regex, placeholder_names, strip_placeholders, TemplateMatcher, TemplateOptions,
    VarExtractor, Vars,
};
use super::text;
use crate::config::{MatchingConfig, Strategy};
use crate::error::EmulatorResult;

/// Fixed score of an exact match
pub const PATTERN_SCORE: f64 = 1.0;
/// Fixed score of a template regex match
pub const PATTERN_REGEX_SCORE: f64 = 0.9;

/// Static pattern words shorter than this are not used by the prefilter
const MIN_STATIC_TOKEN_CHARS: usize = 3;

/// Strategy that produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    Pattern,
    PatternRegex,
    Fuzzy,
    SemanticNgrams,
    SemanticEmbedding,
    None,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::PatternRegex => "pattern-regex",
            Self::Fuzzy => "fuzzy",
            Self::SemanticNgrams => "semantic-ngrams",
            Self::SemanticEmbedding => "semantic-embedding",
            Self::None => "none",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of routing one utterance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Index of the chosen case in configured order
    pub chosen: Option<usize>,
    pub mode: MatchMode,
    pub score: f64,
    pub vars: Vars,
    pub pattern: Option<String>,
}

impl MatchResult {
    pub fn none() -> Self {
        Self {
            chosen: None,
            mode: MatchMode::None,
            score: 0.0,
            vars: Vars::new(),
            pattern: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.chosen.is_some()
    }
}

/// A case pattern with everything the strategies need precomputed
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pattern: String,
    placeholders: Vec<String>,
    static_tokens: Vec<String>,
    extractor: VarExtractor,
    matcher: TemplateMatcher,
}

impl CompiledPattern {
    pub fn new(pattern: &str) -> EmulatorResult<Self> {
        let static_tokens = text::tokens(&strip_placeholders(pattern))
            .into_iter()
            .filter(|word| word.chars().count() >= MIN_STATIC_TOKEN_CHARS)
            .collect();

        Ok(Self {
            pattern: pattern.to_string(),
            placeholders: placeholder_names(pattern),
            static_tokens,
            extractor: VarExtractor::new(pattern)?,
            matcher: compile_template_regex(pattern, TemplateOptions::default())?,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Distinct placeholder names in order of appearance
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Every static word of the pattern appears as a whole word in the input
    fn contains_all_words(&self, haystack: &str) -> bool {
        self.static_tokens
            .iter()
            .all(|word| haystack.contains(&format!(" {word} ")))
    }

    fn extract(&self, input: &str) -> Vars {
        self.extractor.extract(input).unwrap_or_default()
    }
}

/// Runs the configured strategies over the compiled case patterns
pub struct MatchEngine {
    patterns: Vec<CompiledPattern>,
    strategies: Vec<Strategy>,
    fuzzy_threshold: f64,
    ngram_threshold: f64,
    embedding_threshold: f64,
    embedder: Option<EmbeddingIndex>,
}

impl MatchEngine {
    pub fn new<I, S>(patterns: I, config: &MatchingConfig) -> EmulatorResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| CompiledPattern::new(p.as_ref()))
            .collect::<EmulatorResult<Vec<_>>>()?;

        Ok(Self {
            patterns,
            strategies: config.strategies(),
            fuzzy_threshold: config.fuzzy.threshold,
            ngram_threshold: config.ngrams.threshold,
            embedding_threshold: config.embedding.threshold,
            embedder: None,
        })
    }

    /// Enable the embedding strategy
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        let patterns = self.patterns.iter().map(|p| placeholderize(&p.pattern)).collect();
        self.embedder = Some(EmbeddingIndex::new(embedder, patterns));
        self
    }

    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Route an utterance to a case; the first strategy that chooses one wins
    pub async fn route_to_case(&self, input: &str) -> MatchResult {
        if input.is_empty() || self.patterns.is_empty() {
            return MatchResult::none();
        }

        let haystack = format!(" {} ", text::norm(input));

        for strategy in &self.strategies {
            let found = match strategy {
                Strategy::Pattern => self.match_exact(input),
                Strategy::PatternRegex => self.match_regex(input),
                Strategy::Fuzzy => self.best_scoring(input, &haystack, MatchMode::Fuzzy, self.fuzzy_threshold, |a, b| {
                    text::score_fuzzy(a, b)
                }),
                Strategy::SemanticNgrams => self.best_scoring(
                    input,
                    &haystack,
                    MatchMode::SemanticNgrams,
                    self.ngram_threshold,
                    |a, b| text::score_ngram_semantic(a, b),
                ),
                Strategy::SemanticEmbedding => self.match_embedding(input, &haystack).await,
                Strategy::Unknown(_) => None,
            };

            if let Some(result) = found {
                return result;
            }
        }

        MatchResult::none()
    }

    fn found(&self, index: usize, mode: MatchMode, score: f64, vars: Vars) -> MatchResult {
        MatchResult {
            chosen: Some(index),
            mode,
            score,
            vars,
            pattern: Some(self.patterns[index].pattern.clone()),
        }
    }

    fn match_exact(&self, input: &str) -> Option<MatchResult> {
        self.patterns
            .iter()
            .position(|p| text::matches_exact(input, &p.pattern))
            .map(|i| self.found(i, MatchMode::Pattern, PATTERN_SCORE, self.patterns[i].extract(input)))
    }

    fn match_regex(&self, input: &str) -> Option<MatchResult> {
        self.patterns.iter().enumerate().find_map(|(i, p)| {
            p.matcher
                .captures(input)
                .map(|vars| self.found(i, MatchMode::PatternRegex, PATTERN_REGEX_SCORE, vars))
        })
    }

    /// Strictly highest score at or above the threshold; ties keep the earliest case
    fn best_scoring<F>(&self, input: &str, haystack: &str, mode: MatchMode, threshold: f64, score: F) -> Option<MatchResult>
    where
        F: Fn(&str, &str) -> f64,
    {
        let mut best: Option<(usize, f64)> = None;

        for (i, p) in self.patterns.iter().enumerate() {
            if !p.contains_all_words(haystack) {
                continue;
            }
            let s = score(input, &p.pattern);
            let best_score = best.map_or(0.0, |(_, b)| b);
            if s > best_score && s >= threshold {
                best = Some((i, s));
            }
        }

        best.map(|(i, s)| self.found(i, mode, s, self.patterns[i].extract(input)))
    }

    async fn match_embedding(&self, input: &str, haystack: &str) -> Option<MatchResult> {
        let embedder = self.embedder.as_ref()?;

        let query = match embedder.embed_query(&text::norm(input)).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, embedder = embedder.name(), "embedding failed, skipping strategy");
                return None;
            }
        };
        let candidates = embedder.pattern_vectors().await;

        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.patterns.iter().enumerate() {
            if !p.contains_all_words(haystack) {
                continue;
            }
            let Some(candidate) = candidates.get(i).and_then(Option::as_ref) else {
                continue;
            };
            let s = cosine(&query, candidate);
            let best_score = best.map_or(0.0, |(_, b)| b);
            if s > best_score && s >= self.embedding_threshold {
                best = Some((i, s));
            }
        }

        best.map(|(i, s)| self.found(i, MatchMode::SemanticEmbedding, s, self.patterns[i].extract(input)))
    }
}

impl fmt::Debug for MatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchEngine")
            .field("patterns", &self.patterns.len())
            .field("strategies", &self.strategies)
            .field("embedder", &self.embedder.as_ref().map(|e| e.name()))
            .finish()
    }
}
