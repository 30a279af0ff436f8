//! Text matching: similarity metrics, `{{var}}` templates and the strategy pipeline

pub mod engine;
pub mod semantic;
pub mod template;
pub mod text;

pub use engine::{CompiledPattern, MatchEngine, MatchMode, MatchResult};
pub use semantic::{Embedder, EmbeddingIndex, HashingEmbedder};
pub use template::{compile_template_regex, extract_vars_loosely, render_template, TemplateOptions, Vars};
