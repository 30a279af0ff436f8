//! `{{var}}` templates: rendering and variable extraction

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::error::{EmulatorError, EmulatorResult};

/// Extracted template variables
pub type Vars = HashMap<String, String>;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([a-zA-Z0-9_]+)\}\}").expect("placeholder regex is valid"));

/// Separator between literal tokens in strict mode
const STRICT_SPACE: &str = r"\s+";
/// Loose mode tolerates a short run of noise glued to the previous token
const LOOSE_SPACE: &str = r"\S{0,12}\s+";
/// Minimal-width capture used for every placeholder
const CAPTURE: &str = ".+?";

/// Render a template, substituting missing variables with the empty string
pub fn render_template(template: &str, vars: &Vars) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Placeholder names in order of first appearance, duplicates removed
pub fn placeholder_names(pattern: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(pattern) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Placeholder names that appear more than once in a pattern
pub fn duplicate_placeholders(pattern: &str) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut dups = Vec::new();
    for caps in PLACEHOLDER.captures_iter(pattern) {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if seen.contains(&name) {
            if !dups.iter().any(|d: &String| d == name) {
                dups.push(name.to_string());
            }
        } else {
            seen.push(name);
        }
    }
    dups
}

/// Remove placeholders from a pattern, leaving single spaces in their place
pub fn strip_placeholders(pattern: &str) -> String {
    PLACEHOLDER.replace_all(pattern, " ").into_owned()
}

/// Replace each placeholder with a fixed token
pub fn replace_placeholders(pattern: &str, token: &str) -> String {
    PLACEHOLDER.replace_all(pattern, token).into_owned()
}

/// Build the regex body for a template: escaped literals, `space` between
/// literal tokens and a named minimal capture per placeholder.
fn template_body(pattern: &str, space: &str) -> String {
    let mut body = String::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(pattern) {
        let Some(whole) = caps.get(0) else { continue };
        push_literal(&mut body, &pattern[last..whole.start()], space);
        body.push_str(&format!("(?P<{}>{})", &caps[1], CAPTURE));
        last = whole.end();
    }
    push_literal(&mut body, &pattern[last..], space);

    body
}

fn push_literal(body: &mut String, literal: &str, space: &str) {
    let mut in_space = false;
    for ch in literal.chars() {
        if ch.is_whitespace() {
            if !in_space {
                body.push_str(space);
                in_space = true;
            }
        } else {
            in_space = false;
            body.push_str(&regex::escape(ch.encode_utf8(&mut [0u8; 4])));
        }
    }
}

fn build_regex(source: &str, case_insensitive: bool) -> EmulatorResult<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| EmulatorError::Config(format!("invalid template regex `{source}`: {e}")))
}

fn named_captures(regex: &Regex, input: &str, trim: bool) -> Option<Vars> {
    let caps = regex.captures(input)?;
    let vars = regex
        .capture_names()
        .flatten()
        .filter_map(|name| {
            caps.name(name).map(|m| {
                let value = if trim { m.as_str().trim() } else { m.as_str() };
                (name.to_string(), value.to_string())
            })
        })
        .collect();
    Some(vars)
}

/// Strict-then-loose variable extractor for one pattern
#[derive(Debug, Clone)]
pub struct VarExtractor {
    strict: Regex,
    loose: Regex,
}

impl VarExtractor {
    pub fn new(pattern: &str) -> EmulatorResult<Self> {
        let strict = build_regex(&format!("^{}$", template_body(pattern, STRICT_SPACE)), true)?;
        let loose = build_regex(&format!("^{}$", template_body(pattern, LOOSE_SPACE)), true)?;
        Ok(Self { strict, loose })
    }

    /// Extract variables, or `None` when neither form matches.
    ///
    /// The trimmed input is tried first; its normalized form is the
    /// fallback so punctuation in the utterance does not defeat extraction.
    pub fn extract(&self, input: &str) -> Option<Vars> {
        let raw = input.trim();
        let normalized = super::text::norm(input);

        let mut candidates = vec![raw];
        if normalized != raw {
            candidates.push(normalized.as_str());
        }

        candidates.into_iter().find_map(|candidate| {
            named_captures(&self.strict, candidate, false)
                .or_else(|| named_captures(&self.loose, candidate, false))
        })
    }
}

/// Extract variables from `input` according to `pattern`; empty when nothing matches
pub fn extract_vars_loosely(input: &str, pattern: &str) -> Vars {
    VarExtractor::new(pattern)
        .ok()
        .and_then(|extractor| extractor.extract(input))
        .unwrap_or_default()
}

/// Options for [`compile_template_regex`]
#[derive(Debug, Clone, Copy)]
pub struct TemplateOptions {
    /// Any whitespace run between tokens instead of exactly one space
    pub loose_spaces: bool,
    pub case_insensitive: bool,
    /// Trim surrounding whitespace from captured values
    pub trim_vars: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            loose_spaces: true,
            case_insensitive: true,
            trim_vars: true,
        }
    }
}

/// Reusable anchored matcher compiled from a template
#[derive(Debug, Clone)]
pub struct TemplateMatcher {
    regex: Regex,
    trim_vars: bool,
}

impl TemplateMatcher {
    /// Variables captured from a full-input match, `None` if it does not match
    pub fn captures(&self, input: &str) -> Option<Vars> {
        named_captures(&self.regex, input, self.trim_vars)
    }

    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Compile a template into a full-input matcher
pub fn compile_template_regex(pattern: &str, options: TemplateOptions) -> EmulatorResult<TemplateMatcher> {
    let space = if options.loose_spaces { r"\s+" } else { " " };
    let source = format!(r"^\s*{}\s*$", template_body(pattern, space));
    let regex = build_regex(&source, options.case_insensitive)?;

    Ok(TemplateMatcher {
        regex,
        trim_vars: options.trim_vars,
    })
}
