//! Text normalization and similarity metrics used by the matching layer

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// Weight of Jaro-Winkler similarity in the fuzzy blend
const FUZZY_JW_WEIGHT: f64 = 0.6;
/// Weight of token overlap in the fuzzy blend
const FUZZY_OVERLAP_WEIGHT: f64 = 0.4;

/// Winkler prefix scale and cap
const PREFIX_SCALE: f64 = 0.1;
const MAX_PREFIX: usize = 4;

/// Character n-gram sizes for the cheap semantic scorer
const NGRAM_MIN: usize = 3;
const NGRAM_MAX: usize = 5;

/// Anything that is neither a letter, a number nor whitespace
static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("non-word regex is valid"));

/// Normalize text for comparison.
///
/// Lowercases, turns every run of characters outside `\p{L}`, `\p{N}` and
/// whitespace into a space, collapses whitespace runs and trims. Combining
/// marks are not letters and act as separators.
pub fn norm(input: &str) -> String {
    let lowered = input.to_lowercase();
    let spaced = NON_WORD.replace_all(&lowered, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text into non-empty tokens
pub fn tokens(input: &str) -> Vec<String> {
    norm(input).split_whitespace().map(str::to_string).collect()
}

/// Jaro-Winkler similarity in `[0, 1]`, 1 meaning identical.
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    let s1: Vec<char> = a.chars().collect();
    let s2: Vec<char> = b.chars().collect();

    if s1.is_empty() || s2.is_empty() {
        return 0.0;
    }

    let window = (s1.len().max(s2.len()) / 2).saturating_sub(1);

    let mut matched1 = vec![false; s1.len()];
    let mut matched2 = vec![false; s2.len()];
    let mut matches = 0usize;

    for (i, c1) in s1.iter().enumerate() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(s2.len());

        for j in start..end {
            if !matched2[j] && *c1 == s2[j] {
                matched1[i] = true;
                matched2[j] = true;
                matches += 1;
                break;
            }
        }
    }

    if matches == 0 {
        return 0.0;
    }

    let mut transpositions = 0usize;
    let mut k = 0usize;
    for (i, c1) in s1.iter().enumerate() {
        if !matched1[i] {
            continue;
        }
        while !matched2[k] {
            k += 1;
        }
        if *c1 != s2[k] {
            transpositions += 1;
        }
        k += 1;
    }

    let m = matches as f64;
    let jaro = (m / s1.len() as f64 + m / s2.len() as f64 + (m - transpositions as f64 / 2.0) / m) / 3.0;

    let prefix = s1
        .iter()
        .zip(s2.iter())
        .take(MAX_PREFIX)
        .take_while(|(x, y)| x == y)
        .count();

    jaro + prefix as f64 * PREFIX_SCALE * (1.0 - jaro)
}

/// Share of distinct tokens common to both strings, relative to the larger token set
pub fn tok_overlap_score(a: &str, b: &str) -> f64 {
    let set_a: HashSet<String> = tokens(a).into_iter().collect();
    let set_b: HashSet<String> = tokens(b).into_iter().collect();

    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / set_a.len().max(set_b.len()).max(1) as f64
}

/// Exact match after normalization
pub fn matches_exact(input: &str, pattern: &str) -> bool {
    norm(input) == norm(pattern)
}

/// Fuzzy similarity blending Jaro-Winkler and token overlap
pub fn score_fuzzy(input: &str, pattern: &str) -> f64 {
    let input = norm(input);
    let pattern = norm(pattern);

    FUZZY_JW_WEIGHT * jaro_winkler(&input, &pattern)
        + FUZZY_OVERLAP_WEIGHT * tok_overlap_score(&input, &pattern)
}

/// Cosine similarity of character n-gram frequency vectors
pub fn score_ngram_semantic(input: &str, pattern: &str) -> f64 {
    let a = ngram_vector(&norm(input));
    let b = ngram_vector(&norm(pattern));
    sparse_cosine(&a, &b)
}

pub(crate) fn char_ngrams(text: &str) -> Vec<String> {
    let padded: Vec<char> = format!("__{text}__").chars().collect();
    let mut grams = Vec::new();

    for n in NGRAM_MIN..=NGRAM_MAX {
        if padded.len() < n {
            continue;
        }
        for window in padded.windows(n) {
            grams.push(window.iter().collect());
        }
    }

    grams
}

fn ngram_vector(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for gram in char_ngrams(text) {
        *counts.entry(gram).or_insert(0.0) += 1.0;
    }
    counts
}

fn sparse_cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .map(|(key, va)| va * b.get(key).copied().unwrap_or(0.0))
        .sum();
    let norm_a: f64 = a.values().map(|v| v * v).sum();
    let norm_b: f64 = b.values().map(|v| v * v).sum();

    let denom = non_zero(norm_a).sqrt() * non_zero(norm_b).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

fn non_zero(value: f64) -> f64 {
    if value == 0.0 {
        1.0
    } else {
        value
    }
}
