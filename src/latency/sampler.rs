//! Uniform random sources

use parking_lot::Mutex;
use rand::prelude::*;

/// Source of uniform draws in `[0, 1)`
pub trait UniformSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// `StdRng`-backed source, reproducible when seeded
pub struct SeededSource {
    rng: Mutex<StdRng>,
}

impl SeededSource {
    /// Create a source with random seed
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a source with a fixed seed for reproducibility
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }
}

impl Default for SeededSource {
    fn default() -> Self {
        Self::new()
    }
}

impl UniformSource for SeededSource {
    fn next_unit(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }
}

/// Always returns the same value
#[derive(Debug, Clone, Copy)]
pub struct ConstantSource(pub f64);

impl UniformSource for ConstantSource {
    fn next_unit(&self) -> f64 {
        self.0
    }
}

/// Replays a fixed sequence of draws, cycling at the end
pub struct SequenceSource {
    values: Vec<f64>,
    cursor: Mutex<usize>,
}

impl SequenceSource {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            cursor: Mutex::new(0),
        }
    }
}

impl UniformSource for SequenceSource {
    fn next_unit(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mut cursor = self.cursor.lock();
        let value = self.values[*cursor % self.values.len()];
        *cursor += 1;
        value
    }
}
