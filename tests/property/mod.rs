//! Property-based tests using proptest
//!
//! Invariants of the text metrics, templates, latency sampling and fault
//! selection.

pub mod fault_tests;
pub mod latency_tests;
pub mod template_tests;
pub mod text_tests;
