//! Integration test module
//!
//! End-to-end tests against a live server bound to an ephemeral port.

pub mod common;
pub mod admin_tests;
pub mod fault_tests;
pub mod gemini_tests;
pub mod http_mock_tests;
pub mod openai_tests;
pub mod scenario_tests;
