//! # LLM Emulator
//!
//! A deterministic stand-in for LLM provider APIs, meant for tests and
//! local development.
//!
//! Incoming chat requests are answered by, in order:
//!
//! - the active **scenario**, a scripted linear or graph conversation
//! - a **case** whose pattern matches the latest user utterance, tried with
//!   regex, exact, fuzzy and semantic strategies
//! - a configured fallback text
//!
//! Latency and faults (HTTP errors, hangs, malformed JSON, broken streams)
//! are injected per case. Requests and responses can be checked against
//! JSON schemas and recorded to cassettes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_emulator::config::{CaseConfig, EmulatorConfig};
//! use llm_emulator::handlers::{CaseHandler, HandlerRegistry};
//! use llm_emulator::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = EmulatorConfig::default();
//!     config.cases.push(CaseConfig::handler("what is the capital of {{state}}", "capital"));
//!
//!     let mut registry = HandlerRegistry::with_builtins();
//!     registry.register_case(
//!         "capital",
//!         CaseHandler::single_fn(|state, _| Some(format!("The capital of {state} is Mockville."))),
//!     );
//!     run_server(config, registry).await
//! }
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod contracts;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod latency;
pub mod matching;
pub mod providers;
pub mod routing;
pub mod scenario;
pub mod server;
pub mod telemetry;
pub mod vcr;

pub use config::EmulatorConfig;
pub use engine::EmulatorEngine;
pub use error::{EmulatorError, EmulatorResult};
pub use handlers::HandlerRegistry;
pub use server::run_server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default server port
pub const DEFAULT_PORT: u16 = 11434;
