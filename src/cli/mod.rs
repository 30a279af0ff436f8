//! Command-line interface
//!
//! Subcommands for running the emulator, trying the matcher against a
//! config offline, inspecting scenarios and configuration, and probing a
//! running instance.

mod commands;

pub use commands::*;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::VERSION;

/// Deterministic emulator for LLM provider APIs
#[derive(Parser, Debug)]
#[command(name = "llm-emulator")]
#[command(version = VERSION)]
#[command(about = "Deterministic emulator for LLM provider APIs")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (YAML, TOML, or JSON)
    #[arg(short, long, global = true, env = "LLM_EMULATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LLM_EMULATOR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long, global = true, env = "LLM_EMULATOR_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the emulator server
    #[command(alias = "s")]
    Serve(ServeCommand),

    /// Route a piece of text against the configured cases
    Match(MatchCommand),

    /// Inspect configured scenarios
    Scenario(ScenarioCommand),

    /// Configuration management
    #[command(alias = "cfg")]
    Config(ConfigCommand),

    /// Health check a running instance
    Health(HealthCommand),

    /// Show version information
    Version,
}

#[derive(Parser, Debug)]
pub struct ServeCommand {
    #[arg(short, long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub host: Option<String>,

    /// Seed for latency, faults and embeddings
    #[arg(long)]
    pub seed: Option<u64>,

    /// Scenario to activate at startup
    #[arg(long)]
    pub scenario: Option<String>,

    /// Environment name exposed to fault conditions
    #[arg(long)]
    pub env: Option<String>,

    #[arg(long)]
    pub test_tag: Option<String>,
}

#[derive(Parser, Debug)]
pub struct MatchCommand {
    /// Text to route
    pub text: String,

    /// Also run the handler and print the reply
    #[arg(short, long)]
    pub reply: bool,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ScenarioCommand {
    #[command(subcommand)]
    pub action: ScenarioAction,
}

#[derive(Subcommand, Debug)]
pub enum ScenarioAction {
    /// List scenarios with their kind and size
    List {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show {
        #[arg(short, long, value_enum, default_value_t = ConfigFormat::Yaml)]
        format: ConfigFormat,
    },

    /// Validate a configuration file
    Validate { file: PathBuf },

    /// Write a sample configuration
    Sample {
        #[arg(short, long, value_enum, default_value_t = ConfigFormat::Yaml)]
        format: ConfigFormat,

        /// Output file (stdout if not given)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Show environment variable mappings
    Env,
}

#[derive(Parser, Debug)]
pub struct HealthCommand {
    #[arg(short, long, default_value = "http://localhost:11434")]
    pub url: String,

    /// Timeout in seconds
    #[arg(short, long, default_value = "5")]
    pub timeout: u64,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}
