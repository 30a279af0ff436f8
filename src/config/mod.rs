//! Configuration module for the LLM emulator
//!
//! Provides layered configuration with support for:
//! - YAML/TOML/JSON config files
//! - Environment variable overrides
//! - Validation before anything reaches the engine

mod cases;
mod faults;
mod matching;
mod scenarios;

pub use cases::*;
pub use faults::*;
pub use matching::*;
pub use scenarios::*;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EmulatorError, EmulatorResult};

/// Reply used when no case matches
pub const DEFAULT_FALLBACK: &str = "Sorry, I don't have a mock for that yet.";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub matching: MatchingConfig,
    pub cases: Vec<CaseConfig>,
    pub scenarios: Vec<ScenarioConfig>,
    /// Scenario played before normal matching
    #[serde(alias = "useScenario", skip_serializing_if = "Option::is_none")]
    pub use_scenario: Option<String>,
    pub http_mocks: Vec<HttpMockConfig>,
    pub defaults: DefaultsConfig,
    pub contracts: ContractsConfig,
    pub vcr: VcrConfig,
    /// Deployment label matched by fault and latency conditions
    pub env: String,
    #[serde(alias = "testTag", skip_serializing_if = "Option::is_none")]
    pub test_tag: Option<String>,
    /// Seed for deterministic latency, faults and embeddings (None = random)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            telemetry: TelemetryConfig::default(),
            matching: MatchingConfig::default(),
            cases: Vec::new(),
            scenarios: Vec::new(),
            use_scenario: None,
            http_mocks: Vec::new(),
            defaults: DefaultsConfig::default(),
            contracts: ContractsConfig::default(),
            vcr: VcrConfig::default(),
            env: "local".to_string(),
            test_tag: None,
            seed: None,
        }
    }
}

impl EmulatorConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> EmulatorResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EmulatorError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| EmulatorError::Config(format!("YAML parse error: {}", e)))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| EmulatorError::Config(format!("TOML parse error: {}", e)))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| EmulatorError::Config(format!("JSON parse error: {}", e)))?,
            _ => {
                return Err(EmulatorError::Config(
                    "Unsupported config file format. Use .yaml, .toml, or .json".to_string(),
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Default configuration with environment variable overrides
    pub fn from_env() -> EmulatorResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LLM_EMULATOR_*` environment variables on top of this configuration
    pub fn apply_env_overrides(&mut self) -> EmulatorResult<()> {
        if let Ok(port) = std::env::var("LLM_EMULATOR_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| EmulatorError::Config("Invalid port number".to_string()))?;
        }

        if let Ok(host) = std::env::var("LLM_EMULATOR_HOST") {
            self.server.host = host;
        }

        if let Ok(env) = std::env::var("LLM_EMULATOR_ENV") {
            self.env = env;
        }

        if let Ok(seed) = std::env::var("LLM_EMULATOR_SEED") {
            self.seed = Some(
                seed.parse()
                    .map_err(|_| EmulatorError::Config("Invalid seed value".to_string()))?,
            );
        }

        if let Ok(tag) = std::env::var("LLM_EMULATOR_TEST_TAG") {
            self.test_tag = Some(tag);
        }

        if let Ok(scenario) = std::env::var("LLM_EMULATOR_SCENARIO") {
            self.use_scenario = Some(scenario).filter(|s| !s.is_empty());
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> EmulatorResult<()> {
        self.server.validate()?;
        self.matching.validate()?;
        self.defaults.validate()?;

        let mut ids = HashSet::new();
        for (i, case) in self.cases.iter().enumerate() {
            case.validate(i)?;
            if let Some(id) = &case.options.id {
                if !ids.insert(id.as_str()) {
                    return Err(EmulatorError::Validation {
                        message: format!("duplicate case id '{id}'"),
                        param: Some(format!("cases[{i}].id")),
                    });
                }
            }
        }

        let mut scenario_ids = HashSet::new();
        for (i, scenario) in self.scenarios.iter().enumerate() {
            scenario.validate(i)?;
            if !scenario_ids.insert(scenario.id.as_str()) {
                return Err(EmulatorError::Validation {
                    message: format!("duplicate scenario id '{}'", scenario.id),
                    param: Some(format!("scenarios[{i}].id")),
                });
            }
        }

        if let Some(active) = &self.use_scenario {
            if !scenario_ids.contains(active.as_str()) {
                return Err(EmulatorError::Validation {
                    message: format!("use_scenario names unknown scenario '{active}'"),
                    param: Some("use_scenario".to_string()),
                });
            }
        }

        for (i, mock) in self.http_mocks.iter().enumerate() {
            mock.validate(i)?;
        }

        Ok(())
    }

    /// Configuration used by `config sample`: a few cases, one scenario of each shape
    pub fn sample() -> Self {
        let mut config = Self::default();
        config.seed = Some(42);
        config.cases = vec![
            CaseConfig::reply(
                "explain the concept of {{topic}} in simple terms",
                "This is a simple explanation of {{topic}}.",
            )
            .with_id("explain"),
            CaseConfig::reply("generate code", "print 'test';").with_id("gen-code"),
            CaseConfig::handler("repeat after me {{phrase}}", "echo").with_id("echo"),
        ];
        config.scenarios = vec![ScenarioConfig {
            id: "checkout".to_string(),
            steps: vec![
                StepConfig {
                    kind: StepKind::Chat,
                    reply: Some("I found 3 jackets under $100. Which size?".to_string()),
                    ..Default::default()
                },
                StepConfig {
                    kind: StepKind::Chat,
                    reply: Some("Order placed. Confirmation #MOCK123.".to_string()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }];
        config.http_mocks = vec![HttpMockConfig::new("GET", "/users/:id")
            .with_body(serde_json::json!({ "id": "{{id}}", "name": "Mock User" }))];
        config
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum request body size in bytes
    pub max_body_bytes: usize,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Enable request tracing
    pub request_logging: bool,
    /// Header carrying the scenario conversation key
    pub session_header: String,
    /// Seconds to wait for in-flight requests on shutdown
    pub drain_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 11434,
            max_body_bytes: 2 * 1024 * 1024,
            cors_enabled: true,
            request_logging: true,
            session_header: "x-emulator-session".to_string(),
            drain_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> EmulatorResult<()> {
        if self.port == 0 {
            return Err(EmulatorError::Validation {
                message: "Port cannot be 0".to_string(),
                param: Some("server.port".to_string()),
            });
        }
        if self.max_body_bytes == 0 {
            return Err(EmulatorError::Validation {
                message: "max_body_bytes must be greater than 0".to_string(),
                param: Some("server.max_body_bytes".to_string()),
            });
        }
        if axum::http::HeaderName::from_bytes(self.session_header.as_bytes()).is_err() {
            return Err(EmulatorError::Validation {
                message: format!("invalid header name '{}'", self.session_header),
                param: Some("server.session_header".to_string()),
            });
        }
        Ok(())
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> EmulatorResult<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| EmulatorError::Config(format!("Invalid socket address: {e}")))
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Log level, overridden by `RUST_LOG`
    pub log_level: String,
    /// Enable JSON logging
    pub json_logs: bool,
    /// Expose Prometheus metrics
    pub metrics_enabled: bool,
    /// Prometheus metrics endpoint path
    pub metrics_path: String,
    /// Service name attached to log lines
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_path: "/metrics".to_string(),
            service_name: "llm-emulator".to_string(),
        }
    }
}

/// Behavior for requests that no case claims, and for scenario steps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub fallback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyProfile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<FaultSpec>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            fallback: DEFAULT_FALLBACK.to_string(),
            latency: None,
            faults: Vec::new(),
        }
    }
}

impl DefaultsConfig {
    /// Options applied when no case options are available
    pub fn options(&self) -> CaseOptions {
        CaseOptions {
            id: None,
            latency: self.latency.clone(),
            faults: self.faults.clone(),
            validate: None,
        }
    }

    pub fn validate(&self) -> EmulatorResult<()> {
        self.options().validate("defaults")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractMode {
    /// Log violations and continue
    #[default]
    Warn,
    /// Fail the request on violation
    Strict,
}

/// JSON-schema contract validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    pub mode: ContractMode,
    /// Directory holding `<name>.json` schemas
    pub schema_dir: PathBuf,
    pub provider: String,
    pub version: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            mode: ContractMode::Warn,
            schema_dir: PathBuf::from("schemas"),
            provider: "openai".to_string(),
            version: "2025-06-01".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcrMode {
    Record,
    #[default]
    Replay,
}

/// Cassette recording of interactions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VcrConfig {
    pub enabled: bool,
    pub mode: VcrMode,
    #[serde(alias = "cassetteDir")]
    pub cassette_dir: PathBuf,
    /// Header names and body keys replaced before writing
    pub redact: Vec<String>,
}

impl Default for VcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: VcrMode::Replay,
            cassette_dir: PathBuf::from("./.cassettes"),
            redact: vec!["Authorization".to_string(), "api_key".to_string()],
        }
    }
}
