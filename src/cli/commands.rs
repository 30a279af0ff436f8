//! CLI command implementations

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use crate::config::EmulatorConfig;
use crate::context::RequestContext;
use crate::engine::{EmulatorEngine, Emission, ReplySource};
use crate::handlers::HandlerRegistry;
use crate::VERSION;

use super::{
    Cli, Commands, ConfigAction, ConfigCommand, ConfigFormat, HealthCommand, MatchCommand, OutputFormat,
    ScenarioAction, ScenarioCommand, ServeCommand,
};

/// Run a parsed command line with the built-in handlers
pub async fn execute(cli: Cli) -> Result<()> {
    execute_with(cli, HandlerRegistry::with_builtins()).await
}

/// Run a parsed command line with caller-registered handlers
pub async fn execute_with(cli: Cli, registry: HandlerRegistry) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.telemetry.log_level = level;
    }
    if cli.json_logs {
        config.telemetry.json_logs = true;
    }

    match cli.command {
        Commands::Serve(cmd) => execute_serve(cmd, config, registry).await,
        Commands::Match(cmd) => execute_match(cmd, config, registry).await,
        Commands::Scenario(cmd) => execute_scenario(cmd, config, registry),
        Commands::Config(cmd) => execute_config(cmd, config),
        Commands::Health(cmd) => execute_health(cmd).await,
        Commands::Version => execute_version(),
    }
}

/// File (if any), then environment overrides
pub fn load_config(path: Option<&Path>) -> Result<EmulatorConfig> {
    let Some(path) = path else {
        return Ok(EmulatorConfig::from_env()?);
    };
    let mut config =
        EmulatorConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

async fn execute_serve(cmd: ServeCommand, mut config: EmulatorConfig, registry: HandlerRegistry) -> Result<()> {
    if let Some(port) = cmd.port {
        config.server.port = port;
    }
    if let Some(host) = cmd.host {
        config.server.host = host;
    }
    if let Some(seed) = cmd.seed {
        config.seed = Some(seed);
    }
    if let Some(scenario) = cmd.scenario {
        config.use_scenario = Some(scenario);
    }
    if let Some(env) = cmd.env {
        config.env = env;
    }
    if let Some(tag) = cmd.test_tag {
        config.test_tag = Some(tag);
    }

    config.validate().context("configuration validation failed")?;
    crate::server::run_server(config, registry).await
}

async fn execute_match(cmd: MatchCommand, config: EmulatorConfig, registry: HandlerRegistry) -> Result<()> {
    let engine = EmulatorEngine::new(config, registry)?;
    let (result, label) = engine.route(&cmd.text).await;

    let reply = if cmd.reply {
        let mut ctx = RequestContext::new("cli");
        let handled = engine.handle_text("cli", &cmd.text, None, &mut ctx).await?;
        let source = match &handled.source {
            ReplySource::Scenario { id, .. } => format!("scenario {id}"),
            ReplySource::Case { label, .. } => format!("case {label}"),
            ReplySource::Fallback => "fallback".to_string(),
        };
        let text = match handled.emission {
            Emission::Payload(reply) => reply.text().to_string(),
            Emission::Fault(fault) => format!("{fault:?}"),
        };
        Some((source, text))
    } else {
        None
    };

    match cmd.format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "case": label,
                "match": result,
                "reply": reply.as_ref().map(|(source, text)| serde_json::json!({ "source": source, "text": text })),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("mode:    {}", result.mode);
            println!("score:   {:.3}", result.score);
            println!("case:    {}", label.as_deref().unwrap_or("-"));
            println!("pattern: {}", result.pattern.as_deref().unwrap_or("-"));
            let mut vars: Vec<_> = result.vars.iter().collect();
            vars.sort();
            for (name, value) in vars {
                println!("  {name} = {value}");
            }
            if let Some((source, text)) = reply {
                println!("reply ({source}): {text}");
            }
        }
    }
    Ok(())
}

fn execute_scenario(cmd: ScenarioCommand, config: EmulatorConfig, registry: HandlerRegistry) -> Result<()> {
    let ScenarioAction::List { format } = cmd.action;
    let engine = EmulatorEngine::new(config, registry)?;
    let summaries = engine.scenarios().summaries();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Text => {
            if summaries.is_empty() {
                println!("no scenarios configured");
            }
            for s in summaries {
                let kind = serde_json::to_value(s.kind)?;
                println!(
                    "{} {:24} {:8} {:>3}",
                    if s.active { "*" } else { " " },
                    s.id,
                    kind.as_str().unwrap_or_default(),
                    s.size
                );
            }
        }
    }
    Ok(())
}

fn render_config(config: &EmulatorConfig, format: ConfigFormat) -> Result<String> {
    Ok(match format {
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
    })
}

fn execute_config(cmd: ConfigCommand, config: EmulatorConfig) -> Result<()> {
    match cmd.action {
        ConfigAction::Show { format } => {
            println!("{}", render_config(&config, format)?);
            Ok(())
        }

        ConfigAction::Validate { file } => {
            let config = EmulatorConfig::from_file(&file)?;
            EmulatorEngine::new(config.clone(), HandlerRegistry::with_builtins())
                .context("cases reference handlers that are not built in")?;
            println!("{} is valid", file.display());
            println!("  cases:      {}", config.cases.len());
            println!("  scenarios:  {}", config.scenarios.len());
            println!("  http mocks: {}", config.http_mocks.len());
            Ok(())
        }

        ConfigAction::Sample { format, output, force } => {
            let rendered = render_config(&EmulatorConfig::sample(), format)?;
            match output {
                None => println!("{rendered}"),
                Some(path) => {
                    if path.exists() && !force {
                        bail!("{} already exists; use --force to overwrite", path.display());
                    }
                    std::fs::write(&path, rendered)?;
                    println!("wrote {}", path.display());
                }
            }
            Ok(())
        }

        ConfigAction::Env => {
            for (name, what) in [
                ("LLM_EMULATOR_CONFIG", "configuration file path"),
                ("LLM_EMULATOR_PORT", "server port (default 11434)"),
                ("LLM_EMULATOR_HOST", "server host (default 0.0.0.0)"),
                ("LLM_EMULATOR_ENV", "environment name (default local)"),
                ("LLM_EMULATOR_SEED", "seed for latency, faults and embeddings"),
                ("LLM_EMULATOR_TEST_TAG", "test tag exposed to fault conditions"),
                ("LLM_EMULATOR_SCENARIO", "scenario active at startup"),
                ("LLM_EMULATOR_LOG_LEVEL", "log level"),
                ("LLM_EMULATOR_JSON_LOGS", "JSON log output"),
                ("RUST_LOG", "tracing filter, overrides the log level"),
            ] {
                println!("  {name:<28} {what}");
            }
            Ok(())
        }
    }
}

async fn execute_health(cmd: HealthCommand) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cmd.timeout))
        .build()?;
    let url = url::Url::parse(&cmd.url)
        .and_then(|base| base.join("/health"))
        .with_context(|| format!("invalid url '{}'", cmd.url))?
        .to_string();
    let started = Instant::now();

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            if cmd.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "url": url, "error": e.to_string() }));
            }
            bail!("health check failed: {e}");
        }
    };

    let latency = started.elapsed();
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();

    match cmd.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "url": url,
                "status": status.as_u16(),
                "latency_ms": latency.as_millis() as u64,
                "response": body,
            }))?
        ),
        OutputFormat::Text => println!("{url} status={} latency={latency:?} body={body}", status.as_u16()),
    }

    if !status.is_success() {
        bail!("health check failed with status {status}");
    }
    Ok(())
}

fn execute_version() -> Result<()> {
    println!("llm-emulator {VERSION}");
    println!("  rust-version: {}", env!("CARGO_PKG_RUST_VERSION"));
    Ok(())
}
