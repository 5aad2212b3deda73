//! Command-line interface for redtrace.
//!
//! Validates configuration and replays recorded spans through a trace store
//! backed by the in-memory engine, printing the query results as JSON.

use crate::core::config::ConfigBuilder;
use crate::core::types::{OperationQueryParameters, Span, TraceQueryParameters};
use crate::core::{Config, RedtraceError, Result};
use crate::metrics::{MetricsSink, NoopMetrics, StoreMetrics};
use crate::spanstore::TraceStore;
use crate::storage::MemoryEngine;
use clap::Parser;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

/// Trace storage on a document/search index engine
#[derive(Parser, Debug)]
#[command(name = "redtrace")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/redtrace/config.yaml)
    #[arg(short, long, env = "REDTRACE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Retention of written keys in seconds
    #[arg(long, env = "REDTRACE_TTL_SECS")]
    pub ttl_secs: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, env = "REDTRACE_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,

    /// Replay spans from a JSON-lines file and print query results
    #[arg(long, value_name = "SPANS_JSONL")]
    pub replay: Option<PathBuf>,

    /// Service to search for after replay (default: list the catalog)
    #[arg(long, requires = "replay")]
    pub service: Option<String>,

    /// Operation to search for after replay
    #[arg(long, requires = "service")]
    pub operation: Option<String>,

    /// Maximum number of traces to print
    #[arg(long, default_value_t = TraceQueryParameters::DEFAULT_NUM_TRACES)]
    pub limit: usize,
}

/// What to print after a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayQuery {
    pub service: Option<String>,
    pub operation: Option<String>,
    pub limit: usize,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments and environment variables (highest priority)
    /// 2. Config file
    /// 3. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => dirs::config_dir()
                .map(|d| d.join("redtrace").join("config.yaml"))
                .filter(|path| path.exists()),
        };

        if let Some(path) = config_path {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    builder = builder.from_yaml(&content)?;
                    tracing::info!("Loaded configuration from: {:?}", path);
                },
                Err(e) if self.config.is_some() => {
                    return Err(RedtraceError::config(format!(
                        "Failed to read config file {:?}: {}",
                        path, e
                    )));
                },
                Err(_) => {
                    tracing::debug!("No config file found at {:?}, using defaults", path);
                },
            }
        }

        self.build_config_from_args(builder)
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(secs) = self.ttl_secs {
            builder = builder.ttl(Duration::from_secs(secs));
        }
        builder.debug(self.debug).build()
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_directive(config)));

        // Results go to stdout, so logs stay on stderr
        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| RedtraceError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }

    fn replay_query(&self) -> ReplayQuery {
        ReplayQuery {
            service: self.service.clone(),
            operation: self.operation.clone(),
            limit: self.limit,
        }
    }
}

/// Default filter directive when `RUST_LOG` is unset; debug mode wins.
fn log_directive(config: &Config) -> &str {
    if config.debug {
        "debug"
    } else {
        config.logging.level.as_str()
    }
}

/// Parses JSON-lines spans. Blank lines are ignored; malformed lines are
/// skipped with a warning.
pub fn parse_spans(input: &str) -> Vec<Span> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str::<Span>(line) {
            Ok(span) => Some(span),
            Err(e) => {
                tracing::warn!("line {}: skipping malformed span: {}", n + 1, e);
                None
            },
        })
        .collect()
}

/// Ingest `spans` into a fresh in-memory store and answer `query`.
///
/// With a service, returns the matching traces; otherwise the service
/// catalog with each service's operations.
pub async fn replay(config: &Config, spans: &[Span], query: &ReplayQuery) -> Result<serde_json::Value> {
    let metrics: Arc<dyn MetricsSink> = if config.metrics.enabled {
        StoreMetrics::shared()
    } else {
        Arc::new(NoopMetrics)
    };
    let store = TraceStore::open(Arc::new(MemoryEngine::new()), &config.storage, metrics).await?;

    let writer = store.span_writer();
    for span in spans {
        writer.write_span(span).await?;
    }
    tracing::info!("replayed {} spans", spans.len());

    let reader = store.span_reader();
    let output = match &query.service {
        Some(service) => {
            let latest = spans.iter().map(|s| s.start_time).max().unwrap_or(UNIX_EPOCH);
            let mut params = TraceQueryParameters::new(service.as_str(), UNIX_EPOCH, latest).limit(query.limit);
            if let Some(operation) = &query.operation {
                params = params.operation(operation.as_str());
            }
            let traces = reader.find_traces(&params).await?;
            serde_json::to_value(traces)?
        },
        None => {
            let mut catalog = serde_json::Map::new();
            for service in reader.get_services().await? {
                let operations = reader
                    .get_operations(&OperationQueryParameters::new(service.as_str()))
                    .await?;
                catalog.insert(service, serde_json::to_value(operations)?);
            }
            json!({ "services": catalog })
        },
    };

    store.close().await?;
    Ok(output)
}

/// Read a JSON-lines file and replay it.
pub async fn replay_file(config: &Config, path: &Path, query: &ReplayQuery) -> Result<serde_json::Value> {
    let content = tokio::fs::read_to_string(path).await?;
    let spans = parse_spans(&content);
    replay(config, &spans, query).await
}

/// Execute the redtrace command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;

    if cli.check_config {
        config.validate()?;
        println!("Configuration is valid!");
        println!("  TTL: {:?}", config.storage.ttl);
        println!("  Write timeout: {:?}", config.storage.write_timeout);
        println!("  Read timeout: {:?}", config.storage.read_timeout);
        println!("  Catalog limit: {}", config.storage.catalog_limit);
        println!("  Log level: {}", config.logging.level.as_str());
        println!("  Metrics: {}", config.metrics.enabled);
        return Ok(());
    }

    match &cli.replay {
        Some(path) => {
            let output = replay_file(&config, path, &cli.replay_query()).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        },
        None => Err(RedtraceError::config(
            "nothing to do: pass --replay <SPANS_JSONL> or --check-config",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "redtrace",
            "--replay",
            "spans.jsonl",
            "--service",
            "checkout",
            "--limit",
            "5",
            "--ttl-secs",
            "120",
        ]);
        assert_eq!(cli.replay, Some(PathBuf::from("spans.jsonl")));
        assert_eq!(cli.service.as_deref(), Some("checkout"));
        assert_eq!(cli.limit, 5);
        assert_eq!(cli.ttl_secs, Some(120));
    }

    #[test]
    fn test_service_requires_replay() {
        assert!(Cli::try_parse_from(["redtrace", "--service", "checkout"]).is_err());
    }

    #[test]
    fn test_ttl_flag_overrides_defaults() {
        let cli = Cli::parse_from(["redtrace", "--ttl-secs", "300"]);
        let config = cli.build_config_from_args(ConfigBuilder::new()).unwrap();
        assert_eq!(config.storage.ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_debug_flag_selects_debug_logging() {
        let quiet = Cli::parse_from(["redtrace"]);
        let config = quiet.build_config_from_args(ConfigBuilder::new()).unwrap();
        assert_eq!(log_directive(&config), "warn");

        let verbose = Cli::parse_from(["redtrace", "--debug"]);
        let config = verbose.build_config_from_args(ConfigBuilder::new()).unwrap();
        assert!(config.debug);
        assert_eq!(log_directive(&config), "debug");
    }

    #[test]
    fn test_parse_spans_skips_bad_lines() {
        assert!(parse_spans("\n{not json}\n\n").is_empty());
    }
}
