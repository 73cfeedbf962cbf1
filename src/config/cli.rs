use crate::config::Settings;
use crate::utils::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "recommend-gateway")]
#[command(about = "Aggregates nearby stores and their recommendations for a customer")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, env = "GATEWAY_BIND")]
    pub bind: Option<String>,

    /// Register a service instance, e.g. --service CUSTOMERS=http://localhost:9000
    #[arg(long = "service", value_parser = parse_service)]
    pub services: Vec<(String, String)>,

    #[arg(long, env = "GATEWAY_MAX_PAGES")]
    pub max_pages: Option<usize>,

    #[arg(long, env = "GATEWAY_REQUEST_DEADLINE_MS")]
    pub request_deadline_ms: Option<u64>,

    #[arg(long, env = "GATEWAY_PER_CALL_TIMEOUT_MS")]
    pub per_call_timeout_ms: Option<u64>,

    #[arg(long, env = "GATEWAY_BREAKER_FAILURE_THRESHOLD")]
    pub breaker_failure_threshold: Option<f64>,

    #[arg(long, env = "GATEWAY_BREAKER_COOLDOWN_MS")]
    pub breaker_cooldown_ms: Option<u64>,

    #[arg(long, env = "GATEWAY_DETAIL_BATCH_WINDOW_MS")]
    pub detail_batch_window_ms: Option<u64>,

    #[arg(long, env = "GATEWAY_DETAIL_BATCH_CAP")]
    pub detail_batch_cap: Option<usize>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Aggregate once for a customer and print the JSON result
    Query { customer_id: String },
}

impl CliArgs {
    /// 載入設定檔，再套用命令列覆蓋設定
    pub fn load_settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        self.apply_overrides(&mut settings);
        Ok(settings)
    }

    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(bind) = &self.bind {
            settings.server.bind_address = bind.clone();
        }
        if self.json_logs {
            settings.server.json_logs = true;
        }
        for (name, url) in &self.services {
            settings
                .services
                .entry(name.clone())
                .or_default()
                .push(url.clone());
        }

        let aggregation = &mut settings.aggregation;
        if let Some(v) = self.max_pages {
            aggregation.max_pages = v;
        }
        if let Some(v) = self.request_deadline_ms {
            aggregation.request_deadline_ms = v;
        }
        if let Some(v) = self.per_call_timeout_ms {
            aggregation.per_call_timeout_ms = v;
        }
        if let Some(v) = self.detail_batch_window_ms {
            aggregation.detail_batch_window_ms = v;
        }
        if let Some(v) = self.detail_batch_cap {
            aggregation.detail_batch_cap = v;
        }

        if let Some(v) = self.breaker_failure_threshold {
            settings.breaker.failure_rate_threshold = v;
        }
        if let Some(v) = self.breaker_cooldown_ms {
            settings.breaker.cooldown_ms = v;
        }
    }
}

fn parse_service(value: &str) -> std::result::Result<(String, String), String> {
    let (name, url) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=URL, got '{}'", value))?;
    if name.trim().is_empty() || url.trim().is_empty() {
        return Err(format!("expected NAME=URL, got '{}'", value));
    }
    Ok((name.trim().to_string(), url.trim().to_string()))
}
