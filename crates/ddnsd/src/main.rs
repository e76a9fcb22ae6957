// # ddnsd - DDNS Daemon
//
// Thin integration layer: reads configuration from the environment, wires
// the Cloudflare provider, the HTTP address resolver and the file record
// store into a `Reconciler`, and either runs the schedulers until a shutdown
// signal or performs a single command against the record set.
//
// ## Configuration
//
// Process configuration comes from environment variables. Everything that is
// edited at runtime (records, cadence, auto-update) lives in the record-set
// file itself.
//
// - `DDNS_CONFIG_PATH`: Record-set file (default `ddns.json`)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn or error (default `info`)
// - `DDNS_IP_SOURCE_URL`: Comma-separated public-address services, tried in order
// - `DDNS_CALL_TIMEOUT_SECS`: Deadline for each provider or resolver call (1-300)
// - `DDNS_MODE`: `dry-run` logs provider writes instead of sending them
//
// ## Example
//
// ```bash
// export DDNS_CONFIG_PATH=/var/lib/ddns/ddns.json
// ddnsd add home.example.com --token your_token
// ddnsd settings --auto-update true --interval 10
// ddnsd run
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ddns_core::auth::{RateLimiter, SessionStore};
use ddns_core::config::{DEFAULT_CALL_TIMEOUT_SECS, EngineConfig};
use ddns_core::scheduler::{self, MAINTENANCE_PERIOD};
use ddns_core::{
    Credential, FileRecordStore, Reconciler, ReconciliationOutcome, RecordUpdate, SettingsUpdate,
};
use ddns_ip_http::{DEFAULT_IP_SERVICES, HttpAddressResolver};
use ddns_provider_cloudflare::{CloudflareProvider, is_dry_run_mode};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound on waiting for the schedulers to wind down
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "ddnsd", version, about = "Keeps DNS records pointed at this host's public address")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the schedulers until SIGINT or SIGTERM
    Run,
    /// Reconcile every enabled record, or one record by name
    Update {
        name: Option<String>,
        /// Print outcomes as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List managed records
    List,
    /// Register a record, resolving its zone and record IDs
    Add {
        name: String,
        /// API token; falls back to the configured default token
        #[arg(long)]
        token: Option<String>,
        #[arg(long, default_value_t = false)]
        proxied: bool,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Stop managing a record
    Remove { name: String },
    /// Flip a record's enabled flag
    Toggle { name: String },
    /// Edit a record's proxy flag, note or enabled flag
    Edit {
        name: String,
        #[arg(long)]
        proxied: Option<bool>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
    },
    /// Show or change global settings
    Settings {
        /// Reconciliation cadence in minutes (1-1440)
        #[arg(long)]
        interval: Option<u32>,
        #[arg(long)]
        auto_update: Option<bool>,
        /// Token used by `add` when none is given; empty clears it
        #[arg(long)]
        default_token: Option<String>,
    },
}

/// Process configuration
#[derive(Debug)]
struct Config {
    config_path: String,
    log_level: String,
    ip_services: Vec<String>,
    call_timeout_secs: u64,
    mode: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let call_timeout_secs = match lookup("DDNS_CALL_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().with_context(|| {
                format!("DDNS_CALL_TIMEOUT_SECS must be a number of seconds. Got: {}", raw)
            })?,
            None => DEFAULT_CALL_TIMEOUT_SECS,
        };

        let ip_services = match lookup("DDNS_IP_SOURCE_URL") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_IP_SERVICES.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            config_path: lookup("DDNS_CONFIG_PATH").unwrap_or_else(|| "ddns.json".to_string()),
            log_level: lookup("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            ip_services,
            call_timeout_secs,
            mode: lookup("DDNS_MODE").unwrap_or_default(),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.config_path.trim().is_empty() {
            anyhow::bail!("DDNS_CONFIG_PATH cannot be empty");
        }

        if self.ip_services.is_empty() {
            anyhow::bail!(
                "DDNS_IP_SOURCE_URL must name at least one service. \
                Set it via: export DDNS_IP_SOURCE_URL=https://api.ipify.org"
            );
        }

        for url in &self.ip_services {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!(
                    "DDNS_IP_SOURCE_URL entries must use HTTP or HTTPS scheme. Got: {}",
                    url
                );
            }
        }

        if !(1..=300).contains(&self.call_timeout_secs) {
            anyhow::bail!(
                "DDNS_CALL_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.call_timeout_secs
            );
        }

        match self.mode.trim().to_lowercase().as_str() {
            "" | "live" | "dry-run" => {}
            _ => anyhow::bail!(
                "DDNS_MODE '{}' is not valid. Valid modes: live, dry-run",
                self.mode
            ),
        }

        self.level()?;
        Ok(())
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig::default().with_call_timeout(Duration::from_secs(self.call_timeout_secs))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let reconciler = match build_reconciler(&config).await {
            Ok(reconciler) => Arc::new(reconciler),
            Err(e) => {
                error!("Startup error: {:#}", e);
                return DdnsExitCode::ConfigError;
            }
        };

        match execute(cli.command, reconciler).await {
            Ok(code) => code,
            Err(e) => {
                error!("{:#}", e);
                DdnsExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Wire adapters and load the record set
async fn build_reconciler(config: &Config) -> Result<Reconciler> {
    let provider = CloudflareProvider::new(is_dry_run_mode(&config.mode))
        .context("failed to create Cloudflare provider")?;
    if provider.is_dry_run() {
        warn!("Dry-run mode: provider writes are logged, not sent");
    }

    let resolver = HttpAddressResolver::new(&config.ip_services)
        .context("failed to create address resolver")?;

    let store = FileRecordStore::new(&config.config_path)
        .await
        .with_context(|| format!("failed to open record set {}", config.config_path))?;

    let reconciler = Reconciler::load(
        Box::new(provider),
        Box::new(resolver),
        Box::new(store),
        config.engine_config(),
    )
    .await
    .with_context(|| format!("failed to load record set {}", config.config_path))?;

    Ok(reconciler)
}

async fn execute(command: Command, reconciler: Arc<Reconciler>) -> Result<DdnsExitCode> {
    match command {
        Command::Run => {
            run_daemon(reconciler).await?;
            Ok(DdnsExitCode::CleanShutdown)
        }
        Command::Update { name, json } => {
            let outcomes = match name {
                Some(name) => vec![reconciler.reconcile_single(&name).await],
                None => reconciler.reconcile_all().await,
            };
            print_outcomes(&outcomes, json)?;
            if outcomes.iter().any(ReconciliationOutcome::is_failure) {
                Ok(DdnsExitCode::RuntimeError)
            } else {
                Ok(DdnsExitCode::CleanShutdown)
            }
        }
        Command::List => {
            let records = reconciler.records().list().await;
            if records.is_empty() {
                println!("No records configured");
            }
            for record in records {
                let last_ip = record
                    .last_ip
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let last_updated = record
                    .last_updated
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}\t{}\tproxied={}\tlast_ip={}\tlast_updated={}\t{}",
                    record.name,
                    if record.enabled { "enabled" } else { "disabled" },
                    record.proxied,
                    last_ip,
                    last_updated,
                    record.notes
                );
            }
            Ok(DdnsExitCode::CleanShutdown)
        }
        Command::Add {
            name,
            token,
            proxied,
            notes,
        } => {
            let credential = match token {
                Some(token) => Credential::new(token),
                None => reconciler.records().settings().await.default_api_token,
            };
            let record = reconciler
                .register_record(&name, credential, proxied, &notes)
                .await?;
            println!(
                "Added {} (zone {}, record {})",
                record.name, record.zone_id, record.record_id
            );
            Ok(DdnsExitCode::CleanShutdown)
        }
        Command::Remove { name } => {
            let record = reconciler.remove_record(&name).await?;
            println!("Removed {}", record.name);
            Ok(DdnsExitCode::CleanShutdown)
        }
        Command::Toggle { name } => {
            let enabled = reconciler.toggle_record(&name).await?;
            println!(
                "{} is now {}",
                name,
                if enabled { "enabled" } else { "disabled" }
            );
            Ok(DdnsExitCode::CleanShutdown)
        }
        Command::Edit {
            name,
            proxied,
            notes,
            enabled,
        } => {
            let record = reconciler
                .update_record(
                    &name,
                    RecordUpdate {
                        proxied,
                        notes,
                        enabled,
                    },
                )
                .await?;
            println!(
                "{}: enabled={} proxied={} notes={:?}",
                record.name, record.enabled, record.proxied, record.notes
            );
            Ok(DdnsExitCode::CleanShutdown)
        }
        Command::Settings {
            interval,
            auto_update,
            default_token,
        } => {
            let update = SettingsUpdate {
                update_interval: interval,
                auto_update,
                default_api_token: default_token.map(Credential::new),
            };
            if update.update_interval.is_some()
                || update.auto_update.is_some()
                || update.default_api_token.is_some()
            {
                reconciler.update_settings(update).await?;
            }

            let settings = reconciler.records().settings().await;
            println!("update_interval={} minutes", settings.update_interval);
            println!("auto_update={}", settings.auto_update);
            println!(
                "default_api_token={}",
                if settings.default_api_token.is_empty() {
                    "unset"
                } else {
                    "set"
                }
            );
            Ok(DdnsExitCode::CleanShutdown)
        }
    }
}

fn print_outcomes(outcomes: &[ReconciliationOutcome], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcomes)?);
    } else {
        for outcome in outcomes {
            println!("{}", outcome);
        }
    }
    Ok(())
}

/// Run the daemon
async fn run_daemon(reconciler: Arc<Reconciler>) -> Result<()> {
    info!("Starting ddnsd daemon");

    let settings = reconciler.records().settings().await;
    info!(
        "Managing {} record(s), {} enabled",
        reconciler.records().len().await,
        reconciler.records().enabled_count().await
    );

    // Session and login-window tables for an embedding presentation layer;
    // the daemon has no control surface of its own and only keeps them swept.
    let sessions = SessionStore::new();
    let limiter = RateLimiter::new();
    let mut maintenance = scheduler::schedule_maintenance(sessions, limiter, MAINTENANCE_PERIOD);

    // The startup pass is the first tick, so signals are handled during it
    let mut reconciliation = if settings.auto_update {
        Some(scheduler::schedule_reconciliation_at(
            Arc::clone(&reconciler),
            Instant::now(),
            settings.update_period(),
        ))
    } else {
        info!("Auto-update disabled; records change only on explicit update");
        None
    };

    let received = wait_for_shutdown().await;

    match &received {
        Ok(name) => info!("Received shutdown signal: {}", name),
        Err(e) => error!("Shutdown error: {}", e),
    }
    info!("Shutting down daemon");

    let stopped = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        if let Some(reconciliation) = reconciliation.as_mut() {
            reconciliation.stop().await;
        }
        maintenance.stop().await;
    })
    .await;

    if stopped.is_err() {
        anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT);
    }

    received.map(|_| ())
}

/// Wait for SIGTERM or SIGINT, returning the name of the signal received
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for SIGINT
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
