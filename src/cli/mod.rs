//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `serve` (default) -- start the web UI
//! - `analyze <path>` -- analyze one clip from disk and print the result
//! - `config show|get|path` -- inspect configuration
//! - `version` -- print build/version info

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

/// Badminton video analysis web app.
#[derive(Parser, Debug)]
#[command(
    name = "courtside",
    version = env!("CARGO_PKG_VERSION"),
    about = "Courtside: shot-by-shot feedback on badminton clips"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web UI (default when no subcommand is given).
    Serve {
        /// Address to bind (overrides config).
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides config, default 8788).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Analyze a single video file and print the result.
    Analyze {
        /// Path to an .mp4, .mov or .avi file.
        path: PathBuf,

        /// Print the session snapshot as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },

    /// Inspect configuration values.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version, git commit, and commit date.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration (secrets redacted) as JSON.
    Show,

    /// Print a specific configuration value by dot-notation path.
    Get {
        /// Dot-notation key (e.g. "server.port", "gemini.model").
        key: String,
    },

    /// Print the resolved configuration file path.
    Path,
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

use crate::analysis::gemini::GeminiAnalyzer;
use crate::analysis::VideoAnalyzer;
use crate::config::{self, Config};
use crate::media::FileCandidate;
use crate::session::{self, PreviewRegistry, Session, SessionError, SessionSnapshot};
use serde_json::Value;

/// Secrets that should be redacted when printing config.
const SECRET_KEYS: &[&str] = &["apiKey", "apikey", "api_key", "token", "secret", "password"];

/// Run the `serve` subcommand.
pub async fn handle_serve(
    mut cfg: Config,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(bind) = bind {
        cfg.server.bind = bind;
    }
    if let Some(port) = port {
        cfg.server.port = port;
    }
    cfg.server.validate()?;

    let analyzer = GeminiAnalyzer::from_config(&cfg.gemini)?;
    crate::server::serve(&cfg.server, Arc::new(analyzer)).await?;
    Ok(())
}

/// Run the `analyze <path>` subcommand.
pub async fn handle_analyze(
    cfg: &Config,
    path: &Path,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let analyzer = GeminiAnalyzer::from_config(&cfg.gemini)?;
    let snapshot = analyze_path(path, &analyzer).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else if let Some(result) = &snapshot.result {
        println!("{}", result);
    }

    match snapshot.error {
        Some(report) => Err(format!("{} ({})", report.message, report.kind).into()),
        None => Ok(()),
    }
}

/// Select `path` in a fresh session and run one analysis attempt.
///
/// A rejected file or a failed attempt is reported through the snapshot's
/// `error`; only an unreadable path is returned as `Err`.
pub async fn analyze_path(
    path: &Path,
    analyzer: &dyn VideoAnalyzer,
) -> Result<SessionSnapshot, std::io::Error> {
    let candidate = FileCandidate::from_path(path).await?;
    let session = parking_lot::Mutex::new(Session::new(PreviewRegistry::new()));

    let selected = session.lock().select(candidate);
    match selected {
        Ok(_) => {
            if let Err(e) = session::run_submission(&session, analyzer).await {
                tracing::warn!(error = %e, "Analysis could not start");
            }
        }
        Err(SessionError::Rejected(_)) => {}
        Err(e) => tracing::warn!(error = %e, "File selection failed"),
    }

    let snapshot = session.lock().snapshot();
    Ok(snapshot)
}

/// Run the `config show` subcommand.
pub fn handle_config_show() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_config()?;
    let redacted = redact_secrets(cfg);
    let pretty = serde_json::to_string_pretty(&redacted)?;
    println!("{}", pretty);
    Ok(())
}

/// Run the `config get <key>` subcommand.
pub fn handle_config_get(key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_config()?;
    match config::get_value_at_path(&cfg, key) {
        Some(value) => {
            let value = redact_secrets_at(key, value);
            let pretty = serde_json::to_string_pretty(&value)?;
            println!("{}", pretty);
            Ok(())
        }
        None => Err(format!("Key not found: {}", key).into()),
    }
}

/// Run the `config path` subcommand.
pub fn handle_config_path() {
    println!("{}", config::get_config_path().display());
}

/// Run the `version` subcommand.
pub fn handle_version() {
    for line in version_lines() {
        println!("{}", line);
    }
}

fn version_lines() -> Vec<String> {
    vec![
        format!("courtside {}", env!("CARGO_PKG_VERSION")),
        format!("  Git commit: {}", env!("COURTSIDE_GIT_HASH")),
        format!("  Commit date: {}", env!("COURTSIDE_COMMIT_DATE")),
        format!(
            "  Platform:   {} ({})",
            std::env::consts::OS,
            std::env::consts::ARCH
        ),
    ]
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_secret_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SECRET_KEYS.iter().any(|s| lower.contains(&s.to_lowercase()))
}

/// Redact known secret keys in a JSON value (recursive).
fn redact_secrets(mut value: Value) -> Value {
    match &mut value {
        Value::Object(map) => {
            let keys: Vec<String> = map.keys().cloned().collect();
            for key in keys {
                if is_secret_key(&key) {
                    map.insert(key, Value::String("[REDACTED]".to_string()));
                } else if let Some(child) = map.remove(&key) {
                    map.insert(key, redact_secrets(child));
                }
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                *item = redact_secrets(item.take());
            }
        }
        _ => {}
    }
    value
}

/// Redact a value fetched by path: the leaf itself if its key is secret,
/// otherwise anything secret below it.
fn redact_secrets_at(path: &str, value: Value) -> Value {
    let leaf = path.rsplit('.').next().unwrap_or(path);
    if is_secret_key(leaf) {
        Value::String("[REDACTED]".to_string())
    } else {
        redact_secrets(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
