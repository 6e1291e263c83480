//! Configuration system for the `GreenThumb` sync client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/greenthumb/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A configured URL does not parse.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl {
        /// The offending value.
        url: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The base URL scheme has no WebSocket counterpart.
    #[error("cannot derive a WebSocket URL from scheme {0:?}")]
    UnsupportedScheme(String),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    realtime: RealtimeFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    base_url: Option<String>,
    ws_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[realtime]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RealtimeFileConfig {
    connect_timeout_secs: Option<u64>,
    reconnect_delay_ms: Option<u64>,
    max_reconnect_attempts: Option<u32>,
    event_buffer: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Retry policy of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Fixed wait before each retry.
    pub delay: Duration,
    /// Consecutive retries allowed before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(3000),
            max_attempts: 5,
        }
    }
}

/// Push channel configuration (used by `EventChannel`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Bound on each open attempt.
    pub connect_timeout: Duration,
    /// Retry policy after failures and closes.
    pub reconnect: ReconnectConfig,
    /// Capacity of the observer broadcast buffer.
    pub event_buffer: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            event_buffer: 256,
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Root of the REST API.
    pub base_url: Url,
    /// Push channel endpoint, derived from `base_url` unless set.
    pub ws_url: Url,
    /// Timeout applied to every REST request.
    pub request_timeout: Duration,
    /// Push channel settings.
    pub realtime: RealtimeConfig,
}

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// REST timeout used when nothing else is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl ClientConfig {
    /// Build a configuration for `base_url` with every other value defaulted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the URL is invalid or has no WebSocket
    /// counterpart.
    pub fn for_base_url(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = parse_url(base_url)?;
        let ws_url = derive_ws_url(&base_url)?;
        Ok(Self {
            base_url,
            ws_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            realtime: RealtimeConfig::default(),
        })
    }

    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// CLI args and env vars are parsed via `clap`. If `--config` is given
    /// and the file does not exist, returns an error. If no `--config` is
    /// given, the default path (`~/.config/greenthumb/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or a configured URL is invalid.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = RealtimeConfig::default();

        let base_url = parse_url(
            cli.base_url
                .as_deref()
                .or(file.server.base_url.as_deref())
                .unwrap_or(DEFAULT_BASE_URL),
        )?;
        let ws_url = match cli.ws_url.as_deref().or(file.server.ws_url.as_deref()) {
            Some(raw) => parse_url(raw)?,
            None => derive_ws_url(&base_url)?,
        };

        Ok(Self {
            base_url,
            ws_url,
            request_timeout: cli
                .request_timeout_secs
                .or(file.server.request_timeout_secs)
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
            realtime: RealtimeConfig {
                connect_timeout: file
                    .realtime
                    .connect_timeout_secs
                    .map_or(defaults.connect_timeout, Duration::from_secs),
                reconnect: ReconnectConfig {
                    delay: cli
                        .reconnect_delay_ms
                        .or(file.realtime.reconnect_delay_ms)
                        .map_or(defaults.reconnect.delay, Duration::from_millis),
                    max_attempts: cli
                        .max_reconnect_attempts
                        .or(file.realtime.max_reconnect_attempts)
                        .unwrap_or(defaults.reconnect.max_attempts),
                },
                event_buffer: file
                    .realtime
                    .event_buffer
                    .unwrap_or(defaults.event_buffer),
            },
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct CliArgs {
    /// Root URL of the GreenThumb API.
    #[arg(long, global = true, env = "GREENTHUMB_URL")]
    pub base_url: Option<String>,

    /// Push channel URL (default: derived from the base URL).
    #[arg(long, global = true, env = "GREENTHUMB_WS_URL")]
    pub ws_url: Option<String>,

    /// Path to config file (default: `~/.config/greenthumb/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    pub request_timeout_secs: Option<u64>,

    /// Delay between push channel retries, in milliseconds.
    #[arg(long, global = true)]
    pub reconnect_delay_ms: Option<u64>,

    /// Consecutive push channel retries before giving up.
    #[arg(long, global = true)]
    pub max_reconnect_attempts: Option<u32>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info", env = "GREENTHUMB_LOG")]
    pub log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Map the REST base URL to the push endpoint: `http→ws`, `https→wss`,
/// path + `/calendar/ws`.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedScheme`] for non-HTTP(S)/WS(S) URLs.
pub fn derive_ws_url(base_url: &Url) -> Result<Url, ConfigError> {
    let scheme = match base_url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    };

    let mut url = base_url.clone();
    url.set_query(None);
    url.set_fragment(None);
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(["calendar", "ws"]);
    }
    url.set_scheme(scheme)
        .map_err(|()| ConfigError::UnsupportedScheme(base_url.scheme().to_string()))?;
    Ok(url)
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        // No config dir available — use defaults.
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("greenthumb").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
