//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, RegistryOverride, RenderersArgs, ServeArgs, ServeOverrides};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::{
    engine::NetworkIdle,
    pool::PoolConfig,
    render::RenderConfig,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pressroom";
const ENV_PREFIX: &str = "PRESSROOM";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_PARALLEL_CONTEXTS: u64 = 2;
const DEFAULT_LAUNCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CLOSE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_REGISTRY_PATH: &str = "./render-config.json";
const DEFAULT_READY_SELECTOR: &str = "#ready";
const DEFAULT_READY_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_NETWORK_IDLE_MS: u64 = 500;
const DEFAULT_NETWORK_IDLE_MAX_INFLIGHT: usize = 2;
const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CORS_ORIGINS: &str = "*";
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 60;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub browser: BrowserSettings,
    pub render: RenderSettings,
    pub cors: CorsSettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub environment: DeployEnvironment,
    /// Trust `X-Forwarded-For` when identifying clients.
    pub trust_proxy: bool,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployEnvironment {
    Development,
    Production,
}

impl DeployEnvironment {
    pub fn is_development(self) -> bool {
        matches!(self, DeployEnvironment::Development)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeployEnvironment::Development => "development",
            DeployEnvironment::Production => "production",
        }
    }
}

impl FromStr for DeployEnvironment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(DeployEnvironment::Development),
            "production" | "prod" => Ok(DeployEnvironment::Production),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub max_parallel_contexts: NonZeroUsize,
    pub executable: Option<PathBuf>,
    pub no_sandbox: bool,
    pub launch_timeout: Duration,
    pub close_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub registry_path: PathBuf,
    pub ready_selector: String,
    pub ready_poll_interval: Duration,
    pub network_idle: NetworkIdle,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            AllowedOrigins::Any => true,
            AllowedOrigins::List(origins) => {
                let origin = origin.trim_end_matches('/');
                origins.iter().any(|allowed| allowed == origin)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsSettings {
    pub origins: AllowedOrigins,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
}

impl From<&BrowserSettings> for PoolConfig {
    fn from(browser: &BrowserSettings) -> Self {
        PoolConfig {
            max_sessions: browser.max_parallel_contexts,
            close_timeout: browser.close_timeout,
        }
    }
}

impl From<&RenderSettings> for RenderConfig {
    fn from(render: &RenderSettings) -> Self {
        RenderConfig {
            ready_selector: render.ready_selector.clone(),
            ready_poll_interval: render.ready_poll_interval,
            network_idle: render.network_idle,
            timeout: render.timeout,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Renderers(args)) => raw.apply_registry_override(&args.registry),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    browser: RawBrowserSettings,
    render: RawRenderSettings,
    cors: RawCorsSettings,
    rate_limit: RawRateLimitSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(environment) = overrides.environment.as_ref() {
            self.server.environment = Some(environment.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(count) = overrides.max_parallel_contexts {
            self.browser.max_parallel_contexts = Some(count);
        }
        if let Some(path) = overrides.browser_executable.as_ref() {
            self.browser.executable = Some(path.clone());
        }
        if let Some(seconds) = overrides.render_timeout_seconds {
            self.render.timeout_seconds = Some(seconds);
        }
        if let Some(enabled) = overrides.rate_limit {
            self.rate_limit.enabled = Some(enabled);
        }
        self.apply_registry_override(&overrides.registry);
    }

    fn apply_registry_override(&mut self, overrides: &RegistryOverride) {
        if let Some(path) = overrides.registry_path.as_ref() {
            self.render.registry_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            browser,
            render,
            cors,
            rate_limit,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            browser: build_browser_settings(browser)?,
            render: build_render_settings(render)?,
            cors: build_cors_settings(cors),
            rate_limit: build_rate_limit_settings(rate_limit)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let environment = match server.environment {
        Some(value) => DeployEnvironment::from_str(&value)
            .map_err(|reason| LoadError::invalid("server.environment", reason))?,
        None => DeployEnvironment::Development,
    };

    let shutdown_secs = server
        .shutdown_timeout_seconds
        .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS);
    if shutdown_secs == 0 {
        return Err(LoadError::invalid(
            "server.shutdown_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        environment,
        trust_proxy: server.trust_proxy.unwrap_or(false),
        shutdown_timeout: Duration::from_secs(shutdown_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_browser_settings(browser: RawBrowserSettings) -> Result<BrowserSettings, LoadError> {
    let contexts = browser
        .max_parallel_contexts
        .unwrap_or(DEFAULT_MAX_PARALLEL_CONTEXTS);
    let contexts = usize::try_from(contexts)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid("browser.max_parallel_contexts", "must be greater than zero")
        })?;

    let executable = browser.executable.filter(|path| !path.as_os_str().is_empty());

    Ok(BrowserSettings {
        max_parallel_contexts: contexts,
        executable,
        no_sandbox: browser.no_sandbox.unwrap_or(false),
        launch_timeout: positive_secs(
            browser.launch_timeout_seconds,
            DEFAULT_LAUNCH_TIMEOUT_SECS,
            "browser.launch_timeout_seconds",
        )?,
        close_timeout: positive_secs(
            browser.close_timeout_seconds,
            DEFAULT_CLOSE_TIMEOUT_SECS,
            "browser.close_timeout_seconds",
        )?,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let registry_path = render
        .registry_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REGISTRY_PATH));

    let ready_selector = render
        .ready_selector
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_READY_SELECTOR.to_string());
    if ready_selector.is_empty() {
        return Err(LoadError::invalid(
            "render.ready_selector",
            "selector must not be empty",
        ));
    }

    let poll_ms = render
        .ready_poll_interval_ms
        .unwrap_or(DEFAULT_READY_POLL_INTERVAL_MS);
    if poll_ms == 0 {
        return Err(LoadError::invalid(
            "render.ready_poll_interval_ms",
            "must be greater than zero",
        ));
    }

    let network_idle = NetworkIdle {
        max_inflight: render
            .network_idle_max_inflight
            .unwrap_or(DEFAULT_NETWORK_IDLE_MAX_INFLIGHT),
        window: Duration::from_millis(render.network_idle_ms.unwrap_or(DEFAULT_NETWORK_IDLE_MS)),
    };

    let timeout = match render.timeout_seconds.unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS) {
        0 => None,
        seconds => Some(Duration::from_secs(seconds)),
    };

    Ok(RenderSettings {
        registry_path,
        ready_selector,
        ready_poll_interval: Duration::from_millis(poll_ms),
        network_idle,
        timeout,
    })
}

fn build_cors_settings(cors: RawCorsSettings) -> CorsSettings {
    let raw = cors
        .origins
        .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string());
    let entries: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.trim_end_matches('/').to_string())
        .collect();

    let origins = if entries.is_empty() || entries.iter().any(|entry| entry == "*") {
        AllowedOrigins::Any
    } else {
        AllowedOrigins::List(entries)
    };

    CorsSettings { origins }
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let window_seconds_val = rate_limit
        .window_seconds
        .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS);
    let window_seconds = non_zero_u32(window_seconds_val, "rate_limit.window_seconds")?;

    let max_requests_val = rate_limit
        .max_requests
        .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS);
    let max_requests = non_zero_u32(max_requests_val, "rate_limit.max_requests")?;

    Ok(RateLimitSettings {
        enabled: rate_limit.enabled.unwrap_or(false),
        window_seconds,
        max_requests,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    environment: Option<String>,
    trust_proxy: Option<bool>,
    shutdown_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrowserSettings {
    max_parallel_contexts: Option<u64>,
    executable: Option<PathBuf>,
    no_sandbox: Option<bool>,
    launch_timeout_seconds: Option<u64>,
    close_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    registry_path: Option<PathBuf>,
    ready_selector: Option<String>,
    ready_poll_interval_ms: Option<u64>,
    network_idle_ms: Option<u64>,
    network_idle_max_inflight: Option<usize>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCorsSettings {
    /// Comma-separated origins; `*` allows any.
    origins: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    enabled: Option<bool>,
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_secs(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        seconds => Ok(Duration::from_secs(seconds)),
    }
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;
