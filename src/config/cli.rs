use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the pressroom binary.
#[derive(Debug, Parser)]
#[command(name = "pressroom", version, about = "Headless browser PDF rendering service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PRESSROOM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP render service.
    Serve(Box<ServeArgs>),
    /// Load the renderer registry and print the configured renderers.
    #[command(name = "renderers")]
    Renderers(RenderersArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RegistryOverride {
    /// Override the renderer registry file.
    #[arg(long = "registry-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub registry_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderersArgs {
    #[command(flatten)]
    pub registry: RegistryOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub registry: RegistryOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the deployment environment (development|production).
    #[arg(long = "environment", value_name = "ENV")]
    pub environment: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override how many browser contexts may be open at once.
    #[arg(long = "max-parallel-contexts", value_name = "COUNT")]
    pub max_parallel_contexts: Option<u64>,

    /// Override the browser executable.
    #[arg(long = "browser-executable", value_name = "PATH", value_hint = ValueHint::ExecutablePath)]
    pub browser_executable: Option<PathBuf>,

    /// Override the per-render deadline; 0 disables it.
    #[arg(long = "render-timeout-seconds", value_name = "SECONDS")]
    pub render_timeout_seconds: Option<u64>,

    /// Toggle request rate limiting.
    #[arg(
        long = "rate-limit",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub rate_limit: Option<bool>,
}
