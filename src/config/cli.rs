use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the `mermaid-cache` binary.
#[derive(Debug, Parser)]
#[command(
    name = "mermaid-cache",
    version,
    about = "Session cache for rendered Mermaid diagrams"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "MERMAID_CACHE_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the SVG for a diagram, rendering it with the Mermaid CLI on a cache miss.
    Render(DiagramArgs),
    /// Print the cached SVG for a diagram; exits with status 1 on a miss.
    Get(DiagramArgs),
    /// Print the session storage key used for a diagram.
    Key(DiagramArgs),
    /// Remove every diagram cache entry from the session.
    Clear(SessionArgs),
    /// Remove expired and undecodable diagram cache entries from the session.
    Prune(SessionArgs),
}

impl Command {
    pub fn overrides(&self) -> &Overrides {
        match self {
            Command::Render(args) | Command::Get(args) | Command::Key(args) => &args.overrides,
            Command::Clear(args) | Command::Prune(args) => &args.overrides,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct DiagramArgs {
    #[command(flatten)]
    pub overrides: Overrides,

    /// File holding the diagram source; `-` reads standard input.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SessionArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the Mermaid CLI executable path used for diagram rendering.
    #[arg(long = "render-mermaid-cli-path", value_name = "PATH")]
    pub mermaid_cli_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    #[command(flatten)]
    pub render: RenderOverrides,

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

    /// Override the session file backing the cache.
    #[arg(long = "session-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub session_file: Option<PathBuf>,

    /// Override the session storage quota in bytes.
    #[arg(long = "storage-max-bytes", value_name = "BYTES")]
    pub storage_max_bytes: Option<u64>,

    /// Override the cache entry lifetime in milliseconds.
    #[arg(long = "cache-ttl-ms", value_name = "MILLISECONDS")]
    pub cache_ttl_ms: Option<u64>,

    /// Override the key prefix that namespaces cache entries.
    #[arg(long = "cache-prefix", value_name = "PREFIX")]
    pub cache_prefix: Option<String>,
}
