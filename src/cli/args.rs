use clap::Parser;
use std::env;

use crate::cli::command::Command;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Research workspace services for an archival catalogue",
    long_about = "Serves the research workspace HTTP API (annotations, assertions, entity resolution, rights, validation, snapshots, reading rooms) or runs one-shot administrative commands against the same database.",
    subcommand_required = false,
    arg_required_else_help = false
)]
pub struct Cli {
    #[arg(
        long,
        env = "RESEARCH_DATA_DIR",
        default_value = ".research/",
        value_name = "DIR",
        help = "Directory holding research.sqlite"
    )]
    pub data_dir: String,

    #[arg(
        long,
        default_value_t = false,
        help = "Delete the SQLite database before starting"
    )]
    pub reset: bool,

    #[arg(
        long = "log-file",
        env = "RESEARCH_LOG_FILE",
        value_name = "PATH",
        help = "Write logs to PATH (in addition to stderr)"
    )]
    pub log_file: Option<String>,

    #[arg(
        long = "api-listen",
        env = "RESEARCH_API_LISTEN",
        value_name = "ADDR",
        default_value = "127.0.0.1:8084",
        help = "HTTP API listen address (host:port)"
    )]
    pub api_listen: std::net::SocketAddr,

    #[arg(
        long = "api-token",
        env = "RESEARCH_API_TOKEN",
        value_name = "TOKEN",
        help = "Require this token (x-api-key or Bearer) on every route except /health"
    )]
    pub api_token: Option<String>,

    #[arg(
        long = "base-uri",
        env = "RESEARCH_BASE_URI",
        value_name = "URL",
        default_value = "http://localhost",
        help = "Base URI used to mint annotation and IIIF identifiers"
    )]
    pub base_uri: String,

    #[arg(
        long = "snapshot-key",
        env = "RESEARCH_SNAPSHOT_KEY",
        value_name = "KEY",
        default_value = crate::snapshot::DEFAULT_SNAPSHOT_KEY,
        help = "HMAC key for snapshot integrity hashes"
    )]
    pub snapshot_key: String,

    #[command(subcommand)]
    pub cmd: Option<Command>,
}

pub fn parse() -> Cli {
    let dotenv_path = env::var("DOTENV_PATH").unwrap_or(".env".into());
    if dotenvy::from_filename(&dotenv_path).is_ok() {
        eprintln!("Loaded env from {}", dotenv_path);
    }
    Cli::parse()
}
