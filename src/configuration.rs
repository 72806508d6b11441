use std::net::SocketAddr;
use std::path::PathBuf;

use url::Url;

/// Settings resolved once at startup; read-only afterwards.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub data_dir: PathBuf,
    pub reset: bool,
    pub log_file: Option<PathBuf>,
    pub api_listen: SocketAddr,
    pub api_token: Option<String>,
    pub base_uri: Url,
    pub snapshot_key: String,
}

impl Configuration {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("research.sqlite")
    }
}
