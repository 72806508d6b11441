use std::path::PathBuf;

use anyhow::{Context as AnyhowContext, Result};
use url::Url;

use crate::configuration::Configuration;

pub struct Context {
    pub config: Configuration,
}

impl Context {
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let base_uri = Url::parse(&cli.base_uri)
            .with_context(|| format!("parsing base URI '{}'", cli.base_uri))?;
        let cfg = Configuration {
            data_dir: PathBuf::from(&cli.data_dir),
            reset: cli.reset,
            log_file: cli.log_file.as_ref().map(PathBuf::from),
            api_listen: cli.api_listen,
            api_token: cli.api_token.clone().filter(|t| !t.is_empty()),
            base_uri,
            snapshot_key: cli.snapshot_key.clone(),
        };
        Ok(Self { config: cfg })
    }
}
