mod wiring;

use crate::rest::{self, ApiConfig};
use crate::storage::SqliteStorage;
use crate::{cli, context};
use anyhow::{Context as AnyhowContext, Result};
use tokio_util::sync::CancellationToken;

pub struct App {
    pub ctx: context::Context,
    pub storage: SqliteStorage,
}

impl App {
    pub fn from_cli() -> Result<(Self, cli::Cli)> {
        let cli = crate::cli::parse();
        let ctx = context::Context::from_cli(&cli)?;

        crate::tracing::init();
        crate::tracing::set_log_file(ctx.config.log_file.as_deref()).context("opening log file")?;
        log::info!("🚀 Starting research-services");
        log::info!("📂 Data dir: {}", ctx.config.data_dir.to_string_lossy());
        log::info!("🔗 Base URI: {}", ctx.config.base_uri);

        wiring::init_data_dir(&ctx).context("initializing data dir")?;
        let storage = wiring::init_storage(&ctx)?;

        Ok((Self { ctx, storage }, cli))
    }
}

pub async fn run_daemon(app: App) -> Result<()> {
    let cfg = &app.ctx.config;
    log::info!("🌐 REST API: http://{}", cfg.api_listen);
    if let Some(path) = cfg.log_file.as_deref() {
        log::info!("📝 Log file: {}", path.to_string_lossy());
    }

    let shutdown = CancellationToken::new();

    let api_addr = cfg.api_listen;
    let api_config = ApiConfig::from_configuration(cfg);
    let rest_storage = app.storage.clone();
    let rest_shutdown = shutdown.clone();

    let mut rest_handle = tokio::spawn(async move {
        if let Err(e) = rest::serve(api_addr, rest_storage, api_config, rest_shutdown).await {
            log::error!("REST server error: {}", e);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("🧨 Ctrl-C received, shutting down");
        }
        _ = &mut rest_handle => {},
    }

    shutdown.cancel();
    if let Err(e) = rest_handle.await {
        log::error!("REST server error: {}", e);
        return Err(e.into());
    }

    log::info!("✅ Shutdown complete");
    Ok(())
}

pub async fn run() -> Result<()> {
    let (app, cli) = App::from_cli()?;

    if let Some(cmd) = &cli.cmd {
        // one-shot command mode
        cmd.run(&app.ctx)?;
        return Ok(());
    }

    run_daemon(app).await
}
