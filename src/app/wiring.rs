use anyhow::{Context, Result};

use crate::context;
use crate::storage::SqliteStorage;

pub fn init_data_dir(ctx: &context::Context) -> Result<()> {
    std::fs::create_dir_all(&ctx.config.data_dir)?;
    Ok(())
}

pub fn init_storage(ctx: &context::Context) -> Result<SqliteStorage> {
    let db_path = ctx.config.db_path();
    log::debug!("opening {}", db_path.display());
    let sqlite = SqliteStorage::new(&db_path);
    if ctx.config.reset {
        log::warn!("🧹 Resetting storage at {}", db_path.display());
        sqlite.reset_all().context("resetting storage")?;
    }
    sqlite.init().context("initializing storage")?;
    Ok(sqlite)
}
