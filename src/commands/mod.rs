use anyhow::{Context as AnyhowContext, Result};

use crate::cli::Command;
use crate::context;
use crate::storage::SqliteStorage;

pub mod graph;
pub mod seat;
pub mod snapshot;

pub trait CommandRunner {
    fn run(&self, ctx: &context::Context) -> anyhow::Result<()>;
}

impl Command {
    pub fn run(&self, ctx: &context::Context) -> anyhow::Result<()> {
        match self {
            Command::Seat { cmd } => cmd.run(ctx),
            Command::Snapshot { cmd } => cmd.run(ctx),
            Command::Graph { cmd } => cmd.run(ctx),
        }
    }
}

pub(crate) fn open_storage(ctx: &context::Context) -> Result<SqliteStorage> {
    let storage = SqliteStorage::new(ctx.config.db_path());
    storage.init().context("opening storage")?;
    Ok(storage)
}
