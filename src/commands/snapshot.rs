use anyhow::{bail, Context as AnyhowContext, Result};

use super::{open_storage, CommandRunner};
use crate::storage::Storage;
use crate::{cli, context, snapshot};

impl CommandRunner for cli::SnapshotCmd {
    fn run(&self, ctx: &context::Context) -> Result<()> {
        let storage = open_storage(ctx)?;
        let key = ctx.config.snapshot_key.as_str();
        match self {
            cli::SnapshotCmd::Verify { id } => {
                let verification = storage
                    .read(|conn| snapshot::verify(conn, *id, key))
                    .with_context(|| format!("verifying snapshot {id}"))?;
                println!("{}", serde_json::to_string_pretty(&verification)?);
                if !verification.valid {
                    bail!("snapshot {id} hash mismatch");
                }
                log::info!("✅ Snapshot {} verified", id);
                Ok(())
            }
            cli::SnapshotCmd::Cite { id } => {
                let citation = storage
                    .write(|conn| snapshot::citation(conn, *id, key))
                    .with_context(|| format!("citing snapshot {id}"))?;
                println!("{citation}");
                Ok(())
            }
        }
    }
}
