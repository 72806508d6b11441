use anyhow::{Context as AnyhowContext, Result};
use chrono::Utc;

use super::{open_storage, CommandRunner};
use crate::reading_room::seats;
use crate::storage::Storage;
use crate::types::time::today;
use crate::{cli, context};

impl CommandRunner for cli::SeatCmd {
    fn run(&self, ctx: &context::Context) -> Result<()> {
        let storage = open_storage(ctx)?;
        match self {
            cli::SeatCmd::BulkCreate {
                room,
                pattern,
                seat_type,
                zone,
            } => {
                let created = storage
                    .write(|conn| seats::bulk_create(conn, *room, pattern, *seat_type, zone.as_deref()))
                    .with_context(|| format!("creating seats in room {room}"))?;
                println!("{created}");
                Ok(())
            }
            cli::SeatCmd::Occupancy { room, date } => {
                let day = date.unwrap_or_else(today);
                let at = Utc::now().time();
                let occupancy = storage
                    .read(|conn| seats::occupancy(conn, *room, day, at))
                    .with_context(|| format!("loading occupancy for room {room}"))?;
                println!("{}", serde_json::to_string_pretty(&occupancy)?);
                Ok(())
            }
        }
    }
}
