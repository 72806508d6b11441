use chrono::NaiveDate;
use clap::{Subcommand, ValueEnum};

use crate::types::SeatType;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(
        about = "Reading-room seat administration",
        long_about = "Create seats in bulk from a pattern such as 'A1-A20' or '1,2,5', and report live occupancy for a room."
    )]
    Seat {
        #[command(subcommand)]
        cmd: SeatCmd,
    },
    #[command(
        about = "Snapshot integrity commands",
        long_about = "Recompute and check a snapshot's HMAC-SHA256 hash, or print its citation string."
    )]
    Snapshot {
        #[command(subcommand)]
        cmd: SnapshotCmd,
    },
    #[command(
        about = "Relationship graph commands",
        long_about = "Export a project's assertion graph as GEXF or GraphML."
    )]
    Graph {
        #[command(subcommand)]
        cmd: GraphCmd,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SeatCmd {
    #[command(about = "Create seats from a range or comma-separated list")]
    BulkCreate {
        #[arg(long, value_name = "ROOM_ID", help = "Reading room id")]
        room: i64,
        #[arg(
            long,
            value_name = "PATTERN",
            help = "Seat numbers, e.g. 'A1-A10', '1-20' or 'M1,M2,M3'"
        )]
        pattern: String,
        #[arg(
            long = "seat-type",
            value_name = "TYPE",
            default_value = "standard",
            help = "Seat type (standard, accessible, computer, microfilm, oversize, quiet, group)"
        )]
        seat_type: SeatType,
        #[arg(long, value_name = "ZONE", help = "Zone label for the new seats")]
        zone: Option<String>,
    },
    #[command(about = "Print seat occupancy for a room")]
    Occupancy {
        #[arg(long, value_name = "ROOM_ID", help = "Reading room id")]
        room: i64,
        #[arg(long, value_name = "YYYY-MM-DD", help = "Day to report (defaults to today)")]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SnapshotCmd {
    #[command(about = "Recompute a snapshot hash and compare it with the stored one")]
    Verify {
        #[arg(long, value_name = "SNAPSHOT_ID")]
        id: i64,
    },
    #[command(about = "Print the citation identifier of a snapshot")]
    Cite {
        #[arg(long, value_name = "SNAPSHOT_ID")]
        id: i64,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Gexf,
    Graphml,
}

#[derive(Subcommand, Debug, Clone)]
pub enum GraphCmd {
    #[command(about = "Write a project's relationship graph to stdout or a file")]
    Export {
        #[arg(long, value_name = "PROJECT_ID")]
        project: i64,
        #[arg(long, value_enum, default_value_t = GraphFormat::Gexf)]
        format: GraphFormat,
        #[arg(long, value_name = "PATH", help = "Write to PATH instead of stdout")]
        output: Option<String>,
    },
}
