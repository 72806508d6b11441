mod args;
mod command;

pub use args::Cli;
pub use command::{Command, GraphCmd, GraphFormat, SeatCmd, SnapshotCmd};

pub use args::parse;
