#![allow(dead_code)]

use std::path::Path;
use std::process::Command as ProcCommand;

use research_services::reading_room::{self, NewRoom};
use research_services::storage::{SqliteStorage, Storage};
use tempfile::TempDir;

pub fn base_cmd(data_dir: &TempDir) -> ProcCommand {
    let mut command = ProcCommand::new(env!("CARGO_BIN_EXE_research-services"));
    command
        .env("DOTENV_PATH", data_dir.path().join(".env"))
        .env_remove("RESEARCH_SNAPSHOT_KEY")
        .arg("--data-dir")
        .arg(data_dir.path());
    command
}

pub fn storage(data_dir: &Path) -> SqliteStorage {
    let storage = SqliteStorage::new(data_dir.join("research.sqlite"));
    storage.init().expect("init storage");
    storage
}

pub fn seed_room(data_dir: &Path, name: &str) -> i64 {
    storage(data_dir)
        .write(|conn| {
            reading_room::create_room(
                conn,
                &NewRoom {
                    name: name.into(),
                    code: None,
                    capacity: 10,
                },
            )
        })
        .expect("create room")
        .id
}
