//! Status change trail shared by material and reproduction requests.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;
use crate::types::time::now_timestamp;

pub const MATERIAL: &str = "material";
pub const REPRODUCTION: &str = "reproduction";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub id: i64,
    pub request_id: i64,
    pub request_type: String,
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_by: Option<i64>,
    pub notes: Option<String>,
    pub created_at: String,
}

pub fn record(
    conn: &Connection,
    request_type: &str,
    request_id: i64,
    old_status: Option<&str>,
    new_status: &str,
    changed_by: Option<i64>,
    notes: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO request_status_history (request_id, request_type, old_status, new_status, changed_by, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![request_id, request_type, old_status, new_status, changed_by, notes, now_timestamp()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Newest change first.
pub fn list(conn: &Connection, request_type: &str, request_id: i64) -> Result<Vec<StatusChange>> {
    let mut stmt = conn.prepare(
        "SELECT id, request_id, request_type, old_status, new_status, changed_by, notes, created_at
         FROM request_status_history WHERE request_type = ?1 AND request_id = ?2
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(params![request_type, request_id], |row| {
            Ok(StatusChange {
                id: row.get(0)?,
                request_id: row.get(1)?,
                request_type: row.get(2)?,
                old_status: row.get(3)?,
                new_status: row.get(4)?,
                changed_by: row.get(5)?,
                notes: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
