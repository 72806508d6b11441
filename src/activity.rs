use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::time::now_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub researcher_id: Option<i64>,
    pub project_id: Option<i64>,
    pub activity_type: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub title: Option<String>,
    pub created_at: String,
}

const TITLE_MAX_CHARS: usize = 200;

pub fn log_event(
    conn: &Connection,
    researcher_id: Option<i64>,
    project_id: Option<i64>,
    activity_type: &str,
    entity_type: &str,
    entity_id: i64,
    title: Option<&str>,
) -> Result<i64> {
    let title = title.map(|t| t.chars().take(TITLE_MAX_CHARS).collect::<String>());
    conn.execute(
        "INSERT INTO activity_log (researcher_id, project_id, activity_type, entity_type, entity_id, title, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            researcher_id,
            project_id,
            activity_type,
            entity_type,
            entity_id,
            title,
            now_timestamp()
        ],
    )?;
    log::debug!("activity {} on {} {}", activity_type, entity_type, entity_id);
    Ok(conn.last_insert_rowid())
}

fn map_activity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActivityEntry> {
    Ok(ActivityEntry {
        id: row.get(0)?,
        researcher_id: row.get(1)?,
        project_id: row.get(2)?,
        activity_type: row.get(3)?,
        entity_type: row.get(4)?,
        entity_id: row.get(5)?,
        title: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn list_for_project(conn: &Connection, project_id: i64, limit: i64) -> Result<Vec<ActivityEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, researcher_id, project_id, activity_type, entity_type, entity_id, title, created_at
         FROM activity_log WHERE project_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![project_id, limit], map_activity_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_for_entity(conn: &Connection, entity_type: &str, entity_id: i64) -> Result<Vec<ActivityEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, researcher_id, project_id, activity_type, entity_type, entity_id, title, created_at
         FROM activity_log WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(params![entity_type, entity_id], map_activity_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::test_conn;

    #[test]
    fn newest_events_come_first_and_titles_are_truncated() {
        let conn = test_conn();
        log_event(&conn, Some(1), Some(7), "assertion_created", "assertion", 1, Some("first")).unwrap();
        let long = "x".repeat(500);
        log_event(&conn, Some(1), Some(7), "evidence_added", "assertion", 1, Some(&long)).unwrap();
        log_event(&conn, Some(1), Some(8), "assertion_created", "assertion", 2, None).unwrap();

        let entries = list_for_project(&conn, 7, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].activity_type, "evidence_added");
        assert_eq!(entries[0].title.as_ref().map(|t| t.len()), Some(TITLE_MAX_CHARS));

        let for_entity = list_for_entity(&conn, "assertion", 1).unwrap();
        assert_eq!(for_entity.len(), 2);
    }
}
