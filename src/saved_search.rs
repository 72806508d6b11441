//! Saved catalogue searches with result snapshots and new-result diffs.

use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::catalogue::{self, EntitySearch};
use crate::error::{ResearchError, Result};
use crate::notifications;
use crate::types::time::now_timestamp;

/// Upper bound on the ids captured per execution.
pub const MAX_TRACKED_RESULTS: i64 = 5_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub repository_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedSearch {
    pub id: i64,
    pub researcher_id: i64,
    pub name: String,
    pub search_query: String,
    pub filters: SearchFilters,
    pub total_results_at_save: i64,
    pub new_results_count: i64,
    pub alert_enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSavedSearch {
    pub name: String,
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub alert_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSnapshot {
    pub id: i64,
    pub saved_search_id: i64,
    pub result_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchDiff {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
    pub unchanged_count: usize,
    pub previous_count: usize,
    pub current_count: usize,
    pub new_results_count: i64,
    /// Whether a `search_alert` notification was stored for this diff.
    pub alert_sent: bool,
}

pub const SEARCH_ALERT: &str = "search_alert";

const COLUMNS: &str = "id, researcher_id, name, search_query, search_filters_json, total_results_at_save,
    new_results_count, alert_enabled, created_at, updated_at";

fn map_saved_search_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SavedSearch> {
    let filters: String = row.get(4)?;
    Ok(SavedSearch {
        id: row.get(0)?,
        researcher_id: row.get(1)?,
        name: row.get(2)?,
        search_query: row.get(3)?,
        filters: serde_json::from_str(&filters).unwrap_or_default(),
        total_results_at_save: row.get(5)?,
        new_results_count: row.get(6)?,
        alert_enabled: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<SavedSearch> {
    let sql = format!("SELECT {COLUMNS} FROM saved_search WHERE id = ?1");
    conn.query_row(&sql, params![id], map_saved_search_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("saved search {id}")))
}

/// Ids of the catalogue entities the search currently matches, ascending.
pub fn execute(conn: &Connection, search: &SavedSearch) -> Result<Vec<i64>> {
    let query = EntitySearch {
        query: search.search_query.clone(),
        entity_type: search.filters.entity_type.clone(),
        repository_id: search.filters.repository_id,
    };
    let mut ids: Vec<i64> = catalogue::search(conn, &query, MAX_TRACKED_RESULTS)?
        .into_iter()
        .map(|e| e.entity_id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Saves the search with its current result count as the baseline.
pub fn create(conn: &Connection, researcher_id: i64, data: &NewSavedSearch) -> Result<SavedSearch> {
    if data.name.trim().is_empty() {
        return Err(ResearchError::invalid("saved search name is required"));
    }
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO saved_search (researcher_id, name, search_query, search_filters_json, alert_enabled,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            researcher_id,
            data.name.trim(),
            data.search_query.trim(),
            serde_json::to_string(&data.filters)?,
            data.alert_enabled,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();
    let saved = get(conn, id)?;
    let total = execute(conn, &saved)?.len() as i64;
    conn.execute(
        "UPDATE saved_search SET total_results_at_save = ?1 WHERE id = ?2",
        params![total, id],
    )?;
    get(conn, id)
}

pub fn list(conn: &Connection, researcher_id: i64) -> Result<Vec<SavedSearch>> {
    let sql = format!("SELECT {COLUMNS} FROM saved_search WHERE researcher_id = ?1 ORDER BY created_at DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![researcher_id], map_saved_search_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn delete(conn: &Connection, id: i64, researcher_id: i64) -> Result<()> {
    let removed = conn.execute(
        "DELETE FROM saved_search WHERE id = ?1 AND researcher_id = ?2",
        params![id, researcher_id],
    )?;
    if removed == 0 {
        return Err(ResearchError::not_found(format!("saved search {id}")));
    }
    Ok(())
}

/// Records the current result ids and makes them the new baseline.
pub fn snapshot(conn: &Connection, id: i64) -> Result<ResultSnapshot> {
    let saved = get(conn, id)?;
    let ids = execute(conn, &saved)?;
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO search_result_snapshot (saved_search_id, result_ids_json, result_count, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![id, serde_json::to_string(&ids)?, ids.len() as i64, now],
    )?;
    let snapshot_id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE saved_search SET total_results_at_save = ?1, new_results_count = 0, updated_at = ?2 WHERE id = ?3",
        params![ids.len() as i64, now, id],
    )?;
    log::debug!("saved search {} snapshot holds {} results", id, ids.len());
    Ok(ResultSnapshot {
        id: snapshot_id,
        saved_search_id: id,
        result_count: ids.len() as i64,
        created_at: now,
    })
}

fn latest_result_ids(conn: &Connection, id: i64) -> Result<Vec<i64>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT result_ids_json FROM search_result_snapshot
             WHERE saved_search_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

/// Compares current results with the latest snapshot. Without a snapshot
/// every current result counts as added. Searches with alerts enabled
/// notify their owner when new results appeared since the baseline.
pub fn diff(conn: &Connection, id: i64) -> Result<SearchDiff> {
    let saved = get(conn, id)?;
    let previous: BTreeSet<i64> = latest_result_ids(conn, id)?.into_iter().collect();
    let current: BTreeSet<i64> = execute(conn, &saved)?.into_iter().collect();

    let added: Vec<i64> = current.difference(&previous).copied().collect();
    let removed: Vec<i64> = previous.difference(&current).copied().collect();
    let unchanged_count = current.intersection(&previous).count();
    let new_results_count = (current.len() as i64 - saved.total_results_at_save).max(0);

    conn.execute(
        "UPDATE saved_search SET new_results_count = ?1, updated_at = ?2 WHERE id = ?3",
        params![new_results_count, now_timestamp(), id],
    )?;

    let mut alert_sent = false;
    if saved.alert_enabled && new_results_count > 0 {
        let title = format!("{} new results for \"{}\"", new_results_count, saved.name);
        let link = format!("/research/saved-searches/{id}");
        alert_sent = notifications::notify(
            conn,
            saved.researcher_id,
            SEARCH_ALERT,
            &title,
            Some(saved.search_query.as_str()),
            Some(link.as_str()),
        )?
        .is_some();
    }
    Ok(SearchDiff {
        added,
        removed,
        unchanged_count,
        previous_count: previous.len(),
        current_count: current.len(),
        new_results_count,
        alert_sent,
    })
}
