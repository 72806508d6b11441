//! Research collections and citable snapshots of them.
//!
//! Freezing a collection copies its items together with the catalogue
//! metadata and rights in force at that moment. The snapshot hash is an
//! HMAC-SHA256 over that state, so later edits to the catalogue or to the
//! stored rows are detectable with [`verify`].

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;

use crate::activity;
use crate::catalogue::{self, INFORMATION_OBJECT};
use crate::error::{ResearchError, Result};
use crate::odrl;
use crate::types::{time::now_timestamp, SnapshotStatus};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SNAPSHOT_KEY: &str = "research_snapshot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub researcher_id: i64,
    pub project_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCollection {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: i64,
    pub collection_id: i64,
    pub object_id: i64,
    pub object_type: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCollectionItem {
    pub object_id: i64,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub id: i64,
    pub project_id: i64,
    pub researcher_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub query_state: Option<Value>,
    pub rights_state: Option<Value>,
    pub metadata: Option<Value>,
    pub item_count: i64,
    pub status: SnapshotStatus,
    pub hash_sha256: Option<String>,
    pub citation_id: Option<String>,
    pub frozen_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSnapshot {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub query_state: Option<Value>,
    #[serde(default)]
    pub rights_state: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotItem {
    pub id: i64,
    pub snapshot_id: i64,
    pub object_id: i64,
    pub object_type: String,
    pub metadata_version: Option<Value>,
    pub rights_snapshot: Option<Value>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub valid: bool,
    pub stored: String,
    pub computed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangedItem {
    pub object_id: i64,
    pub object_type: String,
    pub metadata_before: Option<Value>,
    pub metadata_after: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub added: Vec<SnapshotItem>,
    pub removed: Vec<SnapshotItem>,
    pub changed: Vec<ChangedItem>,
}

fn parse_json(raw: Option<String>) -> Option<Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

fn encode(value: &Option<Value>) -> Result<Option<String>> {
    Ok(value.as_ref().map(serde_json::to_string).transpose()?)
}

// Collections

pub fn create_collection(conn: &Connection, researcher_id: i64, data: &NewCollection) -> Result<Collection> {
    if data.name.trim().is_empty() {
        return Err(ResearchError::invalid("collection name is required"));
    }
    conn.execute(
        "INSERT INTO collection (researcher_id, project_id, name, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![researcher_id, data.project_id, data.name.trim(), data.description, now_timestamp()],
    )?;
    load_collection(conn, conn.last_insert_rowid())
}

pub fn load_collection(conn: &Connection, id: i64) -> Result<Collection> {
    conn.query_row(
        "SELECT id, researcher_id, project_id, name, description, created_at FROM collection WHERE id = ?1",
        params![id],
        |row| {
            Ok(Collection {
                id: row.get(0)?,
                researcher_id: row.get(1)?,
                project_id: row.get(2)?,
                name: row.get(3)?,
                description: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| ResearchError::not_found(format!("collection {id}")))
}

/// Adds an object to a collection owned by `researcher_id`. Items append
/// to the end unless a sort order is given.
pub fn add_item(
    conn: &Connection,
    collection_id: i64,
    researcher_id: i64,
    item: &NewCollectionItem,
) -> Result<CollectionItem> {
    let collection = load_collection(conn, collection_id)?;
    if collection.researcher_id != researcher_id {
        return Err(ResearchError::Forbidden(format!(
            "collection {collection_id} belongs to another researcher"
        )));
    }
    let object_type = item
        .object_type
        .clone()
        .unwrap_or_else(|| INFORMATION_OBJECT.to_string());
    let sort_order = match item.sort_order {
        Some(order) => order,
        None => conn.query_row(
            "SELECT COUNT(*) FROM collection_item WHERE collection_id = ?1",
            params![collection_id],
            |row| row.get(0),
        )?,
    };
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO collection_item (collection_id, object_id, object_type, sort_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![collection_id, item.object_id, object_type, sort_order, now_timestamp()],
    )?;
    if inserted == 0 {
        return Err(ResearchError::conflict(format!(
            "{object_type} {} is already in collection {collection_id}",
            item.object_id
        )));
    }
    Ok(CollectionItem {
        id: conn.last_insert_rowid(),
        collection_id,
        object_id: item.object_id,
        object_type,
        sort_order,
    })
}

pub fn collection_items(conn: &Connection, collection_id: i64) -> Result<Vec<CollectionItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, collection_id, object_id, object_type, sort_order
         FROM collection_item WHERE collection_id = ?1 ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map(params![collection_id], |row| {
            Ok(CollectionItem {
                id: row.get(0)?,
                collection_id: row.get(1)?,
                object_id: row.get(2)?,
                object_type: row.get(3)?,
                sort_order: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// Snapshots

const COLUMNS: &str = "id, project_id, researcher_id, title, description, query_state_json, rights_state_json,
    metadata_json, item_count, status, hash_sha256, citation_id, frozen_at, created_at";

fn map_snapshot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Snapshot> {
    Ok(Snapshot {
        id: row.get(0)?,
        project_id: row.get(1)?,
        researcher_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        query_state: parse_json(row.get(5)?),
        rights_state: parse_json(row.get(6)?),
        metadata: parse_json(row.get(7)?),
        item_count: row.get(8)?,
        status: row.get(9)?,
        hash_sha256: row.get(10)?,
        citation_id: row.get(11)?,
        frozen_at: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn map_item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SnapshotItem> {
    Ok(SnapshotItem {
        id: row.get(0)?,
        snapshot_id: row.get(1)?,
        object_id: row.get(2)?,
        object_type: row.get(3)?,
        metadata_version: parse_json(row.get(4)?),
        rights_snapshot: parse_json(row.get(5)?),
        sort_order: row.get(6)?,
    })
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<Snapshot>> {
    let sql = format!("SELECT {COLUMNS} FROM snapshot WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], map_snapshot_row).optional()?)
}

pub fn get(conn: &Connection, id: i64) -> Result<Snapshot> {
    find(conn, id)?.ok_or_else(|| ResearchError::not_found(format!("snapshot {id}")))
}

pub fn items(conn: &Connection, snapshot_id: i64) -> Result<Vec<SnapshotItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, snapshot_id, object_id, object_type, metadata_version_json, rights_snapshot_json, sort_order
         FROM snapshot_item WHERE snapshot_id = ?1 ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map(params![snapshot_id], map_item_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_for_project(conn: &Connection, project_id: i64) -> Result<Vec<Snapshot>> {
    let sql = format!("SELECT {COLUMNS} FROM snapshot WHERE project_id = ?1 ORDER BY created_at DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![project_id], map_snapshot_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn create(conn: &Connection, project_id: i64, researcher_id: i64, data: &NewSnapshot) -> Result<Snapshot> {
    if data.title.trim().is_empty() {
        return Err(ResearchError::invalid("snapshot title is required"));
    }
    conn.execute(
        "INSERT INTO snapshot (project_id, researcher_id, title, description, query_state_json,
            rights_state_json, metadata_json, item_count, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 'active', ?8)",
        params![
            project_id,
            researcher_id,
            data.title.trim(),
            data.description,
            encode(&data.query_state)?,
            encode(&data.rights_state)?,
            encode(&data.metadata)?,
            now_timestamp()
        ],
    )?;
    let id = conn.last_insert_rowid();
    activity::log_event(
        conn,
        Some(researcher_id),
        Some(project_id),
        "snapshot_created",
        "snapshot",
        id,
        Some(data.title.trim()),
    )?;
    get(conn, id)
}

/// Catalogue label and description of the object as it reads now.
fn metadata_version(conn: &Connection, object_type: &str, object_id: i64) -> Result<Option<String>> {
    let entity = catalogue::find(conn, object_type, object_id)?;
    Ok(entity
        .map(|e| serde_json::to_string(&json!({"label": e.label, "description": e.description})))
        .transpose()?)
}

fn rights_snapshot(conn: &Connection, object_type: &str, object_id: i64) -> Result<Option<String>> {
    let policies = odrl::policies_for(conn, object_type, object_id)?;
    if policies.is_empty() {
        return Ok(None);
    }
    let odrl: Vec<Value> = policies
        .iter()
        .map(|p| {
            json!({
                "policy_type": p.policy_type,
                "action_type": p.action_type,
                "constraints": p.constraints,
            })
        })
        .collect();
    Ok(Some(serde_json::to_string(&json!({ "odrl": odrl }))?))
}

pub fn citation_for(project_id: i64, snapshot_id: i64, hash: &str) -> String {
    let short: String = hash.chars().take(8).collect();
    format!("SNAP-{project_id}-{snapshot_id}-{short}")
}

/// Copies a collection into a new frozen snapshot and seals it.
pub fn freeze_collection(
    conn: &Connection,
    project_id: i64,
    collection_id: i64,
    researcher_id: i64,
    key: &str,
) -> Result<Snapshot> {
    let collection = load_collection(conn, collection_id)?;
    let title = format!("{} (Snapshot)", collection.name);
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO snapshot (project_id, researcher_id, title, description, item_count, status, frozen_at, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, 'frozen', ?5, ?5)",
        params![project_id, researcher_id, title, collection.description, now],
    )?;
    let snapshot_id = conn.last_insert_rowid();

    let members = collection_items(conn, collection_id)?;
    for item in &members {
        conn.execute(
            "INSERT INTO snapshot_item (snapshot_id, object_id, object_type, metadata_version_json,
                rights_snapshot_json, sort_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                snapshot_id,
                item.object_id,
                item.object_type,
                metadata_version(conn, &item.object_type, item.object_id)?,
                rights_snapshot(conn, &item.object_type, item.object_id)?,
                item.sort_order,
                now
            ],
        )?;
    }

    let hash = compute_hash(conn, snapshot_id, key)?;
    let citation = citation_for(project_id, snapshot_id, &hash);
    conn.execute(
        "UPDATE snapshot SET item_count = ?1, hash_sha256 = ?2, citation_id = ?3 WHERE id = ?4",
        params![members.len() as i64, hash, citation, snapshot_id],
    )?;
    activity::log_event(
        conn,
        Some(researcher_id),
        Some(project_id),
        "snapshot_created",
        "snapshot",
        snapshot_id,
        Some(&title),
    )?;
    log::info!("🧊 Froze collection {} as snapshot {} ({})", collection_id, snapshot_id, citation);
    get(conn, snapshot_id)
}

/// Signed payload over the stored JSON text of the snapshot and its items.
fn hash_payload(conn: &Connection, snapshot_id: i64) -> Result<String> {
    let state: Option<(Option<String>, Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT query_state_json, rights_state_json, metadata_json FROM snapshot WHERE id = ?1",
            params![snapshot_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let (query_state, rights_state, metadata) =
        state.ok_or_else(|| ResearchError::not_found(format!("snapshot {snapshot_id}")))?;

    let mut parts = vec![
        format!("qs:{}", query_state.unwrap_or_default()),
        format!("rs:{}", rights_state.unwrap_or_default()),
        format!("md:{}", metadata.unwrap_or_default()),
    ];
    let mut stmt = conn.prepare(
        "SELECT object_id, object_type, metadata_version_json, rights_snapshot_json
         FROM snapshot_item WHERE snapshot_id = ?1 ORDER BY object_id ASC, object_type ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![snapshot_id], |row| {
            Ok(format!(
                "{}:{}:{}:{}",
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                row.get::<_, Option<String>>(3)?.unwrap_or_default()
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    parts.extend(rows);
    Ok(parts.join("|"))
}

pub fn compute_hash(conn: &Connection, snapshot_id: i64, key: &str) -> Result<String> {
    let payload = hash_payload(conn, snapshot_id)?;
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| ResearchError::invalid(format!("snapshot key: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify(conn: &Connection, snapshot_id: i64, key: &str) -> Result<Verification> {
    let snapshot = get(conn, snapshot_id)?;
    let stored = snapshot.hash_sha256.unwrap_or_default();
    let computed = compute_hash(conn, snapshot_id, key)?;
    Ok(Verification {
        valid: stored == computed,
        stored,
        computed,
    })
}

/// Returns the stable citation id, storing it on first use.
pub fn citation(conn: &Connection, snapshot_id: i64, key: &str) -> Result<String> {
    let snapshot = get(conn, snapshot_id)?;
    let hash = match snapshot.hash_sha256.filter(|h| !h.is_empty()) {
        Some(hash) => hash,
        None => compute_hash(conn, snapshot_id, key)?,
    };
    let id = citation_for(snapshot.project_id, snapshot_id, &hash);
    if snapshot.citation_id.map_or(true, |c| c.is_empty()) {
        conn.execute(
            "UPDATE snapshot SET citation_id = ?1 WHERE id = ?2",
            params![id, snapshot_id],
        )?;
    }
    Ok(id)
}

/// Items of `b` against `a`, keyed by object id. Changed means the stored
/// metadata version differs.
pub fn compare(conn: &Connection, a: i64, b: i64) -> Result<Comparison> {
    let newer = get(conn, b)?;
    get(conn, a)?;
    let before: BTreeMap<i64, SnapshotItem> = items(conn, a)?.into_iter().map(|i| (i.object_id, i)).collect();
    let mut after: BTreeMap<i64, SnapshotItem> = items(conn, b)?.into_iter().map(|i| (i.object_id, i)).collect();

    let mut removed = Vec::new();
    let mut changed = Vec::new();
    for (object_id, old) in before {
        match after.remove(&object_id) {
            None => removed.push(old),
            Some(new) if new.metadata_version != old.metadata_version => changed.push(ChangedItem {
                object_id,
                object_type: new.object_type,
                metadata_before: old.metadata_version,
                metadata_after: new.metadata_version,
            }),
            Some(_) => {}
        }
    }
    let added = after.into_values().collect();

    activity::log_event(
        conn,
        Some(newer.researcher_id),
        Some(newer.project_id),
        "snapshot_compared",
        "snapshot",
        b,
        Some(&format!("Compared snapshot #{a} with #{b}")),
    )?;
    Ok(Comparison { added, removed, changed })
}

fn ensure_not_frozen(snapshot: &Snapshot) -> Result<()> {
    if snapshot.status == SnapshotStatus::Frozen {
        return Err(ResearchError::conflict(format!(
            "snapshot {} is frozen and cannot be modified",
            snapshot.id
        )));
    }
    Ok(())
}

fn ensure_owner(snapshot: &Snapshot, researcher_id: i64) -> Result<()> {
    if snapshot.researcher_id != researcher_id {
        return Err(ResearchError::Forbidden(format!(
            "snapshot {} belongs to another researcher",
            snapshot.id
        )));
    }
    Ok(())
}

pub fn archive(conn: &Connection, id: i64, researcher_id: i64) -> Result<Snapshot> {
    let snapshot = get(conn, id)?;
    ensure_owner(&snapshot, researcher_id)?;
    ensure_not_frozen(&snapshot)?;
    let updated = conn.execute(
        "UPDATE snapshot SET status = 'archived' WHERE id = ?1 AND status = 'active'",
        params![id],
    )?;
    if updated == 0 {
        return Err(ResearchError::conflict(format!("snapshot {id} is already archived")));
    }
    get(conn, id)
}

pub fn delete(conn: &Connection, id: i64, researcher_id: i64) -> Result<()> {
    let snapshot = get(conn, id)?;
    ensure_owner(&snapshot, researcher_id)?;
    ensure_not_frozen(&snapshot)?;
    conn.execute("DELETE FROM snapshot_item WHERE snapshot_id = ?1", params![id])?;
    conn.execute("DELETE FROM snapshot WHERE id = ?1", params![id])?;
    Ok(())
}
