use rusqlite::Connection;
use std::path::Path;

use super::traits::{Storage, StorageTx};
use crate::error::Result;

const DB_SCHEMA_VERSION: i64 = 2;

const SCHEMA: &str = r#"
CREATE TABLE researcher (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    orcid_id TEXT,
    institution TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL
);

CREATE TABLE project (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL REFERENCES researcher(id),
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL
);

CREATE TABLE project_collaborator (
    project_id INTEGER NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    researcher_id INTEGER NOT NULL REFERENCES researcher(id),
    role TEXT NOT NULL DEFAULT 'contributor',
    status TEXT NOT NULL DEFAULT 'pending',
    invited_at TEXT NOT NULL,
    accepted_at TEXT,
    PRIMARY KEY (project_id, researcher_id)
);

CREATE TABLE catalogue_entity (
    entity_type TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    label TEXT NOT NULL,
    description TEXT,
    repository_id INTEGER,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (entity_type, entity_id)
);

CREATE TABLE activity_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    researcher_id INTEGER,
    project_id INTEGER,
    activity_type TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    title TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX activity_log_project_idx ON activity_log(project_id, created_at);

CREATE TABLE annotation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    researcher_id INTEGER NOT NULL,
    project_id INTEGER,
    collection_id INTEGER,
    object_id INTEGER,
    motivation TEXT NOT NULL,
    body_json TEXT NOT NULL,
    creator_json TEXT,
    generated_json TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    visibility TEXT NOT NULL DEFAULT 'private',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX annotation_object_idx ON annotation(object_id) WHERE status = 'active';

CREATE TABLE annotation_target (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    annotation_id INTEGER NOT NULL REFERENCES annotation(id) ON DELETE CASCADE,
    source_type TEXT NOT NULL DEFAULT 'information_object',
    source_id INTEGER,
    source_url TEXT,
    selector_type TEXT,
    selector_json TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE assertion (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    researcher_id INTEGER NOT NULL,
    project_id INTEGER,
    subject_type TEXT NOT NULL,
    subject_id INTEGER NOT NULL,
    subject_label TEXT,
    predicate TEXT NOT NULL,
    object_type TEXT,
    object_id INTEGER,
    object_value TEXT,
    object_label TEXT,
    assertion_type TEXT NOT NULL DEFAULT 'attributive',
    status TEXT NOT NULL DEFAULT 'proposed',
    confidence REAL,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX assertion_subject_idx ON assertion(subject_type, subject_id, predicate);
CREATE INDEX assertion_object_idx ON assertion(object_type, object_id);

CREATE TABLE assertion_evidence (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    assertion_id INTEGER NOT NULL REFERENCES assertion(id) ON DELETE CASCADE,
    source_type TEXT NOT NULL,
    source_id INTEGER NOT NULL,
    selector_json TEXT,
    relationship TEXT NOT NULL DEFAULT 'supports',
    note TEXT,
    added_by INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE entity_resolution (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_a_type TEXT NOT NULL,
    entity_a_id INTEGER NOT NULL,
    entity_b_type TEXT NOT NULL,
    entity_b_id INTEGER NOT NULL,
    confidence REAL,
    match_method TEXT,
    status TEXT NOT NULL DEFAULT 'proposed',
    relationship_type TEXT NOT NULL DEFAULT 'sameAs',
    notes TEXT,
    evidence_json TEXT,
    proposer_id INTEGER,
    resolver_id INTEGER,
    resolved_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE rights_policy (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    target_type TEXT NOT NULL,
    target_id INTEGER NOT NULL,
    policy_type TEXT NOT NULL,
    action_type TEXT NOT NULL,
    constraints_json TEXT NOT NULL DEFAULT '[]',
    assigner TEXT,
    assignee TEXT,
    created_by INTEGER,
    created_at TEXT NOT NULL
);
CREATE INDEX rights_policy_target_idx ON rights_policy(target_type, target_id);

CREATE TABLE source_assessment (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    object_id INTEGER NOT NULL,
    researcher_id INTEGER NOT NULL,
    source_type TEXT NOT NULL,
    completeness TEXT NOT NULL,
    quality_metrics_json TEXT NOT NULL DEFAULT '{}',
    trust_score REAL NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE extraction_job (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER,
    researcher_id INTEGER NOT NULL,
    extraction_type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'completed',
    created_at TEXT NOT NULL
);

CREATE TABLE extraction_result (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES extraction_job(id) ON DELETE CASCADE,
    object_id INTEGER NOT NULL,
    result_type TEXT NOT NULL,
    data_json TEXT NOT NULL DEFAULT '{}',
    confidence REAL,
    created_at TEXT NOT NULL
);

CREATE TABLE validation_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    result_id INTEGER NOT NULL REFERENCES extraction_result(id) ON DELETE CASCADE,
    researcher_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    reviewer_id INTEGER,
    reviewed_at TEXT,
    notes TEXT,
    modified_data_json TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX validation_queue_status_idx ON validation_queue(status, result_id);

CREATE TABLE collection (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    researcher_id INTEGER NOT NULL,
    project_id INTEGER,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE collection_item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_id INTEGER NOT NULL REFERENCES collection(id) ON DELETE CASCADE,
    object_id INTEGER NOT NULL,
    object_type TEXT NOT NULL DEFAULT 'information_object',
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (collection_id, object_id, object_type)
);

CREATE TABLE snapshot (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL,
    researcher_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    query_state_json TEXT,
    rights_state_json TEXT,
    metadata_json TEXT,
    item_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'active',
    hash_sha256 TEXT,
    citation_id TEXT,
    frozen_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE snapshot_item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    snapshot_id INTEGER NOT NULL REFERENCES snapshot(id) ON DELETE CASCADE,
    object_id INTEGER NOT NULL,
    object_type TEXT NOT NULL DEFAULT 'information_object',
    metadata_version_json TEXT,
    rights_snapshot_json TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE saved_search (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    researcher_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    search_query TEXT NOT NULL DEFAULT '',
    search_filters_json TEXT NOT NULL DEFAULT '{}',
    total_results_at_save INTEGER NOT NULL DEFAULT 0,
    new_results_count INTEGER NOT NULL DEFAULT 0,
    alert_enabled INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE search_result_snapshot (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    saved_search_id INTEGER NOT NULL REFERENCES saved_search(id) ON DELETE CASCADE,
    result_ids_json TEXT NOT NULL,
    result_count INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE reading_room (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    code TEXT,
    capacity INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE booking (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    researcher_id INTEGER NOT NULL,
    room_id INTEGER NOT NULL REFERENCES reading_room(id),
    booking_date TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    purpose TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    seat_id INTEGER,
    checked_in_at TEXT,
    checked_out_at TEXT,
    cancellation_reason TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX booking_day_idx ON booking(room_id, booking_date);

CREATE TABLE material_request (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    booking_id INTEGER NOT NULL REFERENCES booking(id) ON DELETE CASCADE,
    object_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'requested',
    priority TEXT NOT NULL DEFAULT 'normal',
    queue_id INTEGER REFERENCES request_queue(id) ON DELETE SET NULL,
    notes TEXT,
    location_code TEXT,
    shelf_location TEXT,
    box_number TEXT,
    folder_number TEXT,
    handling_instructions TEXT,
    retrieved_at TEXT,
    retrieved_by INTEGER,
    returned_at TEXT,
    call_slip_printed_at TEXT,
    call_slip_printed_by INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX material_request_status_idx ON material_request(status, priority);

CREATE TABLE request_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    code TEXT NOT NULL UNIQUE,
    filter_status TEXT,
    filter_room_id INTEGER REFERENCES reading_room(id),
    filter_priority TEXT,
    sort_field TEXT NOT NULL DEFAULT 'created_at',
    sort_direction TEXT NOT NULL DEFAULT 'asc',
    is_active INTEGER NOT NULL DEFAULT 1,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE retrieval_schedule (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id INTEGER NOT NULL REFERENCES reading_room(id),
    name TEXT NOT NULL,
    day_of_week INTEGER,
    retrieval_time TEXT NOT NULL,
    cutoff_minutes_before INTEGER NOT NULL DEFAULT 30,
    max_items_per_run INTEGER NOT NULL DEFAULT 50,
    storage_location TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE request_status_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id INTEGER NOT NULL,
    request_type TEXT NOT NULL,
    old_status TEXT,
    new_status TEXT NOT NULL,
    changed_by INTEGER,
    notes TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX request_status_history_idx ON request_status_history(request_type, request_id);

CREATE TABLE reproduction_request (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    researcher_id INTEGER NOT NULL,
    reference_number TEXT NOT NULL UNIQUE,
    purpose TEXT,
    intended_use TEXT NOT NULL DEFAULT 'personal',
    publication_details TEXT,
    status TEXT NOT NULL DEFAULT 'draft',
    estimated_cost REAL,
    final_cost REAL,
    currency TEXT NOT NULL DEFAULT 'ZAR',
    payment_reference TEXT,
    payment_date TEXT,
    payment_method TEXT,
    invoice_number TEXT,
    delivery_method TEXT NOT NULL DEFAULT 'email',
    delivery_address TEXT,
    delivery_email TEXT,
    notes TEXT,
    processed_by INTEGER,
    completed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE reproduction_item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id INTEGER NOT NULL REFERENCES reproduction_request(id) ON DELETE CASCADE,
    object_id INTEGER NOT NULL,
    reproduction_type TEXT NOT NULL DEFAULT 'scan',
    format TEXT NOT NULL DEFAULT 'PDF',
    resolution TEXT,
    color_mode TEXT NOT NULL DEFAULT 'grayscale',
    quantity INTEGER NOT NULL DEFAULT 1,
    page_range TEXT,
    special_instructions TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    unit_price REAL,
    total_price REAL,
    completed_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE seat (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id INTEGER NOT NULL REFERENCES reading_room(id),
    seat_number TEXT NOT NULL,
    seat_label TEXT,
    seat_type TEXT NOT NULL DEFAULT 'standard',
    zone TEXT,
    has_power INTEGER NOT NULL DEFAULT 1,
    has_lamp INTEGER NOT NULL DEFAULT 1,
    has_computer INTEGER NOT NULL DEFAULT 0,
    has_magnifier INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (room_id, seat_number)
);

CREATE TABLE seat_assignment (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    booking_id INTEGER NOT NULL REFERENCES booking(id) ON DELETE CASCADE,
    seat_id INTEGER NOT NULL REFERENCES seat(id),
    room_id INTEGER NOT NULL,
    assignment_date TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'assigned',
    assigned_by INTEGER,
    assigned_at TEXT NOT NULL,
    released_at TEXT
);
CREATE INDEX seat_assignment_day_idx ON seat_assignment(room_id, assignment_date, status);

CREATE TABLE equipment (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id INTEGER REFERENCES reading_room(id),
    name TEXT NOT NULL,
    equipment_type TEXT NOT NULL,
    code TEXT,
    max_booking_hours INTEGER NOT NULL DEFAULT 4,
    booking_increment_minutes INTEGER NOT NULL DEFAULT 30,
    condition_status TEXT NOT NULL DEFAULT 'good',
    is_available INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE equipment_booking (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    equipment_id INTEGER NOT NULL REFERENCES equipment(id),
    researcher_id INTEGER NOT NULL,
    booking_id INTEGER,
    booking_date TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    purpose TEXT,
    status TEXT NOT NULL DEFAULT 'reserved',
    checked_out_at TEXT,
    returned_at TEXT,
    return_condition TEXT,
    return_notes TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX equipment_booking_day_idx ON equipment_booking(equipment_id, booking_date, status);

CREATE TABLE equipment_maintenance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    equipment_id INTEGER NOT NULL REFERENCES equipment(id),
    condition_status TEXT NOT NULL,
    notes TEXT,
    logged_by INTEGER,
    created_at TEXT NOT NULL
);

CREATE TABLE walk_in_visitor (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id INTEGER NOT NULL REFERENCES reading_room(id),
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT,
    id_type TEXT,
    id_number TEXT,
    organization TEXT,
    purpose TEXT,
    visit_date TEXT NOT NULL,
    check_in_time TEXT NOT NULL,
    check_out_time TEXT,
    rules_acknowledged_at TEXT,
    researcher_id INTEGER,
    created_at TEXT NOT NULL
);

CREATE TABLE notification (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    researcher_id INTEGER NOT NULL,
    notification_type TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT,
    link TEXT,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    read_at TEXT
);
CREATE INDEX notification_unread_idx ON notification(researcher_id, is_read);

CREATE TABLE notification_preference (
    researcher_id INTEGER NOT NULL,
    notification_type TEXT NOT NULL,
    email_enabled INTEGER NOT NULL DEFAULT 1,
    in_app_enabled INTEGER NOT NULL DEFAULT 1,
    digest_frequency TEXT NOT NULL DEFAULT 'immediate',
    PRIMARY KEY (researcher_id, notification_type)
);

CREATE TABLE bibliography (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    researcher_id INTEGER NOT NULL,
    project_id INTEGER,
    name TEXT NOT NULL,
    description TEXT,
    citation_style TEXT NOT NULL DEFAULT 'chicago',
    is_public INTEGER NOT NULL DEFAULT 0,
    share_token TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE bibliography_entry (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bibliography_id INTEGER NOT NULL REFERENCES bibliography(id) ON DELETE CASCADE,
    object_id INTEGER,
    entry_type TEXT NOT NULL DEFAULT 'archival',
    csl_json TEXT,
    title TEXT,
    authors TEXT,
    date TEXT,
    publisher TEXT,
    container_title TEXT,
    volume TEXT,
    issue TEXT,
    pages TEXT,
    doi TEXT,
    url TEXT,
    accessed_date TEXT,
    archive_name TEXT,
    archive_location TEXT,
    collection_title TEXT,
    box TEXT,
    folder TEXT,
    notes TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX bibliography_entry_order_idx ON bibliography_entry(bibliography_id, sort_order);

CREATE TABLE favorite_folder (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE favorite (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    object_id INTEGER NOT NULL,
    object_type TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT,
    folder_id INTEGER REFERENCES favorite_folder(id) ON DELETE SET NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (user_id, object_type, object_id)
);
"#;

#[derive(Clone)]
pub struct SqliteStorage {
    pub path: String,
}

pub struct SqliteTx {
    conn: Connection,
}

impl StorageTx for SqliteTx {
    fn conn(&self) -> &Connection {
        &self.conn
    }

    fn commit(self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }
}

impl Storage for SqliteStorage {
    type Tx = SqliteTx;

    fn begin_tx(&self) -> Result<Self::Tx> {
        let conn = self.open()?;
        conn.execute("BEGIN IMMEDIATE", [])?;
        Ok(SqliteTx { conn })
    }

    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.open()?;
        f(&conn)
    }
}

impl SqliteStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().to_string(),
        }
    }

    pub fn reset_all(&self) -> Result<()> {
        let path = Path::new(&self.path);
        if !path.exists() {
            return Ok(());
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    pub fn init(&self) -> Result<()> {
        self.open()?;
        Ok(())
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        configure(&conn)?;
        migrate(&conn)?;
        Ok(conn)
    }
}

fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_millis(500))?;
    Ok(())
}

fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version == DB_SCHEMA_VERSION {
        return Ok(());
    }

    log::info!(
        "SQLite schema migration: {} -> {}",
        version,
        DB_SCHEMA_VERSION
    );

    if version == 0 {
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", DB_SCHEMA_VERSION)?;
        return Ok(());
    }

    Err(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::ErrorCode::SchemaChanged as i32),
        Some("database schema version mismatch; please run with --reset option".to_string()),
    ))
}

/// In-memory database with the full schema, for unit tests.
#[cfg(test)]
pub(crate) fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    migrate(&conn).unwrap();
    conn
}

#[cfg(test)]
pub(crate) fn unique_temp_file(prefix: &str, ext: &str) -> std::path::PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};

    let mut p = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    p.push(format!("{}_{}_{}.{}", prefix, std::process::id(), nanos, ext));
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResearchError;
    use rusqlite::{params, OptionalExtension};

    #[test]
    fn sqlite_reset_all_ok_when_missing() {
        let path = unique_temp_file("research_reset", "db");
        let repo = SqliteStorage::new(&path);
        repo.reset_all().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn sqlite_reset_all_removes_existing_file() {
        let path = unique_temp_file("research_reset", "db");
        std::fs::write(&path, b"dummy").unwrap();
        let repo = SqliteStorage::new(&path);
        repo.reset_all().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn sqlite_init_initializes_schema() {
        let path = unique_temp_file("research_init", "db");
        let repo = SqliteStorage::new(&path);
        repo.init().unwrap();

        let conn = Connection::open(&path).unwrap();
        let table = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name='assertion'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .unwrap();
        assert_eq!(table.as_deref(), Some("assertion"));

        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, DB_SCHEMA_VERSION);
    }

    #[test]
    fn sqlite_fails_on_mismatched_schema_version() {
        let path = unique_temp_file("research_bad_version", "db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 999;").unwrap();

        let err = SqliteStorage::new(&path)
            .init()
            .expect_err("init should fail on version mismatch");
        let msg = format!("{err}");
        assert!(msg.contains("database schema version mismatch"));
        assert!(msg.contains("--reset"));
    }

    #[test]
    fn write_commits_on_success() {
        let path = unique_temp_file("research_commit", "db");
        let repo = SqliteStorage::new(&path);
        repo.write(|conn| {
            conn.execute(
                "INSERT INTO reading_room (name, created_at) VALUES (?1, ?2)",
                params!["Main", "2026-01-01 09:00:00"],
            )?;
            Ok(())
        })
        .unwrap();

        let count: i64 = repo
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM reading_room", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn write_rolls_back_on_error() {
        let path = unique_temp_file("research_rollback", "db");
        let repo = SqliteStorage::new(&path);
        let result: Result<()> = repo.write(|conn| {
            conn.execute(
                "INSERT INTO reading_room (name, created_at) VALUES (?1, ?2)",
                params!["Annex", "2026-01-01 09:00:00"],
            )?;
            Err(ResearchError::conflict("abort"))
        });
        assert!(result.is_err());

        let count: i64 = repo
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM reading_room", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = test_conn();
        let err = conn
            .execute(
                "INSERT INTO seat (room_id, seat_number, created_at) VALUES (42, 'A1', 'now')",
                [],
            )
            .unwrap_err();
        assert!(matches!(err, rusqlite::Error::SqliteFailure(..)));
    }
}
