//! W3C Web Annotations attached to catalogue objects.

mod iiif;

pub use iiif::{export_iiif, import_iiif, to_w3c};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::activity;
use crate::catalogue::INFORMATION_OBJECT;
use crate::error::{ResearchError, Result};
use crate::people;
use crate::types::{time::now_timestamp, AnnotationStatus, Motivation, SelectorType, Visibility};

pub const GENERATOR_NAME: &str = "research-services";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: i64,
    pub researcher_id: i64,
    pub project_id: Option<i64>,
    pub collection_id: Option<i64>,
    pub object_id: Option<i64>,
    pub motivation: Motivation,
    pub body: Value,
    pub creator: Option<Value>,
    pub generated: Option<Value>,
    pub status: AnnotationStatus,
    pub visibility: Visibility,
    pub created_at: String,
    pub updated_at: String,
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: i64,
    pub annotation_id: i64,
    pub source_type: String,
    pub source_id: Option<i64>,
    pub source_url: Option<String>,
    pub selector_type: Option<SelectorType>,
    pub selector: Option<Value>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTarget {
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_id: Option<i64>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub selector_type: Option<String>,
    #[serde(default)]
    pub selector: Option<Value>,
}

/// Motivation and visibility stay raw text so that bad values surface as
/// validation errors instead of body rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAnnotation {
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub collection_id: Option<i64>,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub motivation: Option<String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub targets: Vec<NewTarget>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnotationUpdate {
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub motivation: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
}

/// Strings become `TextualBody`; objects pass through untouched.
pub fn normalize_body(body: Value) -> Result<Value> {
    match body {
        Value::String(text) => {
            if text.trim().is_empty() {
                return Err(ResearchError::invalid("annotation body is empty"));
            }
            Ok(json!({ "type": "TextualBody", "value": text, "format": "text/plain" }))
        }
        Value::Object(_) | Value::Array(_) => Ok(body),
        Value::Null => Err(ResearchError::invalid("annotation body is required")),
        other => Ok(json!({ "type": "TextualBody", "value": other.to_string(), "format": "text/plain" })),
    }
}

/// Plain-text value of a body, used when an annotation is cited elsewhere.
pub fn body_text(body: &Value) -> Option<String> {
    match body {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("value")
            .or_else(|| map.get("chars"))
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::Array(items) => items.iter().find_map(body_text),
        _ => None,
    }
}

fn parse_motivation(raw: Option<&str>) -> Result<Motivation> {
    match raw.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.parse(),
        None => Ok(Motivation::Commenting),
    }
}

fn parse_visibility(raw: Option<&str>) -> Result<Visibility> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.parse(),
        None => Ok(Visibility::default()),
    }
}

fn creator_for(conn: &Connection, researcher_id: i64) -> Result<Value> {
    let researcher = people::load_researcher(conn, researcher_id)?;
    let mut creator = json!({
        "type": "Person",
        "name": researcher.full_name(),
        "email": researcher.email,
    });
    if let Some(orcid) = researcher.orcid_id.as_deref().filter(|o| !o.is_empty()) {
        creator["id"] = json!(format!("https://orcid.org/{orcid}"));
    }
    if let Some(institution) = researcher.institution.as_deref().filter(|i| !i.is_empty()) {
        creator["affiliation"] = json!(institution);
    }
    Ok(creator)
}

fn generator() -> Value {
    json!({ "type": "Software", "name": GENERATOR_NAME })
}

fn map_annotation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Annotation> {
    let body: String = row.get(6)?;
    let creator: Option<String> = row.get(7)?;
    let generated: Option<String> = row.get(8)?;
    Ok(Annotation {
        id: row.get(0)?,
        researcher_id: row.get(1)?,
        project_id: row.get(2)?,
        collection_id: row.get(3)?,
        object_id: row.get(4)?,
        motivation: row.get(5)?,
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
        creator: creator.and_then(|c| serde_json::from_str(&c).ok()),
        generated: generated.and_then(|g| serde_json::from_str(&g).ok()),
        status: row.get(9)?,
        visibility: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        targets: Vec::new(),
    })
}

fn map_target_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Target> {
    let selector: Option<String> = row.get(6)?;
    Ok(Target {
        id: row.get(0)?,
        annotation_id: row.get(1)?,
        source_type: row.get(2)?,
        source_id: row.get(3)?,
        source_url: row.get(4)?,
        selector_type: row.get(5)?,
        selector: selector.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(7)?,
    })
}

const ANNOTATION_COLUMNS: &str = "id, researcher_id, project_id, collection_id, object_id, motivation,
     body_json, creator_json, generated_json, status, visibility, created_at, updated_at";

pub fn create(conn: &Connection, researcher_id: i64, data: &NewAnnotation) -> Result<Annotation> {
    let motivation = parse_motivation(data.motivation.as_deref())?;
    let visibility = parse_visibility(data.visibility.as_deref())?;
    let body = normalize_body(data.body.clone())?;
    let creator = creator_for(conn, researcher_id)?;
    let now = now_timestamp();

    conn.execute(
        "INSERT INTO annotation (researcher_id, project_id, collection_id, object_id, motivation,
            body_json, creator_json, generated_json, status, visibility, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            researcher_id,
            data.project_id,
            data.collection_id,
            data.object_id,
            motivation,
            serde_json::to_string(&body)?,
            serde_json::to_string(&creator)?,
            serde_json::to_string(&generator())?,
            AnnotationStatus::Active,
            visibility,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();

    for target in &data.targets {
        insert_target(conn, id, target)?;
    }
    if data.targets.is_empty() {
        if let Some(object_id) = data.object_id {
            insert_target(
                conn,
                id,
                &NewTarget {
                    source_id: Some(object_id),
                    ..Default::default()
                },
            )?;
        }
    }

    activity::log_event(
        conn,
        Some(researcher_id),
        data.project_id,
        "annotation_created",
        "annotation",
        id,
        body_text(&body).as_deref(),
    )?;
    get(conn, id)
}

fn insert_target(conn: &Connection, annotation_id: i64, target: &NewTarget) -> Result<i64> {
    let declared = target
        .selector_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            target
                .selector
                .as_ref()
                .and_then(|s| s.get("type"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });
    let selector_type = declared.map(|s| s.parse::<SelectorType>()).transpose()?;
    if target.source_id.is_none() && target.source_url.is_none() {
        return Err(ResearchError::invalid("target needs source_id or source_url"));
    }
    let selector = target.selector.as_ref().map(serde_json::to_string).transpose()?;
    let source_type = target
        .source_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(INFORMATION_OBJECT);

    conn.execute(
        "INSERT INTO annotation_target (annotation_id, source_type, source_id, source_url, selector_type, selector_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            annotation_id,
            source_type,
            target.source_id,
            target.source_url,
            selector_type,
            selector,
            now_timestamp()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<Annotation>> {
    let sql = format!("SELECT {ANNOTATION_COLUMNS} FROM annotation WHERE id = ?1");
    let annotation = conn.query_row(&sql, params![id], map_annotation_row).optional()?;
    match annotation {
        Some(mut a) => {
            a.targets = targets(conn, a.id)?;
            Ok(Some(a))
        }
        None => Ok(None),
    }
}

pub fn get(conn: &Connection, id: i64) -> Result<Annotation> {
    find(conn, id)?.ok_or_else(|| ResearchError::not_found(format!("annotation {id}")))
}

/// Whether `viewer` may read the annotation. Deleted annotations are never
/// readable; private ones only by their author.
pub fn visible_to(annotation: &Annotation, viewer: Option<i64>) -> bool {
    match annotation.status {
        AnnotationStatus::Deleted => false,
        _ => match annotation.visibility {
            Visibility::Public => true,
            Visibility::Shared => viewer.is_some(),
            Visibility::Private => viewer == Some(annotation.researcher_id),
        },
    }
}

/// The annotation as `viewer` may see it; hidden ones are reported as missing.
pub fn get_visible(conn: &Connection, id: i64, viewer: Option<i64>) -> Result<Annotation> {
    let annotation = get(conn, id)?;
    if !visible_to(&annotation, viewer) {
        return Err(ResearchError::not_found(format!("annotation {id}")));
    }
    Ok(annotation)
}

fn get_owned(conn: &Connection, id: i64, researcher_id: i64) -> Result<Annotation> {
    let annotation = get(conn, id)?;
    if annotation.status == AnnotationStatus::Deleted {
        return Err(ResearchError::not_found(format!("annotation {id}")));
    }
    if annotation.researcher_id != researcher_id {
        return Err(ResearchError::Forbidden(format!(
            "annotation {id} belongs to another researcher"
        )));
    }
    Ok(annotation)
}

pub fn targets(conn: &Connection, annotation_id: i64) -> Result<Vec<Target>> {
    let mut stmt = conn.prepare(
        "SELECT id, annotation_id, source_type, source_id, source_url, selector_type, selector_json, created_at
         FROM annotation_target WHERE annotation_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![annotation_id], map_target_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn update(conn: &Connection, id: i64, researcher_id: i64, changes: &AnnotationUpdate) -> Result<Annotation> {
    let current = get_owned(conn, id, researcher_id)?;
    let body = match changes.body.clone() {
        Some(b) => normalize_body(b)?,
        None => current.body,
    };
    let motivation = match changes.motivation.as_deref() {
        Some(m) => parse_motivation(Some(m))?,
        None => current.motivation,
    };
    let visibility = match changes.visibility.as_deref() {
        Some(v) => parse_visibility(Some(v))?,
        None => current.visibility,
    };
    conn.execute(
        "UPDATE annotation SET body_json = ?1, motivation = ?2, visibility = ?3, updated_at = ?4 WHERE id = ?5",
        params![
            serde_json::to_string(&body)?,
            motivation,
            visibility,
            now_timestamp(),
            id
        ],
    )?;
    get(conn, id)
}

pub fn delete(conn: &Connection, id: i64, researcher_id: i64) -> Result<()> {
    let annotation = get_owned(conn, id, researcher_id)?;
    conn.execute(
        "UPDATE annotation SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![AnnotationStatus::Deleted, now_timestamp(), id],
    )?;
    activity::log_event(
        conn,
        Some(researcher_id),
        annotation.project_id,
        "annotation_deleted",
        "annotation",
        id,
        None,
    )?;
    Ok(())
}

pub fn add_target(conn: &Connection, annotation_id: i64, researcher_id: i64, target: &NewTarget) -> Result<Target> {
    get_owned(conn, annotation_id, researcher_id)?;
    let id = insert_target(conn, annotation_id, target)?;
    conn.execute(
        "UPDATE annotation SET updated_at = ?1 WHERE id = ?2",
        params![now_timestamp(), annotation_id],
    )?;
    targets(conn, annotation_id)?
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| ResearchError::not_found(format!("target {id}")))
}

pub fn remove_target(conn: &Connection, target_id: i64, researcher_id: i64) -> Result<()> {
    let annotation_id: i64 = conn
        .query_row(
            "SELECT annotation_id FROM annotation_target WHERE id = ?1",
            params![target_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("target {target_id}")))?;
    get_owned(conn, annotation_id, researcher_id)?;
    conn.execute("DELETE FROM annotation_target WHERE id = ?1", params![target_id])?;
    Ok(())
}

fn list_where(conn: &Connection, clause: &str, arg: i64) -> Result<Vec<Annotation>> {
    let sql = format!(
        "SELECT {ANNOTATION_COLUMNS} FROM annotation
         WHERE status = 'active' AND {clause} ORDER BY created_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map(params![arg], map_annotation_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for a in rows.iter_mut() {
        a.targets = targets(conn, a.id)?;
    }
    Ok(rows)
}

pub fn list_for_object(conn: &Connection, object_id: i64) -> Result<Vec<Annotation>> {
    list_where(conn, "object_id = ?1", object_id)
}

pub fn list_for_project(conn: &Connection, project_id: i64) -> Result<Vec<Annotation>> {
    list_where(conn, "project_id = ?1", project_id)
}
