//! Review queue for machine extraction output.
//!
//! Every extraction result gets one pending queue row. Reviewers accept,
//! reject or correct it; accepted `entity` results become verified
//! assertions about the source object.

use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activity;
use crate::assertion::{self, NewAssertion};
use crate::catalogue::INFORMATION_OBJECT;
use crate::error::{ResearchError, Result};
use crate::types::{
    calculate_pagination, time::now_timestamp, AssertionStatus, AssertionType, Paginated, ValidationStatus,
    DEFAULT_PAGE_LIMIT,
};

pub const ENTITY_RESULT: &str = "entity";
const REASON_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: i64,
    pub project_id: Option<i64>,
    pub researcher_id: i64,
    pub extraction_type: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewResult {
    pub object_id: i64,
    pub result_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// A queue row joined with its extraction result and job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueItem {
    pub id: i64,
    pub result_id: i64,
    pub researcher_id: i64,
    pub status: ValidationStatus,
    pub reviewer_id: Option<i64>,
    pub reviewed_at: Option<String>,
    pub notes: Option<String>,
    pub modified_data: Option<Value>,
    pub created_at: String,
    pub object_id: i64,
    pub result_type: String,
    pub data: Value,
    pub confidence: Option<f64>,
    pub job_id: i64,
    pub extraction_type: String,
    pub project_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueFilter {
    #[serde(default)]
    pub researcher_id: Option<i64>,
    #[serde(default)]
    pub status: Option<ValidationStatus>,
    #[serde(default)]
    pub result_type: Option<String>,
    #[serde(default)]
    pub extraction_type: Option<String>,
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub modified: i64,
    pub avg_confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub validation_id: i64,
    pub status: ValidationStatus,
    pub reviewer_id: Option<i64>,
    pub reviewed_at: Option<String>,
    pub notes: Option<String>,
    pub modified_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disagreement {
    pub result_id: i64,
    pub object_id: i64,
    pub result_type: String,
    pub data: Value,
    pub confidence: Option<f64>,
    pub reviews: Vec<Review>,
}

/// Predicate used when the extracted entity names no relationship.
pub fn infer_predicate(entity_type: &str) -> &'static str {
    match entity_type.to_lowercase().as_str() {
        "person" => "mentions_person",
        "organization" => "mentions_organization",
        "location" | "place" => "references_location",
        "date" => "references_date",
        "event" => "references_event",
        "work" => "references_work",
        "concept" => "relates_to_concept",
        _ => "has_extracted_entity",
    }
}

pub fn infer_assertion_type(entity_type: &str) -> AssertionType {
    match entity_type.to_lowercase().as_str() {
        "person" => AssertionType::Biographical,
        "organization" => AssertionType::Relational,
        "location" | "place" => AssertionType::Spatial,
        "date" | "event" => AssertionType::Chronological,
        _ => AssertionType::Attributive,
    }
}

fn parse_json(raw: Option<String>) -> Value {
    raw.and_then(|s| serde_json::from_str(&s).ok()).unwrap_or(Value::Null)
}

pub fn create_job(
    conn: &Connection,
    researcher_id: i64,
    project_id: Option<i64>,
    extraction_type: &str,
) -> Result<ExtractionJob> {
    if extraction_type.trim().is_empty() {
        return Err(ResearchError::invalid("extraction_type is required"));
    }
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO extraction_job (project_id, researcher_id, extraction_type, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![project_id, researcher_id, extraction_type.trim(), now],
    )?;
    let id = conn.last_insert_rowid();
    Ok(conn.query_row(
        "SELECT id, project_id, researcher_id, extraction_type, status, created_at FROM extraction_job WHERE id = ?1",
        params![id],
        |row| {
            Ok(ExtractionJob {
                id: row.get(0)?,
                project_id: row.get(1)?,
                researcher_id: row.get(2)?,
                extraction_type: row.get(3)?,
                status: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )?)
}

/// Stores a result and queues it for review by the job owner. Returns
/// the result id.
pub fn add_result(conn: &Connection, job_id: i64, result: &NewResult) -> Result<i64> {
    let owner: Option<i64> = conn
        .query_row(
            "SELECT researcher_id FROM extraction_job WHERE id = ?1",
            params![job_id],
            |row| row.get(0),
        )
        .optional()?;
    let owner = owner.ok_or_else(|| ResearchError::not_found(format!("extraction job {job_id}")))?;
    if let Some(c) = result.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(ResearchError::invalid("confidence must be between 0 and 1"));
        }
    }
    let data = if result.data.is_null() {
        Value::Object(Default::default())
    } else {
        result.data.clone()
    };
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO extraction_result (job_id, object_id, result_type, data_json, confidence, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            job_id,
            result.object_id,
            result.result_type,
            serde_json::to_string(&data)?,
            result.confidence,
            now
        ],
    )?;
    let result_id = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO validation_queue (result_id, researcher_id, status, created_at) VALUES (?1, ?2, 'pending', ?3)",
        params![result_id, owner, now],
    )?;
    Ok(result_id)
}

const QUEUE_SELECT: &str = "SELECT vq.id, vq.result_id, vq.researcher_id, vq.status, vq.reviewer_id, vq.reviewed_at,
        vq.notes, vq.modified_data_json, vq.created_at, er.object_id, er.result_type, er.data_json,
        er.confidence, er.job_id, ej.extraction_type, ej.project_id
     FROM validation_queue vq
     JOIN extraction_result er ON er.id = vq.result_id
     JOIN extraction_job ej ON ej.id = er.job_id";

const QUEUE_WHERE: &str = "WHERE (?1 IS NULL OR vq.researcher_id = ?1)
       AND (?2 IS NULL OR vq.status = ?2)
       AND (?3 IS NULL OR er.result_type = ?3)
       AND (?4 IS NULL OR ej.extraction_type = ?4)
       AND (?5 IS NULL OR er.confidence >= ?5)";

fn map_queue_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        id: row.get(0)?,
        result_id: row.get(1)?,
        researcher_id: row.get(2)?,
        status: row.get(3)?,
        reviewer_id: row.get(4)?,
        reviewed_at: row.get(5)?,
        notes: row.get(6)?,
        modified_data: row.get::<_, Option<String>>(7)?.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(8)?,
        object_id: row.get(9)?,
        result_type: row.get(10)?,
        data: parse_json(row.get(11)?),
        confidence: row.get(12)?,
        job_id: row.get(13)?,
        extraction_type: row.get(14)?,
        project_id: row.get(15)?,
    })
}

pub fn queue(conn: &Connection, filter: &QueueFilter, page: i64, limit: Option<i64>) -> Result<Paginated<QueueItem>> {
    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM validation_queue vq
             JOIN extraction_result er ON er.id = vq.result_id
             JOIN extraction_job ej ON ej.id = er.job_id
             {QUEUE_WHERE}"
        ),
        params![
            filter.researcher_id,
            filter.status,
            filter.result_type,
            filter.extraction_type,
            filter.min_confidence
        ],
        |row| row.get(0),
    )?;
    let window = calculate_pagination(total, page, limit.unwrap_or(DEFAULT_PAGE_LIMIT));
    let sql = format!("{QUEUE_SELECT} {QUEUE_WHERE} ORDER BY vq.created_at DESC, vq.id DESC LIMIT ?6 OFFSET ?7");
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(
            params![
                filter.researcher_id,
                filter.status,
                filter.result_type,
                filter.extraction_type,
                filter.min_confidence,
                window.limit,
                window.offset
            ],
            map_queue_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Paginated::new(items, total, window))
}

pub fn stats(conn: &Connection, researcher_id: Option<i64>) -> Result<QueueStats> {
    let (pending, accepted, rejected, modified): (i64, i64, i64, i64) = conn.query_row(
        "SELECT
            IFNULL(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
            IFNULL(SUM(CASE WHEN status = 'accepted' THEN 1 ELSE 0 END), 0),
            IFNULL(SUM(CASE WHEN status = 'rejected' THEN 1 ELSE 0 END), 0),
            IFNULL(SUM(CASE WHEN status = 'modified' THEN 1 ELSE 0 END), 0)
         FROM validation_queue WHERE (?1 IS NULL OR researcher_id = ?1)",
        params![researcher_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;
    let avg: Option<f64> = conn.query_row(
        "SELECT AVG(er.confidence) FROM validation_queue vq
         JOIN extraction_result er ON er.id = vq.result_id
         WHERE vq.status = 'pending' AND er.confidence IS NOT NULL
           AND (?1 IS NULL OR vq.researcher_id = ?1)",
        params![researcher_id],
        |row| row.get(0),
    )?;
    Ok(QueueStats {
        pending,
        accepted,
        rejected,
        modified,
        avg_confidence: avg.map(|v| (v * 10_000.0).round() / 10_000.0),
    })
}

struct ResultContext {
    object_id: i64,
    result_type: String,
    data: Value,
    confidence: Option<f64>,
    project_id: Option<i64>,
    researcher_id: i64,
}

fn result_context(conn: &Connection, result_id: i64) -> Result<ResultContext> {
    conn.query_row(
        "SELECT er.object_id, er.result_type, er.data_json, er.confidence, ej.project_id, ej.researcher_id
         FROM extraction_result er JOIN extraction_job ej ON ej.id = er.job_id
         WHERE er.id = ?1",
        params![result_id],
        |row| {
            Ok(ResultContext {
                object_id: row.get(0)?,
                result_type: row.get(1)?,
                data: parse_json(row.get(2)?),
                confidence: row.get(3)?,
                project_id: row.get(4)?,
                researcher_id: row.get(5)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| ResearchError::not_found(format!("extraction result {result_id}")))
}

/// Moves the pending queue row of `result_id` to `status`.
fn close_pending(
    conn: &Connection,
    result_id: i64,
    reviewer_id: i64,
    status: ValidationStatus,
    notes: Option<&str>,
    modified: Option<&Value>,
) -> Result<ResultContext> {
    let context = result_context(conn, result_id)?;
    let modified_json = modified.map(serde_json::to_string).transpose()?;
    let updated = conn.execute(
        "UPDATE validation_queue
         SET status = ?1, reviewer_id = ?2, reviewed_at = ?3,
             notes = COALESCE(?4, notes), modified_data_json = COALESCE(?5, modified_data_json)
         WHERE result_id = ?6 AND status = 'pending'",
        params![status, reviewer_id, now_timestamp(), notes, modified_json, result_id],
    )?;
    if updated == 0 {
        return Err(ResearchError::conflict(format!("result {result_id} is not pending review")));
    }
    Ok(context)
}

/// Builds the verified assertion for an accepted entity. Returns `None`
/// when the data carries no `entity_value`.
fn assertion_from_entity(
    conn: &Connection,
    context: &ResultContext,
    data: &Value,
    reviewer_id: i64,
) -> Result<Option<i64>> {
    let value = match data.get("entity_value").and_then(Value::as_str) {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => return Ok(None),
    };
    let entity_type = data
        .get("entity_type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let predicate = data
        .get("relationship")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| infer_predicate(&entity_type).to_string());
    let label = data
        .get("entity_label")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| value.clone());
    let created = assertion::create(
        conn,
        reviewer_id,
        &NewAssertion {
            project_id: context.project_id,
            subject_type: INFORMATION_OBJECT.to_string(),
            subject_id: context.object_id,
            predicate,
            object_type: Some(entity_type.clone()),
            object_id: data.get("entity_id").and_then(Value::as_i64),
            object_value: Some(value),
            object_label: Some(label),
            assertion_type: infer_assertion_type(&entity_type),
            status: Some(AssertionStatus::Verified),
            confidence: context.confidence.map(|c| c * 100.0),
            ..Default::default()
        },
    )?;
    Ok(Some(created.id))
}

pub fn accept(conn: &Connection, result_id: i64, reviewer_id: i64) -> Result<()> {
    let context = close_pending(conn, result_id, reviewer_id, ValidationStatus::Accepted, None, None)?;
    if context.result_type == ENTITY_RESULT {
        assertion_from_entity(conn, &context, &context.data, reviewer_id)?;
    }
    activity::log_event(
        conn,
        Some(context.researcher_id),
        context.project_id,
        "validation_accepted",
        "extraction_result",
        result_id,
        Some(&format!("Result #{result_id} accepted")),
    )?;
    log::info!("✅ Extraction result {} accepted by researcher {}", result_id, reviewer_id);
    Ok(())
}

pub fn reject(conn: &Connection, result_id: i64, reviewer_id: i64, reason: &str) -> Result<()> {
    let context = close_pending(
        conn,
        result_id,
        reviewer_id,
        ValidationStatus::Rejected,
        Some(reason),
        None,
    )?;
    let short: String = reason.chars().take(REASON_MAX_CHARS).collect();
    activity::log_event(
        conn,
        Some(context.researcher_id),
        context.project_id,
        "validation_rejected",
        "extraction_result",
        result_id,
        Some(&format!("Result #{result_id} rejected: {short}")),
    )?;
    log::info!("🚫 Extraction result {} rejected by researcher {}", result_id, reviewer_id);
    Ok(())
}

/// Accepts the result with the reviewer's corrected data.
pub fn modify(conn: &Connection, result_id: i64, reviewer_id: i64, data: &Value) -> Result<()> {
    if !data.is_object() {
        return Err(ResearchError::invalid("modified_data must be an object"));
    }
    let context = close_pending(
        conn,
        result_id,
        reviewer_id,
        ValidationStatus::Modified,
        None,
        Some(data),
    )?;
    if context.result_type == ENTITY_RESULT {
        assertion_from_entity(conn, &context, data, reviewer_id)?;
    }
    activity::log_event(
        conn,
        Some(context.researcher_id),
        context.project_id,
        "validation_accepted",
        "extraction_result",
        result_id,
        Some(&format!("Result #{result_id} accepted with modifications")),
    )?;
    Ok(())
}

fn count_processed<F>(ids: &[i64], mut apply: F) -> Result<usize>
where
    F: FnMut(i64) -> Result<()>,
{
    let mut done = 0;
    for &id in ids {
        match apply(id) {
            Ok(()) => done += 1,
            Err(ResearchError::Conflict(_)) | Err(ResearchError::NotFound(_)) => {
                log::debug!("skipping result {} in bulk review", id);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(done)
}

/// Results that are not pending are skipped, not reported as errors.
pub fn bulk_accept(conn: &Connection, ids: &[i64], reviewer_id: i64) -> Result<usize> {
    count_processed(ids, |id| accept(conn, id, reviewer_id))
}

pub fn bulk_reject(conn: &Connection, ids: &[i64], reviewer_id: i64, reason: &str) -> Result<usize> {
    count_processed(ids, |id| reject(conn, id, reviewer_id, reason))
}

/// Reviewed results of a job whose reviews disagree or were corrected.
pub fn disagreements(conn: &Connection, job_id: i64) -> Result<Vec<Disagreement>> {
    let mut stmt = conn.prepare(
        "SELECT er.id, er.object_id, er.result_type, er.data_json, er.confidence,
                vq.id, vq.status, vq.reviewer_id, vq.reviewed_at, vq.notes, vq.modified_data_json
         FROM extraction_result er
         JOIN validation_queue vq ON vq.result_id = er.id
         WHERE er.job_id = ?1 AND vq.status != 'pending'
         ORDER BY er.id, vq.id",
    )?;
    let rows = stmt
        .query_map(params![job_id], |row| {
            let result = Disagreement {
                result_id: row.get(0)?,
                object_id: row.get(1)?,
                result_type: row.get(2)?,
                data: parse_json(row.get(3)?),
                confidence: row.get(4)?,
                reviews: Vec::new(),
            };
            let review = Review {
                validation_id: row.get(5)?,
                status: row.get(6)?,
                reviewer_id: row.get(7)?,
                reviewed_at: row.get(8)?,
                notes: row.get(9)?,
                modified_data: row.get::<_, Option<String>>(10)?.and_then(|s| serde_json::from_str(&s).ok()),
            };
            Ok((result, review))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut grouped: BTreeMap<i64, Disagreement> = BTreeMap::new();
    for (result, review) in rows {
        grouped
            .entry(result.result_id)
            .or_insert(result)
            .reviews
            .push(review);
    }
    Ok(grouped
        .into_values()
        .filter(|d| {
            let first = d.reviews[0].status;
            let mixed = d.reviews.iter().any(|r| r.status != first);
            let corrected = d
                .reviews
                .iter()
                .any(|r| r.status == ValidationStatus::Modified && r.modified_data.is_some());
            mixed || corrected
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::people::fixtures::{project, researcher};
    use crate::storage::sqlite::test_conn;
    use serde_json::json;

    fn entity(object_id: i64, entity_type: &str, value: &str, confidence: f64) -> NewResult {
        NewResult {
            object_id,
            result_type: ENTITY_RESULT.into(),
            data: json!({"entity_type": entity_type, "entity_value": value}),
            confidence: Some(confidence),
        }
    }

    #[test]
    fn predicate_and_type_inference() {
        assert_eq!(infer_predicate("Person"), "mentions_person");
        assert_eq!(infer_predicate("place"), "references_location");
        assert_eq!(infer_predicate("ship"), "has_extracted_entity");
        assert_eq!(infer_assertion_type("event"), AssertionType::Chronological);
        assert_eq!(infer_assertion_type("concept"), AssertionType::Attributive);
    }

    #[test]
    fn accepting_an_entity_creates_a_verified_assertion() {
        let conn = test_conn();
        let owner = researcher(&conn, "Ada", "Byron");
        let reviewer = researcher(&conn, "Mary", "Somerville");
        let p = project(&conn, owner.id, "Letters");
        let job = create_job(&conn, owner.id, Some(p.id), "ner").unwrap();
        let rid = add_result(&conn, job.id, &entity(10, "person", "Charles Babbage", 0.87)).unwrap();

        accept(&conn, rid, reviewer.id).unwrap();

        let (predicate, kind, status, confidence, subject): (String, String, String, f64, String) = conn
            .query_row(
                "SELECT predicate, assertion_type, status, confidence, subject_type FROM assertion",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .unwrap();
        assert_eq!(predicate, "mentions_person");
        assert_eq!(kind, "biographical");
        assert_eq!(status, "verified");
        assert!((confidence - 87.0).abs() < 1e-9);
        assert_eq!(subject, "information_object");

        let err = accept(&conn, rid, reviewer.id).unwrap_err();
        assert!(matches!(err, ResearchError::Conflict(_)));
        let events = activity::list_for_entity(&conn, "extraction_result", rid).unwrap();
        assert_eq!(events[0].activity_type, "validation_accepted");
    }

    #[test]
    fn modify_uses_corrected_data_and_reject_records_reason() {
        let conn = test_conn();
        let owner = researcher(&conn, "Ada", "Byron");
        let job = create_job(&conn, owner.id, None, "ner").unwrap();
        let first = add_result(&conn, job.id, &entity(10, "place", "Lundon", 0.4)).unwrap();
        let second = add_result(&conn, job.id, &entity(11, "date", "1843", 0.9)).unwrap();

        modify(
            &conn,
            first,
            owner.id,
            &json!({"entity_type": "place", "entity_value": "London", "relationship": "written_at"}),
        )
        .unwrap();
        reject(&conn, second, owner.id, "not a date").unwrap();

        let (predicate, value): (String, String) = conn
            .query_row("SELECT predicate, object_value FROM assertion", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!(predicate, "written_at");
        assert_eq!(value, "London");

        let rejected = queue(
            &conn,
            &QueueFilter {
                status: Some(ValidationStatus::Rejected),
                ..Default::default()
            },
            1,
            None,
        )
        .unwrap();
        assert_eq!(rejected.total, 1);
        assert_eq!(rejected.items[0].notes.as_deref(), Some("not a date"));
    }

    #[test]
    fn queue_filters_and_stats() {
        let conn = test_conn();
        let owner = researcher(&conn, "Ada", "Byron");
        let job = create_job(&conn, owner.id, None, "ner").unwrap();
        let a = add_result(&conn, job.id, &entity(1, "person", "A", 0.5)).unwrap();
        add_result(&conn, job.id, &entity(2, "person", "B", 0.75)).unwrap();
        add_result(
            &conn,
            job.id,
            &NewResult {
                object_id: 3,
                result_type: "summary".into(),
                data: json!({"text": "short"}),
                confidence: None,
            },
        )
        .unwrap();

        let confident = queue(
            &conn,
            &QueueFilter {
                min_confidence: Some(0.6),
                ..Default::default()
            },
            1,
            None,
        )
        .unwrap();
        assert_eq!(confident.total, 1);
        assert_eq!(confident.items[0].object_id, 2);

        let s = stats(&conn, None).unwrap();
        assert_eq!(s.pending, 3);
        assert_eq!(s.avg_confidence, Some(0.625));

        reject(&conn, a, owner.id, "noise").unwrap();
        let s = stats(&conn, Some(owner.id)).unwrap();
        assert_eq!((s.pending, s.rejected), (2, 1));
        assert_eq!(s.avg_confidence, Some(0.75));
        assert_eq!(stats(&conn, Some(999)).unwrap().avg_confidence, None);
    }

    #[test]
    fn bulk_review_counts_only_pending_results() {
        let conn = test_conn();
        let owner = researcher(&conn, "Ada", "Byron");
        let job = create_job(&conn, owner.id, None, "ocr").unwrap();
        let ids: Vec<i64> = (0..3)
            .map(|i| add_result(&conn, job.id, &entity(i, "work", "Notes", 0.6)).unwrap())
            .collect();

        assert_eq!(bulk_reject(&conn, &ids[..1], owner.id, "blurry").unwrap(), 1);
        assert_eq!(bulk_accept(&conn, &[ids[0], ids[1], ids[2], 404], owner.id).unwrap(), 2);
        assert_eq!(stats(&conn, None).unwrap().accepted, 2);
    }

    #[test]
    fn disagreements_surface_mixed_and_corrected_reviews() {
        let conn = test_conn();
        let owner = researcher(&conn, "Ada", "Byron");
        let job = create_job(&conn, owner.id, None, "ner").unwrap();
        let mixed = add_result(&conn, job.id, &entity(1, "person", "A", 0.5)).unwrap();
        let corrected = add_result(&conn, job.id, &entity(2, "person", "B", 0.5)).unwrap();
        let agreed = add_result(&conn, job.id, &entity(3, "person", "C", 0.5)).unwrap();

        accept(&conn, mixed, owner.id).unwrap();
        conn.execute(
            "INSERT INTO validation_queue (result_id, researcher_id, status, reviewer_id, created_at)
             VALUES (?1, ?2, 'rejected', ?2, '2026-01-01 00:00:00')",
            params![mixed, owner.id],
        )
        .unwrap();
        modify(&conn, corrected, owner.id, &json!({"entity_value": "Bea"})).unwrap();
        accept(&conn, agreed, owner.id).unwrap();

        let found = disagreements(&conn, job.id).unwrap();
        let ids: Vec<i64> = found.iter().map(|d| d.result_id).collect();
        assert_eq!(ids, vec![mixed, corrected]);
        assert_eq!(found[0].reviews.len(), 2);
    }
}
