//! Subject/predicate/object research assertions and the evidence for them.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResearchError, Result};
use crate::types::{time::now_timestamp, AssertionStatus, AssertionType, EvidenceRelationship};
use crate::{activity, annotation, catalogue, notifications};

pub const SEARCH_LIMIT: i64 = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub id: i64,
    pub researcher_id: i64,
    pub project_id: Option<i64>,
    pub subject_type: String,
    pub subject_id: i64,
    pub subject_label: Option<String>,
    pub predicate: String,
    pub object_type: Option<String>,
    pub object_id: Option<i64>,
    pub object_value: Option<String>,
    pub object_label: Option<String>,
    pub assertion_type: AssertionType,
    pub status: AssertionStatus,
    pub confidence: Option<f64>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: i64,
    pub assertion_id: i64,
    pub source_type: String,
    pub source_id: i64,
    pub selector: Option<Value>,
    pub relationship: EvidenceRelationship,
    pub note: Option<String>,
    pub added_by: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssertionDetail {
    #[serde(flatten)]
    pub assertion: Assertion,
    pub evidence: Vec<Evidence>,
    pub evidence_count: usize,
    pub supporting_count: usize,
    pub refuting_count: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAssertion {
    #[serde(default)]
    pub project_id: Option<i64>,
    pub subject_type: String,
    pub subject_id: i64,
    #[serde(default)]
    pub subject_label: Option<String>,
    pub predicate: String,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub object_value: Option<String>,
    #[serde(default)]
    pub object_label: Option<String>,
    #[serde(default)]
    pub assertion_type: AssertionType,
    #[serde(default)]
    pub status: Option<AssertionStatus>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Fields a researcher may edit after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssertionUpdate {
    #[serde(default)]
    pub subject_label: Option<String>,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub object_value: Option<String>,
    #[serde(default)]
    pub object_label: Option<String>,
    #[serde(default)]
    pub assertion_type: Option<AssertionType>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEvidence {
    pub source_type: String,
    pub source_id: i64,
    #[serde(default)]
    pub selector: Option<Value>,
    #[serde(default)]
    pub relationship: EvidenceRelationship,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssertionFilter {
    #[serde(default)]
    pub assertion_type: Option<AssertionType>,
    #[serde(default)]
    pub status: Option<AssertionStatus>,
}

/// Assertion fields supplied when promoting an annotation. The subject
/// defaults to the annotation's first target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromoteAnnotation {
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub subject_type: Option<String>,
    #[serde(default)]
    pub subject_id: Option<i64>,
    pub predicate: String,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub object_value: Option<String>,
    #[serde(default)]
    pub assertion_type: AssertionType,
    #[serde(default)]
    pub confidence: Option<f64>,
}

const COLUMNS: &str = "id, researcher_id, project_id, subject_type, subject_id, subject_label, predicate,
     object_type, object_id, object_value, object_label, assertion_type, status, confidence, version,
     created_at, updated_at";

pub(crate) fn map_assertion_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Assertion> {
    Ok(Assertion {
        id: row.get(0)?,
        researcher_id: row.get(1)?,
        project_id: row.get(2)?,
        subject_type: row.get(3)?,
        subject_id: row.get(4)?,
        subject_label: row.get(5)?,
        predicate: row.get(6)?,
        object_type: row.get(7)?,
        object_id: row.get(8)?,
        object_value: row.get(9)?,
        object_label: row.get(10)?,
        assertion_type: row.get(11)?,
        status: row.get(12)?,
        confidence: row.get(13)?,
        version: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn map_evidence_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Evidence> {
    let selector: Option<String> = row.get(4)?;
    Ok(Evidence {
        id: row.get(0)?,
        assertion_id: row.get(1)?,
        source_type: row.get(2)?,
        source_id: row.get(3)?,
        selector: selector.and_then(|s| serde_json::from_str(&s).ok()),
        relationship: row.get(5)?,
        note: row.get(6)?,
        added_by: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn clamp_confidence(confidence: Option<f64>) -> Option<f64> {
    confidence.map(|c| c.clamp(0.0, 100.0))
}

fn query_assertions(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Assertion>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(args, map_assertion_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn create(conn: &Connection, researcher_id: i64, data: &NewAssertion) -> Result<Assertion> {
    if data.subject_type.trim().is_empty() {
        return Err(ResearchError::invalid("subject_type is required"));
    }
    if data.predicate.trim().is_empty() {
        return Err(ResearchError::invalid("predicate is required"));
    }
    let subject_label = match &data.subject_label {
        Some(label) => label.clone(),
        None => catalogue::label_for(conn, &data.subject_type, data.subject_id)?,
    };
    let object_label = match (&data.object_label, &data.object_type, data.object_id) {
        (Some(label), _, _) => Some(label.clone()),
        (None, Some(kind), Some(id)) => Some(catalogue::label_for(conn, kind, id)?),
        _ => None,
    };
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO assertion (researcher_id, project_id, subject_type, subject_id, subject_label, predicate,
            object_type, object_id, object_value, object_label, assertion_type, status, confidence, version,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 1, ?14, ?14)",
        params![
            researcher_id,
            data.project_id,
            data.subject_type.trim(),
            data.subject_id,
            subject_label,
            data.predicate.trim(),
            data.object_type,
            data.object_id,
            data.object_value,
            object_label,
            data.assertion_type,
            data.status.unwrap_or(AssertionStatus::Proposed),
            clamp_confidence(data.confidence),
            now
        ],
    )?;
    let id = conn.last_insert_rowid();
    activity::log_event(
        conn,
        Some(researcher_id),
        data.project_id,
        "assertion_created",
        "assertion",
        id,
        Some(&format!(
            "{} {} {}",
            subject_label,
            data.predicate.trim(),
            object_label
                .as_deref()
                .or(data.object_value.as_deref())
                .unwrap_or_default()
        )),
    )?;
    load(conn, id)
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<Assertion>> {
    let sql = format!("SELECT {COLUMNS} FROM assertion WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], map_assertion_row).optional()?)
}

pub fn load(conn: &Connection, id: i64) -> Result<Assertion> {
    find(conn, id)?.ok_or_else(|| ResearchError::not_found(format!("assertion {id}")))
}

pub fn evidence(conn: &Connection, assertion_id: i64) -> Result<Vec<Evidence>> {
    let mut stmt = conn.prepare(
        "SELECT id, assertion_id, source_type, source_id, selector_json, relationship, note, added_by, created_at
         FROM assertion_evidence WHERE assertion_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![assertion_id], map_evidence_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, id: i64) -> Result<AssertionDetail> {
    let assertion = load(conn, id)?;
    let evidence = evidence(conn, id)?;
    let supporting_count = evidence
        .iter()
        .filter(|e| e.relationship == EvidenceRelationship::Supports)
        .count();
    Ok(AssertionDetail {
        assertion,
        evidence_count: evidence.len(),
        refuting_count: evidence.len() - supporting_count,
        supporting_count,
        evidence,
    })
}

pub fn update(conn: &Connection, id: i64, researcher_id: i64, changes: &AssertionUpdate) -> Result<Assertion> {
    let current = load(conn, id)?;
    let predicate = changes.predicate.clone().unwrap_or(current.predicate);
    if predicate.trim().is_empty() {
        return Err(ResearchError::invalid("predicate is required"));
    }
    conn.execute(
        "UPDATE assertion SET subject_label = ?1, predicate = ?2, object_type = ?3, object_id = ?4,
            object_value = ?5, object_label = ?6, assertion_type = ?7, confidence = ?8,
            version = version + 1, updated_at = ?9
         WHERE id = ?10",
        params![
            changes.subject_label.clone().or(current.subject_label),
            predicate.trim(),
            changes.object_type.clone().or(current.object_type),
            changes.object_id.or(current.object_id),
            changes.object_value.clone().or(current.object_value),
            changes.object_label.clone().or(current.object_label),
            changes.assertion_type.unwrap_or(current.assertion_type),
            clamp_confidence(changes.confidence).or(current.confidence),
            now_timestamp(),
            id
        ],
    )?;
    activity::log_event(
        conn,
        Some(researcher_id),
        current.project_id,
        "assertion_updated",
        "assertion",
        id,
        None,
    )?;
    load(conn, id)
}

pub fn update_status(conn: &Connection, id: i64, researcher_id: i64, status: AssertionStatus) -> Result<Assertion> {
    let current = load(conn, id)?;
    conn.execute(
        "UPDATE assertion SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status, now_timestamp(), id],
    )?;
    activity::log_event(
        conn,
        Some(researcher_id),
        current.project_id,
        status.event_name(),
        "assertion",
        id,
        current.subject_label.as_deref(),
    )?;
    if current.researcher_id != researcher_id {
        notifications::notify(
            conn,
            current.researcher_id,
            "assertion_status",
            &format!("Your assertion was marked {status}"),
            Some(&format!(
                "{} {}",
                current.subject_label.as_deref().unwrap_or_default(),
                current.predicate
            )),
            Some(&format!("/research/assertions/{id}")),
        )?;
    }
    load(conn, id)
}

pub fn add_evidence(conn: &Connection, assertion_id: i64, researcher_id: i64, data: &NewEvidence) -> Result<Evidence> {
    let assertion = load(conn, assertion_id)?;
    if data.source_type.trim().is_empty() {
        return Err(ResearchError::invalid("source_type is required"));
    }
    let selector = data.selector.as_ref().map(serde_json::to_string).transpose()?;
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO assertion_evidence (assertion_id, source_type, source_id, selector_json, relationship, note, added_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            assertion_id,
            data.source_type.trim(),
            data.source_id,
            selector,
            data.relationship,
            data.note,
            researcher_id,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE assertion SET updated_at = ?1 WHERE id = ?2",
        params![now, assertion_id],
    )?;
    activity::log_event(
        conn,
        Some(researcher_id),
        assertion.project_id,
        "evidence_added",
        "assertion",
        assertion_id,
        data.note.as_deref(),
    )?;
    evidence(conn, assertion_id)?
        .into_iter()
        .find(|e| e.id == id)
        .ok_or_else(|| ResearchError::not_found(format!("evidence {id}")))
}

pub fn remove_evidence(conn: &Connection, evidence_id: i64) -> Result<()> {
    let removed = conn.execute("DELETE FROM assertion_evidence WHERE id = ?1", params![evidence_id])?;
    if removed == 0 {
        return Err(ResearchError::not_found(format!("evidence {evidence_id}")));
    }
    Ok(())
}

/// Live assertions about the same subject and predicate whose object
/// disagrees with this one.
pub fn detect_conflicts(conn: &Connection, id: i64) -> Result<Vec<Assertion>> {
    let a = load(conn, id)?;
    let sql = format!(
        "SELECT {COLUMNS} FROM assertion
         WHERE subject_type = ?1 AND subject_id = ?2 AND predicate = ?3 AND id != ?4
           AND status != 'retracted'
           AND (object_value IS NULL OR ?5 IS NULL OR object_value != ?5)
           AND (object_id IS NULL OR ?6 IS NULL OR object_id != ?6)
         ORDER BY confidence DESC, updated_at DESC"
    );
    query_assertions(
        conn,
        &sql,
        params![a.subject_type, a.subject_id, a.predicate, a.id, a.object_value, a.object_id],
    )
}

pub fn subject_assertions(conn: &Connection, subject_type: &str, subject_id: i64) -> Result<Vec<Assertion>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM assertion WHERE subject_type = ?1 AND subject_id = ?2
         ORDER BY predicate, created_at DESC"
    );
    query_assertions(conn, &sql, params![subject_type, subject_id])
}

pub fn search(conn: &Connection, query: &str) -> Result<Vec<Assertion>> {
    let pattern = format!("%{}%", query.trim());
    let sql = format!(
        "SELECT {COLUMNS} FROM assertion
         WHERE subject_label LIKE ?1 OR object_label LIKE ?1 OR predicate LIKE ?1 OR object_value LIKE ?1
         ORDER BY updated_at DESC, id DESC LIMIT ?2"
    );
    query_assertions(conn, &sql, params![pattern, SEARCH_LIMIT])
}

pub fn list_for_project(conn: &Connection, project_id: i64, filter: &AssertionFilter) -> Result<Vec<Assertion>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM assertion
         WHERE project_id = ?1 AND (?2 IS NULL OR assertion_type = ?2) AND (?3 IS NULL OR status = ?3)
         ORDER BY created_at DESC, id DESC"
    );
    query_assertions(conn, &sql, params![project_id, filter.assertion_type, filter.status])
}

/// Turns an annotation into an assertion backed by the annotation itself.
pub fn promote_annotation(
    conn: &Connection,
    annotation_id: i64,
    researcher_id: i64,
    data: &PromoteAnnotation,
) -> Result<Assertion> {
    let source = annotation::get(conn, annotation_id)?;
    let first_target = source.targets.first();
    let subject_type = data
        .subject_type
        .clone()
        .or_else(|| first_target.map(|t| t.source_type.clone()))
        .unwrap_or_else(|| catalogue::INFORMATION_OBJECT.to_string());
    let subject_id = data
        .subject_id
        .or_else(|| first_target.and_then(|t| t.source_id))
        .or(source.object_id)
        .ok_or_else(|| ResearchError::invalid("annotation has no target to use as subject"))?;

    let created = create(
        conn,
        researcher_id,
        &NewAssertion {
            project_id: data.project_id.or(source.project_id),
            subject_type,
            subject_id,
            predicate: data.predicate.clone(),
            object_type: data.object_type.clone(),
            object_id: data.object_id,
            object_value: data.object_value.clone(),
            assertion_type: data.assertion_type,
            confidence: data.confidence,
            ..Default::default()
        },
    )?;
    add_evidence(
        conn,
        created.id,
        researcher_id,
        &NewEvidence {
            source_type: "annotation".into(),
            source_id: annotation_id,
            selector: None,
            relationship: EvidenceRelationship::Supports,
            note: annotation::body_text(&source.body),
        },
    )?;
    load(conn, created.id)
}

#[cfg(test)]
pub(crate) fn fixture(conn: &Connection, researcher_id: i64, subject_id: i64, predicate: &str, value: &str) -> Assertion {
    create(
        conn,
        researcher_id,
        &NewAssertion {
            subject_type: "actor".into(),
            subject_id,
            predicate: predicate.into(),
            object_value: Some(value.into()),
            ..Default::default()
        },
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{NewAnnotation, NewTarget};
    use crate::people::fixtures;
    use crate::storage::sqlite::test_conn;
    use serde_json::json;

    #[test]
    fn create_fills_labels_and_clamps_confidence() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        catalogue::seed(&conn, "actor", 4, "Smith, John");
        let a = create(
            &conn,
            ada.id,
            &NewAssertion {
                subject_type: "actor".into(),
                subject_id: 4,
                predicate: "memberOf".into(),
                object_type: Some("actor".into()),
                object_id: Some(9),
                confidence: Some(140.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(a.subject_label.as_deref(), Some("Smith, John"));
        assert_eq!(a.object_label.as_deref(), Some("Actor #9"));
        assert_eq!(a.confidence, Some(100.0));
        assert_eq!(a.version, 1);
        assert_eq!(a.status, AssertionStatus::Proposed);

        let log = activity::list_for_entity(&conn, "assertion", a.id).unwrap();
        assert_eq!(log[0].activity_type, "assertion_created");
    }

    #[test]
    fn update_bumps_version_and_keeps_untouched_fields() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        let a = fixture(&conn, ada.id, 1, "birthDate", "1815");
        let updated = update(
            &conn,
            a.id,
            ada.id,
            &AssertionUpdate {
                object_value: Some("1815-12-10".into()),
                assertion_type: Some(AssertionType::Chronological),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.predicate, "birthDate");
        assert_eq!(updated.object_value.as_deref(), Some("1815-12-10"));
        assert_eq!(updated.assertion_type, AssertionType::Chronological);
    }

    #[test]
    fn status_change_by_someone_else_notifies_owner() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        let bob = fixtures::researcher(&conn, "Bob", "Marley");
        let a = fixture(&conn, ada.id, 1, "birthPlace", "London");

        update_status(&conn, a.id, ada.id, AssertionStatus::Verified).unwrap();
        assert_eq!(notifications::unread_count(&conn, ada.id).unwrap(), 0);

        let disputed = update_status(&conn, a.id, bob.id, AssertionStatus::Disputed).unwrap();
        assert_eq!(disputed.status, AssertionStatus::Disputed);
        assert_eq!(notifications::unread_count(&conn, ada.id).unwrap(), 1);

        let events: Vec<String> = activity::list_for_entity(&conn, "assertion", a.id)
            .unwrap()
            .into_iter()
            .map(|e| e.activity_type)
            .collect();
        assert!(events.contains(&"assertion_verified".to_string()));
        assert!(events.contains(&"assertion_disputed".to_string()));
    }

    #[test]
    fn evidence_counts_split_by_relationship() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        let a = fixture(&conn, ada.id, 1, "occupation", "mathematician");
        add_evidence(
            &conn,
            a.id,
            ada.id,
            &NewEvidence {
                source_type: "information_object".into(),
                source_id: 10,
                ..Default::default()
            },
        )
        .unwrap();
        let refuting = add_evidence(
            &conn,
            a.id,
            ada.id,
            &NewEvidence {
                source_type: "information_object".into(),
                source_id: 11,
                relationship: EvidenceRelationship::Refutes,
                selector: Some(json!({"type": "TextQuoteSelector", "exact": "poet"})),
                note: Some("census says poet".into()),
            },
        )
        .unwrap();

        let detail = get(&conn, a.id).unwrap();
        assert_eq!(detail.evidence_count, 2);
        assert_eq!(detail.supporting_count, 1);
        assert_eq!(detail.refuting_count, 1);

        remove_evidence(&conn, refuting.id).unwrap();
        assert_eq!(get(&conn, a.id).unwrap().evidence_count, 1);
        assert!(matches!(remove_evidence(&conn, refuting.id), Err(ResearchError::NotFound(_))));
    }

    #[test]
    fn conflicts_ignore_same_object_and_retracted_rows() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        let base = fixture(&conn, ada.id, 1, "birthPlace", "London");
        fixture(&conn, ada.id, 1, "birthPlace", "London");
        let paris = fixture(&conn, ada.id, 1, "birthPlace", "Paris");
        let rome = fixture(&conn, ada.id, 1, "birthPlace", "Rome");
        fixture(&conn, ada.id, 1, "deathPlace", "Paris");
        fixture(&conn, ada.id, 2, "birthPlace", "Paris");
        update_status(&conn, rome.id, ada.id, AssertionStatus::Retracted).unwrap();

        let conflicts = detect_conflicts(&conn, base.id).unwrap();
        assert_eq!(conflicts.iter().map(|c| c.id).collect::<Vec<_>>(), vec![paris.id]);
    }

    #[test]
    fn search_and_project_listing() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        let project = fixtures::project(&conn, ada.id, "Engines");
        let a = create(
            &conn,
            ada.id,
            &NewAssertion {
                project_id: Some(project.id),
                subject_type: "actor".into(),
                subject_id: 3,
                predicate: "worksAt".into(),
                object_value: Some("Analytical Society".into()),
                assertion_type: AssertionType::Relational,
                ..Default::default()
            },
        )
        .unwrap();
        fixture(&conn, ada.id, 3, "birthPlace", "London");

        assert_eq!(search(&conn, "analytical").unwrap().len(), 1);
        assert_eq!(subject_assertions(&conn, "actor", 3).unwrap().len(), 2);

        let relational = list_for_project(
            &conn,
            project.id,
            &AssertionFilter {
                assertion_type: Some(AssertionType::Relational),
                status: None,
            },
        )
        .unwrap();
        assert_eq!(relational.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a.id]);
    }

    #[test]
    fn promoting_an_annotation_adds_supporting_evidence() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        let note = annotation::create(
            &conn,
            ada.id,
            &NewAnnotation {
                targets: vec![NewTarget {
                    source_type: Some("actor".into()),
                    source_id: Some(77),
                    ..Default::default()
                }],
                body: json!("Born in Marylebone"),
                ..Default::default()
            },
        )
        .unwrap();

        let promoted = promote_annotation(
            &conn,
            note.id,
            ada.id,
            &PromoteAnnotation {
                predicate: "birthPlace".into(),
                object_value: Some("Marylebone".into()),
                assertion_type: AssertionType::Spatial,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(promoted.subject_type, "actor");
        assert_eq!(promoted.subject_id, 77);

        let detail = get(&conn, promoted.id).unwrap();
        assert_eq!(detail.supporting_count, 1);
        assert_eq!(detail.evidence[0].source_type, "annotation");
        assert_eq!(detail.evidence[0].source_id, note.id);
        assert_eq!(detail.evidence[0].note.as_deref(), Some("Born in Marylebone"));
    }
}
