//! Source trust scoring and stored source assessments.
//!
//! The score is a fixed weighted sum: source type (up to 40), completeness
//! (up to 30) and the mean of the quality metrics scaled to 30.

use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};
use crate::types::{time::now_timestamp, Completeness, SourceType};

pub const QUALITY_WEIGHT: f64 = 30.0;
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub source_type: f64,
    pub completeness: f64,
    pub quality: f64,
    pub total: f64,
    pub tier: Tier,
}

pub fn source_type_weight(source_type: SourceType) -> f64 {
    match source_type {
        SourceType::Primary => 40.0,
        SourceType::Secondary => 25.0,
        SourceType::Tertiary => 10.0,
        SourceType::Unknown => 0.0,
    }
}

pub fn completeness_weight(completeness: Completeness) -> f64 {
    match completeness {
        Completeness::Complete => 30.0,
        Completeness::Substantial => 20.0,
        Completeness::Partial => 15.0,
        Completeness::Fragmentary => 10.0,
        Completeness::Unknown => 0.0,
    }
}

/// Mean of the metrics, each clamped to `0..=1`, times the quality weight.
pub fn quality_component(metrics: &BTreeMap<String, f64>) -> f64 {
    if metrics.is_empty() {
        return 0.0;
    }
    let sum: f64 = metrics.values().map(|v| v.clamp(0.0, 1.0)).sum();
    sum / metrics.len() as f64 * QUALITY_WEIGHT
}

pub fn tier_for(total: f64) -> Tier {
    if total >= 70.0 {
        Tier::High
    } else if total >= 40.0 {
        Tier::Medium
    } else {
        Tier::Low
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn score(source_type: SourceType, completeness: Completeness, metrics: &BTreeMap<String, f64>) -> ScoreBreakdown {
    let source = source_type_weight(source_type);
    let complete = completeness_weight(completeness);
    let quality = quality_component(metrics);
    let total = round1(source + complete + quality).min(MAX_SCORE);
    ScoreBreakdown {
        source_type: source,
        completeness: complete,
        quality: round1(quality),
        total,
        tier: tier_for(total),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: i64,
    pub object_id: i64,
    pub researcher_id: i64,
    pub source_type: SourceType,
    pub completeness: Completeness,
    pub quality_metrics: BTreeMap<String, f64>,
    pub trust_score: f64,
    pub notes: Option<String>,
    pub created_at: String,
}

impl Assessment {
    pub fn breakdown(&self) -> ScoreBreakdown {
        score(self.source_type, self.completeness, &self.quality_metrics)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssessment {
    pub source_type: SourceType,
    pub completeness: Completeness,
    #[serde(default)]
    pub quality_metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub assessment: Option<Assessment>,
    pub breakdown: Option<ScoreBreakdown>,
    pub history: Vec<Assessment>,
}

fn map_assessment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Assessment> {
    let metrics: String = row.get(5)?;
    Ok(Assessment {
        id: row.get(0)?,
        object_id: row.get(1)?,
        researcher_id: row.get(2)?,
        source_type: row.get(3)?,
        completeness: row.get(4)?,
        quality_metrics: serde_json::from_str(&metrics).unwrap_or_default(),
        trust_score: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const COLUMNS: &str =
    "id, object_id, researcher_id, source_type, completeness, quality_metrics_json, trust_score, notes, created_at";

pub fn assess(conn: &Connection, object_id: i64, researcher_id: i64, data: &NewAssessment) -> Result<(Assessment, ScoreBreakdown)> {
    if let Some((name, _)) = data.quality_metrics.iter().find(|(_, v)| !v.is_finite()) {
        return Err(ResearchError::invalid(format!("quality metric '{name}' is not a number")));
    }
    let breakdown = score(data.source_type, data.completeness, &data.quality_metrics);
    conn.execute(
        "INSERT INTO source_assessment (object_id, researcher_id, source_type, completeness,
            quality_metrics_json, trust_score, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            object_id,
            researcher_id,
            data.source_type,
            data.completeness,
            serde_json::to_string(&data.quality_metrics)?,
            breakdown.total,
            data.notes,
            now_timestamp()
        ],
    )?;
    let id = conn.last_insert_rowid();
    let sql = format!("SELECT {COLUMNS} FROM source_assessment WHERE id = ?1");
    let stored = conn.query_row(&sql, params![id], map_assessment_row)?;
    Ok((stored, breakdown))
}

pub fn latest(conn: &Connection, object_id: i64) -> Result<Option<Assessment>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM source_assessment WHERE object_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1"
    );
    Ok(conn.query_row(&sql, params![object_id], map_assessment_row).optional()?)
}

pub fn history(conn: &Connection, object_id: i64) -> Result<Vec<Assessment>> {
    let sql = format!("SELECT {COLUMNS} FROM source_assessment WHERE object_id = ?1 ORDER BY created_at DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![object_id], map_assessment_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn report(conn: &Connection, object_id: i64) -> Result<AssessmentReport> {
    let assessment = latest(conn, object_id)?;
    Ok(AssessmentReport {
        breakdown: assessment.as_ref().map(Assessment::breakdown),
        assessment,
        history: history(conn, object_id)?,
    })
}
