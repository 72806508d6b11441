//! ODRL rights policies on catalogue targets and their evaluation.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResearchError, Result};
use crate::types::{
    time::{now_timestamp, TIMESTAMP_FORMAT},
    ConstraintOperator, LeftOperand, OdrlAction, PolicyType,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(rename = "leftOperand")]
    pub left_operand: LeftOperand,
    pub operator: ConstraintOperator,
    #[serde(rename = "rightOperand")]
    pub right_operand: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: i64,
    pub target_type: String,
    pub target_id: i64,
    pub policy_type: PolicyType,
    pub action_type: OdrlAction,
    pub constraints: Vec<Constraint>,
    pub assigner: Option<String>,
    pub assignee: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
}

/// Constraints arrive either as an array or as a JSON-encoded string.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPolicy {
    pub target_type: String,
    pub target_id: i64,
    pub policy_type: PolicyType,
    pub action_type: OdrlAction,
    #[serde(default, alias = "constraints_json")]
    pub constraints: Value,
    #[serde(default)]
    pub assigner: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}

/// The facts a policy is evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRequest {
    pub action: OdrlAction,
    pub researcher_id: Option<i64>,
    pub purpose: Option<String>,
    pub date_time: NaiveDateTime,
    pub count: Option<f64>,
    pub spatial: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Permit,
    Deny,
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub decision: Outcome,
    pub reason: String,
    pub matched_policy_ids: Vec<i64>,
    pub duties: Vec<Policy>,
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and RFC 3339 style
/// `YYYY-MM-DDTHH:MM:SS[Z]`.
pub fn parse_instant(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn validate_constraint(raw: &Value) -> Result<Constraint> {
    let constraint: Constraint = serde_json::from_value(raw.clone())
        .map_err(|err| ResearchError::invalid(format!("invalid constraint: {err}")))?;
    let operands: Vec<&Value> = match constraint.operator {
        ConstraintOperator::IsAnyOf | ConstraintOperator::IsNoneOf => constraint
            .right_operand
            .as_array()
            .map(|items| items.iter().collect())
            .ok_or_else(|| {
                ResearchError::invalid(format!("{} needs a list rightOperand", constraint.operator))
            })?,
        _ => vec![&constraint.right_operand],
    };
    for operand in operands {
        let ok = match constraint.left_operand {
            LeftOperand::DateTime => operand.as_str().and_then(parse_instant).is_some(),
            LeftOperand::Count => operand.as_f64().is_some(),
            _ => scalar_text(operand).is_some(),
        };
        if !ok {
            return Err(ResearchError::invalid(format!(
                "rightOperand {operand} does not fit {}",
                constraint.left_operand
            )));
        }
    }
    Ok(constraint)
}

pub fn parse_constraints(raw: &Value) -> Result<Vec<Constraint>> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::String(s) => {
            let decoded: Value = serde_json::from_str(s)
                .map_err(|err| ResearchError::invalid(format!("constraints are not JSON: {err}")))?;
            parse_constraints(&decoded)
        }
        Value::Array(items) => items.iter().map(validate_constraint).collect(),
        Value::Object(_) => Ok(vec![validate_constraint(raw)?]),
        _ => Err(ResearchError::invalid("constraints must be a list")),
    }
}

fn map_policy_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Policy> {
    let constraints: String = row.get(5)?;
    Ok(Policy {
        id: row.get(0)?,
        target_type: row.get(1)?,
        target_id: row.get(2)?,
        policy_type: row.get(3)?,
        action_type: row.get(4)?,
        constraints: serde_json::from_str(&constraints).unwrap_or_default(),
        assigner: row.get(6)?,
        assignee: row.get(7)?,
        created_by: row.get(8)?,
        created_at: row.get(9)?,
    })
}

const COLUMNS: &str =
    "id, target_type, target_id, policy_type, action_type, constraints_json, assigner, assignee, created_by, created_at";

pub fn create(conn: &Connection, created_by: i64, data: &NewPolicy) -> Result<Policy> {
    if data.target_type.trim().is_empty() {
        return Err(ResearchError::invalid("target_type is required"));
    }
    let constraints = parse_constraints(&data.constraints)?;
    conn.execute(
        "INSERT INTO rights_policy (target_type, target_id, policy_type, action_type, constraints_json,
            assigner, assignee, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            data.target_type.trim(),
            data.target_id,
            data.policy_type,
            data.action_type,
            serde_json::to_string(&constraints)?,
            data.assigner,
            data.assignee,
            created_by,
            now_timestamp()
        ],
    )?;
    let id = conn.last_insert_rowid();
    log::info!(
        "🔏 ODRL {} on {} {} for '{}' created",
        data.policy_type,
        data.target_type,
        data.target_id,
        data.action_type
    );
    get(conn, id)
}

pub fn get(conn: &Connection, id: i64) -> Result<Policy> {
    let sql = format!("SELECT {COLUMNS} FROM rights_policy WHERE id = ?1");
    conn.query_row(&sql, params![id], map_policy_row)
        .map_err(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => ResearchError::not_found(format!("policy {id}")),
            other => other.into(),
        })
}

/// Removes a policy. Only the researcher who created it may do so.
pub fn delete(conn: &Connection, id: i64, researcher_id: i64) -> Result<()> {
    let policy = get(conn, id)?;
    if policy.created_by != Some(researcher_id) {
        return Err(ResearchError::Forbidden(format!(
            "policy {id} was created by another researcher"
        )));
    }
    conn.execute("DELETE FROM rights_policy WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn list(conn: &Connection, target_type: Option<&str>, target_id: Option<i64>) -> Result<Vec<Policy>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM rights_policy
         WHERE (?1 IS NULL OR target_type = ?1) AND (?2 IS NULL OR target_id = ?2)
         ORDER BY target_type, target_id, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![target_type, target_id], map_policy_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn policies_for(conn: &Connection, target_type: &str, target_id: i64) -> Result<Vec<Policy>> {
    list(conn, Some(target_type), Some(target_id))
}

fn compare_text(operator: ConstraintOperator, actual: &str, expected: &Value) -> bool {
    let in_list = || {
        expected
            .as_array()
            .map(|items| items.iter().filter_map(scalar_text).any(|v| v == actual))
            .unwrap_or(false)
    };
    match operator {
        ConstraintOperator::Eq => scalar_text(expected).as_deref() == Some(actual),
        ConstraintOperator::Neq => scalar_text(expected).as_deref() != Some(actual),
        ConstraintOperator::IsAnyOf => in_list(),
        ConstraintOperator::IsNoneOf => !in_list(),
        _ => false,
    }
}

fn compare_ordered<T: PartialOrd>(
    operator: ConstraintOperator,
    actual: T,
    expected: &Value,
    parse: impl Fn(&Value) -> Option<T>,
) -> bool {
    let in_list = || {
        expected
            .as_array()
            .map(|items| items.iter().filter_map(&parse).any(|v| v == actual))
            .unwrap_or(false)
    };
    match operator {
        ConstraintOperator::IsAnyOf => return in_list(),
        ConstraintOperator::IsNoneOf => return !in_list(),
        _ => {}
    }
    let Some(expected) = parse(expected) else {
        return false;
    };
    match operator {
        ConstraintOperator::Eq => actual == expected,
        ConstraintOperator::Neq => actual != expected,
        ConstraintOperator::Lt => actual < expected,
        ConstraintOperator::Lteq => actual <= expected,
        ConstraintOperator::Gt => actual > expected,
        ConstraintOperator::Gteq => actual >= expected,
        ConstraintOperator::IsAnyOf | ConstraintOperator::IsNoneOf => false,
    }
}

/// A constraint whose operand the request does not carry is not satisfied.
pub fn constraint_holds(constraint: &Constraint, request: &AccessRequest) -> bool {
    let op = constraint.operator;
    let expected = &constraint.right_operand;
    match constraint.left_operand {
        LeftOperand::DateTime => compare_ordered(op, request.date_time, expected, |v| {
            v.as_str().and_then(parse_instant)
        }),
        LeftOperand::Count => match request.count {
            Some(count) => compare_ordered(op, count, expected, Value::as_f64),
            None => false,
        },
        LeftOperand::Purpose => match &request.purpose {
            Some(purpose) => compare_text(op, purpose, expected),
            None => false,
        },
        LeftOperand::Recipient => match request.researcher_id {
            Some(id) => compare_text(op, &id.to_string(), expected),
            None => false,
        },
        LeftOperand::Spatial => match &request.spatial {
            Some(place) => compare_text(op, place, expected),
            None => false,
        },
    }
}

fn applies(policy: &Policy, request: &AccessRequest) -> bool {
    policy.action_type.covers(request.action)
        && policy.constraints.iter().all(|c| constraint_holds(c, request))
}

/// Prohibitions win over permissions. Obligations ride along as duties of
/// a permit.
pub fn evaluate(policies: &[Policy], request: &AccessRequest) -> Decision {
    let relevant: Vec<&Policy> = policies
        .iter()
        .filter(|p| p.action_type.covers(request.action))
        .collect();
    let applicable = |kind: PolicyType| {
        relevant
            .iter()
            .copied()
            .filter(|p| p.policy_type == kind && applies(p, request))
            .collect::<Vec<_>>()
    };

    let prohibitions = applicable(PolicyType::Prohibition);
    if !prohibitions.is_empty() {
        return Decision {
            decision: Outcome::Deny,
            reason: format!("prohibited by policy {}", prohibitions[0].id),
            matched_policy_ids: prohibitions.iter().map(|p| p.id).collect(),
            duties: Vec::new(),
        };
    }

    let permissions = applicable(PolicyType::Permission);
    if !permissions.is_empty() {
        let duties: Vec<Policy> = applicable(PolicyType::Obligation).into_iter().cloned().collect();
        return Decision {
            decision: Outcome::Permit,
            reason: format!("permitted by policy {}", permissions[0].id),
            matched_policy_ids: permissions.iter().map(|p| p.id).collect(),
            duties,
        };
    }

    if relevant.iter().any(|p| p.policy_type == PolicyType::Permission) {
        return Decision {
            decision: Outcome::Deny,
            reason: "no permission constraint satisfied".into(),
            matched_policy_ids: Vec::new(),
            duties: Vec::new(),
        };
    }

    Decision {
        decision: Outcome::NotApplicable,
        reason: format!("no policy covers '{}'", request.action),
        matched_policy_ids: Vec::new(),
        duties: Vec::new(),
    }
}
