//! Walk-in visitors without a prior booking.

use chrono::{NaiveDate, Timelike, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};
use crate::people::{self, NewResearcher, Researcher};
use crate::types::time::{date_column, format_date, format_time, now_timestamp, parse_time, today};
use crate::types::ResearcherStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkInVisitor {
    pub id: i64,
    pub room_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub id_type: Option<String>,
    pub id_number: Option<String>,
    pub organization: Option<String>,
    pub purpose: Option<String>,
    pub visit_date: NaiveDate,
    pub check_in_time: String,
    pub check_out_time: Option<String>,
    pub rules_acknowledged_at: Option<String>,
    pub researcher_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewWalkIn {
    pub room_id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub id_type: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub visit_date: Option<NaiveDate>,
    /// `HH:MM`; defaults to the registration time.
    #[serde(default)]
    pub check_in_time: Option<String>,
    #[serde(default)]
    pub rules_acknowledged: bool,
}

const COLUMNS: &str = "id, room_id, first_name, last_name, email, id_type, id_number, organization, purpose,
    visit_date, check_in_time, check_out_time, rules_acknowledged_at, researcher_id, created_at";

fn map_visitor_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WalkInVisitor> {
    Ok(WalkInVisitor {
        id: row.get(0)?,
        room_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        id_type: row.get(5)?,
        id_number: row.get(6)?,
        organization: row.get(7)?,
        purpose: row.get(8)?,
        visit_date: date_column(row, 9)?,
        check_in_time: row.get(10)?,
        check_out_time: row.get(11)?,
        rules_acknowledged_at: row.get(12)?,
        researcher_id: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn current_time() -> String {
    let now = Utc::now().time();
    format_time(now.with_second(0).unwrap_or(now))
}

pub fn get(conn: &Connection, id: i64) -> Result<WalkInVisitor> {
    let sql = format!("SELECT {COLUMNS} FROM walk_in_visitor WHERE id = ?1");
    conn.query_row(&sql, params![id], map_visitor_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("walk-in visitor {id}")))
}

pub fn register(conn: &Connection, data: &NewWalkIn) -> Result<WalkInVisitor> {
    if !data.rules_acknowledged {
        return Err(ResearchError::invalid("reading room rules must be acknowledged"));
    }
    if data.first_name.trim().is_empty() || data.last_name.trim().is_empty() {
        return Err(ResearchError::invalid("first_name and last_name are required"));
    }
    let room = super::load_room(conn, data.room_id)?;
    if !room.is_active {
        return Err(ResearchError::conflict(format!("reading room {} is closed", room.name)));
    }
    let now = now_timestamp();
    let check_in = match data.check_in_time.as_deref() {
        Some(raw) => format_time(parse_time(raw)?),
        None => current_time(),
    };
    conn.execute(
        "INSERT INTO walk_in_visitor (room_id, first_name, last_name, email, id_type, id_number, organization,
            purpose, visit_date, check_in_time, rules_acknowledged_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            data.room_id,
            data.first_name.trim(),
            data.last_name.trim(),
            data.email,
            data.id_type,
            data.id_number,
            data.organization,
            data.purpose,
            format_date(data.visit_date.unwrap_or_else(today)),
            check_in,
            now
        ],
    )?;
    let visitor = get(conn, conn.last_insert_rowid())?;
    log::info!(
        "🚶 Walk-in {} {} registered in {}",
        visitor.first_name,
        visitor.last_name,
        room.name
    );
    Ok(visitor)
}

pub fn checkout(conn: &Connection, id: i64) -> Result<WalkInVisitor> {
    let visitor = get(conn, id)?;
    if visitor.check_out_time.is_some() {
        return Err(ResearchError::conflict(format!("walk-in visitor {id} already checked out")));
    }
    conn.execute(
        "UPDATE walk_in_visitor SET check_out_time = ?1 WHERE id = ?2",
        params![current_time(), id],
    )?;
    get(conn, id)
}

/// Visitors registered for `date` who have not checked out.
pub fn current_on(conn: &Connection, room_id: i64, date: NaiveDate) -> Result<Vec<WalkInVisitor>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM walk_in_visitor
         WHERE room_id = ?1 AND visit_date = ?2 AND check_out_time IS NULL
         ORDER BY check_in_time, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![room_id, format_date(date)], map_visitor_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn current(conn: &Connection, room_id: i64) -> Result<Vec<WalkInVisitor>> {
    current_on(conn, room_id, today())
}

/// Visitors still in any room today.
pub fn current_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM walk_in_visitor WHERE visit_date = ?1 AND check_out_time IS NULL",
        params![format_date(today())],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Creates a pending researcher from the visitor's details and links it.
pub fn convert_to_researcher(conn: &Connection, id: i64) -> Result<Researcher> {
    let visitor = get(conn, id)?;
    if let Some(existing) = visitor.researcher_id {
        return Err(ResearchError::conflict(format!(
            "walk-in visitor {id} is already researcher {existing}"
        )));
    }
    let email = visitor
        .email
        .clone()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ResearchError::invalid("an email is required to register a researcher"))?;
    let researcher = people::create_researcher(
        conn,
        &NewResearcher {
            first_name: visitor.first_name.clone(),
            last_name: visitor.last_name.clone(),
            email,
            orcid_id: None,
            institution: visitor.organization.clone(),
            status: Some(ResearcherStatus::Pending),
        },
    )?;
    conn.execute(
        "UPDATE walk_in_visitor SET researcher_id = ?1 WHERE id = ?2",
        params![researcher.id, id],
    )?;
    log::info!("🪪 Walk-in {} converted to researcher {}", id, researcher.id);
    Ok(researcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading_room::fixtures::{date, room};
    use crate::storage::sqlite::test_conn;

    fn visitor(room_id: i64, first: &str, email: Option<&str>) -> NewWalkIn {
        NewWalkIn {
            room_id,
            first_name: first.into(),
            last_name: "Visitor".into(),
            email: email.map(str::to_string),
            organization: Some("Local History Society".into()),
            rules_acknowledged: true,
            ..Default::default()
        }
    }

    #[test]
    fn register_requires_rules() {
        let conn = test_conn();
        let r = room(&conn, "Main");
        let mut data = visitor(r.id, "Jo", None);
        data.rules_acknowledged = false;
        assert!(matches!(register(&conn, &data), Err(ResearchError::InvalidInput(_))));

        data.rules_acknowledged = true;
        let v = register(&conn, &data).unwrap();
        assert_eq!(v.visit_date, today());
        assert!(v.rules_acknowledged_at.is_some());
        assert_eq!(v.check_in_time.len(), 5);
    }

    #[test]
    fn current_lists_visitors_until_checkout() {
        let conn = test_conn();
        let r = room(&conn, "Main");
        let a = register(&conn, &visitor(r.id, "Jo", None)).unwrap();
        register(&conn, &visitor(r.id, "Sam", None)).unwrap();
        let mut past = visitor(r.id, "Kim", None);
        past.visit_date = Some(date("2020-01-01"));
        past.check_in_time = Some("10:00:30".into());
        let old = register(&conn, &past).unwrap();
        assert_eq!(old.check_in_time, "10:00");

        assert_eq!(current(&conn, r.id).unwrap().len(), 2);
        assert_eq!(current_count(&conn).unwrap(), 2);

        checkout(&conn, a.id).unwrap();
        assert!(matches!(checkout(&conn, a.id), Err(ResearchError::Conflict(_))));
        let left = current(&conn, r.id).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].first_name, "Sam");
        assert_eq!(current_on(&conn, r.id, date("2020-01-01")).unwrap().len(), 1);
    }

    #[test]
    fn convert_creates_pending_researcher_once() {
        let conn = test_conn();
        let r = room(&conn, "Main");
        let anon = register(&conn, &visitor(r.id, "Jo", None)).unwrap();
        assert!(matches!(
            convert_to_researcher(&conn, anon.id),
            Err(ResearchError::InvalidInput(_))
        ));

        let v = register(&conn, &visitor(r.id, "Sam", Some("sam@history.test"))).unwrap();
        let researcher = convert_to_researcher(&conn, v.id).unwrap();
        assert_eq!(researcher.status, ResearcherStatus::Pending);
        assert_eq!(researcher.institution.as_deref(), Some("Local History Society"));
        assert_eq!(get(&conn, v.id).unwrap().researcher_id, Some(researcher.id));
        assert!(matches!(
            convert_to_researcher(&conn, v.id),
            Err(ResearchError::Conflict(_))
        ));
    }
}
