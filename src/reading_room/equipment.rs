//! Bookable reading-room equipment: readers, scanners, cameras and the like.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};
use crate::types::time::{date_column, format_date, format_time, hhmm, now_timestamp, time_column};
use crate::types::{EquipmentBookingStatus, EquipmentCondition, EquipmentType, ReturnCondition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: i64,
    pub room_id: Option<i64>,
    pub name: String,
    pub equipment_type: EquipmentType,
    pub code: Option<String>,
    pub max_booking_hours: i64,
    pub booking_increment_minutes: i64,
    pub condition_status: EquipmentCondition,
    pub is_available: bool,
    pub created_at: String,
}

fn default_max_hours() -> i64 {
    4
}

fn default_increment() -> i64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEquipment {
    #[serde(default)]
    pub room_id: Option<i64>,
    pub name: String,
    pub equipment_type: EquipmentType,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default = "default_max_hours")]
    pub max_booking_hours: i64,
    #[serde(default = "default_increment")]
    pub booking_increment_minutes: i64,
    #[serde(default)]
    pub condition_status: EquipmentCondition,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EquipmentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub max_booking_hours: Option<i64>,
    #[serde(default)]
    pub booking_increment_minutes: Option<i64>,
    #[serde(default)]
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentBooking {
    pub id: i64,
    pub equipment_id: i64,
    pub researcher_id: i64,
    pub booking_id: Option<i64>,
    pub booking_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub purpose: Option<String>,
    pub status: EquipmentBookingStatus,
    pub checked_out_at: Option<String>,
    pub returned_at: Option<String>,
    pub return_condition: Option<ReturnCondition>,
    pub return_notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEquipmentBooking {
    pub equipment_id: i64,
    #[serde(default)]
    pub booking_id: Option<i64>,
    pub booking_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceEntry {
    pub id: i64,
    pub equipment_id: i64,
    pub condition_status: EquipmentCondition,
    pub notes: Option<String>,
    pub logged_by: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeCount {
    pub equipment_type: EquipmentType,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntry {
    #[serde(flatten)]
    pub booking: EquipmentBooking,
    pub equipment_name: String,
    pub equipment_type: EquipmentType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: EquipmentBookingStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentUsage {
    pub equipment_id: i64,
    pub name: String,
    pub equipment_type: EquipmentType,
    pub usage_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStats {
    pub total_bookings: i64,
    pub by_status: Vec<StatusCount>,
    pub most_used: Vec<EquipmentUsage>,
    pub by_type: Vec<TypeCount>,
}

const MOST_USED_LIMIT: i64 = 10;

const COLUMNS: &str = "id, room_id, name, equipment_type, code, max_booking_hours, booking_increment_minutes,
    condition_status, is_available, created_at";

fn map_equipment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Equipment> {
    Ok(Equipment {
        id: row.get(0)?,
        room_id: row.get(1)?,
        name: row.get(2)?,
        equipment_type: row.get(3)?,
        code: row.get(4)?,
        max_booking_hours: row.get(5)?,
        booking_increment_minutes: row.get(6)?,
        condition_status: row.get(7)?,
        is_available: row.get(8)?,
        created_at: row.get(9)?,
    })
}

const BOOKING_COLUMNS: &str = "eb.id, eb.equipment_id, eb.researcher_id, eb.booking_id, eb.booking_date,
    eb.start_time, eb.end_time, eb.purpose, eb.status, eb.checked_out_at, eb.returned_at,
    eb.return_condition, eb.return_notes, eb.created_at";

fn map_booking_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EquipmentBooking> {
    Ok(EquipmentBooking {
        id: row.get(0)?,
        equipment_id: row.get(1)?,
        researcher_id: row.get(2)?,
        booking_id: row.get(3)?,
        booking_date: date_column(row, 4)?,
        start_time: time_column(row, 5)?,
        end_time: time_column(row, 6)?,
        purpose: row.get(7)?,
        status: row.get(8)?,
        checked_out_at: row.get(9)?,
        returned_at: row.get(10)?,
        return_condition: row.get(11)?,
        return_notes: row.get(12)?,
        created_at: row.get(13)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Equipment> {
    let sql = format!("SELECT {COLUMNS} FROM equipment WHERE id = ?1");
    conn.query_row(&sql, params![id], map_equipment_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("equipment {id}")))
}

pub fn list(conn: &Connection, room_id: Option<i64>) -> Result<Vec<Equipment>> {
    let sql = format!("SELECT {COLUMNS} FROM equipment WHERE (?1 IS NULL OR room_id = ?1) ORDER BY name, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![room_id], map_equipment_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn create(conn: &Connection, data: &NewEquipment) -> Result<Equipment> {
    if data.name.trim().is_empty() {
        return Err(ResearchError::invalid("equipment name is required"));
    }
    if data.max_booking_hours <= 0 || data.booking_increment_minutes <= 0 {
        return Err(ResearchError::invalid("booking limits must be positive"));
    }
    if let Some(room_id) = data.room_id {
        super::load_room(conn, room_id)?;
    }
    let available = data.condition_status != EquipmentCondition::OutOfService;
    conn.execute(
        "INSERT INTO equipment (room_id, name, equipment_type, code, max_booking_hours, booking_increment_minutes,
            condition_status, is_available, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            data.room_id,
            data.name.trim(),
            data.equipment_type,
            data.code,
            data.max_booking_hours,
            data.booking_increment_minutes,
            data.condition_status,
            available,
            now_timestamp()
        ],
    )?;
    get(conn, conn.last_insert_rowid())
}

pub fn update(conn: &Connection, id: i64, changes: &EquipmentUpdate) -> Result<Equipment> {
    let current = get(conn, id)?;
    let max_hours = changes.max_booking_hours.unwrap_or(current.max_booking_hours);
    let increment = changes
        .booking_increment_minutes
        .unwrap_or(current.booking_increment_minutes);
    if max_hours <= 0 || increment <= 0 {
        return Err(ResearchError::invalid("booking limits must be positive"));
    }
    conn.execute(
        "UPDATE equipment SET name = ?1, code = ?2, max_booking_hours = ?3, booking_increment_minutes = ?4,
            is_available = ?5
         WHERE id = ?6",
        params![
            changes.name.clone().unwrap_or(current.name),
            changes.code.clone().or(current.code),
            max_hours,
            increment,
            changes.is_available.unwrap_or(current.is_available),
            id
        ],
    )?;
    get(conn, id)
}

/// Equipment marked available with no reserved or in-use booking
/// overlapping `[start, end)` on `date`.
pub fn available(
    conn: &Connection,
    room_id: Option<i64>,
    equipment_type: Option<EquipmentType>,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> Result<Vec<Equipment>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM equipment
         WHERE is_available = 1 AND (?1 IS NULL OR room_id = ?1) AND (?2 IS NULL OR equipment_type = ?2)
           AND id NOT IN (
               SELECT equipment_id FROM equipment_booking
               WHERE booking_date = ?3 AND status IN ('reserved', 'in_use')
                 AND start_time < ?5 AND end_time > ?4)
         ORDER BY name, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![room_id, equipment_type, format_date(date), format_time(start), format_time(end)],
            map_equipment_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn load_booking(conn: &Connection, id: i64) -> Result<EquipmentBooking> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM equipment_booking eb WHERE eb.id = ?1");
    conn.query_row(&sql, params![id], map_booking_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("equipment booking {id}")))
}

pub fn book(conn: &Connection, researcher_id: i64, data: &NewEquipmentBooking) -> Result<EquipmentBooking> {
    if data.start_time >= data.end_time {
        return Err(ResearchError::invalid("start_time must be before end_time"));
    }
    let equipment = get(conn, data.equipment_id)?;
    let minutes = (data.end_time - data.start_time).num_minutes();
    if minutes > equipment.max_booking_hours * 60 {
        return Err(ResearchError::invalid(format!(
            "{} can be booked for at most {} hours",
            equipment.name, equipment.max_booking_hours
        )));
    }
    let free = available(
        conn,
        equipment.room_id,
        Some(equipment.equipment_type),
        data.booking_date,
        data.start_time,
        data.end_time,
    )?;
    if !free.iter().any(|e| e.id == equipment.id) {
        return Err(ResearchError::conflict(format!(
            "{} is not available for the requested time slot",
            equipment.name
        )));
    }
    conn.execute(
        "INSERT INTO equipment_booking (equipment_id, researcher_id, booking_id, booking_date, start_time, end_time,
            purpose, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'reserved', ?8)",
        params![
            equipment.id,
            researcher_id,
            data.booking_id,
            format_date(data.booking_date),
            format_time(data.start_time),
            format_time(data.end_time),
            data.purpose,
            now_timestamp()
        ],
    )?;
    load_booking(conn, conn.last_insert_rowid())
}

fn move_booking(
    conn: &Connection,
    id: i64,
    from: &[EquipmentBookingStatus],
    to: EquipmentBookingStatus,
) -> Result<EquipmentBooking> {
    let booking = load_booking(conn, id)?;
    if !from.contains(&booking.status) {
        return Err(ResearchError::conflict(format!(
            "equipment booking {id} is {} and cannot become {to}",
            booking.status
        )));
    }
    conn.execute(
        "UPDATE equipment_booking SET status = ?1 WHERE id = ?2",
        params![to, id],
    )?;
    Ok(booking)
}

pub fn checkout(conn: &Connection, id: i64) -> Result<EquipmentBooking> {
    move_booking(conn, id, &[EquipmentBookingStatus::Reserved], EquipmentBookingStatus::InUse)?;
    conn.execute(
        "UPDATE equipment_booking SET checked_out_at = ?1 WHERE id = ?2",
        params![now_timestamp(), id],
    )?;
    load_booking(conn, id)
}

/// Closes the booking. Equipment returned damaged goes out for repair.
pub fn return_equipment(
    conn: &Connection,
    id: i64,
    condition: Option<ReturnCondition>,
    notes: Option<&str>,
) -> Result<EquipmentBooking> {
    let booking = move_booking(
        conn,
        id,
        &[EquipmentBookingStatus::Reserved, EquipmentBookingStatus::InUse],
        EquipmentBookingStatus::Returned,
    )?;
    let now = now_timestamp();
    conn.execute(
        "UPDATE equipment_booking SET returned_at = ?1, return_condition = ?2, return_notes = ?3 WHERE id = ?4",
        params![now, condition, notes, id],
    )?;
    if condition == Some(ReturnCondition::Damaged) {
        conn.execute(
            "UPDATE equipment SET condition_status = ?1, is_available = 0 WHERE id = ?2",
            params![EquipmentCondition::NeedsRepair, booking.equipment_id],
        )?;
        conn.execute(
            "INSERT INTO equipment_maintenance (equipment_id, condition_status, notes, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                booking.equipment_id,
                EquipmentCondition::NeedsRepair,
                format!("Damaged on return: {}", notes.unwrap_or("no details")),
                now
            ],
        )?;
        log::warn!("🔧 Equipment {} returned damaged, withdrawn for repair", booking.equipment_id);
    }
    load_booking(conn, id)
}

pub fn cancel(conn: &Connection, id: i64) -> Result<EquipmentBooking> {
    move_booking(conn, id, &[EquipmentBookingStatus::Reserved], EquipmentBookingStatus::Cancelled)?;
    load_booking(conn, id)
}

pub fn no_show(conn: &Connection, id: i64) -> Result<EquipmentBooking> {
    move_booking(conn, id, &[EquipmentBookingStatus::Reserved], EquipmentBookingStatus::NoShow)?;
    load_booking(conn, id)
}

/// Records a maintenance visit. Only `out_of_service` takes the
/// equipment off the booking list.
pub fn log_maintenance(
    conn: &Connection,
    equipment_id: i64,
    new_condition: EquipmentCondition,
    notes: Option<&str>,
    logged_by: Option<i64>,
) -> Result<MaintenanceEntry> {
    get(conn, equipment_id)?;
    let now = now_timestamp();
    conn.execute(
        "UPDATE equipment SET condition_status = ?1, is_available = ?2 WHERE id = ?3",
        params![
            new_condition,
            new_condition != EquipmentCondition::OutOfService,
            equipment_id
        ],
    )?;
    conn.execute(
        "INSERT INTO equipment_maintenance (equipment_id, condition_status, notes, logged_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![equipment_id, new_condition, notes, logged_by, now],
    )?;
    Ok(MaintenanceEntry {
        id: conn.last_insert_rowid(),
        equipment_id,
        condition_status: new_condition,
        notes: notes.map(str::to_string),
        logged_by,
        created_at: now,
    })
}

pub fn maintenance_history(conn: &Connection, equipment_id: i64) -> Result<Vec<MaintenanceEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, equipment_id, condition_status, notes, logged_by, created_at
         FROM equipment_maintenance WHERE equipment_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(params![equipment_id], |row| {
            Ok(MaintenanceEntry {
                id: row.get(0)?,
                equipment_id: row.get(1)?,
                condition_status: row.get(2)?,
                notes: row.get(3)?,
                logged_by: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Available equipment per type.
pub fn type_counts(conn: &Connection, room_id: Option<i64>) -> Result<Vec<TypeCount>> {
    let mut stmt = conn.prepare(
        "SELECT equipment_type, COUNT(*) FROM equipment
         WHERE is_available = 1 AND (?1 IS NULL OR room_id = ?1)
         GROUP BY equipment_type ORDER BY equipment_type",
    )?;
    let rows = stmt
        .query_map(params![room_id], |row| {
            Ok(TypeCount {
                equipment_type: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Reserved and in-use bookings for one day, by start time.
pub fn daily_schedule(conn: &Connection, room_id: Option<i64>, date: NaiveDate) -> Result<Vec<ScheduleEntry>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, e.name, e.equipment_type
         FROM equipment_booking eb JOIN equipment e ON e.id = eb.equipment_id
         WHERE eb.booking_date = ?1 AND eb.status IN ('reserved', 'in_use')
           AND (?2 IS NULL OR e.room_id = ?2)
         ORDER BY eb.start_time, e.name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![format_date(date), room_id], |row| {
            Ok(ScheduleEntry {
                booking: map_booking_row(row)?,
                equipment_name: row.get(14)?,
                equipment_type: row.get(15)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Booking counts between two dates inclusive. Usage counts only
/// bookings that were actually picked up.
pub fn usage_stats(conn: &Connection, room_id: Option<i64>, from: NaiveDate, to: NaiveDate) -> Result<UsageStats> {
    let (from, to) = (format_date(from), format_date(to));
    const RANGE: &str = "(?1 IS NULL OR e.room_id = ?1) AND eb.booking_date BETWEEN ?2 AND ?3";
    const USED: &str = "eb.status IN ('in_use', 'returned')";

    let total_bookings: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM equipment_booking eb JOIN equipment e ON e.id = eb.equipment_id WHERE {RANGE}"
        ),
        params![room_id, from, to],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT eb.status, COUNT(*) FROM equipment_booking eb JOIN equipment e ON e.id = eb.equipment_id
         WHERE {RANGE} GROUP BY eb.status ORDER BY eb.status"
    ))?;
    let by_status = stmt
        .query_map(params![room_id, from, to], |row| {
            Ok(StatusCount {
                status: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT e.id, e.name, e.equipment_type, COUNT(*) AS usage_count
         FROM equipment_booking eb JOIN equipment e ON e.id = eb.equipment_id
         WHERE {RANGE} AND {USED}
         GROUP BY e.id, e.name, e.equipment_type
         ORDER BY usage_count DESC, e.name LIMIT ?4"
    ))?;
    let most_used = stmt
        .query_map(params![room_id, from, to, MOST_USED_LIMIT], |row| {
            Ok(EquipmentUsage {
                equipment_id: row.get(0)?,
                name: row.get(1)?,
                equipment_type: row.get(2)?,
                usage_count: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT e.equipment_type, COUNT(*) AS usage_count
         FROM equipment_booking eb JOIN equipment e ON e.id = eb.equipment_id
         WHERE {RANGE} AND {USED}
         GROUP BY e.equipment_type ORDER BY usage_count DESC, e.equipment_type"
    ))?;
    let by_type = stmt
        .query_map(params![room_id, from, to], |row| {
            Ok(TypeCount {
                equipment_type: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(UsageStats {
        total_bookings,
        by_status,
        most_used,
        by_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading_room::fixtures::{date, room, time};
    use crate::storage::sqlite::test_conn;

    fn scanner(conn: &Connection, room_id: i64, name: &str) -> Equipment {
        create(
            conn,
            &NewEquipment {
                room_id: Some(room_id),
                name: name.into(),
                equipment_type: EquipmentType::Scanner,
                code: None,
                max_booking_hours: 2,
                booking_increment_minutes: 30,
                condition_status: EquipmentCondition::Good,
            },
        )
        .unwrap()
    }

    fn slot(equipment_id: i64, day: &str, start: &str, end: &str) -> NewEquipmentBooking {
        NewEquipmentBooking {
            equipment_id,
            booking_id: None,
            booking_date: date(day),
            start_time: time(start),
            end_time: time(end),
            purpose: None,
        }
    }

    #[test]
    fn booking_respects_limits_and_overlaps() {
        let conn = test_conn();
        let r = room(&conn, "Main");
        let s = scanner(&conn, r.id, "Flatbed");

        let err = book(&conn, 1, &slot(s.id, "2026-03-02", "09:00", "11:30")).unwrap_err();
        assert!(matches!(err, ResearchError::InvalidInput(_)));

        book(&conn, 1, &slot(s.id, "2026-03-02", "09:00", "11:00")).unwrap();
        let clash = book(&conn, 2, &slot(s.id, "2026-03-02", "10:30", "11:30")).unwrap_err();
        assert!(matches!(clash, ResearchError::Conflict(_)));
        book(&conn, 2, &slot(s.id, "2026-03-02", "11:00", "12:00")).unwrap();

        let free = available(&conn, Some(r.id), None, date("2026-03-02"), time("09:30"), time("10:00")).unwrap();
        assert!(free.is_empty());
    }

    #[test]
    fn lifecycle_transitions_are_guarded() {
        let conn = test_conn();
        let r = room(&conn, "Main");
        let s = scanner(&conn, r.id, "Flatbed");
        let b = book(&conn, 1, &slot(s.id, "2026-03-02", "09:00", "10:00")).unwrap();

        let out = checkout(&conn, b.id).unwrap();
        assert_eq!(out.status, EquipmentBookingStatus::InUse);
        assert!(matches!(cancel(&conn, b.id), Err(ResearchError::Conflict(_))));
        assert!(matches!(no_show(&conn, b.id), Err(ResearchError::Conflict(_))));

        let back = return_equipment(&conn, b.id, Some(ReturnCondition::Good), None).unwrap();
        assert_eq!(back.status, EquipmentBookingStatus::Returned);
        assert!(get(&conn, s.id).unwrap().is_available);

        let other = book(&conn, 1, &slot(s.id, "2026-03-03", "09:00", "10:00")).unwrap();
        assert_eq!(no_show(&conn, other.id).unwrap().status, EquipmentBookingStatus::NoShow);
    }

    #[test]
    fn damaged_return_withdraws_equipment() {
        let conn = test_conn();
        let r = room(&conn, "Main");
        let s = scanner(&conn, r.id, "Flatbed");
        let b = book(&conn, 1, &slot(s.id, "2026-03-02", "09:00", "10:00")).unwrap();
        checkout(&conn, b.id).unwrap();
        return_equipment(&conn, b.id, Some(ReturnCondition::Damaged), Some("cracked glass")).unwrap();

        let e = get(&conn, s.id).unwrap();
        assert_eq!(e.condition_status, EquipmentCondition::NeedsRepair);
        assert!(!e.is_available);
        assert!(matches!(
            book(&conn, 1, &slot(s.id, "2026-03-04", "09:00", "10:00")),
            Err(ResearchError::Conflict(_))
        ));

        log_maintenance(&conn, s.id, EquipmentCondition::Fair, Some("glass replaced"), Some(3)).unwrap();
        assert!(get(&conn, s.id).unwrap().is_available);
        log_maintenance(&conn, s.id, EquipmentCondition::OutOfService, None, None).unwrap();
        assert!(!get(&conn, s.id).unwrap().is_available);
        assert_eq!(maintenance_history(&conn, s.id).unwrap().len(), 3);
    }

    #[test]
    fn schedule_counts_and_usage() {
        let conn = test_conn();
        let r = room(&conn, "Main");
        let a = scanner(&conn, r.id, "Flatbed");
        let b = scanner(&conn, r.id, "Overhead");
        create(
            &conn,
            &NewEquipment {
                room_id: Some(r.id),
                name: "Reader".into(),
                equipment_type: EquipmentType::MicrofilmReader,
                code: None,
                max_booking_hours: 4,
                booking_increment_minutes: 30,
                condition_status: EquipmentCondition::Good,
            },
        )
        .unwrap();

        let first = book(&conn, 1, &slot(a.id, "2026-03-02", "13:00", "14:00")).unwrap();
        let second = book(&conn, 2, &slot(b.id, "2026-03-02", "09:00", "10:00")).unwrap();
        let third = book(&conn, 3, &slot(a.id, "2026-03-02", "15:00", "16:00")).unwrap();
        checkout(&conn, first.id).unwrap();
        return_equipment(&conn, first.id, None, None).unwrap();
        cancel(&conn, third.id).unwrap();

        let schedule = daily_schedule(&conn, Some(r.id), date("2026-03-02")).unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].booking.id, second.id);
        assert_eq!(schedule[0].equipment_name, "Overhead");

        let counts = type_counts(&conn, Some(r.id)).unwrap();
        assert_eq!(counts.len(), 2);
        assert!(counts.contains(&TypeCount {
            equipment_type: EquipmentType::Scanner,
            count: 2
        }));

        let stats = usage_stats(&conn, Some(r.id), date("2026-03-01"), date("2026-03-31")).unwrap();
        assert_eq!(stats.total_bookings, 3);
        assert_eq!(stats.by_status.len(), 3);
        assert_eq!(stats.most_used.len(), 1);
        assert_eq!(stats.most_used[0].equipment_id, a.id);
    }
}
