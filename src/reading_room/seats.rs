//! Seats in a reading room and their assignment to bookings.
//!
//! An assignment copies the booking's room, date and interval, so seat
//! availability is answered from `seat_assignment` alone.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::load_booking;
use crate::error::{ResearchError, Result};
use crate::types::time::{format_date, format_time, hhmm, now_timestamp, time_column};
use crate::types::{AssignmentStatus, BookingStatus, SeatType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub room_id: i64,
    pub seat_number: String,
    pub seat_label: Option<String>,
    pub seat_type: SeatType,
    pub zone: Option<String>,
    pub has_power: bool,
    pub has_lamp: bool,
    pub has_computer: bool,
    pub has_magnifier: bool,
    pub is_active: bool,
    pub sort_order: i64,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSeat {
    pub room_id: i64,
    pub seat_number: String,
    #[serde(default)]
    pub seat_label: Option<String>,
    #[serde(default)]
    pub seat_type: SeatType,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default = "yes")]
    pub has_power: bool,
    #[serde(default = "yes")]
    pub has_lamp: bool,
    #[serde(default)]
    pub has_computer: bool,
    #[serde(default)]
    pub has_magnifier: bool,
    #[serde(default)]
    pub sort_order: i64,
}

impl NewSeat {
    pub fn standard(room_id: i64, seat_number: impl Into<String>) -> Self {
        Self {
            room_id,
            seat_number: seat_number.into(),
            seat_label: None,
            seat_type: SeatType::Standard,
            zone: None,
            has_power: true,
            has_lamp: true,
            has_computer: false,
            has_magnifier: false,
            sort_order: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeatUpdate {
    #[serde(default)]
    pub seat_label: Option<String>,
    #[serde(default)]
    pub seat_type: Option<SeatType>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub has_power: Option<bool>,
    #[serde(default)]
    pub has_lamp: Option<bool>,
    #[serde(default)]
    pub has_computer: Option<bool>,
    #[serde(default)]
    pub has_magnifier: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeatPreferences {
    #[serde(default)]
    pub seat_type: Option<SeatType>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub needs_power: bool,
    #[serde(default)]
    pub needs_computer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeatAssignment {
    pub id: i64,
    pub booking_id: i64,
    pub seat_id: i64,
    pub room_id: i64,
    pub assignment_date: String,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub status: AssignmentStatus,
    pub assigned_by: Option<i64>,
    pub assigned_at: String,
    pub released_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occupancy {
    pub room_id: i64,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub at: NaiveTime,
    pub total_seats: i64,
    pub occupied_seats: i64,
    pub available_seats: i64,
    pub upcoming_bookings: i64,
    pub occupancy_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeatMapEntry {
    #[serde(flatten)]
    pub seat: Seat,
    /// `available`, or the status of the assignment covering the time.
    pub status: String,
    pub booking_id: Option<i64>,
    pub researcher_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeatUsage {
    pub seat_id: i64,
    pub seat_number: String,
    pub seat_label: Option<String>,
    pub usage_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeUsage {
    pub seat_type: SeatType,
    pub usage_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyUsage {
    pub date: String,
    pub assignments: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeatStatistics {
    pub total_assignments: i64,
    pub most_used_seats: Vec<SeatUsage>,
    pub usage_by_type: Vec<TypeUsage>,
    pub daily_occupancy: Vec<DailyUsage>,
}

const MOST_USED_LIMIT: i64 = 10;

const SEAT_COLUMNS: &str = "id, room_id, seat_number, seat_label, seat_type, zone, has_power, has_lamp,
    has_computer, has_magnifier, is_active, sort_order";

fn map_seat_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Seat> {
    Ok(Seat {
        id: row.get(0)?,
        room_id: row.get(1)?,
        seat_number: row.get(2)?,
        seat_label: row.get(3)?,
        seat_type: row.get(4)?,
        zone: row.get(5)?,
        has_power: row.get(6)?,
        has_lamp: row.get(7)?,
        has_computer: row.get(8)?,
        has_magnifier: row.get(9)?,
        is_active: row.get(10)?,
        sort_order: row.get(11)?,
    })
}

const ASSIGNMENT_COLUMNS: &str = "id, booking_id, seat_id, room_id, assignment_date, start_time, end_time, status,
    assigned_by, assigned_at, released_at";

fn map_assignment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SeatAssignment> {
    Ok(SeatAssignment {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        seat_id: row.get(2)?,
        room_id: row.get(3)?,
        assignment_date: row.get(4)?,
        start_time: time_column(row, 5)?,
        end_time: time_column(row, 6)?,
        status: row.get(7)?,
        assigned_by: row.get(8)?,
        assigned_at: row.get(9)?,
        released_at: row.get(10)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Seat> {
    let sql = format!("SELECT {SEAT_COLUMNS} FROM seat WHERE id = ?1");
    conn.query_row(&sql, params![id], map_seat_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("seat {id}")))
}

pub fn list_for_room(conn: &Connection, room_id: i64, active_only: bool) -> Result<Vec<Seat>> {
    let sql = format!(
        "SELECT {SEAT_COLUMNS} FROM seat WHERE room_id = ?1 AND (?2 = 0 OR is_active = 1)
         ORDER BY sort_order, seat_number"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![room_id, active_only], map_seat_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn create(conn: &Connection, data: &NewSeat) -> Result<Seat> {
    let number = data.seat_number.trim();
    if number.is_empty() {
        return Err(ResearchError::invalid("seat_number is required"));
    }
    super::load_room(conn, data.room_id)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO seat (room_id, seat_number, seat_label, seat_type, zone, has_power, has_lamp,
            has_computer, has_magnifier, sort_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            data.room_id,
            number,
            data.seat_label,
            data.seat_type,
            data.zone,
            data.has_power,
            data.has_lamp,
            data.has_computer,
            data.has_magnifier,
            data.sort_order,
            now_timestamp()
        ],
    )?;
    if inserted == 0 {
        return Err(ResearchError::conflict(format!(
            "seat {number} already exists in room {}",
            data.room_id
        )));
    }
    get(conn, conn.last_insert_rowid())
}

pub fn update(conn: &Connection, id: i64, changes: &SeatUpdate) -> Result<Seat> {
    let seat = get(conn, id)?;
    conn.execute(
        "UPDATE seat SET seat_label = ?1, seat_type = ?2, zone = ?3, has_power = ?4, has_lamp = ?5,
            has_computer = ?6, has_magnifier = ?7, is_active = ?8, sort_order = ?9
         WHERE id = ?10",
        params![
            changes.seat_label.clone().or(seat.seat_label),
            changes.seat_type.unwrap_or(seat.seat_type),
            changes.zone.clone().or(seat.zone),
            changes.has_power.unwrap_or(seat.has_power),
            changes.has_lamp.unwrap_or(seat.has_lamp),
            changes.has_computer.unwrap_or(seat.has_computer),
            changes.has_magnifier.unwrap_or(seat.has_magnifier),
            changes.is_active.unwrap_or(seat.is_active),
            changes.sort_order.unwrap_or(seat.sort_order),
            id
        ],
    )?;
    get(conn, id)
}

/// Soft delete; past assignments keep pointing at the seat.
pub fn deactivate(conn: &Connection, id: i64) -> Result<Seat> {
    update(
        conn,
        id,
        &SeatUpdate {
            is_active: Some(false),
            ..Default::default()
        },
    )
}

/// Active seats of the room with no live assignment overlapping
/// `[start, end)` on `date`.
pub fn available(
    conn: &Connection,
    room_id: i64,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    seat_type: Option<SeatType>,
) -> Result<Vec<Seat>> {
    let sql = format!(
        "SELECT {SEAT_COLUMNS} FROM seat
         WHERE room_id = ?1 AND is_active = 1 AND (?5 IS NULL OR seat_type = ?5)
           AND id NOT IN (
               SELECT seat_id FROM seat_assignment
               WHERE room_id = ?1 AND assignment_date = ?2
                 AND status IN ('assigned', 'occupied')
                 AND start_time < ?4 AND end_time > ?3)
         ORDER BY sort_order, seat_number"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![room_id, format_date(date), format_time(start), format_time(end), seat_type],
            map_seat_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// The live assignment of a booking, if any.
pub fn current_assignment(conn: &Connection, booking_id: i64) -> Result<Option<SeatAssignment>> {
    let sql = format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM seat_assignment
         WHERE booking_id = ?1 AND status IN ('assigned', 'occupied') ORDER BY id DESC LIMIT 1"
    );
    Ok(conn.query_row(&sql, params![booking_id], map_assignment_row).optional()?)
}

/// Seats a pending or confirmed booking. A live assignment the booking
/// already holds is released first, so a booking never holds two seats.
pub fn assign(conn: &Connection, booking_id: i64, seat_id: i64, assigned_by: Option<i64>) -> Result<SeatAssignment> {
    let booking = load_booking(conn, booking_id)?;
    if !matches!(booking.status, BookingStatus::Pending | BookingStatus::Confirmed) {
        return Err(ResearchError::conflict(format!(
            "booking {booking_id} is {} and cannot be seated",
            booking.status
        )));
    }
    let free = available(
        conn,
        booking.room_id,
        booking.booking_date,
        booking.start_time,
        booking.end_time,
        None,
    )?;
    if !free.iter().any(|s| s.id == seat_id) {
        return Err(ResearchError::conflict(format!(
            "seat {seat_id} is not available for booking {booking_id}"
        )));
    }
    if release(conn, booking_id)? {
        log::debug!("booking {} moved to seat {}", booking_id, seat_id);
    }
    conn.execute(
        "INSERT INTO seat_assignment (booking_id, seat_id, room_id, assignment_date, start_time, end_time,
            status, assigned_by, assigned_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'assigned', ?7, ?8)",
        params![
            booking_id,
            seat_id,
            booking.room_id,
            format_date(booking.booking_date),
            format_time(booking.start_time),
            format_time(booking.end_time),
            assigned_by,
            now_timestamp()
        ],
    )?;
    let id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE booking SET seat_id = ?1 WHERE id = ?2",
        params![seat_id, booking_id],
    )?;
    let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM seat_assignment WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], map_assignment_row)?)
}

/// Picks the first seat matching the preferences, else the first free
/// seat. Returns `None` when the room is full for the booking's interval.
pub fn auto_assign(
    conn: &Connection,
    booking_id: i64,
    prefs: &SeatPreferences,
    assigned_by: Option<i64>,
) -> Result<Option<SeatAssignment>> {
    let booking = load_booking(conn, booking_id)?;
    let free = available(
        conn,
        booking.room_id,
        booking.booking_date,
        booking.start_time,
        booking.end_time,
        None,
    )?;
    let preferred = free.iter().find(|seat| {
        prefs.seat_type.map_or(true, |t| seat.seat_type == t)
            && prefs.zone.as_deref().map_or(true, |z| seat.zone.as_deref() == Some(z))
            && (!prefs.needs_power || seat.has_power)
            && (!prefs.needs_computer || seat.has_computer)
    });
    match preferred.or_else(|| free.first()) {
        Some(seat) => Ok(Some(assign(conn, booking_id, seat.id, assigned_by)?)),
        None => {
            log::warn!("no free seat in room {} for booking {}", booking.room_id, booking_id);
            Ok(None)
        }
    }
}

/// Releases the booking's live assignments and clears its seat.
pub fn release(conn: &Connection, booking_id: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE seat_assignment SET status = 'released', released_at = ?1
         WHERE booking_id = ?2 AND status IN ('assigned', 'occupied')",
        params![now_timestamp(), booking_id],
    )?;
    conn.execute("UPDATE booking SET seat_id = NULL WHERE id = ?1", params![booking_id])?;
    Ok(updated > 0)
}

pub fn mark_occupied(conn: &Connection, booking_id: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE seat_assignment SET status = 'occupied' WHERE booking_id = ?1 AND status = 'assigned'",
        params![booking_id],
    )?;
    Ok(updated > 0)
}

/// Seats in use at `at` on `date`, and assignments still to start.
pub fn occupancy(conn: &Connection, room_id: i64, date: NaiveDate, at: NaiveTime) -> Result<Occupancy> {
    let total_seats: i64 = conn.query_row(
        "SELECT COUNT(*) FROM seat WHERE room_id = ?1 AND is_active = 1",
        params![room_id],
        |row| row.get(0),
    )?;
    let day = format_date(date);
    let now = format_time(at);
    let occupied_seats: i64 = conn.query_row(
        "SELECT COUNT(*) FROM seat_assignment
         WHERE room_id = ?1 AND assignment_date = ?2 AND status IN ('assigned', 'occupied')
           AND start_time <= ?3 AND end_time >= ?3",
        params![room_id, day, now],
        |row| row.get(0),
    )?;
    let upcoming_bookings: i64 = conn.query_row(
        "SELECT COUNT(*) FROM seat_assignment
         WHERE room_id = ?1 AND assignment_date = ?2 AND status = 'assigned' AND start_time > ?3",
        params![room_id, day, now],
        |row| row.get(0),
    )?;
    let occupancy_percentage = if total_seats > 0 {
        (occupied_seats as f64 / total_seats as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };
    Ok(Occupancy {
        room_id,
        date,
        at,
        total_seats,
        occupied_seats,
        available_seats: total_seats - occupied_seats,
        upcoming_bookings,
        occupancy_percentage,
    })
}

pub fn seat_map(conn: &Connection, room_id: i64, date: NaiveDate, at: NaiveTime) -> Result<Vec<SeatMapEntry>> {
    let seats = list_for_room(conn, room_id, true)?;
    let mut stmt = conn.prepare(
        "SELECT sa.status, sa.booking_id, b.researcher_id
         FROM seat_assignment sa JOIN booking b ON b.id = sa.booking_id
         WHERE sa.seat_id = ?1 AND sa.assignment_date = ?2 AND sa.status IN ('assigned', 'occupied')
           AND sa.start_time <= ?3 AND sa.end_time >= ?3
         ORDER BY sa.id DESC LIMIT 1",
    )?;
    let day = format_date(date);
    let now = format_time(at);
    let mut entries = Vec::with_capacity(seats.len());
    for seat in seats {
        let current: Option<(AssignmentStatus, i64, i64)> = stmt
            .query_row(params![seat.id, day, now], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .optional()?;
        entries.push(match current {
            Some((status, booking_id, researcher_id)) => SeatMapEntry {
                seat,
                status: status.to_string(),
                booking_id: Some(booking_id),
                researcher_id: Some(researcher_id),
            },
            None => SeatMapEntry {
                seat,
                status: "available".into(),
                booking_id: None,
                researcher_id: None,
            },
        });
    }
    Ok(entries)
}

static SEAT_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]*)(\d+)-([A-Za-z]*)(\d+)$").expect("Invalid seat range regex"));

/// Upper bound on the seats one pattern may name.
pub const MAX_PATTERN_SEATS: usize = 1000;

/// Expands `A1-A10` or `1-20` ranges; anything else is a comma list.
/// The second prefix, when present, must repeat the first.
pub fn parse_pattern(pattern: &str) -> Result<Vec<String>> {
    let pattern = pattern.trim();
    if let Some(caps) = SEAT_RANGE.captures(pattern) {
        let prefix = &caps[1];
        let repeated = &caps[3];
        if repeated.is_empty() || repeated == prefix {
            if let (Ok(start), Ok(end)) = (caps[2].parse::<u64>(), caps[4].parse::<u64>()) {
                if end >= start && end - start >= MAX_PATTERN_SEATS as u64 {
                    return Err(ResearchError::invalid(format!(
                        "seat range '{pattern}' names more than {MAX_PATTERN_SEATS} seats"
                    )));
                }
                return Ok((start..=end).map(|n| format!("{prefix}{n}")).collect());
            }
        }
    }
    let numbers: Vec<String> = pattern
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if numbers.len() > MAX_PATTERN_SEATS {
        return Err(ResearchError::invalid(format!(
            "seat list names more than {MAX_PATTERN_SEATS} seats"
        )));
    }
    Ok(numbers)
}

/// Creates the seats named by `pattern`, skipping numbers the room
/// already has. Returns how many were created.
pub fn bulk_create(
    conn: &Connection,
    room_id: i64,
    pattern: &str,
    seat_type: SeatType,
    zone: Option<&str>,
) -> Result<usize> {
    super::load_room(conn, room_id)?;
    let mut created = 0;
    for (index, number) in parse_pattern(pattern)?.into_iter().enumerate() {
        let seat = NewSeat {
            seat_type,
            zone: zone.map(str::to_string),
            sort_order: index as i64,
            ..NewSeat::standard(room_id, number)
        };
        match create(conn, &seat) {
            Ok(_) => created += 1,
            Err(ResearchError::Conflict(msg)) => log::debug!("skipping seat: {}", msg),
            Err(err) => return Err(err),
        }
    }
    log::info!("💺 Created {} seats in room {} from '{}'", created, room_id, pattern);
    Ok(created)
}

/// Assignment counts between two dates inclusive, for one room or all.
pub fn statistics(conn: &Connection, room_id: Option<i64>, from: NaiveDate, to: NaiveDate) -> Result<SeatStatistics> {
    let (from, to) = (format_date(from), format_date(to));
    const RANGE: &str = "(?1 IS NULL OR sa.room_id = ?1) AND sa.assignment_date BETWEEN ?2 AND ?3";

    let total_assignments: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM seat_assignment sa WHERE {RANGE}"),
        params![room_id, from, to],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT s.id, s.seat_number, s.seat_label, COUNT(*) AS usage_count
         FROM seat_assignment sa JOIN seat s ON s.id = sa.seat_id
         WHERE {RANGE}
         GROUP BY s.id, s.seat_number, s.seat_label
         ORDER BY usage_count DESC, s.seat_number
         LIMIT ?4"
    ))?;
    let most_used_seats = stmt
        .query_map(params![room_id, from, to, MOST_USED_LIMIT], |row| {
            Ok(SeatUsage {
                seat_id: row.get(0)?,
                seat_number: row.get(1)?,
                seat_label: row.get(2)?,
                usage_count: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT s.seat_type, COUNT(*) AS usage_count
         FROM seat_assignment sa JOIN seat s ON s.id = sa.seat_id
         WHERE {RANGE}
         GROUP BY s.seat_type ORDER BY usage_count DESC, s.seat_type"
    ))?;
    let usage_by_type = stmt
        .query_map(params![room_id, from, to], |row| {
            Ok(TypeUsage {
                seat_type: row.get(0)?,
                usage_count: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT sa.assignment_date, COUNT(*) FROM seat_assignment sa
         WHERE {RANGE} GROUP BY sa.assignment_date ORDER BY sa.assignment_date"
    ))?;
    let daily_occupancy = stmt
        .query_map(params![room_id, from, to], |row| {
            Ok(DailyUsage {
                date: row.get(0)?,
                assignments: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(SeatStatistics {
        total_assignments,
        most_used_seats,
        usage_by_type,
        daily_occupancy,
    })
}
