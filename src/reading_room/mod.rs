//! Reading rooms, room bookings and the material requested for them.
//!
//! Seats, equipment and walk-in visitors hang off a room and live in the
//! submodules.

pub mod equipment;
pub mod retrieval;
pub mod seats;
pub mod walk_ins;

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};
use crate::types::time::{date_column, format_date, format_time, hhmm, now_timestamp, time_column};
use crate::types::{BookingStatus, MaterialRequestStatus, RequestPriority};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub capacity: i64,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRoom {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub capacity: i64,
}

fn map_room_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        capacity: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn create_room(conn: &Connection, data: &NewRoom) -> Result<Room> {
    if data.name.trim().is_empty() {
        return Err(ResearchError::invalid("room name is required"));
    }
    if data.capacity < 0 {
        return Err(ResearchError::invalid("capacity cannot be negative"));
    }
    conn.execute(
        "INSERT INTO reading_room (name, code, capacity, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![data.name.trim(), data.code, data.capacity, now_timestamp()],
    )?;
    let room = load_room(conn, conn.last_insert_rowid())?;
    log::info!("🏛️ Reading room {} created ({})", room.id, room.name);
    Ok(room)
}

pub fn load_room(conn: &Connection, id: i64) -> Result<Room> {
    conn.query_row(
        "SELECT id, name, code, capacity, is_active, created_at FROM reading_room WHERE id = ?1",
        params![id],
        map_room_row,
    )
    .optional()?
    .ok_or_else(|| ResearchError::not_found(format!("reading room {id}")))
}

pub fn list_rooms(conn: &Connection, active_only: bool) -> Result<Vec<Room>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, code, capacity, is_active, created_at FROM reading_room
         WHERE (?1 = 0 OR is_active = 1) ORDER BY name, id",
    )?;
    let rows = stmt
        .query_map(params![active_only], map_room_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// Bookings

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: i64,
    pub researcher_id: i64,
    pub room_id: i64,
    pub booking_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub purpose: Option<String>,
    pub status: BookingStatus,
    pub seat_id: Option<i64>,
    pub checked_in_at: Option<String>,
    pub checked_out_at: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub room_id: i64,
    pub booking_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub purpose: Option<String>,
}

const BOOKING_COLUMNS: &str = "id, researcher_id, room_id, booking_date, start_time, end_time, purpose, status,
    seat_id, checked_in_at, checked_out_at, cancellation_reason, created_at";

fn map_booking_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: row.get(0)?,
        researcher_id: row.get(1)?,
        room_id: row.get(2)?,
        booking_date: date_column(row, 3)?,
        start_time: time_column(row, 4)?,
        end_time: time_column(row, 5)?,
        purpose: row.get(6)?,
        status: row.get(7)?,
        seat_id: row.get(8)?,
        checked_in_at: row.get(9)?,
        checked_out_at: row.get(10)?,
        cancellation_reason: row.get(11)?,
        created_at: row.get(12)?,
    })
}

pub fn load_booking(conn: &Connection, id: i64) -> Result<Booking> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM booking WHERE id = ?1");
    conn.query_row(&sql, params![id], map_booking_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("booking {id}")))
}

pub fn create_booking(conn: &Connection, researcher_id: i64, data: &NewBooking) -> Result<Booking> {
    if data.start_time >= data.end_time {
        return Err(ResearchError::invalid("start_time must be before end_time"));
    }
    let room = load_room(conn, data.room_id)?;
    if !room.is_active {
        return Err(ResearchError::conflict(format!("reading room {} is closed", room.id)));
    }
    conn.execute(
        "INSERT INTO booking (researcher_id, room_id, booking_date, start_time, end_time, purpose, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
        params![
            researcher_id,
            data.room_id,
            format_date(data.booking_date),
            format_time(data.start_time),
            format_time(data.end_time),
            data.purpose,
            now_timestamp()
        ],
    )?;
    load_booking(conn, conn.last_insert_rowid())
}

/// Bookings of a room on one day, cancelled ones excluded.
pub fn bookings_for_day(conn: &Connection, room_id: i64, date: NaiveDate) -> Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM booking
         WHERE room_id = ?1 AND booking_date = ?2 AND status != 'cancelled'
         ORDER BY start_time, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![room_id, format_date(date)], map_booking_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn bookings_for_researcher(conn: &Connection, researcher_id: i64) -> Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM booking WHERE researcher_id = ?1
         ORDER BY booking_date DESC, start_time DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![researcher_id], map_booking_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn transition(conn: &Connection, booking: &Booking, from: &[BookingStatus], to: BookingStatus) -> Result<()> {
    if !from.contains(&booking.status) {
        return Err(ResearchError::conflict(format!(
            "booking {} is {} and cannot become {}",
            booking.id, booking.status, to
        )));
    }
    conn.execute(
        "UPDATE booking SET status = ?1 WHERE id = ?2",
        params![to, booking.id],
    )?;
    Ok(())
}

pub fn confirm_booking(conn: &Connection, id: i64) -> Result<Booking> {
    let booking = load_booking(conn, id)?;
    transition(conn, &booking, &[BookingStatus::Pending], BookingStatus::Confirmed)?;
    load_booking(conn, id)
}

/// Cancels the booking and gives back its seat.
pub fn cancel_booking(conn: &Connection, id: i64, reason: Option<&str>) -> Result<Booking> {
    let booking = load_booking(conn, id)?;
    transition(
        conn,
        &booking,
        &[BookingStatus::Pending, BookingStatus::Confirmed],
        BookingStatus::Cancelled,
    )?;
    conn.execute(
        "UPDATE booking SET cancellation_reason = ?1 WHERE id = ?2",
        params![reason, id],
    )?;
    seats::release(conn, id)?;
    load_booking(conn, id)
}

pub fn check_in(conn: &Connection, id: i64) -> Result<Booking> {
    let booking = load_booking(conn, id)?;
    if booking.checked_in_at.is_some() {
        return Err(ResearchError::conflict(format!("booking {id} is already checked in")));
    }
    transition(
        conn,
        &booking,
        &[BookingStatus::Pending, BookingStatus::Confirmed],
        BookingStatus::Confirmed,
    )?;
    conn.execute(
        "UPDATE booking SET checked_in_at = ?1 WHERE id = ?2",
        params![now_timestamp(), id],
    )?;
    seats::mark_occupied(conn, id)?;
    load_booking(conn, id)
}

/// Completes the visit: outstanding material goes back and the seat is
/// released.
pub fn check_out(conn: &Connection, id: i64) -> Result<Booking> {
    let booking = load_booking(conn, id)?;
    if booking.checked_in_at.is_none() {
        return Err(ResearchError::conflict(format!("booking {id} was never checked in")));
    }
    transition(conn, &booking, &[BookingStatus::Confirmed], BookingStatus::Completed)?;
    let now = now_timestamp();
    conn.execute(
        "UPDATE booking SET checked_out_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    let returned = conn.execute(
        "UPDATE material_request SET status = 'returned', returned_at = ?1, updated_at = ?1
         WHERE booking_id = ?2 AND status != 'returned'",
        params![now, id],
    )?;
    seats::release(conn, id)?;
    log::debug!("booking {} checked out, {} requests returned", id, returned);
    load_booking(conn, id)
}

// Material requests

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRequest {
    pub id: i64,
    pub booking_id: i64,
    pub object_id: i64,
    pub status: MaterialRequestStatus,
    pub priority: RequestPriority,
    pub queue_id: Option<i64>,
    pub notes: Option<String>,
    pub location_code: Option<String>,
    pub shelf_location: Option<String>,
    pub box_number: Option<String>,
    pub folder_number: Option<String>,
    pub handling_instructions: Option<String>,
    pub retrieved_at: Option<String>,
    pub retrieved_by: Option<i64>,
    pub returned_at: Option<String>,
    pub call_slip_printed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub(crate) const REQUEST_COLUMNS: &str = "mr.id, mr.booking_id, mr.object_id, mr.status, mr.priority, mr.queue_id,
    mr.notes, mr.location_code, mr.shelf_location, mr.box_number, mr.folder_number, mr.handling_instructions,
    mr.retrieved_at, mr.retrieved_by, mr.returned_at, mr.call_slip_printed_at, mr.created_at, mr.updated_at";

pub(crate) fn map_request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MaterialRequest> {
    Ok(MaterialRequest {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        object_id: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        queue_id: row.get(5)?,
        notes: row.get(6)?,
        location_code: row.get(7)?,
        shelf_location: row.get(8)?,
        box_number: row.get(9)?,
        folder_number: row.get(10)?,
        handling_instructions: row.get(11)?,
        retrieved_at: row.get(12)?,
        retrieved_by: row.get(13)?,
        returned_at: row.get(14)?,
        call_slip_printed_at: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

pub fn load_material_request(conn: &Connection, id: i64) -> Result<MaterialRequest> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM material_request mr WHERE mr.id = ?1");
    conn.query_row(&sql, params![id], map_request_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("material request {id}")))
}

pub fn add_material_request(
    conn: &Connection,
    booking_id: i64,
    object_id: i64,
    notes: Option<&str>,
) -> Result<MaterialRequest> {
    let booking = load_booking(conn, booking_id)?;
    if matches!(
        booking.status,
        BookingStatus::Cancelled | BookingStatus::Completed | BookingStatus::NoShow
    ) {
        return Err(ResearchError::conflict(format!(
            "booking {booking_id} is {} and takes no more requests",
            booking.status
        )));
    }
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO material_request (booking_id, object_id, status, notes, created_at, updated_at)
         VALUES (?1, ?2, 'requested', ?3, ?4, ?4)",
        params![booking_id, object_id, notes, now],
    )?;
    load_material_request(conn, conn.last_insert_rowid())
}

pub fn material_requests(conn: &Connection, booking_id: i64) -> Result<Vec<MaterialRequest>> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM material_request mr WHERE mr.booking_id = ?1 ORDER BY mr.id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![booking_id], map_request_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn room(conn: &Connection, name: &str) -> Room {
        create_room(
            conn,
            &NewRoom {
                name: name.into(),
                code: None,
                capacity: 20,
            },
        )
        .unwrap()
    }

    pub fn date(raw: &str) -> NaiveDate {
        crate::types::time::parse_date(raw).unwrap()
    }

    pub fn time(raw: &str) -> NaiveTime {
        crate::types::time::parse_time(raw).unwrap()
    }

    pub fn booking(conn: &Connection, researcher_id: i64, room_id: i64, day: &str, start: &str, end: &str) -> Booking {
        create_booking(
            conn,
            researcher_id,
            &NewBooking {
                room_id,
                booking_date: date(day),
                start_time: time(start),
                end_time: time(end),
                purpose: None,
            },
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::storage::sqlite::test_conn;

    #[test]
    fn booking_needs_a_forward_interval() {
        let conn = test_conn();
        let r = room(&conn, "Main");
        let err = create_booking(
            &conn,
            1,
            &NewBooking {
                room_id: r.id,
                booking_date: date("2026-03-02"),
                start_time: time("12:00"),
                end_time: time("12:00"),
                purpose: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ResearchError::InvalidInput(_)));
    }

    #[test]
    fn booking_lifecycle() {
        let conn = test_conn();
        let r = room(&conn, "Main");
        let b = booking(&conn, 1, r.id, "2026-03-02", "09:00", "12:00");
        assert_eq!(b.status, BookingStatus::Pending);

        assert_eq!(confirm_booking(&conn, b.id).unwrap().status, BookingStatus::Confirmed);
        assert!(matches!(confirm_booking(&conn, b.id), Err(ResearchError::Conflict(_))));
        assert!(matches!(check_out(&conn, b.id), Err(ResearchError::Conflict(_))));

        add_material_request(&conn, b.id, 77, Some("box 4")).unwrap();
        let checked_in = check_in(&conn, b.id).unwrap();
        assert!(checked_in.checked_in_at.is_some());

        let done = check_out(&conn, b.id).unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
        assert!(done.checked_out_at.is_some());
        let requests = material_requests(&conn, b.id).unwrap();
        assert_eq!(requests[0].status, MaterialRequestStatus::Returned);
        assert!(requests[0].returned_at.is_some());
        assert_eq!(requests[0].priority, RequestPriority::Normal);
        assert!(matches!(
            add_material_request(&conn, b.id, 78, None),
            Err(ResearchError::Conflict(_))
        ));
    }

    #[test]
    fn cancel_keeps_reason_and_hides_from_day_view() {
        let conn = test_conn();
        let r = room(&conn, "Main");
        let keep = booking(&conn, 1, r.id, "2026-03-02", "13:00", "15:00");
        let drop = booking(&conn, 2, r.id, "2026-03-02", "09:00", "10:00");
        let cancelled = cancel_booking(&conn, drop.id, Some("ill")).unwrap();
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("ill"));
        assert!(matches!(cancel_booking(&conn, drop.id, None), Err(ResearchError::Conflict(_))));

        let day = bookings_for_day(&conn, r.id, date("2026-03-02")).unwrap();
        assert_eq!(day.iter().map(|b| b.id).collect::<Vec<_>>(), vec![keep.id]);
        assert_eq!(bookings_for_researcher(&conn, 2).unwrap().len(), 1);
    }

    #[test]
    fn rooms_list_in_name_order() {
        let conn = test_conn();
        room(&conn, "West");
        room(&conn, "East");
        let names: Vec<String> = list_rooms(&conn, true).unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["East", "West"]);
        assert!(matches!(load_room(&conn, 99), Err(ResearchError::NotFound(_))));
    }
}
