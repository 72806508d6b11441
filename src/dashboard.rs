//! Sidebar counters for the acting researcher.
//!
//! Each counter is advisory: a failing lookup is logged and reads as zero.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;
use crate::types::time::{format_date, today};
use crate::{favorites, notifications, reading_room::walk_ins, validation};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub pending_validations: i64,
    pub proposed_resolutions: i64,
    pub unread_notifications: i64,
    pub todays_bookings: i64,
    pub current_walk_ins: i64,
    pub favorites: i64,
}

fn fail_open(counter: &str, value: Result<i64>) -> i64 {
    value.unwrap_or_else(|err| {
        log::warn!("⚠️ Dashboard counter {counter} unavailable: {err}");
        0
    })
}

fn proposed_resolutions(conn: &Connection) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM entity_resolution WHERE status = 'proposed'",
        [],
        |row| row.get(0),
    )?;
    Ok(n)
}

fn todays_bookings(conn: &Connection, researcher_id: i64) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM booking
         WHERE researcher_id = ?1 AND booking_date = ?2 AND status IN ('pending', 'confirmed')",
        params![researcher_id, format_date(today())],
        |row| row.get(0),
    )?;
    Ok(n)
}

pub fn counters(conn: &Connection, researcher_id: i64) -> Dashboard {
    Dashboard {
        pending_validations: fail_open(
            "pending_validations",
            validation::stats(conn, Some(researcher_id)).map(|s| s.pending),
        ),
        proposed_resolutions: fail_open("proposed_resolutions", proposed_resolutions(conn)),
        unread_notifications: fail_open(
            "unread_notifications",
            notifications::unread_count(conn, researcher_id),
        ),
        todays_bookings: fail_open("todays_bookings", todays_bookings(conn, researcher_id)),
        current_walk_ins: fail_open("current_walk_ins", walk_ins::current_count(conn)),
        favorites: fail_open("favorites", favorites::count(conn, researcher_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::CustomFavorite;
    use crate::reading_room::{self, fixtures::room, NewBooking};
    use crate::storage::sqlite::test_conn;

    #[test]
    fn counts_activity_for_researcher() {
        let conn = test_conn();
        let r = room(&conn, "Main");
        reading_room::create_booking(
            &conn,
            7,
            &NewBooking {
                room_id: r.id,
                booking_date: today(),
                start_time: reading_room::fixtures::time("09:00"),
                end_time: reading_room::fixtures::time("10:00"),
                purpose: None,
            },
        )
        .unwrap();
        favorites::toggle_custom(
            &conn,
            7,
            &CustomFavorite {
                object_id: 1,
                object_type: "information_object".into(),
                title: "Letters".into(),
                url: None,
                folder_id: None,
            },
        )
        .unwrap();

        let d = counters(&conn, 7);
        assert_eq!(d.todays_bookings, 1);
        assert_eq!(d.favorites, 1);
        assert_eq!(d.pending_validations, 0);
        assert_eq!(counters(&conn, 8).todays_bookings, 0);
    }

    #[test]
    fn failing_counters_read_as_zero() {
        let conn = test_conn();
        conn.execute_batch("DROP TABLE favorite; DROP TABLE notification;").unwrap();
        let d = counters(&conn, 1);
        assert_eq!(d, Dashboard::default());
    }
}
