//! In-app notifications with per-type delivery preferences.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};
use crate::types::{time::now_timestamp, DigestFrequency};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub researcher_id: i64,
    pub notification_type: String,
    pub title: String,
    pub message: Option<String>,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: String,
    pub read_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub notification_type: String,
    pub email_enabled: bool,
    pub in_app_enabled: bool,
    pub digest_frequency: DigestFrequency,
}

impl Preference {
    fn default_for(notification_type: &str) -> Self {
        Self {
            notification_type: notification_type.to_string(),
            email_enabled: true,
            in_app_enabled: true,
            digest_frequency: DigestFrequency::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreferenceUpdate {
    pub notification_type: String,
    #[serde(default = "enabled")]
    pub email_enabled: bool,
    #[serde(default = "enabled")]
    pub in_app_enabled: bool,
    #[serde(default)]
    pub digest_frequency: DigestFrequency,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilter {
    #[serde(default, rename = "type")]
    pub notification_type: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default)]
    pub limit: Option<i64>,
}

const DEFAULT_LIST_LIMIT: i64 = 50;

fn map_notification_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let is_read: i64 = row.get(6)?;
    Ok(Notification {
        id: row.get(0)?,
        researcher_id: row.get(1)?,
        notification_type: row.get(2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        link: row.get(5)?,
        is_read: is_read != 0,
        created_at: row.get(7)?,
        read_at: row.get(8)?,
    })
}

fn map_preference_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Preference> {
    let email: i64 = row.get(1)?;
    let in_app: i64 = row.get(2)?;
    Ok(Preference {
        notification_type: row.get(0)?,
        email_enabled: email != 0,
        in_app_enabled: in_app != 0,
        digest_frequency: row.get(3)?,
    })
}

pub fn preference(conn: &Connection, researcher_id: i64, notification_type: &str) -> Result<Preference> {
    let pref = conn
        .query_row(
            "SELECT notification_type, email_enabled, in_app_enabled, digest_frequency
             FROM notification_preference WHERE researcher_id = ?1 AND notification_type = ?2",
            params![researcher_id, notification_type],
            map_preference_row,
        )
        .optional()?;
    Ok(pref.unwrap_or_else(|| Preference::default_for(notification_type)))
}

/// Stores a notification unless the researcher disabled in-app delivery
/// for this type, in which case `None` is returned.
pub fn notify(
    conn: &Connection,
    researcher_id: i64,
    notification_type: &str,
    title: &str,
    message: Option<&str>,
    link: Option<&str>,
) -> Result<Option<i64>> {
    let pref = preference(conn, researcher_id, notification_type)?;
    if !pref.in_app_enabled {
        log::debug!(
            "notification {} suppressed for researcher {}",
            notification_type,
            researcher_id
        );
        return Ok(None);
    }
    conn.execute(
        "INSERT INTO notification (researcher_id, notification_type, title, message, link, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![researcher_id, notification_type, title, message, link, now_timestamp()],
    )?;
    Ok(Some(conn.last_insert_rowid()))
}

pub fn list(conn: &Connection, researcher_id: i64, filter: &NotificationFilter) -> Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, researcher_id, notification_type, title, message, link, is_read, created_at, read_at
         FROM notification
         WHERE researcher_id = ?1
           AND (?2 IS NULL OR notification_type = ?2)
           AND (?3 = 0 OR is_read = 0)
         ORDER BY created_at DESC, id DESC
         LIMIT ?4",
    )?;
    let rows = stmt
        .query_map(
            params![
                researcher_id,
                filter.notification_type,
                filter.unread_only as i64,
                filter.limit.unwrap_or(DEFAULT_LIST_LIMIT)
            ],
            map_notification_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn unread_count(conn: &Connection, researcher_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notification WHERE researcher_id = ?1 AND is_read = 0",
        params![researcher_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn mark_read(conn: &Connection, id: i64, researcher_id: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE notification SET is_read = 1, read_at = COALESCE(read_at, ?1)
         WHERE id = ?2 AND researcher_id = ?3",
        params![now_timestamp(), id, researcher_id],
    )?;
    if updated == 0 {
        return Err(ResearchError::not_found(format!("notification {id}")));
    }
    Ok(())
}

pub fn mark_all_read(conn: &Connection, researcher_id: i64) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE notification SET is_read = 1, read_at = ?1 WHERE researcher_id = ?2 AND is_read = 0",
        params![now_timestamp(), researcher_id],
    )?;
    Ok(updated)
}

pub fn preferences(conn: &Connection, researcher_id: i64) -> Result<Vec<Preference>> {
    let mut stmt = conn.prepare(
        "SELECT notification_type, email_enabled, in_app_enabled, digest_frequency
         FROM notification_preference WHERE researcher_id = ?1 ORDER BY notification_type",
    )?;
    let rows = stmt
        .query_map(params![researcher_id], map_preference_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn update_preference(conn: &Connection, researcher_id: i64, update: &PreferenceUpdate) -> Result<Preference> {
    if update.notification_type.trim().is_empty() {
        return Err(ResearchError::invalid("notification_type is required"));
    }
    conn.execute(
        "INSERT INTO notification_preference (researcher_id, notification_type, email_enabled, in_app_enabled, digest_frequency)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(researcher_id, notification_type) DO UPDATE SET
            email_enabled = excluded.email_enabled,
            in_app_enabled = excluded.in_app_enabled,
            digest_frequency = excluded.digest_frequency",
        params![
            researcher_id,
            update.notification_type.trim(),
            update.email_enabled as i64,
            update.in_app_enabled as i64,
            update.digest_frequency
        ],
    )?;
    preference(conn, researcher_id, update.notification_type.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::test_conn;

    #[test]
    fn notify_respects_in_app_preference() {
        let conn = test_conn();
        assert!(notify(&conn, 1, "assertion_status", "Verified", None, None)
            .unwrap()
            .is_some());

        update_preference(
            &conn,
            1,
            &PreferenceUpdate {
                notification_type: "assertion_status".into(),
                email_enabled: false,
                in_app_enabled: false,
                digest_frequency: DigestFrequency::Never,
            },
        )
        .unwrap();
        assert!(notify(&conn, 1, "assertion_status", "Disputed", None, None)
            .unwrap()
            .is_none());
        assert!(notify(&conn, 1, "booking", "Confirmed", None, None)
            .unwrap()
            .is_some());
        assert_eq!(unread_count(&conn, 1).unwrap(), 2);
    }

    #[test]
    fn list_filters_by_type_and_unread() {
        let conn = test_conn();
        let first = notify(&conn, 1, "booking", "One", None, None).unwrap().unwrap();
        notify(&conn, 1, "booking", "Two", Some("body"), Some("/x")).unwrap();
        notify(&conn, 1, "validation", "Three", None, None).unwrap();
        notify(&conn, 2, "booking", "Other user", None, None).unwrap();
        mark_read(&conn, first, 1).unwrap();

        let unread_bookings = list(
            &conn,
            1,
            &NotificationFilter {
                notification_type: Some("booking".into()),
                unread_only: true,
                limit: None,
            },
        )
        .unwrap();
        assert_eq!(unread_bookings.len(), 1);
        assert_eq!(unread_bookings[0].title, "Two");

        let all = list(&conn, 1, &NotificationFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn mark_read_only_touches_own_rows() {
        let conn = test_conn();
        let id = notify(&conn, 1, "booking", "Mine", None, None).unwrap().unwrap();
        assert!(matches!(mark_read(&conn, id, 2), Err(ResearchError::NotFound(_))));
        notify(&conn, 1, "booking", "Again", None, None).unwrap();
        assert_eq!(mark_all_read(&conn, 1).unwrap(), 2);
        assert_eq!(unread_count(&conn, 1).unwrap(), 0);
    }

    #[test]
    fn missing_preference_defaults_to_immediate() {
        let conn = test_conn();
        let pref = preference(&conn, 9, "digest").unwrap();
        assert!(pref.email_enabled && pref.in_app_enabled);
        assert_eq!(pref.digest_frequency, DigestFrequency::Immediate);
        assert!(preferences(&conn, 9).unwrap().is_empty());
    }
}
