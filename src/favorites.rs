//! Per-user favourites of arbitrary typed objects, grouped in folders.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};
use crate::types::time::now_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Favorite {
    pub id: i64,
    pub user_id: i64,
    pub object_id: i64,
    pub object_type: String,
    pub title: String,
    pub url: Option<String>,
    pub folder_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Folder {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: String,
    pub item_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomFavorite {
    pub object_id: i64,
    pub object_type: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub folder_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleAction {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToggleOutcome {
    pub action: ToggleAction,
    pub favorited: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

const COLUMNS: &str = "id, user_id, object_id, object_type, title, url, folder_id, notes, created_at";

fn map_favorite_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Favorite> {
    Ok(Favorite {
        id: row.get(0)?,
        user_id: row.get(1)?,
        object_id: row.get(2)?,
        object_type: row.get(3)?,
        title: row.get(4)?,
        url: row.get(5)?,
        folder_id: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Favorite> {
    let sql = format!("SELECT {COLUMNS} FROM favorite WHERE id = ?1");
    conn.query_row(&sql, params![id], map_favorite_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("favorite {id}")))
}

fn owned_folder(conn: &Connection, user_id: i64, folder_id: i64) -> Result<()> {
    let owner: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM favorite_folder WHERE id = ?1",
            params![folder_id],
            |row| row.get(0),
        )
        .optional()?;
    match owner {
        Some(owner) if owner == user_id => Ok(()),
        _ => Err(ResearchError::Forbidden(format!(
            "folder {folder_id} not found or access denied"
        ))),
    }
}

pub fn is_favorited(conn: &Connection, user_id: i64, object_type: &str, object_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM favorite WHERE user_id = ?1 AND object_type = ?2 AND object_id = ?3",
            params![user_id, object_type, object_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Removes the (user, type, object) favourite when present, adds it otherwise.
pub fn toggle_custom(conn: &Connection, user_id: i64, data: &CustomFavorite) -> Result<ToggleOutcome> {
    if data.object_type.trim().is_empty() {
        return Err(ResearchError::invalid("object_type is required"));
    }
    let removed = conn.execute(
        "DELETE FROM favorite WHERE user_id = ?1 AND object_type = ?2 AND object_id = ?3",
        params![user_id, data.object_type, data.object_id],
    )?;
    if removed > 0 {
        return Ok(ToggleOutcome {
            action: ToggleAction::Removed,
            favorited: false,
            message: "Removed from favorites.".into(),
            id: None,
        });
    }

    if let Some(folder_id) = data.folder_id {
        owned_folder(conn, user_id, folder_id)?;
    }
    conn.execute(
        "INSERT INTO favorite (user_id, object_id, object_type, title, url, folder_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            data.object_id,
            data.object_type,
            data.title,
            data.url,
            data.folder_id,
            now_timestamp()
        ],
    )?;
    Ok(ToggleOutcome {
        action: ToggleAction::Added,
        favorited: true,
        message: "Added to favorites.".into(),
        id: Some(conn.last_insert_rowid()),
    })
}

/// Favourites of a user, newest first, optionally limited to one folder.
pub fn list(conn: &Connection, user_id: i64, folder_id: Option<i64>) -> Result<Vec<Favorite>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM favorite
         WHERE user_id = ?1 AND (?2 IS NULL OR folder_id = ?2)
         ORDER BY created_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, folder_id], map_favorite_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn count(conn: &Connection, user_id: i64) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM favorite WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(n)
}

pub fn folders(conn: &Connection, user_id: i64) -> Result<Vec<Folder>> {
    let mut stmt = conn.prepare(
        "SELECT f.id, f.user_id, f.name, f.created_at, COUNT(fav.id)
         FROM favorite_folder f LEFT JOIN favorite fav ON fav.folder_id = f.id
         WHERE f.user_id = ?1
         GROUP BY f.id, f.user_id, f.name, f.created_at
         ORDER BY f.name, f.id",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok(Folder {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
                item_count: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn create_folder(conn: &Connection, user_id: i64, name: &str) -> Result<Folder> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ResearchError::invalid("folder name is required"));
    }
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO favorite_folder (user_id, name, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, name, now],
    )?;
    Ok(Folder {
        id: conn.last_insert_rowid(),
        user_id,
        name: name.to_string(),
        created_at: now,
        item_count: 0,
    })
}

/// Moves the user's favourites into `folder_id`, or out of any folder with
/// `None`. Returns how many rows moved.
pub fn move_to_folder(conn: &Connection, user_id: i64, ids: &[i64], folder_id: Option<i64>) -> Result<usize> {
    if let Some(folder_id) = folder_id {
        owned_folder(conn, user_id, folder_id)?;
    }
    let mut stmt = conn.prepare("UPDATE favorite SET folder_id = ?1 WHERE id = ?2 AND user_id = ?3")?;
    let mut moved = 0;
    for id in ids {
        moved += stmt.execute(params![folder_id, id, user_id])?;
    }
    Ok(moved)
}

pub fn remove_bulk(conn: &Connection, user_id: i64, ids: &[i64]) -> Result<usize> {
    let mut stmt = conn.prepare("DELETE FROM favorite WHERE id = ?1 AND user_id = ?2")?;
    let mut removed = 0;
    for id in ids {
        removed += stmt.execute(params![id, user_id])?;
    }
    Ok(removed)
}

pub fn update_notes(conn: &Connection, user_id: i64, id: i64, notes: Option<&str>) -> Result<Favorite> {
    let favorite = get(conn, id)?;
    if favorite.user_id != user_id {
        return Err(ResearchError::Forbidden(format!("favorite {id} belongs to another user")));
    }
    conn.execute(
        "UPDATE favorite SET notes = ?1 WHERE id = ?2",
        params![notes, id],
    )?;
    get(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::test_conn;

    fn item(object_id: i64) -> CustomFavorite {
        CustomFavorite {
            object_id,
            object_type: "research_collection".into(),
            title: format!("Collection {object_id}"),
            url: Some(format!("/research/collections/{object_id}")),
            folder_id: None,
        }
    }

    #[test]
    fn toggle_adds_then_removes() {
        let conn = test_conn();
        let added = toggle_custom(&conn, 1, &item(10)).unwrap();
        assert_eq!(added.action, ToggleAction::Added);
        assert!(added.favorited);
        assert!(added.id.is_some());
        assert!(is_favorited(&conn, 1, "research_collection", 10).unwrap());

        let json = serde_json::to_value(&added).unwrap();
        assert_eq!(json["action"], "added");

        let removed = toggle_custom(&conn, 1, &item(10)).unwrap();
        assert_eq!(removed.action, ToggleAction::Removed);
        assert!(!removed.favorited);
        assert_eq!(serde_json::to_value(&removed).unwrap().get("id"), None);
        assert_eq!(count(&conn, 1).unwrap(), 0);
    }

    #[test]
    fn folders_count_items_and_guard_ownership() {
        let conn = test_conn();
        let folder = create_folder(&conn, 1, "Chapter 2").unwrap();
        let other = create_folder(&conn, 2, "Mine").unwrap();
        let a = toggle_custom(&conn, 1, &item(1)).unwrap().id.unwrap();
        let b = toggle_custom(&conn, 1, &item(2)).unwrap().id.unwrap();
        toggle_custom(&conn, 1, &item(3)).unwrap();

        assert_eq!(move_to_folder(&conn, 1, &[a, b, 999], Some(folder.id)).unwrap(), 2);
        assert!(matches!(
            move_to_folder(&conn, 1, &[a], Some(other.id)),
            Err(ResearchError::Forbidden(_))
        ));

        let listed = folders(&conn, 1).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].item_count, 2);
        assert_eq!(list(&conn, 1, Some(folder.id)).unwrap().len(), 2);
        assert_eq!(list(&conn, 1, None).unwrap().len(), 3);

        assert_eq!(move_to_folder(&conn, 1, &[a], None).unwrap(), 1);
        assert_eq!(list(&conn, 1, Some(folder.id)).unwrap().len(), 1);
    }

    #[test]
    fn notes_and_bulk_remove_are_owner_scoped() {
        let conn = test_conn();
        let a = toggle_custom(&conn, 1, &item(1)).unwrap().id.unwrap();
        let b = toggle_custom(&conn, 2, &item(1)).unwrap().id.unwrap();

        let noted = update_notes(&conn, 1, a, Some("check box 4")).unwrap();
        assert_eq!(noted.notes.as_deref(), Some("check box 4"));
        assert!(matches!(update_notes(&conn, 1, b, None), Err(ResearchError::Forbidden(_))));

        assert_eq!(remove_bulk(&conn, 1, &[a, b]).unwrap(), 1);
        assert_eq!(count(&conn, 2).unwrap(), 1);
    }
}
