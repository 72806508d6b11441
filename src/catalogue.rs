//! Catalogue entities: the archival records (actors, descriptions,
//! repositories, terms) that research data points at.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};
use crate::types::time::now_timestamp;

pub const INFORMATION_OBJECT: &str = "information_object";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueEntity {
    pub entity_type: String,
    pub entity_id: i64,
    pub label: String,
    pub description: Option<String>,
    pub repository_id: Option<i64>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityInput {
    pub entity_type: String,
    pub entity_id: i64,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub repository_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntitySearch {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub repository_id: Option<i64>,
}

fn map_entity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogueEntity> {
    Ok(CatalogueEntity {
        entity_type: row.get(0)?,
        entity_id: row.get(1)?,
        label: row.get(2)?,
        description: row.get(3)?,
        repository_id: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn upsert(conn: &Connection, input: &EntityInput) -> Result<CatalogueEntity> {
    if input.entity_type.trim().is_empty() {
        return Err(ResearchError::invalid("entity_type is required"));
    }
    if input.label.trim().is_empty() {
        return Err(ResearchError::invalid("label is required"));
    }
    conn.execute(
        "INSERT INTO catalogue_entity (entity_type, entity_id, label, description, repository_id, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(entity_type, entity_id) DO UPDATE SET
            label = excluded.label,
            description = excluded.description,
            repository_id = excluded.repository_id,
            updated_at = excluded.updated_at",
        params![
            input.entity_type.trim(),
            input.entity_id,
            input.label.trim(),
            input.description,
            input.repository_id,
            now_timestamp()
        ],
    )?;
    find(conn, input.entity_type.trim(), input.entity_id)?
        .ok_or_else(|| ResearchError::not_found(format!("{} {}", input.entity_type, input.entity_id)))
}

pub fn find(conn: &Connection, entity_type: &str, entity_id: i64) -> Result<Option<CatalogueEntity>> {
    let row = conn
        .query_row(
            "SELECT entity_type, entity_id, label, description, repository_id, updated_at
             FROM catalogue_entity WHERE entity_type = ?1 AND entity_id = ?2",
            params![entity_type, entity_id],
            map_entity_row,
        )
        .optional()?;
    Ok(row)
}

/// Display label used when a catalogue record carries no name.
pub fn fallback_label(entity_type: &str, entity_id: i64) -> String {
    match entity_type {
        "actor" => format!("Actor #{entity_id}"),
        INFORMATION_OBJECT => format!("Object #{entity_id}"),
        "repository" => format!("Repository #{entity_id}"),
        other => {
            let spaced = other.replace('_', " ");
            let mut chars = spaced.chars();
            let titled = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            };
            format!("{titled} #{entity_id}")
        }
    }
}

pub fn label_for(conn: &Connection, entity_type: &str, entity_id: i64) -> Result<String> {
    Ok(find(conn, entity_type, entity_id)?
        .map(|e| e.label)
        .unwrap_or_else(|| fallback_label(entity_type, entity_id)))
}

/// LIKE search over label and description, ordered by label.
pub fn search(conn: &Connection, search: &EntitySearch, limit: i64) -> Result<Vec<CatalogueEntity>> {
    let entity_type = search
        .entity_type
        .clone()
        .unwrap_or_else(|| INFORMATION_OBJECT.to_string());
    let pattern = format!("%{}%", search.query.trim());
    let mut stmt = conn.prepare(
        "SELECT entity_type, entity_id, label, description, repository_id, updated_at
         FROM catalogue_entity
         WHERE entity_type = ?1
           AND (?2 = '%%' OR label LIKE ?2 OR IFNULL(description, '') LIKE ?2)
           AND (?3 IS NULL OR repository_id = ?3)
         ORDER BY label, entity_id
         LIMIT ?4",
    )?;
    let rows = stmt
        .query_map(
            params![entity_type, pattern, search.repository_id, limit],
            map_entity_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) fn seed(conn: &Connection, entity_type: &str, entity_id: i64, label: &str) -> CatalogueEntity {
    upsert(
        conn,
        &EntityInput {
            entity_type: entity_type.into(),
            entity_id,
            label: label.into(),
            description: None,
            repository_id: None,
        },
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::test_conn;

    #[test]
    fn fallback_labels_follow_entity_type() {
        assert_eq!(fallback_label("actor", 3), "Actor #3");
        assert_eq!(fallback_label("information_object", 9), "Object #9");
        assert_eq!(fallback_label("repository", 1), "Repository #1");
        assert_eq!(fallback_label("physical_object", 5), "Physical object #5");
    }

    #[test]
    fn upsert_replaces_label() {
        let conn = test_conn();
        seed(&conn, "actor", 1, "Smith, John");
        let updated = seed(&conn, "actor", 1, "Smith, John A.");
        assert_eq!(updated.label, "Smith, John A.");
        assert_eq!(label_for(&conn, "actor", 1).unwrap(), "Smith, John A.");
        assert_eq!(label_for(&conn, "actor", 2).unwrap(), "Actor #2");
    }

    #[test]
    fn search_matches_label_or_description_within_type() {
        let conn = test_conn();
        seed(&conn, INFORMATION_OBJECT, 1, "Harbour survey");
        upsert(
            &conn,
            &EntityInput {
                entity_type: INFORMATION_OBJECT.into(),
                entity_id: 2,
                label: "Letters".into(),
                description: Some("Correspondence about the harbour".into()),
                repository_id: Some(4),
            },
        )
        .unwrap();
        seed(&conn, "actor", 3, "Harbour Board");

        let hits = search(
            &conn,
            &EntitySearch {
                query: "harbour".into(),
                ..Default::default()
            },
            50,
        )
        .unwrap();
        assert_eq!(hits.iter().map(|e| e.entity_id).collect::<Vec<_>>(), vec![1, 2]);

        let scoped = search(
            &conn,
            &EntitySearch {
                query: "harbour".into(),
                entity_type: None,
                repository_id: Some(4),
            },
            50,
        )
        .unwrap();
        assert_eq!(scoped.len(), 1);

        let everything = search(&conn, &EntitySearch::default(), 50).unwrap();
        assert_eq!(everything.len(), 2);
    }
}
