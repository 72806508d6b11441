//! Researcher bibliographies and their citation entries.
//!
//! Entries keep flat citation fields so they can be written out to RIS,
//! BibTeX, CSL-JSON, Mendeley JSON or Zotero RDF, and read back from RIS
//! and BibTeX files.

mod formats;

pub use formats::{
    export, parse_bibtex, parse_citation, parse_ris, to_bibtex, to_csl_json, to_mendeley_json, to_ris,
    to_zotero_rdf,
};

use rand::{rngs::OsRng, RngCore};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalogue::{self, INFORMATION_OBJECT};
use crate::error::{ResearchError, Result};
use crate::types::time::{format_date, now_timestamp, today};
use crate::types::EntryType;

pub const DEFAULT_CITATION_STYLE: &str = "chicago";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bibliography {
    pub id: i64,
    pub researcher_id: i64,
    pub project_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub citation_style: String,
    pub is_public: bool,
    pub share_token: String,
    pub entry_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBibliography {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub citation_style: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BibliographyUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub citation_style: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub id: i64,
    pub bibliography_id: i64,
    pub object_id: Option<i64>,
    pub entry_type: EntryType,
    pub csl_data: Option<Value>,
    pub title: Option<String>,
    /// `; `-separated, each name as `Family, Given` or a literal.
    pub authors: Option<String>,
    pub date: Option<String>,
    pub publisher: Option<String>,
    pub container_title: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub accessed_date: Option<String>,
    pub archive_name: Option<String>,
    pub archive_location: Option<String>,
    pub collection_title: Option<String>,
    #[serde(rename = "box")]
    pub box_number: Option<String>,
    pub folder: Option<String>,
    pub notes: Option<String>,
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Entry fields as submitted or parsed; on update, absent fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewEntry {
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub entry_type: Option<EntryType>,
    #[serde(default)]
    pub csl_data: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub container_title: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub pages: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub accessed_date: Option<String>,
    #[serde(default)]
    pub archive_name: Option<String>,
    #[serde(default)]
    pub archive_location: Option<String>,
    #[serde(default)]
    pub collection_title: Option<String>,
    #[serde(default, rename = "box")]
    pub box_number: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub errors: Vec<String>,
    pub total: usize,
}

const BIBLIOGRAPHY_COLUMNS: &str = "b.id, b.researcher_id, b.project_id, b.name, b.description, b.citation_style,
    b.is_public, b.share_token,
    (SELECT COUNT(*) FROM bibliography_entry e WHERE e.bibliography_id = b.id),
    b.created_at, b.updated_at";

const ENTRY_COLUMNS: &str = "id, bibliography_id, object_id, entry_type, csl_json, title, authors, date,
    publisher, container_title, volume, issue, pages, doi, url, accessed_date, archive_name,
    archive_location, collection_title, box, folder, notes, sort_order, created_at, updated_at";

fn map_bibliography_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bibliography> {
    Ok(Bibliography {
        id: row.get(0)?,
        researcher_id: row.get(1)?,
        project_id: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        citation_style: row.get(5)?,
        is_public: row.get(6)?,
        share_token: row.get(7)?,
        entry_count: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
    let csl: Option<String> = row.get(4)?;
    Ok(Entry {
        id: row.get(0)?,
        bibliography_id: row.get(1)?,
        object_id: row.get(2)?,
        entry_type: row.get(3)?,
        csl_data: csl.and_then(|c| serde_json::from_str(&c).ok()),
        title: row.get(5)?,
        authors: row.get(6)?,
        date: row.get(7)?,
        publisher: row.get(8)?,
        container_title: row.get(9)?,
        volume: row.get(10)?,
        issue: row.get(11)?,
        pages: row.get(12)?,
        doi: row.get(13)?,
        url: row.get(14)?,
        accessed_date: row.get(15)?,
        archive_name: row.get(16)?,
        archive_location: row.get(17)?,
        collection_title: row.get(18)?,
        box_number: row.get(19)?,
        folder: row.get(20)?,
        notes: row.get(21)?,
        sort_order: row.get(22)?,
        created_at: row.get(23)?,
        updated_at: row.get(24)?,
    })
}

fn new_share_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Blank strings count as absent.
fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn create(conn: &Connection, researcher_id: i64, data: &NewBibliography) -> Result<Bibliography> {
    if data.name.trim().is_empty() {
        return Err(ResearchError::invalid("bibliography name is required"));
    }
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO bibliography (researcher_id, project_id, name, description, citation_style, is_public,
            share_token, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            researcher_id,
            data.project_id,
            data.name.trim(),
            text(&data.description),
            text(&data.citation_style).unwrap_or(DEFAULT_CITATION_STYLE),
            data.is_public,
            new_share_token(),
            now
        ],
    )?;
    let created = get(conn, conn.last_insert_rowid())?;
    log::info!("📚 Bibliography {} created for researcher {}", created.id, researcher_id);
    Ok(created)
}

pub fn get(conn: &Connection, id: i64) -> Result<Bibliography> {
    let sql = format!("SELECT {BIBLIOGRAPHY_COLUMNS} FROM bibliography b WHERE b.id = ?1");
    conn.query_row(&sql, params![id], map_bibliography_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("bibliography {id}")))
}

/// Public bibliographies are readable by anyone, private ones only by
/// their owner; hidden ones are reported as missing.
pub fn get_visible(conn: &Connection, id: i64, viewer: Option<i64>) -> Result<Bibliography> {
    let found = get(conn, id)?;
    if !found.is_public && viewer != Some(found.researcher_id) {
        return Err(ResearchError::not_found(format!("bibliography {id}")));
    }
    Ok(found)
}

/// Holders of the share token read the bibliography whether or not it is public.
pub fn by_share_token(conn: &Connection, token: &str) -> Result<Bibliography> {
    let sql = format!("SELECT {BIBLIOGRAPHY_COLUMNS} FROM bibliography b WHERE b.share_token = ?1");
    conn.query_row(&sql, params![token.trim()], map_bibliography_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found("shared bibliography"))
}

fn owned(conn: &Connection, id: i64, researcher_id: i64) -> Result<Bibliography> {
    let found = get(conn, id)?;
    if found.researcher_id != researcher_id {
        return Err(ResearchError::Forbidden(format!(
            "bibliography {id} belongs to another researcher"
        )));
    }
    Ok(found)
}

/// Most recently touched first.
pub fn list(conn: &Connection, researcher_id: i64, project_id: Option<i64>) -> Result<Vec<Bibliography>> {
    let sql = format!(
        "SELECT {BIBLIOGRAPHY_COLUMNS} FROM bibliography b
         WHERE b.researcher_id = ?1 AND (?2 IS NULL OR b.project_id = ?2)
         ORDER BY b.updated_at DESC, b.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![researcher_id, project_id], map_bibliography_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn update(
    conn: &Connection,
    id: i64,
    researcher_id: i64,
    changes: &BibliographyUpdate,
) -> Result<Bibliography> {
    owned(conn, id, researcher_id)?;
    if changes.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ResearchError::invalid("bibliography name cannot be blank"));
    }
    conn.execute(
        "UPDATE bibliography SET
            name = COALESCE(?1, name),
            description = COALESCE(?2, description),
            project_id = COALESCE(?3, project_id),
            citation_style = COALESCE(?4, citation_style),
            is_public = COALESCE(?5, is_public),
            updated_at = ?6
         WHERE id = ?7",
        params![
            changes.name.as_deref().map(str::trim),
            changes.description,
            changes.project_id,
            text(&changes.citation_style),
            changes.is_public,
            now_timestamp(),
            id
        ],
    )?;
    get(conn, id)
}

pub fn delete(conn: &Connection, id: i64, researcher_id: i64) -> Result<()> {
    owned(conn, id, researcher_id)?;
    conn.execute("DELETE FROM bibliography_entry WHERE bibliography_id = ?1", params![id])?;
    conn.execute("DELETE FROM bibliography WHERE id = ?1", params![id])?;
    log::info!("🗑️ Bibliography {} deleted", id);
    Ok(())
}

// Entries

pub fn entries(conn: &Connection, bibliography_id: i64) -> Result<Vec<Entry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM bibliography_entry WHERE bibliography_id = ?1 ORDER BY sort_order, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![bibliography_id], map_entry_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get_entry(conn: &Connection, entry_id: i64) -> Result<Entry> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM bibliography_entry WHERE id = ?1");
    conn.query_row(&sql, params![entry_id], map_entry_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("bibliography entry {entry_id}")))
}

fn touch(conn: &Connection, bibliography_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE bibliography SET updated_at = ?1 WHERE id = ?2",
        params![now_timestamp(), bibliography_id],
    )?;
    Ok(())
}

fn csl_text(data: &NewEntry) -> Result<Option<String>> {
    match &data.csl_data {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(_)) => Ok(Some(serde_json::to_string(&data.csl_data)?)),
        Some(_) => Err(ResearchError::invalid("csl_data must be an object")),
    }
}

fn insert_entry(conn: &Connection, bibliography_id: i64, data: &NewEntry) -> Result<Entry> {
    let next_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM bibliography_entry WHERE bibliography_id = ?1",
        params![bibliography_id],
        |row| row.get(0),
    )?;
    let accessed = text(&data.accessed_date)
        .map(str::to_string)
        .unwrap_or_else(|| format_date(today()));
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO bibliography_entry (bibliography_id, object_id, entry_type, csl_json, title, authors, date,
            publisher, container_title, volume, issue, pages, doi, url, accessed_date, archive_name,
            archive_location, collection_title, box, folder, notes, sort_order, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
            ?21, ?22, ?23, ?23)",
        params![
            bibliography_id,
            data.object_id,
            data.entry_type.unwrap_or_default(),
            csl_text(data)?,
            text(&data.title),
            text(&data.authors),
            text(&data.date),
            text(&data.publisher),
            text(&data.container_title),
            text(&data.volume),
            text(&data.issue),
            text(&data.pages),
            text(&data.doi),
            text(&data.url),
            accessed,
            text(&data.archive_name),
            text(&data.archive_location),
            text(&data.collection_title),
            text(&data.box_number),
            text(&data.folder),
            text(&data.notes),
            next_order,
            now
        ],
    )?;
    let entry = get_entry(conn, conn.last_insert_rowid())?;
    touch(conn, bibliography_id)?;
    Ok(entry)
}

/// Appends an entry after the current last one.
pub fn add_entry(conn: &Connection, bibliography_id: i64, researcher_id: i64, data: &NewEntry) -> Result<Entry> {
    owned(conn, bibliography_id, researcher_id)?;
    if text(&data.title).is_none() && data.object_id.is_none() {
        return Err(ResearchError::invalid("an entry needs a title or an object_id"));
    }
    insert_entry(conn, bibliography_id, data)
}

/// Cites a catalogue description: its label becomes the title and its
/// repository the archive.
pub fn add_entry_from_object(
    conn: &Connection,
    bibliography_id: i64,
    researcher_id: i64,
    object_id: i64,
    base_uri: &str,
) -> Result<Entry> {
    owned(conn, bibliography_id, researcher_id)?;
    let object = catalogue::find(conn, INFORMATION_OBJECT, object_id)?
        .ok_or_else(|| ResearchError::not_found(format!("object {object_id}")))?;
    let archive_name = match object.repository_id {
        Some(repository_id) => Some(catalogue::label_for(conn, "repository", repository_id)?),
        None => None,
    };
    let data = NewEntry {
        object_id: Some(object_id),
        entry_type: Some(EntryType::Archival),
        title: Some(object.label),
        url: Some(format!("{}/{}", base_uri.trim_end_matches('/'), object_id)),
        archive_name,
        notes: object.description,
        ..Default::default()
    };
    insert_entry(conn, bibliography_id, &data)
}

fn owned_entry(conn: &Connection, entry_id: i64, researcher_id: i64) -> Result<Entry> {
    let entry = get_entry(conn, entry_id)?;
    owned(conn, entry.bibliography_id, researcher_id)?;
    Ok(entry)
}

pub fn update_entry(conn: &Connection, entry_id: i64, researcher_id: i64, changes: &NewEntry) -> Result<Entry> {
    let entry = owned_entry(conn, entry_id, researcher_id)?;
    conn.execute(
        "UPDATE bibliography_entry SET
            entry_type = COALESCE(?1, entry_type),
            csl_json = COALESCE(?2, csl_json),
            title = COALESCE(?3, title),
            authors = COALESCE(?4, authors),
            date = COALESCE(?5, date),
            publisher = COALESCE(?6, publisher),
            container_title = COALESCE(?7, container_title),
            volume = COALESCE(?8, volume),
            issue = COALESCE(?9, issue),
            pages = COALESCE(?10, pages),
            doi = COALESCE(?11, doi),
            url = COALESCE(?12, url),
            accessed_date = COALESCE(?13, accessed_date),
            archive_name = COALESCE(?14, archive_name),
            archive_location = COALESCE(?15, archive_location),
            collection_title = COALESCE(?16, collection_title),
            box = COALESCE(?17, box),
            folder = COALESCE(?18, folder),
            notes = COALESCE(?19, notes),
            updated_at = ?20
         WHERE id = ?21",
        params![
            changes.entry_type,
            csl_text(changes)?,
            text(&changes.title),
            text(&changes.authors),
            text(&changes.date),
            text(&changes.publisher),
            text(&changes.container_title),
            text(&changes.volume),
            text(&changes.issue),
            text(&changes.pages),
            text(&changes.doi),
            text(&changes.url),
            text(&changes.accessed_date),
            text(&changes.archive_name),
            text(&changes.archive_location),
            text(&changes.collection_title),
            text(&changes.box_number),
            text(&changes.folder),
            text(&changes.notes),
            now_timestamp(),
            entry_id
        ],
    )?;
    touch(conn, entry.bibliography_id)?;
    get_entry(conn, entry_id)
}

pub fn remove_entry(conn: &Connection, entry_id: i64, researcher_id: i64) -> Result<()> {
    let entry = owned_entry(conn, entry_id, researcher_id)?;
    conn.execute("DELETE FROM bibliography_entry WHERE id = ?1", params![entry_id])?;
    touch(conn, entry.bibliography_id)?;
    Ok(())
}

// Import

fn import_all(conn: &Connection, bibliography_id: i64, researcher_id: i64, parsed: Vec<NewEntry>) -> Result<ImportSummary> {
    owned(conn, bibliography_id, researcher_id)?;
    let total = parsed.len();
    let mut imported = 0;
    let mut errors = Vec::new();
    for data in &parsed {
        match insert_entry(conn, bibliography_id, data) {
            Ok(_) => imported += 1,
            Err(err @ ResearchError::InvalidInput(_)) => {
                let title = text(&data.title).unwrap_or("Unknown");
                errors.push(format!("{title}: {err}"));
            }
            Err(err) => return Err(err),
        }
    }
    log::info!(
        "📥 Imported {}/{} entries into bibliography {}",
        imported,
        total,
        bibliography_id
    );
    Ok(ImportSummary { imported, errors, total })
}

pub fn import_bibtex(conn: &Connection, bibliography_id: i64, researcher_id: i64, bibtex: &str) -> Result<ImportSummary> {
    import_all(conn, bibliography_id, researcher_id, parse_bibtex(bibtex))
}

pub fn import_ris(conn: &Connection, bibliography_id: i64, researcher_id: i64, ris: &str) -> Result<ImportSummary> {
    import_all(conn, bibliography_id, researcher_id, parse_ris(ris))
}

/// Best-effort entry from a free-text citation.
pub fn import_citation(conn: &Connection, bibliography_id: i64, researcher_id: i64, citation: &str) -> Result<Entry> {
    owned(conn, bibliography_id, researcher_id)?;
    if citation.trim().is_empty() {
        return Err(ResearchError::invalid("citation text is empty"));
    }
    insert_entry(conn, bibliography_id, &parse_citation(citation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{seed, EntityInput};
    use crate::storage::sqlite::test_conn;

    fn reading_list(conn: &Connection, owner: i64) -> Bibliography {
        create(
            conn,
            owner,
            &NewBibliography {
                name: "Police archives".into(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn titled(title: &str) -> NewEntry {
        NewEntry {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    #[test]
    fn create_defaults_style_and_mints_a_share_token() {
        let conn = test_conn();
        let b = reading_list(&conn, 1);
        assert_eq!(b.citation_style, DEFAULT_CITATION_STYLE);
        assert!(!b.is_public);
        assert_eq!(b.share_token.len(), 64);
        assert_ne!(reading_list(&conn, 1).share_token, b.share_token);
        assert_eq!(by_share_token(&conn, &b.share_token).unwrap().id, b.id);
        assert!(matches!(
            create(&conn, 1, &NewBibliography::default()),
            Err(ResearchError::InvalidInput(_))
        ));
    }

    #[test]
    fn entries_append_in_order_and_count() {
        let conn = test_conn();
        let b = reading_list(&conn, 1);
        let first = add_entry(&conn, b.id, 1, &titled("Le désordre des familles")).unwrap();
        let second = add_entry(&conn, b.id, 1, &titled("La vie fragile")).unwrap();
        assert_eq!((first.sort_order, second.sort_order), (1, 2));
        assert_eq!(first.entry_type, EntryType::Archival);
        assert_eq!(first.accessed_date, Some(format_date(today())));
        assert_eq!(get(&conn, b.id).unwrap().entry_count, 2);

        remove_entry(&conn, first.id, 1).unwrap();
        let third = add_entry(&conn, b.id, 1, &titled("Le goût de l'archive")).unwrap();
        assert_eq!(third.sort_order, 3);
        let titles: Vec<_> = entries(&conn, b.id).unwrap().into_iter().filter_map(|e| e.title).collect();
        assert_eq!(titles, vec!["La vie fragile", "Le goût de l'archive"]);
        assert!(matches!(add_entry(&conn, b.id, 1, &NewEntry::default()), Err(ResearchError::InvalidInput(_))));
    }

    #[test]
    fn only_the_owner_changes_a_bibliography() {
        let conn = test_conn();
        let b = reading_list(&conn, 1);
        let entry = add_entry(&conn, b.id, 1, &titled("Draft")).unwrap();
        let rename = BibliographyUpdate {
            name: Some("Renamed".into()),
            ..Default::default()
        };
        assert!(matches!(update(&conn, b.id, 2, &rename), Err(ResearchError::Forbidden(_))));
        assert!(matches!(add_entry(&conn, b.id, 2, &titled("x")), Err(ResearchError::Forbidden(_))));
        assert!(matches!(remove_entry(&conn, entry.id, 2), Err(ResearchError::Forbidden(_))));
        assert!(matches!(delete(&conn, b.id, 2), Err(ResearchError::Forbidden(_))));

        let updated = update(&conn, b.id, 1, &rename).unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.citation_style, DEFAULT_CITATION_STYLE);

        let edited = update_entry(
            &conn,
            entry.id,
            1,
            &NewEntry {
                pages: Some("12-19".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(edited.title.as_deref(), Some("Draft"));
        assert_eq!(edited.pages.as_deref(), Some("12-19"));

        delete(&conn, b.id, 1).unwrap();
        assert!(matches!(get(&conn, b.id), Err(ResearchError::NotFound(_))));
        assert!(matches!(get_entry(&conn, entry.id), Err(ResearchError::NotFound(_))));
    }

    #[test]
    fn private_bibliographies_are_hidden_from_others() {
        let conn = test_conn();
        let b = reading_list(&conn, 1);
        assert!(get_visible(&conn, b.id, Some(1)).is_ok());
        assert!(matches!(get_visible(&conn, b.id, Some(2)), Err(ResearchError::NotFound(_))));
        assert!(matches!(get_visible(&conn, b.id, None), Err(ResearchError::NotFound(_))));
        let public = BibliographyUpdate {
            is_public: Some(true),
            ..Default::default()
        };
        update(&conn, b.id, 1, &public).unwrap();
        assert!(get_visible(&conn, b.id, None).is_ok());
    }

    #[test]
    fn list_filters_by_owner_and_project() {
        let conn = test_conn();
        reading_list(&conn, 1);
        create(
            &conn,
            1,
            &NewBibliography {
                name: "Project list".into(),
                project_id: Some(4),
                ..Default::default()
            },
        )
        .unwrap();
        reading_list(&conn, 2);
        assert_eq!(list(&conn, 1, None).unwrap().len(), 2);
        assert_eq!(list(&conn, 1, Some(4)).unwrap().len(), 1);
        assert_eq!(list(&conn, 2, None).unwrap().len(), 1);
    }

    #[test]
    fn object_entries_cite_the_catalogue() {
        let conn = test_conn();
        seed(&conn, "repository", 3, "Archives de la Bastille");
        catalogue::upsert(
            &conn,
            &EntityInput {
                entity_type: INFORMATION_OBJECT.into(),
                entity_id: 40,
                label: "Register of lettres de cachet".into(),
                description: Some("1728-1789".into()),
                repository_id: Some(3),
            },
        )
        .unwrap();
        let b = reading_list(&conn, 1);
        let entry = add_entry_from_object(&conn, b.id, 1, 40, "https://archive.test/").unwrap();
        assert_eq!(entry.object_id, Some(40));
        assert_eq!(entry.entry_type, EntryType::Archival);
        assert_eq!(entry.title.as_deref(), Some("Register of lettres de cachet"));
        assert_eq!(entry.archive_name.as_deref(), Some("Archives de la Bastille"));
        assert_eq!(entry.url.as_deref(), Some("https://archive.test/40"));
        assert!(matches!(
            add_entry_from_object(&conn, b.id, 1, 41, "https://archive.test"),
            Err(ResearchError::NotFound(_))
        ));
    }

    #[test]
    fn bibtex_export_imports_back_into_another_bibliography() {
        let conn = test_conn();
        let source = reading_list(&conn, 1);
        add_entry(
            &conn,
            source.id,
            1,
            &NewEntry {
                entry_type: Some(EntryType::Article),
                title: Some("Crime & punishment in {Paris}".into()),
                authors: Some("Farge, Arlette; Foucault, Michel".into()),
                date: Some("1982-05".into()),
                container_title: Some("Annales".into()),
                volume: Some("37".into()),
                issue: Some("3".into()),
                pages: Some("520-534".into()),
                doi: Some("10.3406/ahess.1982.282866".into()),
                ..Default::default()
            },
        )
        .unwrap();
        add_entry(
            &conn,
            source.id,
            1,
            &NewEntry {
                title: Some("Lettres de cachet, 1728".into()),
                archive_name: Some("Bibliothèque de l'Arsenal".into()),
                notes: Some("100% legible".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let bibtex = to_bibtex(&entries(&conn, source.id).unwrap());
        let target = reading_list(&conn, 1);
        let summary = import_bibtex(&conn, target.id, 1, &bibtex).unwrap();
        assert_eq!((summary.imported, summary.total), (2, 2));
        assert!(summary.errors.is_empty());

        let back = entries(&conn, target.id).unwrap();
        assert_eq!(back[0].entry_type, EntryType::Article);
        assert_eq!(back[0].title.as_deref(), Some("Crime & punishment in {Paris}"));
        assert_eq!(back[0].authors.as_deref(), Some("Farge, Arlette; Foucault, Michel"));
        assert_eq!(back[0].date.as_deref(), Some("1982"));
        assert_eq!(back[0].container_title.as_deref(), Some("Annales"));
        assert_eq!(back[0].issue.as_deref(), Some("3"));
        assert_eq!(back[0].pages.as_deref(), Some("520-534"));
        assert_eq!(back[0].doi.as_deref(), Some("10.3406/ahess.1982.282866"));
        assert_eq!(back[1].entry_type, EntryType::Archival);
        assert_eq!(back[1].archive_name.as_deref(), Some("Bibliothèque de l'Arsenal"));
        assert_eq!(back[1].notes.as_deref(), Some("100% legible"));
    }

    #[test]
    fn ris_export_imports_back_into_another_bibliography() {
        let conn = test_conn();
        let source = reading_list(&conn, 1);
        let original = add_entry(
            &conn,
            source.id,
            1,
            &NewEntry {
                title: Some("Ordres du roi".into()),
                authors: Some("Louis XV".into()),
                date: Some("1750".into()),
                archive_name: Some("Archives nationales".into()),
                collection_title: Some("Maison du roi".into()),
                box_number: Some("O1 12".into()),
                folder: Some("3".into()),
                notes: Some("Seal damaged".into()),
                accessed_date: Some("2026-02-01".into()),
                ..Default::default()
            },
        )
        .unwrap();
        add_entry(
            &conn,
            source.id,
            1,
            &NewEntry {
                entry_type: Some(EntryType::Website),
                title: Some("Online finding aid".into()),
                url: Some("https://example.org/fa".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let ris = to_ris(&entries(&conn, source.id).unwrap());
        let target = reading_list(&conn, 1);
        let summary = import_ris(&conn, target.id, 1, &ris).unwrap();
        assert_eq!((summary.imported, summary.total), (2, 2));

        let back = entries(&conn, target.id).unwrap();
        let copy = &back[0];
        assert_eq!(copy.entry_type, original.entry_type);
        assert_eq!(copy.title, original.title);
        assert_eq!(copy.authors, original.authors);
        assert_eq!(copy.date, original.date);
        assert_eq!(copy.archive_name, original.archive_name);
        assert_eq!(copy.collection_title, original.collection_title);
        assert_eq!(copy.box_number, original.box_number);
        assert_eq!(copy.folder, original.folder);
        assert_eq!(copy.notes, original.notes);
        assert_eq!(copy.accessed_date, original.accessed_date);
        assert_eq!(back[1].entry_type, EntryType::Website);
        assert_eq!(back[1].url.as_deref(), Some("https://example.org/fa"));
    }

    #[test]
    fn citation_text_becomes_an_entry() {
        let conn = test_conn();
        let b = reading_list(&conn, 1);
        let entry = import_citation(
            &conn,
            b.id,
            1,
            r#"Farge, A. "Le goût de l'archive." Paris: Seuil, 1989. https://example.org/gout"#,
        )
        .unwrap();
        assert_eq!(entry.entry_type, EntryType::Other);
        assert_eq!(entry.title.as_deref(), Some("Le goût de l'archive."));
        assert_eq!(entry.date.as_deref(), Some("1989"));
        assert_eq!(entry.url.as_deref(), Some("https://example.org/gout"));
        assert!(entry.notes.unwrap().starts_with("Imported from citation: "));
        assert!(matches!(import_citation(&conn, b.id, 1, "  "), Err(ResearchError::InvalidInput(_))));
    }
}
