//! Researchers, projects and project collaborators.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};
use crate::types::{time::now_timestamp, CollaboratorStatus, ProjectStatus, ResearcherStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Researcher {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub orcid_id: Option<String>,
    pub institution: Option<String>,
    pub status: ResearcherStatus,
    pub created_at: String,
}

impl Researcher {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewResearcher {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub orcid_id: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub status: Option<ResearcherStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    pub project_id: i64,
    pub researcher_id: i64,
    pub role: String,
    pub status: CollaboratorStatus,
    pub invited_at: String,
    pub accepted_at: Option<String>,
}

fn map_researcher_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Researcher> {
    Ok(Researcher {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        orcid_id: row.get(4)?,
        institution: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_project_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_collaborator_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Collaborator> {
    Ok(Collaborator {
        project_id: row.get(0)?,
        researcher_id: row.get(1)?,
        role: row.get(2)?,
        status: row.get(3)?,
        invited_at: row.get(4)?,
        accepted_at: row.get(5)?,
    })
}

pub fn create_researcher(conn: &Connection, new: &NewResearcher) -> Result<Researcher> {
    if new.first_name.trim().is_empty() || new.last_name.trim().is_empty() {
        return Err(ResearchError::invalid("first_name and last_name are required"));
    }
    if !new.email.contains('@') {
        return Err(ResearchError::invalid(format!("invalid email '{}'", new.email)));
    }
    let exists: Option<i64> = conn
        .query_row(
            "SELECT id FROM researcher WHERE email = ?1",
            params![new.email],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_some() {
        return Err(ResearchError::conflict(format!(
            "a researcher with email {} already exists",
            new.email
        )));
    }

    conn.execute(
        "INSERT INTO researcher (first_name, last_name, email, orcid_id, institution, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.first_name.trim(),
            new.last_name.trim(),
            new.email.trim(),
            new.orcid_id,
            new.institution,
            new.status.unwrap_or(ResearcherStatus::Pending),
            now_timestamp()
        ],
    )?;
    load_researcher(conn, conn.last_insert_rowid())
}

pub fn find_researcher(conn: &Connection, id: i64) -> Result<Option<Researcher>> {
    let row = conn
        .query_row(
            "SELECT id, first_name, last_name, email, orcid_id, institution, status, created_at
             FROM researcher WHERE id = ?1",
            params![id],
            map_researcher_row,
        )
        .optional()?;
    Ok(row)
}

pub fn load_researcher(conn: &Connection, id: i64) -> Result<Researcher> {
    find_researcher(conn, id)?.ok_or_else(|| ResearchError::not_found(format!("researcher {id}")))
}

pub fn create_project(conn: &Connection, owner_id: i64, new: &NewProject) -> Result<Project> {
    if new.title.trim().is_empty() {
        return Err(ResearchError::invalid("title is required"));
    }
    load_researcher(conn, owner_id)?;
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO project (owner_id, title, description, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![owner_id, new.title.trim(), new.description, ProjectStatus::Active, now],
    )?;
    let id = conn.last_insert_rowid();
    // The owner is always an accepted collaborator.
    conn.execute(
        "INSERT INTO project_collaborator (project_id, researcher_id, role, status, invited_at, accepted_at)
         VALUES (?1, ?2, 'owner', ?3, ?4, ?4)",
        params![id, owner_id, CollaboratorStatus::Accepted, now],
    )?;
    crate::activity::log_event(
        conn,
        Some(owner_id),
        Some(id),
        "project_created",
        "project",
        id,
        Some(new.title.trim()),
    )?;
    load_project(conn, id)
}

pub fn load_project(conn: &Connection, id: i64) -> Result<Project> {
    conn.query_row(
        "SELECT id, owner_id, title, description, status, created_at FROM project WHERE id = ?1",
        params![id],
        map_project_row,
    )
    .optional()?
    .ok_or_else(|| ResearchError::not_found(format!("project {id}")))
}

pub fn list_collaborators(conn: &Connection, project_id: i64) -> Result<Vec<Collaborator>> {
    let mut stmt = conn.prepare(
        "SELECT project_id, researcher_id, role, status, invited_at, accepted_at
         FROM project_collaborator WHERE project_id = ?1 ORDER BY invited_at, researcher_id",
    )?;
    let rows = stmt
        .query_map(params![project_id], map_collaborator_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn invite_collaborator(
    conn: &Connection,
    project_id: i64,
    inviter_id: i64,
    researcher_id: i64,
    role: &str,
) -> Result<Collaborator> {
    let project = load_project(conn, project_id)?;
    if project.owner_id != inviter_id {
        return Err(ResearchError::Forbidden(
            "only the project owner can invite collaborators".into(),
        ));
    }
    load_researcher(conn, researcher_id)?;
    conn.execute(
        "INSERT INTO project_collaborator (project_id, researcher_id, role, status, invited_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(project_id, researcher_id) DO UPDATE SET role = excluded.role",
        params![
            project_id,
            researcher_id,
            role,
            CollaboratorStatus::Pending,
            now_timestamp()
        ],
    )?;
    crate::notifications::notify(
        conn,
        researcher_id,
        "collaboration_invite",
        &format!("You were invited to join \"{}\"", project.title),
        None,
        Some(&format!("/research/projects/{project_id}")),
    )?;
    load_collaborator(conn, project_id, researcher_id)
}

pub fn accept_invitation(conn: &Connection, project_id: i64, researcher_id: i64) -> Result<Collaborator> {
    let updated = conn.execute(
        "UPDATE project_collaborator SET status = ?1, accepted_at = ?2
         WHERE project_id = ?3 AND researcher_id = ?4 AND status = ?5",
        params![
            CollaboratorStatus::Accepted,
            now_timestamp(),
            project_id,
            researcher_id,
            CollaboratorStatus::Pending
        ],
    )?;
    if updated == 0 {
        return Err(ResearchError::not_found(format!(
            "pending invitation for researcher {researcher_id} on project {project_id}"
        )));
    }
    load_collaborator(conn, project_id, researcher_id)
}

fn load_collaborator(conn: &Connection, project_id: i64, researcher_id: i64) -> Result<Collaborator> {
    conn.query_row(
        "SELECT project_id, researcher_id, role, status, invited_at, accepted_at
         FROM project_collaborator WHERE project_id = ?1 AND researcher_id = ?2",
        params![project_id, researcher_id],
        map_collaborator_row,
    )
    .optional()?
    .ok_or_else(|| ResearchError::not_found(format!("collaborator {researcher_id}")))
}

/// Lowest project id where the researcher is an accepted collaborator.
pub fn first_accepted_project(conn: &Connection, researcher_id: i64) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT MIN(project_id) FROM project_collaborator
             WHERE researcher_id = ?1 AND status = ?2",
            params![researcher_id, CollaboratorStatus::Accepted],
            |row| row.get::<_, Option<i64>>(0),
        )?;
    Ok(id)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn researcher(conn: &Connection, first: &str, last: &str) -> Researcher {
        create_researcher(
            conn,
            &NewResearcher {
                first_name: first.into(),
                last_name: last.into(),
                email: format!("{}.{}@archive.test", first.to_lowercase(), last.to_lowercase()),
                orcid_id: None,
                institution: Some("State Archive".into()),
                status: Some(ResearcherStatus::Approved),
            },
        )
        .unwrap()
    }

    pub fn project(conn: &Connection, owner: i64, title: &str) -> Project {
        create_project(
            conn,
            owner,
            &NewProject {
                title: title.into(),
                description: None,
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
    fn create_researcher_rejects_duplicate_email() {
        let conn = test_conn();
        let ada = researcher(&conn, "Ada", "Lovelace");
        assert_eq!(ada.full_name(), "Ada Lovelace");

        let err = create_researcher(
            &conn,
            &NewResearcher {
                first_name: "Augusta".into(),
                last_name: "King".into(),
                email: ada.email.clone(),
                orcid_id: None,
                institution: None,
                status: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ResearchError::Conflict(_)));
    }

    #[test]
    fn project_owner_counts_as_accepted_collaborator() {
        let conn = test_conn();
        let owner = researcher(&conn, "Ada", "Lovelace");
        let p = project(&conn, owner.id, "Letters");
        assert_eq!(first_accepted_project(&conn, owner.id).unwrap(), Some(p.id));
    }

    #[test]
    fn invited_researcher_joins_after_accepting() {
        let conn = test_conn();
        let owner = researcher(&conn, "Ada", "Lovelace");
        let guest = researcher(&conn, "Charles", "Babbage");
        let p = project(&conn, owner.id, "Engines");

        let invite = invite_collaborator(&conn, p.id, owner.id, guest.id, "contributor").unwrap();
        assert_eq!(invite.status, CollaboratorStatus::Pending);
        assert_eq!(first_accepted_project(&conn, guest.id).unwrap(), None);

        let accepted = accept_invitation(&conn, p.id, guest.id).unwrap();
        assert_eq!(accepted.status, CollaboratorStatus::Accepted);
        assert_eq!(first_accepted_project(&conn, guest.id).unwrap(), Some(p.id));
        assert_eq!(list_collaborators(&conn, p.id).unwrap().len(), 2);

        assert!(accept_invitation(&conn, p.id, guest.id).is_err());
    }

    #[test]
    fn only_owner_can_invite() {
        let conn = test_conn();
        let owner = researcher(&conn, "Ada", "Lovelace");
        let guest = researcher(&conn, "Charles", "Babbage");
        let p = project(&conn, owner.id, "Engines");
        let err = invite_collaborator(&conn, p.id, guest.id, guest.id, "contributor").unwrap_err();
        assert!(matches!(err, ResearchError::Forbidden(_)));
    }
}
