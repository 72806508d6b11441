//! Cross-collection entity resolution: match proposals between catalogue
//! entities and their review.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assertion::{self, map_assertion_row, Assertion, NewAssertion};
use crate::error::{ResearchError, Result};
use crate::types::{
    calculate_pagination, time::now_timestamp, AssertionStatus, AssertionType, Paginated, RelationshipType,
    ResolutionStatus, DEFAULT_PAGE_LIMIT,
};
use crate::{catalogue, notifications, people};

pub const CANDIDATE_THRESHOLD: f64 = 0.3;
pub const CANDIDATE_LIMIT: usize = 20;
const CANDIDATE_SCAN_LIMIT: i64 = 50;
const MIN_NAME_PART_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: i64,
    pub entity_a_type: String,
    pub entity_a_id: i64,
    pub entity_a_label: String,
    pub entity_b_type: String,
    pub entity_b_id: i64,
    pub entity_b_label: String,
    pub confidence: Option<f64>,
    pub match_method: Option<String>,
    pub status: ResolutionStatus,
    pub relationship_type: RelationshipType,
    pub notes: Option<String>,
    pub evidence: Vec<Value>,
    pub proposer_id: Option<i64>,
    pub resolver_id: Option<i64>,
    pub resolved_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProposal {
    pub entity_a_type: String,
    pub entity_a_id: i64,
    pub entity_b_type: String,
    pub entity_b_id: i64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub match_method: Option<String>,
    #[serde(default)]
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub evidence: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposalFilter {
    #[serde(default)]
    pub status: Option<ResolutionStatus>,
    /// Matches either side of the pair.
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub relationship_type: Option<RelationshipType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub entity_type: String,
    pub entity_id: i64,
    pub label: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLink {
    pub proposal_id: i64,
    pub relationship_type: RelationshipType,
    pub confidence: Option<f64>,
    pub linked_type: String,
    pub linked_id: i64,
    pub linked_label: String,
    pub resolved_at: Option<String>,
}

const COLUMNS: &str = "id, entity_a_type, entity_a_id, entity_b_type, entity_b_id, confidence, match_method,
     status, relationship_type, notes, evidence_json, proposer_id, resolver_id, resolved_at, created_at";

fn map_proposal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Proposal> {
    let evidence: Option<String> = row.get(10)?;
    Ok(Proposal {
        id: row.get(0)?,
        entity_a_type: row.get(1)?,
        entity_a_id: row.get(2)?,
        entity_a_label: String::new(),
        entity_b_type: row.get(3)?,
        entity_b_id: row.get(4)?,
        entity_b_label: String::new(),
        confidence: row.get(5)?,
        match_method: row.get(6)?,
        status: row.get(7)?,
        relationship_type: row.get(8)?,
        notes: row.get(9)?,
        evidence: evidence
            .and_then(|e| serde_json::from_str(&e).ok())
            .unwrap_or_default(),
        proposer_id: row.get(11)?,
        resolver_id: row.get(12)?,
        resolved_at: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn with_labels(conn: &Connection, mut p: Proposal) -> Result<Proposal> {
    p.entity_a_label = catalogue::label_for(conn, &p.entity_a_type, p.entity_a_id)?;
    p.entity_b_label = catalogue::label_for(conn, &p.entity_b_type, p.entity_b_id)?;
    Ok(p)
}

pub fn propose(conn: &Connection, proposer_id: i64, data: &NewProposal) -> Result<Proposal> {
    if data.entity_a_type.trim().is_empty() || data.entity_b_type.trim().is_empty() {
        return Err(ResearchError::invalid("entity types are required"));
    }
    if data.entity_a_type == data.entity_b_type && data.entity_a_id == data.entity_b_id {
        return Err(ResearchError::invalid("an entity cannot be matched with itself"));
    }
    conn.execute(
        "INSERT INTO entity_resolution (entity_a_type, entity_a_id, entity_b_type, entity_b_id, confidence,
            match_method, status, relationship_type, notes, evidence_json, proposer_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            data.entity_a_type.trim(),
            data.entity_a_id,
            data.entity_b_type.trim(),
            data.entity_b_id,
            data.confidence,
            data.match_method,
            ResolutionStatus::Proposed,
            data.relationship_type,
            data.notes,
            serde_json::to_string(&data.evidence)?,
            proposer_id,
            now_timestamp()
        ],
    )?;
    get(conn, conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<Proposal> {
    let sql = format!("SELECT {COLUMNS} FROM entity_resolution WHERE id = ?1");
    let proposal = conn
        .query_row(&sql, params![id], map_proposal_row)
        .optional()?
        .ok_or_else(|| ResearchError::not_found(format!("resolution {id}")))?;
    with_labels(conn, proposal)
}

pub fn list(conn: &Connection, filter: &ProposalFilter, page: i64, limit: Option<i64>) -> Result<Paginated<Proposal>> {
    const WHERE: &str = "WHERE (?1 IS NULL OR status = ?1)
           AND (?2 IS NULL OR entity_a_type = ?2 OR entity_b_type = ?2)
           AND (?3 IS NULL OR relationship_type = ?3)";
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM entity_resolution {WHERE}"),
        params![filter.status, filter.entity_type, filter.relationship_type],
        |row| row.get(0),
    )?;
    let window = calculate_pagination(total, page, limit.unwrap_or(DEFAULT_PAGE_LIMIT));
    let sql = format!(
        "SELECT {COLUMNS} FROM entity_resolution {WHERE}
         ORDER BY created_at DESC, id DESC LIMIT ?4 OFFSET ?5"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![
                filter.status,
                filter.entity_type,
                filter.relationship_type,
                window.limit,
                window.offset
            ],
            map_proposal_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let items = rows
        .into_iter()
        .map(|p| with_labels(conn, p))
        .collect::<Result<Vec<_>>>()?;
    Ok(Paginated::new(items, total, window))
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let removed = conn.execute("DELETE FROM entity_resolution WHERE id = ?1", params![id])?;
    if removed == 0 {
        return Err(ResearchError::not_found(format!("resolution {id}")));
    }
    Ok(())
}

/// Accepts or rejects a pending proposal. An accepted `sameAs` link is
/// recorded as an identity assertion in the resolver's first project.
pub fn resolve(conn: &Connection, id: i64, status: ResolutionStatus, resolver_id: i64) -> Result<Proposal> {
    if status == ResolutionStatus::Proposed {
        return Err(ResearchError::invalid("status must be accepted or rejected"));
    }
    let proposal = get(conn, id)?;
    if proposal.status != ResolutionStatus::Proposed {
        return Err(ResearchError::conflict(format!(
            "resolution {id} is already {}",
            proposal.status
        )));
    }
    conn.execute(
        "UPDATE entity_resolution SET status = ?1, resolver_id = ?2, resolved_at = ?3 WHERE id = ?4",
        params![status, resolver_id, now_timestamp(), id],
    )?;

    if status == ResolutionStatus::Accepted && proposal.relationship_type == RelationshipType::SameAs {
        match people::first_accepted_project(conn, resolver_id)? {
            Some(project_id) => {
                assertion::create(
                    conn,
                    resolver_id,
                    &NewAssertion {
                        project_id: Some(project_id),
                        subject_type: proposal.entity_a_type.clone(),
                        subject_id: proposal.entity_a_id,
                        subject_label: Some(proposal.entity_a_label.clone()),
                        predicate: "sameAs".into(),
                        object_type: Some(proposal.entity_b_type.clone()),
                        object_id: Some(proposal.entity_b_id),
                        object_label: Some(proposal.entity_b_label.clone()),
                        assertion_type: AssertionType::Identity,
                        confidence: proposal.confidence,
                        ..Default::default()
                    },
                )?;
            }
            None => log::warn!(
                "resolver {} has no accepted project; sameAs assertion for resolution {} skipped",
                resolver_id,
                id
            ),
        }
    }

    if let Some(proposer_id) = proposal.proposer_id.filter(|p| *p != resolver_id) {
        notifications::notify(
            conn,
            proposer_id,
            "entity_resolution",
            &format!("Match proposal {status}"),
            Some(&format!(
                "{} / {}",
                proposal.entity_a_label, proposal.entity_b_label
            )),
            Some(&format!("/research/entity-resolution/{id}")),
        )?;
    }
    get(conn, id)
}

/// Live assertions between the pair whose predicate contradicts the
/// proposed relationship.
pub fn check_conflicts(conn: &Connection, id: i64) -> Result<Vec<Assertion>> {
    let proposal = get(conn, id)?;
    let predicates = proposal.relationship_type.conflicting_predicates();
    if predicates.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = (0..predicates.len())
        .map(|i| format!("?{}", i + 7))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT id, researcher_id, project_id, subject_type, subject_id, subject_label, predicate,
                object_type, object_id, object_value, object_label, assertion_type, status, confidence, version,
                created_at, updated_at
         FROM assertion
         WHERE ((subject_type = ?1 AND subject_id = ?2 AND object_type = ?3 AND object_id = ?4)
             OR (subject_type = ?3 AND subject_id = ?4 AND object_type = ?1 AND object_id = ?2))
           AND status IN (?5, ?6)
           AND predicate IN ({placeholders})
         ORDER BY id"
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(proposal.entity_a_type.clone()),
        Box::new(proposal.entity_a_id),
        Box::new(proposal.entity_b_type.clone()),
        Box::new(proposal.entity_b_id),
        Box::new(AssertionStatus::Proposed),
        Box::new(AssertionStatus::Verified),
    ];
    args.extend(predicates.iter().map(|p| Box::new(*p) as Box<dyn rusqlite::ToSql>));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), map_assertion_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn similar_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (mut best, mut at_a, mut at_b) = (0, 0, 0);
    for i in 0..a.len() {
        for j in 0..b.len() {
            let mut k = 0;
            while i + k < a.len() && j + k < b.len() && a[i + k] == b[j + k] {
                k += 1;
            }
            if k > best {
                best = k;
                at_a = i;
                at_b = j;
            }
        }
    }
    if best == 0 {
        return 0;
    }
    best + similar_chars(&a[..at_a], &b[..at_b]) + similar_chars(&a[at_a + best..], &b[at_b + best..])
}

/// Case-insensitive `2 * common / (len_a + len_b)`, where `common` counts
/// characters in recursively matched longest common substrings.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let common = similar_chars(&a, &b);
    let score = 2.0 * common as f64 / (a.len() + b.len()) as f64;
    (score * 10_000.0).round() / 10_000.0
}

fn name_parts(label: &str) -> Vec<String> {
    label
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| p.chars().count() >= MIN_NAME_PART_CHARS)
        .map(str::to_string)
        .collect()
}

pub fn find_candidates(conn: &Connection, entity_type: &str, entity_id: i64) -> Result<Vec<Candidate>> {
    let Some(source) = catalogue::find(conn, entity_type, entity_id)? else {
        return Ok(Vec::new());
    };
    let parts = name_parts(&source.label);
    if parts.is_empty() {
        return Ok(Vec::new());
    }
    let likes = (0..parts.len())
        .map(|i| format!("label LIKE ?{}", i + 4))
        .collect::<Vec<_>>()
        .join(" OR ");
    let sql = format!(
        "SELECT entity_id, label FROM catalogue_entity
         WHERE entity_type = ?1 AND entity_id != ?2 AND label != ''
           AND ({likes})
         ORDER BY entity_id LIMIT ?3"
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(entity_type.to_string()),
        Box::new(entity_id),
        Box::new(CANDIDATE_SCAN_LIMIT),
    ];
    args.extend(
        parts
            .iter()
            .map(|p| Box::new(format!("%{p}%")) as Box<dyn rusqlite::ToSql>),
    );

    let mut stmt = conn.prepare(&sql)?;
    let matches = stmt
        .query_map(params_from_iter(args.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut candidates: Vec<Candidate> = matches
        .into_iter()
        .filter_map(|(id, label)| {
            let score = similarity(&source.label, &label);
            (score >= CANDIDATE_THRESHOLD).then(|| Candidate {
                entity_type: entity_type.to_string(),
                entity_id: id,
                label,
                similarity: score,
            })
        })
        .collect();
    candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    candidates.truncate(CANDIDATE_LIMIT);
    Ok(candidates)
}

/// Accepted links touching the entity, from either side.
pub fn entity_links(conn: &Connection, entity_type: &str, entity_id: i64) -> Result<Vec<EntityLink>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM entity_resolution
         WHERE status = ?1
           AND ((entity_a_type = ?2 AND entity_a_id = ?3) OR (entity_b_type = ?2 AND entity_b_id = ?3))
         ORDER BY resolved_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![ResolutionStatus::Accepted, entity_type, entity_id],
            map_proposal_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|p| {
            let (linked_type, linked_id) = if p.entity_a_type == entity_type && p.entity_a_id == entity_id {
                (p.entity_b_type, p.entity_b_id)
            } else {
                (p.entity_a_type, p.entity_a_id)
            };
            Ok(EntityLink {
                proposal_id: p.id,
                relationship_type: p.relationship_type,
                confidence: p.confidence,
                linked_label: catalogue::label_for(conn, &linked_type, linked_id)?,
                linked_type,
                linked_id,
                resolved_at: p.resolved_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::people::fixtures;
    use crate::storage::sqlite::test_conn;

    fn pair(a: i64, b: i64) -> NewProposal {
        NewProposal {
            entity_a_type: "actor".into(),
            entity_a_id: a,
            entity_b_type: "actor".into(),
            entity_b_id: b,
            confidence: Some(0.9),
            match_method: Some("manual".into()),
            ..Default::default()
        }
    }

    #[test]
    fn similarity_follows_longest_common_substring_recursion() {
        assert_eq!(similarity("World", "Word"), 0.8889);
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(similarity("SMITH", "smith"), 1.0);
    }

    #[test]
    fn propose_rejects_self_match_and_labels_items() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        assert!(matches!(propose(&conn, ada.id, &pair(1, 1)), Err(ResearchError::InvalidInput(_))));

        catalogue::seed(&conn, "actor", 1, "Smith, John");
        let p = propose(&conn, ada.id, &pair(1, 2)).unwrap();
        assert_eq!(p.entity_a_label, "Smith, John");
        assert_eq!(p.entity_b_label, "Actor #2");
        assert_eq!(p.status, ResolutionStatus::Proposed);
        assert_eq!(p.relationship_type, RelationshipType::SameAs);
    }

    #[test]
    fn list_filters_and_paginates() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        for i in 0..5 {
            propose(&conn, ada.id, &pair(i * 10 + 1, i * 10 + 2)).unwrap();
        }
        propose(
            &conn,
            ada.id,
            &NewProposal {
                entity_b_type: "repository".into(),
                relationship_type: RelationshipType::MemberOf,
                ..pair(1, 3)
            },
        )
        .unwrap();

        let page = list(&conn, &ProposalFilter::default(), 2, Some(4)).unwrap();
        assert_eq!(page.total, 6);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 2);

        let repos = list(
            &conn,
            &ProposalFilter {
                entity_type: Some("repository".into()),
                ..Default::default()
            },
            1,
            None,
        )
        .unwrap();
        assert_eq!(repos.total, 1);
        assert_eq!(repos.items[0].relationship_type, RelationshipType::MemberOf);
    }

    #[test]
    fn accepting_same_as_creates_identity_assertion_and_notifies() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        let bob = fixtures::researcher(&conn, "Bob", "Marley");
        fixtures::project(&conn, bob.id, "Matches");
        let p = propose(&conn, ada.id, &pair(1, 2)).unwrap();

        let resolved = resolve(&conn, p.id, ResolutionStatus::Accepted, bob.id).unwrap();
        assert_eq!(resolved.status, ResolutionStatus::Accepted);
        assert_eq!(resolved.resolver_id, Some(bob.id));
        assert!(resolved.resolved_at.is_some());

        let identity = assertion::subject_assertions(&conn, "actor", 1).unwrap();
        assert_eq!(identity.len(), 1);
        assert_eq!(identity[0].predicate, "sameAs");
        assert_eq!(identity[0].assertion_type, AssertionType::Identity);
        assert_eq!(identity[0].object_id, Some(2));
        assert_eq!(notifications::unread_count(&conn, ada.id).unwrap(), 1);

        assert!(matches!(
            resolve(&conn, p.id, ResolutionStatus::Rejected, bob.id),
            Err(ResearchError::Conflict(_))
        ));
    }

    #[test]
    fn rejection_creates_no_assertion() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        fixtures::project(&conn, ada.id, "Matches");
        let p = propose(&conn, ada.id, &pair(1, 2)).unwrap();
        resolve(&conn, p.id, ResolutionStatus::Rejected, ada.id).unwrap();
        assert!(assertion::subject_assertions(&conn, "actor", 1).unwrap().is_empty());
        assert_eq!(notifications::unread_count(&conn, ada.id).unwrap(), 0);
    }

    #[test]
    fn conflicts_match_predicates_in_both_directions() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        let p = propose(&conn, ada.id, &pair(1, 2)).unwrap();
        let contradict = |s: i64, o: i64, predicate: &str| {
            assertion::create(
                &conn,
                ada.id,
                &NewAssertion {
                    subject_type: "actor".into(),
                    subject_id: s,
                    predicate: predicate.into(),
                    object_type: Some("actor".into()),
                    object_id: Some(o),
                    ..Default::default()
                },
            )
            .unwrap()
        };
        let forward = contradict(1, 2, "differentFrom");
        let backward = contradict(2, 1, "supersedes");
        contradict(1, 2, "knows");
        let retracted = contradict(1, 2, "replacedBy");
        assertion::update_status(&conn, retracted.id, ada.id, AssertionStatus::Retracted).unwrap();

        let ids: Vec<i64> = check_conflicts(&conn, p.id).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![forward.id, backward.id]);

        let related = propose(
            &conn,
            ada.id,
            &NewProposal {
                relationship_type: RelationshipType::RelatedTo,
                ..pair(1, 2)
            },
        )
        .unwrap();
        assert!(check_conflicts(&conn, related.id).unwrap().is_empty());
    }

    #[test]
    fn candidates_are_scored_and_filtered() {
        let conn = test_conn();
        catalogue::seed(&conn, "actor", 1, "Smith, John");
        catalogue::seed(&conn, "actor", 2, "Smith, Jon");
        catalogue::seed(&conn, "actor", 3, "John Smithson-Whitaker of the Lower Valley");
        catalogue::seed(&conn, "actor", 4, "Brown, Mary");
        catalogue::seed(&conn, "repository", 5, "Smith, John");

        let candidates = find_candidates(&conn, "actor", 1).unwrap();
        assert_eq!(candidates[0].entity_id, 2);
        assert!(candidates[0].similarity > 0.9);
        assert!(candidates.iter().all(|c| c.similarity >= CANDIDATE_THRESHOLD));
        assert!(candidates.iter().all(|c| c.entity_id != 4 && c.entity_id != 5));
        assert!(find_candidates(&conn, "actor", 99).unwrap().is_empty());
    }

    #[test]
    fn links_report_the_other_side() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        catalogue::seed(&conn, "actor", 2, "Smith, Jon");
        let p = propose(&conn, ada.id, &pair(1, 2)).unwrap();
        propose(&conn, ada.id, &pair(1, 3)).unwrap();
        resolve(&conn, p.id, ResolutionStatus::Accepted, ada.id).unwrap();

        let from_a = entity_links(&conn, "actor", 1).unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].linked_id, 2);
        assert_eq!(from_a[0].linked_label, "Smith, Jon");

        let from_b = entity_links(&conn, "actor", 2).unwrap();
        assert_eq!(from_b[0].linked_id, 1);
        assert_eq!(from_b[0].linked_label, "Actor #1");
    }
}
