//! Relationship graph built from assertions, with GEXF and GraphML export.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::assertion::{map_assertion_row, Assertion};
use crate::catalogue;
use crate::error::Result;
use crate::types::{AssertionStatus, AssertionType};

const LITERAL_LABEL_MAX_CHARS: usize = 80;
const LITERAL: &str = "literal";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphFilter {
    #[serde(default)]
    pub assertion_type: Option<AssertionType>,
    #[serde(default)]
    pub status: Option<AssertionStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub entity_type: String,
    pub group: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub assertion_id: i64,
    pub source: String,
    pub target: String,
    pub label: String,
    pub assertion_type: AssertionType,
    pub status: AssertionStatus,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub assertion_types: BTreeMap<String, usize>,
    pub entity_types: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub stats: GraphStats,
}

pub fn group_for(entity_type: &str) -> u8 {
    match entity_type {
        "actor" => 1,
        "information_object" => 2,
        "repository" => 3,
        "term" => 4,
        "place" => 5,
        "event" => 6,
        "date" => 7,
        "concept" => 8,
        LITERAL => 9,
        _ => 0,
    }
}

fn literal_key(value: &str) -> String {
    let digest = hex::encode(Sha256::digest(value.as_bytes()));
    format!("value:{}", &digest[..16])
}

#[derive(Default)]
struct GraphBuilder {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
}

impl GraphBuilder {
    fn node(&mut self, id: String, label: String, entity_type: &str) -> String {
        if !self.index.contains_key(&id) {
            self.index.insert(id.clone(), self.nodes.len());
            self.nodes.push(Node {
                id: id.clone(),
                label,
                entity_type: entity_type.to_string(),
                group: group_for(entity_type),
            });
        }
        id
    }

    fn add(&mut self, a: &Assertion) {
        let (object_id, object_label, object_type) = match (&a.object_type, a.object_id, &a.object_value) {
            (Some(kind), Some(id), _) => (
                format!("{kind}:{id}"),
                a.object_label
                    .clone()
                    .unwrap_or_else(|| catalogue::fallback_label(kind, id)),
                kind.as_str(),
            ),
            (_, _, Some(value)) => (
                literal_key(value),
                value.chars().take(LITERAL_LABEL_MAX_CHARS).collect(),
                LITERAL,
            ),
            _ => return,
        };
        let subject_label = a
            .subject_label
            .clone()
            .unwrap_or_else(|| catalogue::fallback_label(&a.subject_type, a.subject_id));
        let subject = self.node(
            format!("{}:{}", a.subject_type, a.subject_id),
            subject_label,
            &a.subject_type,
        );
        let object = self.node(object_id, object_label, object_type);
        self.edges.push(Edge {
            assertion_id: a.id,
            source: subject,
            target: object,
            label: a.predicate.clone(),
            assertion_type: a.assertion_type,
            status: a.status,
            confidence: a.confidence,
        });
    }

    fn finish(self) -> Graph {
        let mut stats = GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            ..Default::default()
        };
        for edge in &self.edges {
            *stats
                .assertion_types
                .entry(edge.assertion_type.as_str().to_string())
                .or_default() += 1;
        }
        for node in &self.nodes {
            *stats.entity_types.entry(node.entity_type.clone()).or_default() += 1;
        }
        Graph {
            nodes: self.nodes,
            edges: self.edges,
            stats,
        }
    }
}

/// Retracted assertions are left out unless they are asked for explicitly.
pub fn build_relationship_graph(conn: &Connection, project_id: Option<i64>, filter: &GraphFilter) -> Result<Graph> {
    let mut stmt = conn.prepare(
        "SELECT id, researcher_id, project_id, subject_type, subject_id, subject_label, predicate,
                object_type, object_id, object_value, object_label, assertion_type, status, confidence, version,
                created_at, updated_at
         FROM assertion
         WHERE (?1 IS NULL OR project_id = ?1)
           AND (?2 IS NULL OR assertion_type = ?2)
           AND (CASE WHEN ?3 IS NULL THEN status != 'retracted' ELSE status = ?3 END)
         ORDER BY id",
    )?;
    let assertions = stmt
        .query_map(
            params![project_id, filter.assertion_type, filter.status],
            map_assertion_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut builder = GraphBuilder::default();
    for a in &assertions {
        builder.add(a);
    }
    let graph = builder.finish();
    log::debug!(
        "graph built: {} nodes, {} edges",
        graph.stats.node_count,
        graph.stats.edge_count
    );
    Ok(graph)
}

/// Escapes markup characters and drops code points XML 1.0 cannot carry.
pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\t' | '\n' | '\r' => out.push(c),
            '\u{0}'..='\u{1F}' => {}
            '\u{FFFE}' | '\u{FFFF}' => {}
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

pub fn export_gexf(graph: &Graph) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<gexf xmlns=\"http://gexf.net/1.3\" version=\"1.3\">\n");
    out.push_str("  <meta>\n    <creator>research-services</creator>\n  </meta>\n");
    out.push_str("  <graph defaultedgetype=\"directed\" mode=\"static\">\n");
    out.push_str("    <attributes class=\"node\">\n");
    out.push_str("      <attribute id=\"entity_type\" title=\"entity_type\" type=\"string\"/>\n");
    out.push_str("      <attribute id=\"group\" title=\"group\" type=\"integer\"/>\n");
    out.push_str("    </attributes>\n");
    out.push_str("    <attributes class=\"edge\">\n");
    out.push_str("      <attribute id=\"assertion_type\" title=\"assertion_type\" type=\"string\"/>\n");
    out.push_str("      <attribute id=\"status\" title=\"status\" type=\"string\"/>\n");
    out.push_str("    </attributes>\n");

    out.push_str("    <nodes>\n");
    for node in &graph.nodes {
        let _ = writeln!(
            out,
            "      <node id=\"{}\" label=\"{}\">\n        <attvalues>\n          <attvalue for=\"entity_type\" value=\"{}\"/>\n          <attvalue for=\"group\" value=\"{}\"/>\n        </attvalues>\n      </node>",
            escape_xml(&node.id),
            escape_xml(&node.label),
            escape_xml(&node.entity_type),
            node.group
        );
    }
    out.push_str("    </nodes>\n");

    out.push_str("    <edges>\n");
    for (i, edge) in graph.edges.iter().enumerate() {
        let weight = edge.confidence.map(|c| c / 100.0).unwrap_or(1.0);
        let _ = writeln!(
            out,
            "      <edge id=\"{i}\" source=\"{}\" target=\"{}\" label=\"{}\" weight=\"{weight}\">\n        <attvalues>\n          <attvalue for=\"assertion_type\" value=\"{}\"/>\n          <attvalue for=\"status\" value=\"{}\"/>\n        </attvalues>\n      </edge>",
            escape_xml(&edge.source),
            escape_xml(&edge.target),
            escape_xml(&edge.label),
            edge.assertion_type,
            edge.status
        );
    }
    out.push_str("    </edges>\n");
    out.push_str("  </graph>\n</gexf>\n");
    out
}

pub fn export_graphml(graph: &Graph) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    out.push_str("  <key id=\"label\" for=\"node\" attr.name=\"label\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"entity_type\" for=\"node\" attr.name=\"entity_type\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"predicate\" for=\"edge\" attr.name=\"predicate\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"assertion_type\" for=\"edge\" attr.name=\"assertion_type\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"status\" for=\"edge\" attr.name=\"status\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"confidence\" for=\"edge\" attr.name=\"confidence\" attr.type=\"double\"/>\n");
    out.push_str("  <graph id=\"research\" edgedefault=\"directed\">\n");

    for node in &graph.nodes {
        let _ = writeln!(
            out,
            "    <node id=\"{}\">\n      <data key=\"label\">{}</data>\n      <data key=\"entity_type\">{}</data>\n    </node>",
            escape_xml(&node.id),
            escape_xml(&node.label),
            escape_xml(&node.entity_type)
        );
    }
    for (i, edge) in graph.edges.iter().enumerate() {
        let _ = write!(
            out,
            "    <edge id=\"e{i}\" source=\"{}\" target=\"{}\">\n      <data key=\"predicate\">{}</data>\n      <data key=\"assertion_type\">{}</data>\n      <data key=\"status\">{}</data>\n",
            escape_xml(&edge.source),
            escape_xml(&edge.target),
            escape_xml(&edge.label),
            edge.assertion_type,
            edge.status
        );
        if let Some(confidence) = edge.confidence {
            let _ = writeln!(out, "      <data key=\"confidence\">{confidence}</data>");
        }
        out.push_str("    </edge>\n");
    }
    out.push_str("  </graph>\n</graphml>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::{self, NewAssertion};
    use crate::people::fixtures;
    use crate::storage::sqlite::test_conn;

    fn link(conn: &Connection, researcher: i64, project: Option<i64>, object_id: Option<i64>, value: Option<&str>) -> Assertion {
        assertion::create(
            conn,
            researcher,
            &NewAssertion {
                project_id: project,
                subject_type: "actor".into(),
                subject_id: 1,
                subject_label: Some("Smith & Sons".into()),
                predicate: "relatedTo".into(),
                object_type: object_id.map(|_| "information_object".to_string()),
                object_id,
                object_value: value.map(str::to_string),
                assertion_type: AssertionType::Relational,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn nodes_are_shared_and_literals_are_hashed() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        let project = fixtures::project(&conn, ada.id, "Graph");
        link(&conn, ada.id, Some(project.id), Some(5), None);
        link(&conn, ada.id, Some(project.id), Some(6), None);
        let long = "x".repeat(120);
        link(&conn, ada.id, Some(project.id), None, Some(&long));
        link(&conn, ada.id, None, Some(9), None);

        let graph = build_relationship_graph(&conn, Some(project.id), &GraphFilter::default()).unwrap();
        assert_eq!(graph.stats.node_count, 4);
        assert_eq!(graph.stats.edge_count, 3);
        assert_eq!(graph.stats.entity_types.get("actor"), Some(&1));
        assert_eq!(graph.stats.assertion_types.get("relational"), Some(&3));

        let literal = graph.nodes.iter().find(|n| n.entity_type == LITERAL).unwrap();
        assert!(literal.id.starts_with("value:"));
        assert_eq!(literal.id.len(), "value:".len() + 16);
        assert_eq!(literal.label.chars().count(), LITERAL_LABEL_MAX_CHARS);
        assert_eq!(literal.group, 9);
        assert_eq!(graph.nodes[0].id, "actor:1");
        assert_eq!(graph.nodes[0].group, 1);
    }

    #[test]
    fn retracted_assertions_need_an_explicit_status_filter() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        let a = link(&conn, ada.id, None, Some(5), None);
        assertion::update_status(&conn, a.id, ada.id, AssertionStatus::Retracted).unwrap();

        let default = build_relationship_graph(&conn, None, &GraphFilter::default()).unwrap();
        assert_eq!(default.stats.edge_count, 0);

        let retracted = build_relationship_graph(
            &conn,
            None,
            &GraphFilter {
                status: Some(AssertionStatus::Retracted),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(retracted.stats.edge_count, 1);
    }

    #[test]
    fn escape_drops_characters_xml_cannot_carry() {
        assert_eq!(escape_xml("Box\u{0} 4\u{1B}[0m"), "Box 4[0m");
        assert_eq!(escape_xml("a\tb\nc\rd"), "a\tb\nc\rd");
        assert_eq!(escape_xml("x\u{FFFF}<y>"), "x&lt;y&gt;");
        assert_eq!(escape_xml("Çà & \"é\""), "Çà &amp; &quot;é&quot;");
    }

    #[test]
    fn exports_escape_labels() {
        let conn = test_conn();
        let ada = fixtures::researcher(&conn, "Ada", "Lovelace");
        link(&conn, ada.id, None, Some(5), None);
        let graph = build_relationship_graph(&conn, None, &GraphFilter::default()).unwrap();

        let gexf = export_gexf(&graph);
        assert!(gexf.contains("<gexf xmlns=\"http://gexf.net/1.3\" version=\"1.3\">"));
        assert!(gexf.contains("defaultedgetype=\"directed\""));
        assert!(gexf.contains("label=\"Smith &amp; Sons\""));
        assert!(gexf.contains("source=\"actor:1\" target=\"information_object:5\""));

        let graphml = export_graphml(&graph);
        assert!(graphml.contains("edgedefault=\"directed\""));
        assert!(graphml.contains("<data key=\"label\">Smith &amp; Sons</data>"));
        assert!(graphml.contains("<data key=\"predicate\">relatedTo</data>"));
    }
}
