//! Reference-manager formats: RIS, BibTeX, CSL-JSON, Mendeley JSON and
//! Zotero RDF out; RIS, BibTeX and free-text citations in.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use super::{Entry, NewEntry};
use crate::error::Result;
use crate::graph::escape_xml;
use crate::types::{EntryType, ExportFormat};

static RIS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][A-Z0-9])\s+-\s?(.*)$").expect("Invalid RIS line regex"));
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(1[89]\d{2}|20[0-2]\d)\b").expect("Invalid year regex"));
static FOUR_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").expect("Invalid digits regex"));
static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").expect("Invalid url regex"));
static QUOTED_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"]+)"|“([^”]+)”|<(?:em|i)>(.+?)</(?:em|i)>"#).expect("Invalid title regex")
});

pub fn export(entries: &[Entry], format: ExportFormat) -> Result<String> {
    Ok(match format {
        ExportFormat::Ris => to_ris(entries),
        ExportFormat::Bibtex => to_bibtex(entries),
        ExportFormat::CslJson => serde_json::to_string_pretty(&to_csl_json(entries))?,
        ExportFormat::Mendeley => serde_json::to_string_pretty(&to_mendeley_json(entries))?,
        ExportFormat::ZoteroRdf => to_zotero_rdf(entries),
    })
}

fn authors(entry: &Entry) -> Vec<&str> {
    entry
        .authors
        .as_deref()
        .map(|a| a.split(';').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// `Family, Given` splits in two; anything else is a literal name.
fn name_parts(author: &str) -> (&str, Option<&str>) {
    match author.split_once(',') {
        Some((family, given)) if !given.trim().is_empty() => (family.trim(), Some(given.trim())),
        _ => (author.trim(), None),
    }
}

fn year(entry: &Entry) -> Option<&str> {
    entry
        .date
        .as_deref()
        .and_then(|d| FOUR_DIGITS.find(d))
        .map(|m| m.as_str())
}

// RIS

fn ris_type(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::Archival => "UNPB",
        EntryType::Book => "BOOK",
        EntryType::Article => "JOUR",
        EntryType::Chapter => "CHAP",
        EntryType::Thesis => "THES",
        EntryType::Website => "ELEC",
        EntryType::Other => "GEN",
    }
}

fn ris_entry_type(tag: &str) -> EntryType {
    match tag {
        "BOOK" => EntryType::Book,
        "JOUR" | "MGZN" | "NEWS" => EntryType::Article,
        "CHAP" => EntryType::Chapter,
        "THES" => EntryType::Thesis,
        "ELEC" | "WEB" => EntryType::Website,
        "UNPB" | "MANSCPT" => EntryType::Archival,
        _ => EntryType::Other,
    }
}

pub fn to_ris(entries: &[Entry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let mut tag = |name: &str, value: Option<&str>| {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                let _ = writeln!(out, "{name}  - {value}");
            }
        };
        tag("TY", Some(ris_type(entry.entry_type)));
        tag("TI", entry.title.as_deref());
        for author in authors(entry) {
            tag("AU", Some(author));
        }
        tag("PY", entry.date.as_deref());
        tag("PB", entry.publisher.as_deref());
        tag("T2", entry.container_title.as_deref());
        tag("VL", entry.volume.as_deref());
        tag("IS", entry.issue.as_deref());
        tag("SP", entry.pages.as_deref());
        tag("DO", entry.doi.as_deref());
        tag("UR", entry.url.as_deref());
        tag("AN", entry.archive_name.as_deref());
        tag("AV", entry.archive_location.as_deref());
        let prefixed = |prefix: &str, value: &Option<String>| value.as_ref().map(|v| format!("{prefix}{v}"));
        tag("N1", prefixed("Collection: ", &entry.collection_title).as_deref());
        tag("N1", prefixed("Box: ", &entry.box_number).as_deref());
        tag("N1", prefixed("Folder: ", &entry.folder).as_deref());
        tag("N1", entry.notes.as_deref());
        tag("Y2", entry.accessed_date.as_deref());
        out.push_str("ER  - \n\n");
    }
    out
}

fn append(slot: &mut Option<String>, value: &str, separator: &str) {
    match slot {
        Some(existing) => {
            existing.push_str(separator);
            existing.push_str(value);
        }
        None => *slot = Some(value.to_string()),
    }
}

/// Reads `TAG  - value` records. A new `TY` closes any open record and a
/// trailing record without `ER` still counts. Records without a title
/// are dropped.
pub fn parse_ris(ris: &str) -> Vec<NewEntry> {
    let mut parsed = Vec::new();
    let mut current: Option<NewEntry> = None;
    for line in ris.lines() {
        let Some(caps) = RIS_LINE.captures(line.trim_end()) else {
            continue;
        };
        let tag = &caps[1];
        let value = caps[2].trim();
        if tag == "TY" {
            parsed.extend(current.take());
            current = Some(NewEntry {
                entry_type: Some(ris_entry_type(value)),
                ..Default::default()
            });
            continue;
        }
        if tag == "ER" {
            parsed.extend(current.take());
            continue;
        }
        let Some(entry) = current.as_mut() else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        match tag {
            "TI" | "T1" => entry.title = Some(value.to_string()),
            "AU" | "A1" => append(&mut entry.authors, value, "; "),
            "PY" | "Y1" | "DA" => {
                if entry.date.is_none() {
                    entry.date = Some(value.to_string());
                }
            }
            "PB" => entry.publisher = Some(value.to_string()),
            "JO" | "JF" | "T2" => entry.container_title = Some(value.to_string()),
            "VL" => entry.volume = Some(value.to_string()),
            "IS" => entry.issue = Some(value.to_string()),
            "SP" => entry.pages = Some(value.to_string()),
            "EP" => append(&mut entry.pages, value, "-"),
            "DO" => entry.doi = Some(value.to_string()),
            "UR" | "L1" => entry.url = Some(value.to_string()),
            "AN" => entry.archive_name = Some(value.to_string()),
            "AV" => entry.archive_location = Some(value.to_string()),
            "Y2" => entry.accessed_date = Some(value.to_string()),
            "N1" => {
                if let Some(rest) = value.strip_prefix("Collection: ") {
                    entry.collection_title = Some(rest.to_string());
                } else if let Some(rest) = value.strip_prefix("Box: ") {
                    entry.box_number = Some(rest.to_string());
                } else if let Some(rest) = value.strip_prefix("Folder: ") {
                    entry.folder = Some(rest.to_string());
                } else {
                    append(&mut entry.notes, value, "\n");
                }
            }
            _ => {}
        }
    }
    parsed.extend(current);
    parsed.retain(|e| e.title.is_some());
    parsed
}

// BibTeX

fn bibtex_type(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::Archival | EntryType::Other => "misc",
        EntryType::Book => "book",
        EntryType::Article => "article",
        EntryType::Chapter => "incollection",
        EntryType::Thesis => "phdthesis",
        EntryType::Website => "online",
    }
}

fn escape_bibtex(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_bibtex(raw: &str) -> String {
    let raw = raw
        .replace("\\textasciitilde{}", "~")
        .replace("\\textasciicircum{}", "^");
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(&next @ ('&' | '%' | '$' | '#' | '_' | '{' | '}' | '\\')) => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            },
            '{' | '}' => {}
            other => out.push(other),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn to_bibtex(entries: &[Entry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let mut fields: Vec<(&str, String)> = Vec::new();
        let mut field = |name: &'static str, value: Option<&str>| {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                fields.push((name, escape_bibtex(value)));
            }
        };
        field("title", entry.title.as_deref());
        let names = authors(entry);
        let joined = (!names.is_empty()).then(|| names.join(" and "));
        field("author", joined.as_deref());
        field("year", year(entry));
        field("publisher", entry.publisher.as_deref());
        let container = if entry.entry_type == EntryType::Article { "journal" } else { "booktitle" };
        field(container, entry.container_title.as_deref());
        field("volume", entry.volume.as_deref());
        field("number", entry.issue.as_deref());
        field("pages", entry.pages.as_deref());
        field("doi", entry.doi.as_deref());
        field("url", entry.url.as_deref());
        field("howpublished", entry.archive_name.as_deref());
        field("note", entry.notes.as_deref());

        let _ = writeln!(out, "@{}{{entry{},", bibtex_type(entry.entry_type), entry.id);
        let body: Vec<String> = fields
            .iter()
            .map(|(name, value)| format!("  {name} = {{{value}}}"))
            .collect();
        out.push_str(&body.join(",\n"));
        out.push_str("\n}\n\n");
    }
    out
}

struct BibtexScanner {
    chars: Vec<char>,
    pos: usize,
}

impl BibtexScanner {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&keep) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Body of a `{...}` group, the opening brace already consumed.
    fn braced(&mut self) -> String {
        let start = self.pos;
        let mut depth = 1;
        while let Some(c) = self.peek() {
            match c {
                '\\' => self.pos += 1,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let body = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        return body;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        self.pos = self.pos.min(self.chars.len());
        self.chars[start..self.pos].iter().collect()
    }

    fn quoted(&mut self) -> String {
        let start = self.pos;
        let mut depth = 0;
        while let Some(c) = self.peek() {
            match c {
                '\\' => self.pos += 1,
                '{' => depth += 1,
                '}' => depth -= 1,
                '"' if depth == 0 => {
                    let body = self.chars[start..self.pos].iter().collect();
                    self.pos += 1;
                    return body;
                }
                _ => {}
            }
            self.pos += 1;
        }
        self.pos = self.pos.min(self.chars.len());
        self.chars[start..self.pos].iter().collect()
    }

    fn value(&mut self) -> String {
        self.skip_whitespace();
        match self.peek() {
            Some('{') => {
                self.pos += 1;
                self.braced()
            }
            Some('"') => {
                self.pos += 1;
                self.quoted()
            }
            _ => self.take_while(|c| c != ',' && c != '}').trim().to_string(),
        }
    }

    /// `name = value` pairs up to the record's closing brace.
    fn fields(&mut self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return fields,
                Some('}') => {
                    self.pos += 1;
                    return fields;
                }
                Some(',') => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }
            let name = self.take_while(|c| c != '=' && c != ',' && c != '}');
            if self.peek() != Some('=') {
                continue;
            }
            self.pos += 1;
            let value = self.value();
            fields.push((name.trim().to_lowercase(), value));
        }
    }
}

fn bibtex_entry_type(kind: &str, has_howpublished: bool) -> EntryType {
    match kind {
        "book" | "booklet" => EntryType::Book,
        "article" => EntryType::Article,
        "inbook" | "incollection" | "inproceedings" => EntryType::Chapter,
        "phdthesis" | "mastersthesis" => EntryType::Thesis,
        "online" | "electronic" | "www" => EntryType::Website,
        "misc" if has_howpublished => EntryType::Archival,
        _ => EntryType::Other,
    }
}

/// Reads `@type{key, field = {..} | ".." | bare, ...}` records, skipping
/// `@comment`, `@preamble` and `@string`. Records without a title are dropped.
pub fn parse_bibtex(bibtex: &str) -> Vec<NewEntry> {
    let mut scanner = BibtexScanner {
        chars: bibtex.chars().collect(),
        pos: 0,
    };
    let mut parsed = Vec::new();
    while let Some(offset) = scanner
        .chars
        .get(scanner.pos..)
        .and_then(|rest| rest.iter().position(|&c| c == '@'))
    {
        scanner.pos += offset + 1;
        let kind = scanner.take_while(char::is_alphanumeric).to_lowercase();
        scanner.skip_whitespace();
        if scanner.peek() != Some('{') {
            continue;
        }
        scanner.pos += 1;
        if matches!(kind.as_str(), "comment" | "preamble" | "string") {
            scanner.braced();
            continue;
        }
        scanner.take_while(|c| c != ',' && c != '}');
        let fields = scanner.fields();

        let mut entry = NewEntry::default();
        let mut has_howpublished = false;
        for (name, raw) in fields {
            let value = unescape_bibtex(&raw);
            if value.is_empty() {
                continue;
            }
            match name.as_str() {
                "title" => entry.title = Some(value),
                "author" => {
                    let names: Vec<&str> = value.split(" and ").map(str::trim).collect();
                    entry.authors = Some(names.join("; "));
                }
                "year" => entry.date = Some(value),
                "publisher" => entry.publisher = Some(value),
                "journal" | "booktitle" => entry.container_title = Some(value),
                "volume" => entry.volume = Some(value),
                "number" => entry.issue = Some(value),
                "pages" => entry.pages = Some(value.replace("--", "-")),
                "doi" => entry.doi = Some(value),
                "url" => entry.url = Some(value),
                "howpublished" => {
                    has_howpublished = true;
                    entry.archive_name = Some(value);
                }
                "note" => entry.notes = Some(value),
                _ => {}
            }
        }
        entry.entry_type = Some(bibtex_entry_type(&kind, has_howpublished));
        if entry.title.is_some() {
            parsed.push(entry);
        }
    }
    parsed
}

// JSON and RDF

fn csl_type(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::Archival => "manuscript",
        EntryType::Book => "book",
        EntryType::Article => "article-journal",
        EntryType::Chapter => "chapter",
        EntryType::Thesis => "thesis",
        EntryType::Website => "webpage",
        EntryType::Other => "document",
    }
}

fn date_parts(date: &str) -> Option<Value> {
    let parts: Vec<i64> = date
        .split(['-', '/'])
        .take(3)
        .map_while(|p| p.trim().parse().ok())
        .collect();
    (!parts.is_empty()).then(|| json!({ "date-parts": [parts] }))
}

fn csl_item(entry: &Entry) -> Value {
    let mut item = Map::new();
    item.insert("id".into(), json!(format!("entry_{}", entry.id)));
    item.insert("type".into(), json!(csl_type(entry.entry_type)));
    let mut put = |key: &str, value: &Option<String>| {
        if let Some(value) = value {
            item.insert(key.into(), json!(value));
        }
    };
    put("title", &entry.title);
    put("publisher", &entry.publisher);
    put("container-title", &entry.container_title);
    put("volume", &entry.volume);
    put("issue", &entry.issue);
    put("page", &entry.pages);
    put("DOI", &entry.doi);
    put("URL", &entry.url);
    put("archive", &entry.archive_name);
    put("archive_location", &entry.archive_location);
    put("collection-title", &entry.collection_title);
    put("note", &entry.notes);

    let names: Vec<Value> = authors(entry)
        .into_iter()
        .map(|author| match name_parts(author) {
            (family, Some(given)) => json!({ "family": family, "given": given }),
            (literal, None) => json!({ "literal": literal }),
        })
        .collect();
    if !names.is_empty() {
        item.insert("author".into(), Value::Array(names));
    }
    if let Some(issued) = entry.date.as_deref().and_then(date_parts) {
        item.insert("issued".into(), issued);
    }
    if let Some(accessed) = entry.accessed_date.as_deref().and_then(date_parts) {
        item.insert("accessed".into(), accessed);
    }
    if let Some(Value::Object(extra)) = &entry.csl_data {
        for (key, value) in extra {
            item.insert(key.clone(), value.clone());
        }
    }
    Value::Object(item)
}

pub fn to_csl_json(entries: &[Entry]) -> Value {
    Value::Array(entries.iter().map(csl_item).collect())
}

fn mendeley_type(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::Book => "book",
        EntryType::Article => "journal",
        EntryType::Chapter => "book_section",
        EntryType::Thesis => "thesis",
        EntryType::Website => "web_page",
        EntryType::Archival | EntryType::Other => "generic",
    }
}

pub fn to_mendeley_json(entries: &[Entry]) -> Value {
    let documents = entries
        .iter()
        .map(|entry| {
            let names: Vec<Value> = authors(entry)
                .into_iter()
                .map(|author| {
                    let (last, first) = name_parts(author);
                    json!({ "last_name": last, "first_name": first })
                })
                .collect();
            json!({
                "type": mendeley_type(entry.entry_type),
                "title": entry.title,
                "authors": names,
                "year": year(entry).and_then(|y| y.parse::<i64>().ok()),
                "source": entry.container_title,
                "publisher": entry.publisher,
                "volume": entry.volume,
                "issue": entry.issue,
                "pages": entry.pages,
                "identifiers": { "doi": entry.doi },
                "websites": entry.url.iter().collect::<Vec<_>>(),
                "notes": entry.notes,
            })
        })
        .collect();
    Value::Array(documents)
}

fn zotero_type(entry_type: EntryType) -> (&'static str, &'static str) {
    match entry_type {
        EntryType::Archival => ("bib:Manuscript", "manuscript"),
        EntryType::Book => ("bib:Book", "book"),
        EntryType::Article => ("bib:Article", "journalArticle"),
        EntryType::Chapter => ("bib:BookSection", "bookSection"),
        EntryType::Thesis => ("bib:Thesis", "thesis"),
        EntryType::Website => ("bib:Document", "webpage"),
        EntryType::Other => ("bib:Document", "document"),
    }
}

pub fn to_zotero_rdf(entries: &[Entry]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\"\n  \
         xmlns:z=\"http://www.zotero.org/namespaces/export#\"\n  \
         xmlns:dc=\"http://purl.org/dc/elements/1.1/\"\n  \
         xmlns:dcterms=\"http://purl.org/dc/terms/\"\n  \
         xmlns:bib=\"http://purl.org/net/biblio#\"\n  \
         xmlns:foaf=\"http://xmlns.com/foaf/0.1/\">\n",
    );
    for entry in entries {
        let (element, item_type) = zotero_type(entry.entry_type);
        let _ = writeln!(out, "  <{element} rdf:about=\"#entry_{}\">", entry.id);
        let _ = writeln!(out, "    <z:itemType>{item_type}</z:itemType>");
        let mut simple = |tag: &str, value: &Option<String>| {
            if let Some(value) = value {
                let _ = writeln!(out, "    <{tag}>{}</{tag}>", escape_xml(value));
            }
        };
        simple("dc:title", &entry.title);
        simple("dc:date", &entry.date);
        simple("dc:publisher", &entry.publisher);
        simple("dc:description", &entry.notes);
        simple("z:archive", &entry.archive_name);
        simple("z:archiveLocation", &entry.archive_location);
        simple("dcterms:dateSubmitted", &entry.accessed_date);
        let names = authors(entry);
        if !names.is_empty() {
            out.push_str("    <bib:authors>\n      <rdf:Seq>\n");
            for author in names {
                let (family, given) = name_parts(author);
                out.push_str("        <rdf:li><foaf:Person>");
                let _ = write!(out, "<foaf:surname>{}</foaf:surname>", escape_xml(family));
                if let Some(given) = given {
                    let _ = write!(out, "<foaf:givenName>{}</foaf:givenName>", escape_xml(given));
                }
                out.push_str("</foaf:Person></rdf:li>\n");
            }
            out.push_str("      </rdf:Seq>\n    </bib:authors>\n");
        }
        if let Some(doi) = &entry.doi {
            let _ = writeln!(out, "    <dc:identifier>DOI {}</dc:identifier>", escape_xml(doi));
        }
        if let Some(url) = &entry.url {
            let _ = writeln!(
                out,
                "    <dc:identifier><dcterms:URI><rdf:value>{}</rdf:value></dcterms:URI></dc:identifier>",
                escape_xml(url)
            );
        }
        let _ = writeln!(out, "  </{element}>");
    }
    out.push_str("</rdf:RDF>\n");
    out
}

/// Pulls a URL, a year and a quoted or emphasised title out of a
/// formatted citation; the title falls back to its first 200 characters.
pub fn parse_citation(citation: &str) -> NewEntry {
    let citation = citation.trim();
    let title = QUOTED_TITLE
        .captures(citation)
        .and_then(|caps| caps.iter().skip(1).flatten().next().map(|m| m.as_str().trim().to_string()))
        .unwrap_or_else(|| citation.chars().take(200).collect());
    NewEntry {
        entry_type: Some(EntryType::Other),
        title: Some(title),
        date: YEAR.find(citation).map(|m| m.as_str().to_string()),
        url: URL
            .find(citation)
            .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ')']).to_string()),
        notes: Some(format!("Imported from citation: {citation}")),
        ..Default::default()
    }
}
