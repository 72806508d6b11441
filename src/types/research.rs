db_enum! {
    pub enum ResolutionStatus as "resolution status" {
        Proposed => "proposed",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

db_enum! {
    pub enum RelationshipType as "relationship type" {
        SameAs => "sameAs",
        RelatedTo => "relatedTo",
        PartOf => "partOf",
        MemberOf => "memberOf",
    }
}

impl Default for RelationshipType {
    fn default() -> Self {
        RelationshipType::SameAs
    }
}

impl RelationshipType {
    /// Assertion predicates that contradict a link of this type.
    pub fn conflicting_predicates(&self) -> &'static [&'static str] {
        match self {
            RelationshipType::SameAs => &["differentFrom", "supersedes", "replacedBy"],
            RelationshipType::RelatedTo => &[],
            RelationshipType::PartOf | RelationshipType::MemberOf => &["differentFrom"],
        }
    }
}

db_enum! {
    pub enum ValidationStatus as "validation status" {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Modified => "modified",
    }
}

db_enum! {
    pub enum ValidationAction as "validation action" {
        Accept => "accept",
        Reject => "reject",
        Modify => "modify",
    }
}

db_enum! {
    pub enum SnapshotStatus as "snapshot status" {
        Active => "active",
        Frozen => "frozen",
        Archived => "archived",
    }
}

db_enum! {
    pub enum SourceType as "source type" {
        Primary => "primary",
        Secondary => "secondary",
        Tertiary => "tertiary",
        Unknown => "unknown",
    }
}

db_enum! {
    pub enum Completeness as "completeness" {
        Complete => "complete",
        Substantial => "substantial",
        Partial => "partial",
        Fragmentary => "fragmentary",
        Unknown => "unknown",
    }
}

db_enum! {
    pub enum DigestFrequency as "digest frequency" {
        Immediate => "immediate",
        Daily => "daily",
        Weekly => "weekly",
        Never => "never",
    }
}

impl Default for DigestFrequency {
    fn default() -> Self {
        DigestFrequency::Immediate
    }
}

db_enum! {
    /// Kind of work a bibliography entry cites.
    pub enum EntryType as "entry type" {
        Archival => "archival",
        Book => "book",
        Article => "article",
        Chapter => "chapter",
        Thesis => "thesis",
        Website => "website",
        Other => "other",
    }
}

impl Default for EntryType {
    fn default() -> Self {
        EntryType::Archival
    }
}

db_enum! {
    /// Reference-manager formats a bibliography exports to.
    pub enum ExportFormat as "export format" {
        Ris => "ris",
        Bibtex => "bibtex",
        CslJson => "csl-json",
        Mendeley => "mendeley",
        ZoteroRdf => "zotero-rdf",
    }
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Ris => "application/x-research-info-systems",
            ExportFormat::Bibtex => "application/x-bibtex",
            ExportFormat::CslJson => "application/vnd.citationstyles.csl+json",
            ExportFormat::Mendeley => "application/json",
            ExportFormat::ZoteroRdf => "application/rdf+xml",
        }
    }
}
