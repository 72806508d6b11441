db_enum! {
    pub enum AssertionType as "assertion type" {
        Biographical => "biographical",
        Chronological => "chronological",
        Spatial => "spatial",
        Relational => "relational",
        Attributive => "attributive",
        Identity => "identity",
    }
}

impl Default for AssertionType {
    fn default() -> Self {
        AssertionType::Attributive
    }
}

db_enum! {
    pub enum AssertionStatus as "assertion status" {
        Proposed => "proposed",
        Verified => "verified",
        Disputed => "disputed",
        Retracted => "retracted",
    }
}

impl AssertionStatus {
    /// Activity type recorded when an assertion moves into this status.
    pub fn event_name(&self) -> &'static str {
        match self {
            AssertionStatus::Verified => "assertion_verified",
            AssertionStatus::Disputed => "assertion_disputed",
            AssertionStatus::Retracted => "assertion_retracted",
            AssertionStatus::Proposed => "assertion_status_changed",
        }
    }
}

db_enum! {
    pub enum EvidenceRelationship as "evidence relationship" {
        Supports => "supports",
        Refutes => "refutes",
    }
}

impl Default for EvidenceRelationship {
    fn default() -> Self {
        EvidenceRelationship::Supports
    }
}
