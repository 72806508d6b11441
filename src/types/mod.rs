//! Closed vocabularies shared by storage, services and the REST layer.
//!
//! Every enum here round-trips through the same lowercase text in JSON
//! and in SQLite columns.

macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident as $label:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::ResearchError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::error::ResearchError::InvalidInput(format!(
                        "unknown {} '{}'",
                        $label, other
                    ))),
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|err: crate::error::ResearchError| {
                        rusqlite::types::FromSqlError::Other(Box::new(err))
                    })
            }
        }
    };
}

mod annotation;
mod assertion;
mod odrl;
mod page;
mod people;
mod reading_room;
mod reproduction;
mod research;
pub mod time;

pub use annotation::{AnnotationStatus, Motivation, SelectorType, Visibility};
pub use assertion::{AssertionStatus, AssertionType, EvidenceRelationship};
pub use odrl::{ConstraintOperator, LeftOperand, OdrlAction, PolicyType};
pub use page::{calculate_pagination, Paginated, Pagination, DEFAULT_PAGE_LIMIT};
pub use people::{CollaboratorStatus, ProjectStatus, ResearcherStatus};
pub use reading_room::{
    AssignmentStatus, BookingStatus, EquipmentBookingStatus, EquipmentCondition,
    EquipmentType, MaterialRequestStatus, QueueSortField, RequestPriority, ReturnCondition,
    SeatType, SortDirection,
};
pub use reproduction::{ColorMode, ReproductionItemStatus, ReproductionStatus, ReproductionType};
pub use research::{
    Completeness, DigestFrequency, EntryType, ExportFormat, RelationshipType, ResolutionStatus,
    SnapshotStatus, SourceType, ValidationAction, ValidationStatus,
};

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn parses_and_prints_the_same_text() {
        for status in AssertionStatus::ALL {
            let parsed: AssertionStatus = status.as_str().parse().unwrap();
            assert_eq!(&parsed, status);
        }
        assert_eq!(RelationshipType::SameAs.to_string(), "sameAs");
    }

    #[test]
    fn rejects_unknown_values_with_label() {
        let err = "shouting".parse::<Motivation>().unwrap_err();
        assert_eq!(err.to_string(), "invalid input: unknown motivation 'shouting'");
    }

    #[test]
    fn serde_uses_wire_text() {
        let json = serde_json::to_string(&SelectorType::TextQuoteSelector).unwrap();
        assert_eq!(json, "\"TextQuoteSelector\"");
        let back: Visibility = serde_json::from_str("\"public\"").unwrap();
        assert_eq!(back, Visibility::Public);
        assert!(serde_json::from_str::<Visibility>("\"secret\"").is_err());
    }

    #[test]
    fn stores_and_loads_through_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (s TEXT NOT NULL)").unwrap();
        conn.execute("INSERT INTO t (s) VALUES (?1)", [SeatType::Microfilm])
            .unwrap();
        let loaded: SeatType = conn
            .query_row("SELECT s FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(loaded, SeatType::Microfilm);

        conn.execute("INSERT INTO t (s) VALUES ('bogus')", []).unwrap();
        let err = conn
            .query_row("SELECT s FROM t WHERE s = 'bogus'", [], |row| {
                row.get::<_, SeatType>(0)
            })
            .unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(..)));
    }
}
