//! The fixed catalog of benchmark test types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::error::{Error, Result};

/// Identity of a test type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestKind {
    CreateUpdate,
    CreateUpdateScalars,
    CreateUpdateIndexed,
    Crud,
    CrudScalars,
    CrudIndexed,
    QueryString,
    QueryStringIndexed,
    QueryInteger,
    QueryIntegerIndexed,
    QueryId,
    QueryIdRandom,
    DeleteAll,
}

impl TestKind {
    /// Catalog entry for this identity.
    pub fn test_type(self) -> &'static TestType {
        TestCatalog::by_identity(self)
    }

    /// Entity shape the test operates on.
    ///
    /// `DeleteAll` touches both shapes and reports `Simple` here.
    pub fn entity_kind(self) -> EntityKind {
        match self {
            TestKind::CreateUpdateIndexed
            | TestKind::CrudIndexed
            | TestKind::QueryStringIndexed
            | TestKind::QueryIntegerIndexed => EntityKind::Indexed,
            _ => EntityKind::Simple,
        }
    }

    /// Whether only scalar fields are populated.
    pub fn scalars_only(self) -> bool {
        matches!(self, TestKind::CreateUpdateScalars | TestKind::CrudScalars)
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.test_type().short_name)
    }
}

impl FromStr for TestKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TestCatalog::by_short_name(s).map(|t| t.kind)
    }
}

/// One benchmark scenario of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestType {
    /// Stable identity.
    pub kind: TestKind,
    /// Human-readable name shown in reports.
    pub display_name: &'static str,
    /// Lowercase, hyphen-separated name safe for URLs and file names.
    pub short_name: &'static str,
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name)
    }
}

const fn entry(kind: TestKind, display_name: &'static str, short_name: &'static str) -> TestType {
    TestType {
        kind,
        display_name,
        short_name,
    }
}

static CATALOG: [TestType; 13] = [
    entry(TestKind::CreateUpdate, "Create & Update", "create-update"),
    entry(
        TestKind::CreateUpdateScalars,
        "Create & Update - scalars",
        "create-update-scalars",
    ),
    entry(
        TestKind::CreateUpdateIndexed,
        "Create & Update - indexed",
        "create-update-indexed",
    ),
    entry(TestKind::Crud, "Basic operations (CRUD)", "crud"),
    entry(
        TestKind::CrudScalars,
        "Basic operations (CRUD) - scalars",
        "crud-scalars",
    ),
    entry(
        TestKind::CrudIndexed,
        "Basic operations (CRUD) - indexed",
        "crud-indexed",
    ),
    entry(TestKind::QueryString, "Query by string", "query-string"),
    entry(
        TestKind::QueryStringIndexed,
        "Query by string - indexed",
        "query-string-indexed",
    ),
    entry(TestKind::QueryInteger, "Query by integer", "query-integer"),
    entry(
        TestKind::QueryIntegerIndexed,
        "Query by integer - indexed",
        "query-integer-indexed",
    ),
    entry(TestKind::QueryId, "Query by ID", "query-id"),
    entry(TestKind::QueryIdRandom, "Query by ID - random", "query-id-random"),
    entry(TestKind::DeleteAll, "Delete All", "delete-all"),
];

/// Read-only access to the process-wide test catalog.
pub struct TestCatalog;

impl TestCatalog {
    /// Every test type in declaration order.
    pub fn all() -> &'static [TestType] {
        &CATALOG
    }

    /// Look up a test type by identity. Total over [`TestKind`].
    pub fn by_identity(kind: TestKind) -> &'static TestType {
        // Entries are declared in enum order.
        &CATALOG[kind as usize]
    }

    /// Look up a test type by its short name.
    pub fn by_short_name(name: &str) -> Result<&'static TestType> {
        CATALOG
            .iter()
            .find(|t| t.short_name == name)
            .ok_or_else(|| Error::CatalogLookup(name.to_string()))
    }

    /// Resolve a list of short names, preserving order.
    ///
    /// An empty list selects the whole catalog.
    pub fn resolve<S: AsRef<str>>(names: &[S]) -> Result<Vec<TestKind>> {
        if names.is_empty() {
            return Ok(CATALOG.iter().map(|t| t.kind).collect());
        }
        names
            .iter()
            .map(|name| Self::by_short_name(name.as_ref().trim()).map(|t| t.kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_has_thirteen_entries_in_order() {
        let all = TestCatalog::all();
        assert_eq!(all.len(), 13);
        assert_eq!(all[0].kind, TestKind::CreateUpdate);
        assert_eq!(all[3].kind, TestKind::Crud);
        assert_eq!(all[12].kind, TestKind::DeleteAll);
    }

    #[test]
    fn test_lookup_by_identity_is_total() {
        for entry in TestCatalog::all() {
            let found = TestCatalog::by_identity(entry.kind);
            assert_eq!(found, entry);
        }
    }

    #[test]
    fn test_names_are_unique_and_file_safe() {
        let mut display = HashSet::new();
        let mut short = HashSet::new();
        for entry in TestCatalog::all() {
            assert!(display.insert(entry.display_name), "{}", entry.display_name);
            assert!(short.insert(entry.short_name), "{}", entry.short_name);
            assert!(entry
                .short_name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '-'));
            assert!(!entry.short_name.starts_with('-') && !entry.short_name.ends_with('-'));
        }
    }

    #[test]
    fn test_short_name_lookup() {
        let crud = TestCatalog::by_short_name("crud").unwrap();
        assert_eq!(crud.kind, TestKind::Crud);
        assert_eq!(crud.display_name, "Basic operations (CRUD)");

        assert!(matches!(
            TestCatalog::by_short_name("crud-everything"),
            Err(Error::CatalogLookup(_))
        ));
        assert_eq!("query-id".parse::<TestKind>().unwrap(), TestKind::QueryId);
        assert_eq!(TestKind::QueryIdRandom.to_string(), "query-id-random");
    }

    #[test]
    fn test_resolve() {
        assert_eq!(TestCatalog::resolve::<&str>(&[]).unwrap().len(), 13);
        assert_eq!(
            TestCatalog::resolve(&["crud", " delete-all"]).unwrap(),
            vec![TestKind::Crud, TestKind::DeleteAll]
        );
        assert!(TestCatalog::resolve(&["crud", "nope"]).is_err());
    }

    #[test]
    fn test_kind_properties() {
        assert_eq!(TestKind::CrudIndexed.entity_kind(), EntityKind::Indexed);
        assert_eq!(TestKind::QueryString.entity_kind(), EntityKind::Simple);
        assert!(TestKind::CrudScalars.scalars_only());
        assert!(!TestKind::Crud.scalars_only());
    }
}
