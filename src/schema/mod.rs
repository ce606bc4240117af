//! Schema snapshot model.
//!
//! This module provides:
//! - Data models for tables, columns, foreign keys, views, and routines
//! - The `Database` aggregate: one immutable snapshot of a schema
//! - A `MetadataProvider` trait for sources of raw schema facts
//! - Dependency graph construction with dependency-sorted table ordering
//! - Heuristic textual reference detection for views and routines

mod graph;
mod resolver;
mod script;

pub use graph::*;
pub use resolver::*;
pub use script::*;

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Errors originating in the schema core.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A required identifier was missing or blank at construction time.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A table name could not be embedded in a reference-matching pattern.
    #[error("cannot build reference pattern for table '{table}'")]
    Pattern {
        table: String,
        #[source]
        source: regex::Error,
    },
}

/// Validate that a required identifier is present, returning it owned.
fn require(field: &str, value: &str) -> Result<String, SchemaError> {
    if value.trim().is_empty() {
        Err(SchemaError::InvalidInput(format!(
            "{field} must not be blank"
        )))
    } else {
        Ok(value.to_string())
    }
}

/// A column within a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// 1-based position within the table. Unique, but gaps are allowed.
    pub ordinal_position: u32,
    /// Declared data type (e.g. `varchar`, `decimal`)
    pub data_type: String,
    /// Numeric precision, for numeric types
    pub numeric_precision: Option<u32>,
    /// Maximum length, for character/binary types
    pub max_length: Option<u32>,
    /// Whether the column allows NULL
    pub is_nullable: bool,
    /// Default-value expression, if any
    pub column_default: Option<String>,
}

impl Column {
    /// Create a column. Name and data type are required.
    pub fn new(
        name: impl Into<String>,
        ordinal_position: u32,
        data_type: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            name: require("column name", &name.into())?,
            ordinal_position,
            data_type: require("column data type", &data_type.into())?,
            numeric_precision: None,
            max_length: None,
            is_nullable: true,
            column_default: None,
        })
    }

    pub fn with_precision(mut self, precision: Option<u32>) -> Self {
        self.numeric_precision = precision;
        self
    }

    pub fn with_max_length(mut self, max_length: Option<u32>) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.column_default = default;
        self
    }
}

/// A base table identified by (schema, name).
///
/// Columns are kept in an ordered map keyed by ordinal position; positions
/// are unique but not necessarily contiguous from 1.
#[derive(Debug, Clone)]
pub struct Table {
    schema: String,
    name: String,
    columns: BTreeMap<u32, Column>,
}

impl Table {
    /// Create a table from its identity and columns.
    ///
    /// Fails with `InvalidInput` on a blank schema or name, or when two
    /// columns share an ordinal position.
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = Column>,
    ) -> Result<Self, SchemaError> {
        let schema = require("table schema", &schema.into())?;
        let name = require("table name", &name.into())?;

        let mut map = BTreeMap::new();
        for column in columns {
            if map.insert(column.ordinal_position, column).is_some() {
                return Err(SchemaError::InvalidInput(format!(
                    "duplicate column ordinal in table {schema}.{name}"
                )));
            }
        }

        Ok(Self {
            schema,
            name,
            columns: map,
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `schema.name`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Columns in ordinal order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Look up a column by name (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

// Table identity is (schema, name); columns do not participate.
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.name == other.name
    }
}

impl Eq for Table {}

impl Hash for Table {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A named foreign-key constraint.
///
/// The parent is the referenced (primary-key) side; the child is the
/// referencing side that holds the constraint. Both tables are held by
/// value and compared by identity.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    name: String,
    schema: String,
    parent_table: Table,
    parent_column: String,
    child_table: Table,
    child_column: String,
}

impl ForeignKey {
    pub fn new(
        name: impl Into<String>,
        schema: impl Into<String>,
        parent_table: Table,
        parent_column: impl Into<String>,
        child_table: Table,
        child_column: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            name: require("foreign key name", &name.into())?,
            schema: require("foreign key schema", &schema.into())?,
            parent_table,
            parent_column: require("parent column name", &parent_column.into())?,
            child_table,
            child_column: require("child column name", &child_column.into())?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema owning the constraint.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// The referenced table.
    pub fn parent_table(&self) -> &Table {
        &self.parent_table
    }

    pub fn parent_column(&self) -> &str {
        &self.parent_column
    }

    /// The table holding the constraint.
    pub fn child_table(&self) -> &Table {
        &self.child_table
    }

    pub fn child_column(&self) -> &str {
        &self.child_column
    }
}

// Foreign key identity is (schema, constraint name).
impl PartialEq for ForeignKey {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.name == other.name
    }
}

impl Eq for ForeignKey {}

/// A view identified by (schema, name), with its full source definition.
#[derive(Debug, Clone)]
pub struct View {
    schema: String,
    name: String,
    definition: String,
}

impl View {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        definition: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            schema: require("view schema", &schema.into())?,
            name: require("view name", &name.into())?,
            definition: definition.into(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// The untruncated source definition.
    pub fn definition(&self) -> &str {
        &self.definition
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.name == other.name
    }
}

impl Eq for View {}

/// Kind of stored routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Procedure,
    Function,
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutineKind::Procedure => write!(f, "PROCEDURE"),
            RoutineKind::Function => write!(f, "FUNCTION"),
        }
    }
}

/// A stored routine identified by (schema, name).
#[derive(Debug, Clone)]
pub struct Routine {
    schema: String,
    name: String,
    definition: String,
    kind: RoutineKind,
}

impl Routine {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        definition: impl Into<String>,
        kind: RoutineKind,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            schema: require("routine schema", &schema.into())?,
            name: require("routine name", &name.into())?,
            definition: definition.into(),
            kind,
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// The untruncated source definition.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn kind(&self) -> RoutineKind {
        self.kind
    }
}

impl PartialEq for Routine {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.name == other.name
    }
}

impl Eq for Routine {}

/// Source of raw schema facts for one database snapshot.
///
/// Implementations own all I/O (catalog queries, script files). The core
/// consumes fully materialized collections and never goes back to the
/// source.
pub trait MetadataProvider {
    /// Name of the database the snapshot describes.
    fn database_name(&self) -> String;

    fn list_tables(&self) -> anyhow::Result<Vec<Table>>;
    fn list_foreign_keys(&self) -> anyhow::Result<Vec<ForeignKey>>;
    fn list_views(&self) -> anyhow::Result<Vec<View>>;
    fn list_routines(&self) -> anyhow::Result<Vec<Routine>>;
}

/// One immutable snapshot of a database schema.
///
/// Constructed once from a fully populated provider and never mutated;
/// every query over it is a pure read, so shared references are safe across
/// threads without coordination.
#[derive(Debug)]
pub struct Database {
    name: String,
    tables: Vec<Table>,
    foreign_keys: Vec<ForeignKey>,
    views: Vec<View>,
    routines: Vec<Routine>,
}

impl Database {
    /// Build a snapshot, enforcing uniqueness of object identities.
    pub fn new(
        name: impl Into<String>,
        tables: Vec<Table>,
        foreign_keys: Vec<ForeignKey>,
        views: Vec<View>,
        routines: Vec<Routine>,
    ) -> Result<Self, SchemaError> {
        let name = require("database name", &name.into())?;

        check_unique("table", tables.iter().map(Table::full_name))?;
        check_unique("view", views.iter().map(View::full_name))?;
        check_unique("routine", routines.iter().map(Routine::full_name))?;

        Ok(Self {
            name,
            tables,
            foreign_keys,
            views,
            routines,
        })
    }

    /// Build a snapshot from a metadata provider.
    pub fn from_provider(provider: &impl MetadataProvider) -> anyhow::Result<Self> {
        Ok(Self::new(
            provider.database_name(),
            provider.list_tables()?,
            provider.list_foreign_keys()?,
            provider.list_views()?,
            provider.list_routines()?,
        )?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tables in provider order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }
}

fn check_unique(kind: &str, names: impl Iterator<Item = String>) -> Result<(), SchemaError> {
    let mut seen = ahash::AHashSet::new();
    for name in names {
        if !seen.insert(name.clone()) {
            return Err(SchemaError::InvalidInput(format!(
                "duplicate {kind} '{name}' in snapshot"
            )));
        }
    }
    Ok(())
}
