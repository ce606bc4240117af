//! DDL script metadata provider.
//!
//! Builds a schema snapshot from a SQL schema script instead of a live
//! catalog: CREATE TABLE bodies supply tables and columns, inline and
//! ALTER TABLE constraints supply foreign keys, and CREATE VIEW /
//! PROCEDURE / FUNCTION batches supply the definition text used for
//! reference detection. Scanning is regex-driven and tolerant: statements
//! it does not understand are ignored.

use super::{
    Column, ForeignKey, MetadataProvider, Routine, RoutineKind, Table, View,
};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Schema assumed for unqualified object names.
const DEFAULT_SCHEMA: &str = "dbo";

/// Regex to extract schema and table name from CREATE TABLE
/// Supports: `table` (MySQL), "table" (PostgreSQL), [table] (MSSQL), unquoted, schema.table
static CREATE_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:[\[`"]?([^\s\[\]`".(]+)[\]`"]?\s*\.\s*)?[\[`"]?([^\s\[\]`".(]+)[\]`"]?"#,
    )
    .unwrap()
});

/// Regex to extract schema and table name from ALTER TABLE
static ALTER_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)ALTER\s+TABLE\s+(?:ONLY\s+)?(?:[\[`"]?([^\s\[\]`".(]+)[\]`"]?\s*\.\s*)?[\[`"]?([^\s\[\]`".(]+)[\]`"]?"#,
    )
    .unwrap()
});

/// Regex for FOREIGN KEY constraints with optional constraint name and
/// optional schema on the referenced table
static FOREIGN_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:CONSTRAINT\s+[\[`"]?([^\s\[\]`"]+)[\]`"]?\s+)?FOREIGN\s+KEY\s*\(([^)]+)\)\s*REFERENCES\s+(?:[\[`"]?([^\s\[\]`".(]+)[\]`"]?\s*\.\s*)?[\[`"]?([^\s\[\]`".(]+)[\]`"]?\s*\(([^)]+)\)"#,
    )
    .unwrap()
});

/// Regex for CREATE VIEW with optional schema
static CREATE_VIEW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)CREATE\s+(?:OR\s+(?:REPLACE|ALTER)\s+)?VIEW\s+(?:[\[`"]?([^\s\[\]`".(]+)[\]`"]?\s*\.\s*)?[\[`"]?([^\s\[\]`".(]+)[\]`"]?"#,
    )
    .unwrap()
});

/// Regex for CREATE PROCEDURE / FUNCTION with optional schema
static CREATE_ROUTINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)CREATE\s+(?:OR\s+(?:REPLACE|ALTER)\s+)?(PROCEDURE|PROC|FUNCTION)\s+(?:[\[`"]?([^\s\[\]`".(]+)[\]`"]?\s*\.\s*)?[\[`"]?([^\s\[\]`".(]+)[\]`"]?"#,
    )
    .unwrap()
});

/// Regex for a column definition: name, base type, optional type arguments
static COLUMN_DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*[\[`"]?([^\s\[\]`",]+)[\]`"]?\s+([A-Za-z_]\w*)\s*(?:\(([^)]+)\))?"#).unwrap()
});

/// Regex to detect NOT NULL constraint
static NOT_NULL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bNOT\s+NULL\b").unwrap());

/// Regex for a DEFAULT expression within a column definition
static DEFAULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bDEFAULT\s+(.+?)(?:\s+NOT\s+NULL\b|\s+NULL\b|\s*$)").unwrap()
});

/// Batch separator (`GO` on its own line)
static GO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*GO\s*;?\s*$").unwrap());

/// A foreign key as written in the script, before table resolution.
#[derive(Debug)]
struct FkSpec {
    name: Option<String>,
    child_schema: String,
    child_table: String,
    child_column: String,
    parent_schema: Option<String>,
    parent_table: String,
    parent_column: String,
}

/// Metadata provider that scans a SQL schema script.
#[derive(Debug, Default)]
pub struct ScriptProvider {
    name: String,
    tables: Vec<Table>,
    foreign_keys: Vec<ForeignKey>,
    views: Vec<View>,
    routines: Vec<Routine>,
}

impl ScriptProvider {
    /// Parse a schema script from a file. The database name defaults to the
    /// file stem.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let script = fs::read_to_string(path)
            .with_context(|| format!("failed to read schema script {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database".to_string());
        Self::parse(&name, &script)
    }

    /// Parse a schema script.
    pub fn parse(name: &str, script: &str) -> anyhow::Result<Self> {
        let mut tables: Vec<Table> = Vec::new();
        let mut views: Vec<View> = Vec::new();
        let mut routines: Vec<Routine> = Vec::new();
        let mut fk_specs: Vec<FkSpec> = Vec::new();

        for stmt in split_statements(script) {
            if let Some(caps) = CREATE_ROUTINE_RE.captures(&stmt) {
                let kind = match caps.get(1).map_or("", |m| m.as_str()).to_uppercase().as_str() {
                    "FUNCTION" => RoutineKind::Function,
                    _ => RoutineKind::Procedure,
                };
                let schema = capture_or_default(&caps, 2);
                let routine_name = caps.get(3).map_or("", |m| m.as_str());
                routines.push(Routine::new(schema, routine_name, stmt.as_str(), kind)?);
            } else if let Some(caps) = CREATE_VIEW_RE.captures(&stmt) {
                let schema = capture_or_default(&caps, 1);
                let view_name = caps.get(2).map_or("", |m| m.as_str());
                views.push(View::new(schema, view_name, stmt.as_str())?);
            } else if let Some(caps) = CREATE_TABLE_RE.captures(&stmt) {
                let schema = capture_or_default(&caps, 1);
                let table_name = caps.get(2).map_or("", |m| m.as_str()).to_string();
                let (table, mut fks) = parse_create_table(&stmt, &schema, &table_name)?;
                tables.push(table);
                fk_specs.append(&mut fks);
            } else if let Some(caps) = ALTER_TABLE_RE.captures(&stmt) {
                let schema = capture_or_default(&caps, 1);
                let table_name = caps.get(2).map_or("", |m| m.as_str());
                fk_specs.extend(parse_foreign_keys(&stmt, &schema, table_name));
            }
        }

        let foreign_keys = resolve_foreign_keys(&tables, fk_specs)?;

        Ok(Self {
            name: name.to_string(),
            tables,
            foreign_keys,
            views,
            routines,
        })
    }

    /// Override the database name used in reports.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl MetadataProvider for ScriptProvider {
    fn database_name(&self) -> String {
        self.name.clone()
    }

    fn list_tables(&self) -> anyhow::Result<Vec<Table>> {
        Ok(self.tables.clone())
    }

    fn list_foreign_keys(&self) -> anyhow::Result<Vec<ForeignKey>> {
        Ok(self.foreign_keys.clone())
    }

    fn list_views(&self) -> anyhow::Result<Vec<View>> {
        Ok(self.views.clone())
    }

    fn list_routines(&self) -> anyhow::Result<Vec<Routine>> {
        Ok(self.routines.clone())
    }
}

fn capture_or_default(caps: &regex::Captures<'_>, group: usize) -> String {
    caps.get(group)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_SCHEMA.to_string())
}

/// Split a script into statements: `GO` batches first, then top-level
/// semicolons. A batch containing a view or routine definition keeps the
/// definition text whole from the CREATE keyword to the end of the batch.
fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();

    for batch in split_batches(script) {
        let def_start = [
            CREATE_VIEW_RE.find(&batch),
            CREATE_ROUTINE_RE.find(&batch),
        ]
        .iter()
        .flatten()
        .map(|m| m.start())
        .min();

        match def_start {
            Some(pos) => {
                statements.extend(split_on_semicolons(&batch[..pos]));
                let definition = batch[pos..].trim();
                if !definition.is_empty() {
                    statements.push(definition.to_string());
                }
            }
            None => statements.extend(split_on_semicolons(&batch)),
        }
    }

    statements
}

/// Split on `GO` separator lines.
fn split_batches(script: &str) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();

    for line in script.lines() {
        if GO_RE.is_match(line) {
            if !current.trim().is_empty() {
                batches.push(current.clone());
            }
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        batches.push(current);
    }

    batches
}

/// Split on semicolons at parenthesis depth zero, outside string literals.
fn split_on_semicolons(sql: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut in_string = false;

    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                current.push(ch);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_string => {
                depth -= 1;
                current.push(ch);
            }
            ';' if !in_string && depth == 0 => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }

    parts
}

/// Parse a CREATE TABLE statement into a table plus any inline FK specs.
fn parse_create_table(
    stmt: &str,
    schema: &str,
    name: &str,
) -> anyhow::Result<(Table, Vec<FkSpec>)> {
    let mut columns = Vec::new();
    let mut fk_specs = Vec::new();

    if let Some(body) = extract_table_body(stmt) {
        for part in split_body_parts(&body) {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }

            if is_constraint_part(trimmed) {
                fk_specs.extend(parse_foreign_keys(trimmed, schema, name));
            } else if let Some(column) = parse_column_def(trimmed, columns.len() as u32 + 1) {
                columns.push(column);
            }
        }
    }

    let table = Table::new(schema, name, columns)?;
    Ok((table, fk_specs))
}

/// Whether a CREATE TABLE body part is a table-level constraint rather than
/// a column definition.
fn is_constraint_part(part: &str) -> bool {
    let upper = part.to_uppercase();
    upper.starts_with("PRIMARY KEY")
        || upper.starts_with("CONSTRAINT")
        || upper.starts_with("FOREIGN KEY")
        || upper.starts_with("UNIQUE")
        || upper.starts_with("CHECK")
        || upper.starts_with("KEY ")
        || upper.starts_with("INDEX ")
}

/// Extract the body of a CREATE TABLE statement (between the first `(` and
/// its matching `)`), respecting string literals.
fn extract_table_body(stmt: &str) -> Option<String> {
    let mut depth = 0;
    let mut start = None;
    let mut in_string = false;

    for (i, ch) in stmt.char_indices() {
        match ch {
            '\'' => in_string = !in_string,
            '(' if !in_string => {
                if depth == 0 {
                    start = Some(i + 1);
                }
                depth += 1;
            }
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(stmt[s..i].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    None
}

/// Split a CREATE TABLE body by commas, respecting nested parentheses and
/// string literals.
fn split_body_parts(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut in_string = false;

    for ch in body.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                current.push(ch);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_string => {
                depth -= 1;
                current.push(ch);
            }
            ',' if !in_string && depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }

    parts
}

/// Parse one column definition.
fn parse_column_def(def: &str, ordinal: u32) -> Option<Column> {
    let caps = COLUMN_DEF_RE.captures(def)?;
    let name = caps.get(1)?.as_str();
    let base_type = caps.get(2)?.as_str();
    let type_args = caps.get(3).map(|m| m.as_str());

    let (precision, max_length) = match type_args {
        Some(args) => {
            let first = args.split(',').next().unwrap_or("").trim();
            match first.parse::<u32>() {
                Ok(n) if is_numeric_type(base_type) => (Some(n), None),
                Ok(n) => (None, Some(n)),
                // e.g. varchar(max)
                Err(_) => (None, None),
            }
        }
        None => (None, None),
    };

    let default = DEFAULT_RE
        .captures(def)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());

    Column::new(name, ordinal, base_type)
        .ok()
        .map(|c| {
            c.with_precision(precision)
                .with_max_length(max_length)
                .with_nullable(!NOT_NULL_RE.is_match(def))
                .with_default(default)
        })
}

fn is_numeric_type(data_type: &str) -> bool {
    matches!(
        data_type.to_ascii_lowercase().as_str(),
        "decimal"
            | "numeric"
            | "float"
            | "real"
            | "double"
            | "money"
            | "smallmoney"
            | "int"
            | "integer"
            | "bigint"
            | "smallint"
            | "tinyint"
    )
}

/// Parse FOREIGN KEY constraints from a statement, attributed to the given
/// child table. Composite keys are reduced to their first column pair.
fn parse_foreign_keys(stmt: &str, child_schema: &str, child_table: &str) -> Vec<FkSpec> {
    let mut specs = Vec::new();

    for caps in FOREIGN_KEY_RE.captures_iter(stmt) {
        let name = caps.get(1).map(|m| m.as_str().to_string());
        let child_columns = caps
            .get(2)
            .map(|m| parse_column_list(m.as_str()))
            .unwrap_or_default();
        let parent_schema = caps.get(3).map(|m| m.as_str().to_string());
        let parent_table = caps.get(4).map_or("", |m| m.as_str()).to_string();
        let parent_columns = caps
            .get(5)
            .map(|m| parse_column_list(m.as_str()))
            .unwrap_or_default();

        if let (Some(child_column), Some(parent_column)) =
            (child_columns.first(), parent_columns.first())
        {
            specs.push(FkSpec {
                name,
                child_schema: child_schema.to_string(),
                child_table: child_table.to_string(),
                child_column: child_column.clone(),
                parent_schema,
                parent_table,
                parent_column: parent_column.clone(),
            });
        }
    }

    specs
}

/// Parse a comma-separated column list, stripping quoting.
fn parse_column_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|c| {
            c.trim()
                .trim_matches('`')
                .trim_matches('"')
                .trim_matches('[')
                .trim_matches(']')
                .to_string()
        })
        .filter(|c| !c.is_empty())
        .collect()
}

/// Resolve FK specs against the parsed table set. Specs whose parent or
/// child table is absent are dropped; dependent queries then simply find no
/// matches, matching the snapshot's referential-consistency contract.
fn resolve_foreign_keys(tables: &[Table], specs: Vec<FkSpec>) -> anyhow::Result<Vec<ForeignKey>> {
    let mut foreign_keys = Vec::new();

    for spec in specs {
        let parent_schema = spec
            .parent_schema
            .clone()
            .unwrap_or_else(|| spec.child_schema.clone());

        let child = find_table(tables, &spec.child_schema, &spec.child_table);
        let parent = find_table(tables, &parent_schema, &spec.parent_table);

        if let (Some(child), Some(parent)) = (child, parent) {
            let name = spec
                .name
                .unwrap_or_else(|| format!("fk_{}_{}", spec.child_table, spec.child_column));
            foreign_keys.push(ForeignKey::new(
                name,
                child.schema(),
                parent.clone(),
                spec.parent_column,
                child.clone(),
                spec.child_column,
            )?);
        }
    }

    Ok(foreign_keys)
}

/// Case-insensitive table lookup.
fn find_table<'a>(tables: &'a [Table], schema: &str, name: &str) -> Option<&'a Table> {
    tables.iter().find(|t| {
        t.schema().eq_ignore_ascii_case(schema) && t.name().eq_ignore_ascii_case(name)
    })
}
