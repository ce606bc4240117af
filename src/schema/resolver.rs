//! Heuristic reference detector for view and routine definitions.
//!
//! Decides whether a definition's source text mentions a given table. This is
//! a pattern-match guess over SQL text, not semantic analysis: it can
//! over-match (a table name inside a string literal or comment) and
//! under-match (dynamically assembled SQL). Kept behind a single function so
//! it can be swapped for a real SQL-aware parser without touching the
//! dependency graph.

use super::{SchemaError, Table};
use regex::Regex;

/// Check whether `definition` textually references `table`.
///
/// The pattern is an optional qualifier (a run of non-whitespace, optionally
/// bracket-quoted) followed by an optional "." and the table name (optionally
/// bracket-quoted), matched case-insensitively across lines. A qualified
/// match counts only when the stripped qualifier equals the table's schema;
/// a bare-name match always counts, so that references through the default
/// schema are not missed.
pub fn references_table(definition: &str, table: &Table) -> Result<bool, SchemaError> {
    let pattern = format!(
        r"(?im)(?:([^\s.]+)\s*\.\s*)?\[?{}\]?",
        regex::escape(table.name())
    );
    let re = Regex::new(&pattern).map_err(|source| SchemaError::Pattern {
        table: table.full_name(),
        source,
    })?;

    for caps in re.captures_iter(definition) {
        match caps.get(1) {
            Some(qualifier) => {
                let qualifier = qualifier.as_str().trim().trim_matches('[').trim_matches(']');
                if qualifier.eq_ignore_ascii_case(table.schema()) {
                    return Ok(true);
                }
            }
            // Bare name, no qualifier to check against.
            None => return Ok(true),
        }
    }

    Ok(false)
}
