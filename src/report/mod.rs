//! Report emitters.
//!
//! Serializes one database snapshot into four files:
//! - `<db>_Tables.csv` — every column of every table
//! - `<db>_Views.csv` / `<db>_Routines.csv` — definitions, truncated for display
//! - `<db>_Dependency.txt` — tables in dependency order with their dependents
//!
//! Existing files are never clobbered unless overwrite is requested.

use crate::schema::{Database, DependencyGraph};
use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Definitions are cut to this many characters in the CSV listings; the
/// snapshot keeps the full text.
const DEFINITION_PREVIEW_LEN: usize = 50;

/// Configuration for one report run.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Directory the report files are written into (created on demand).
    pub output_dir: PathBuf,
    /// Replace existing report files instead of failing.
    pub overwrite: bool,
}

/// Generate all four reports, returning the written paths.
pub fn generate_all(
    db: &Database,
    graph: &DependencyGraph<'_>,
    options: &ReportOptions,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            options.output_dir.display()
        )
    })?;

    let reports = [
        ("Tables.csv", tables_csv(db)),
        ("Views.csv", views_csv(db)),
        ("Routines.csv", routines_csv(db)),
        ("Dependency.txt", dependency_text(db, graph)),
    ];

    let mut written = Vec::with_capacity(reports.len());
    for (suffix, content) in reports {
        let path = report_path(options, db.name(), suffix);
        write_report(&path, &content, options.overwrite)?;
        written.push(path);
    }

    Ok(written)
}

/// The Tables CSV: one row per column, tables by full name, columns by
/// ordinal position.
pub fn tables_csv(db: &Database) -> String {
    let mut out = String::from(
        "Schema,Table,Position,Column,Data Type,Precision,Max Length,Is Nullable,Default\n",
    );

    let mut tables: Vec<_> = db.tables().iter().collect();
    tables.sort_by_key(|t| t.full_name());

    for table in tables {
        for column in table.columns() {
            let row = [
                table.schema().to_string(),
                table.name().to_string(),
                column.ordinal_position.to_string(),
                column.name.clone(),
                column.data_type.clone(),
                opt_to_string(column.numeric_precision),
                opt_to_string(column.max_length),
                column.is_nullable.to_string(),
                column.column_default.clone().unwrap_or_default(),
            ];
            push_csv_row(&mut out, &row);
        }
    }

    out
}

/// The Views CSV with truncated definitions.
pub fn views_csv(db: &Database) -> String {
    let mut out = String::from("Schema,View,Definition\n");

    let mut views: Vec<_> = db.views().iter().collect();
    views.sort_by_key(|v| v.full_name());

    for view in views {
        let row = [
            view.schema().to_string(),
            view.name().to_string(),
            definition_preview(view.definition()),
        ];
        push_csv_row(&mut out, &row);
    }

    out
}

/// The Routines CSV with truncated definitions.
pub fn routines_csv(db: &Database) -> String {
    let mut out = String::from("Schema,Routine,Definition\n");

    let mut routines: Vec<_> = db.routines().iter().collect();
    routines.sort_by_key(|r| r.full_name());

    for routine in routines {
        let row = [
            routine.schema().to_string(),
            routine.name().to_string(),
            definition_preview(routine.definition()),
        ];
        push_csv_row(&mut out, &row);
    }

    out
}

/// The dependency report: tables in dependency order, each with the tables,
/// views, and routines that depend on it. Sections with no entries are
/// omitted. A reference-pattern failure skips only the affected table's
/// view/routine sections, with a warning on stderr.
pub fn dependency_text(db: &Database, graph: &DependencyGraph<'_>) -> String {
    let mut out = String::new();

    for table in graph.dependency_order().tables {
        out.push_str(&table.full_name());
        out.push('\n');

        let child_fks = graph.child_foreign_keys(table);
        if !child_fks.is_empty() {
            out.push_str("\tTable Dependencies\n");
            for fk in child_fks {
                out.push_str(&format!("\t\t{}\n", fk.child_table().full_name()));
            }
        }

        match graph.views_referencing(table) {
            Ok(views) if !views.is_empty() => {
                out.push_str("\tView Dependencies\n");
                for view in views {
                    out.push_str(&format!("\t\t{}\n", view.full_name()));
                }
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!(
                    "Warning: skipping view dependencies for {}: {}",
                    table.full_name(),
                    e
                );
            }
        }

        match graph.routines_referencing(table) {
            Ok(routines) if !routines.is_empty() => {
                out.push_str("\tRoutine Dependencies\n");
                for routine in routines {
                    out.push_str(&format!("\t\t{}\n", routine.full_name()));
                }
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!(
                    "Warning: skipping routine dependencies for {}: {}",
                    table.full_name(),
                    e
                );
            }
        }
    }

    out
}

fn report_path(options: &ReportOptions, db_name: &str, suffix: &str) -> PathBuf {
    options
        .output_dir
        .join(format!("{}_{}", db_name.replace(' ', "_"), suffix))
}

fn write_report(path: &Path, content: &str, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!(
            "file '{}' already exists; use --overwrite to replace it",
            path.display()
        );
    }

    let mut writer = BufWriter::new(
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
    );
    writer.write_all(content.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// First 50 characters of a definition, line breaks collapsed to spaces.
fn definition_preview(definition: &str) -> String {
    definition
        .chars()
        .take(DEFINITION_PREVIEW_LEN)
        .collect::<String>()
        .replace("\r\n", " ")
        .replace('\n', " ")
}

fn opt_to_string(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Append a CSV row, quoting fields that contain commas, quotes, or line
/// breaks.
fn push_csv_row(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ForeignKey, Table, View};

    fn sample_db() -> Database {
        let customers = Table::new(
            "dbo",
            "Customers",
            vec![
                Column::new("Id", 1, "int").unwrap().with_nullable(false),
                Column::new("Name", 2, "varchar")
                    .unwrap()
                    .with_max_length(Some(100)),
            ],
        )
        .unwrap();
        let orders = Table::new(
            "dbo",
            "Orders",
            vec![
                Column::new("Id", 1, "int").unwrap().with_nullable(false),
                Column::new("CustomerId", 2, "int").unwrap().with_nullable(false),
            ],
        )
        .unwrap();
        let fk = ForeignKey::new(
            "fk_orders_customers",
            "dbo",
            customers.clone(),
            "Id",
            orders.clone(),
            "CustomerId",
        )
        .unwrap();
        let view = View::new(
            "dbo",
            "OpenOrders",
            "CREATE VIEW dbo.OpenOrders AS SELECT * FROM dbo.Orders",
        )
        .unwrap();

        Database::new(
            "shop db",
            vec![orders, customers],
            vec![fk],
            vec![view],
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_tables_csv_rows() {
        let db = sample_db();
        let csv = tables_csv(&db);
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Schema,Table,Position,Column,Data Type,Precision,Max Length,Is Nullable,Default"
        );
        // Customers sorts before Orders; columns follow ordinal order.
        assert_eq!(lines[1], "dbo,Customers,1,Id,int,,,false,");
        assert_eq!(lines[2], "dbo,Customers,2,Name,varchar,,100,true,");
        assert_eq!(lines[3], "dbo,Orders,1,Id,int,,,false,");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_views_csv_truncates_definition() {
        let long_def = format!("CREATE VIEW dbo.V AS SELECT '{}'", "x".repeat(100));
        let view = View::new("dbo", "V", long_def).unwrap();
        let db = Database::new("d", Vec::new(), Vec::new(), vec![view], Vec::new()).unwrap();

        let csv = views_csv(&db);
        let lines: Vec<_> = csv.lines().collect();
        let definition = lines[1].splitn(3, ',').nth(2).unwrap();
        assert_eq!(definition.chars().count(), 50);
    }

    #[test]
    fn test_dependency_text_sections() {
        let db = sample_db();
        let graph = DependencyGraph::new(&db);
        let text = dependency_text(&db, &graph);

        let customers_pos = text.find("dbo.Customers\n").unwrap();
        let orders_pos = text.find("dbo.Orders\n").unwrap();
        assert!(customers_pos < orders_pos);

        assert!(text.contains("dbo.Customers\n\tTable Dependencies\n\t\tdbo.Orders\n"));
        assert!(text.contains("\tView Dependencies\n\t\tdbo.OpenOrders\n"));
        assert!(!text.contains("Routine Dependencies"));
    }

    #[test]
    fn test_csv_quoting() {
        let mut out = String::new();
        push_csv_row(
            &mut out,
            &[
                "plain".to_string(),
                "with,comma".to_string(),
                "with\"quote".to_string(),
            ],
        );
        assert_eq!(out, "plain,\"with,comma\",\"with\"\"quote\"\n");
    }

    #[test]
    fn test_report_path_replaces_spaces() {
        let options = ReportOptions {
            output_dir: PathBuf::from("/tmp/reports"),
            overwrite: false,
        };
        let path = report_path(&options, "shop db", "Tables.csv");
        assert!(path.ends_with("shop_db_Tables.csv"));
    }
}
