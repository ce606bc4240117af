//! Report command - generate all schema reports for a database snapshot.

use crate::report::{generate_all, ReportOptions};
use crate::schema::{Database, DependencyGraph, ScriptProvider};
use anyhow::bail;
use std::path::PathBuf;

/// Run the report command
pub fn run(
    script: PathBuf,
    output: PathBuf,
    database: Option<String>,
    overwrite: bool,
) -> anyhow::Result<()> {
    if !script.exists() {
        bail!("input file does not exist: {}", script.display());
    }

    println!("Reading schema script: {}", script.display());

    let mut provider = ScriptProvider::from_path(&script)?;
    if let Some(name) = database {
        provider = provider.with_database_name(name);
    }

    let db = Database::from_provider(&provider)?;
    println!(
        "Found {} tables, {} foreign keys, {} views, {} routines.",
        db.tables().len(),
        db.foreign_keys().len(),
        db.views().len(),
        db.routines().len(),
    );

    let graph = DependencyGraph::new(&db);
    let cyclic = graph.dependency_order().cyclic;
    if !cyclic.is_empty() {
        eprintln!("\nWarning: circular foreign key dependencies detected:");
        for table in &cyclic {
            eprintln!("  - {}", table.full_name());
        }
        eprintln!("Affected tables fall back to snapshot order in the dependency report.\n");
    }

    let options = ReportOptions {
        output_dir: output,
        overwrite,
    };
    let written = generate_all(&db, &graph, &options)?;

    for path in &written {
        println!("✓ {}", path.display());
    }
    println!(
        "\nGenerated {} reports for database '{}'.",
        written.len(),
        db.name()
    );

    Ok(())
}
