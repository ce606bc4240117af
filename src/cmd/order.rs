//! Order command - print tables in dependency order.

use crate::schema::{Database, DependencyGraph, ScriptProvider};
use anyhow::bail;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct OrderOutput {
    database: String,
    tables: Vec<String>,
    cyclic: Vec<String>,
}

/// Run the order command
pub fn run(script: PathBuf, check: bool, json: bool, reverse: bool) -> anyhow::Result<()> {
    if !script.exists() {
        bail!("input file does not exist: {}", script.display());
    }

    let provider = ScriptProvider::from_path(&script)?;
    let db = Database::from_provider(&provider)?;

    if db.tables().is_empty() {
        eprintln!("No tables found in the script.");
        return Ok(());
    }

    let graph = DependencyGraph::new(&db);
    let result = graph.dependency_order();

    let mut tables: Vec<String> = result.tables.iter().map(|t| t.full_name()).collect();
    let cyclic: Vec<String> = result.cyclic.iter().map(|t| t.full_name()).collect();

    if reverse {
        tables.reverse();
    }

    if !cyclic.is_empty() {
        eprintln!("\nWarning: circular foreign key dependencies detected!");
        eprintln!("The following tables could not be strictly ordered:");
        for name in &cyclic {
            eprintln!("  - {name}");
        }
        eprintln!();

        if check {
            eprintln!("Check FAILED: cannot determine a strict ordering due to cycles.");
            std::process::exit(1);
        }
    }

    if check {
        eprintln!("Check PASSED: tables can be ordered topologically.");
    }

    if json {
        let output = OrderOutput {
            database: db.name().to_string(),
            tables,
            cyclic,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Dependency order ({} tables):", tables.len());
    for (i, name) in tables.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }

    Ok(())
}
