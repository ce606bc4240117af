//! Integration tests for the report and order commands, driving the binary.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn get_binary_path() -> String {
    std::env::var("CARGO_BIN_EXE_sql-explorer")
        .unwrap_or_else(|_| "target/debug/sql-explorer".to_string())
}

fn create_shop_script(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("shop.sql");
    fs::write(
        &path,
        r#"
CREATE TABLE dbo.Customers (
    Id int NOT NULL,
    Name varchar(100)
);

CREATE TABLE dbo.Orders (
    Id int NOT NULL,
    CustomerId int NOT NULL,
    CONSTRAINT fk_orders_customers FOREIGN KEY (CustomerId) REFERENCES dbo.Customers (Id)
);
GO
CREATE VIEW dbo.OpenOrders AS
SELECT * FROM dbo.Orders
GO
"#,
    )
    .unwrap();
    path
}

#[test]
fn test_report_writes_all_four_files() {
    let dir = TempDir::new().unwrap();
    let script = create_shop_script(&dir);
    let out_dir = dir.path().join("reports");

    let status = Command::new(get_binary_path())
        .args([
            "report",
            script.to_str().unwrap(),
            "-o",
            out_dir.to_str().unwrap(),
        ])
        .status()
        .unwrap();
    assert!(status.success());

    let tables = fs::read_to_string(out_dir.join("shop_Tables.csv")).unwrap();
    assert!(tables.starts_with(
        "Schema,Table,Position,Column,Data Type,Precision,Max Length,Is Nullable,Default"
    ));
    assert!(tables.contains("dbo,Customers,1,Id,int"));
    assert!(tables.contains("dbo,Orders,2,CustomerId,int"));

    let views = fs::read_to_string(out_dir.join("shop_Views.csv")).unwrap();
    assert!(views.contains("dbo,OpenOrders,"));

    let routines = fs::read_to_string(out_dir.join("shop_Routines.csv")).unwrap();
    assert_eq!(routines.lines().count(), 1); // header only

    let dependency = fs::read_to_string(out_dir.join("shop_Dependency.txt")).unwrap();
    let customers_pos = dependency.find("dbo.Customers").unwrap();
    let orders_pos = dependency.find("dbo.Orders\n").unwrap();
    assert!(customers_pos < orders_pos);
    assert!(dependency.contains("\tTable Dependencies\n\t\tdbo.Orders"));
    assert!(dependency.contains("\tView Dependencies\n\t\tdbo.OpenOrders"));
}

#[test]
fn test_report_refuses_to_overwrite_without_flag() {
    let dir = TempDir::new().unwrap();
    let script = create_shop_script(&dir);
    let out_dir = dir.path().join("reports");

    let run = |extra: &[&str]| {
        let mut args = vec![
            "report",
            script.to_str().unwrap(),
            "-o",
            out_dir.to_str().unwrap(),
        ];
        args.extend_from_slice(extra);
        Command::new(get_binary_path()).args(&args).status().unwrap()
    };

    assert!(run(&[]).success());
    // Second run hits the existing files.
    assert!(!run(&[]).success());
    assert!(run(&["--overwrite"]).success());
}

#[test]
fn test_report_honors_database_name_override() {
    let dir = TempDir::new().unwrap();
    let script = create_shop_script(&dir);
    let out_dir = dir.path().join("reports");

    let status = Command::new(get_binary_path())
        .args([
            "report",
            script.to_str().unwrap(),
            "-o",
            out_dir.to_str().unwrap(),
            "--database",
            "My Shop",
        ])
        .status()
        .unwrap();
    assert!(status.success());
    assert!(out_dir.join("My_Shop_Tables.csv").exists());
}

#[test]
fn test_order_json_output() {
    let dir = TempDir::new().unwrap();
    let script = create_shop_script(&dir);

    let output = Command::new(get_binary_path())
        .args(["order", script.to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["database"], "shop");
    assert_eq!(parsed["tables"][0], "dbo.Customers");
    assert_eq!(parsed["tables"][1], "dbo.Orders");
    assert_eq!(parsed["cyclic"].as_array().unwrap().len(), 0);
}

#[test]
fn test_order_check_fails_on_cycle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cyclic.sql");
    fs::write(
        &path,
        "CREATE TABLE a (id int, b_id int, CONSTRAINT fk_a_b FOREIGN KEY (b_id) REFERENCES b (id));
CREATE TABLE b (id int, a_id int, CONSTRAINT fk_b_a FOREIGN KEY (a_id) REFERENCES a (id));",
    )
    .unwrap();

    let status = Command::new(get_binary_path())
        .args(["order", path.to_str().unwrap(), "--check"])
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn test_order_check_passes_without_cycle() {
    let dir = TempDir::new().unwrap();
    let script = create_shop_script(&dir);

    let status = Command::new(get_binary_path())
        .args(["order", script.to_str().unwrap(), "--check"])
        .status()
        .unwrap();
    assert!(status.success());
}
