// Integration tests for the `gridbook` binary against a throwaway store.
// Run with: cargo test -p gridbook-cli --test cli_tests -- --nocapture

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::{tempdir, TempDir};

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self { dir: tempdir().unwrap() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_gridbook"))
            .arg("--store")
            .arg(self.path("docs.sqlite3"))
            .arg("--config")
            .arg(self.path("settings.json"))
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .expect("run gridbook")
    }

    fn ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "gridbook {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn write(&self, name: &str, contents: &str) -> String {
        let path = self.path(name);
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }
}

fn code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

// ---------------------------------------------------------------------------
// new / list / delete
// ---------------------------------------------------------------------------

#[test]
fn new_document_is_listed_then_deleted() {
    let env = Env::new();
    let key = env.ok(&["new", "Budget"]);
    assert!(key.trim().starts_with("spreadsheet_Budget_"));

    let listed: serde_json::Value = serde_json::from_str(&env.ok(&["list", "--json"])).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["filename"], "Budget");
    assert_eq!(listed[0]["key"], key.trim());

    env.ok(&["delete", "Budget"]);
    assert_eq!(env.ok(&["list"]), "");
}

#[test]
fn duplicate_new_is_a_usage_error() {
    let env = Env::new();
    env.ok(&["new", "Budget"]);
    assert_eq!(code(&env.run(&["new", "Budget"])), 2);
}

#[test]
fn unknown_document_exits_3() {
    let env = Env::new();
    let output = env.run(&["show", "Nope"]);
    assert_eq!(code(&output), 3);
    assert!(String::from_utf8_lossy(&output.stderr).contains("gridbook list"));
}

// ---------------------------------------------------------------------------
// apply / show
// ---------------------------------------------------------------------------

#[test]
fn apply_script_then_show() {
    let env = Env::new();
    env.ok(&["new", "Budget"]);
    let script = env.write(
        "script.json",
        r#"[
            {"command": "addSheet", "name": "Totals"},
            {"command": "updateSheetData", "sheet": "Totals", "data": [["Rent", 1200], ["Food", 300.5]]},
            {"command": "deleteSheet", "sheet": "sheet3"}
        ]"#,
    );
    let report = env.ok(&["apply", "Budget", &script]);
    assert!(report.contains("applied  addSheet"));
    assert!(report.contains("applied  deleteSheet"));

    assert_eq!(env.ok(&["show", "Budget"]), "Rent,1200\nFood,300.5\n");
    assert_eq!(
        env.ok(&["show", "Budget", "--range", "B1:B2"]).trim(),
        "B1:B2  Sum: 1500.50  Average: 750.25  Count: 2"
    );
    assert_eq!(code(&env.run(&["show", "Budget", "--sheet", "sheet3"])), 2);
}

#[test]
fn strict_apply_saves_nothing_on_rejection() {
    let env = Env::new();
    env.ok(&["new", "Budget"]);
    let script = env.write(
        "script.json",
        r#"[
            {"command": "addSheet", "name": "Extra"},
            {"command": "undo"}
        ]"#,
    );
    let output = env.run(&["apply", "Budget", &script, "--strict"]);
    assert_eq!(code(&output), 4);
    assert!(String::from_utf8_lossy(&output.stdout).contains("skipped  undo"));
    assert_eq!(code(&env.run(&["show", "Budget", "--sheet", "Extra"])), 2);
}

#[test]
fn malformed_script_is_a_usage_error() {
    let env = Env::new();
    env.ok(&["new", "Budget"]);
    let script = env.write("script.json", r#"[{"command": "explode"}]"#);
    assert_eq!(code(&env.run(&["apply", "Budget", &script])), 2);
}

// ---------------------------------------------------------------------------
// import / export / find
// ---------------------------------------------------------------------------

#[test]
fn csv_import_export_round_trip() {
    let env = Env::new();
    let csv = env.write("sales.csv", "Region;Total\nNorth;10\nSouth;20\n");
    let report = env.ok(&["import", &csv]);
    assert!(report.contains("into 'sales'"));

    let shown = env.ok(&["show", "sales", "--sheet", "sales"]);
    assert_eq!(shown, "Region,Total\nNorth,10\nSouth,20\n");

    let out = env.path("out.tsv");
    env.ok(&["export", "sales", "--to", "tsv", "--sheet", "sales", "-o", out.to_str().unwrap()]);
    assert_eq!(fs::read_to_string(&out).unwrap(), "Region\tTotal\nNorth\t10\nSouth\t20\n");

    let json: serde_json::Value =
        serde_json::from_str(&env.ok(&["export", "sales", "--to", "json", "--sheet", "sales"])).unwrap();
    assert_eq!(json[1], serde_json::json!(["North", 10.0]));

    let found = env.ok(&["find", "sales", "o", "--sheet", "sales"]);
    assert_eq!(found, "A1\tRegion\nB1\tTotal\nA2\tNorth\nA3\tSouth\n");
}

#[test]
fn shift_jis_import_with_header() {
    let env = Env::new();
    let path = env.path("meibo.csv");
    // "名前,点数\n佐藤,90\n" in Shift_JIS
    fs::write(&path, b"\x96\xbc\x91O,\x93_\x90\x94\n\x8d\xb2\x93\xa1,90\n").unwrap();
    let file = path.to_str().unwrap();

    env.ok(&["import", file, "--encoding", "Shift_JIS", "--header"]);
    assert_eq!(env.ok(&["show", "meibo", "--sheet", "meibo"]), "名前,点数\n佐藤,90\n");

    let output = env.run(&["import", file, "--encoding", "klingon"]);
    assert_eq!(code(&output), 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown encoding"));
}

#[test]
fn xlsx_export_needs_output_and_reimports() {
    let env = Env::new();
    env.ok(&["new", "Budget"]);
    assert_eq!(code(&env.run(&["export", "Budget", "--to", "xlsx"])), 2);

    let out = env.path("budget.xlsx");
    env.ok(&["export", "Budget", "--to", "xlsx", "-o", out.to_str().unwrap()]);
    assert!(out.exists());

    env.ok(&["import", out.to_str().unwrap(), "--into", "Budget"]);
    let listed: serde_json::Value = serde_json::from_str(&env.ok(&["list", "--json"])).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1, "import --into replaces the save");
    // Worksheets come back under suffixed names
    assert_eq!(code(&env.run(&["show", "Budget", "--sheet", "sheet1(1)"])), 0);
}

#[test]
fn unsupported_import_extension() {
    let env = Env::new();
    let file = env.write("notes.md", "# hi");
    assert_eq!(code(&env.run(&["import", &file])), 2);
}

#[test]
fn recover_without_autosave() {
    let env = Env::new();
    assert_eq!(env.ok(&["recover"]).trim(), "no autosaved working copy");
}
