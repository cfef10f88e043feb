//! Process-level integration tests for the `pythinfer` CLI shell: drives
//! the built binary the way a user would from a shell, checking exit codes
//! and exported artifacts rather than library internals.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn pythinfer_bin() -> PathBuf {
    let mut p = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("target")
        .join("debug")
        .join(if cfg!(windows) {
            "pythinfer.exe"
        } else {
            "pythinfer"
        });
    if !p.exists() {
        p = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("target")
            .join("release")
            .join(if cfg!(windows) {
                "pythinfer.exe"
            } else {
                "pythinfer"
            });
    }
    assert!(p.exists(), "pythinfer binary not found at {:?}", p);
    p
}

fn tmp_dir(name: &str) -> PathBuf {
    let mut base = std::env::temp_dir();
    base.push(format!("pythinfer-cli-{}-{}", name, std::process::id()));
    if base.exists() {
        let _ = fs::remove_dir_all(&base);
    }
    fs::create_dir_all(&base).unwrap();
    base
}

fn write_ttl(path: &std::path::Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// `create` with no RDF files under the root exits 2 ("nothing found").
#[test]
fn create_exits_nothing_found_when_no_rdf_files() {
    let exe = pythinfer_bin();
    let root = tmp_dir("create_empty");
    let out = Command::new(&exe)
        .current_dir(&root)
        .arg("create")
        .output()
        .expect("run create");
    assert_eq!(out.status.code(), Some(2));
    assert!(!root.join("pythinfer.yaml").exists());
}

/// `create` discovers RDF files and writes a project config categorizing
/// them all as `local`.
#[test]
fn create_discovers_files_and_writes_config() {
    let exe = pythinfer_bin();
    let root = tmp_dir("create_found");
    write_ttl(
        &root.join("data.ttl"),
        "@prefix ex: <http://example.org/> . ex:a ex:p ex:b .",
    );

    let out = Command::new(&exe)
        .current_dir(&root)
        .arg("create")
        .output()
        .expect("run create");
    assert!(
        out.status.success(),
        "create failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let config_path = root.join("pythinfer.yaml");
    assert!(config_path.exists());
    let config = fs::read_to_string(config_path).unwrap();
    assert!(config.contains("data.ttl"));
}

/// `merge` with no project config auto-creates one, then runs the Merger
/// and exports the `merged` artifact.
#[test]
fn merge_auto_creates_config_and_exports_merged() {
    let exe = pythinfer_bin();
    let root = tmp_dir("merge_auto");
    write_ttl(
        &root.join("data.ttl"),
        "@prefix ex: <http://example.org/> . ex:a ex:p ex:b .",
    );

    let out = Command::new(&exe)
        .current_dir(&root)
        .arg("merge")
        .output()
        .expect("run merge");
    assert!(
        out.status.success(),
        "merge failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(root.join("pythinfer.yaml").exists());
    assert!(root.join("derived").join("merged.trig").exists());
}

/// `--no-create` turns a missing config into a hard error instead of an
/// automatic `create`.
#[test]
fn no_create_flag_errors_without_config() {
    let exe = pythinfer_bin();
    let root = tmp_dir("no_create");
    write_ttl(
        &root.join("data.ttl"),
        "@prefix ex: <http://example.org/> . ex:a ex:p ex:b .",
    );

    let out = Command::new(&exe)
        .current_dir(&root)
        .arg("--no-create")
        .arg("merge")
        .output()
        .expect("run merge --no-create");
    assert!(!out.status.success());
    assert!(!root.join("pythinfer.yaml").exists());
}

/// `infer` runs the full pipeline end to end and exports all four logical
/// artifacts with the mandatory TriG format.
#[test]
fn infer_exports_all_four_artifacts() {
    let exe = pythinfer_bin();
    let root = tmp_dir("infer_full");
    write_ttl(
        &root.join("local").join("data.ttl"),
        r#"
        @prefix foaf: <http://xmlns.com/foaf/0.1/> .
        @prefix owl: <http://www.w3.org/2002/07/owl#> .
        @prefix : <http://example.org/> .
        foaf:knows a owl:SymmetricProperty .
        :Alice a foaf:Person .
        :Bob a foaf:Person ; foaf:knows :Alice .
        "#,
    );
    fs::write(
        root.join("pythinfer.yaml"),
        "data:\n  local:\n    - local/data.ttl\n",
    )
    .unwrap();

    let out = Command::new(&exe)
        .current_dir(&root)
        .arg("infer")
        .output()
        .expect("run infer");
    assert!(
        out.status.success(),
        "infer failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let derived = root.join("derived");
    for stem in ["merged", "combined_full", "combined_internal", "combined_wanted"] {
        assert!(
            derived.join(format!("{stem}.trig")).exists(),
            "missing {stem}.trig"
        );
    }

    let wanted = fs::read_to_string(derived.join("combined_wanted.trig")).unwrap();
    assert!(wanted.contains("Alice"));
    assert!(wanted.contains("knows"));
}

/// `query` runs inference then executes a SPARQL SELECT against
/// `combined_wanted`.
#[test]
fn query_runs_select_against_combined_wanted() {
    let exe = pythinfer_bin();
    let root = tmp_dir("query_select");
    write_ttl(
        &root.join("local").join("data.ttl"),
        "@prefix : <http://example.org/> . :Alice :age 30 .",
    );
    fs::write(
        root.join("pythinfer.yaml"),
        "data:\n  local:\n    - local/data.ttl\n",
    )
    .unwrap();

    let out = Command::new(&exe)
        .current_dir(&root)
        .arg("query")
        .arg("SELECT ?s WHERE { ?s <http://example.org/age> ?a }")
        .output()
        .expect("run query");
    assert!(
        out.status.success(),
        "query failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("http://example.org/Alice"));
}
