use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn archrag(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("archrag").expect("binary");
    cmd.current_dir(workdir)
        .env("EMBEDDING_PROVIDER", "stub")
        .env("EMBEDDING_DIMENSION", "32")
        .env_remove("DOCS_PATH")
        .env_remove("INDEX_PATH")
        .env_remove("RERANKING_KEYWORDS")
        .env_remove("PRIORITY_ADRS")
        .arg("--quiet");
    cmd
}

fn run_json(workdir: &Path, args: &[&str]) -> Value {
    let output = archrag(workdir).args(args).output().expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn setup_docs() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(docs.join("adr")).unwrap();
    fs::write(
        docs.join("adr/001-postgres.md"),
        "# ADR 001\n\nAll services use PostgreSQL for transactional data.",
    )
    .unwrap();
    fs::write(
        docs.join("security.md"),
        "# Security standard\n\nPII must be encrypted at rest on AWS.",
    )
    .unwrap();
    fs::write(docs.join("notes.txt"), "not markdown, not indexed").unwrap();
    temp
}

#[test]
fn ingest_then_search_then_stats() {
    let temp = setup_docs();
    let root = temp.path();

    let stats = run_json(root, &["ingest", "--json"]);
    assert_eq!(stats["documents"], 2);
    assert_eq!(stats["chunks"], 2);
    assert!(root.join("faiss_index/vectors.bin").is_file());
    assert!(root.join("faiss_index/docstore.json").is_file());

    let query = "# Security standard\n\nPII must be encrypted at rest on AWS.";
    let sources = run_json(root, &["search", query, "--json"]);
    let sources = sources.as_array().expect("array of sources");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["filename"], "security.md");
    assert_eq!(sources[0]["confidence"], "High");

    let summary = run_json(root, &["stats", "--json"]);
    assert_eq!(summary["generation"], "current");
    assert_eq!(summary["vectors"], 2);
    assert_eq!(summary["dimension"], 32);
    assert_eq!(summary["sources"].as_object().unwrap().len(), 2);
}

#[test]
fn search_context_prints_joined_chunks() {
    let temp = setup_docs();
    let root = temp.path();
    run_json(root, &["ingest", "--json"]);

    archrag(root)
        .args(["search", "database", "--context", "-k", "2"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("All services use PostgreSQL")
                .and(predicate::str::contains("PII must be encrypted")),
        );
}

#[test]
fn ingest_without_docs_folder_explains_the_fix() {
    let temp = tempdir().unwrap();

    archrag(temp.path())
        .arg("ingest")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Documents folder not found"));
    assert!(!temp.path().join("faiss_index").exists());
}

#[test]
fn search_before_ingest_asks_for_ingestion() {
    let temp = tempdir().unwrap();

    archrag(temp.path())
        .args(["search", "what is our database?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("run ingestion first"));
}

#[test]
fn sync_merges_pages_into_existing_index() {
    let temp = setup_docs();
    let root = temp.path();
    run_json(root, &["ingest", "--json"]);

    fs::write(
        root.join("pages.json"),
        r#"[
            {"id": "1", "title": "ADR-010 Event sourcing", "content": "Billing is event sourced.", "version": 3, "space_key": "ARCH", "labels": ["adr"]},
            {"id": "2", "title": "Team lunch", "content": "Pizza on Friday.", "space_key": "SOCIAL"}
        ]"#,
    )
    .unwrap();

    let outcome = run_json(
        root,
        &["sync", "--pages", "pages.json", "--space", "ARCH", "--json"],
    );
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["page_count"], 1);

    let summary = run_json(root, &["stats", "--json"]);
    assert_eq!(summary["vectors"], 3);
    assert_eq!(summary["sources"]["confluence:ADR-010 Event sourcing"], 1);
}

#[test]
fn sync_with_no_matching_pages_fails() {
    let temp = setup_docs();
    let root = temp.path();
    fs::write(root.join("pages.json"), "[]").unwrap();

    archrag(root)
        .args(["sync", "--pages", "pages.json", "--space", "ARCH"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("No pages found matching the criteria"));
}

#[test]
fn unknown_provider_is_rejected() {
    let temp = setup_docs();

    archrag(temp.path())
        .env("EMBEDDING_PROVIDER", "carrier-pigeon")
        .arg("ingest")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Embedding provider is not configured"));
}

#[test]
fn audit_lists_priority_adr_first() {
    let temp = setup_docs();
    let root = temp.path();
    run_json(root, &["ingest", "--json"]);
    fs::write(
        root.join("design.md"),
        "# Security standard\n\nPII must be encrypted at rest on AWS.",
    )
    .unwrap();

    let sources = archrag(root)
        .env("PRIORITY_ADRS", "ADR 001")
        .args(["audit", "design.md", "--json"])
        .output()
        .expect("command run");
    assert!(sources.status.success());
    let sources: Value = serde_json::from_slice(&sources.stdout).expect("valid json");
    let sources = sources.as_array().expect("array of sources");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["filename"], "001-postgres.md");
    assert_eq!(sources[1]["filename"], "security.md");
}

#[test]
fn audit_of_missing_design_fails() {
    let temp = setup_docs();

    archrag(temp.path())
        .args(["audit", "nope.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read design"));
}
