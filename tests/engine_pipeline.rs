// tests/engine_pipeline.rs

//! End-to-end pipeline tests over real temp projects and the real local
//! backend: scan, filter, execute, merge, persist, report.

use std::path::PathBuf;

use domd::cli::CliArgs;
use domd::ledger::Ledger;
use tempfile::TempDir;

use domd_test_utils::ProjectBuilder;

fn args_for(root: &TempDir) -> CliArgs {
    CliArgs {
        path: root.path().to_path_buf(),
        ignore_file: PathBuf::from(".doignore"),
        container_config: PathBuf::from(".domd.yaml"),
        timeout: 30,
        jobs: 4,
        container_jobs: 2,
        container: false,
        dry_run: false,
        report_dir: None,
        log_level: None,
    }
}

fn ledger_at(root: &TempDir) -> Ledger {
    Ledger::load(&root.path().join(".domd").join("ledger.json")).unwrap()
}

#[tokio::test]
async fn failing_npm_script_lands_in_broken_with_its_exit_code() {
    let dir = TempDir::new().unwrap();
    ProjectBuilder::new(dir.path()).with_npm_scripts(&[("build", "exit 1")]);

    let summary = domd::run(args_for(&dir)).await.unwrap();
    assert_eq!(summary.broken, 1);
    assert_eq!(summary.working, 0);
    assert!(!summary.all_working());

    let ledger = ledger_at(&dir);
    let entry = ledger.broken.values().next().unwrap();
    assert_eq!(entry.command_text, "npm run build");
    assert_eq!(entry.return_code, 1);
}

#[tokio::test]
async fn doignore_glob_keeps_command_out_of_both_partitions() {
    let dir = TempDir::new().unwrap();
    ProjectBuilder::new(dir.path())
        .with_npm_scripts(&[("serve", "sleep 60"), ("ok", "true")])
        .with_doignore(&["*serve*"]);

    let summary = domd::run(args_for(&dir)).await.unwrap();
    assert_eq!(summary.working, 1);
    assert_eq!(summary.broken, 0);

    let ledger = ledger_at(&dir);
    assert!(
        !ledger
            .working
            .values()
            .chain(ledger.broken.values())
            .any(|e| e.command_text.contains("serve"))
    );
}

#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let dir = TempDir::new().unwrap();
    ProjectBuilder::new(dir.path()).with_makefile(&[("pass", "true"), ("fail", "false")]);

    domd::run(args_for(&dir)).await.unwrap();
    let ledger_path = dir.path().join(".domd").join("ledger.json");
    let first = std::fs::read_to_string(&ledger_path).unwrap();

    domd::run(args_for(&dir)).await.unwrap();
    let second = std::fs::read_to_string(&ledger_path).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn commands_no_longer_discovered_are_dropped_from_the_ledger() {
    let dir = TempDir::new().unwrap();
    ProjectBuilder::new(dir.path()).with_makefile(&[("gone", "false"), ("stays", "true")]);
    domd::run(args_for(&dir)).await.unwrap();
    assert_eq!(ledger_at(&dir).broken.len(), 1);

    // Rewrite the Makefile without the broken target.
    ProjectBuilder::new(dir.path()).with_makefile(&[("stays", "true")]);
    domd::run(args_for(&dir)).await.unwrap();

    let ledger = ledger_at(&dir);
    assert!(ledger.broken.is_empty());
    assert_eq!(ledger.working.len(), 1);
}

#[tokio::test]
async fn success_supersedes_previous_failure() {
    let dir = TempDir::new().unwrap();
    ProjectBuilder::new(dir.path()).with_makefile(&[("flappy", "false")]);
    domd::run(args_for(&dir)).await.unwrap();
    assert_eq!(ledger_at(&dir).broken.len(), 1);

    ProjectBuilder::new(dir.path()).with_makefile(&[("flappy", "true")]);
    let summary = domd::run(args_for(&dir)).await.unwrap();
    assert!(summary.all_working());

    let ledger = ledger_at(&dir);
    assert!(ledger.broken.is_empty());
    assert_eq!(ledger.working.len(), 1);
}

#[tokio::test]
async fn reports_are_written_next_to_the_project() {
    let dir = TempDir::new().unwrap();
    ProjectBuilder::new(dir.path()).with_npm_scripts(&[("bad", "exit 7"), ("good", "true")]);

    domd::run(args_for(&dir)).await.unwrap();

    let todo = std::fs::read_to_string(dir.path().join("TODO.md")).unwrap();
    let done = std::fs::read_to_string(dir.path().join("DONE.md")).unwrap();
    assert!(todo.contains("npm run bad"));
    assert!(todo.contains("exit code 7"));
    assert!(done.contains("npm run good"));
}

#[tokio::test]
async fn dry_run_executes_nothing_and_touches_no_ledger() {
    let dir = TempDir::new().unwrap();
    ProjectBuilder::new(dir.path())
        // Would create a marker file if it ever ran.
        .with_npm_scripts(&[("sideeffect", "touch ran.marker")]);

    let mut args = args_for(&dir);
    args.dry_run = true;
    let summary = domd::run(args).await.unwrap();

    assert_eq!(summary.detected, 1);
    assert!(!dir.path().join("ran.marker").exists());
    assert!(!dir.path().join(".domd").exists());
}

#[tokio::test]
async fn detected_counts_unique_commands_in_both_modes() {
    let dir = TempDir::new().unwrap();
    ProjectBuilder::new(dir.path())
        .with_npm_scripts(&[("build", "true")])
        .with_npm_scripts_at("web", &[("build", "true")]);

    let mut dry = args_for(&dir);
    dry.dry_run = true;
    let dry_summary = domd::run(dry).await.unwrap();

    let summary = domd::run(args_for(&dir)).await.unwrap();
    assert_eq!(dry_summary.detected, 1);
    assert_eq!(summary.detected, 1);
    assert_eq!(summary.working, 1);
}

#[tokio::test]
async fn corrupt_ledger_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    ProjectBuilder::new(dir.path()).with_makefile(&[("ok", "true")]);
    std::fs::create_dir_all(dir.path().join(".domd")).unwrap();
    std::fs::write(dir.path().join(".domd/ledger.json"), "garbage").unwrap();

    assert!(domd::run(args_for(&dir)).await.is_err());
}

#[tokio::test]
async fn malformed_container_config_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    ProjectBuilder::new(dir.path())
        .with_makefile(&[("ok", "true")])
        .with_container_config("not: [valid: mapping");

    assert!(domd::run(args_for(&dir)).await.is_err());
}
