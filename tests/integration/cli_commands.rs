//! CLI route table against a real workspace

use crate::integration::test_utils::{with_env_lock, write_workspace_config};
use clap::Parser;
use routine::auth::{Caller, Role};
use routine::cli::{map_error, Cli, RunContext};
use routine::error::ApiError;
use routine::routine::SectionRef;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn context(workspace: &Path, role: Role) -> RunContext {
    let config = workspace.join("config").join("config.toml");
    with_env_lock(|| {
        RunContext::new(
            workspace.to_path_buf(),
            Some(config),
            Caller::new("registrar", role),
        )
    })
    .unwrap()
}

async fn run(ctx: &RunContext, args: &[&str]) -> Result<String, ApiError> {
    let mut argv = vec!["routine"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    ctx.execute(&cli.command).await
}

const ASSIGN_AB: &[&str] = &[
    "assign", "--program", "BCT", "--semester", "3", "--section", "AB", "--day", "monday",
    "--slots", "4,5,6", "--subject", "S1", "--teacher", "T1", "--room", "R1",
];

#[tokio::test]
async fn test_assign_show_and_teacher_schedule() {
    let temp = TempDir::new().unwrap();
    write_workspace_config(temp.path());
    let ctx = context(temp.path(), Role::Editor);

    let out = run(&ctx, ASSIGN_AB).await.unwrap();
    assert!(out.contains("Assigned S1 to BCT/3/AB"));
    assert!(out.contains("Span: "));
    assert!(temp.path().join("data/store").exists());

    let out = run(&ctx, &["show", "--program", "BCT", "--semester", "3", "--section", "AB"])
        .await
        .unwrap();
    assert!(out.contains("CT461 (THEORY)"));
    assert!(out.contains("Asha Karki"));

    // The mutation drained the projection queue before returning
    let out = run(&ctx, &["teacher", "T1", "--format", "json"]).await.unwrap();
    let view: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(view["item_count"], 3);
    assert!(ctx.engine().queue().is_idle());
}

#[tokio::test]
async fn test_conflict_lists_every_violation() {
    let temp = TempDir::new().unwrap();
    write_workspace_config(temp.path());
    let ctx = context(temp.path(), Role::Editor);
    run(&ctx, ASSIGN_AB).await.unwrap();

    let err = run(
        &ctx,
        &[
            "assign", "--program", "BCT", "--semester", "3", "--section", "CD", "--day", "1",
            "--slots", "5", "--subject", "S1", "--teacher", "T1", "--room", "R1",
        ],
    )
    .await
    .unwrap_err();

    let message = map_error(&err);
    assert!(message.contains("2 conflict(s)"));
    assert!(message.contains("TEACHER_DOUBLE_BOOKED"));
    assert!(message.contains("ROOM_DOUBLE_BOOKED"));
}

#[tokio::test]
async fn test_clear_span_by_id() {
    let temp = TempDir::new().unwrap();
    write_workspace_config(temp.path());
    let ctx = context(temp.path(), Role::Editor);

    let out = run(&ctx, ASSIGN_AB).await.unwrap();
    let span = out
        .lines()
        .find_map(|l| l.trim().strip_prefix("Span: "))
        .unwrap()
        .to_string();

    let out = run(&ctx, &["clear-span", &span]).await.unwrap();
    assert!(out.contains("Cleared 3 slot(s)"));
    assert!(out.contains("T1"));

    let out = run(&ctx, &["clear-span", &span]).await.unwrap();
    assert_eq!(out, "Nothing to clear.");

    let err = run(&ctx, &["clear-span", "not-a-span"]).await.unwrap_err();
    assert!(map_error(&err).contains("span_id"));
}

#[tokio::test]
async fn test_viewer_role_is_refused() {
    let temp = TempDir::new().unwrap();
    write_workspace_config(temp.path());
    let ctx = context(temp.path(), Role::Viewer);

    let err = run(&ctx, ASSIGN_AB).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
    assert!(run(&ctx, &["catalog", "--program", "BEL"]).await.is_ok());
}

#[tokio::test]
async fn test_rebuild_views_as_admin() {
    let temp = TempDir::new().unwrap();
    write_workspace_config(temp.path());
    let ctx = context(temp.path(), Role::Admin);
    run(&ctx, ASSIGN_AB).await.unwrap();

    let out = run(&ctx, &["rebuild-views"]).await.unwrap();
    assert!(out.contains("Enqueued: 2"));
    assert!(out.contains("Projected: 2"));
    assert!(out.contains("Failed: 0"));
}

#[tokio::test]
async fn test_projection_drain_timeout_keeps_committed_result() {
    let temp = TempDir::new().unwrap();
    write_workspace_config(temp.path());
    let ctx = context(temp.path(), Role::Editor).with_drain_timeout(Duration::ZERO);

    let out = run(&ctx, ASSIGN_AB).await.unwrap();
    assert!(out.contains("Assigned S1 to BCT/3/AB"));
    assert!(!ctx.engine().queue().is_idle());

    let routine = ctx
        .engine()
        .routine(&SectionRef::new("BCT", 3, "AB"))
        .unwrap();
    assert_eq!(routine.entries().count(), 3);
}

#[tokio::test]
async fn test_show_rejects_malformed_section() {
    let temp = TempDir::new().unwrap();
    write_workspace_config(temp.path());
    let ctx = context(temp.path(), Role::Editor);
    run(&ctx, ASSIGN_AB).await.unwrap();

    let err = run(&ctx, &["show", "--program", "BCT", "--semester", "3", "--section", "AB:1"])
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
    assert!(map_error(&err).contains("section"));
}
