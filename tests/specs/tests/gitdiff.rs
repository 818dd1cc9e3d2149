// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The git-diff worker channel: refreshing computes a summary against the
//! working directory, and an edit to a tracked file is picked up as an
//! unstaged change once the worktree watcher notices it.

use std::time::Duration;

use consolemux::test_support::{spawn_http_server, AppStateBuilder};
use consolemux_specs::{create_agent_and_gitdiff_session, ws_connect, ws_recv_type, ws_send, RECV_TIMEOUT};

fn init_repo_with_commit(dir: &std::path::Path) {
    let repo = git2::Repository::init(dir).expect("init repo");
    std::fs::write(dir.join("a.txt"), "line one\n").expect("write a.txt");

    let mut index = repo.index().expect("index");
    index.add_path(std::path::Path::new("a.txt")).expect("stage a.txt");
    index.write().expect("write index");
    let tree_id = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    let sig = git2::Signature::now("tester", "tester@example.com").expect("signature");
    repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[]).expect("commit");
}

#[tokio::test]
async fn refresh_reports_no_changes_against_a_clean_worktree() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    init_repo_with_commit(dir.path());

    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let (session_id, _agent_id, gitdiff_id) =
        create_agent_and_gitdiff_session(&state.registry, &dir.path().to_string_lossy()).await;

    let (mut tx, mut rx) =
        ws_connect(&addr, &format!("/ws/session/{session_id}/worker/{gitdiff_id}")).await?;

    ws_send(&mut tx, &serde_json::json!({"type": "refresh"})).await?;
    let diff = ws_recv_type(&mut rx, "diff-data", RECV_TIMEOUT).await?;
    assert_eq!(diff["data"]["summary"]["files"].as_array().map(Vec::len), Some(0));

    Ok(())
}

#[tokio::test]
async fn editing_a_tracked_file_is_reported_as_an_unstaged_change() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    init_repo_with_commit(dir.path());

    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let (session_id, _agent_id, gitdiff_id) =
        create_agent_and_gitdiff_session(&state.registry, &dir.path().to_string_lossy()).await;

    let (mut tx, mut rx) =
        ws_connect(&addr, &format!("/ws/session/{session_id}/worker/{gitdiff_id}")).await?;

    ws_send(&mut tx, &serde_json::json!({"type": "refresh"})).await?;
    let first = ws_recv_type(&mut rx, "diff-data", RECV_TIMEOUT).await?;
    assert_eq!(first["data"]["summary"]["files"].as_array().map(Vec::len), Some(0));

    std::fs::write(dir.path().join("a.txt"), "line one\nline two\n")?;

    let second = ws_recv_type(&mut rx, "diff-data", Duration::from_secs(5)).await?;
    let files = second["data"]["summary"]["files"].as_array().expect("files array");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["path"].as_str(), Some("a.txt"));
    assert_eq!(files[0]["stageState"].as_str(), Some("unstaged"));

    Ok(())
}

#[tokio::test]
async fn request_expand_resolves_paths_relative_to_the_worktree() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    init_repo_with_commit(dir.path());
    std::fs::write(dir.path().join("b.txt"), "one\ntwo\nthree\nfour\n")?;

    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let (session_id, _agent_id, gitdiff_id) =
        create_agent_and_gitdiff_session(&state.registry, &dir.path().to_string_lossy()).await;

    let (mut tx, mut rx) =
        ws_connect(&addr, &format!("/ws/session/{session_id}/worker/{gitdiff_id}")).await?;

    ws_send(
        &mut tx,
        &serde_json::json!({"type": "request-expand", "path": "b.txt", "startLine": 2, "endLine": 3}),
    )
    .await?;
    let expanded = ws_recv_type(&mut rx, "expanded-lines", RECV_TIMEOUT).await?;
    assert_eq!(expanded["lines"].as_array(), Some(&vec![serde_json::json!("two"), serde_json::json!("three")]));

    Ok(())
}
