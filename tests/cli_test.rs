#![allow(clippy::similar_names)]

//! End-to-end tests for the `exchange-cli` binary.
//!
//! Each test starts a [`FakeGraph`] on a random port, spawns the
//! compiled `exchange-cli` binary as a child process with environment
//! variables pointing at the fake server, and asserts on its output.

mod fake_graph;

use fake_graph::FakeGraph;
use fake_graph::fixtures::{file_attachment, message};

/// Run `exchange-cli` with the given arguments against `graph`.
/// Returns `(stdout, stderr, success)`.
async fn run_cli(graph: &FakeGraph, args: &[&str]) -> (String, String, bool) {
    let bin = env!("CARGO_BIN_EXE_exchange-cli");
    let output = tokio::process::Command::new(bin)
        .args(args)
        .env("EXCHANGE_AUTH_PROVIDER", "ClientCredentialsSecret")
        .env("EXCHANGE_TENANT_ID", fake_graph::TENANT)
        .env("EXCHANGE_CLIENT_ID", "client")
        .env("EXCHANGE_CLIENT_SECRET", "secret")
        .env("EXCHANGE_GRAPH_ENDPOINT", graph.uri())
        .env("EXCHANGE_AUTHORITY_HOST", graph.uri())
        .env("EWS_USERNAME", "")
        .env("EWS_SERVER_ADDRESS", "")
        .output()
        .await
        .expect("failed to run exchange-cli");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_read_table() {
    let graph = FakeGraph::start().await;
    graph
        .messages(&[vec![
            message("m1", "Weekly report", false),
            message("m2", "Lunch", false),
        ]])
        .await;
    graph.accept_updates().await;

    let (stdout, _, success) = run_cli(&graph, &["read"]).await;

    assert!(success, "exchange-cli read failed");
    assert!(stdout.contains("Received"));
    assert!(stdout.contains("Subject"));
    assert!(stdout.contains("alice@example.com"));
    assert!(stdout.contains("Weekly report"));
    assert!(stdout.contains("2 message(s)"));
}

#[tokio::test]
async fn test_read_keep_unread() {
    let graph = FakeGraph::start().await;
    graph.messages(&[vec![message("m1", "Hello", false)]]).await;

    let (_, _, success) = run_cli(&graph, &["read", "--keep-unread"]).await;

    assert!(success, "exchange-cli read --keep-unread failed");
    assert!(graph.requests("PATCH", "/").await.is_empty());
}

#[tokio::test]
async fn test_read_json_with_download() {
    let graph = FakeGraph::start().await;
    graph.messages(&[vec![message("m1", "Report", true)]]).await;
    graph
        .attachments("m1", vec![file_attachment("a1", "report.txt", b"hello")])
        .await;
    graph.accept_updates().await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("downloads");
    let target_arg = target.display().to_string();

    let (stdout, stderr, success) = run_cli(
        &graph,
        &["--json", "read", "--download", &target_arg, "--create-dir"],
    )
    .await;

    assert!(success, "exchange-cli read --download failed: {stderr}");
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["data"][0]["subject"], "Report");
    assert_eq!(result["data"][0]["attachments"][0]["id"], "a1");
    assert_eq!(std::fs::read(target.join("report.txt")).unwrap(), b"hello");
}

#[tokio::test]
async fn test_read_fail_if_empty() {
    let graph = FakeGraph::start().await;
    graph.messages(&[vec![]]).await;

    let (stdout, _, success) = run_cli(&graph, &["read"]).await;
    assert!(success);
    assert!(stdout.contains("No messages found."));

    let (_, stderr, success) = run_cli(&graph, &["read", "--fail-if-empty"]).await;
    assert!(!success);
    assert!(stderr.contains("No messages found"));
}

#[tokio::test]
async fn test_send() {
    let graph = FakeGraph::start().await;
    graph.accept_send_mail().await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"attached").unwrap();
    let attach = dir.path().join("notes.txt").display().to_string();

    let (stdout, stderr, success) = run_cli(
        &graph,
        &[
            "send",
            "--to",
            "bob@example.com;carol@example.com",
            "--subject",
            "Hi",
            "--body",
            "<p>Hello</p>",
            "--html",
            "--importance",
            "high",
            "--attach",
            &attach,
        ],
    )
    .await;

    assert!(success, "exchange-cli send failed: {stderr}");
    assert!(stdout.contains("Email sent successfully."));

    let requests = graph.requests("POST", "/me/sendMail").await;
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["message"]["toRecipients"].as_array().unwrap().len(), 2);
    assert_eq!(body["message"]["importance"], "high");
    assert_eq!(body["message"]["attachments"][0]["name"], "notes.txt");
}

#[tokio::test]
async fn test_send_failure_keep_going() {
    let graph = FakeGraph::start().await;
    graph
        .fail("POST", "/me/sendMail", 400, "ErrorInvalidRecipients")
        .await;

    let (stdout, _, success) = run_cli(
        &graph,
        &["send", "--to", "nobody", "--keep-going"],
    )
    .await;

    assert!(!success);
    assert!(stdout.contains("Failed to send an email."));
}

#[tokio::test]
async fn test_ews_read_requires_username() {
    let graph = FakeGraph::start().await;

    let (_, stderr, success) = run_cli(&graph, &["ews-read"]).await;

    assert!(!success);
    assert!(stderr.contains("username"));
}
