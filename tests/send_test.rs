//! Integration tests for `send_email` against the fake Graph server.
//!
//! Small attachments must travel inline with `sendMail`; anything over
//! the inline limit switches to a draft with an upload session.

mod fake_graph;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use exchange_mail::{
    AttachmentSource, CancellationToken, Error, INLINE_ATTACHMENT_LIMIT, Importance, Result,
    SendInput, SendOptions, SendResult, UPLOAD_SLICE_SIZE, send_email,
};
use fake_graph::{FakeGraph, SliceResponder};
use serde_json::Value;
use std::path::Path;

fn input_to(to: &str) -> SendInput {
    SendInput {
        to: to.to_string(),
        subject: "Quarterly numbers".to_string(),
        message: "See attached.".to_string(),
        ..SendInput::default()
    }
}

async fn send(graph: &FakeGraph, input: &SendInput, options: &SendOptions) -> Result<SendResult> {
    send_email(&graph.connection(), input, options, CancellationToken::new()).await
}

/// Write a file of `size` bytes filled with a repeating pattern.
fn sized_file(dir: &Path, name: &str, size: u64) -> std::path::PathBuf {
    let path = dir.join(name);
    let bytes: Vec<u8> = (0..size).map(|i| u8::try_from(i % 251).unwrap()).collect();
    std::fs::write(&path, bytes).unwrap();
    path
}

async fn send_mail_body(graph: &FakeGraph) -> Value {
    let requests = graph.requests("POST", "/me/sendMail").await;
    assert_eq!(requests.len(), 1, "expected exactly one sendMail");
    serde_json::from_slice(&requests[0].body).unwrap()
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_plain_message() {
    let graph = FakeGraph::start().await;
    graph.accept_send_mail().await;

    let input = SendInput {
        cc: "carol@example.com".to_string(),
        importance: Importance::High,
        is_message_html: true,
        ..input_to("alice@example.com; bob @example.com,")
    };
    let result = send(&graph, &input, &SendOptions::default()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.data, "Email sent successfully.");

    let body = send_mail_body(&graph).await;
    assert_eq!(body["saveToSentItems"], true);
    let message = &body["message"];
    assert_eq!(message["subject"], "Quarterly numbers");
    assert_eq!(message["importance"], "high");
    assert_eq!(message["body"]["contentType"], "html");
    let to: Vec<_> = message["toRecipients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["emailAddress"]["address"].as_str().unwrap())
        .collect();
    assert_eq!(to, vec!["alice@example.com", "bob@example.com"]);
    assert_eq!(
        message["ccRecipients"][0]["emailAddress"]["address"],
        "carol@example.com"
    );
    assert!(message.get("attachments").is_none());
}

#[tokio::test]
async fn test_small_attachments_are_inline() {
    let graph = FakeGraph::start().await;
    graph.accept_send_mail().await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("numbers.csv"), b"q,total\n3,42\n").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignored by mask").unwrap();

    let input = SendInput {
        save_to_sent_items: false,
        attachments: vec![
            AttachmentSource::from_string("summary.txt", "All good"),
            AttachmentSource::directory(dir.path(), "*.csv"),
        ],
        ..input_to("alice@example.com")
    };
    let result = send(&graph, &input, &SendOptions::default()).await.unwrap();
    assert!(result.success);

    let body = send_mail_body(&graph).await;
    assert_eq!(body["saveToSentItems"], false);
    let attachments = body["message"]["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 2);

    assert_eq!(attachments[0]["@odata.type"], "#microsoft.graph.fileAttachment");
    assert_eq!(attachments[0]["name"], "summary.txt");
    assert_eq!(
        STANDARD
            .decode(attachments[0]["contentBytes"].as_str().unwrap())
            .unwrap(),
        b"All good"
    );
    assert_eq!(attachments[1]["name"], "numbers.csv");
}

#[tokio::test]
async fn test_attachment_at_limit_is_inline() {
    let graph = FakeGraph::start().await;
    graph.accept_send_mail().await;

    let dir = tempfile::tempdir().unwrap();
    let path = sized_file(dir.path(), "exact.bin", INLINE_ATTACHMENT_LIMIT);

    let input = SendInput {
        attachments: vec![AttachmentSource::file(path)],
        ..input_to("alice@example.com")
    };
    send(&graph, &input, &SendOptions::default()).await.unwrap();

    let body = send_mail_body(&graph).await;
    assert_eq!(body["message"]["attachments"].as_array().unwrap().len(), 1);
    assert!(graph.requests("PUT", "/upload/").await.is_empty());
}

#[tokio::test]
async fn test_large_attachment_uses_upload_session() {
    let graph = FakeGraph::start().await;
    graph.accept_draft("draft-1").await;

    let dir = tempfile::tempdir().unwrap();
    let size = INLINE_ATTACHMENT_LIMIT + 1;
    let large = sized_file(dir.path(), "large.bin", size);
    let small = sized_file(dir.path(), "small.bin", 1024);

    let input = SendInput {
        attachments: vec![AttachmentSource::file(&large), AttachmentSource::file(&small)],
        ..input_to("alice@example.com")
    };
    let result = send(&graph, &input, &SendOptions::default()).await.unwrap();
    assert!(result.success);

    assert!(graph.requests("POST", "/me/sendMail").await.is_empty());

    let drafts = graph.requests("POST", "/me/messages").await;
    let draft = drafts
        .iter()
        .find(|r| r.url.path() == "/me/messages")
        .unwrap();
    let draft: Value = serde_json::from_slice(&draft.body).unwrap();
    let inline = draft["attachments"].as_array().unwrap();
    assert_eq!(inline.len(), 1);
    assert_eq!(inline[0]["name"], "small.bin");

    let session = drafts
        .iter()
        .find(|r| r.url.path().ends_with("/createUploadSession"))
        .unwrap();
    let session: Value = serde_json::from_slice(&session.body).unwrap();
    assert_eq!(session["AttachmentItem"]["attachmentType"], "file");
    assert_eq!(session["AttachmentItem"]["name"], "large.bin");
    assert_eq!(session["AttachmentItem"]["size"], size);

    let slices = graph.requests("PUT", "/upload/draft-1").await;
    assert_eq!(
        u64::try_from(slices.len()).unwrap(),
        size.div_ceil(UPLOAD_SLICE_SIZE)
    );
    for slice in &slices {
        assert!(slice.headers.get("authorization").is_none());
    }
    let uploaded: Vec<u8> = slices.iter().flat_map(|s| s.body.clone()).collect();
    assert_eq!(uploaded, std::fs::read(&large).unwrap());

    assert_eq!(
        graph.requests("POST", "/me/messages/draft-1/send").await.len(),
        1
    );
}

#[tokio::test]
async fn test_unfinished_upload_never_sends_draft() {
    for slices in [SliceResponder::Stall, SliceResponder::Malformed] {
        let graph = FakeGraph::start().await;
        graph.accept_draft_with("draft-1", slices).await;

        let dir = tempfile::tempdir().unwrap();
        let large = sized_file(dir.path(), "large.bin", INLINE_ATTACHMENT_LIMIT + 1);
        let input = SendInput {
            attachments: vec![AttachmentSource::file(&large)],
            ..input_to("alice@example.com")
        };

        let err = send(&graph, &input, &SendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UploadFailed(_)), "{err}");

        let options = SendOptions {
            throw_on_failure: false,
            ..SendOptions::default()
        };
        let result = send(&graph, &input, &options).await.unwrap();
        assert!(!result.success);
        assert!(result.data.starts_with("Failed to send an email. "));
        assert!(result.data.contains("large.bin"));

        assert_eq!(graph.requests("PUT", "/upload/draft-1").await.len(), 2);
        assert!(
            graph
                .requests("POST", "/me/messages/draft-1/send")
                .await
                .is_empty()
        );
    }
}

#[tokio::test]
async fn test_missing_to_is_config_error() {
    let graph = FakeGraph::start().await;

    let options = SendOptions {
        throw_on_failure: false,
        ..SendOptions::default()
    };
    let err = send(&graph, &input_to(" ; "), &options).await.unwrap_err();

    assert!(err.is_config());
    assert!(err.to_string().contains("To"));
    assert_eq!(graph.request_count().await, 0);
}

#[tokio::test]
async fn test_unmatched_attachment_path() {
    let graph = FakeGraph::start().await;
    graph.accept_send_mail().await;

    let dir = tempfile::tempdir().unwrap();
    let input = SendInput {
        attachments: vec![AttachmentSource::directory(dir.path(), "*.pdf")],
        ..input_to("alice@example.com")
    };

    let result = send(&graph, &input, &SendOptions::default()).await.unwrap();
    assert!(result.success, "unmatched paths are skipped by default");

    let options = SendOptions {
        throw_on_failure: false,
        throw_if_attachment_not_found: true,
    };
    let result = send(&graph, &input, &options).await.unwrap();
    assert!(!result.success);
    assert!(result.data.starts_with("Failed to send an email. "));

    let options = SendOptions {
        throw_on_failure: true,
        throw_if_attachment_not_found: true,
    };
    let err = send(&graph, &input, &options).await.unwrap_err();
    assert!(matches!(err, Error::AttachmentNotFound(_)));
}

#[tokio::test]
async fn test_graph_failure_envelope() {
    let graph = FakeGraph::start().await;
    graph
        .fail("POST", "/me/sendMail", 400, "ErrorInvalidRecipients")
        .await;

    let options = SendOptions {
        throw_on_failure: false,
        ..SendOptions::default()
    };
    let result = send(&graph, &input_to("nobody"), &options).await.unwrap();
    assert!(!result.success);
    assert!(result.data.starts_with("Failed to send an email. "));
    assert!(result.data.contains("ErrorInvalidRecipients"));

    let err = send(&graph, &input_to("nobody"), &SendOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Graph { status: 400, .. }));
}
