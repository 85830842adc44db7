use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use carbon_upload_core::config::UploadConfig;
use carbon_upload_core::contract::{
    ConfirmOutcome, ConfirmRequest, FileSource, MockFileApi, PresignRequest, TransferRequest,
    UploadTicket,
};
use carbon_upload_core::error::{ApiError, UploadError, ValidationError};
use carbon_upload_core::hasher::content_digest;
use carbon_upload_core::pipeline::{build_transfer, upload_all, upload_one};

fn png(name: &str, content: &'static [u8]) -> FileSource {
    FileSource::new(name, "image/png", content)
}

fn ticket_for(name: &str, duplicate: bool) -> UploadTicket {
    let object_key = format!("activities/{name}");
    UploadTicket {
        destination_url: (!duplicate).then(|| format!("https://storage.test/{object_key}?sig=abc")),
        http_method: "PUT".to_string(),
        required_headers: BTreeMap::new(),
        public_url: format!("https://cdn.test/{object_key}"),
        object_key,
        is_duplicate: duplicate,
        confirmation_required: true,
    }
}

fn config() -> UploadConfig {
    let mut config = UploadConfig::new("activities");
    config.entity_type = Some("activity".to_string());
    config.entity_id = Some(42);
    config
}

/// Records every network call in order, as `"<step>:<file or url>"`.
fn recording_api(duplicates: &'static [&'static str], calls: Arc<Mutex<Vec<String>>>) -> MockFileApi {
    let mut api = MockFileApi::new();

    let presign_calls = calls.clone();
    api.expect_presign().returning(move |req: &PresignRequest| {
        let name = req.file.original_name.clone();
        presign_calls.lock().unwrap().push(format!("presign:{name}"));
        Ok(ticket_for(&name, duplicates.contains(&name.as_str())))
    });

    let transfer_calls = calls.clone();
    api.expect_transfer().returning(move |req: &TransferRequest| {
        transfer_calls.lock().unwrap().push(format!("transfer:{}", req.url));
        Ok(())
    });

    let confirm_calls = calls;
    api.expect_confirm().returning(move |req: &ConfirmRequest| {
        confirm_calls
            .lock()
            .unwrap()
            .push(format!("confirm:{}", req.original_name));
        Ok(serde_json::json!({ "file_path": req.object_key }))
    });

    api
}

#[tokio::test]
async fn test_batch_with_duplicate_skips_transfer_for_that_file_only() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let api = recording_api(&["b.png"], calls.clone());
    let files = vec![png("a.png", b"first"), png("b.png", b"seen before"), png("c.png", b"third")];

    let results = upload_all(&api, &files, &config(), |_, _| {})
        .await
        .expect("batch should succeed");

    assert_eq!(results.len(), 3);
    assert!(!results[0].is_duplicate);
    assert!(results[1].is_duplicate);
    assert!(!results[2].is_duplicate);

    let calls = calls.lock().unwrap();
    let transfers: Vec<_> = calls.iter().filter(|c| c.starts_with("transfer:")).collect();
    assert_eq!(transfers.len(), 2, "only non-duplicates are transferred: {calls:?}");
    assert!(
        transfers.iter().all(|t| !t.contains("b.png")),
        "duplicate must never be transferred: {calls:?}"
    );
    // Duplicates still register their reference.
    assert!(calls.contains(&"confirm:b.png".to_string()));
}

#[tokio::test]
async fn test_duplicate_never_transfers() {
    let mut api = MockFileApi::new();
    api.expect_presign()
        .times(1)
        .returning(|req| Ok(ticket_for(&req.file.original_name, true)));
    api.expect_transfer().never();
    api.expect_confirm().times(1).returning(|_| Ok(serde_json::Value::Null));

    let result = upload_one(&api, &png("dup.png", b"same"), &config())
        .await
        .expect("duplicate upload should succeed");

    assert!(result.is_duplicate);
    assert_eq!(result.object_key, "activities/dup.png");
    assert_eq!(result.confirmation, ConfirmOutcome::Confirmed);
}

#[tokio::test]
async fn test_results_preserve_input_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let api = recording_api(&[], calls.clone());
    let names = ["one.png", "two.png", "three.png", "four.png", "five.png"];
    let files: Vec<_> = names.iter().map(|n| png(n, b"data")).collect();

    let results = upload_all(&api, &files, &config(), |_, _| {})
        .await
        .expect("batch should succeed");

    let returned: Vec<_> = results.iter().map(|r| r.original_name.as_str()).collect();
    assert_eq!(returned, names);
    for (result, name) in results.iter().zip(names) {
        assert_eq!(result.object_key, format!("activities/{name}"));
        assert_eq!(result.url, format!("https://cdn.test/activities/{name}"));
    }

    // Each file's three calls complete before the next file starts.
    let calls = calls.lock().unwrap();
    let presigns: Vec<_> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.starts_with("presign:"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(presigns, vec![0, 3, 6, 9, 12]);
}

#[tokio::test]
async fn test_progress_is_reported_once_per_file_in_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let api = recording_api(&[], calls);
    let files = vec![png("a.png", b"1"), png("b.png", b"2"), png("c.png", b"3")];

    let mut seen = Vec::new();
    upload_all(&api, &files, &config(), |progress, result| {
        seen.push((progress.completed_count, progress.total_count, result.original_name.clone()));
    })
    .await
    .expect("batch should succeed");

    assert_eq!(
        seen,
        vec![
            (1, 3, "a.png".to_string()),
            (2, 3, "b.png".to_string()),
            (3, 3, "c.png".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_presign_failure_aborts_batch_and_keeps_completed_results() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut api = MockFileApi::new();

    let presign_calls = calls.clone();
    api.expect_presign().returning(move |req| {
        let name = req.file.original_name.clone();
        presign_calls.lock().unwrap().push(format!("presign:{name}"));
        if name == "b.png" {
            return Err(ApiError::Server {
                status: Some(413),
                message: "File too large for directory".to_string(),
                request_id: Some("req-77".to_string()),
            });
        }
        Ok(ticket_for(&name, false))
    });
    let transfer_calls = calls.clone();
    api.expect_transfer().returning(move |req| {
        transfer_calls.lock().unwrap().push(format!("transfer:{}", req.url));
        Ok(())
    });
    api.expect_confirm().returning(|_| Ok(serde_json::Value::Null));

    let files = vec![png("a.png", b"1"), png("b.png", b"2"), png("c.png", b"3")];
    let mut progress_calls = 0;
    let err = upload_all(&api, &files, &config(), |_, _| progress_calls += 1)
        .await
        .expect_err("batch should abort");

    assert_eq!(err.index, 1);
    assert_eq!(err.total, 3);
    assert_eq!(err.completed.len(), 1);
    assert_eq!(err.completed[0].original_name, "a.png");
    assert_eq!(progress_calls, 1);
    assert_eq!(err.source.request_id(), Some("req-77"));
    match &err.source {
        UploadError::Presign { file, source } => {
            assert_eq!(file, "b.png");
            assert_eq!(source.to_string(), "File too large for directory");
        }
        other => panic!("expected presign failure, got {other:?}"),
    }

    let calls = calls.lock().unwrap();
    assert_eq!(calls.last().map(String::as_str), Some("presign:b.png"));
    assert!(!calls.iter().any(|c| c.contains("c.png")), "c.png must not be attempted: {calls:?}");
}

#[tokio::test]
async fn test_transfer_failure_aborts_batch() {
    let mut api = MockFileApi::new();
    api.expect_presign()
        .times(2)
        .returning(|req| Ok(ticket_for(&req.file.original_name, false)));
    api.expect_transfer().times(2).returning(|req| {
        if req.url.contains("b.png") {
            Err(ApiError::Server {
                status: Some(403),
                message: "Forbidden".to_string(),
                request_id: None,
            })
        } else {
            Ok(())
        }
    });
    // Only a.png reaches confirmation.
    api.expect_confirm().times(1).returning(|_| Ok(serde_json::Value::Null));

    let files = vec![png("a.png", b"1"), png("b.png", b"2"), png("c.png", b"3")];
    let err = upload_all(&api, &files, &config(), |_, _| {})
        .await
        .expect_err("batch should abort");

    assert_eq!(err.index, 1);
    assert_eq!(err.completed.len(), 1);
    assert!(matches!(err.source, UploadError::Transfer { ref file, .. } if file == "b.png"));
}

#[tokio::test]
async fn test_confirm_failure_is_soft() {
    let mut api = MockFileApi::new();
    api.expect_presign()
        .returning(|req| Ok(ticket_for(&req.file.original_name, false)));
    api.expect_transfer().times(1).returning(|_| Ok(()));
    api.expect_confirm().times(1).returning(|_| {
        Err(ApiError::Server {
            status: Some(500),
            message: "metadata store unavailable".to_string(),
            request_id: None,
        })
    });

    let files = vec![png("receipt.png", b"bytes")];
    let results = upload_all(&api, &files, &config(), |_, _| {})
        .await
        .expect("confirm failure must not fail the batch");

    let result = &results[0];
    assert_eq!(result.object_key, "activities/receipt.png");
    assert_eq!(result.url, "https://cdn.test/activities/receipt.png");
    assert_eq!(
        result.confirmation,
        ConfirmOutcome::FailedSoft("metadata store unavailable".to_string())
    );
}

#[tokio::test]
async fn test_confirm_skipped_when_not_required() {
    let mut api = MockFileApi::new();
    api.expect_presign().returning(|req| {
        let mut ticket = ticket_for(&req.file.original_name, false);
        ticket.confirmation_required = false;
        Ok(ticket)
    });
    api.expect_transfer().times(1).returning(|_| Ok(()));
    api.expect_confirm().never();

    let result = upload_one(&api, &png("a.png", b"x"), &config())
        .await
        .expect("upload should succeed");
    assert_eq!(result.confirmation, ConfirmOutcome::Skipped);
}

#[tokio::test]
async fn test_validation_failure_makes_no_network_calls() {
    let mut api = MockFileApi::new();
    api.expect_presign().never();
    api.expect_transfer().never();
    api.expect_confirm().never();

    let mut config = config();
    config.limits.max_file_size = 4;
    let files = vec![png("small.png", b"ok"), png("big.png", b"too large")];

    let err = upload_all(&api, &files, &config, |_, _| {})
        .await
        .expect_err("validation should fail");

    assert_eq!(err.index, 1);
    assert!(err.completed.is_empty());
    assert_eq!(
        err.source,
        UploadError::Validation(ValidationError::TooLarge {
            file: "big.png".to_string(),
            size: 9,
            limit: 4,
        })
    );
}

#[tokio::test]
async fn test_presign_sends_digest_and_destination() {
    let mut api = MockFileApi::new();
    api.expect_presign()
        .withf(|req: &PresignRequest| {
            req.file.content_digest.as_deref() == Some(content_digest(b"evidence").as_str())
                && req.file.size_bytes == 8
                && req.destination.directory == "activities"
                && req.destination.entity_type.as_deref() == Some("activity")
                && req.destination.entity_id == Some(42)
        })
        .times(1)
        .returning(|req| Ok(ticket_for(&req.file.original_name, true)));
    api.expect_confirm()
        .withf(|req: &ConfirmRequest| {
            req.object_key == "activities/proof.png"
                && req.entity_id == Some(42)
                && req.content_digest.is_some()
        })
        .times(1)
        .returning(|_| Ok(serde_json::Value::Null));

    upload_one(&api, &png("proof.png", b"evidence"), &config())
        .await
        .expect("upload should succeed");
}

#[tokio::test]
async fn test_digest_omitted_when_disabled() {
    let mut api = MockFileApi::new();
    api.expect_presign()
        .withf(|req: &PresignRequest| req.file.content_digest.is_none())
        .times(1)
        .returning(|req| Ok(ticket_for(&req.file.original_name, false)));
    api.expect_transfer().returning(|_| Ok(()));
    api.expect_confirm().returning(|_| Ok(serde_json::Value::Null));

    let mut config = config();
    config.compute_digest = false;
    upload_one(&api, &png("a.png", b"x"), &config)
        .await
        .expect("upload should succeed");
}

#[tokio::test]
async fn test_ticket_without_destination_is_rejected() {
    let mut api = MockFileApi::new();
    api.expect_presign().returning(|req| {
        let mut ticket = ticket_for(&req.file.original_name, false);
        ticket.destination_url = None;
        Ok(ticket)
    });
    api.expect_transfer().never();
    api.expect_confirm().never();

    let err = upload_one(&api, &png("a.png", b"x"), &config())
        .await
        .expect_err("missing destination must fail");
    assert_eq!(
        err,
        UploadError::MissingDestination {
            file: "a.png".to_string()
        }
    );
}

#[test]
fn test_transfer_defaults_content_type_to_file_mime() {
    let file = png("a.png", b"x");
    let ticket = ticket_for("a.png", false);

    let transfer = build_transfer(&file, &ticket).expect("transfer should build");

    assert_eq!(transfer.method, "PUT");
    assert_eq!(transfer.url, "https://storage.test/activities/a.png?sig=abc");
    assert_eq!(transfer.headers.get("Content-Type").map(String::as_str), Some("image/png"));
    assert_eq!(&transfer.body[..], b"x");
}

#[test]
fn test_transfer_keeps_ticket_content_type() {
    let file = png("a.png", b"x");
    let mut ticket = ticket_for("a.png", false);
    ticket.http_method = "POST".to_string();
    ticket
        .required_headers
        .insert("content-type".to_string(), "application/octet-stream".to_string());
    ticket
        .required_headers
        .insert("x-amz-meta-owner".to_string(), "42".to_string());

    let transfer = build_transfer(&file, &ticket).expect("transfer should build");

    assert_eq!(transfer.method, "POST");
    assert_eq!(transfer.headers.len(), 2);
    assert_eq!(
        transfer.headers.get("content-type").map(String::as_str),
        Some("application/octet-stream")
    );
    assert!(!transfer.headers.contains_key("Content-Type"));
}
