//! Upload rejection paths must leave the temp-file set untouched.
//!
//! The assertions compare the temp directory's contents before and after
//! each rejected request, so everything runs inside one sequential test to
//! keep the measurements quiet.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};

mod common;
use common::*;

fn temp_dir_entries() -> BTreeSet<String> {
    std::fs::read_dir(std::env::temp_dir())
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn rejected_uploads_leave_no_residual_temp_files() {
    let gateway = stub_gateway().build();

    // Streamed body over the 10 MiB cap.
    let before = temp_dir_entries();
    let oversized = vec![b'a'; 11 * 1024 * 1024];
    let response = send(
        Arc::clone(&gateway),
        Request::builder()
            .method("POST")
            .uri("/portfolio/holdings/import")
            .header(header::CONTENT_TYPE, "text/csv")
            .header("idempotency-key", "oversized")
            .body(Body::from(oversized))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["code"], "payload_too_large");
    assert_eq!(temp_dir_entries(), before);

    // Wrong media type is rejected before any spooling.
    let before = temp_dir_entries();
    let response = send(
        Arc::clone(&gateway),
        Request::builder()
            .method("POST")
            .uri("/portfolio/holdings/import")
            .header(header::CONTENT_TYPE, "application/json")
            .header("idempotency-key", "not-csv")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body_json(response).await["code"], "unsupported_media_type");
    assert_eq!(temp_dir_entries(), before);

    // A successful import also cleans up once the response is produced.
    let before = temp_dir_entries();
    let response = send(
        gateway,
        Request::builder()
            .method("POST")
            .uri("/portfolio/holdings/import")
            .header(header::CONTENT_TYPE, "text/csv")
            .header("idempotency-key", "clean")
            .body(Body::from("btc,1\n"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(temp_dir_entries(), before);
}
