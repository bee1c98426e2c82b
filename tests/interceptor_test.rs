//! Tests for [`InterceptedStream`]: pass-through fidelity and commit rules.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream;

use hermod::stream::{Captured, CommitHook, InterceptedStream, in_band_errors};
use hermod::{HermodError, Result};

// ============================================================================
// Helpers
// ============================================================================

type Commits = Arc<Mutex<Vec<Captured>>>;

/// Hook that records every commit it receives.
fn recording_hook() -> (CommitHook, Commits) {
    let commits: Commits = Arc::new(Mutex::new(Vec::new()));
    let sink = commits.clone();
    let hook: CommitHook = Box::new(move |captured: Captured| -> BoxFuture<'static, ()> {
        Box::pin(async move {
            sink.lock().unwrap().push(captured);
        })
    });
    (hook, commits)
}

/// Hook that yields to the scheduler before recording.
fn slow_hook() -> (CommitHook, Commits) {
    let commits: Commits = Arc::new(Mutex::new(Vec::new()));
    let sink = commits.clone();
    let hook: CommitHook = Box::new(move |captured: Captured| -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            sink.lock().unwrap().push(captured);
        })
    });
    (hook, commits)
}

fn chunks(parts: &[&'static str]) -> Vec<Result<Bytes>> {
    parts.iter().map(|p| Ok(Bytes::from(p.to_string()))).collect()
}

// ============================================================================
// Completed streams
// ============================================================================

#[tokio::test]
async fn forwards_chunks_unchanged_and_commits_text() {
    let (hook, commits) = recording_hook();
    let upstream = stream::iter(chunks(&["Hel", "lo, ", "world"]));
    let intercepted = InterceptedStream::new(upstream, hook);

    let received: Vec<Bytes> = intercepted.map(|item| item.unwrap()).collect().await;

    assert_eq!(
        received,
        vec![
            Bytes::from_static(b"Hel"),
            Bytes::from_static(b"lo, "),
            Bytes::from_static(b"world"),
        ]
    );
    let commits = commits.lock().unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].answer.as_deref(), Some("Hello, world"));
    assert_eq!(commits[0].response_chars, 12);
}

#[tokio::test]
async fn sse_stream_commits_decoded_answer() {
    let (hook, commits) = recording_hook();
    let upstream = stream::iter(chunks(&[
        "data: {\"choices\":[{\"delta\":{\"content\":\"Um \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"poema\"}}]}\n\n",
        "data: [DONE]\n\n",
    ]));

    let received: Vec<_> = InterceptedStream::new(upstream, hook).collect().await;

    assert_eq!(received.len(), 3);
    let commits = commits.lock().unwrap();
    assert_eq!(commits[0].answer.as_deref(), Some("Um poema"));
}

#[tokio::test]
async fn multibyte_characters_split_across_chunks_survive() {
    let (hook, commits) = recording_hook();
    let text = "ação";
    let bytes = text.as_bytes();
    // split inside the two-byte "ç"
    let upstream = stream::iter(vec![
        Ok(Bytes::copy_from_slice(&bytes[..2])),
        Ok(Bytes::copy_from_slice(&bytes[2..])),
    ]);

    let _: Vec<_> = InterceptedStream::new(upstream, hook).collect().await;

    assert_eq!(
        commits.lock().unwrap()[0].answer.as_deref(),
        Some("ação")
    );
}

#[tokio::test]
async fn commit_finishes_before_end_of_stream() {
    let (hook, commits) = slow_hook();
    let upstream = stream::iter(chunks(&["a", "b"]));
    let mut intercepted = InterceptedStream::new(upstream, hook);

    while let Some(item) = intercepted.next().await {
        item.unwrap();
    }

    // end-of-stream has been observed, so the commit must already be visible
    assert_eq!(commits.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn overflowing_capture_commits_streamed_sentinel() {
    let (hook, commits) = recording_hook();
    let upstream = stream::iter(chunks(&["0123456789", "0123456789"]));
    let intercepted = InterceptedStream::new(upstream, hook).max_capture_bytes(8);

    let received: Vec<Bytes> = intercepted.map(|item| item.unwrap()).collect().await;

    // the client still gets every byte
    assert_eq!(received.concat(), b"01234567890123456789".to_vec());
    let commits = commits.lock().unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].answer, None);
}

// ============================================================================
// Failed and abandoned streams
// ============================================================================

#[tokio::test]
async fn upstream_error_discards_partial_capture() {
    let (hook, commits) = recording_hook();
    let upstream = stream::iter(vec![
        Ok(Bytes::from_static(b"partial ")),
        Err(HermodError::Stream("connection reset".into())),
    ]);

    let received: Vec<_> = InterceptedStream::new(upstream, hook).collect().await;

    assert_eq!(received.len(), 2);
    assert!(received[0].is_ok());
    assert!(matches!(received[1], Err(HermodError::Stream(_))));
    assert!(commits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stream_ends_after_error() {
    let (hook, _commits) = recording_hook();
    let upstream = stream::iter(vec![
        Err(HermodError::Stream("boom".into())),
        Ok(Bytes::from_static(b"never seen")),
    ]);
    let mut intercepted = InterceptedStream::new(upstream, hook);

    assert!(intercepted.next().await.unwrap().is_err());
    assert!(intercepted.next().await.is_none());
}

#[tokio::test]
async fn dropped_stream_never_commits() {
    let (hook, commits) = recording_hook();
    let upstream = stream::iter(chunks(&["Hel", "lo, ", "world"]));
    let mut intercepted = InterceptedStream::new(upstream, hook);

    let first = intercepted.next().await.unwrap().unwrap();
    assert_eq!(first, Bytes::from_static(b"Hel"));
    drop(intercepted);

    assert!(commits.lock().unwrap().is_empty());
}

// ============================================================================
// HTTP body adaptation
// ============================================================================

#[tokio::test]
async fn in_band_errors_replace_failure_with_error_event() {
    let upstream: hermod::ByteStream = Box::pin(stream::iter(vec![
        Ok(Bytes::from_static(b"data: {}\n\n")),
        Err(HermodError::Timeout(std::time::Duration::from_secs(60))),
        Ok(Bytes::from_static(b"never seen")),
    ]));

    let body: Vec<Bytes> = in_band_errors(upstream)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(body.len(), 2);
    let event = std::str::from_utf8(&body[1]).unwrap();
    assert!(event.starts_with("event: error\n"));
    assert!(event.contains("o modelo demorou demais para responder"));
}
