//! Integration tests for `Session`
//!
//! Drives a scripted stand-in for the gemma binary that prints the same
//! markers the real one does. The script's behavior is picked by the
//! `--model` value and by the request line.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use futures::StreamExt;
use gemma_session::{Phase, Session, SessionConfig, SessionConfigBuilder, SessionError};
use tempfile::TempDir;

const FAKE_GEMMA: &str = r#"#!/bin/sh
model="$2"
echo "args: $*" >&2
case "$model" in
  silent) exec sleep 5 ;;
  late) sleep 1 ;;
esac
printf 'Loading weights for %s\n' "$model"
printf '> '
while IFS= read -r line; do
  case "$line" in
    crash)
      printf '[ Reading prompt ] ..\n\npartial answer'
      exit 1
      ;;
    slow)
      sleep 1
      ;;
    many)
      printf '[ Reading prompt ] ...\n\n'
      i=1
      while [ "$i" -le 50 ]; do
        printf 'chunk%d ' "$i"
        i=$((i + 1))
      done
      printf '\n> '
      continue
      ;;
    drip)
      printf '[ Reading prompt ] ...\n\n'
      i=1
      while [ "$i" -le 50 ]; do
        printf 'chunk%d ' "$i"
        sleep 0.02
        i=$((i + 1))
      done
      printf '\n> '
      continue
      ;;
    scenario)
      printf 'Reading prompt'; sleep 0.1
      printf '..'; sleep 0.1
      printf '..'; sleep 0.1
      printf 'hello'; sleep 0.1
      printf ' world'; sleep 0.1
      printf '>'
      continue
      ;;
  esac
  printf '[ Reading prompt ] '
  printf '....'
  printf '\n\nYou said: %s... really\n' "$line"
  printf '> '
done
exit 0
"#;

/// Directory holding the fake binary, written once per test binary
fn gemma_dir() -> &'static Path {
    static DIR: OnceLock<TempDir> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gemma");
        std::fs::write(&path, FAKE_GEMMA).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        dir
    })
    .path()
}

fn config(model: &str) -> SessionConfigBuilder {
    let _ = env_logger::builder().is_test(true).try_init();

    SessionConfig::builder()
        .directory(gemma_dir())
        .model(model)
        .compressed_weights("2b-it-sfp.sbs")
        .tokenizer("tokenizer.spm")
        .ready_timeout(Duration::from_secs(10))
        .response_timeout(Duration::from_secs(10))
        .shutdown_grace(Duration::from_secs(2))
}

async fn connect(model: &str) -> Session {
    Session::connect(config(model).build().unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_connect_and_exchange() {
    let session = connect("2b-it").await;
    assert_eq!(session.phase(), Phase::ReadyForInput);
    assert!(session.pid().is_some());

    let chunks = session.send_request_await_response("hi").await.unwrap();

    // The decorated loading line is not part of the answer
    assert_eq!(chunks.concat(), "\n\nYou said: hi... really\n");
    assert_eq!(session.phase(), Phase::ReadyForInput);

    // A second exchange on the same process
    let chunks = session.send_request_await_response("again").await.unwrap();
    assert!(chunks.concat().contains("You said: again"));

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_ellipsis_in_response_preserved() {
    let session = connect("2b-it").await;

    let text = session
        .send_request_await_response("wait")
        .await
        .unwrap()
        .concat();
    assert!(text.contains("You said: wait... really"), "got {text:?}");

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_marker_sequence_across_reads() {
    let session = connect("2b-it").await;

    let chunks = session
        .send_request_await_response("scenario")
        .await
        .unwrap();
    assert_eq!(chunks.concat(), "hello world");
    assert_eq!(session.phase(), Phase::ReadyForInput);

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_request_before_ready() {
    let session = Session::start(config("late").build().unwrap())
        .await
        .unwrap();

    let result = session.send_request_await_response("hi").await;
    assert!(matches!(
        result,
        Err(SessionError::NotReady {
            phase: Phase::Starting
        })
    ));

    session
        .wait_until_ready(Duration::from_secs(5))
        .await
        .unwrap();
    let chunks = session.send_request_await_response("hi").await.unwrap();
    assert!(chunks.concat().contains("You said: hi"));

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_request_is_busy() {
    let session = connect("2b-it").await;

    let first = session.send_request_await_response("slow");
    let second = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        session.send_request_await_response("hi").await
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.unwrap().concat().contains("You said: slow"));
    assert!(matches!(second, Err(SessionError::Busy)));

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_wait_until_ready_times_out() {
    let session = Session::start(config("silent").build().unwrap())
        .await
        .unwrap();

    let started = Instant::now();
    let result = session.wait_until_ready(Duration::from_millis(200)).await;

    assert!(matches!(result, Err(SessionError::Timeout(_))));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(session.phase(), Phase::Starting);

    session.shutdown().await.unwrap();
    assert_eq!(session.phase(), Phase::Closed);
}

#[tokio::test]
async fn test_expired_wait_stays_expired() {
    let session = Session::start(config("late").build().unwrap())
        .await
        .unwrap();

    let expired = session.wait_until_ready(Duration::from_millis(200)).await;
    assert!(matches!(expired, Err(SessionError::Timeout(_))));

    session
        .wait_until_ready(Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(session.phase(), Phase::ReadyForInput);
    assert!(matches!(expired, Err(SessionError::Timeout(_))));

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connect_times_out() {
    let config = config("silent")
        .ready_timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let result = Session::connect(config).await;
    assert!(matches!(result, Err(SessionError::Timeout(_))));
}

#[tokio::test]
async fn test_response_timeout_abandons_exchange() {
    let config = config("2b-it")
        .response_timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let session = Session::connect(config).await.unwrap();

    let result = session.send_request_await_response("slow").await;
    assert!(matches!(result, Err(SessionError::Timeout(_))));

    // Still busy until the binary prompts again
    assert!(matches!(
        session.send_request_await_response("hi").await,
        Err(SessionError::Busy)
    ));

    session
        .wait_until_ready(Duration::from_secs(5))
        .await
        .unwrap();
    let chunks = session.send_request_await_response("hi").await.unwrap();
    let text = chunks.concat();
    assert!(text.contains("You said: hi"));
    assert!(!text.contains("slow"));

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_process_exit_mid_response() {
    let session = connect("2b-it").await;

    let started = Instant::now();
    let result = session.send_request_await_response("crash").await;
    assert!(started.elapsed() < Duration::from_secs(5));

    match result {
        Err(SessionError::SessionClosed { partial }) => {
            assert!(partial.concat().contains("partial answer"), "got {partial:?}");
        }
        other => panic!("expected SessionClosed, got {other:?}"),
    }
    assert_eq!(session.phase(), Phase::Closed);

    assert!(matches!(
        session.send_request_await_response("hi").await,
        Err(SessionError::SessionClosed { .. })
    ));
    assert!(matches!(
        session.wait_until_ready(Duration::from_secs(1)).await,
        Err(SessionError::SessionClosed { .. })
    ));

    // Shutting down an exited session still succeeds
    let status = session.shutdown().await.unwrap();
    assert!(status.is_some_and(|s| !s.success()));
}

#[tokio::test]
async fn test_streaming_with_backpressure() {
    let config = config("2b-it").stream_buffer(1).build().unwrap();
    let session = Session::connect(config).await.unwrap();

    let mut stream = session.send_request_stream("many").await.unwrap();
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk.unwrap());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let expected: String = (1..=50).map(|i| format!("chunk{i} ")).collect();
    assert!(text.contains(&expected), "got {text:?}");
    assert_eq!(session.phase(), Phase::ReadyForInput);

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stream_reader_waits_for_consumer() {
    let config = config("2b-it").stream_buffer(1).build().unwrap();
    let session = Session::connect(config).await.unwrap();

    let mut stream = session.send_request_stream("drip").await.unwrap();

    // The binary is done printing long before this; with one queued chunk
    // the reader must be parked before the ready marker
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_ne!(session.phase(), Phase::ReadyForInput);

    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk.unwrap());
    }

    let expected: String = (1..=50).map(|i| format!("chunk{i} ")).collect();
    assert_eq!(text, format!("\n\n{expected}\n"));
    assert_eq!(session.phase(), Phase::ReadyForInput);

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dropped_stream_abandons_exchange() {
    let session = connect("2b-it").await;

    let mut stream = session.send_request_stream("many").await.unwrap();
    let first = stream.next().await;
    assert!(matches!(first, Some(Ok(_))));
    drop(stream);

    session
        .wait_until_ready(Duration::from_secs(5))
        .await
        .unwrap();
    let chunks = session.send_request_await_response("hi").await.unwrap();
    let text = chunks.concat();
    assert!(text.contains("You said: hi"));
    assert!(!text.contains("chunk50"));

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_multiline_request_rejected() {
    let session = connect("2b-it").await;

    let result = session.send_request_await_response("two\nlines").await;
    assert!(matches!(result, Err(SessionError::InvalidRequest(_))));
    assert_eq!(session.phase(), Phase::ReadyForInput);

    let chunks = session.send_request_await_response("one line").await.unwrap();
    assert!(chunks.concat().contains("You said: one line"));

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_binary() {
    let dir = tempfile::tempdir().unwrap();
    let config = config("2b-it").directory(dir.path()).build().unwrap();

    let result = Session::start(config).await;
    assert!(matches!(result, Err(SessionError::Spawn(_))));
}

#[tokio::test]
async fn test_shutdown_closes_session() {
    let session = connect("2b-it").await;
    let mut phase = session.subscribe_phase();

    let status = session.shutdown().await.unwrap();
    assert!(status.is_some_and(|s| s.success()));
    assert_eq!(session.phase(), Phase::Closed);
    assert_eq!(*phase.borrow_and_update(), Phase::Closed);

    assert!(matches!(
        session.send_request_await_response("hi").await,
        Err(SessionError::SessionClosed { .. })
    ));

    // Second shutdown is a no-op
    assert!(session.shutdown().await.unwrap().is_none());
}

#[tokio::test]
async fn test_transcript_records_session() {
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("output.txt");
    let config = config("2b-it").transcript(&log_path).build().unwrap();

    let session = Session::connect(config).await.unwrap();
    session.send_request_await_response("hi").await.unwrap();
    session.shutdown().await.unwrap();

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("Starting"));
    assert!(log.contains("--model 2b-it"));
    assert!(log.contains("args: --model 2b-it"));
    assert!(log.contains("Loading weights for 2b-it"));
    // Raw output, markers included
    assert!(log.contains("[ Reading prompt ] ...."));
    assert!(log.contains("You said: hi"));
    assert!(log.contains("child process exited"));
}
