//! Multipart submission and media uploads against a local HTTP server.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use tourify_client::upload::ProgressCallback;
use tourify_client::{
    ApiClient, AspectRatio, ClientConfig, ClientError, ImageItem, MediaSink, PipelineApi,
    PipelineStatus, PipelineSubmission, SubmitOutcome,
};

/// Serve one request with a canned JSON response and hand back what was received.
async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(request);
    });

    (format!("http://{addr}"), rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 16 * 1024];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .map(|v| v.trim().parse::<usize>().unwrap());

    loop {
        let done = match content_length {
            Some(len) => buf.len() >= header_end + len,
            None => buf.ends_with(b"0\r\n\r\n"),
        };
        if done {
            break;
        }
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf).into_owned()
}

fn api(base_url: String) -> ApiClient {
    ApiClient::new(&ClientConfig {
        base_url,
        ..ClientConfig::default()
    })
    .unwrap()
}

fn local_submission(dir: &tempfile::TempDir) -> PipelineSubmission {
    let path = dir.path().join("kitchen.jpg");
    std::fs::write(&path, vec![0u8; 1024]).unwrap();
    PipelineSubmission {
        session_key: "sess-1".into(),
        track_id: "3".into(),
        aspect_ratio: AspectRatio::Landscape,
        images: vec![ImageItem::Local(path)],
    }
}

#[tokio::test]
async fn submission_posts_multipart_files() {
    let (base, request) = serve_once("201 Created", r#"{"id": 77, "status": "created"}"#).await;
    let dir = tempfile::tempdir().unwrap();

    let outcome = api(base).submit_pipeline(&local_submission(&dir)).await.unwrap();
    let SubmitOutcome::Created(run) = outcome else {
        panic!("expected a created run, got {outcome:?}");
    };
    assert_eq!(run.id, "77");
    assert_eq!(run.status, PipelineStatus::Created);

    let request = request.await.unwrap();
    assert!(request.starts_with("POST /api/video-pipeline-runs/ HTTP/1.1"));
    assert!(request.contains(r#"name="session_key""#));
    assert!(request.contains(r#"name="media_files[0]"; filename="kitchen.jpg""#));
    assert!(request.contains("image/jpeg"));
}

#[tokio::test]
async fn validation_rejection_is_an_outcome() {
    let (base, _request) = serve_once(
        "400 Bad Request",
        r#"{"message": "Some images failed validation", "validatedImages": [{"filename": "kitchen.jpg", "is_valid": false, "reason": "floor plan"}]}"#,
    )
    .await;
    let dir = tempfile::tempdir().unwrap();

    match api(base).submit_pipeline(&local_submission(&dir)).await.unwrap() {
        SubmitOutcome::ValidationFailed(report) => {
            assert_eq!(report.message.as_deref(), Some("Some images failed validation"));
            assert_eq!(report.invalid().count(), 1);
        }
        other => panic!("expected a validation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn other_bad_request_is_an_error() {
    let (base, _request) = serve_once("400 Bad Request", r#"{"detail": "track_id missing"}"#).await;
    let dir = tempfile::tempdir().unwrap();

    let err = api(base).submit_pipeline(&local_submission(&dir)).await.unwrap_err();
    assert!(matches!(err, ClientError::Status { .. }), "{err:?}");
}

#[tokio::test]
async fn media_upload_reports_progress_per_chunk() {
    let (base, request) = serve_once(
        "201 Created",
        r#"{"id": "m-1", "url": "https://cdn.test/m-1.png", "filename": "porch.png"}"#,
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("porch.png");
    std::fs::write(&path, vec![7u8; 200_000]).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress: ProgressCallback = Arc::new(move |sent, total| sink.lock().push((sent, total)));

    let item = api(base).upload_media(&path, "sess-1", progress).await.unwrap();
    assert_eq!(item.id, "m-1");

    let seen = seen.lock().clone();
    assert_eq!(
        seen,
        [
            (65_536, 200_000),
            (131_072, 200_000),
            (196_608, 200_000),
            (200_000, 200_000)
        ]
    );

    let request = request.await.unwrap();
    assert!(request.starts_with("POST /api/media/ HTTP/1.1"));
    assert!(request.contains(r#"name="file"; filename="porch.png""#));
    assert!(request.contains("image/png"));
}
