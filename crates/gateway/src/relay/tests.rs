use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode as HttpStatus};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};

use pencil2ink_types::{FailInfo, Job, RunningInfo, WaitingInfo};

use super::*;
use crate::registry::JobRegistry;
use crate::test_helpers::{encode_image, start_mock_server, test_config, PUBLIC_KEY};

/// テスト用モックTAMS。署名を検証し、呼び出しを記録する。
struct MockTams {
    public_key: pencil2ink_crypto::RsaPublicKey,
    resource_status: HttpStatus,
    put_status: HttpStatus,
    job_create_status: HttpStatus,
    /// 設定時は `putUrl` としてこの値を返す
    put_url: Option<String>,
    /// `GET /v1/jobs/J1` が返すジョブ。`{base}` はモックのベースURLに置換する。
    job_json: Mutex<String>,
    result_image: Vec<u8>,
    requests: AtomicUsize,
    uploaded: Mutex<Option<(HeaderMap, Vec<u8>)>>,
    job_bodies: Mutex<Vec<serde_json::Value>>,
}

impl MockTams {
    fn new() -> Self {
        Self {
            public_key: pencil2ink_crypto::parse_public_key(PUBLIC_KEY).unwrap(),
            resource_status: HttpStatus::OK,
            put_status: HttpStatus::OK,
            job_create_status: HttpStatus::OK,
            put_url: None,
            job_json: Mutex::new(r#"{"job":{"id":"J1","status":"SUBMITTED"}}"#.to_string()),
            result_image: b"\x89PNG\r\n\x1a\nresult-bytes".to_vec(),
            requests: AtomicUsize::new(0),
            uploaded: Mutex::new(None),
            job_bodies: Mutex::new(Vec::new()),
        }
    }

    fn set_job(&self, json: &str) {
        *self.job_json.lock().unwrap() = json.to_string();
    }

    fn verify(&self, headers: &HeaderMap, method: &str, path: &str, body: &str) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|auth| pencil2ink_crypto::verify(auth, method, path, body, &self.public_key).is_ok())
            .unwrap_or(false)
    }
}

fn host(headers: &HeaderMap) -> String {
    headers["host"].to_str().unwrap().to_string()
}

async fn create_resource(
    State(mock): State<Arc<MockTams>>,
    headers: HeaderMap,
    body: String,
) -> axum::response::Response {
    mock.requests.fetch_add(1, Ordering::SeqCst);
    if !mock.verify(&headers, "POST", "/v1/resource/image", &body) {
        return (HttpStatus::UNAUTHORIZED, "bad signature").into_response();
    }
    assert_eq!(body, r#"{"expireSec":3600}"#);
    if mock.resource_status != HttpStatus::OK {
        return (mock.resource_status, "quota exceeded").into_response();
    }
    axum::Json(serde_json::json!({
        "resourceId": "R1",
        "putUrl": mock
            .put_url
            .clone()
            .unwrap_or_else(|| format!("http://{}/upload/R1", host(&headers))),
        "headers": {"x-upload-token": "tok"}
    }))
    .into_response()
}

async fn upload(
    State(mock): State<Arc<MockTams>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    mock.requests.fetch_add(1, Ordering::SeqCst);
    *mock.uploaded.lock().unwrap() = Some((headers, body.to_vec()));
    (mock.put_status, "").into_response()
}

async fn create_job(
    State(mock): State<Arc<MockTams>>,
    headers: HeaderMap,
    body: String,
) -> axum::response::Response {
    mock.requests.fetch_add(1, Ordering::SeqCst);
    if !mock.verify(&headers, "POST", "/v1/jobs", &body) {
        return (HttpStatus::UNAUTHORIZED, "bad signature").into_response();
    }
    mock.job_bodies
        .lock()
        .unwrap()
        .push(serde_json::from_str(&body).unwrap());
    if mock.job_create_status != HttpStatus::OK {
        return (mock.job_create_status, r#"{"message":"boom"}"#).into_response();
    }
    axum::Json(serde_json::json!({"job": {"id": "J1", "status": "SUBMITTED"}})).into_response()
}

async fn fetch_job(
    State(mock): State<Arc<MockTams>>,
    headers: HeaderMap,
) -> axum::response::Response {
    mock.requests.fetch_add(1, Ordering::SeqCst);
    if !mock.verify(&headers, "GET", "/v1/jobs/J1", "") {
        return (HttpStatus::UNAUTHORIZED, "bad signature").into_response();
    }
    let json = mock
        .job_json
        .lock()
        .unwrap()
        .replace("{base}", &format!("http://{}", host(&headers)));
    ([("content-type", "application/json")], json).into_response()
}

async fn result_image(State(mock): State<Arc<MockTams>>) -> Vec<u8> {
    mock.requests.fetch_add(1, Ordering::SeqCst);
    mock.result_image.clone()
}

async fn start_mock_tams(mock: Arc<MockTams>) -> u16 {
    let app = axum::Router::new()
        .route("/v1/resource/image", post(create_resource))
        .route("/upload/R1", put(upload))
        .route("/v1/jobs", post(create_job))
        .route("/v1/jobs/J1", get(fetch_job))
        .route("/images/out.png", get(result_image))
        .route(
            "/images/missing.png",
            get(|| async { (HttpStatus::NOT_FOUND, "no such object") }),
        )
        .with_state(mock);
    start_mock_server(app).await
}

fn relay_for(port: u16, registry: Arc<JobRegistry>) -> Relay {
    let config = test_config(&format!("http://127.0.0.1:{port}"));
    Relay::new(
        TamsClient::new(&config, reqwest::Client::new()),
        registry,
        config.transfer_timeout,
    )
}

async fn setup(mock: MockTams) -> (Arc<MockTams>, Relay) {
    let mock = Arc::new(mock);
    let port = start_mock_tams(mock.clone()).await;
    (mock, relay_for(port, Arc::new(JobRegistry::new())))
}

/// 500×500画像の投入 → RUNNING(42%) の取得までの一連の流れ
#[tokio::test]
async fn test_submit_then_status_running() {
    let (mock, relay) = setup(MockTams::new()).await;
    let image = encode_image(500, 500, image::ImageFormat::Png);

    let internal_id = relay.submit_job(image.clone(), 500, 500).await.unwrap();
    assert!(uuid::Uuid::parse_str(&internal_id).is_ok());
    assert_eq!(relay.registry().lookup(&internal_id).await.unwrap(), "J1");

    // PUTは事前署名URLに画像そのものを返却ヘッダ付きで送る
    let (headers, body) = mock.uploaded.lock().unwrap().take().unwrap();
    assert_eq!(body, image);
    assert_eq!(headers["x-upload-token"], "tok");
    assert!(headers.get("authorization").is_none());

    let job_bodies = mock.job_bodies.lock().unwrap().clone();
    assert_eq!(job_bodies.len(), 1);
    let stages = &job_bodies[0]["stages"];
    assert_eq!(stages[0]["inputInitialize"]["image_resource_id"], "R1");
    assert_eq!(stages[1]["diffusion"]["width"], 500);
    assert_eq!(stages[1]["diffusion"]["height"], 500);
    assert_eq!(job_bodies[0]["request_id"].as_str().unwrap().len(), 32);

    mock.set_job(r#"{"job":{"id":"J1","status":"RUNNING","runningInfo":{"progress":42}}}"#);
    let progress = relay.get_status(&internal_id).await.unwrap();
    assert_eq!(
        progress,
        JobProgress {
            job_status: "RUNNING".to_string(),
            progress: 42,
            message: "Processing...".to_string(),
        }
    );
}

/// 未登録IDではネットワーク呼び出しを行わずNotFound
#[tokio::test]
async fn test_status_unknown_id_makes_no_request() {
    let (mock, relay) = setup(MockTams::new()).await;

    let result = relay.get_status("unknown-id").await;
    assert!(matches!(result, Err(RelayError::NotFound)));

    let result = relay.download_result("unknown-id").await;
    assert!(matches!(result, Err(RelayError::NotFound)));

    assert_eq!(mock.requests.load(Ordering::SeqCst), 0);
}

/// SUCCESS時は結果画像をそのまま返す
#[tokio::test]
async fn test_download_success() {
    let (mock, relay) = setup(MockTams::new()).await;
    let internal_id = relay.registry().create("J1").await;

    mock.set_job(
        r#"{"job":{"id":"J1","status":"SUCCESS","successInfo":{"images":[{"url":"{base}/images/out.png"}]}}}"#,
    );
    let result = relay.download_result(&internal_id).await.unwrap();
    assert_eq!(result.bytes, mock.result_image);
    assert_eq!(result.media_type, "image/png");
}

#[tokio::test]
async fn test_download_not_success_states() {
    let (mock, relay) = setup(MockTams::new()).await;
    let internal_id = relay.registry().create("J1").await;

    mock.set_job(r#"{"job":{"id":"J1","status":"FAILED","failInfo":{"message":"nsfw"}}}"#);
    assert!(matches!(
        relay.download_result(&internal_id).await,
        Err(RelayError::JobFailed)
    ));

    mock.set_job(r#"{"job":{"id":"J1","status":"RUNNING"}}"#);
    assert!(matches!(
        relay.download_result(&internal_id).await,
        Err(RelayError::NotReady)
    ));

    mock.set_job(r#"{"job":{"id":"J1","status":"SUCCESS","successInfo":{"images":[]}}}"#);
    assert!(matches!(
        relay.download_result(&internal_id).await,
        Err(RelayError::MalformedResponse(_))
    ));

    mock.set_job(r#"{"job":{"id":"J1","status":"SUCCESS"}}"#);
    assert!(matches!(
        relay.download_result(&internal_id).await,
        Err(RelayError::MalformedResponse(_))
    ));

    mock.set_job(
        r#"{"job":{"id":"J1","status":"SUCCESS","successInfo":{"images":[{"url":"{base}/images/missing.png"}]}}}"#,
    );
    match relay.download_result(&internal_id).await {
        Err(RelayError::Upstream { status, body, .. }) => {
            assert_eq!(status, Some(404));
            assert_eq!(body, "no such object");
        }
        other => panic!("Upstreamを期待しました: {other:?}"),
    }
}

/// ジョブ作成が500を返した場合、レジストリには何も残らない
#[tokio::test]
async fn test_job_creation_failure_leaves_no_record() {
    let mut mock = MockTams::new();
    mock.job_create_status = HttpStatus::INTERNAL_SERVER_ERROR;
    let (_mock, relay) = setup(mock).await;

    let result = relay
        .submit_job(encode_image(500, 500, image::ImageFormat::Png), 500, 500)
        .await;
    match result {
        Err(RelayError::Upstream {
            context,
            status,
            body,
        }) => {
            assert_eq!(context, "Failed to create job");
            assert_eq!(status, Some(500));
            assert_eq!(body, r#"{"message":"boom"}"#);
        }
        other => panic!("Upstreamを期待しました: {other:?}"),
    }
    assert_eq!(relay.registry().len().await, 0);
}

#[tokio::test]
async fn test_upload_slot_failure() {
    let mut mock = MockTams::new();
    mock.resource_status = HttpStatus::FORBIDDEN;
    let (mock, relay) = setup(mock).await;

    let result = relay.submit_job(vec![1, 2, 3], 1, 1).await;
    match result {
        Err(RelayError::Upstream { context, body, .. }) => {
            assert_eq!(context, "Failed to get upload URL");
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("Upstreamを期待しました: {other:?}"),
    }
    assert!(mock.uploaded.lock().unwrap().is_none());
    assert_eq!(relay.registry().len().await, 0);
}

#[tokio::test]
async fn test_put_status_handling() {
    let mut mock = MockTams::new();
    mock.put_status = HttpStatus::NO_CONTENT;
    let (_mock, relay) = setup(mock).await;
    assert!(relay.submit_job(vec![1, 2, 3], 1, 1).await.is_ok());

    let mut mock = MockTams::new();
    mock.put_status = HttpStatus::FORBIDDEN;
    let (mock, relay) = setup(mock).await;
    match relay.submit_job(vec![1, 2, 3], 1, 1).await {
        Err(RelayError::Upstream { context, .. }) => assert_eq!(context, "Failed to upload image"),
        other => panic!("Upstreamを期待しました: {other:?}"),
    }
    assert!(mock.job_bodies.lock().unwrap().is_empty());
    assert_eq!(relay.registry().len().await, 0);
}

/// アップロード先に接続できない場合、事前署名URLはクライアントに返さない
#[tokio::test]
async fn test_put_transport_failure_hides_url() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut mock = MockTams::new();
    mock.put_url = Some(format!(
        "http://127.0.0.1:{dead_port}/bucket/R1?X-Amz-Signature=SECRETSIG"
    ));
    let (mock, relay) = setup(mock).await;

    let err = relay.submit_job(vec![1, 2, 3], 1, 1).await.unwrap_err();
    match &err {
        RelayError::Upstream {
            context,
            status,
            body,
        } => {
            assert_eq!(context, "Failed to upload image");
            assert_eq!(*status, None);
            assert!(body.is_empty());
        }
        other => panic!("Upstreamを期待しました: {other:?}"),
    }
    assert!(mock.job_bodies.lock().unwrap().is_empty());
    assert_eq!(relay.registry().len().await, 0);

    let resp = err.into_response();
    assert_eq!(resp.status(), HttpStatus::BAD_GATEWAY);
    let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["message"], "Failed to upload image: ");
    assert!(!String::from_utf8_lossy(&bytes).contains("SECRETSIG"));
}

/// 投入前に期限切れジョブが回収される
#[tokio::test]
async fn test_submit_sweeps_expired_jobs() {
    let mock = Arc::new(MockTams::new());
    let port = start_mock_tams(mock).await;
    let registry = Arc::new(JobRegistry::with_retention(Duration::from_millis(1)));
    let relay = relay_for(port, registry.clone());

    let stale = registry.create("J-stale").await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let fresh = relay.submit_job(vec![1, 2, 3], 1, 1).await.unwrap();
    assert!(matches!(registry.lookup(&stale).await, Err(RelayError::NotFound)));
    assert_eq!(registry.lookup(&fresh).await.unwrap(), "J1");
}

fn job(status: &str) -> Job {
    Job {
        id: "J1".to_string(),
        status: Some(status.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_normalize_status_table() {
    let cases = [
        ("SUBMITTED", 0, "Initializing..."),
        ("PENDING", 0, "Initializing..."),
        ("WAITING", 10, "Waiting..."),
        ("RUNNING", 50, "Processing..."),
        ("SUCCESS", 100, "Completed!"),
        ("FAILED", 0, "Processing failed"),
        ("CANCELLED", 0, "Status: CANCELLED"),
    ];
    for (status, progress, message) in cases {
        let p = normalize_status(&job(status)).unwrap();
        assert_eq!(p.job_status, status);
        assert_eq!(p.progress, progress, "{status}");
        assert_eq!(p.message, message, "{status}");
    }
}

#[test]
fn test_normalize_status_uses_provider_details() {
    let mut waiting = job("WAITING");
    waiting.waiting_info = Some(WaitingInfo {
        message: Some("Queue position 3".to_string()),
    });
    assert_eq!(normalize_status(&waiting).unwrap().message, "Queue position 3");

    let mut failed = job("FAILED");
    failed.fail_info = Some(FailInfo {
        message: Some("content rejected".to_string()),
    });
    let p = normalize_status(&failed).unwrap();
    assert_eq!((p.progress, p.message.as_str()), (0, "content rejected"));

    let mut running = job("RUNNING");
    running.running_info = Some(RunningInfo {
        progress: Some(66.6),
    });
    assert_eq!(normalize_status(&running).unwrap().progress, 67);

    running.running_info = Some(RunningInfo {
        progress: Some(250.0),
    });
    assert_eq!(normalize_status(&running).unwrap().progress, 100);

    running.running_info = Some(RunningInfo { progress: None });
    assert_eq!(normalize_status(&running).unwrap().progress, 50);
}

#[test]
fn test_normalize_status_missing_status() {
    let result = normalize_status(&Job::default());
    assert!(matches!(result, Err(RelayError::MalformedResponse(_))));
}
