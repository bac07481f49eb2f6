use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use http_body_util::BodyExt;
use split_core::bucket_mem::MemBucket;
use split_core::catalog::MemCatalog;
use split_core::{BucketBackend, Buckets, FileId, ReadMode, SplitStore, StoreConfig, open_store};
use split_http::{AppState, router};
use tempfile::tempdir;
use tower::ServiceExt;

const BOUNDARY: &str = "split-test-boundary";

async fn mem_app(mode: ReadMode) -> Router {
    let mut cfg = StoreConfig::in_memory(3);
    cfg.read_mode = mode;
    let store = open_store(cfg).await.unwrap();
    router(AppState::new(store), 1024 * 1024)
}

/// Streaming app over buckets the test can reach into.
fn streaming_app() -> (Router, Arc<SplitStore>, Vec<Arc<MemBucket>>) {
    let mems: Vec<Arc<MemBucket>> = (0..3).map(|i| Arc::new(MemBucket::new(i))).collect();
    let buckets = Buckets::new(
        mems.iter()
            .map(|m| m.clone() as Arc<dyn BucketBackend>)
            .collect(),
    );
    let mut cfg = StoreConfig::in_memory(3);
    cfg.read_mode = ReadMode::Streaming;
    let store = SplitStore::new(cfg, buckets, Arc::new(MemCatalog::new(3))).unwrap();
    let state = AppState::new(store);
    let store = state.store.clone();
    (router(state, 1024 * 1024), store, mems)
}

fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, file_name, data)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(resp: Response) -> Bytes {
    resp.into_body().collect().await.unwrap().to_bytes()
}

async fn body_json(resp: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

#[tokio::test]
async fn upload_list_info_download() {
    for mode in [ReadMode::Buffered, ReadMode::Streaming] {
        let app = mem_app(mode).await;

        let resp = app
            .clone()
            .oneshot(upload_request("file", "abc.txt", b"ABCDEFGHI"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let up = body_json(resp).await;
        assert_eq!(up["file_name"], "abc.txt");
        assert_eq!(up["size"], 9);
        let id = up["id"].as_i64().unwrap();

        let resp = app.clone().oneshot(get("/files")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let list = body_json(resp).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["file_name"], "abc.txt");

        let resp = app
            .clone()
            .oneshot(get(&format!("/files/{id}")))
            .await
            .unwrap();
        let info = body_json(resp).await;
        let chunks = info["chunks"].as_array().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1]["start"], 3);
        assert_eq!(chunks[1]["end"], 6);

        let resp = app
            .clone()
            .oneshot(get(&format!("/download/{id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers().clone();
        assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(headers[header::CONTENT_LENGTH], "9");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"abc.txt\""
        );
        assert_eq!(&body_bytes(resp).await[..], b"ABCDEFGHI");
    }
}

#[tokio::test]
async fn empty_file_round_trips() {
    let app = mem_app(ReadMode::Buffered).await;
    let resp = app
        .clone()
        .oneshot(upload_request("file", "empty.bin", b""))
        .await
        .unwrap();
    let id = body_json(resp).await["id"].as_i64().unwrap();

    let resp = app
        .oneshot(get(&format!("/download/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn missing_file_field_is_bad_request() {
    let app = mem_app(ReadMode::Buffered).await;
    let resp = app
        .clone()
        .oneshot(upload_request("attachment", "x.txt", b"data"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(resp).await["error"].is_string());

    let resp = app.oneshot(get("/files")).await.unwrap();
    assert_eq!(body_json(resp).await, serde_json::json!([]));
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let app = mem_app(ReadMode::Buffered).await;
    for uri in ["/download/42", "/files/42"] {
        let resp = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
    for uri in ["/download/abc", "/files/abc"] {
        let resp = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn fs_backend_over_http() {
    let dir = tempdir().unwrap();
    let cfg = StoreConfig {
        fan_out: 3,
        data_dir: dir.path().to_path_buf(),
        catalog_path: dir.path().join("split.db").to_string_lossy().into_owned(),
        ..Default::default()
    };
    let app = router(AppState::new(open_store(cfg).await.unwrap()), 1024 * 1024);

    let payload: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
    let resp = app
        .clone()
        .oneshot(upload_request("file", "ramp.bin", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let id = body_json(resp).await["id"].as_i64().unwrap();

    for i in 1..=3 {
        let entries = std::fs::read_dir(dir.path().join(format!("bucket{i}")))
            .unwrap()
            .count();
        assert_eq!(entries, 1, "bucket{i}");
    }

    let resp = app
        .oneshot(get(&format!("/download/{id}")))
        .await
        .unwrap();
    assert_eq!(&body_bytes(resp).await[..], &payload[..]);
}

async fn upload_nine_bytes(app: &Router) -> i64 {
    let resp = app
        .clone()
        .oneshot(upload_request("file", "abc.txt", b"ABCDEFGHI"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn streaming_download_with_first_chunk_gone_is_server_error() {
    let (app, store, mems) = streaming_app();
    let id = upload_nine_bytes(&app).await;
    let rec = store.record(FileId(id)).await.unwrap();
    mems[0].evict(&rec.chunk_ids[0]).unwrap();

    let resp = app
        .oneshot(get(&format!("/download/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(resp).await["error"].is_string());
}

#[tokio::test]
async fn streaming_download_with_later_chunk_gone_breaks_the_body() {
    let (app, store, mems) = streaming_app();
    let id = upload_nine_bytes(&app).await;
    let rec = store.record(FileId(id)).await.unwrap();
    mems[2].evict(&rec.chunk_ids[2]).unwrap();

    let resp = app
        .oneshot(get(&format!("/download/{id}")))
        .await
        .unwrap();
    // headers are already out by the time bucket 2 is read
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.into_body().collect().await.is_err());
}

#[tokio::test]
async fn wrong_method_is_rejected() {
    let app = mem_app(ReadMode::Buffered).await;
    let req = Request::builder()
        .method(Method::GET)
        .uri("/upload")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/files")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}
