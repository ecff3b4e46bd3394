//! 集成测试 - HTTP 后端线路格式
//!
//! 用 mockito 模拟服务端，验证请求路径、头部和响应解析。

use dropshelf_core::action::{AliasKind, ExtendTarget};
use dropshelf_core::{Backend, ClientError, HttpBackend, NoProgress, UploadProgress, UploadSource};
use mockito::Matcher;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

const RECORD_JSON: &str = r#"{
    "success": true,
    "admin": "secret-admin",
    "name": "a b.txt",
    "size": { "bytes": 5, "readable": "5 B" },
    "alias": { "short": "x1", "long": "long-x1" },
    "link": { "short": "http://drop.local/x1", "long": "http://drop.local/long-x1" },
    "expiration": {
        "current": {
            "date": { "timestamp": 1900000000, "readable": "2030-03-17" },
            "duration": { "readable": "in 1 hour" }
        },
        "allowed": { "seconds": 86400 }
    }
}"#;

struct LastProgress(AtomicU64);

impl UploadProgress for LastProgress {
    fn on_progress(&self, sent: u64, _total: u64) {
        self.0.store(sent, Ordering::SeqCst);
    }
}

async fn source(dir: &tempfile::TempDir) -> UploadSource {
    let path = dir.path().join("a b.txt");
    tokio::fs::write(&path, b"hello").await.unwrap();
    UploadSource::open(&path).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_upload_sends_headers_and_decodes_record() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("x-filename", "a%20b.txt")
        .match_header("content-type", "text/plain")
        .match_header("accept", "application/json")
        .match_header("cookie", "session=tok")
        .match_body("hello")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(RECORD_JSON)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let backend = HttpBackend::new(&server.url())
        .unwrap()
        .with_session_token(Some("tok".to_string()));
    let progress = Arc::new(LastProgress(AtomicU64::new(0)));
    let record = backend
        .upload(&source(&dir).await, progress.clone())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(record.name, "a b.txt");
    assert_eq!(record.admin_token, "secret-admin");
    assert_eq!(record.alias.short, "x1");
    assert_eq!(record.expiration.allowed.seconds, 86400);
    assert_eq!(record.expiration.current.duration.seconds, None);
    assert_eq!(progress.0.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_upload_error_carries_server_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(413)
        .with_body(r#"{"error": "file too large"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let backend = HttpBackend::new(&server.url()).unwrap();
    let err = backend
        .upload(&source(&dir).await, Arc::new(NoProgress))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Api { status: 413, .. }));
    assert_eq!(err.server_message(), Some("file too large"));
}

#[tokio::test]
async fn test_upload_requires_created_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(200)
        .with_body(RECORD_JSON)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let backend = HttpBackend::new(&server.url()).unwrap();
    let err = backend
        .upload(&source(&dir).await, Arc::new(NoProgress))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 200, .. }));
}

#[tokio::test]
async fn test_error_without_json_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("DELETE", "/gone")
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("DELETE", "/plain")
        .with_status(500)
        .with_body("database is locked")
        .create_async()
        .await;

    let backend = HttpBackend::new(&server.url()).unwrap();
    let err = backend.revoke("gone", "t").await.unwrap_err();
    assert_eq!(err.server_message(), Some("not found"));
    let err = backend.revoke("plain", "t").await.unwrap_err();
    assert_eq!(err.server_message(), Some("database is locked"));
}

#[tokio::test]
async fn test_check_validity_batches_aliases() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/valid/a+b+c")
        .with_status(200)
        .with_body(r#"{"valid": [true, false, true]}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new(&server.url()).unwrap();
    let aliases = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let valid = backend.check_validity(&aliases).await.unwrap();

    mock.assert_async().await;
    assert_eq!(valid, vec![true, false, true]);
}

#[tokio::test]
async fn test_regenerate_alias_paths_and_auth() {
    let mut server = mockito::Server::new_async().await;
    let short = server
        .mock("PATCH", "/x1/alias/short")
        .match_header("authorization", "secret-admin")
        .match_header("x-authorization", "secret-admin")
        .with_status(200)
        .with_body(r#"{"alias": {"short": "y2"}, "link": {"short": "http://drop.local/y2"}}"#)
        .create_async()
        .await;
    let both = server
        .mock("PATCH", "/y2/alias")
        .match_header("authorization", "secret-admin")
        .with_status(200)
        .with_body(
            r#"{"alias": {"short": "z3", "long": "long-z3"},
                "link": {"short": "http://drop.local/z3", "long": "http://drop.local/long-z3"}}"#,
        )
        .create_async()
        .await;

    let backend = HttpBackend::new(&format!("{}/", server.url())).unwrap();
    let update = backend
        .regenerate_alias("x1", "secret-admin", AliasKind::Short)
        .await
        .unwrap();
    assert_eq!(update.alias.short.as_deref(), Some("y2"));
    assert_eq!(update.alias.long, None);

    let update = backend
        .regenerate_alias("y2", "secret-admin", AliasKind::Both)
        .await
        .unwrap();
    assert_eq!(update.link.long.as_deref(), Some("http://drop.local/long-z3"));

    short.assert_async().await;
    both.assert_async().await;
}

#[tokio::test]
async fn test_extend_and_downloads() {
    let mut server = mockito::Server::new_async().await;
    let extend = server
        .mock("PATCH", "/x1/expiration/3600")
        .match_header("authorization", "k")
        .with_status(200)
        .with_body(
            r#"{"date": {"timestamp": 1900003600, "readable": "later"},
                "duration": {"readable": "in 1 hour", "seconds": 3600}}"#,
        )
        .create_async()
        .await;
    let downloads = server
        .mock("PATCH", "/x1/downloads/0")
        .match_header("x-authorization", "k")
        .with_status(200)
        .create_async()
        .await;

    let backend = HttpBackend::new(&server.url()).unwrap();
    let current = backend
        .extend_expiration("x1", "k", ExtendTarget::Seconds(3600))
        .await
        .unwrap();
    assert_eq!(current.date.timestamp, 1_900_003_600);
    assert_eq!(current.duration.seconds, Some(3600));
    backend.set_downloads("x1", "k", 0).await.unwrap();

    extend.assert_async().await;
    downloads.assert_async().await;
}

#[tokio::test]
async fn test_auth_and_login() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/auth")
        .with_status(200)
        .with_body(r#"{"required": true}"#)
        .create_async()
        .await;
    let login = server
        .mock("POST", "/auth")
        .match_body(Matcher::Json(serde_json::json!({
            "username": "drie",
            "password": "hunter2"
        })))
        .with_status(201)
        .with_body(r#"{"token": "session-token"}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new(&server.url()).unwrap();
    assert!(backend.auth_required().await.unwrap());
    let token = backend.login("drie", "hunter2").await.unwrap();
    assert_eq!(token, "session-token");
    login.assert_async().await;
}

#[tokio::test]
async fn test_auth_check_sends_stored_session() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/auth")
        .match_header("cookie", "session=stale")
        .with_status(200)
        .with_body(r#"{"required": true}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new(&server.url())
        .unwrap()
        .with_session_token(Some("stale".to_string()));
    assert!(backend.auth_required().await.unwrap());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_download_streams_to_file() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/x1")
        .match_header("cookie", "session=tok")
        .with_status(200)
        .with_body("file contents")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("a b.txt");
    let backend = HttpBackend::new(&server.url())
        .unwrap()
        .with_session_token(Some("tok".to_string()));
    let progress = Arc::new(LastProgress(AtomicU64::new(0)));
    let size = backend.download("x1", &dest, progress.clone()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(size, 13);
    assert_eq!(progress.0.load(Ordering::SeqCst), 13);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "file contents");
}

#[tokio::test]
async fn test_failed_download_leaves_no_file() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/gone")
        .with_status(404)
        .with_body(r#"{"error": "this file does not exist"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("gone.txt");
    let backend = HttpBackend::new(&server.url()).unwrap();
    let err = backend
        .download("gone", &dest, Arc::new(NoProgress))
        .await
        .unwrap_err();
    assert_eq!(err.server_message(), Some("this file does not exist"));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_transport_error_is_distinguished() {
    // 端口 1 上没有服务
    let backend = HttpBackend::new("http://127.0.0.1:1").unwrap();
    let err = backend
        .check_validity(&["a".to_string()])
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.server_message(), None);
}
