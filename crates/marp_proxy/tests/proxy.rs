use marp_proxy::{ProxyServer, PORT_RANGE};
use marp_themes::LocalFileSystem;
use reqwest::header;
use reqwest::StatusCode;
use std::sync::Arc;
use url::Url;

async fn start_proxy(dir: &std::path::Path) -> ProxyServer {
    let root = Url::from_directory_path(dir).unwrap();
    ProxyServer::start(root, Arc::new(LocalFileSystem))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_serves_workspace_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("themes")).unwrap();
    std::fs::write(
        dir.path().join("themes").join("custom.css"),
        "/* @theme custom */",
    )
    .unwrap();

    let proxy = start_proxy(dir.path()).await;
    assert!(PORT_RANGE.contains(&proxy.port()));

    let response = reqwest::get(format!("{}themes/custom.css?v=2", proxy.url()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/css");
    assert_eq!(headers[header::CONTENT_LENGTH], "19");
    assert!(headers.contains_key(header::LAST_MODIFIED));
    assert_eq!(response.text().await.unwrap(), "/* @theme custom */");

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_resources_and_directories_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("images")).unwrap();

    let proxy = start_proxy(dir.path()).await;

    for path in ["missing.png", "images", "images/", ""] {
        let response = reqwest::get(format!("{}{path}", proxy.url()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "path: {path}");
    }

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_extension_is_served_as_octet_stream() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data.unknownext"), [0u8, 1, 2]).unwrap();

    let proxy = start_proxy(dir.path()).await;

    let response = reqwest::get(format!("{}data.unknownext", proxy.url()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), &[0u8, 1, 2]);

    proxy.shutdown().await.unwrap();
}
