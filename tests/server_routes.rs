use std::error::Error;
use std::fs;
use std::path::Path;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use sitemill::config::ConfigFile;
use sitemill::pipeline::{BuildContext, BuildMode};
use sitemill::server::{build_router, ReloadHub, ServerState};
use tower::ServiceExt;

type TestResult = Result<(), Box<dyn Error>>;

/// An already-built output tree plus a source tree holding the fonts that
/// dev sessions serve without copying.
fn write_site(root: &Path) -> std::io::Result<()> {
    let build = root.join("build");
    fs::create_dir_all(build.join("blog"))?;
    fs::create_dir_all(root.join("source/fonts"))?;

    fs::write(
        build.join("index.html"),
        "<html><body><h1>home</h1></body></html>",
    )?;
    fs::write(
        build.join("blog/index.html"),
        "<html><body>posts</body></html>",
    )?;
    fs::write(
        build.join("404.html"),
        "<html><body>custom missing page</body></html>",
    )?;
    fs::write(root.join("source/fonts/inter.woff2"), b"font bytes")?;
    Ok(())
}

fn dev_router(root: &Path) -> Result<Router, Box<dyn Error>> {
    let ctx = BuildContext::new(ConfigFile::default(), BuildMode::Development, root)?;
    let state = ServerState::new(&ctx, ReloadHub::new());
    Ok(build_router(state))
}

async fn get(router: Router, uri: &str) -> Result<Response, Box<dyn Error>> {
    let request = Request::builder().uri(uri).body(Body::empty())?;
    Ok(router.oneshot(request).await?)
}

async fn body_string(response: Response) -> Result<String, Box<dyn Error>> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[tokio::test]
async fn the_homepage_is_served_with_the_reload_client() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_site(dir.path())?;

    let response = get(dev_router(dir.path())?, "/").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/html; charset=utf-8"
    );

    let body = body_string(response).await?;
    assert!(body.contains("<h1>home</h1>"));
    assert!(body.contains("/__sitemill_ws"));

    Ok(())
}

#[tokio::test]
async fn directory_requests_fall_back_to_their_index() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_site(dir.path())?;

    let response = get(dev_router(dir.path())?, "/blog").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await?.contains("posts"));

    Ok(())
}

#[tokio::test]
async fn manifest_mounts_serve_straight_from_the_source_tree() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_site(dir.path())?;

    let response = get(dev_router(dir.path())?, "/fonts/inter.woff2").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "font/woff2"
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], b"font bytes");

    Ok(())
}

#[tokio::test]
async fn unmatched_paths_get_the_project_404_page() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_site(dir.path())?;

    let response = get(dev_router(dir.path())?, "/no/such/page").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/html; charset=utf-8"
    );

    // The page is served byte for byte, without the reload client.
    let body = body_string(response).await?;
    assert_eq!(body, "<html><body>custom missing page</body></html>");

    Ok(())
}

#[tokio::test]
async fn a_missing_404_page_falls_back_to_a_plain_status() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_site(dir.path())?;
    fs::remove_file(dir.path().join("build/404.html"))?;

    let response = get(dev_router(dir.path())?, "/no/such/page").await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn traversal_attempts_are_rejected() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_site(dir.path())?;

    let response = get(dev_router(dir.path())?, "/%2e%2e/secrets.txt").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
