//! Mock Maven repository served over loopback HTTP for tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::downloader::DownloadDescriptor;

pub const SLOW: Duration = Duration::from_secs(10);

#[derive(Default)]
struct Counters {
    heads: AtomicUsize,
    gets: AtomicUsize,
}

impl Counters {
    fn record(&self, method: &Method) {
        if method == Method::HEAD {
            self.heads.fetch_add(1, Ordering::SeqCst);
        } else {
            self.gets.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct MockRepo {
    addr: SocketAddr,
    counters: Arc<Counters>,
    _handle: JoinHandle<()>,
}

impl MockRepo {
    pub async fn start() -> Self {
        let counters = Arc::new(Counters::default());
        let app = Router::new()
            .route("/files/{name}", get(sized_file))
            .route("/stream/{name}", get(unsized_file))
            .route("/slow/{name}", get(slow_file))
            .route("/slowget/{name}", get(slow_get_file))
            .route("/maven2/org/acme/", get(group_listing))
            .route(
                "/maven2/org/acme/{artifact}/maven-metadata.xml",
                get(artifact_metadata),
            )
            .route("/maven2/org/acme/{artifact}/{version}/{file}", get(artifact_file))
            .route("/maven2/org/hostile/", get(hostile_listing))
            .route(
                "/maven2/org/hostile/{artifact}/maven-metadata.xml",
                get(hostile_metadata),
            )
            .with_state(Arc::clone(&counters));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockRepo {
            addr,
            counters,
            _handle: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    pub fn head_count(&self) -> usize {
        self.counters.heads.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.counters.gets.load(Ordering::SeqCst)
    }
}

pub fn descriptor(url: &str) -> DownloadDescriptor {
    DownloadDescriptor::from_url(url).unwrap()
}

pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn file_size(name: &str) -> Option<usize> {
    match name {
        "a.jar" => Some(100),
        "b.jar" => Some(200),
        "c.jar" => Some(300),
        "empty.jar" => Some(0),
        _ => None,
    }
}

async fn sized_file(
    State(counters): State<Arc<Counters>>,
    method: Method,
    Path(name): Path<String>,
) -> Response {
    counters.record(&method);
    match file_size(&name) {
        Some(len) => content(len).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn unsized_file(State(counters): State<Arc<Counters>>, method: Method) -> Response {
    counters.record(&method);
    let chunks = (0..3).map(|_| Ok::<_, std::io::Error>(content(1000)));
    Body::from_stream(futures::stream::iter(chunks)).into_response()
}

async fn slow_file(State(counters): State<Arc<Counters>>, method: Method) -> Response {
    counters.record(&method);
    tokio::time::sleep(SLOW).await;
    content(100).into_response()
}

async fn slow_get_file(State(counters): State<Arc<Counters>>, method: Method) -> Response {
    counters.record(&method);
    if method != Method::HEAD {
        tokio::time::sleep(SLOW).await;
    }
    content(100).into_response()
}

async fn group_listing() -> impl IntoResponse {
    axum::response::Html(
        r#"<html><body><h1>Index of /maven2/org/acme/</h1>
<a href="../">../</a>
<a href="../">Parent Directory</a>
<a href="core/">core/</a>
<a href="web/">web/</a>
<a href="broken/">broken/</a>
<a href="tools/">tools/</a>
<a href="maven-metadata.xml">maven-metadata.xml</a>
</body></html>"#,
    )
}

async fn hostile_listing() -> impl IntoResponse {
    axum::response::Html(
        r#"<pre><a href="../evil/">../evil/</a>
<a href=".hidden/">.hidden/</a>
<a href="good/">good/</a>
<a href="slashy/">slashy/</a></pre>"#,
    )
}

/// Metadata for the hostile group. Any id that reaches this handler is
/// answered, so escaping ids are only dropped if the listing scrape drops them.
async fn hostile_metadata(Path(artifact): Path<String>) -> Response {
    match artifact.as_str() {
        "slashy" => metadata_xml("slashy", "1.0/../../x", "", &[]).into_response(),
        other => metadata_xml(other, "1.0", "1.0", &["1.0"]).into_response(),
    }
}

pub fn metadata_xml(artifact: &str, latest: &str, release: &str, versions: &[&str]) -> String {
    let versions = versions
        .iter()
        .map(|v| format!("<version>{}</version>", v))
        .collect::<String>();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.acme</groupId>
  <artifactId>{artifact}</artifactId>
  <versioning>
    <latest>{latest}</latest>
    <release>{release}</release>
    <versions>{versions}</versions>
    <lastUpdated>20240101120000</lastUpdated>
  </versioning>
</metadata>"#
    )
}

async fn artifact_metadata(Path(artifact): Path<String>) -> Response {
    match artifact.as_str() {
        "core" => metadata_xml("core", "1.2.0", "1.2.0", &["1.0.0", "1.2.0"]).into_response(),
        "web" => metadata_xml("web", "", "2.0.1", &["2.0.0", "2.0.1"]).into_response(),
        "tools" => metadata_xml("tools", "", "", &[]).into_response(),
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn artifact_file(
    State(counters): State<Arc<Counters>>,
    method: Method,
    Path((artifact, version, file)): Path<(String, String, String)>,
) -> Response {
    counters.record(&method);
    if file == format!("{}-{}.jar", artifact, version) {
        content(64).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}
