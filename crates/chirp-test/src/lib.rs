//! Helpers for testing the timeline service.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all
//!    console output is captured by the test runner.
//!
//!  - When using [`avatar_server`], make sure the server is held until all
//!    requests to it have been made. If the server is dropped, connections to
//!    it will fail. To avoid this, assign it to a variable:
//!    `let server = avatar_server().await;`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::http::{header, StatusCode, Uri};
use axum::Router;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;
use url::Url;

pub use tempfile::TempDir;

/// A minimal but correctly-signed PNG payload served as a test avatar.
pub const PNG_AVATAR: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR test avatar";

/// A minimal but correctly-signed JPEG payload served as a test avatar.
pub const JPEG_AVATAR: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `chirp` crates
///    and mutes all other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new(
            "chirp=trace,chirp_cache=trace,chirp_service=trace",
        ))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Creates a temporary directory.
///
/// The directory is deleted when the [`TempDir`] instance is dropped. Use it
/// as a guard to automatically clean up after tests.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}

/// Returns the absolute path to the given fixture.
///
/// Fixtures are located in the `tests/fixtures` directory, located from the
/// workspace root.
///
/// # Panics
///
/// Panics if the fixture path does not exist on the file system.
pub fn fixture(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    let mut full_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    full_path.pop(); // to /crates/
    full_path.pop(); // to /
    full_path.push("./tests/fixtures/");
    full_path.push(path);

    assert!(full_path.exists(), "'{}' does not exist", path.display());

    full_path
}

/// Returns the contents of a fixture.
///
/// # Panics
///
/// Panics if the fixture does not exist or cannot be read.
pub fn read_fixture(path: impl AsRef<Path>) -> Vec<u8> {
    std::fs::read(fixture(path)).unwrap()
}

/// A test server that binds to a random port and serves a web app.
///
/// This server requires a `tokio` runtime and is supposed to be run in a
/// `tokio::test`. It automatically stops serving when dropped.
#[derive(Debug)]
pub struct Server {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
}

impl Server {
    /// Creates a new test server serving the given router.
    pub async fn with_router(router: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let socket = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { handle, socket }
    }

    /// Returns the socket address that this server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the port that this server listens on.
    pub fn port(&self) -> u16 {
        self.addr().port()
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.port(), path)
            .parse()
            .unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// An avatar server serving fixed image payloads, counting hits per path.
///
/// Routes:
///  - `/png` and `/jpeg` serve valid image payloads,
///  - `/garbage` serves bytes that are not an image,
///  - everything else is a 404.
#[derive(Debug)]
pub struct AvatarServer {
    server: Server,
    hits: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl AvatarServer {
    /// Returns a full URL pointing to the given path on this server.
    pub fn url(&self, path: &str) -> Url {
        self.server.url(path)
    }

    /// The number of requests this server received for the given path.
    pub fn hits(&self, path: &str) -> usize {
        *self.hits.lock().unwrap().get(path).unwrap_or(&0)
    }
}

/// Spawns an [`AvatarServer`] on an ephemeral port.
pub async fn avatar_server() -> AvatarServer {
    let hits = Arc::new(Mutex::new(BTreeMap::new()));

    let router = {
        let hits = Arc::clone(&hits);
        Router::new().fallback(move |uri: Uri| {
            let hits = Arc::clone(&hits);
            async move {
                let path = uri.path().to_owned();
                *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

                let (status, content_type, body): (StatusCode, &str, &[u8]) = match path.as_str() {
                    "/png" => (StatusCode::OK, "image/png", PNG_AVATAR),
                    "/jpeg" => (StatusCode::OK, "image/jpeg", JPEG_AVATAR),
                    "/garbage" => (StatusCode::OK, "text/plain", b"not an image"),
                    _ => (StatusCode::NOT_FOUND, "text/plain", b"not found"),
                };

                (
                    status,
                    [(header::CONTENT_TYPE, content_type)],
                    body.to_vec(),
                )
            }
        })
    };

    AvatarServer {
        server: Server::with_router(router).await,
        hits,
    }
}
