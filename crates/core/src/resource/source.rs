use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::debug;
use url::Url;

use crate::{error::ResourceFetchError, models::Card};

/// Anything that serves card resources by relative path.
pub trait ResourceSource {
    /// Fetch the raw bytes stored at `path`.
    fn fetch(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, ResourceFetchError>> + Send;
}

/// Relative paths of the manifest and card assets within a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLayout {
    cards_dir: String,
}

impl Default for ResourceLayout {
    fn default() -> Self {
        Self::new("cards")
    }
}

impl ResourceLayout {
    /// Layout rooted at `cards_dir` (e.g. `cards`).
    pub fn new(cards_dir: impl Into<String>) -> Self {
        let cards_dir = cards_dir.into().trim_matches('/').to_string();
        Self { cards_dir }
    }

    /// Path of the catalog manifest.
    pub fn manifest_path(&self) -> String {
        self.join("index.json")
    }

    /// Path of a card's image.
    pub fn image_path(&self, card: &Card) -> String {
        self.join(&card.image_ref)
    }

    fn join(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if self.cards_dir.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.cards_dir, relative)
        }
    }
}

/// Static file server reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpSource {
    /// Create a source for `base` (a trailing slash is added when missing).
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        let mut base = base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base: Url::parse(&base)?,
        })
    }

    /// Absolute URL for a relative resource path.
    pub fn url_for(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base.join(path.trim_start_matches('/'))
    }
}

impl ResourceSource for HttpSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ResourceFetchError> {
        let url = self.url_for(path).map_err(|err| transport(path, err))?;
        debug!(%url, "fetching resource");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| transport(path, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResourceFetchError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|err| transport(path, err))?;
        Ok(bytes.to_vec())
    }
}

fn transport(path: &str, err: impl std::fmt::Display) -> ResourceFetchError {
    ResourceFetchError::Transport {
        path: path.to_string(),
        message: err.to_string(),
    }
}

/// Directory on disk laid out like the static server.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// Serve resources beneath `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the source reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceSource for DirSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ResourceFetchError> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|segment| segment == "..") {
            return Err(ResourceFetchError::NotFound {
                path: path.to_string(),
            });
        }
        let full = self.root.join(relative);
        debug!(path = %full.display(), "reading resource");
        tokio::fs::read(&full).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => ResourceFetchError::NotFound {
                path: path.to_string(),
            },
            _ => transport(path, err),
        })
    }
}

/// Source selected from configuration: a URL or a local directory.
#[derive(Debug, Clone)]
pub enum ResourceClient {
    /// Remote static server.
    Http(HttpSource),
    /// Local directory.
    Dir(DirSource),
}

impl ResourceClient {
    /// Pick HTTP for `http(s)://` bases and a directory source otherwise.
    pub fn from_base(base: &str) -> Result<Self, url::ParseError> {
        let trimmed = base.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Ok(ResourceClient::Http(HttpSource::new(trimmed)?))
        } else {
            Ok(ResourceClient::Dir(DirSource::new(trimmed)))
        }
    }

    /// Human readable location, used in status messages.
    pub fn describe(&self) -> String {
        match self {
            ResourceClient::Http(source) => source.base.to_string(),
            ResourceClient::Dir(source) => source.root.display().to_string(),
        }
    }

    /// Address of a resource for embedding in documents such as the print preview.
    pub fn locate(&self, path: &str) -> String {
        let relative = path.trim_start_matches('/');
        match self {
            ResourceClient::Http(source) => source
                .url_for(relative)
                .map(|url| url.to_string())
                .unwrap_or_else(|_| relative.to_string()),
            ResourceClient::Dir(source) => {
                let full = source.root.join(relative);
                Url::from_file_path(&full)
                    .map(|url| url.to_string())
                    .unwrap_or_else(|_| full.display().to_string())
            }
        }
    }
}

impl ResourceSource for ResourceClient {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ResourceFetchError> {
        match self {
            ResourceClient::Http(source) => source.fetch(path).await,
            ResourceClient::Dir(source) => source.fetch(path).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[test]
    fn layout_joins_cards_dir() {
        let layout = ResourceLayout::new("/cards/");
        assert_eq!(layout.manifest_path(), "cards/index.json");
        assert_eq!(ResourceLayout::new("").manifest_path(), "index.json");
    }

    #[test]
    fn http_source_resolves_relative_paths() {
        let source = HttpSource::new("http://localhost:5173/app").expect("valid base");
        let url = source.url_for("cards/index.json").expect("joined url");
        assert_eq!(url.as_str(), "http://localhost:5173/app/cards/index.json");
    }

    #[test]
    fn client_picks_source_from_base() {
        assert!(matches!(
            ResourceClient::from_base("https://example.com"),
            Ok(ResourceClient::Http(_))
        ));
        assert!(matches!(
            ResourceClient::from_base("./public"),
            Ok(ResourceClient::Dir(_))
        ));
    }

    #[test]
    fn locate_builds_embeddable_addresses() {
        let http = ResourceClient::from_base("https://example.com/dh").expect("http");
        assert_eq!(
            http.locate("/cards/origine/clank.png"),
            "https://example.com/dh/cards/origine/clank.png"
        );
        let dir = ResourceClient::from_base("/srv/public").expect("dir");
        assert_eq!(
            dir.locate("cards/origine/clank.png"),
            "file:///srv/public/cards/origine/clank.png"
        );
    }

    #[tokio::test]
    async fn dir_source_reads_and_reports_missing() {
        let temp = tempdir().expect("tempdir");
        std::fs::create_dir_all(temp.path().join("cards")).expect("mkdir");
        std::fs::write(temp.path().join("cards/a.png"), b"png").expect("write");

        let source = DirSource::new(temp.path());
        assert_eq!(source.fetch("cards/a.png").await.expect("read"), b"png");

        let err = source.fetch("cards/missing.png").await.unwrap_err();
        assert!(matches!(err, ResourceFetchError::NotFound { .. }));
        assert_eq!(err.path(), "cards/missing.png");

        let escape = source.fetch("../etc/passwd").await.unwrap_err();
        assert!(matches!(escape, ResourceFetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn http_source_returns_body_and_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dh/cards/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"[]".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dh/cards/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpSource::new(&format!("{}/dh", server.uri())).expect("valid base");
        assert_eq!(source.fetch("/cards/index.json").await.expect("body"), b"[]");

        let err = source.fetch("cards/missing.png").await.unwrap_err();
        assert!(matches!(
            err,
            ResourceFetchError::Status { ref path, status: 404 } if path == "cards/missing.png"
        ));
    }

    #[tokio::test]
    async fn http_source_reports_unreachable_server() {
        let server = MockServer::start().await;
        let base = server.uri();
        drop(server);

        let client = ResourceClient::from_base(&base).expect("http base");
        let err = client.fetch("cards/index.json").await.unwrap_err();
        assert!(matches!(err, ResourceFetchError::Transport { .. }));
        assert_eq!(err.path(), "cards/index.json");
    }
}
