//! Static file upstream.
//!
//! Serves configuration documents from a directory. Files are labelled by
//! extension, so `.yaml` documents reach the gate as `application/x-yaml`
//! and become eligible for transpilation.
//!
//! # Security
//!
//! - Path traversal is rejected (`..` components, or a resolved path that
//!   escapes the root through a symlink)
//! - Hidden files (names starting with `.`) are not served unless enabled

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Method, StatusCode};
use kindle_core::{UpstreamError, DEFAULT_SOURCE_MEDIA_TYPE, IGNITION_MEDIA_TYPE};
use kindle_middleware::{BoxFuture, Request, ResponseWriter, Upstream};
use thiserror::Error;

/// Errors that can occur when serving static files.
#[derive(Debug, Error)]
pub enum StaticFileError {
    /// The requested file was not found.
    #[error("File not found: {0}")]
    NotFound(String),

    /// The path is forbidden.
    #[error("Forbidden path: {0}")]
    Forbidden(String),

    /// Only GET and HEAD are served.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// I/O error while reading a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StaticFileError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StaticFileError> for UpstreamError {
    fn from(err: StaticFileError) -> Self {
        match err {
            StaticFileError::IoError(source) => Self::internal("reading file failed", source),
            other => Self::new(other.status_code(), other.to_string()),
        }
    }
}

/// Static file server.
///
/// # Example
///
/// ```rust
/// use kindle_server::static_files::StaticFiles;
///
/// let files = StaticFiles::new("/srv/configs")
///     .index("config.yaml")
///     .cache_control("no-cache")
///     .mime_type("clc", "application/x-yaml");
/// assert_eq!(files.index_file(), Some("config.yaml"));
/// ```
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index_file: Option<String>,
    cache_control: Option<String>,
    serve_hidden: bool,
    mime_types: HashMap<String, String>,
}

impl StaticFiles {
    /// Creates a static file server for the given root directory.
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            index_file: None,
            cache_control: None,
            serve_hidden: false,
            mime_types: HashMap::new(),
        }
    }

    /// Sets the file to serve for directory requests.
    #[must_use]
    pub fn index<S: Into<String>>(mut self, index: S) -> Self {
        self.index_file = Some(index.into());
        self
    }

    /// Sets the `Cache-Control` header value for responses.
    #[must_use]
    pub fn cache_control<S: Into<String>>(mut self, value: S) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    /// Enables or disables serving hidden files.
    #[must_use]
    pub fn serve_hidden(mut self, enabled: bool) -> Self {
        self.serve_hidden = enabled;
        self
    }

    /// Adds a custom MIME type mapping for an extension (without the dot).
    #[must_use]
    pub fn mime_type<S1: Into<String>, S2: Into<String>>(
        mut self,
        extension: S1,
        mime_type: S2,
    ) -> Self {
        self.mime_types
            .insert(extension.into().to_lowercase(), mime_type.into());
        self
    }

    /// Returns the root directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the configured index file.
    #[must_use]
    pub fn index_file(&self) -> Option<&str> {
        self.index_file.as_deref()
    }

    /// Maps a request to the file it names.
    ///
    /// The path is percent-decoded first. Directories resolve to the index
    /// file when one is configured.
    pub fn locate(&self, request_path: &str, method: &Method) -> Result<PathBuf, StaticFileError> {
        if method != Method::GET && method != Method::HEAD {
            return Err(StaticFileError::MethodNotAllowed);
        }

        let decoded = urlencoding::decode(request_path)
            .map_err(|_| StaticFileError::Forbidden("path is not valid UTF-8".to_string()))?;
        let file_path = self.resolve_path(&decoded)?;

        if file_path.is_dir() {
            if let Some(index) = &self.index_file {
                let index_path = file_path.join(index);
                if index_path.is_file() {
                    return Ok(index_path);
                }
            }
            return Err(StaticFileError::NotFound(request_path.to_string()));
        }

        Ok(file_path)
    }

    fn resolve_path(&self, request_path: &str) -> Result<PathBuf, StaticFileError> {
        let path = request_path.trim_start_matches('/');

        for component in Path::new(path).components() {
            match component {
                Component::ParentDir => {
                    return Err(StaticFileError::Forbidden(
                        "directory traversal not allowed".to_string(),
                    ));
                }
                Component::Normal(name) => {
                    let hidden = name.to_str().is_some_and(|n| n.starts_with('.'));
                    if hidden && !self.serve_hidden {
                        // hidden files are indistinguishable from missing ones
                        return Err(StaticFileError::NotFound(request_path.to_string()));
                    }
                }
                _ => {}
            }
        }

        let canonical = self
            .root
            .join(path)
            .canonicalize()
            .map_err(|_| StaticFileError::NotFound(request_path.to_string()))?;
        let canonical_root = self.root.canonicalize()?;

        if !canonical.starts_with(&canonical_root) {
            return Err(StaticFileError::Forbidden(
                "path escapes root directory".to_string(),
            ));
        }

        Ok(canonical)
    }

    /// Returns the content type for a file based on its extension.
    #[must_use]
    pub fn detect_mime_type(&self, path: &Path) -> String {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if let Some(custom) = self.mime_types.get(&extension) {
            return custom.clone();
        }

        match extension.as_str() {
            "yaml" | "yml" => DEFAULT_SOURCE_MEDIA_TYPE,
            "ign" => IGNITION_MEDIA_TYPE,
            "json" => "application/json",
            "txt" => "text/plain; charset=utf-8",
            "html" | "htm" => "text/html; charset=utf-8",
            _ => "application/octet-stream",
        }
        .to_string()
    }

    async fn write_file(
        &self,
        sink: &mut dyn ResponseWriter,
        request: &Request,
    ) -> Result<(), StaticFileError> {
        let path = self.locate(request.uri().path(), request.method())?;
        let contents = Bytes::from(tokio::fs::read(&path).await?);
        let mime_type = self.detect_mime_type(&path);

        tracing::trace!(path = %path.display(), bytes = contents.len(), "serving file");

        let headers = sink.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&mime_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(contents.len()));
        if let Some(cache_control) = &self.cache_control {
            if let Ok(value) = HeaderValue::from_str(cache_control) {
                headers.insert(CACHE_CONTROL, value);
            }
        }

        sink.write_header(StatusCode::OK);
        // HEAD is answered like GET; the connection drops the body
        sink.write_all(&contents)?;
        Ok(())
    }
}

impl Upstream for StaticFiles {
    fn serve<'a>(
        &'a self,
        sink: &'a mut dyn ResponseWriter,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<(), UpstreamError>> {
        Box::pin(async move {
            self.write_file(sink, request)
                .await
                .map_err(UpstreamError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use kindle_middleware::ResponseRecorder;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("node.yaml"), "passwd: {}\n").unwrap();
        fs::write(dir.path().join("node.ign"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join(".secret.yaml"), "hidden").unwrap();
        fs::write(dir.path().join("space name.yml"), "a: 1\n").unwrap();

        let subdir = dir.path().join("cluster");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("config.yaml"), "systemd: {}\n").unwrap();

        dir
    }

    fn request(method: Method, path: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn serve(
        files: &StaticFiles,
        method: Method,
        path: &str,
    ) -> (Result<(), UpstreamError>, ResponseRecorder) {
        let mut sink = ResponseRecorder::new();
        let request = request(method, path);
        let result = tokio_test::block_on(files.serve(&mut sink, &request));
        (result, sink)
    }

    #[test]
    fn test_serve_yaml_file() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path());

        let (result, sink) = serve(&files, Method::GET, "/node.yaml");

        result.unwrap();
        assert_eq!(sink.status(), StatusCode::OK);
        assert_eq!(sink.headers()[CONTENT_TYPE], "application/x-yaml");
        assert_eq!(sink.headers()[CONTENT_LENGTH], "11");
        assert_eq!(sink.body(), b"passwd: {}\n");
    }

    #[test]
    fn test_percent_encoded_path() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path());

        let (result, sink) = serve(&files, Method::GET, "/space%20name.yml");

        result.unwrap();
        assert_eq!(sink.body(), b"a: 1\n");
    }

    #[test]
    fn test_directory_with_index() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).index("config.yaml");

        let (result, sink) = serve(&files, Method::GET, "/cluster/");

        result.unwrap();
        assert_eq!(sink.body(), b"systemd: {}\n");
    }

    #[test]
    fn test_directory_without_index_is_not_found() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path());

        let (result, _) = serve(&files, Method::GET, "/cluster");
        assert_eq!(result.unwrap_err().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_directory_traversal_blocked() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path().join("cluster"));

        let (result, sink) = serve(&files, Method::GET, "/../node.yaml");
        assert_eq!(result.unwrap_err().status(), StatusCode::FORBIDDEN);
        assert!(sink.body().is_empty());

        let (encoded, _) = serve(&files, Method::GET, "/%2E%2E/node.yaml");
        assert_eq!(encoded.unwrap_err().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_hidden_files() {
        let dir = create_test_dir();

        let (hidden, _) = serve(&StaticFiles::new(dir.path()), Method::GET, "/.secret.yaml");
        assert_eq!(hidden.unwrap_err().status(), StatusCode::NOT_FOUND);

        let files = StaticFiles::new(dir.path()).serve_hidden(true);
        let (shown, sink) = serve(&files, Method::GET, "/.secret.yaml");
        shown.unwrap();
        assert_eq!(sink.body(), b"hidden");
    }

    #[test]
    fn test_file_not_found() {
        let dir = create_test_dir();
        let (result, _) = serve(&StaticFiles::new(dir.path()), Method::GET, "/missing.yaml");
        assert_eq!(result.unwrap_err().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_method_not_allowed() {
        let dir = create_test_dir();
        let (result, _) = serve(&StaticFiles::new(dir.path()), Method::POST, "/node.yaml");
        assert_eq!(result.unwrap_err().status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_cache_control_header() {
        let dir = create_test_dir();
        let files = StaticFiles::new(dir.path()).cache_control("no-cache");

        let (result, sink) = serve(&files, Method::HEAD, "/node.ign");

        result.unwrap();
        assert_eq!(sink.headers()[CACHE_CONTROL], "no-cache");
        assert_eq!(sink.headers()[CONTENT_TYPE], IGNITION_MEDIA_TYPE);
    }

    #[test]
    fn test_mime_type_detection() {
        let files = StaticFiles::new(".").mime_type("CLC", "application/x-yaml");

        assert_eq!(files.detect_mime_type(Path::new("a.yml")), "application/x-yaml");
        assert_eq!(files.detect_mime_type(Path::new("a.YAML")), "application/x-yaml");
        assert_eq!(files.detect_mime_type(Path::new("a.json")), "application/json");
        assert_eq!(files.detect_mime_type(Path::new("a.clc")), "application/x-yaml");
        assert_eq!(
            files.detect_mime_type(Path::new("a.bin")),
            "application/octet-stream"
        );
        assert_eq!(
            files.detect_mime_type(Path::new("Makefile")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            StaticFileError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            StaticFileError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        let upstream: UpstreamError =
            StaticFileError::IoError(std::io::Error::other("disk")).into();
        assert_eq!(upstream.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
