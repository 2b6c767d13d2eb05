//! The directory handler (component C4): an async file read into a response
//! body, pluggable via an object-safe trait the router holds.
//!
//! Stats the resolved path first, sets 404 on absence, else reads the whole
//! file into the body. Streaming large files in chunks is out of scope for
//! this core.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use http::StatusCode;

use crate::message::{Request, Response};

#[async_trait]
pub trait DirectoryHandler: Send + Sync {
    async fn handle(&self, request: &Request, response: Response) -> Response;
}

/// The reference directory handler: serves files under a fixed root,
/// joining it with the request path.
pub struct FsDirectoryHandler {
    doc_root: PathBuf,
}

impl FsDirectoryHandler {
    pub fn new(doc_root: impl Into<PathBuf>) -> Self {
        FsDirectoryHandler {
            doc_root: doc_root.into(),
        }
    }

    fn resolve(&self, request_path: &str) -> PathBuf {
        self.doc_root.join(request_path.trim_start_matches('/'))
    }
}

#[async_trait]
impl DirectoryHandler for FsDirectoryHandler {
    async fn handle(&self, request: &Request, mut response: Response) -> Response {
        let path: &Path = &self.resolve(request.path().unwrap_or_default());

        match tokio::fs::metadata(path).await {
            Err(_) => {
                tracing::debug!(path = %path.display(), "directory handler: file not found");
                response.set_status(StatusCode::NOT_FOUND);
            }
            Ok(_) => match tokio::fs::read(path).await {
                Ok(bytes) => {
                    response.set_status(StatusCode::OK);
                    response.set_body(bytes);
                }
                Err(err) => {
                    tracing::error!(path = %path.display(), error = %err, "directory handler: read failed");
                    response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                }
            },
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_404_with_empty_body() {
        let handler = FsDirectoryHandler::new("/tmp/h2engine-directory-tests-missing");
        let request = Request::get(http::Method::GET, "/missing.txt", "http");
        let response = handler.handle(&request, Response::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn present_file_yields_200_with_content() {
        let dir = std::env::temp_dir().join("h2engine-directory-tests-present");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("hello.txt"), b"hello").await.unwrap();

        let handler = FsDirectoryHandler::new(&dir);
        let request = Request::get(http::Method::GET, "/hello.txt", "http");
        let response = handler.handle(&request, Response::new()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"hello");
    }
}
