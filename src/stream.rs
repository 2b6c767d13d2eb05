//! Per-stream object (component C3): request accumulator, response builder,
//! and handler dispatch.

use std::sync::Arc;

use http::StatusCode;

use crate::frame::StreamId;
use crate::message::{Request, Response};
use crate::router::Router;

pub struct Stream {
    id: StreamId,
    request: Request,
    response: Response,
    router: Arc<Router>,
    is_promised: bool,
}

impl Stream {
    pub fn new(id: StreamId, request: Request, router: Arc<Router>, is_promised: bool) -> Self {
        Stream {
            id,
            request,
            response: Response::new(),
            router,
            is_promised,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Forwards one header name/value pair into the request, for streams
    /// built up incrementally from a sequence of header callbacks.
    pub fn update_request(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.request.add_header(name, value);
    }

    /// True iff this stream's request path equals the router's registered
    /// push-trigger path.
    pub fn push(&self) -> bool {
        match (self.request.path(), self.router.get_push_path()) {
            (Some(path), Some(push_path)) => path == push_path,
            _ => false,
        }
    }

    /// Chooses and invokes the handler for this stream: the directory
    /// handler (or a synthesized 404) for an unmatched non-promised path,
    /// the push handler for a promised stream, otherwise the routed path
    /// handler.
    pub async fn eat_request(&mut self) {
        let response = std::mem::replace(&mut self.response, Response::new());

        let outcome = if self.is_promised {
            let handler = self.router.handle_push();
            match handler {
                Some(handler) => handler(self.request.clone(), response).await,
                None => {
                    tracing::warn!(stream_id = %self.id, "promised stream with no push handler registered");
                    Ok((self.request.clone(), not_found()))
                }
            }
        } else if let Some(handler) = self.router.handle(self.request.path().unwrap_or_default()) {
            handler(self.request.clone(), response).await
        } else if let Some(directory_handler) = self.router.directory_handler() {
            let response = directory_handler.handle(&self.request, response).await;
            Ok((self.request.clone(), response))
        } else {
            tracing::warn!(stream_id = %self.id, path = self.request.path(), "no route and no directory handler; synthesizing 404");
            Ok((self.request.clone(), not_found()))
        };

        match outcome {
            Ok((request, response)) => {
                self.request = request;
                self.response = response;
            }
            Err(err) => {
                tracing::error!(stream_id = %self.id, error = %err, "handler failed");
                self.response = internal_error();
            }
        }
    }

    /// Finalizes this stream's own response for submission: installs the
    /// body producer, clears any previously compiled header block, adds
    /// `:status`/`date`/`content-length`, and recompiles.
    ///
    /// PUSH_PROMISE header blocks are compiled directly from a `Pseudo` by
    /// the connection engine (see `Connection::handle_request_headers`)
    /// rather than through this method — unlike the reference
    /// implementation, this port never submits a response-shaped header
    /// block as a push-promise (see DESIGN.md).
    pub fn commit_response(&mut self) -> &[(String, String)] {
        self.response.flush_body();
        self.response.clear();

        let content_length = self.response.body().len();
        self.response.add_header("date", self.router.date().to_string());
        self.response.add_header("content-length", content_length.to_string());

        self.response.done()
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }
}

fn not_found() -> Response {
    let mut response = Response::new();
    response.set_status(StatusCode::NOT_FOUND);
    response
}

fn internal_error() -> Response {
    let mut response = Response::new();
    response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    response
}
