//! Request/response value types (component C1): header lists, pseudo-header
//! mirroring, header-block compilation, and the response body cursor the
//! flow-controlled producer reads from.

use bytes::Bytes;
use http::{Method, StatusCode};

use crate::frame::{Pseudo, MAX_DATA_CHUNK};

fn compile(pseudo: &Pseudo, fields: &[(String, String)]) -> Vec<(String, String)> {
    let mut compiled = pseudo.clone().into_pairs();
    compiled.extend(fields.iter().cloned());
    compiled
}

/// An inbound (server) or outbound (client) request.
///
/// Built incrementally as the codec reports each header; `done()` freezes the
/// header vector into the codec-compatible name-value array. Mutation after
/// `done()` is undefined per the header-compilation invariant — callers that
/// need to mutate again should `clear()` first.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pseudo: Pseudo,
    fields: Vec<(String, String)>,
    compiled: Option<Vec<(String, String)>>,
}

impl Request {
    pub fn new(pseudo: Pseudo, fields: Vec<(String, String)>) -> Self {
        Request {
            pseudo,
            fields,
            compiled: None,
        }
    }

    pub fn get(method: Method, path: impl Into<String>, scheme: impl Into<String>) -> Self {
        Request::new(Pseudo::request(method, path, scheme), Vec::new())
    }

    /// Appends `(name, value)`; mirrors into the typed pseudo field if `name`
    /// is `:method`, `:path`, or `:scheme`, otherwise appends to the generic
    /// field list.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if !self.pseudo.set(&name, &value) {
            self.fields.push((name, value));
        }
    }

    pub fn method(&self) -> Option<&Method> {
        self.pseudo.method.as_ref()
    }

    pub fn path(&self) -> Option<&str> {
        self.pseudo.path.as_deref()
    }

    pub fn pseudo(&self) -> &Pseudo {
        &self.pseudo
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Compiles headers into the codec's name-value array.
    pub fn done(&mut self) -> &[(String, String)] {
        self.compiled = Some(compile(&self.pseudo, &self.fields));
        self.compiled.as_deref().unwrap()
    }

    /// Resets the compiled header array; the raw pseudo/field state survives,
    /// so a subsequent `done()` recompiles an equivalent block.
    pub fn clear(&mut self) {
        self.compiled = None;
    }

    pub fn compiled(&self) -> Option<&[(String, String)]> {
        self.compiled.as_deref()
    }
}

/// An outbound (server) or inbound (client) response.
///
/// Holds a status code, a header list, a body buffer, and the progress
/// cursor the flow-controlled producer (§4.5.6) reads from.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    fields: Vec<(String, String)>,
    compiled: Option<Vec<(String, String)>>,
    body: Bytes,
    cursor: usize,
    body_armed: bool,
    body_finished: bool,
}

impl Response {
    pub fn new() -> Self {
        Response {
            status: StatusCode::OK,
            fields: Vec::new(),
            compiled: None,
            body: Bytes::new(),
            cursor: 0,
            body_armed: false,
            body_finished: false,
        }
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn add_headers(&mut self, headers: impl IntoIterator<Item = (String, String)>) {
        self.fields.extend(headers);
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Installs the body producer: subsequent `next_chunk` calls walk the
    /// body from the start, up to `MAX_DATA_CHUNK` bytes at a time.
    pub fn flush_body(&mut self) {
        self.cursor = 0;
        self.body_armed = true;
        self.body_finished = false;
    }

    /// Compiles headers into the codec's name-value array.
    pub fn done(&mut self) -> &[(String, String)] {
        self.compiled = Some(compile(&Pseudo::response(self.status), &self.fields));
        self.compiled.as_deref().unwrap()
    }

    /// Resets the compiled header array (not the raw pairs), so a new header
    /// block can be compiled after a push-response hand-off.
    pub fn clear(&mut self) {
        self.compiled = None;
    }

    pub fn compiled(&self) -> Option<&[(String, String)]> {
        self.compiled.as_deref()
    }

    /// Pulls the next body chunk, capped at both `MAX_DATA_CHUNK` and the
    /// caller-supplied `max` (the peer's available flow-control window);
    /// returns `None` either once the body producer has already emitted its
    /// end-of-stream chunk (or was never armed), or because `max` is `0` and
    /// bytes remain — the caller should retry once the window grows.
    ///
    /// A zero-byte body yields exactly one `(empty, true)` chunk regardless of
    /// `max` (an empty chunk claims no window); a body of exactly
    /// `MAX_DATA_CHUNK` bytes yields exactly one chunk with end-of-stream when
    /// `max` allows it; longer bodies are split at `MAX_DATA_CHUNK`
    /// boundaries with end-of-stream set only on the last one.
    pub fn next_chunk(&mut self, max: usize) -> Option<(Bytes, bool)> {
        if !self.body_armed || self.body_finished {
            return None;
        }
        let remaining = self.body.len() - self.cursor;
        if remaining > 0 && max == 0 {
            return None;
        }
        let take = remaining.min(MAX_DATA_CHUNK).min(max);
        let chunk = self.body.slice(self.cursor..self.cursor + take);
        self.cursor += take;
        let end_stream = self.cursor >= self.body.len();
        if end_stream {
            self.body_finished = true;
        }
        Some((chunk, end_stream))
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_header_mirrors_pseudo_fields() {
        let mut req = Request::default();
        req.add_header(":method", "GET");
        req.add_header(":path", "/get");
        req.add_header("user-agent", "h2engine-bench");
        assert_eq!(req.method(), Some(&Method::GET));
        assert_eq!(req.path(), Some("/get"));
        assert_eq!(req.fields(), &[("user-agent".to_string(), "h2engine-bench".to_string())]);
    }

    #[test]
    fn done_then_clear_then_done_is_idempotent() {
        let mut req = Request::get(Method::GET, "/get", "http");
        let first = req.done().to_vec();
        req.clear();
        let second = req.done().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn body_exactly_one_chunk_boundary() {
        let mut resp = Response::new();
        resp.set_body(vec![b'a'; MAX_DATA_CHUNK]);
        resp.flush_body();
        let (chunk, end) = resp.next_chunk(usize::MAX).unwrap();
        assert_eq!(chunk.len(), MAX_DATA_CHUNK);
        assert!(end);
        assert!(resp.next_chunk(usize::MAX).is_none());
    }

    #[test]
    fn body_one_byte_over_boundary_splits_in_two() {
        let mut resp = Response::new();
        resp.set_body(vec![b'a'; MAX_DATA_CHUNK + 1]);
        resp.flush_body();
        let (first, end1) = resp.next_chunk(usize::MAX).unwrap();
        assert_eq!(first.len(), MAX_DATA_CHUNK);
        assert!(!end1);
        let (second, end2) = resp.next_chunk(usize::MAX).unwrap();
        assert_eq!(second.len(), 1);
        assert!(end2);
    }

    #[test]
    fn empty_body_yields_single_empty_eos_chunk() {
        let mut resp = Response::new();
        resp.flush_body();
        let (chunk, end) = resp.next_chunk(usize::MAX).unwrap();
        assert!(chunk.is_empty());
        assert!(end);
        assert!(resp.next_chunk(usize::MAX).is_none());
    }

    #[test]
    fn zero_window_stalls_nonempty_body_without_advancing_cursor() {
        let mut resp = Response::new();
        resp.set_body(vec![b'a'; 10]);
        resp.flush_body();
        assert!(resp.next_chunk(0).is_none());
        let (chunk, end) = resp.next_chunk(10).unwrap();
        assert_eq!(chunk.len(), 10);
        assert!(end);
    }
}
