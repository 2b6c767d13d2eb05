//! The connection engine (component C5, the heart of this crate).
//!
//! Owns the codec session, the byte-stream endpoint, the stream table, and
//! (client-side) the pending-request FIFO; implements the read/dispatch/write
//! loop (§4.5.2), the server and client callback semantics (§4.5.3/§4.5.4),
//! client request submission (§4.5.5), and shutdown (§4.5.7). Expressed as a
//! plain `match` over `codec::Event` rather than a callback-registration API,
//! since nothing here needs to be pluggable at the per-frame level.

use std::collections::VecDeque;
use std::sync::Arc;

use http::Method;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::{Codec, Event};
use crate::config::ServerConfig;
use crate::error::{H2Error, Reason, Result};
use crate::frame::{Headers, Pseudo, StreamId, MAX_DATA_CHUNK};
use crate::message::Request;
use crate::proto::streams::{FlowControl, Store};
use crate::router::Router;
use crate::stream::Stream;

const READ_BUF_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// The result of `Connection::submit_request`: either the request was
/// submitted immediately, or it was queued because the connection is at its
/// concurrent-stream cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(StreamId),
    Queued,
}

pub struct Connection<IO> {
    io: IO,
    codec: Codec,
    router: Arc<Router>,
    streams: Store<Stream>,
    pending: VecDeque<Request>,
    send_window: FlowControl,
    done: bool,
    start_with_reading: bool,
    role: Role,
    max_concurrent_streams: usize,
}

impl<IO> Connection<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Constructs a server-role connection and submits the initial SETTINGS
    /// frame carrying `SETTINGS_MAX_CONCURRENT_STREAMS`.
    pub fn server(io: IO, router: Arc<Router>, config: ServerConfig) -> Self {
        let mut codec = Codec::new(false);
        let mut settings = crate::frame::Settings::default();
        settings.max_concurrent_streams = Some(config.max_concurrent_streams);
        codec.submit_settings(&settings);

        Connection {
            io,
            codec,
            router,
            streams: Store::new(),
            pending: VecDeque::new(),
            send_window: FlowControl::new(),
            done: false,
            start_with_reading: true,
            role: Role::Server,
            max_concurrent_streams: config.max_concurrent_streams as usize,
        }
    }

    /// Constructs a client-role connection and submits an empty initial
    /// SETTINGS frame.
    pub fn client(io: IO, router: Arc<Router>, max_concurrent_streams: usize) -> Self {
        let mut codec = Codec::new(true);
        codec.submit_settings(&crate::frame::Settings::default());

        Connection {
            io,
            codec,
            router,
            streams: Store::new(),
            pending: VecDeque::new(),
            send_window: FlowControl::new(),
            done: false,
            start_with_reading: true,
            role: Role::Client,
            max_concurrent_streams,
        }
    }

    /// `submit_request(req)` (§4.5.5): submits immediately if below the
    /// concurrent-stream cap, otherwise queues onto the FIFO.
    pub fn submit_request(&mut self, request: Request) -> SubmitOutcome {
        if self.streams.len() < self.max_concurrent_streams {
            let pseudo = request.pseudo().clone();
            let fields = request.fields().to_vec();
            let stream_id = self.codec.submit_request(pseudo, &fields);
            self.streams
                .insert(stream_id, Stream::new(stream_id, request, self.router.clone(), false));
            SubmitOutcome::Submitted(stream_id)
        } else {
            self.pending.push_back(request);
            SubmitOutcome::Queued
        }
    }

    pub fn live_streams(&self) -> usize {
        self.streams.len()
    }

    /// Overrides the loop's first-iteration phase (§4.5.2). The client
    /// driver's burst submission (§4.6) sets this to `false` so the first
    /// `process()` iteration is a pure send of the initial SETTINGS plus the
    /// burst's HEADERS frames, with no read in between.
    pub fn set_start_with_reading(&mut self, start_with_reading: bool) {
        self.start_with_reading = start_with_reading;
    }

    /// Shuts down both halves of the socket; the next `input.read` then
    /// observes EOF, which ends the I/O loop.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }

    /// The read/dispatch/write loop (§4.5.2).
    #[tracing::instrument(level = "debug", skip(self), fields(role = ?self.role))]
    pub async fn process(&mut self) -> Result<()> {
        let result = self.process_inner().await;
        // Close output then input in sequence regardless of how the loop ended.
        let _ = self.io.shutdown().await;
        result
    }

    async fn process_inner(&mut self) -> Result<()> {
        let mut buf = vec![0u8; READ_BUF_SIZE];

        while !self.done {
            if self.start_with_reading {
                let n = self.io.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                tracing::trace!(bytes = n, "RX");
                let events = self.codec.recv(&buf[..n])?;
                for event in events {
                    self.dispatch(event).await?;
                }
            } else {
                self.start_with_reading = true;
            }
            self.drain_send().await?;
        }

        Ok(())
    }

    /// Repeatedly asks the codec for the next outbound byte range; for each
    /// non-empty range writes it to the output stream, firing any
    /// `on_frame_send`-equivalent notifications along the way; on an empty
    /// range, flushes and returns.
    async fn drain_send(&mut self) -> Result<()> {
        loop {
            match self.codec.next_send_chunk() {
                Some(bytes) => {
                    tracing::trace!(bytes = bytes.len(), "TX");
                    self.io.write_all(&bytes).await?;
                    let sent = self.codec.take_sent_events();
                    for event in sent {
                        self.dispatch_sent(event).await?;
                    }
                }
                None => {
                    self.io.flush().await?;
                    return Ok(());
                }
            }
        }
    }

    async fn dispatch(&mut self, event: Event) -> Result<()> {
        match self.role {
            Role::Server => self.dispatch_server(event).await,
            Role::Client => self.dispatch_client(event).await,
        }
    }

    async fn dispatch_server(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Headers { stream_id, headers } => self.handle_request_headers(stream_id, headers).await,
            Event::Data { stream_id, end_stream, .. } => {
                if end_stream {
                    tracing::warn!(%stream_id, "rejecting request body");
                    return Err(H2Error::Protocol(Reason::ProtocolError));
                }
                Ok(())
            }
            Event::StreamClosed { stream_id } => {
                self.streams.remove(&stream_id);
                Ok(())
            }
            Event::WindowUpdate { increment, .. } => {
                self.send_window.inc_window(increment);
                // The send window is tracked connection-wide (see
                // `proto::streams::FlowControl`'s doc comment); any increase
                // may unblock a response whose body production stalled
                // against it, so retry every live stream.
                let stalled: Vec<StreamId> = self.streams.ids().copied().collect();
                for id in stalled {
                    self.drain_body(id);
                }
                Ok(())
            }
            Event::Settings(_) | Event::Ping { .. } | Event::GoAway | Event::PushPromise { .. } => Ok(()),
        }
    }

    async fn handle_request_headers(&mut self, stream_id: StreamId, headers: Headers) -> Result<()> {
        let (pseudo, fields) = headers.into_parts();
        let request = Request::new(pseudo, fields);

        if !self.streams.contains(&stream_id) {
            self.streams
                .insert(stream_id, Stream::new(stream_id, request, self.router.clone(), false));
        } else if let Some(stream) = self.streams.get_mut(&stream_id) {
            *stream.request_mut() = request;
        }

        let stream = self
            .streams
            .get_mut(&stream_id)
            .expect("stream was just inserted or already present");
        stream.eat_request().await;

        if stream.push() {
            if let Some(push_path) = self.router.get_push_path().map(str::to_string) {
                let promised_path = format!("{push_path}/1");
                let scheme = stream
                    .request()
                    .pseudo()
                    .scheme
                    .clone()
                    .unwrap_or_else(|| "http".to_string());
                let promised_pseudo = Pseudo::request(Method::GET, promised_path.clone(), scheme);

                let promised_id = self.codec.submit_push_promise(stream_id, promised_pseudo, &[]);

                let promised_request = Request::new(
                    Pseudo {
                        path: Some(promised_path),
                        ..Default::default()
                    },
                    Vec::new(),
                );
                self.streams.insert(
                    promised_id,
                    Stream::new(promised_id, promised_request, self.router.clone(), true),
                );

                // The parent's own response is committed once the PUSH_PROMISE
                // frame has actually been sent (`handle_push_promise_sent`),
                // right after the promised stream's — this keeps the wire
                // order PUSH_PROMISE -> HEADERS/DATA(promised) ->
                // HEADERS/DATA(parent), per §8's push ordering invariant.
                return Ok(());
            }
        }

        self.commit_and_submit(stream_id)
    }

    /// Finalizes and submits a stream's response (§4.5.3/§4.5.6): compiles
    /// the header block, submits HEADERS, then drains the body producer into
    /// DATA frames. A submission race resets the stream with
    /// `INTERNAL_ERROR` rather than aborting the connection (§7).
    fn commit_and_submit(&mut self, stream_id: StreamId) -> Result<()> {
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return Ok(());
        };

        let status = stream.response().status();
        let header_block = stream.commit_response().to_vec();
        self.codec.submit_response(stream_id, status, &header_block);

        self.drain_body(stream_id);
        Ok(())
    }

    /// Pulls as many body chunks as the peer's advertised send window
    /// currently allows (§4.5.6); stops without erroring once the window is
    /// exhausted, leaving the body cursor where it is so a later
    /// `WINDOW_UPDATE` can resume it (see `dispatch_server`'s
    /// `Event::WindowUpdate` arm).
    fn drain_body(&mut self, stream_id: StreamId) {
        loop {
            let Some(stream) = self.streams.get_mut(&stream_id) else {
                break;
            };
            let cap = self.send_window.available().min(MAX_DATA_CHUNK);
            match stream.response_mut().next_chunk(cap) {
                Some((chunk, end_stream)) => {
                    self.send_window.claim_capacity(chunk.len());
                    self.codec.submit_data(stream_id, &chunk, end_stream);
                }
                None => break,
            }
        }
    }

    async fn dispatch_sent(&mut self, event: Event) -> Result<()> {
        match event {
            Event::GoAway => {
                if self.role == Role::Client {
                    self.done = true;
                }
                Ok(())
            }
            Event::PushPromise { stream_id, promised_id, .. } => {
                self.handle_push_promise_sent(stream_id, promised_id).await
            }
            // The server's own terminal response DATA has actually left the
            // send buffer: the stream is now closed in both directions.
            Event::StreamClosed { stream_id } => {
                self.streams.remove(&stream_id);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// **on-frame-send of PUSH_PROMISE** (§4.5.3): the promised stream was
    /// already created when the parent stream's HEADERS was handled; once
    /// the PUSH_PROMISE frame has actually left the send buffer, invoke the
    /// push handler against it and submit its real response, then finally
    /// commit and submit the parent's own (already-computed) response — in
    /// that order, so the wire carries the promised stream's HEADERS/DATA
    /// ahead of the parent's (§8's push ordering invariant).
    async fn handle_push_promise_sent(&mut self, stream_id: StreamId, promised_id: StreamId) -> Result<()> {
        if let Some(stream) = self.streams.get_mut(&promised_id) {
            stream.eat_request().await;
            self.commit_and_submit(promised_id)?;
        }
        self.commit_and_submit(stream_id)
    }

    async fn dispatch_client(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Data { data, .. } => {
                if let Some(callback) = self.router.client_callback() {
                    callback(data);
                }
                Ok(())
            }
            Event::StreamClosed { stream_id } => self.handle_client_stream_closed(stream_id),
            Event::WindowUpdate { increment, .. } => {
                self.send_window.inc_window(increment);
                Ok(())
            }
            Event::Headers { .. }
            | Event::Settings(_)
            | Event::Ping { .. }
            | Event::GoAway
            | Event::PushPromise { .. } => Ok(()),
        }
    }

    /// **on-stream-close** (client, §4.5.4): releases the slot; if requests
    /// are queued and capacity allows, submits the next one in FIFO order;
    /// once both the queue and the stream table are empty, submits GOAWAY
    /// (the connection ends once that frame is actually sent).
    fn handle_client_stream_closed(&mut self, stream_id: StreamId) -> Result<()> {
        self.streams.remove(&stream_id);

        if let Some(next) = self.pending.pop_front() {
            match self.submit_request(next) {
                SubmitOutcome::Submitted(_) => {}
                SubmitOutcome::Queued => unreachable!("just freed a slot before resubmitting"),
            }
        }

        if self.pending.is_empty() && self.streams.is_empty() {
            self.codec.submit_go_away(StreamId::ZERO, Reason::NoError.into_wire());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::Method;

    use super::*;
    use crate::message::Request;
    use crate::router::{Handler, Router};

    fn hello_handler() -> Handler {
        Arc::new(|req, mut resp: crate::message::Response| {
            Box::pin(async move {
                resp.set_body("hello!");
                Ok::<_, crate::error::HandlerError>((req, resp))
            })
        })
    }

    /// §8 end-to-end scenario 1: a client GETs `/get` against a server with a
    /// handler returning `"hello!"`; the client callback observes exactly
    /// that body and the exchange ends with GOAWAY on both sides.
    #[tokio::test]
    async fn client_get_receives_server_body() {
        let mut server_router = Router::new();
        server_router.add(Method::GET, "/get", hello_handler());
        let server_router = Arc::new(server_router);

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let mut client_router = Router::new();
        client_router.add_on_client(Arc::new(move |chunk: bytes::Bytes| {
            received_clone.lock().unwrap().extend_from_slice(&chunk);
        }));
        let client_router = Arc::new(client_router);

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);

        let mut server_conn = Connection::server(server_io, server_router, ServerConfig::default());
        let server_task = tokio::spawn(async move { server_conn.process().await });

        let mut client_conn = Connection::client(client_io, client_router, 100);
        client_conn.set_start_with_reading(false);
        client_conn.submit_request(Request::get(Method::GET, "/get", "http"));
        client_conn.process().await.unwrap();

        server_task.await.unwrap().unwrap();

        assert_eq!(received.lock().unwrap().as_slice(), b"hello!");
    }

    /// §8 invariant 5: submissions above the concurrent-stream cap queue in
    /// FIFO order and are submitted as earlier streams close.
    #[tokio::test]
    async fn submissions_above_cap_are_queued() {
        let mut server_router = Router::new();
        server_router.add(Method::GET, "/get", hello_handler());
        let server_router = Arc::new(server_router);

        let count = Arc::new(Mutex::new(0u32));
        let count_clone = count.clone();
        let mut client_router = Router::new();
        client_router.add_on_client(Arc::new(move |_chunk: bytes::Bytes| {
            *count_clone.lock().unwrap() += 1;
        }));
        let client_router = Arc::new(client_router);

        let (client_io, server_io) = tokio::io::duplex(1024 * 1024);

        let mut server_conn = Connection::server(server_io, server_router, ServerConfig::default());
        let server_task = tokio::spawn(async move { server_conn.process().await });

        let mut client_conn = Connection::client(client_io, client_router, 2);
        client_conn.set_start_with_reading(false);
        for _ in 0..5 {
            client_conn.submit_request(Request::get(Method::GET, "/get", "http"));
        }
        assert_eq!(client_conn.live_streams(), 2);
        client_conn.process().await.unwrap();

        server_task.await.unwrap().unwrap();

        assert_eq!(*count.lock().unwrap(), 5);
    }

    /// §8 end-to-end scenario 3: a client GETs `/push`, which the server has
    /// registered as the push-trigger path. The server emits PUSH_PROMISE for
    /// the promised stream ahead of either stream's own response, and the
    /// client observes the promised stream's body before the parent's — the
    /// wire order PUSH_PROMISE -> HEADERS/DATA(promised) -> HEADERS/DATA(parent)
    /// (§8 invariant 3).
    #[tokio::test]
    async fn push_promise_delivers_promised_body_before_parent_body() {
        let mut server_router = Router::new();
        server_router.add_on_push(
            "/push",
            Arc::new(|req, mut resp: crate::message::Response| {
                Box::pin(async move {
                    resp.set_body("GET REP BODY\n");
                    Ok::<_, crate::error::HandlerError>((req, resp))
                })
            }),
            Arc::new(|req, mut resp: crate::message::Response| {
                Box::pin(async move {
                    resp.set_body("PUSH REP BODY".repeat(7));
                    Ok::<_, crate::error::HandlerError>((req, resp))
                })
            }),
        );
        let server_router = Arc::new(server_router);

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let mut client_router = Router::new();
        client_router.add_on_client(Arc::new(move |chunk: bytes::Bytes| {
            received_clone.lock().unwrap().push(chunk);
        }));
        let client_router = Arc::new(client_router);

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);

        let mut server_conn = Connection::server(server_io, server_router, ServerConfig::default());
        let server_task = tokio::spawn(async move { server_conn.process().await });

        let mut client_conn = Connection::client(client_io, client_router, 100);
        client_conn.set_start_with_reading(false);
        client_conn.submit_request(Request::get(Method::GET, "/push", "http"));
        client_conn.process().await.unwrap();

        server_task.await.unwrap().unwrap();

        let chunks = received.lock().unwrap();
        let bodies: Vec<&[u8]> = chunks.iter().map(|b| b.as_ref()).collect();
        assert_eq!(bodies, vec![b"PUSH REP BODY".repeat(7).as_slice(), b"GET REP BODY\n".as_slice()]);
    }

    /// A body bigger than the default 65,535-byte initial send window must
    /// still arrive whole: production stalls once the window is exhausted
    /// and resumes only once the client's auto-`WINDOW_UPDATE` (queued as
    /// DATA is received, see `codec::Codec::parse_frame`) reaches the
    /// server (§4.5.6, flow-controlled DATA production).
    #[tokio::test]
    async fn body_larger_than_initial_window_is_delivered_whole() {
        const BODY_LEN: usize = 70_000;

        let mut server_router = Router::new();
        server_router.add(
            Method::GET,
            "/big",
            Arc::new(|req, mut resp: crate::message::Response| {
                Box::pin(async move {
                    resp.set_body(vec![b'a'; BODY_LEN]);
                    Ok::<_, crate::error::HandlerError>((req, resp))
                })
            }),
        );
        let server_router = Arc::new(server_router);

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let mut client_router = Router::new();
        client_router.add_on_client(Arc::new(move |chunk: bytes::Bytes| {
            received_clone.lock().unwrap().extend_from_slice(&chunk);
        }));
        let client_router = Arc::new(client_router);

        let (client_io, server_io) = tokio::io::duplex(256 * 1024);

        let mut server_conn = Connection::server(server_io, server_router, ServerConfig::default());
        let server_task = tokio::spawn(async move { server_conn.process().await });

        let mut client_conn = Connection::client(client_io, client_router, 100);
        client_conn.set_start_with_reading(false);
        client_conn.submit_request(Request::get(Method::GET, "/big", "http"));
        client_conn.process().await.unwrap();

        server_task.await.unwrap().unwrap();

        assert_eq!(received.lock().unwrap().len(), BODY_LEN);
    }
}
