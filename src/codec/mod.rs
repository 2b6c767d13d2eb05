//! The connection-level codec (component C7).
//!
//! This is the in-process stand-in for the external HPACK/framing library
//! SPEC_FULL.md §1 describes as delegated-to — the analogue of nghttp2's
//! `nghttp2_session_mem_recv`/`nghttp2_session_mem_send`/`nghttp2_submit_*`
//! family. The connection engine (`crate::connection`) never parses or
//! serializes a frame itself; it only calls `recv`, `next_send_chunk`, and the
//! `submit_*` methods here.

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};
use http::StatusCode;

use crate::error::CodecError;
use crate::frame::{
    Head, Headers, Kind, Pseudo, Settings, StreamId, FLAG_END_HEADERS, FLAG_END_STREAM,
    FRAME_HEADER_LEN, MAX_DATA_CHUNK,
};
use crate::hpack::HpackCodec;

/// One event surfaced by `Codec::recv`, fanned out by the connection engine
/// into the per-role callback semantics of SPEC_FULL.md §4.5.3/§4.5.4.
#[derive(Debug)]
pub enum Event {
    /// A complete HEADERS frame: either a client request or a server
    /// response, depending on which role is receiving it.
    Headers {
        stream_id: StreamId,
        headers: Headers,
    },
    /// A complete PUSH_PROMISE frame, client-side only.
    PushPromise {
        stream_id: StreamId,
        promised_id: StreamId,
        headers: Headers,
    },
    Data {
        stream_id: StreamId,
        data: Bytes,
        end_stream: bool,
    },
    StreamClosed {
        stream_id: StreamId,
    },
    Settings(Settings),
    WindowUpdate {
        stream_id: StreamId,
        increment: u32,
    },
    GoAway,
    Ping {
        ack: bool,
    },
}

/// A queued outbound frame, plus an optional notification to fire once it has
/// actually been popped for writing — the analogue of nghttp2's
/// `on_frame_send` callback, which fires when a frame leaves the library's
/// internal buffer, not when it is submitted.
struct OutFrame {
    bytes: Bytes,
    on_sent: Option<Event>,
}

/// RFC 7540 §3.5 connection preface: the 24-octet client magic string that
/// precedes the first frame on every HTTP/2 connection (including the
/// client's initial SETTINGS). A server's codec must consume exactly this
/// many bytes before any byte is interpreted as a frame header.
pub const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

pub struct Codec {
    hpack: HpackCodec,
    recv_buf: BytesMut,
    send_queue: VecDeque<OutFrame>,
    sent_events: VecDeque<Event>,
    next_request_stream_id: u32,
    next_pushed_stream_id: u32,
    /// `true` once this (server) codec has consumed the client preface; a
    /// client codec is never waiting on one, so it starts `true`.
    preface_consumed: bool,
}

impl Codec {
    pub fn new(is_client: bool) -> Self {
        let mut send_queue = VecDeque::new();
        if is_client {
            send_queue.push_back(OutFrame {
                bytes: Bytes::from_static(PREFACE),
                on_sent: None,
            });
        }
        Codec {
            hpack: HpackCodec::new(),
            recv_buf: BytesMut::new(),
            send_queue,
            sent_events: VecDeque::new(),
            next_request_stream_id: if is_client { 1 } else { 0 },
            next_pushed_stream_id: 2,
            preface_consumed: is_client,
        }
    }

    // ===== recv path =====

    /// Feeds newly read bytes in and parses as many complete frames as are
    /// available, in order. The in-process stand-in for
    /// `nghttp2_session_mem_recv`.
    ///
    /// A DATA frame carrying `END_STREAM` fully closes the stream from the
    /// client's point of view: the client's own request HEADERS already
    /// carried `END_STREAM` when submitted (requests are headers-only), so
    /// once the matching response DATA arrives with `END_STREAM` both
    /// directions are closed and a follow-up `StreamClosed` event is
    /// surfaced — the in-process stand-in for nghttp2's
    /// `on_stream_close_callback`. A request HEADERS frame carrying
    /// `END_STREAM` does *not* close the stream here: on the server the
    /// stream stays open (half-closed remote) until its own response has
    /// been fully sent, which `Codec::submit_data` tags with the same event
    /// once the terminal DATA frame actually leaves the send buffer.
    pub fn recv(&mut self, bytes: &[u8]) -> Result<Vec<Event>, CodecError> {
        self.recv_buf.extend_from_slice(bytes);
        let mut events = Vec::new();

        if !self.preface_consumed {
            if self.recv_buf.len() < PREFACE.len() {
                return Ok(events);
            }
            if &self.recv_buf[..PREFACE.len()] != PREFACE {
                return Err(CodecError::Malformed("missing client connection preface"));
            }
            self.recv_buf.advance(PREFACE.len());
            self.preface_consumed = true;
        }

        loop {
            if self.recv_buf.len() < FRAME_HEADER_LEN {
                break;
            }
            let head = Head::parse(&self.recv_buf[..FRAME_HEADER_LEN]);
            let total = FRAME_HEADER_LEN + head.length as usize;
            if self.recv_buf.len() < total {
                break;
            }

            let mut frame_buf = self.recv_buf.split_to(total);
            frame_buf.advance(FRAME_HEADER_LEN);

            self.parse_frame(head, frame_buf.freeze(), &mut events)?;
        }

        Ok(events)
    }

    fn parse_frame(&mut self, head: Head, payload: Bytes, events: &mut Vec<Event>) -> Result<(), CodecError> {
        match head.kind {
            Kind::Data => {
                let end_stream = head.is_end_stream();
                // A real delegated library (nghttp2) auto-replenishes both
                // the stream and connection windows as DATA is consumed, so
                // a long-lived connection's send side is never left stalled
                // waiting on a WINDOW_UPDATE the peer has no reason to send
                // on its own; this stand-in credits the bytes back
                // immediately rather than batching against a threshold.
                if !payload.is_empty() {
                    self.submit_window_update(head.stream_id, payload.len() as u32);
                    self.submit_window_update(StreamId::ZERO, payload.len() as u32);
                }
                events.push(Event::Data {
                    stream_id: head.stream_id,
                    data: payload,
                    end_stream,
                });
                if end_stream {
                    events.push(Event::StreamClosed { stream_id: head.stream_id });
                }
                Ok(())
            }
            Kind::Headers => {
                let (pseudo, fields) = self.hpack.decode(&payload)?;
                let headers = Headers::new(head.stream_id, pseudo, fields, head.is_end_stream());
                events.push(Event::Headers {
                    stream_id: head.stream_id,
                    headers,
                });
                Ok(())
            }
            Kind::PushPromise => {
                if payload.len() < 4 {
                    return Err(CodecError::Malformed("short PUSH_PROMISE"));
                }
                let promised_id =
                    StreamId::new(u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]));
                let (pseudo, fields) = self.hpack.decode(&payload[4..])?;
                let headers = Headers::new(promised_id, pseudo, fields, false);
                events.push(Event::PushPromise {
                    stream_id: head.stream_id,
                    promised_id,
                    headers,
                });
                Ok(())
            }
            Kind::Settings => {
                if !head.is_ack() {
                    events.push(Event::Settings(Settings::decode(&payload)));
                }
                Ok(())
            }
            Kind::WindowUpdate => {
                if payload.len() < 4 {
                    return Err(CodecError::Malformed("short WINDOW_UPDATE"));
                }
                let increment = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])
                    & 0x7fff_ffff;
                events.push(Event::WindowUpdate {
                    stream_id: head.stream_id,
                    increment,
                });
                Ok(())
            }
            Kind::Ping => {
                events.push(Event::Ping { ack: head.is_ack() });
                Ok(())
            }
            Kind::GoAway => {
                events.push(Event::GoAway);
                Ok(())
            }
            Kind::RstStream => {
                events.push(Event::StreamClosed { stream_id: head.stream_id });
                Ok(())
            }
            Kind::Continuation | Kind::Unknown(_) => Ok(()),
        }
    }

    // ===== send path =====

    /// Returns the next buffered outbound byte range, or `None` once the send
    /// buffer is drained. The in-process stand-in for
    /// `nghttp2_session_mem_send`.
    pub fn next_send_chunk(&mut self) -> Option<Bytes> {
        let frame = self.send_queue.pop_front()?;
        if let Some(event) = frame.on_sent {
            self.sent_events.push_back(event);
        }
        Some(frame.bytes)
    }

    /// Drains events queued by frames that have just been popped for
    /// writing — the `on_frame_send` callback equivalent.
    pub fn take_sent_events(&mut self) -> Vec<Event> {
        self.sent_events.drain(..).collect()
    }

    fn push_frame(&mut self, head: Head, payload: &[u8], on_sent: Option<Event>) {
        let mut bytes = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        let mut head = head;
        head.length = payload.len() as u32;
        head.encode(&mut bytes);
        bytes.extend_from_slice(payload);
        self.send_queue.push_back(OutFrame {
            bytes: Bytes::from(bytes),
            on_sent,
        });
    }

    pub fn submit_settings(&mut self, settings: &Settings) {
        let payload = settings.encode();
        self.push_frame(
            Head {
                kind: Kind::Settings,
                flags: 0,
                stream_id: StreamId::ZERO,
                length: 0,
            },
            &payload,
            None,
        );
    }

    pub fn submit_window_update(&mut self, stream_id: StreamId, increment: u32) {
        self.push_frame(
            Head {
                kind: Kind::WindowUpdate,
                flags: 0,
                stream_id,
                length: 0,
            },
            &increment.to_be_bytes(),
            None,
        );
    }

    /// Encodes and enqueues a HEADERS frame. `end_stream` should be `true`
    /// only for a response with an empty body (§8, boundary: zero-byte body
    /// still produces one DATA frame with EOS, so in practice this engine
    /// always sets `end_stream = false` here and relies on the DATA path).
    pub fn submit_headers(
        &mut self,
        stream_id: StreamId,
        pseudo: Pseudo,
        fields: &[(String, String)],
        end_stream: bool,
    ) {
        let block = self.hpack.encode(pseudo, fields);
        let mut flags = FLAG_END_HEADERS;
        if end_stream {
            flags |= FLAG_END_STREAM;
        }
        self.push_frame(
            Head {
                kind: Kind::Headers,
                flags,
                stream_id,
                length: 0,
            },
            &block,
            None,
        );
    }

    /// Allocates a promised stream id and enqueues the PUSH_PROMISE frame.
    /// Returns the promised id synchronously (nghttp2 does too); the
    /// `on_frame_send` notification for this frame fires only once it is
    /// actually popped by `next_send_chunk` (see `Event::PushPromise`).
    pub fn submit_push_promise(
        &mut self,
        stream_id: StreamId,
        pseudo: Pseudo,
        fields: &[(String, String)],
    ) -> StreamId {
        let promised_id = StreamId::new(self.next_pushed_stream_id);
        self.next_pushed_stream_id += 2;

        let headers_for_event = Headers::new(promised_id, pseudo.clone(), fields.to_vec(), false);
        let block = self.hpack.encode(pseudo, fields);

        let mut payload = Vec::with_capacity(4 + block.len());
        payload.extend_from_slice(&promised_id.as_u32().to_be_bytes());
        payload.extend_from_slice(&block);

        self.push_frame(
            Head {
                kind: Kind::PushPromise,
                flags: FLAG_END_HEADERS,
                stream_id,
                length: 0,
            },
            &payload,
            Some(Event::PushPromise {
                stream_id,
                promised_id,
                headers: headers_for_event,
            }),
        );

        promised_id
    }

    /// Allocates a client-initiated request stream id and enqueues the
    /// HEADERS frame for it. Requests are headers-only (no body is ever
    /// exposed to handlers — SPEC_FULL.md §3), so `END_STREAM` is set on
    /// this HEADERS frame itself rather than on a following DATA frame.
    pub fn submit_request(&mut self, pseudo: Pseudo, fields: &[(String, String)]) -> StreamId {
        let stream_id = StreamId::new(self.next_request_stream_id);
        self.next_request_stream_id += 2;
        self.submit_headers(stream_id, pseudo, fields, true);
        stream_id
    }

    /// Submits a response's headers (`:status`/`date`/`content-length` etc.
    /// are expected to already be present in `fields`/`pseudo`, added by
    /// `Stream::commit_response`).
    pub fn submit_response(&mut self, stream_id: StreamId, status: StatusCode, fields: &[(String, String)]) {
        self.submit_headers(stream_id, Pseudo::response(status), fields, false);
    }

    /// Submits up to `MAX_DATA_CHUNK` bytes of body as one DATA frame. The
    /// terminal chunk (`end_stream`) is tagged with a `StreamClosed`
    /// on-sent event: on the server this is the only direction that closes
    /// the stream (the request side already closed on recv of its
    /// headers-only HEADERS frame), so full closure is only known once this
    /// frame actually leaves the send buffer.
    pub fn submit_data(&mut self, stream_id: StreamId, chunk: &[u8], end_stream: bool) {
        debug_assert!(chunk.len() <= MAX_DATA_CHUNK);
        let flags = if end_stream { FLAG_END_STREAM } else { 0 };
        let on_sent = end_stream.then_some(Event::StreamClosed { stream_id });
        self.push_frame(
            Head {
                kind: Kind::Data,
                flags,
                stream_id,
                length: 0,
            },
            chunk,
            on_sent,
        );
    }

    pub fn submit_rst_stream(&mut self, stream_id: StreamId, code: u32) {
        self.push_frame(
            Head {
                kind: Kind::RstStream,
                flags: 0,
                stream_id,
                length: 0,
            },
            &code.to_be_bytes(),
            None,
        );
    }

    pub fn submit_go_away(&mut self, last_stream_id: StreamId, code: u32) {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&last_stream_id.as_u32().to_be_bytes());
        payload.extend_from_slice(&code.to_be_bytes());
        self.push_frame(
            Head {
                kind: Kind::GoAway,
                flags: 0,
                stream_id: StreamId::ZERO,
                length: 0,
            },
            &payload,
            Some(Event::GoAway),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn request_headers_round_trip_through_two_codecs() {
        let mut client = Codec::new(true);
        let mut server = Codec::new(false);

        let pseudo = Pseudo::request(Method::GET, "/get", "http");
        let stream_id = client.submit_request(pseudo, &[]);

        // The client's send queue holds the connection preface ahead of the
        // HEADERS frame; a real socket carries both before the server ever
        // gets to parse a frame, so drain the whole queue here too.
        let mut wire = Vec::new();
        while let Some(chunk) = client.next_send_chunk() {
            wire.extend_from_slice(&chunk);
        }
        let events = server.recv(&wire).unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Headers { stream_id: sid, headers } => {
                assert_eq!(*sid, stream_id);
                let (pseudo, _fields) = headers.clone().into_parts();
                assert_eq!(pseudo.path.as_deref(), Some("/get"));
                assert_eq!(pseudo.method, Some(Method::GET));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn server_codec_gates_frames_behind_preface_split_across_reads() {
        let mut server = Codec::new(false);

        // Preface delivered in two separate reads, as a real TCP stream might.
        let (first, second) = PREFACE.split_at(10);
        assert!(server.recv(first).unwrap().is_empty());
        assert!(server.recv(second).unwrap().is_empty());

        let mut client = Codec::new(true);
        client.next_send_chunk(); // drop the preface chunk queued by `new`
        let pseudo = Pseudo::request(Method::GET, "/get", "http");
        client.submit_request(pseudo, &[]);
        let headers_bytes = client.next_send_chunk().unwrap();

        let events = server.recv(&headers_bytes).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::Headers { .. }));
    }

    #[test]
    fn server_codec_rejects_wrong_preface() {
        let mut server = Codec::new(false);
        let err = server.recv(&[0u8; PREFACE.len()]).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn data_frame_chunking_respects_16kib_boundary() {
        let mut codec = Codec::new(false);
        let chunk = vec![b'a'; MAX_DATA_CHUNK];
        codec.submit_data(StreamId::new(1), &chunk, true);
        let bytes = codec.next_send_chunk().unwrap();
        assert_eq!(bytes.len(), FRAME_HEADER_LEN + MAX_DATA_CHUNK);
        assert!(codec.next_send_chunk().is_none());
    }

    #[test]
    fn receiving_data_auto_queues_stream_and_connection_window_updates() {
        let mut head = Head {
            kind: Kind::Data,
            flags: 0,
            stream_id: StreamId::new(1),
            length: 0,
        };
        let payload = vec![b'x'; 10];
        let mut bytes = Vec::new();
        head.length = payload.len() as u32;
        head.encode(&mut bytes);
        bytes.extend_from_slice(&payload);

        // A client-role codec receives response DATA without needing a
        // preface of its own to wait on first.
        let mut codec = Codec::new(true);
        codec.next_send_chunk(); // drop the preface chunk queued by `new`
        let events = codec.recv(&bytes).unwrap();
        assert!(matches!(events[0], Event::Data { .. }));

        let stream_update = codec.next_send_chunk().unwrap();
        let connection_update = codec.next_send_chunk().unwrap();
        assert!(codec.next_send_chunk().is_none());

        let stream_head = Head::parse(&stream_update);
        assert_eq!(stream_head.kind, Kind::WindowUpdate);
        assert_eq!(stream_head.stream_id, StreamId::new(1));
        let connection_head = Head::parse(&connection_update);
        assert_eq!(connection_head.kind, Kind::WindowUpdate);
        assert_eq!(connection_head.stream_id, StreamId::ZERO);
    }
}
