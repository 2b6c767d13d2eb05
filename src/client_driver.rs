//! The client driver (component C6): establishes N connections, submits R
//! requests per connection, and aggregates response counts and throughput.
//!
//! Each connection dials, submits a burst of requests, then drives
//! `process()` with the first loop iteration send-only (a pure send of
//! SETTINGS plus the burst's HEADERS frames, see
//! `Connection::set_start_with_reading`); the aggregate response counter is
//! fed by the router's client callback (`Connection::dispatch_client`'s
//! `Event::Data` arm).

use std::net::SocketAddr;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use rustls::pki_types::ServerName;
use rustls::RootCertStore;
use tokio::io::{self, AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::config::STREAMS_LIMIT;
use crate::connection::Connection;
use crate::error::{H2Error, Result};
use crate::message::Request;
use crate::router::{ClientCallback, Router};

/// A connected byte-stream endpoint, plain or TLS. `Connection<IO>` is
/// generic over `IO: AsyncRead + AsyncWrite`; the driver only needs a single
/// concrete type that erases which kind of socket it dialed.
trait IoStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> IoStream for T {}

type BoxedIo = Box<dyn IoStream>;

/// A trait-object-friendly wrapper so `Connection<Socket>` has one concrete
/// `IO` type regardless of whether a given connection dialed plain TCP or
/// TLS over TCP.
struct Socket(BoxedIo);

impl AsyncRead for Socket {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for Socket {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut *self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.0).poll_shutdown(cx)
    }
}

/// Builds a `ClientCallback` that counts each invocation — one per inbound
/// DATA chunk, which in practice is one per completed response stream for
/// the reference handlers (each emits its whole body as a single chunk).
/// Wire this into a `Router` with `Router::add_on_client` before wrapping it
/// in `Arc`, then hand the same `Arc<AtomicU64>` to `ClientDriver::new` to
/// read it back via `responses()`.
pub fn counting_callback(counter: Arc<AtomicU64>) -> ClientCallback {
    Arc::new(move |chunk: Bytes| {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(bytes = chunk.len(), "client: response chunk received");
    })
}

/// Builds the TLS client configuration: a trusted CA bundle loaded from a PEM
/// file if one is given, otherwise the platform's well-known web roots.
pub fn build_tls_connector(ca_bundle: Option<&Path>) -> Result<TlsConnector> {
    let mut roots = RootCertStore::empty();
    match ca_bundle {
        Some(path) => {
            let pem = std::fs::read(path)?;
            let mut reader = std::io::Cursor::new(pem);
            for cert in rustls_pemfile::certs(&mut reader) {
                let cert = cert.map_err(std::io::Error::from)?;
                roots.add(cert).map_err(|err| {
                    H2Error::Codec(crate::error::CodecError::Submit {
                        op: "add_trust_anchor",
                        detail: err.to_string(),
                    })
                })?;
            }
        }
        None => {
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
    }

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Establishes connections, submits request bursts, and aggregates response
/// counts across them (component C6).
pub struct ClientDriver {
    router: Arc<Router>,
    responses: Arc<AtomicU64>,
    failed_requests: Arc<AtomicU64>,
    sockets: Vec<Socket>,
}

impl ClientDriver {
    /// `router` should already have `Router::add_on_client` wired to
    /// `responses` via `counting_callback` before being passed in.
    pub fn new(router: Arc<Router>, responses: Arc<AtomicU64>) -> Self {
        ClientDriver {
            router,
            responses,
            failed_requests: Arc::new(AtomicU64::new(0)),
            sockets: Vec::new(),
        }
    }

    /// `connect(N, addr, tls)` (§4.6): dials `connections` concurrent
    /// connections and waits for all of them to finish, expressed as a
    /// `JoinSet` of concurrent dial tasks rather than a counting semaphore,
    /// since nothing else needs to observe partial connect progress.
    pub async fn connect(&mut self, connections: u16, addr: SocketAddr, tls: Option<TlsConnector>) -> Result<()> {
        let mut dials = JoinSet::new();
        for _ in 0..connections {
            let tls = tls.clone();
            dials.spawn(async move {
                let tcp = TcpStream::connect(addr).await?;
                tcp.set_nodelay(true).ok();
                let socket: BoxedIo = match tls {
                    Some(connector) => {
                        let server_name = ServerName::from(addr.ip());
                        let stream: TlsStream<TcpStream> = connector.connect(server_name, tcp).await?;
                        Box::new(stream)
                    }
                    None => Box::new(tcp),
                };
                Ok::<Socket, io::Error>(Socket(socket))
            });
        }

        while let Some(joined) = dials.join_next().await {
            let socket = joined.map_err(|err| io::Error::other(err.to_string()))??;
            self.sockets.push(socket);
        }

        Ok(())
    }

    /// `run(req, R)` (§4.6): for each established socket, constructs an
    /// `http2_connection<client>`, submits `R` copies of the template
    /// request, drives `process()` with the first iteration send-only, and
    /// on completion signals a finish semaphore, shuts the connection down,
    /// and drops it. Waits for every connection to finish before returning.
    pub async fn run(&mut self, req_template: &Request, requests_per_connection: usize) -> Result<()> {
        let sockets = std::mem::take(&mut self.sockets);
        let finished = Arc::new(Semaphore::new(0));
        let total = sockets.len();

        for socket in sockets {
            let router = self.router.clone();
            let req_template = req_template.clone();
            let finished = finished.clone();
            let failed_requests = self.failed_requests.clone();

            tokio::spawn(async move {
                let mut connection = Connection::client(socket, router, STREAMS_LIMIT as usize);
                connection.set_start_with_reading(false);

                for _ in 0..requests_per_connection {
                    connection.submit_request(req_template.clone());
                }

                if let Err(err) = connection.process().await {
                    tracing::warn!(error = %err, "client connection ended with error");
                    failed_requests.fetch_add(1, Ordering::Relaxed);
                }
                let _ = connection.shutdown().await;

                finished.add_permits(1);
            });
        }

        if total > 0 {
            let _permit = finished
                .acquire_many(total as u32)
                .await
                .expect("finish semaphore is never closed");
        }

        Ok(())
    }

    /// Aggregate response count across every connection this driver ran.
    pub fn responses(&self) -> u64 {
        self.responses.load(Ordering::Relaxed)
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_callback_increments_on_each_invocation() {
        let counter = Arc::new(AtomicU64::new(0));
        let callback = counting_callback(counter.clone());
        callback(Bytes::from_static(b"hello!"));
        callback(Bytes::from_static(b"world!"));
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }
}
