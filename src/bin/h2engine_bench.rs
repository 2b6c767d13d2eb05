//! Reference CLI driver — wires `Connection` and `ClientDriver` together
//! behind `--node`/`--port`/`--tls`/`--con`/`--req`/`--debug` options.
//!
//! Process bootstrap, CLI parsing, and TLS credential loading/socket
//! acceptance for the *server* side are explicitly out of scope for the
//! connection engine itself (SPEC_FULL.md §1) — this binary is the external
//! collaborator that supplies them.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use http::Method;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use h2engine::client_driver::{self, ClientDriver};
use h2engine::config::STREAMS_LIMIT;
use h2engine::error::HandlerError;
use h2engine::router::Router;
use h2engine::{ClientConfig, Connection, Request, Response, ServerConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Node {
    Server,
    Client,
}

#[derive(Parser, Debug)]
#[command(name = "h2engine-bench", about = "HTTP/2 connection-engine benchmark driver")]
struct Cli {
    /// Node mode: run as a server or as a load-generating client.
    #[arg(short, long, value_enum, default_value = "server")]
    node: Node,

    /// HTTP/2 port.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// TLS enabled (client connect path only — server-side TLS credential
    /// loading/socket acceptance is an external collaborator, SPEC_FULL §1).
    #[arg(short, long, action = clap::ArgAction::Set, default_value_t = false)]
    tls: bool,

    /// Connections number (client mode).
    #[arg(long, default_value_t = 500)]
    con: u16,

    /// Requests number per client connection.
    #[arg(short, long, default_value_t = 4000)]
    req: u32,

    /// Debugging info from handlers.
    #[arg(short, long, action = clap::ArgAction::Set, default_value_t = false)]
    debug: bool,

    /// Trusted CA bundle for the client's TLS connect path; defaults to the
    /// platform's well-known web roots if omitted.
    #[arg(long)]
    ca_bundle: Option<PathBuf>,

    /// Directory handler root, served for any request path that matches
    /// neither a registered route nor the push path.
    #[arg(long)]
    doc_root: Option<PathBuf>,
}

fn build_router(doc_root: Option<PathBuf>, debug: bool) -> Router {
    let mut router = Router::new();

    router.add(
        Method::GET,
        "/",
        Arc::new(move |req: Request, mut resp: Response| {
            Box::pin(async move {
                if debug {
                    tracing::debug!(method = ?req.method(), path = req.path(), "handling /");
                }
                resp.set_body("handle /\n");
                Ok::<_, HandlerError>((req, resp))
            })
        }),
    );

    router.add(
        Method::GET,
        "/get",
        Arc::new(move |req: Request, mut resp: Response| {
            Box::pin(async move {
                if debug {
                    tracing::debug!(method = ?req.method(), path = req.path(), "handling /get");
                }
                resp.set_body("hello!");
                Ok::<_, HandlerError>((req, resp))
            })
        }),
    );

    router.add_on_push(
        "/push",
        Arc::new(move |req: Request, mut resp: Response| {
            Box::pin(async move {
                if debug {
                    tracing::debug!("push 1");
                }
                resp.set_body("GET REP BODY\n");
                Ok::<_, HandlerError>((req, resp))
            })
        }),
        Arc::new(move |req: Request, mut resp: Response| {
            Box::pin(async move {
                if debug {
                    tracing::debug!("push 2");
                }
                resp.set_body("PUSH REP BODY".repeat(7));
                Ok::<_, HandlerError>((req, resp))
            })
        }),
    );

    if let Some(doc_root) = doc_root {
        router.add_directory_handler(Box::new(h2engine::FsDirectoryHandler::new(doc_root)));
    }

    router
}

async fn run_server(cli: &Cli) -> h2engine::Result<()> {
    if cli.tls {
        tracing::warn!(
            "--tls has no effect on the server's socket-acceptance path (out of scope, SPEC_FULL.md §1); \
             the engine expects an already-connected byte stream, TLS or otherwise"
        );
    }

    let router = Arc::new(build_router(cli.doc_root.clone(), cli.debug));
    let addr: SocketAddr = ([0, 0, 0, 0], cli.port).into();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "h2engine server listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true).ok();
        let router = router.clone();
        let config = ServerConfig {
            max_concurrent_streams: STREAMS_LIMIT,
        };

        tokio::spawn(async move {
            let mut connection = Connection::server(socket, router, config);
            if let Err(err) = connection.process().await {
                tracing::warn!(%peer, error = %err, "connection ended with error");
            }
        });
    }
}

async fn run_client(cli: &Cli) -> h2engine::Result<()> {
    let config = ClientConfig {
        connections: cli.con as usize,
        requests_per_connection: cli.req as usize,
        tls: cli.tls,
    };

    let responses = Arc::new(AtomicU64::new(0));
    let mut router = Router::new();
    router.add_on_client(client_driver::counting_callback(responses.clone()));
    let router = Arc::new(router);

    let scheme = if config.tls { "https" } else { "http" };
    let mut request = Request::get(Method::GET, "/get", scheme);
    request.add_header(":authority", format!("127.0.0.1:{}", cli.port));
    request.add_header("accept", "*/*");
    request.add_header("user-agent", "h2engine-bench");

    let tls_connector = if config.tls {
        Some(client_driver::build_tls_connector(cli.ca_bundle.as_deref())?)
    } else {
        None
    };

    let mut driver = ClientDriver::new(router, responses);
    let addr: SocketAddr = ([127, 0, 0, 1], cli.port).into();

    driver.connect(config.connections as u16, addr, tls_connector).await?;
    tracing::info!("established tcp connections");

    let started = Instant::now();
    driver.run(&request, config.requests_per_connection).await?;
    let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);

    let total_responses = driver.responses();
    let responses_f = total_responses as f64;

    println!("Total responses: {total_responses}");
    println!("Req/s: {:.2}", responses_f / elapsed);
    if total_responses > 0 {
        println!("Avg resp time: {:.2} us", (elapsed / responses_f) * 1_000_000.0);
    }
    if driver.failed_requests() > 0 {
        println!("Failed connections: {}", driver.failed_requests());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> h2engine::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.node {
        Node::Server => run_server(&cli).await,
        Node::Client => run_client(&cli).await,
    }
}
