//! `h2engine`: a single-threaded, share-nothing HTTP/2 connection engine.
//!
//! The crate is organized the way SPEC_FULL.md's component table (§2) lays
//! it out, leaves first: wire framing and HPACK (`frame`, `hpack`, `codec`),
//! request/response values (`message`), routing (`router`), per-stream
//! bookkeeping (`stream`), the directory handler (`directory`), the
//! connection engine itself (`connection`, `proto`), and the client driver
//! (`client_driver`). Process bootstrap and CLI argument parsing live in
//! `src/bin/h2engine_bench.rs`, outside the library surface — SPEC_FULL.md
//! §1 treats that as an external collaborator.

pub mod client_driver;
pub mod codec;
pub mod config;
pub mod connection;
pub mod directory;
pub mod error;
pub mod frame;
pub mod hpack;
pub mod message;
pub mod proto;
pub mod router;
pub mod stream;

pub use config::{ClientConfig, ServerConfig};
pub use connection::{Connection, Role, SubmitOutcome};
pub use directory::{DirectoryHandler, FsDirectoryHandler};
pub use error::{CodecError, H2Error, HandlerError, Reason, Result};
pub use message::{Request, Response};
pub use router::Router;
