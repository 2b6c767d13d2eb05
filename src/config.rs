//! Ambient configuration value types (SPEC_FULL.md §6).
//!
//! No file- or environment-variable-based configuration layer is
//! introduced: an embedder constructs these directly, or the reference CLI
//! (`src/bin/h2engine_bench.rs`) builds one from parsed flags.

pub const STREAMS_LIMIT: u32 = 100;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_concurrent_streams: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            max_concurrent_streams: STREAMS_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connections: usize,
    pub requests_per_connection: usize,
    pub tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connections: 500,
            requests_per_connection: 4000,
            tls: false,
        }
    }
}
