//! Connection-scoped protocol state: the stream table and flow-control
//! windows shared by both the server and client roles.

pub mod streams;
