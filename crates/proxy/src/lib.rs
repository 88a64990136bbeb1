//! Aggregating MCP proxy: spawns downstream MCP servers, merges their tool
//! catalogs behind one prefix-namespaced surface, and serves that surface
//! back to a host over stdio.

#![deny(missing_docs)]

mod catalog;
mod core_tools;
mod downstream;
mod error;
mod index;
mod pattern;
mod server;
#[cfg(test)]
mod scenarios_test;

pub use catalog::Catalog;
pub use error::ProxyError;
pub use server::{ConfigPatch, Proxy, ProxyHandle};

pub(crate) const PROTOCOL_VERSION: rmcp::model::ProtocolVersion = rmcp::model::ProtocolVersion::V_2025_03_26;
