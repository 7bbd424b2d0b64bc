//! Keystone Node Library
//!
//! Runs every partition of a Keystone cluster inside one process: one tokio
//! task per partition, connected by in-process channels.

pub mod config;
pub mod node;

pub use config::NodeConfig;
pub use node::{KeystoneNode, NodeHandle};
