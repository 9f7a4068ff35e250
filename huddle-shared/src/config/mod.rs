//! # Configuration
//!
//! Server configuration shared by the server binary and the CLI.

#[cfg(not(target_arch = "wasm32"))]
pub mod server;
