#![cfg_attr(not(test), forbid(unsafe_code))]

//! Huddle chat server: paginated history, the send path and realtime fan-out over SSE.

pub mod app_state;
pub mod commands;
pub mod db;
mod handlers;
pub mod http;
mod middleware;
pub mod openapi;
mod routes;
pub mod server;
pub mod services;
pub mod store;
mod telemetry;
mod tracer;
