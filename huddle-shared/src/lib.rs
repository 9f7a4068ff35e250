#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod client;
pub mod config;
pub mod models;
