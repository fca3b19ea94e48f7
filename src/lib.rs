#![allow(async_fn_in_trait)]
pub mod client;
pub mod common;
pub mod rest;
pub mod server;
pub mod traits;

pub use server::server::server_start;
