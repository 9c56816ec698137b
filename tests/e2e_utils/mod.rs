#![cfg(test)]
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod backend;
pub mod redirect_server;
pub mod tunnel_fixture;

pub use backend::{Backend, BackendMode};
pub use redirect_server::RedirectServer;
pub use tunnel_fixture::{eventually, free_port, test_settings, ClientHandle, ServerHandle, TunnelFixture};
