mod server;
mod upgrade;

pub use server::TunnelServer;
