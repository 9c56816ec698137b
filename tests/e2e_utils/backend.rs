#![cfg(test)]
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub enum BackendMode {
    /// Writes back whatever it reads.
    Echo,
    /// Writes a greeting, then closes the connection.
    GreetAndClose(&'static str),
}

/// TCP server standing in for the service behind the tunnel.
pub struct Backend {
    addr: SocketAddr,
    closed: mpsc::UnboundedReceiver<()>,
    _handle: JoinHandle<()>,
}

impl Backend {
    pub async fn start(mode: BackendMode) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_on(0, mode).await
    }

    pub async fn start_on(port: u16, mode: BackendMode) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let addr = listener.local_addr()?;
        let (closed_tx, closed) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let closed_tx = closed_tx.clone();
                tokio::spawn(async move {
                    Self::handle_connection(socket, mode).await;
                    let _ = closed_tx.send(());
                });
            }
        });

        Ok(Self {
            addr,
            closed,
            _handle: handle,
        })
    }

    async fn handle_connection(mut socket: TcpStream, mode: BackendMode) {
        match mode {
            BackendMode::Echo => {
                let mut buffer = vec![0; 4096];
                loop {
                    match socket.read(&mut buffer).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&buffer[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
            BackendMode::GreetAndClose(greeting) => {
                let _ = socket.write_all(greeting.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Waits until one backend connection has ended.
    pub async fn wait_closed(&mut self, within: Duration) -> bool {
        matches!(tokio::time::timeout(within, self.closed.recv()).await, Ok(Some(())))
    }
}
