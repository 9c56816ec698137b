#![cfg(test)]
#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::LOCATION;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ServerBuilder;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// HTTP front answering every request with a fixed redirect.
pub struct RedirectServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    _handle: JoinHandle<()>,
}

impl RedirectServer {
    pub async fn start(status: u16, location: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Self::serve(listener, 0, status, location)
    }

    /// Answers 503 to the first `failures` requests, then redirects.
    pub async fn flaky(failures: usize, status: u16, location: String) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Self::serve(listener, failures, status, Some(location))
    }

    /// Redirects every request back to itself.
    pub async fn looping(status: u16) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let location = format!("http://{}/again", listener.local_addr()?);
        Self::serve(listener, 0, status, Some(location))
    }

    fn serve(
        listener: TcpListener,
        failures: usize,
        status: u16,
        location: Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let addr = listener.local_addr()?;
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let counter = counter.clone();
                let location = location.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |_req: Request<Incoming>| {
                        let hit = counter.fetch_add(1, Ordering::SeqCst);
                        let mut response = Response::builder();
                        if hit < failures {
                            response = response.status(503u16);
                        } else {
                            response = response.status(status);
                            if let Some(location) = &location {
                                response = response.header(LOCATION, location.as_str());
                            }
                        }
                        let response = response
                            .body(Full::new(Bytes::new()))
                            .expect("static redirect response");
                        async move { Ok::<_, Infallible>(response) }
                    });

                    let _ = ServerBuilder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Ok(Self {
            addr,
            hits,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}
