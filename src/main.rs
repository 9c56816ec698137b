use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wsbridge::adapters::{NoopMetrics, PrometheusMetrics, TunnelClient, TunnelServer};
use wsbridge::config::load_settings;
use wsbridge::domain::{ClientConfig, Result, ServerConfig};

const EXAMPLES: &str = "\
Example: connect to ssh-server through an HTTP proxy running on ws-server
  wsbridge server -listen_ws :8080 -connect_tcp ssh-server.example.org:22
  wsbridge client -listen_tcp 127.0.0.1:1234 -connect_ws ws://ws-server.example.org:8080/";

/// Carries TCP connections over WebSocket
#[derive(Parser, Debug)]
#[command(version = env!("WSBRIDGE_VERSION"), author = env!("CARGO_PKG_AUTHORS"), after_help = EXAMPLES)]
pub struct Opts {
    /// Settings file (TOML), created with defaults if missing
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// HTTP websocket server which connects to a TCP server
    Server(ServerArgs),
    /// TCP server which connects to a websocket server
    Client(ClientArgs),
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Local address to listen to. Examples: ":8080", "127.0.0.1:1234", "[::1]:5000"
    #[arg(long = "listen_ws", value_name = "ADDR")]
    listen_ws: String,

    /// Remote address to connect to at each incoming websocket connection.
    /// Examples: "127.0.0.1:23", "ssh.example.com:22", "[::1]:143"
    #[arg(long = "connect_tcp", value_name = "ADDR")]
    connect_tcp: String,

    /// Header carrying the real client IP when behind a reverse proxy
    #[arg(long = "real_ip_header", value_name = "NAME")]
    real_ip_header: Option<String>,
}

#[derive(Args, Debug)]
struct ClientArgs {
    /// Local address to listen to. Examples: ":8080", "127.0.0.1:1234", "[::1]:5000"
    #[arg(long = "listen_tcp", value_name = "ADDR")]
    listen_tcp: String,

    /// Remote websocket to connect to at each incoming TCP connection.
    /// Examples: "ws://192.168.0.1:8080/", "wss://https.example.org/", "ws://[::1]/"
    #[arg(long = "connect_ws", value_name = "URL")]
    connect_ws: String,

    /// Skip TLS certificate verification for the websocket connection
    #[arg(long)]
    insecure: bool,
}

/// Accepts `-flag` as well as `--flag` for long options.
fn normalize_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| match arg.to_str() {
            Some(s) if i > 0 && is_single_dash_long(s) => OsString::from(format!("-{}", s)),
            _ => arg,
        })
        .collect()
}

fn is_single_dash_long(arg: &str) -> bool {
    let mut chars = arg.chars();
    chars.next() == Some('-')
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.next().is_some()
}

/// Rust's listeners want an explicit host; `:8080` means every interface.
fn listen_address(addr: String) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr
    }
}

async fn until_interrupted<F>(task: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::select! {
        result = task => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

async fn run(opts: Opts) -> Result<()> {
    let settings = load_settings(opts.config.as_deref())?;

    match opts.command {
        Command::Server(args) => {
            let config = ServerConfig::new(listen_address(args.listen_ws), args.connect_tcp)
                .with_real_ip_header(args.real_ip_header);
            let metrics = Arc::new(PrometheusMetrics::new()?);
            until_interrupted(TunnelServer::new(config, settings, metrics).listen_and_serve()).await
        }
        Command::Client(args) => {
            let config = ClientConfig::new(listen_address(args.listen_tcp), args.connect_ws).with_insecure(args.insecure);
            let client = TunnelClient::new(config, settings, Arc::new(NoopMetrics))?;
            until_interrupted(client.listen_and_serve()).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Opts::parse_from(normalize_flags(std::env::args_os()));
    match run(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to run: {}", e);
            ExitCode::FAILURE
        }
    }
}
