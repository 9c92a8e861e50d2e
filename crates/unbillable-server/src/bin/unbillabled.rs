use std::io;

use tracing_subscriber::EnvFilter;
use unbillable_server::{ForecastServer, ServerConfig};

fn main() -> io::Result<()> {
    let filter = EnvFilter::try_from_env("UNBILLABLE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = ServerConfig::from_env();
    let server = ForecastServer::open(config)
        .map_err(|err| io::Error::other(format!("failed to open metrics store: {err}")))?;
    server.serve_http()
}
