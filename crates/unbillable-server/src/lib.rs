pub mod config;
pub mod http;
pub mod protocol;
pub mod server;

pub use config::ServerConfig;
pub use server::ForecastServer;
