use std::path::PathBuf;

pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_DB_PATH: &str = "./data/metrics-db.json";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: String,
    pub db_path: PathBuf,
    pub max_body_bytes: usize,
    pub list_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            max_body_bytes: 64 * 1024,
            list_limit: 100,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let http_addr = env_string("UNBILLABLE_HTTP_ADDR").unwrap_or(defaults.http_addr);
        let db_path = env_string("UNBILLABLE_DB").map_or(defaults.db_path, PathBuf::from);
        Self {
            http_addr,
            db_path,
            max_body_bytes: env_usize("UNBILLABLE_MAX_BODY_BYTES", 64 * 1024, 1024, 1024 * 1024),
            list_limit: env_usize("UNBILLABLE_LIST_LIMIT", 100, 1, 10_000),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}
