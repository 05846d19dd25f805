use std::net::SocketAddr;

use tracing::level_filters::LevelFilter;

const API_ADDR: &str = "NETGUARD_API_ADDR";

const DEFAULT_API_ADDR: &str = "127.0.0.1:5000";

pub fn default_api_addr() -> SocketAddr {
    DEFAULT_API_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 5000)))
}

/// Bind address from `NETGUARD_API_ADDR`, if set and valid
pub fn get_api_addr() -> Option<SocketAddr> {
    std::env::var(API_ADDR).ok().and_then(|addr| addr.parse().ok())
}

const LOG_LEVEL: &str = "NETGUARD_LOG";

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::DEBUG;

pub fn get_log_level() -> LevelFilter {
    let level_from_env = std::env::var(LOG_LEVEL);
    level_from_env.map_or(DEFAULT_LOG_LEVEL, |res| parse_level(&res).unwrap_or(DEFAULT_LOG_LEVEL))
}

fn parse_level(value: &str) -> Option<LevelFilter> {
    value.trim().to_ascii_lowercase().parse().ok()
}
