use chrono::TimeDelta;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::types::DEFAULT_POLL_WINDOW_HOURS;

const DEFAULT_DATABASE_URL: &str = "sqlite://votes.db";
const DEFAULT_PORT: u16 = 3000;

/// Longest accepted voting window (one leap year)
pub const MAX_POLL_WINDOW_HOURS: i64 = 24 * 366;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Hours an opened poll accepts votes
    pub poll_window_hours: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            poll_window_hours: DEFAULT_POLL_WINDOW_HOURS,
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.database_url);

        let bind_addr = parse_var("BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = parse_var("PORT").unwrap_or(defaults.port);

        let poll_window_hours = match parse_var::<i64>("POLL_WINDOW_HOURS") {
            Some(hours) if window_from_hours(hours).is_some() => hours,
            Some(hours) => {
                tracing::warn!(
                    "POLL_WINDOW_HOURS must be between 1 and {}, got {}; using {}",
                    MAX_POLL_WINDOW_HOURS,
                    hours,
                    defaults.poll_window_hours
                );
                defaults.poll_window_hours
            }
            None => defaults.poll_window_hours,
        };

        tracing::info!(
            %database_url,
            %bind_addr,
            port,
            poll_window_hours,
            "Server config loaded"
        );

        Self {
            database_url,
            bind_addr,
            port,
            poll_window_hours,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn poll_window(&self) -> TimeDelta {
        window_from_hours(self.poll_window_hours)
            .unwrap_or_else(|| TimeDelta::hours(DEFAULT_POLL_WINDOW_HOURS))
    }
}

/// A voting window of `hours`, if it is positive and within the upper bound
fn window_from_hours(hours: i64) -> Option<TimeDelta> {
    if !(1..=MAX_POLL_WINDOW_HOURS).contains(&hours) {
        return None;
    }
    TimeDelta::try_hours(hours)
}

/// Parse an env var, warning (and returning None) when it is set but invalid
fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} value {:?}, using default", key, raw);
            None
        }
    }
}
