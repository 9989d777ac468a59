//! Configuration types for pairlink

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Where pairing codes are read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    /// JSON collection file; `None` means the default data-directory location
    File(Option<PathBuf>),
    /// Process-local map, lost on exit
    Memory,
}

/// Main configuration for the pairlink server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address to bind
    pub bind: IpAddr,
    /// Server port
    pub port: u16,
    /// Pairing-code store
    pub store: StoreBackend,
    /// Buffered messages per topic before slow subscribers lag
    pub topic_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            store: StoreBackend::File(None),
            topic_capacity: 16,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set bind address
    pub fn with_bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set store backend
    pub fn with_store(mut self, store: StoreBackend) -> Self {
        self.store = store;
        self
    }

    /// Builder pattern: set per-topic buffer size (at least 1)
    pub fn with_topic_capacity(mut self, capacity: usize) -> Self {
        self.topic_capacity = capacity.max(1);
        self
    }

    /// Socket address the server listens on
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = Config::new()
            .with_port(9000)
            .with_bind(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_store(StoreBackend::Memory)
            .with_topic_capacity(0);

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.topic_capacity, 1);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.store, StoreBackend::File(None));
    }
}
