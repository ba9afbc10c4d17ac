//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::Error;
use crate::protocol::DEFAULT_PORT;

/// Default disconnect grace period before a dropped participant is removed.
pub const DEFAULT_GRACE_SECS: u64 = 5;

/// Default cap on simultaneously open rooms.
pub const DEFAULT_MAX_ROOMS: usize = 1000;

/// Default cap on participants per room.
pub const DEFAULT_MAX_PARTICIPANTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long a dropped participant stays in its room awaiting reconnection.
    pub grace_period: Duration,
    pub max_rooms: usize,
    pub max_participants: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            grace_period: Duration::from_secs(DEFAULT_GRACE_SECS),
            max_rooms: DEFAULT_MAX_ROOMS,
            max_participants: DEFAULT_MAX_PARTICIPANTS,
        }
    }
}

impl ServerConfig {
    /// Check limits and resolve the listen address.
    pub fn validate(&self) -> Result<SocketAddr, Error> {
        if self.max_rooms == 0 {
            return Err(Error::Config("max rooms must be at least 1".to_string()));
        }
        if self.max_participants == 0 {
            return Err(Error::Config(
                "max participants must be at least 1".to_string(),
            ));
        }
        self.bind_addr()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, Error> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .map_err(|e| {
                Error::Config(format!(
                    "invalid listen address {}:{}: {}",
                    self.host, self.port, e
                ))
            })
    }
}
