use clap::Parser;

use crate::constants::{HEARTBEAT_MS, MIN_UPDATE_INTERVAL_MS, RECONNECT_GRACE_MS, SLOWDOWN_MS};
use crate::relay::RelayOptions;

/// Relay server settings. Every flag can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// How long a disconnected player's state is kept for a rejoin.
    #[arg(long, env = "RECONNECT_GRACE_MS", default_value_t = RECONNECT_GRACE_MS)]
    pub grace_ms: u64,

    #[arg(long, env = "HEARTBEAT_MS", default_value_t = HEARTBEAT_MS)]
    pub heartbeat_ms: u64,

    #[arg(long, env = "MIN_UPDATE_INTERVAL_MS", default_value_t = MIN_UPDATE_INTERVAL_MS)]
    pub min_update_interval_ms: u64,

    #[arg(long, env = "SLOWDOWN_MS", default_value_t = SLOWDOWN_MS)]
    pub slowdown_ms: u64,

    /// Seed for pursuit sessions; random when omitted.
    #[arg(long, env = "PURSUIT_SEED")]
    pub seed: Option<u64>,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn to_options(&self) -> RelayOptions {
        RelayOptions {
            grace_ms: self.grace_ms,
            heartbeat_ms: self.heartbeat_ms.max(1),
            min_update_interval_ms: self.min_update_interval_ms,
            slowdown_ms: self.slowdown_ms,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_relay_defaults() {
        let config = Config::parse_from(["campus-relay"]);
        let options = config.to_options();
        let defaults = RelayOptions::default();
        assert_eq!(config.port, 8080);
        assert_eq!(options.grace_ms, defaults.grace_ms);
        assert_eq!(options.heartbeat_ms, defaults.heartbeat_ms);
        assert_eq!(options.min_update_interval_ms, defaults.min_update_interval_ms);
        assert_eq!(options.slowdown_ms, defaults.slowdown_ms);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from([
            "campus-relay",
            "--port",
            "9001",
            "--grace-ms",
            "250",
            "--heartbeat-ms",
            "0",
            "--seed",
            "42",
        ]);
        assert_eq!(config.bind_addr(), "0.0.0.0:9001");
        let options = config.to_options();
        assert_eq!(options.grace_ms, 250);
        assert_eq!(options.heartbeat_ms, 1);
        assert_eq!(options.seed, Some(42));
    }
}
