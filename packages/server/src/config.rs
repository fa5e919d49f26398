//! Startup configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

/// Default bind address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

/// Default port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default interval between rate-limit cleanups.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind (`BIND_ADDR`).
    pub bind_addr: String,
    /// Port to bind (`PORT`).
    pub port: u16,
    /// `GeoJSON` region polygons (`GEOINFO_REGIONS`).
    pub regions_path: Option<PathBuf>,
    /// Seed file (`GEOINFO_SEED`). The embedded seed is used when unset.
    pub seed_path: Option<PathBuf>,
    /// Interval between rate-limit cleanups (`GEOINFO_RATE_LIMIT_CLEANUP_SECS`).
    pub cleanup_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            regions_path: None,
            seed_path: None,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let path = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        };

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            regions_path: path("GEOINFO_REGIONS"),
            seed_path: path("GEOINFO_SEED"),
            cleanup_interval: lookup("GEOINFO_RATE_LIMIT_CLEANUP_SECS")
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|s| *s > 0)
                .map_or(defaults.cleanup_interval, Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), ServerConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = config(&[
            ("BIND_ADDR", "0.0.0.0"),
            ("PORT", "9000"),
            ("GEOINFO_REGIONS", "data/regions.geojson"),
            ("GEOINFO_SEED", "seed.toml"),
            ("GEOINFO_RATE_LIMIT_CLEANUP_SECS", "30"),
        ]);
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(
            config.regions_path,
            Some(PathBuf::from("data/regions.geojson"))
        );
        assert_eq!(config.seed_path, Some(PathBuf::from("seed.toml")));
        assert_eq!(config.cleanup_interval, Duration::from_secs(30));
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = config(&[
            ("PORT", "eighty"),
            ("GEOINFO_REGIONS", " "),
            ("GEOINFO_RATE_LIMIT_CLEANUP_SECS", "0"),
        ]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.regions_path.is_none());
        assert_eq!(config.cleanup_interval, DEFAULT_CLEANUP_INTERVAL);
    }
}
