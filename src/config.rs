//! Server configuration from command-line flags and environment variables.

use crate::storage::{DatabasesConfig, ExpiryConfig};
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "quillkv", version, about = "In-memory key-value server speaking RESP")]
pub struct Config {
    /// address to bind to
    #[arg(long, env = "QUILLKV_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// port to listen on
    #[arg(short, long, env = "QUILLKV_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// snapshot file to preload into database 0 at startup
    #[arg(long, env = "QUILLKV_LOAD")]
    pub load: Option<PathBuf>,

    /// directory SAVE and LOAD resolve file names against
    #[arg(long, env = "QUILLKV_DIR", default_value = ".")]
    pub dir: PathBuf,

    /// milliseconds between active expiry sweeps of the selected database
    #[arg(
        long,
        env = "QUILLKV_SWEEP_INTERVAL_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval_ms: u64,
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn databases_config(&self) -> DatabasesConfig {
        DatabasesConfig {
            data_dir: self.dir.clone(),
            expiry: ExpiryConfig {
                interval: Duration::from_millis(self.sweep_interval_ms),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["quillkv"]).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:6379");
        assert!(config.load.is_none());

        let dbs = config.databases_config();
        assert_eq!(dbs.data_dir, PathBuf::from("."));
        assert_eq!(dbs.expiry.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "quillkv",
            "--host",
            "0.0.0.0",
            "-p",
            "7000",
            "--load",
            "boot.qkv",
            "--dir",
            "/var/lib/quillkv",
            "--sweep-interval-ms",
            "250",
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:7000");
        assert_eq!(config.load, Some(PathBuf::from("boot.qkv")));

        let dbs = config.databases_config();
        assert_eq!(dbs.data_dir, PathBuf::from("/var/lib/quillkv"));
        assert_eq!(dbs.expiry.interval, Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::try_parse_from(["quillkv", "--port", "not-a-port"]).is_err());
        assert!(Config::try_parse_from(["quillkv", "--sweep-interval-ms", "0"]).is_err());
    }
}
