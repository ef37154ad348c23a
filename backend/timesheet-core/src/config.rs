// src/config.rs
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_DATA_DIR: &str = "database";
pub const DEFAULT_TEAM_SCOPE: &str = "SSS_Team";
pub const DEFAULT_SESSION_LIFETIME_SECS: i64 = 24 * 60 * 60; // 24 hours

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    // Server Configuration
    #[serde(default = "default_host")]
    pub server_host: String,
    #[serde(default = "default_port")]
    pub server_port: u16,

    // Record store root
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    // Name of the statistics scope covering every employee
    #[serde(default = "default_team_scope")]
    pub team_scope: String,

    // Front end allowed to call /api
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    #[serde(default = "default_session_lifetime")]
    pub session_lifetime_secs: i64,

    // TLS is enabled only when both are set
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_team_scope() -> String {
    DEFAULT_TEAM_SCOPE.to_string()
}

fn default_cors_origin() -> String {
    "http://192.168.168.13".to_string()
}

fn default_session_lifetime() -> i64 {
    DEFAULT_SESSION_LIFETIME_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: default_host(),
            server_port: default_port(),
            data_dir: default_data_dir(),
            team_scope: default_team_scope(),
            cors_origin: default_cors_origin(),
            session_lifetime_secs: default_session_lifetime(),
            cert_path: None,
            key_path: None,
        }
    }
}

/// Command line overrides for the environment configuration.
#[derive(Debug, Parser)]
#[command(name = "timesheet-core", version, about = "Timesheet upload and statistics server")]
pub struct Cli {
    /// Address to bind (overrides SERVER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides SERVER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Record store directory (overrides DATA_DIR)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        // Parse environment variables into Config struct
        Ok(envy::from_env::<AppConfig>()?)
    }

    pub fn with_overrides(mut self, cli: Cli) -> Self {
        if let Some(host) = cli.host {
            self.server_host = host;
        }
        if let Some(port) = cli.port {
            self.server_port = port;
        }
        if let Some(data_dir) = cli.data_dir {
            self.data_dir = data_dir;
        }
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}
