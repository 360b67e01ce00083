use anyhow::{bail, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Vehicle telemetry WebSocket gateway", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "GATEWAY_PORT", help = "Port to listen on for client connections.")]
    pub port: Option<u16>,

    #[clap(long, env = "GATEWAY_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "GATEWAY_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "GATEWAY_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "TRACCAR_API_URL", help = "Base HTTP URL of the Traccar server.")]
    pub traccar_api_url: Option<String>,

    #[clap(long, env = "TRACCAR_API_USERNAME", help = "Traccar account email used for authentication.")]
    pub traccar_api_username: Option<String>,

    #[clap(long, env = "TRACCAR_API_PASSWORD", help = "Traccar account password.")]
    pub traccar_api_password: Option<String>,

    #[clap(long, env = "MAPBOX_API_URL", help = "Base URL of the Mapbox API.")]
    pub mapbox_api_url: Option<String>,

    #[clap(long, env = "MAPBOX_ACCESS_TOKEN", help = "Mapbox access token.")]
    pub mapbox_access_token: Option<String>,

    #[clap(long, env = "REDIS_URL", help = "Redis connection URL for the geocoding cache.")]
    pub redis_url: Option<String>,

    #[clap(long, env = "GATEWAY_RECONNECT_DELAY_MS", help = "Delay in milliseconds between upstream reconnect attempts.")]
    pub reconnect_delay_ms: Option<u64>,

    #[clap(long, env = "GATEWAY_MAX_RECONNECT_ATTEMPTS", help = "Consecutive upstream failures tolerated before giving up.")]
    pub max_reconnect_attempts: Option<u32>,

    #[clap(long, env = "CORS_ALLOWED_ORIGINS", value_delimiter = ',', help = "Comma-separated list of allowed CORS origins. Allows any origin when unset.")]
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            traccar_api_url: other.traccar_api_url.or(self.traccar_api_url),
            traccar_api_username: other.traccar_api_username.or(self.traccar_api_username),
            traccar_api_password: other.traccar_api_password.or(self.traccar_api_password),
            mapbox_api_url: other.mapbox_api_url.or(self.mapbox_api_url),
            mapbox_access_token: other.mapbox_access_token.or(self.mapbox_access_token),
            redis_url: other.redis_url.or(self.redis_url),
            reconnect_delay_ms: other.reconnect_delay_ms.or(self.reconnect_delay_ms),
            max_reconnect_attempts: other.max_reconnect_attempts.or(self.max_reconnect_attempts),
            cors_allowed_origins: other.cors_allowed_origins.or(self.cors_allowed_origins),
        }
    }
}

/// Fully resolved runtime settings. Credentials are mandatory; everything
/// else falls back to a default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub traccar_api_url: String,
    pub traccar_api_username: String,
    pub traccar_api_password: String,
    pub mapbox_api_url: String,
    pub mapbox_access_token: String,
    pub redis_url: String,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub cors_allowed_origins: Vec<String>,
}

pub fn load_config() -> Result<Settings> {
    // 1. Load defaults
    let default_config = Config {
        port: Some(3001),
        log_dir: Some(PathBuf::from("./logs")),
        log_level: Some("info".to_string()),
        mapbox_api_url: Some("https://api.mapbox.com".to_string()),
        redis_url: Some("redis://127.0.0.1/".to_string()),
        reconnect_delay_ms: Some(5000),
        max_reconnect_attempts: Some(5),
        ..Default::default()
    };

    // 2. Load from config file (server_gateway.conf) if present.
    //    Allow overriding default config file path with CLI arg.
    let cli_args_for_path = Config::parse(); // Parse CLI to get potential config_path override early

    let config_file_path = cli_args_for_path
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_gateway.conf"));

    let mut current_config = default_config;

    if config_file_path.exists() {
        if let Ok(config_str) = fs::read_to_string(&config_file_path) {
            if let Ok(file_config) = serde_json::from_str::<Config>(&config_str) {
                current_config = current_config.merge(file_config);
            } else {
                log::warn!("Failed to parse config file: {}. Falling back to other sources.", config_file_path.display());
            }
        } else {
            log::warn!("Failed to read config file: {}. Falling back to other sources.", config_file_path.display());
        }
    }

    // 3. Override with environment variables and CLI arguments
    let current_config = current_config.merge(cli_args_for_path);

    // 4. Resolve, rejecting startup when the upstream credentials are absent
    let Some(traccar_api_url) = current_config.traccar_api_url else {
        bail!("TRACCAR_API_URL is not configured");
    };
    let Some(traccar_api_username) = current_config.traccar_api_username else {
        bail!("TRACCAR_API_USERNAME is not configured");
    };
    let Some(traccar_api_password) = current_config.traccar_api_password else {
        bail!("TRACCAR_API_PASSWORD is not configured");
    };
    let Some(mapbox_access_token) = current_config.mapbox_access_token else {
        bail!("MAPBOX_ACCESS_TOKEN is not configured");
    };

    Ok(Settings {
        port: current_config.port.unwrap_or(3001),
        log_dir: current_config.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
        log_level: current_config.log_level.unwrap_or_else(|| "info".to_string()),
        traccar_api_url,
        traccar_api_username,
        traccar_api_password,
        mapbox_api_url: current_config
            .mapbox_api_url
            .unwrap_or_else(|| "https://api.mapbox.com".to_string()),
        mapbox_access_token,
        redis_url: current_config
            .redis_url
            .unwrap_or_else(|| "redis://127.0.0.1/".to_string()),
        reconnect_delay_ms: current_config.reconnect_delay_ms.unwrap_or(5000),
        max_reconnect_attempts: current_config.max_reconnect_attempts.unwrap_or(5),
        cors_allowed_origins: current_config.cors_allowed_origins.unwrap_or_default(),
    })
}
