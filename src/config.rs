// src/config.rs
// Server and bot configuration, read from `key = value` files under conf/.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::defs::{
    DEFAULT_ARCHIVE_PATH, DEFAULT_HOST, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, DEFAULT_ROUND_SECONDS,
    DEFAULT_TOP_COUNT, MIN_ROUND_SECONDS,
};
use crate::error::ConfigError;
use crate::logging::{LogLevel, log_info, log_warning};
use crate::room::RoomCapacity;

pub const SERVER_CONFIG_PATH: &str = "conf/server.conf";
pub const CLIENT_CONFIG_PATH: &str = "conf/client.conf";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub players: RoomCapacity,
    pub round_seconds: u64,
    pub status_port: Option<u16>,
    pub archive_path: PathBuf,
    pub top_count: usize,
    pub max_connections: usize,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub client_name: String,
    pub rounds: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            players: RoomCapacity::Duel,
            round_seconds: DEFAULT_ROUND_SECONDS,
            status_port: None,
            archive_path: PathBuf::from(DEFAULT_ARCHIVE_PATH),
            top_count: DEFAULT_TOP_COUNT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            log_level: LogLevel::Info,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            client_name: "JigsawBot".to_string(),
            rounds: 1,
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_map(&parse_config(&content))
    }

    pub fn from_map(config_map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            host: config_map.get("host").cloned().unwrap_or(defaults.host),
            port: parse_key(config_map, "port")?.unwrap_or(defaults.port),
            players: match config_map.get("players") {
                Some(value) => parse_players(value)?,
                None => defaults.players,
            },
            round_seconds: parse_key(config_map, "round_seconds")?.unwrap_or(defaults.round_seconds),
            status_port: parse_key(config_map, "status_port")?,
            archive_path: config_map
                .get("archive_path")
                .map(PathBuf::from)
                .unwrap_or(defaults.archive_path),
            top_count: parse_key(config_map, "top_count")?.unwrap_or(defaults.top_count),
            max_connections: parse_key(config_map, "max_connections")?.unwrap_or(defaults.max_connections),
            log_level: parse_key(config_map, "log_level")?.unwrap_or(defaults.log_level),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults only when the file does not exist.
    /// A file that exists but holds invalid values is an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match Self::from_file(path) {
            Ok(config) => {
                log_info(&format!("Loaded configuration from {}", path.display()));
                Ok(config)
            }
            Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                log_warning(&format!("No configuration at {}, using defaults", path.display()));
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Check the values that the type system does not already constrain
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.parse::<IpAddr>().is_err() {
            return Err(invalid("host", &self.host, "not an IP address"));
        }
        if self.round_seconds < MIN_ROUND_SECONDS {
            return Err(invalid(
                "round_seconds",
                self.round_seconds,
                &format!("rounds last at least {MIN_ROUND_SECONDS} seconds"),
            ));
        }
        if self.top_count == 0 {
            return Err(invalid("top_count", self.top_count, "must be at least 1"));
        }
        if self.max_connections == 0 {
            return Err(invalid("max_connections", self.max_connections, "must be at least 1"));
        }
        if self.status_port.is_some_and(|port| port != 0 && port == self.port) {
            return Err(invalid(
                "status_port",
                self.port,
                "must differ from the game port",
            ));
        }
        Ok(())
    }

    pub fn game_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| invalid("host", &self.host, "not an IP address"))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn status_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        let Some(port) = self.status_port else {
            return Ok(None);
        };
        let game = self.game_addr()?;
        Ok(Some(SocketAddr::new(game.ip(), port)))
    }
}

impl ClientConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config_map = parse_config(&content);
        let defaults = Self::default();

        let config = Self {
            host: config_map.get("host").cloned().unwrap_or(defaults.host),
            port: parse_key(&config_map, "port")?.unwrap_or(defaults.port),
            client_name: config_map.get("client_name").cloned().unwrap_or(defaults.client_name),
            rounds: parse_key(&config_map, "rounds")?.unwrap_or(defaults.rounds),
        };
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        match Self::from_file(CLIENT_CONFIG_PATH) {
            Ok(config) => {
                log_info(&format!("Loaded client configuration from {CLIENT_CONFIG_PATH}"));
                config
            }
            Err(e) => {
                log_warning(&format!(
                    "Could not load client config from {CLIENT_CONFIG_PATH}: {e}. Using defaults."
                ));
                Self::default()
            }
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn invalid(key: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_key<T>(config_map: &HashMap<String, String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    config_map
        .get(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| invalid(key, value, &e.to_string()))
        })
        .transpose()
}

pub fn parse_players(value: &str) -> Result<RoomCapacity, ConfigError> {
    let seats: u8 = value
        .trim()
        .parse()
        .map_err(|_| invalid("players", value, "expected 1 or 2"))?;
    RoomCapacity::try_from(seats).map_err(|reason| invalid("players", value, &reason))
}

pub fn parse_config(content: &str) -> HashMap<String, String> {
    let mut config = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            config.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    config
}
