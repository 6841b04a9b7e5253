//! Server configuration.

use protocol::RoomConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub rooms: RoomDefaults,
    #[serde(default)]
    pub inject: InjectConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Load configuration from `path`, writing the defaults there if it is missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }
}

/// Networking and timer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum simultaneous connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// AI tick period in milliseconds.
    #[serde(default = "default_ai_tick_ms")]
    pub ai_tick_ms: u64,
    /// Room sweep period in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Inactivity after which an empty room is removed, in seconds.
    #[serde(default = "default_room_timeout")]
    pub room_timeout_secs: u64,
    /// Directory with the static web client.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_connections: default_max_connections(),
            ai_tick_ms: default_ai_tick_ms(),
            sweep_interval_secs: default_sweep_interval(),
            room_timeout_secs: default_room_timeout(),
            static_dir: default_static_dir(),
        }
    }
}

impl ServerConfig {
    pub fn ai_tick(&self) -> Duration {
        Duration::from_millis(self.ai_tick_ms.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn room_timeout(&self) -> Duration {
        Duration::from_secs(self.room_timeout_secs)
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_connections() -> usize {
    512
}
fn default_ai_tick_ms() -> u64 {
    200
}
fn default_sweep_interval() -> u64 {
    300
}
fn default_room_timeout() -> u64 {
    300
}
fn default_static_dir() -> String {
    "public".to_string()
}

/// Map generation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapConfig {
    #[serde(default = "default_map_width")]
    pub width: u32,
    #[serde(default = "default_map_height")]
    pub height: u32,
    /// Disable to always fall back to seed-only maps.
    #[serde(default = "default_true")]
    pub generate: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: default_map_width(),
            height: default_map_height(),
            generate: true,
        }
    }
}

fn default_map_width() -> u32 {
    800
}
fn default_map_height() -> u32 {
    400
}
fn default_true() -> bool {
    true
}

/// Defaults applied to fields a `CREATE_ROOM` request omits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomDefaults {
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    #[serde(default = "default_max_lives")]
    pub max_lives: u32,
    #[serde(default = "default_true")]
    pub spawn_protection: bool,
    #[serde(default = "default_true")]
    pub sanctuary_zones: bool,
    #[serde(default)]
    pub anti_camping: bool,
}

impl Default for RoomDefaults {
    fn default() -> Self {
        Self {
            max_players: default_max_players(),
            max_lives: default_max_lives(),
            spawn_protection: true,
            sanctuary_zones: true,
            anti_camping: false,
        }
    }
}

impl RoomDefaults {
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            max_players: self.max_players,
            max_lives: self.max_lives,
            spawn_protection: self.spawn_protection,
            sanctuary_zones: self.sanctuary_zones,
            anti_camping: self.anti_camping,
            ..RoomConfig::default()
        }
        .clamped()
    }
}

fn default_max_players() -> u32 {
    8
}
fn default_max_lives() -> u32 {
    3
}

/// HTML snippet injection performed by the web binary at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InjectConfig {
    /// Entry point rewritten in place.
    #[serde(default = "default_index_path")]
    pub index_path: String,
    /// Optional file injected at `<!-- INJECT_HEAD -->`.
    #[serde(default)]
    pub head_file: Option<String>,
    /// Optional file injected at `<!-- INJECT_BODY -->`.
    #[serde(default)]
    pub body_file: Option<String>,
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            head_file: None,
            body_file: None,
        }
    }
}

fn default_index_path() -> String {
    "public/index.html".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [rooms]
            max_players = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.ai_tick(), Duration::from_millis(200));
        assert_eq!(config.server.room_timeout(), Duration::from_secs(300));
        assert_eq!(config.map.width, 800);

        let room = config.rooms.room_config();
        assert_eq!(room.max_players, 4);
        assert_eq!(room.max_lives, 3);
        assert_eq!(room.ai_opponents.count, 0);
    }

    #[test]
    fn defaults_roundtrip_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.server.port, 8080);
        assert!(parsed.map.generate);
    }
}
