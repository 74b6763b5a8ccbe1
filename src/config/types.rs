// MoBoggle configuration types
// Every section falls back to its defaults so partial files load

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub menu: MenuConfig,
    #[serde(default)]
    pub popup: PopupConfig,
    #[serde(default)]
    pub game: GameConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerConfig {
    // Empty means the host name is used
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    // Port a hosted game listens on
    pub listen_port: u16,

    // Seconds to wait when joining
    pub connect_timeout_secs: u64,

    // How often a waiting server checks for a player or a cancel
    pub accept_poll_ms: u64,

    // "host:port" entries listed on the join page
    pub known_hosts: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_port: 4020,
            connect_timeout_secs: 10,
            accept_poll_ms: 100,
            known_hosts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MenuConfig {
    // Frames per page transition, 0 switches pages at once
    pub transition_frames: u32,
    pub frame_delay_ms: u64,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            transition_frames: 6,
            frame_delay_ms: 25,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PopupConfig {
    // Timeout check interval
    pub poll_interval_ms: u64,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GameConfig {
    pub round_secs: u64,
    // Tiles per side
    pub board_size: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_secs: 180,
            board_size: 4,
        }
    }
}
