// Configuration module for MoBoggle
// Handles loading and saving settings in a TOML file

pub mod loader;
pub mod types;

pub use loader::{get_config_path, load_config, load_config_from, save_config};
pub use types::{Config, GameConfig, MenuConfig, NetworkConfig, PlayerConfig, PopupConfig};
