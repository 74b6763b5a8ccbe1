// Configuration file loading and creation

use super::types::Config;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Get the path to the configuration file
pub fn get_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("moboggle");

    // Create config directory if it doesn't exist
    fs::create_dir_all(&path).ok();

    path.push("config.toml");
    path
}

/// Load configuration from the default location
pub fn load_config() -> Result<Config, io::Error> {
    load_config_from(&get_config_path())
}

/// Load configuration from `path`, creating a default file if it doesn't exist.
/// A file that fails to parse gives the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, io::Error> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                warn!("Using default configuration");
                Ok(Config::default())
            }
        }
    } else {
        create_default_config(path)?;
        Ok(Config::default())
    }
}

/// Write `config` back to `path`, keeping the header comments
pub fn save_config(path: &Path, config: &Config) -> Result<(), io::Error> {
    let toml_string = toml::to_string_pretty(config).map_err(io::Error::other)?;
    fs::write(path, with_header(&toml_string))
}

/// Create a default configuration file with helpful comments
pub fn create_default_config(path: &Path) -> Result<(), io::Error> {
    save_config(path, &Config::default())?;
    info!("Created default config file at: {}", path.display());
    Ok(())
}

fn with_header(toml_string: &str) -> String {
    format!(
        "# MoBoggle Configuration File\n\
         # Edit this file to customize the game\n\
         # After editing, restart the game for changes to take effect\n\
         #\n\
         # player.name: leave empty to use the host name\n\
         # network.known_hosts: \"host:port\" entries shown under Join game\n\
         # menu.transition_frames: 0 turns page animations off\n\n\
         {}",
        toml_string
    )
}
