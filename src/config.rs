//! Load config files.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use thiserror::Error;

/// Default bound on the number of items a read will request. The original
/// accessor hard-coded this; here it is only the default for
/// [`Config::max_fetch_items`].
pub const DEFAULT_MAX_FETCH_ITEMS: u32 = 1000;

/// An error indicating that we can't find the user's config directory.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash, Error)]
#[error("Unsupported platform (I don't know where to look for your config file)")]
pub struct UnsupportedPlatformError;

/// An error indicating that we couldn't make the xiprop specific directory
/// inside the user's config directory.
#[derive(Clone, Copy, Debug, Error)]
#[error("Unable to create xiprop's configuration directory.")]
pub struct CannotMakeConfigDirError;

/// Result type for config loading. Config errors come from several crates,
/// so they bubble up boxed.
type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Settings for the accessor: which display to connect to and how many
/// items a single fetch may request.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Display to connect to. `None` means the `DISPLAY` environment
    /// variable.
    pub display: Option<String>,
    /// Bound on the number of items a read will request.
    pub max_fetch_items: u32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            display: None,
            max_fetch_items: DEFAULT_MAX_FETCH_ITEMS,
        }
    }
}

impl Config {
    /// Load the config file, or return the default config if there is no
    /// config file.
    pub fn load() -> Result<Config> {
        let mut path = dirs::config_dir().ok_or(UnsupportedPlatformError)?;
        path.push("xiprop");
        path.push("config.toml");
        if !path.exists() {
            return Ok(Config::default());
        }
        Self::from_path(&path)
    }

    /// Load a specified config file.
    fn from_path(path: &Path) -> Result<Config> {
        let s = fs::read_to_string(path)?;
        Self::from_str(&s)
    }

    /// Parse a string directly.
    fn from_str(s: &str) -> Result<Config> {
        let ret = toml::from_str(s)?;
        Ok(ret)
    }

    /// Write the config in .toml format to the default location:
    /// `<config directory>/xiprop/config.toml`, creating the `xiprop`
    /// directory if needed.
    pub fn save(&self) -> Result<()> {
        let mut path = dirs::config_dir().ok_or(UnsupportedPlatformError)?;
        path.push("xiprop");
        if !path.is_dir() {
            if path.exists() {
                // Something is there, but it isn't a directory.
                return Err(Box::new(CannotMakeConfigDirError));
            } else {
                fs::create_dir(&path)?;
                log::info!("Created directory {}.", path.display());
            }
        }
        path.push("config.toml");
        fs::write(&path, toml::to_string(&self)?)?;
        log::info!("Saved configuration file to {}.", path.display());
        Ok(())
    }
}

/// Confirm that a usable `Config` can be produced by deserializing a
/// config.toml file.
#[test]
fn check_deserialize() {
    let good_toml = "display = \":1\"\nmax_fetch_items = 64\n";
    let a_config: Config = toml::from_str(good_toml).unwrap();
    assert_eq!(a_config.display.as_deref(), Some(":1"));
    assert_eq!(a_config.max_fetch_items, 64);
}

/// Confirm that missing fields fall back to the defaults.
#[test]
fn check_deserialize_defaults() {
    let empty_toml = "";
    let a_config: Config = toml::from_str(empty_toml).unwrap();
    assert_eq!(a_config, Config::default());
    assert_eq!(a_config.display, None);
    assert_eq!(a_config.max_fetch_items, DEFAULT_MAX_FETCH_ITEMS);

    let partial_toml = "max_fetch_items = 32\n";
    let a_config: Config = toml::from_str(partial_toml).unwrap();
    assert_eq!(a_config.display, None);
    assert_eq!(a_config.max_fetch_items, 32);
}

/// Confirm that serialization round-trips through toml.
#[test]
fn check_serialize() {
    let a_config = Config {
        display: Some(":0".to_string()),
        max_fetch_items: 500,
    };
    let rendered = toml::to_string(&a_config).unwrap();
    let reparsed: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(reparsed, a_config);
}

/// Verify that deserializing into a Config object will fail on bad input.
#[test]
fn check_deserialize_errors() {
    let bad_cap_toml = "max_fetch_items = \"lots\"\n";
    let response: std::result::Result<Config, toml::de::Error> = toml::from_str(bad_cap_toml);
    assert!(response.is_err());

    let negative_cap_toml = "max_fetch_items = -1\n";
    let response: std::result::Result<Config, toml::de::Error> = toml::from_str(negative_cap_toml);
    assert!(response.is_err());
}
