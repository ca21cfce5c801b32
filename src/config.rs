// src/config.rs

//! User configuration: the game directory and the tracked addon set
//!
//! The config is loaded once at startup and saved once at exit if it
//! changed. It is deliberately outside the manifest engine's
//! transactional guarantees; an addon can be tracked while a failed
//! install left no manifest behind.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the game installation; addons live under
    /// `Interface/AddOns` inside it.
    pub game_dir: PathBuf,

    /// Addons the user asked us to manage. Tracking is independent of
    /// installation state.
    pub addons: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game_dir: PathBuf::from("C:/Program Files/World of Warcraft"),
            addons: Vec::new(),
        }
    }
}

impl Config {
    /// Platform config file location, e.g.
    /// `~/.config/addonry/config.toml` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "addonry")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Platform cache location for the manifest store.
    pub fn default_store_root() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "addonry")
            .map(|dirs| dirs.cache_dir().join("manifests"))
    }

    /// Load the config, falling back to defaults when no file exists
    /// yet (fresh machine).
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::Config(format!("{}: {}", path.display(), e))),
        };

        toml::from_str(&contents).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("{}: {}", parent.display(), e)))?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("unserializable config: {}", e)))?;
        fs::write(path, contents).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Where addon files get installed.
    pub fn addons_dir(&self) -> PathBuf {
        self.game_dir.join("Interface").join("AddOns")
    }

    /// Heuristic check that `game_dir` points at a game installation.
    /// Used for a warning only; the manager works against any
    /// directory.
    pub fn game_dir_looks_valid(&self) -> bool {
        self.game_dir.join("Wow.exe").is_file()
    }

    /// Add an addon to the tracked set. Returns true if it was not
    /// already tracked.
    pub fn track(&mut self, addon: &str) -> bool {
        if self.addons.iter().any(|a| a == addon) {
            return false;
        }
        self.addons.push(addon.to_string());
        true
    }

    /// Drop an addon from the tracked set. Returns true if it was
    /// tracked.
    pub fn untrack(&mut self, addon: &str) -> bool {
        let before = self.addons.len();
        self.addons.retain(|a| a != addon);
        self.addons.len() != before
    }

    pub fn is_tracked(&self, addon: &str) -> bool {
        self.addons.iter().any(|a| a == addon)
    }
}
