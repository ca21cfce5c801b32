// src/error.rs

use thiserror::Error;

/// Core error types for Addonry
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network-level failures talking to the distribution site
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote site does not know this addon
    #[error("Addon '{0}' not found on the distribution site")]
    AddonNotFound(String),

    /// The remote page did not have the structure we scrape
    #[error("Unexpected page structure for '{addon}': {reason}")]
    RemoteFormat { addon: String, reason: String },

    /// An archive entry would resolve outside the install root
    #[error("Archive entry '{0}' escapes the install root")]
    PathTraversal(String),

    /// A persisted manifest exists but cannot be read back
    #[error("Manifest for '{addon}' is corrupt: {reason}")]
    ManifestCorrupt { addon: String, reason: String },

    /// Two manifest entries share the same relative path
    #[error("Duplicate path '{0}' in manifest")]
    DuplicateEntry(String),

    /// The downloaded archive container is malformed
    #[error("Archive error: {0}")]
    Archive(String),

    /// The user configuration file cannot be read or written
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using Addonry's Error type
pub type Result<T> = std::result::Result<T, Error>;
