use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::UserId;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// The bot's own account; its presence changes are ignored.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Delete the command message once its clip has finished playing.
    #[serde(default)]
    pub delete_messages: bool,
    #[serde(default = "default_most_played_limit")]
    pub most_played_limit: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            user_id: None,
            delete_messages: false,
            most_played_limit: default_most_played_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SoundsConfig {
    #[serde(default = "default_sounds_directory")]
    pub directory: String,
    #[serde(default = "default_sounds_extension")]
    pub extension: String,
}

impl Default for SoundsConfig {
    fn default() -> Self {
        Self {
            directory: default_sounds_directory(),
            extension: default_sounds_extension(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlaybackConfig {
    /// Upper bound on a single connection attempt. `0` waits forever.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl PlaybackConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_most_played_limit() -> usize {
    15
}

fn default_storage_path() -> String {
    "db.json".to_string()
}

fn default_sounds_directory() -> String {
    "sounds".to_string()
}

fn default_sounds_extension() -> String {
    "mp3".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10000
}
