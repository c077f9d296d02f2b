use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use super::types::ChannelId;

/// Failures while reading or writing the counter document.
///
/// A mutation that returns one of these has not been applied, neither on
/// disk nor in memory.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode store document: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("store at {path} is not a valid document: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures reported by the voice or chat transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to voice channel {channel_id}: {reason}")]
    Connect { channel_id: ChannelId, reason: String },
    #[error("timed out after {after:?} connecting to voice channel {channel_id}")]
    ConnectTimeout { channel_id: ChannelId, after: Duration },
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("failed to deliver chat message: {0}")]
    Chat(String),
}

#[derive(Debug, Error)]
pub enum SoundError {
    #[error("sound `{0}` not found")]
    NotFound(String),
    #[error("sound directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while handling a chat command.
///
/// The first group is caused by what the user typed and is answered with a
/// reply; the rest are internal failures.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0} not found!")]
    UnknownSound(String),
    #[error("Join a voice channel first!")]
    NotInVoiceChannel,
    #[error("No sounds available!")]
    NoSoundsAvailable,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sounds(#[from] SoundError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl CommandError {
    /// Whether this error should be shown to the caller rather than logged.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::UnknownSound(_) | Self::NotInVoiceChannel | Self::NoSoundsAvailable
        )
    }
}
