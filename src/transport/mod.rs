//! Seams to the chat platform.
//!
//! The core never speaks a wire protocol itself; it drives whatever
//! implements these traits.

pub mod loopback;

use async_trait::async_trait;

use crate::{
    common::{ChannelId, MessageRef, TransportError, UserId},
    sounds::SoundClip,
};

/// An open voice connection handed out by [`VoiceTransport::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: u64,
    pub channel_id: ChannelId,
}

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, channel_id: ChannelId) -> Result<Connection, TransportError>;

    async fn disconnect(&self, connection: &Connection);

    /// Plays `clip` and resolves once it has finished.
    async fn play(&self, connection: &Connection, clip: SoundClip) -> Result<(), TransportError>;

    /// Whether `channel_id` still names a voice channel the bot can join.
    fn has_channel(&self, channel_id: ChannelId) -> bool;
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, channel_id: ChannelId, text: &str) -> Result<(), TransportError>;

    async fn send_direct(&self, user_id: UserId, text: &str) -> Result<(), TransportError>;

    async fn delete_message(&self, message: MessageRef) -> Result<(), TransportError>;
}
