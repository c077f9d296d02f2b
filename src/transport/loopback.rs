use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use tracing::{debug, info};

use super::{ChatTransport, Connection, VoiceTransport};
use crate::{
    common::{ChannelId, MessageRef, TransportError, UserId},
    sounds::SoundClip,
};

/// Local stand-in for a chat platform: replies go to the console and a clip
/// "plays" for as long as it would at the configured bitrate.
pub struct LoopbackTransport {
    bitrate_kbps: u32,
    next_connection_id: AtomicU64,
}

impl LoopbackTransport {
    pub fn new(bitrate_kbps: u32) -> Self {
        Self {
            bitrate_kbps: bitrate_kbps.max(1),
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn estimated_duration(&self, clip: &SoundClip) -> Duration {
        let bits = clip.data.len() as u64 * 8;
        Duration::from_millis(bits / self.bitrate_kbps as u64)
    }
}

#[async_trait]
impl VoiceTransport for LoopbackTransport {
    async fn connect(&self, channel_id: ChannelId) -> Result<Connection, TransportError> {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        info!("Joined voice channel {} (connection {})", channel_id, id);
        Ok(Connection { id, channel_id })
    }

    async fn disconnect(&self, connection: &Connection) {
        info!("Left voice channel {}", connection.channel_id);
    }

    async fn play(&self, connection: &Connection, clip: SoundClip) -> Result<(), TransportError> {
        let duration = self.estimated_duration(&clip);
        crate::log_println!(
            ">> playing {} in {} ({:.1}s)",
            clip.name,
            connection.channel_id,
            duration.as_secs_f32()
        );
        tokio::time::sleep(duration).await;
        debug!("Finished {}", clip.name);
        Ok(())
    }

    fn has_channel(&self, _channel_id: ChannelId) -> bool {
        true
    }
}

#[async_trait]
impl ChatTransport for LoopbackTransport {
    async fn send(&self, channel_id: ChannelId, text: &str) -> Result<(), TransportError> {
        crate::log_println!("[#{}] {}", channel_id, text);
        Ok(())
    }

    async fn send_direct(&self, user_id: UserId, text: &str) -> Result<(), TransportError> {
        crate::log_println!("[@{}] {}", user_id, text);
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), TransportError> {
        crate::log_println!("[#{}] message {} deleted", message.channel_id, message.message_id);
        Ok(())
    }
}
