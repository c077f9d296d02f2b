use serde::{Deserialize, Serialize};

use crate::common::{ChannelId, UserId};

/// Identities used by the local console driver.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConsoleConfig {
    #[serde(default = "default_user_id")]
    pub user_id: UserId,
    #[serde(default = "default_text_channel_id")]
    pub text_channel_id: ChannelId,
    #[serde(default = "default_voice_channel_id")]
    pub voice_channel_id: ChannelId,
    #[serde(default)]
    pub afk_channel_id: Option<ChannelId>,
    /// Used to estimate how long a clip plays for.
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            text_channel_id: default_text_channel_id(),
            voice_channel_id: default_voice_channel_id(),
            afk_channel_id: None,
            bitrate_kbps: default_bitrate_kbps(),
        }
    }
}

fn default_user_id() -> UserId {
    UserId(1000)
}

fn default_text_channel_id() -> ChannelId {
    ChannelId(2000)
}

fn default_voice_channel_id() -> ChannelId {
    ChannelId(3000)
}

fn default_bitrate_kbps() -> u32 {
    128
}
