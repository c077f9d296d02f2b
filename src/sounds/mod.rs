pub mod local;

use async_trait::async_trait;
use bytes::Bytes;

pub use local::LocalSounds;

use crate::common::SoundError;

/// A clip ready to hand to the voice transport.
#[derive(Debug, Clone)]
pub struct SoundClip {
    pub name: String,
    pub data: Bytes,
}

/// Where the playable clips live.
#[async_trait]
pub trait SoundSource: Send + Sync {
    /// Clip names, without extension, in a stable order.
    async fn list(&self) -> Result<Vec<String>, SoundError>;

    async fn fetch(&self, name: &str) -> Result<SoundClip, SoundError>;

    async fn remove(&self, name: &str) -> Result<(), SoundError>;

    async fn contains(&self, name: &str) -> Result<bool, SoundError> {
        Ok(self.list().await?.iter().any(|s| s == name))
    }
}
