use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use super::{SoundClip, SoundSource};
use crate::common::SoundError;

/// Clips stored as `<directory>/<name>.<extension>`.
pub struct LocalSounds {
    directory: PathBuf,
    extension: String,
}

impl LocalSounds {
    pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension: String = extension.into();
        Self {
            directory: directory.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path for a clip name, or `None` if the name could escape the directory.
    fn clip_path(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return None;
        }
        Some(self.directory.join(format!("{}.{}", name, self.extension)))
    }

    fn existing_clip_path(&self, name: &str) -> Result<PathBuf, SoundError> {
        match self.clip_path(name) {
            Some(path) if path.is_file() => Ok(path),
            _ => Err(SoundError::NotFound(name.to_string())),
        }
    }
}

#[async_trait]
impl SoundSource for LocalSounds {
    async fn list(&self) -> Result<Vec<String>, SoundError> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let suffix = format!(".{}", self.extension);
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(&suffix) {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn fetch(&self, name: &str) -> Result<SoundClip, SoundError> {
        let path = self.existing_clip_path(name)?;
        let data = tokio::fs::read(&path).await?;
        debug!("Read {} bytes for {}", data.len(), name);
        Ok(SoundClip {
            name: name.to_string(),
            data: Bytes::from(data),
        })
    }

    async fn remove(&self, name: &str) -> Result<(), SoundError> {
        let path = self.existing_clip_path(name)?;
        tokio::fs::remove_file(&path).await?;
        info!("Removed sound {}", path.display());
        Ok(())
    }

    async fn contains(&self, name: &str) -> Result<bool, SoundError> {
        Ok(self.clip_path(name).is_some_and(|path| path.is_file()))
    }
}
