//! Durable play counts and join-sound preferences.
//!
//! Every mutation rewrites the whole document before returning. A failed
//! write leaves the in-memory copy untouched, so memory and disk never
//! disagree.

pub mod document;

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::{debug, error, info};

pub use document::{Document, JoinSoundPreference, PlayCount};

use crate::common::{StoreError, UserId};

/// Writes are blocking file I/O done under the document lock, even when
/// called from async tasks; the store is small and writes are rare.
pub struct CounterStore {
    path: PathBuf,
    document: Mutex<Document>,
}

impl CounterStore {
    /// Opens the store at `path`. A missing or blank file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Document::default(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        info!(
            "Loaded store from {} ({} counts, {} join sounds)",
            path.display(),
            document.counts.len(),
            document.join_sounds.len()
        );

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records one completed play and returns the new count.
    pub fn increment(&self, sound_name: &str) -> Result<u64, StoreError> {
        let count = self.mutate(|doc| doc.increment(sound_name))?;
        debug!("Play count for {} is now {}", sound_name, count);
        Ok(count)
    }

    pub fn get(&self, sound_name: &str) -> Option<PlayCount> {
        self.document.lock().count(sound_name).cloned()
    }

    pub fn top(&self, n: usize) -> Vec<PlayCount> {
        self.document.lock().top(n)
    }

    pub fn get_preference(&self, user_id: UserId) -> Option<JoinSoundPreference> {
        self.document.lock().preference(user_id).cloned()
    }

    /// Creates or replaces the user's join sound. The new preference is armed.
    pub fn set_preference(&self, user_id: UserId, sound_name: &str) -> Result<(), StoreError> {
        self.mutate(|doc| match doc.preference_mut(user_id) {
            Some(pref) => {
                pref.sound_name = sound_name.to_string();
                pref.armed = true;
            }
            None => doc.join_sounds.push(JoinSoundPreference {
                user_id,
                sound_name: sound_name.to_string(),
                armed: true,
            }),
        })
    }

    /// Updates the armed flag. Users without a preference are left alone.
    pub fn set_armed(&self, user_id: UserId, armed: bool) -> Result<(), StoreError> {
        self.mutate(|doc| {
            if let Some(pref) = doc.preference_mut(user_id) {
                pref.armed = armed;
            }
        })
    }

    pub fn remove_preference(&self, user_id: UserId) -> Result<(), StoreError> {
        self.mutate(|doc| doc.join_sounds.retain(|p| p.user_id != user_id))
    }

    /// Applies `f` to a copy of the document and commits it once it is on disk.
    fn mutate<R>(&self, f: impl FnOnce(&mut Document) -> R) -> Result<R, StoreError> {
        let mut current = self.document.lock();
        let mut next = current.clone();
        let out = f(&mut next);

        if next != *current {
            if let Err(e) = self.persist(&next) {
                error!("Store write to {} failed: {}", self.path.display(), e);
                return Err(e);
            }
            *current = next;
        }
        Ok(out)
    }

    fn persist(&self, document: &Document) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec_pretty(document).map_err(StoreError::Encode)?;
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp_path).map_err(io_err)?;
        file.write_all(&encoded).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(io_err)
    }
}
