use serde::{Deserialize, Serialize};

use crate::common::UserId;

/// Number of completed plays for one sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayCount {
    pub name: String,
    pub count: u64,
}

/// A user's join sound and whether it fires on their next return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSoundPreference {
    #[serde(rename = "user")]
    pub user_id: UserId,
    #[serde(rename = "sound")]
    pub sound_name: String,
    #[serde(rename = "play")]
    pub armed: bool,
}

/// On-disk layout of the store.
///
/// Either collection may be missing from older files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub counts: Vec<PlayCount>,
    #[serde(default)]
    pub join_sounds: Vec<JoinSoundPreference>,
}

impl Document {
    pub fn count(&self, name: &str) -> Option<&PlayCount> {
        self.counts.iter().find(|c| c.name == name)
    }

    pub fn preference(&self, user_id: UserId) -> Option<&JoinSoundPreference> {
        self.join_sounds.iter().find(|p| p.user_id == user_id)
    }

    pub fn preference_mut(&mut self, user_id: UserId) -> Option<&mut JoinSoundPreference> {
        self.join_sounds.iter_mut().find(|p| p.user_id == user_id)
    }

    pub fn increment(&mut self, name: &str) -> u64 {
        match self.counts.iter_mut().find(|c| c.name == name) {
            Some(entry) => {
                entry.count += 1;
                entry.count
            }
            None => {
                self.counts.push(PlayCount {
                    name: name.to_string(),
                    count: 1,
                });
                1
            }
        }
    }

    /// Highest counts first. Equal counts keep their document order.
    pub fn top(&self, n: usize) -> Vec<PlayCount> {
        let mut sorted = self.counts.clone();
        sorted.sort_by(|a, b| b.count.cmp(&a.count));
        sorted.truncate(n);
        sorted
    }
}
