//! Join-sound arming driven by voice presence.
//!
//! A user's join sound is armed while they are away (AFK channel or
//! disconnected) and fires once when they come back. Firing disarms first,
//! so a second event describing the same return finds nothing armed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    common::{ChannelId, StoreError, UserId},
    scheduler::{PlaybackScheduler, SoundQueueEntry},
    store::CounterStore,
    transport::VoiceTransport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    Join { to: ChannelId },
    Switch { from: ChannelId, to: ChannelId },
    Leave { from: ChannelId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceEvent {
    pub user_id: UserId,
    /// The guild's AFK channel at the time of the event, if it has one.
    pub afk_channel_id: Option<ChannelId>,
    pub change: PresenceChange,
}

/// What a presence event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Ignored,
    Armed,
    Disarmed,
    Fired(SoundQueueEntry),
}

pub struct PresenceTracker {
    bot_user_id: Option<UserId>,
    store: Arc<CounterStore>,
    scheduler: PlaybackScheduler,
    voice: Arc<dyn VoiceTransport>,
}

impl PresenceTracker {
    pub fn new(
        bot_user_id: Option<UserId>,
        store: Arc<CounterStore>,
        scheduler: PlaybackScheduler,
        voice: Arc<dyn VoiceTransport>,
    ) -> Self {
        Self {
            bot_user_id,
            store,
            scheduler,
            voice,
        }
    }

    /// Applies one event. Store changes are durable before this returns.
    pub fn handle(&self, event: &PresenceEvent) -> Result<Transition, StoreError> {
        if Some(event.user_id) == self.bot_user_id {
            return Ok(Transition::Ignored);
        }

        let is_afk = |channel: ChannelId| event.afk_channel_id == Some(channel);
        let user = event.user_id;

        let transition = match event.change {
            PresenceChange::Join { to } if is_afk(to) => Transition::Ignored,
            PresenceChange::Join { to } => self.returned(user, to)?,
            PresenceChange::Switch { to, .. } if is_afk(to) => self.arm(user, true)?,
            PresenceChange::Switch { from, to } if is_afk(from) => self.returned(user, to)?,
            PresenceChange::Switch { .. } => self.arm(user, false)?,
            PresenceChange::Leave { .. } => self.arm(user, true)?,
        };

        debug!("Presence {:?} for {} -> {:?}", event.change, user, transition);
        Ok(transition)
    }

    fn arm(&self, user_id: UserId, armed: bool) -> Result<Transition, StoreError> {
        self.store.set_armed(user_id, armed)?;
        Ok(if armed {
            Transition::Armed
        } else {
            Transition::Disarmed
        })
    }

    /// The user is back in a regular channel; play their sound if armed.
    fn returned(&self, user_id: UserId, channel_id: ChannelId) -> Result<Transition, StoreError> {
        let Some(pref) = self.store.get_preference(user_id) else {
            return Ok(Transition::Ignored);
        };
        if !pref.armed {
            return Ok(Transition::Ignored);
        }

        if !self.voice.has_channel(channel_id) {
            warn!(
                "Join sound {} for {} skipped: channel {} is gone",
                pref.sound_name, user_id, channel_id
            );
            return Ok(Transition::Ignored);
        }

        self.store.set_armed(user_id, false)?;

        let entry = SoundQueueEntry::new(pref.sound_name, channel_id);
        info!("Join sound {} for {}", entry.sound_name, user_id);
        self.scheduler.enqueue(entry.clone());
        Ok(Transition::Fired(entry))
    }
}
