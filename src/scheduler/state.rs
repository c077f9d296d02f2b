use std::{collections::VecDeque, fmt};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    common::{ChannelId, MessageRef},
    transport::Connection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Connecting,
    Playing,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Playing => "playing",
        })
    }
}

/// One pending clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundQueueEntry {
    pub sound_name: String,
    pub target_channel_id: ChannelId,
    /// The chat message that asked for this clip, if any.
    pub trigger: Option<MessageRef>,
}

impl SoundQueueEntry {
    pub fn new(sound_name: impl Into<String>, target_channel_id: ChannelId) -> Self {
        Self {
            sound_name: sound_name.into(),
            target_channel_id,
            trigger: None,
        }
    }

    pub fn with_trigger(mut self, trigger: MessageRef) -> Self {
        self.trigger = Some(trigger);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ActivePlaybackSession {
    pub connection: Connection,
    pub current: Option<SoundQueueEntry>,
}

/// Everything the scheduler guards with its one lock.
#[derive(Default)]
pub(super) struct Control {
    pub queue: VecDeque<SoundQueueEntry>,
    pub state: SchedulerState,
    pub session: Option<ActivePlaybackSession>,
    /// Token of the drain loop currently allowed to touch the session.
    pub cancel: CancellationToken,
}

impl Control {
    /// Idle -> Connecting. `false` means a drain loop already owns the queue.
    pub fn try_begin_drain(&mut self) -> bool {
        if self.state != SchedulerState::Idle {
            return false;
        }
        self.transition(SchedulerState::Connecting);
        true
    }

    pub fn transition(&mut self, to: SchedulerState) {
        if self.state != to {
            debug!("Scheduler {} -> {}", self.state, to);
            self.state = to;
        }
    }

    /// Drops everything queued and revokes the running drain loop.
    pub fn reset(&mut self) -> (usize, Option<ActivePlaybackSession>) {
        let dropped = self.queue.len();
        self.queue.clear();
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.transition(SchedulerState::Idle);
        (dropped, self.session.take())
    }
}
