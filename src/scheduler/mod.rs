//! FIFO playback over a single voice connection.
//!
//! `enqueue` appends and, if the scheduler is idle, starts a drain loop. The
//! idle check and the move to `Connecting` happen under the same lock, so
//! only one drain loop can run at a time. `stop` revokes that loop's
//! cancellation token; a revoked loop never touches shared state again.

pub mod state;

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use state::{ActivePlaybackSession, SchedulerState, SoundQueueEntry};

use self::state::Control;
use crate::{
    common::{ChannelId, TransportError},
    configs::Config,
    sounds::SoundSource,
    store::CounterStore,
    transport::{ChatTransport, Connection, VoiceTransport},
};

/// What happens to the triggering chat message after its clip finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerCleanup {
    #[default]
    Keep,
    DeleteMessage,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerOptions {
    pub cleanup: TriggerCleanup,
    pub connect_timeout: Option<Duration>,
}

impl SchedulerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cleanup: if config.bot.delete_messages {
                TriggerCleanup::DeleteMessage
            } else {
                TriggerCleanup::Keep
            },
            connect_timeout: config.playback.connect_timeout(),
        }
    }
}

#[derive(Clone)]
pub struct PlaybackScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    control: Mutex<Control>,
    idle: Notify,
    voice: Arc<dyn VoiceTransport>,
    chat: Arc<dyn ChatTransport>,
    sounds: Arc<dyn SoundSource>,
    store: Arc<CounterStore>,
    options: SchedulerOptions,
}

enum Step {
    Play {
        entry: SoundQueueEntry,
        open: Option<Connection>,
    },
    Release(Connection),
    Done,
}

impl PlaybackScheduler {
    pub fn new(
        voice: Arc<dyn VoiceTransport>,
        chat: Arc<dyn ChatTransport>,
        sounds: Arc<dyn SoundSource>,
        store: Arc<CounterStore>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                control: Mutex::new(Control::default()),
                idle: Notify::new(),
                voice,
                chat,
                sounds,
                store,
                options,
            }),
        }
    }

    /// Appends `entry` and starts draining if nothing is playing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue(&self, entry: SoundQueueEntry) {
        let start = {
            let mut ctl = self.inner.control.lock();
            debug!(
                "Queued {} for channel {} ({} ahead)",
                entry.sound_name,
                entry.target_channel_id,
                ctl.queue.len()
            );
            ctl.queue.push_back(entry);
            ctl.try_begin_drain().then(|| ctl.cancel.clone())
        };

        if let Some(cancel) = start {
            tokio::spawn(self.inner.clone().drain(cancel));
        }
    }

    /// Clears the queue and disconnects. The clip in flight is not counted.
    pub async fn stop(&self) {
        let (dropped, session) = self.inner.control.lock().reset();
        self.inner.idle.notify_waiters();

        if let Some(session) = session {
            if let Some(current) = &session.current {
                info!("Stopped {} ({} queued clips dropped)", current.sound_name, dropped);
            }
            self.inner.voice.disconnect(&session.connection).await;
        } else if dropped > 0 {
            info!("Stopped with {} queued clips dropped", dropped);
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.control.lock().state
    }

    pub fn queue_len(&self) -> usize {
        self.inner.control.lock().queue.len()
    }

    pub fn queued(&self) -> Vec<SoundQueueEntry> {
        self.inner.control.lock().queue.iter().cloned().collect()
    }

    pub fn now_playing(&self) -> Option<SoundQueueEntry> {
        let ctl = self.inner.control.lock();
        ctl.session.as_ref().and_then(|s| s.current.clone())
    }

    /// Resolves once the scheduler is idle.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.state() == SchedulerState::Idle {
                return;
            }
            notified.await;
        }
    }
}

impl Inner {
    async fn drain(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let step = {
                let mut ctl = self.control.lock();
                if cancel.is_cancelled() {
                    return;
                }
                match ctl.queue.pop_front() {
                    Some(entry) => {
                        ctl.transition(SchedulerState::Connecting);
                        let open = ctl.session.as_ref().map(|s| s.connection.clone());
                        Step::Play { entry, open }
                    }
                    None => match ctl.session.take() {
                        Some(session) => Step::Release(session.connection),
                        None => {
                            ctl.transition(SchedulerState::Idle);
                            Step::Done
                        }
                    },
                }
            };

            match step {
                Step::Play { entry, open } => self.play_entry(entry, open, &cancel).await,
                // The queue is re-checked afterwards; anything queued meanwhile
                // is picked up by this loop.
                Step::Release(connection) => self.voice.disconnect(&connection).await,
                Step::Done => {
                    self.idle.notify_waiters();
                    return;
                }
            }
        }
    }

    async fn play_entry(
        &self,
        entry: SoundQueueEntry,
        open: Option<Connection>,
        cancel: &CancellationToken,
    ) {
        let connection = match open {
            Some(connection) if connection.channel_id == entry.target_channel_id => connection,
            other => {
                if other.is_some() && !self.close_session(cancel).await {
                    return;
                }
                match self.open_session(entry.target_channel_id, cancel).await {
                    Ok(Some(connection)) => connection,
                    Ok(None) => return,
                    Err(e) => {
                        warn!("Dropping {}: {}", entry.sound_name, e);
                        return;
                    }
                }
            }
        };

        let clip = match self.sounds.fetch(&entry.sound_name).await {
            Ok(clip) => clip,
            Err(e) => {
                warn!("Dropping {}: {}", entry.sound_name, e);
                return;
            }
        };

        {
            let mut ctl = self.control.lock();
            if cancel.is_cancelled() {
                return;
            }
            ctl.transition(SchedulerState::Playing);
            if let Some(session) = ctl.session.as_mut() {
                session.current = Some(entry.clone());
            }
        }

        info!("Playing {} in channel {}", entry.sound_name, entry.target_channel_id);
        let played = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            res = self.voice.play(&connection, clip) => res,
        };

        {
            let mut ctl = self.control.lock();
            if cancel.is_cancelled() {
                return;
            }
            if let Some(session) = ctl.session.as_mut() {
                session.current = None;
            }
        }

        match played {
            Ok(()) => self.complete(&entry).await,
            Err(e) => warn!("Dropping {}: {}", entry.sound_name, e),
        }
    }

    /// Disconnects the current session. `false` if the loop was revoked.
    async fn close_session(&self, cancel: &CancellationToken) -> bool {
        let session = {
            let mut ctl = self.control.lock();
            if cancel.is_cancelled() {
                return false;
            }
            ctl.session.take()
        };
        if let Some(session) = session {
            self.voice.disconnect(&session.connection).await;
        }
        true
    }

    /// Connects and publishes the session. `Ok(None)` if the loop was revoked.
    async fn open_session(
        &self,
        channel_id: ChannelId,
        cancel: &CancellationToken,
    ) -> Result<Option<Connection>, TransportError> {
        let connection = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            res = self.connect(channel_id) => res?,
        };

        {
            let mut ctl = self.control.lock();
            if !cancel.is_cancelled() {
                ctl.session = Some(ActivePlaybackSession {
                    connection: connection.clone(),
                    current: None,
                });
                return Ok(Some(connection));
            }
        }

        // Stopped between the connect resolving and the lock; nobody else
        // knows about this connection.
        self.voice.disconnect(&connection).await;
        Ok(None)
    }

    async fn connect(&self, channel_id: ChannelId) -> Result<Connection, TransportError> {
        match self.options.connect_timeout {
            Some(after) => tokio::time::timeout(after, self.voice.connect(channel_id))
                .await
                .map_err(|_| TransportError::ConnectTimeout { channel_id, after })?,
            None => self.voice.connect(channel_id).await,
        }
    }

    async fn complete(&self, entry: &SoundQueueEntry) {
        if let Err(e) = self.store.increment(&entry.sound_name) {
            error!("Play of {} was not recorded: {}", entry.sound_name, e);
            return;
        }

        if self.options.cleanup == TriggerCleanup::DeleteMessage {
            if let Some(trigger) = entry.trigger {
                if let Err(e) = self.chat.delete_message(trigger).await {
                    warn!("Failed to delete trigger message {}: {}", trigger.message_id, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::{MessageId, MessageRef},
        testing::{Call, MemorySounds, RecordingTransport},
    };

    const ROOM: ChannelId = ChannelId(10);
    const OTHER_ROOM: ChannelId = ChannelId(11);

    struct Harness {
        _dir: tempfile::TempDir,
        transport: Arc<RecordingTransport>,
        store: Arc<CounterStore>,
        scheduler: PlaybackScheduler,
    }

    fn harness(transport: RecordingTransport, options: SchedulerOptions) -> Harness {
        harness_with_store(transport, options, "db.json")
    }

    fn harness_with_store(
        transport: RecordingTransport,
        options: SchedulerOptions,
        store_path: &str,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CounterStore::open(dir.path().join(store_path)).unwrap());
        let transport = Arc::new(transport);
        let sounds = Arc::new(MemorySounds::new(&["a", "b", "c", "d"]));
        let scheduler = PlaybackScheduler::new(
            transport.clone(),
            transport.clone(),
            sounds,
            store.clone(),
            options,
        );
        Harness {
            _dir: dir,
            transport,
            store,
            scheduler,
        }
    }

    fn count(store: &CounterStore, name: &str) -> Option<u64> {
        store.get(name).map(|c| c.count)
    }

    #[tokio::test]
    async fn test_plays_in_enqueue_order() {
        let h = harness(RecordingTransport::new(), SchedulerOptions::default());

        for name in ["c", "a", "b", "a"] {
            h.scheduler.enqueue(SoundQueueEntry::new(name, ROOM));
        }
        h.scheduler.wait_idle().await;

        assert_eq!(h.transport.plays(), ["c", "a", "b", "a"]);
        assert_eq!(count(&h.store, "a"), Some(2));
        assert_eq!(count(&h.store, "c"), Some(1));
        assert_eq!(h.transport.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_same_channel_reuses_connection() {
        let h = harness(RecordingTransport::new(), SchedulerOptions::default());

        h.scheduler.enqueue(SoundQueueEntry::new("a", ROOM));
        h.scheduler.enqueue(SoundQueueEntry::new("b", ROOM));
        h.scheduler.wait_idle().await;

        assert_eq!(
            h.transport.calls(),
            [
                Call::Connect(ROOM),
                Call::Play("a".into()),
                Call::Play("b".into()),
                Call::Disconnect(ROOM),
            ]
        );
    }

    #[tokio::test]
    async fn test_switching_channels_closes_previous_connection() {
        let h = harness(RecordingTransport::new(), SchedulerOptions::default());

        h.scheduler.enqueue(SoundQueueEntry::new("a", ROOM));
        h.scheduler.enqueue(SoundQueueEntry::new("b", OTHER_ROOM));
        h.scheduler.wait_idle().await;

        assert_eq!(
            h.transport.calls(),
            [
                Call::Connect(ROOM),
                Call::Play("a".into()),
                Call::Disconnect(ROOM),
                Call::Connect(OTHER_ROOM),
                Call::Play("b".into()),
                Call::Disconnect(OTHER_ROOM),
            ]
        );
        assert_eq!(h.transport.max_open_connections(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_during_playback_joins_running_drain() {
        let h = harness(RecordingTransport::gated(), SchedulerOptions::default());

        h.scheduler.enqueue(SoundQueueEntry::new("a", ROOM));
        h.transport.wait_for_plays(1).await;
        assert_eq!(h.scheduler.state(), SchedulerState::Playing);
        assert_eq!(h.scheduler.now_playing().map(|e| e.sound_name), Some("a".into()));

        h.scheduler.enqueue(SoundQueueEntry::new("b", OTHER_ROOM));
        h.scheduler.enqueue(SoundQueueEntry::new("c", ROOM));
        assert_eq!(h.scheduler.queue_len(), 2);

        h.transport.release(3);
        h.scheduler.wait_idle().await;

        assert_eq!(h.transport.plays(), ["a", "b", "c"]);
        assert_eq!(h.transport.max_open_connections(), 1);
        assert_eq!(h.transport.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_burst_of_enqueues_starts_one_drain() {
        let h = harness(RecordingTransport::gated(), SchedulerOptions::default());

        for _ in 0..5 {
            h.scheduler.enqueue(SoundQueueEntry::new("a", ROOM));
        }
        h.transport.wait_for_plays(1).await;
        h.transport.release(5);
        h.scheduler.wait_idle().await;

        let connects = h
            .transport
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Connect(_)))
            .count();
        assert_eq!(connects, 1);
        assert_eq!(count(&h.store, "a"), Some(5));
    }

    #[tokio::test]
    async fn test_connect_failure_drops_entry_and_continues() {
        let h = harness(RecordingTransport::new(), SchedulerOptions::default());
        h.transport.fail_connect(OTHER_ROOM);

        h.scheduler.enqueue(SoundQueueEntry::new("a", OTHER_ROOM));
        h.scheduler.enqueue(SoundQueueEntry::new("b", ROOM));
        h.scheduler.wait_idle().await;

        assert_eq!(h.transport.plays(), ["b"]);
        assert_eq!(count(&h.store, "a"), None);
        assert_eq!(count(&h.store, "b"), Some(1));
        assert_eq!(h.transport.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_on_last_entry_returns_to_idle() {
        let h = harness(RecordingTransport::new(), SchedulerOptions::default());
        h.transport.fail_connect(ROOM);

        h.scheduler.enqueue(SoundQueueEntry::new("a", ROOM));
        h.scheduler.wait_idle().await;

        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
        assert!(h.transport.plays().is_empty());
        assert_eq!(h.transport.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_missing_clip_is_skipped() {
        let h = harness(RecordingTransport::new(), SchedulerOptions::default());

        h.scheduler.enqueue(SoundQueueEntry::new("gone", ROOM));
        h.scheduler.enqueue(SoundQueueEntry::new("a", ROOM));
        h.scheduler.wait_idle().await;

        assert_eq!(h.transport.plays(), ["a"]);
        assert_eq!(count(&h.store, "gone"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_is_bounded() {
        let options = SchedulerOptions {
            connect_timeout: Some(Duration::from_millis(50)),
            ..SchedulerOptions::default()
        };
        let h = harness(RecordingTransport::new(), options);
        h.transport.hang_connects();

        h.scheduler.enqueue(SoundQueueEntry::new("a", ROOM));
        h.scheduler.wait_idle().await;

        assert!(h.transport.plays().is_empty());
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_stop_mid_playback() {
        let h = harness(RecordingTransport::gated(), SchedulerOptions::default());

        h.scheduler.enqueue(SoundQueueEntry::new("a", ROOM));
        h.scheduler.enqueue(SoundQueueEntry::new("b", ROOM));
        h.transport.wait_for_plays(1).await;

        h.scheduler.stop().await;

        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
        assert_eq!(h.scheduler.queue_len(), 0);
        assert!(h.scheduler.now_playing().is_none());
        assert_eq!(h.transport.open_connections(), 0);

        // A late completion from the transport must not be credited.
        h.transport.release(1);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(count(&h.store, "a"), None);
        assert_eq!(h.transport.plays(), ["a"]);
    }

    #[tokio::test]
    async fn test_stop_while_connecting_abandons_the_connect() {
        let h = harness(RecordingTransport::gated_connects(), SchedulerOptions::default());

        h.scheduler.enqueue(SoundQueueEntry::new("a", ROOM));
        h.transport.wait_for_connects(1).await;
        assert_eq!(h.scheduler.state(), SchedulerState::Connecting);

        h.scheduler.stop().await;
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // Letting the transport finish must not open a connection for the
        // stopped drain.
        h.transport.release_connects(1);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.transport.open_connections(), 0);
        assert!(h.transport.plays().is_empty());
        assert!(!h.transport.calls().contains(&Call::Disconnect(ROOM)));

        // The unused permit lets the next drain connect straight away.
        h.scheduler.enqueue(SoundQueueEntry::new("b", OTHER_ROOM));
        h.scheduler.wait_idle().await;

        assert_eq!(h.transport.plays(), ["b"]);
        assert_eq!(h.transport.max_open_connections(), 1);
        assert_eq!(h.transport.open_connections(), 0);
        assert_eq!(count(&h.store, "a"), None);
    }

    #[tokio::test]
    async fn test_unrecorded_play_skips_cleanup_and_continues() {
        let options = SchedulerOptions {
            cleanup: TriggerCleanup::DeleteMessage,
            ..SchedulerOptions::default()
        };
        // The parent directory does not exist, so every increment fails.
        let h = harness_with_store(RecordingTransport::new(), options, "missing/db.json");
        let trigger = |id| MessageRef {
            channel_id: ChannelId(5),
            message_id: MessageId(id),
        };

        h.scheduler
            .enqueue(SoundQueueEntry::new("a", ROOM).with_trigger(trigger(1)));
        h.scheduler
            .enqueue(SoundQueueEntry::new("b", ROOM).with_trigger(trigger(2)));
        h.scheduler.wait_idle().await;

        assert_eq!(h.transport.plays(), ["a", "b"]);
        assert!(
            !h.transport
                .calls()
                .iter()
                .any(|c| matches!(c, Call::Delete(_)))
        );
        assert_eq!(count(&h.store, "a"), None);
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
        assert_eq!(h.transport.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_harmless() {
        let h = harness(RecordingTransport::new(), SchedulerOptions::default());
        h.scheduler.stop().await;
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
        assert!(h.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_starts_fresh() {
        let h = harness(RecordingTransport::gated(), SchedulerOptions::default());

        h.scheduler.enqueue(SoundQueueEntry::new("a", ROOM));
        h.transport.wait_for_plays(1).await;
        h.scheduler.stop().await;

        h.scheduler.enqueue(SoundQueueEntry::new("b", ROOM));
        h.transport.wait_for_plays(2).await;
        h.transport.release(2);
        h.scheduler.wait_idle().await;

        assert_eq!(h.transport.plays(), ["a", "b"]);
        assert_eq!(count(&h.store, "a"), None);
        assert_eq!(count(&h.store, "b"), Some(1));
        assert_eq!(h.transport.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_trigger_message_deleted_when_enabled() {
        let options = SchedulerOptions {
            cleanup: TriggerCleanup::DeleteMessage,
            ..SchedulerOptions::default()
        };
        let h = harness(RecordingTransport::new(), options);
        let trigger = MessageRef {
            channel_id: ChannelId(5),
            message_id: MessageId(99),
        };

        h.scheduler
            .enqueue(SoundQueueEntry::new("a", ROOM).with_trigger(trigger));
        h.scheduler.wait_idle().await;

        assert!(h.transport.calls().contains(&Call::Delete(trigger)));
    }

    #[tokio::test]
    async fn test_trigger_message_kept_by_default() {
        let h = harness(RecordingTransport::new(), SchedulerOptions::default());
        let trigger = MessageRef {
            channel_id: ChannelId(5),
            message_id: MessageId(99),
        };

        h.scheduler
            .enqueue(SoundQueueEntry::new("a", ROOM).with_trigger(trigger));
        h.scheduler.wait_idle().await;

        assert!(!h.transport.calls().contains(&Call::Delete(trigger)));
    }
}
