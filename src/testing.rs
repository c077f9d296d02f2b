//! Fakes shared by the unit tests.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::{
    common::{ChannelId, MessageRef, SoundError, TransportError, UserId},
    sounds::{SoundClip, SoundSource},
    transport::{ChatTransport, Connection, VoiceTransport},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(ChannelId),
    Disconnect(ChannelId),
    Play(String),
    Send(ChannelId, String),
    Direct(UserId, String),
    Delete(MessageRef),
}

/// Records every request. Playback can be held open until released.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    open: AtomicUsize,
    max_open: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    connect_gate: Option<Arc<Semaphore>>,
    hang_connects: AtomicBool,
    failing_channels: Mutex<HashSet<ChannelId>>,
    missing_channels: Mutex<HashSet<ChannelId>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `play` waits for a [`release`](Self::release) before completing.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Every `connect` waits for a [`release_connects`](Self::release_connects).
    pub fn gated_connects() -> Self {
        Self {
            connect_gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn release_connects(&self, connects: usize) {
        if let Some(gate) = &self.connect_gate {
            gate.add_permits(connects);
        }
    }

    pub fn release(&self, plays: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(plays);
        }
    }

    pub fn fail_connect(&self, channel_id: ChannelId) {
        self.failing_channels.lock().insert(channel_id);
    }

    pub fn remove_channel(&self, channel_id: ChannelId) {
        self.missing_channels.lock().insert(channel_id);
    }

    pub fn hang_connects(&self) {
        self.hang_connects.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn plays(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Play(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn max_open_connections(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    /// Yields to the runtime until `n` plays have started.
    pub async fn wait_for_plays(&self, n: usize) {
        self.wait_for(|calls| calls.iter().filter(|c| matches!(c, Call::Play(_))).count() >= n)
            .await;
    }

    /// Yields to the runtime until `n` connects have been requested.
    pub async fn wait_for_connects(&self, n: usize) {
        self.wait_for(|calls| calls.iter().filter(|c| matches!(c, Call::Connect(_))).count() >= n)
            .await;
    }

    async fn wait_for(&self, done: impl Fn(&[Call]) -> bool) {
        for _ in 0..10_000 {
            if done(&self.calls.lock()) {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached, calls so far: {:?}", self.calls());
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl VoiceTransport for RecordingTransport {
    async fn connect(&self, channel_id: ChannelId) -> Result<Connection, TransportError> {
        self.record(Call::Connect(channel_id));
        if let Some(gate) = &self.connect_gate {
            let permit = gate.acquire().await.map_err(|e| TransportError::Connect {
                channel_id,
                reason: e.to_string(),
            })?;
            permit.forget();
        }
        if self.hang_connects.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing_channels.lock().contains(&channel_id) {
            return Err(TransportError::Connect {
                channel_id,
                reason: "refused".into(),
            });
        }

        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(Connection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            channel_id,
        })
    }

    async fn disconnect(&self, connection: &Connection) {
        self.record(Call::Disconnect(connection.channel_id));
        self.open.fetch_sub(1, Ordering::SeqCst);
    }

    async fn play(&self, _connection: &Connection, clip: SoundClip) -> Result<(), TransportError> {
        self.record(Call::Play(clip.name));
        match &self.gate {
            Some(gate) => {
                let permit = gate
                    .acquire()
                    .await
                    .map_err(|e| TransportError::Playback(e.to_string()))?;
                permit.forget();
            }
            None => tokio::task::yield_now().await,
        }
        Ok(())
    }

    fn has_channel(&self, channel_id: ChannelId) -> bool {
        !self.missing_channels.lock().contains(&channel_id)
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, channel_id: ChannelId, text: &str) -> Result<(), TransportError> {
        self.record(Call::Send(channel_id, text.to_string()));
        Ok(())
    }

    async fn send_direct(&self, user_id: UserId, text: &str) -> Result<(), TransportError> {
        self.record(Call::Direct(user_id, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), TransportError> {
        self.record(Call::Delete(message));
        Ok(())
    }
}

/// Sound source backed by a list of names.
#[derive(Default)]
pub struct MemorySounds {
    names: Mutex<Vec<String>>,
}

impl MemorySounds {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
        }
    }
}

#[async_trait]
impl SoundSource for MemorySounds {
    async fn list(&self) -> Result<Vec<String>, SoundError> {
        Ok(self.names.lock().clone())
    }

    async fn fetch(&self, name: &str) -> Result<SoundClip, SoundError> {
        if !self.names.lock().iter().any(|n| n == name) {
            return Err(SoundError::NotFound(name.to_string()));
        }
        Ok(SoundClip {
            name: name.to_string(),
            data: Bytes::from_static(b"ID3"),
        })
    }

    async fn remove(&self, name: &str) -> Result<(), SoundError> {
        let mut names = self.names.lock();
        let before = names.len();
        names.retain(|n| n != name);
        if names.len() == before {
            return Err(SoundError::NotFound(name.to_string()));
        }
        Ok(())
    }
}
