use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    commands::{ChatMessage, CommandRouter},
    configs::Config,
    presence::{PresenceEvent, PresenceTracker},
    scheduler::{PlaybackScheduler, SchedulerOptions},
    sounds::SoundSource,
    store::CounterStore,
    transport::{ChatTransport, VoiceTransport},
};

/// Everything the platform tells the bot about.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Message(ChatMessage),
    Presence(PresenceEvent),
}

pub struct Soundbot {
    router: CommandRouter,
    presence: PresenceTracker,
    scheduler: PlaybackScheduler,
}

impl Soundbot {
    pub fn new(
        config: &Config,
        store: Arc<CounterStore>,
        sounds: Arc<dyn SoundSource>,
        voice: Arc<dyn VoiceTransport>,
        chat: Arc<dyn ChatTransport>,
    ) -> Self {
        let scheduler = PlaybackScheduler::new(
            voice.clone(),
            chat.clone(),
            sounds.clone(),
            store.clone(),
            SchedulerOptions::from_config(config),
        );
        let presence =
            PresenceTracker::new(config.bot.user_id, store.clone(), scheduler.clone(), voice);
        let router = CommandRouter::new(&config.bot, store, sounds, chat, scheduler.clone());

        Self {
            router,
            presence,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    /// Handles one event to completion. Failures are logged, never returned.
    pub async fn handle(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::Message(message) => {
                if let Err(e) = self.router.handle(&message).await {
                    error!("Command {:?} from {} failed: {}", message.content, message.author.id, e);
                }
            }
            GatewayEvent::Presence(event) => {
                if let Err(e) = self.presence.handle(&event) {
                    warn!("Presence update for {} not applied: {}", event.user_id, e);
                }
            }
        }
    }

    /// Processes events in arrival order until the sender side closes.
    pub async fn run(&self, events: flume::Receiver<GatewayEvent>) {
        info!("Soundbot ready");
        while let Ok(event) = events.recv_async().await {
            self.handle(event).await;
        }
        self.shutdown().await;
    }

    pub async fn shutdown(&self) {
        info!("Shutting down");
        self.scheduler.stop().await;
    }
}
