pub mod format;
pub mod parse;

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::debug;

pub use parse::Command;

use crate::{
    common::{ChannelId, CommandError, MessageId, MessageRef, UserId},
    configs::BotConfig,
    scheduler::{PlaybackScheduler, SoundQueueEntry},
    sounds::SoundSource,
    store::CounterStore,
    transport::ChatTransport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    /// The voice channel the author is currently in.
    pub voice_channel_id: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// Sent in a private conversation with the bot.
    pub is_direct: bool,
    pub author: Author,
    pub content: String,
}

impl ChatMessage {
    pub fn trigger(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.id,
        }
    }
}

/// Turns prefixed chat lines into calls on the scheduler and the store.
pub struct CommandRouter {
    prefix: String,
    most_played_limit: usize,
    store: Arc<CounterStore>,
    sounds: Arc<dyn SoundSource>,
    chat: Arc<dyn ChatTransport>,
    scheduler: PlaybackScheduler,
}

impl CommandRouter {
    pub fn new(
        config: &BotConfig,
        store: Arc<CounterStore>,
        sounds: Arc<dyn SoundSource>,
        chat: Arc<dyn ChatTransport>,
        scheduler: PlaybackScheduler,
    ) -> Self {
        Self {
            prefix: config.prefix.clone(),
            most_played_limit: config.most_played_limit,
            store,
            sounds,
            chat,
            scheduler,
        }
    }

    /// Handles one chat message. Mistakes by the caller are answered in
    /// chat; only internal failures come back as `Err`.
    pub async fn handle(&self, message: &ChatMessage) -> Result<(), CommandError> {
        if message.is_direct {
            return Ok(());
        }
        let Some(command) = Command::parse(&message.content, &self.prefix) else {
            return Ok(());
        };

        debug!("{} issued {:?}", message.author.id, command);
        match self.dispatch(message, command).await {
            Err(e) if e.is_user_facing() => self.reply_error(message, &e).await,
            other => other,
        }
    }

    async fn dispatch(&self, message: &ChatMessage, command: Command) -> Result<(), CommandError> {
        let author = message.author.id;

        match command {
            Command::Commands => {
                self.chat
                    .send_direct(author, &format::help_text(&self.prefix))
                    .await?;
            }
            Command::Sounds => {
                let sounds = self.sounds.list().await?;
                if sounds.is_empty() {
                    return Err(CommandError::NoSoundsAvailable);
                }
                self.chat.send_direct(author, &sounds.join("\n")).await?;
            }
            Command::MostPlayed => {
                let board = format::leaderboard(&self.store.top(self.most_played_limit));
                self.chat.send(message.channel_id, &board).await?;
            }
            Command::Remove(name) => {
                if !self.sounds.contains(&name).await? {
                    return Err(CommandError::UnknownSound(name));
                }
                self.sounds.remove(&name).await?;
                self.chat
                    .send(message.channel_id, &format!("{} removed!", name))
                    .await?;
            }
            Command::JoinSound(name) => {
                if !self.sounds.contains(&name).await? {
                    return Err(CommandError::UnknownSound(name));
                }
                self.store.set_preference(author, &name)?;
            }
            Command::RemoveJoinSound => self.store.remove_preference(author)?,
            Command::Stop => {
                self.require_voice(message)?;
                self.scheduler.stop().await;
            }
            Command::Random => {
                let channel = self.require_voice(message)?;
                let sounds = self.sounds.list().await?;
                let picked = sounds
                    .choose(&mut rand::thread_rng())
                    .cloned()
                    .ok_or(CommandError::NoSoundsAvailable)?;
                self.enqueue(message, picked, channel);
            }
            Command::Play(name) => {
                let channel = self.require_voice(message)?;
                if !self.sounds.contains(&name).await? {
                    return Err(CommandError::UnknownSound(name));
                }
                self.enqueue(message, name, channel);
            }
        }
        Ok(())
    }

    fn require_voice(&self, message: &ChatMessage) -> Result<ChannelId, CommandError> {
        message
            .author
            .voice_channel_id
            .ok_or(CommandError::NotInVoiceChannel)
    }

    fn enqueue(&self, message: &ChatMessage, sound_name: String, channel_id: ChannelId) {
        self.scheduler
            .enqueue(SoundQueueEntry::new(sound_name, channel_id).with_trigger(message.trigger()));
    }

    async fn reply_error(&self, message: &ChatMessage, error: &CommandError) -> Result<(), CommandError> {
        let text = error.to_string();
        match error {
            CommandError::NotInVoiceChannel => self.chat.send_direct(message.author.id, &text).await?,
            _ => self.chat.send(message.channel_id, &text).await?,
        }
        Ok(())
    }
}
