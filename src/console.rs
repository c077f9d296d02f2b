//! Drives the bot from standard input.
//!
//! `/join [channel]`, `/move <channel>`, `/afk` and `/leave` move the
//! console user between voice channels; every other line is sent as a chat
//! message.

use std::{io::BufRead, thread};

use tracing::{info, warn};

use crate::{
    bot::GatewayEvent,
    commands::{Author, ChatMessage},
    common::{ChannelId, MessageId},
    configs::ConsoleConfig,
    presence::{PresenceChange, PresenceEvent},
};

pub struct ConsoleSession {
    config: ConsoleConfig,
    voice_channel_id: Option<ChannelId>,
    next_message_id: u64,
}

impl ConsoleSession {
    pub fn new(config: ConsoleConfig) -> Self {
        Self {
            config,
            voice_channel_id: None,
            next_message_id: 1,
        }
    }

    pub fn interpret(&mut self, line: &str) -> Option<GatewayEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let mut words = line.split_whitespace();
        let change = match words.next() {
            Some("/join") => {
                let target = match words.next() {
                    Some(raw) => parse_channel(raw)?,
                    None => self.config.voice_channel_id,
                };
                self.move_to(target)?
            }
            Some("/move") => {
                let Some(raw) = words.next() else {
                    warn!("Usage: /move <channel>");
                    return None;
                };
                let target = parse_channel(raw)?;
                self.move_to(target)?
            }
            Some("/afk") => {
                let Some(afk) = self.config.afk_channel_id else {
                    warn!("No AFK channel configured");
                    return None;
                };
                self.move_to(afk)?
            }
            Some("/leave") => PresenceChange::Leave {
                from: self.voice_channel_id.take()?,
            },
            _ => return Some(GatewayEvent::Message(self.message(line))),
        };

        Some(GatewayEvent::Presence(PresenceEvent {
            user_id: self.config.user_id,
            afk_channel_id: self.config.afk_channel_id,
            change,
        }))
    }

    fn move_to(&mut self, to: ChannelId) -> Option<PresenceChange> {
        match self.voice_channel_id.replace(to) {
            None => Some(PresenceChange::Join { to }),
            Some(from) if from == to => None,
            Some(from) => Some(PresenceChange::Switch { from, to }),
        }
    }

    fn message(&mut self, content: &str) -> ChatMessage {
        let id = MessageId(self.next_message_id);
        self.next_message_id += 1;
        ChatMessage {
            id,
            channel_id: self.config.text_channel_id,
            is_direct: false,
            author: Author {
                id: self.config.user_id,
                voice_channel_id: self.voice_channel_id,
            },
            content: content.to_string(),
        }
    }
}

fn parse_channel(raw: &str) -> Option<ChannelId> {
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!("Not a channel id: {}", raw);
            None
        }
    }
}

/// Reads stdin on its own thread until end of input or the receiver is gone.
pub fn spawn_stdin_reader(
    mut session: ConsoleSession,
    events: flume::Sender<GatewayEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if let Some(event) = session.interpret(&line) {
                if events.send(event).is_err() {
                    break;
                }
            }
        }
        info!("Console input closed");
    })
}
