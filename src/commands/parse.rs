#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Commands,
    Sounds,
    MostPlayed,
    Random,
    Stop,
    Remove(String),
    JoinSound(String),
    RemoveJoinSound,
    Play(String),
}

impl Command {
    /// Parses a chat line. `None` if it is not addressed to the bot.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        let body = content.strip_prefix(prefix)?.trim();
        if body.is_empty() {
            return None;
        }

        let (head, arg) = match body.split_once(char::is_whitespace) {
            Some((head, arg)) => (head, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (body, None),
        };

        Some(match (head, arg) {
            ("commands", None) => Self::Commands,
            ("sounds", None) => Self::Sounds,
            ("mostplayed", None) => Self::MostPlayed,
            ("random", None) => Self::Random,
            ("stop", None) => Self::Stop,
            ("removejoinsound", None) => Self::RemoveJoinSound,
            ("remove", Some(name)) => Self::Remove(name.to_string()),
            ("joinsound", Some(name)) => Self::JoinSound(name.to_string()),
            _ => Self::Play(body.to_string()),
        })
    }
}
