use crate::telegramclient::Message;

pub const JACKPOT_EMOJI: &str = "🎰";
/// Highest value the slot machine can roll, three sevens
pub const JACKPOT_VALUE: u8 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JackpotRule {
    pub emoji: String,
    pub value: u8,
}

impl Default for JackpotRule {
    fn default() -> Self {
        Self {
            emoji: JACKPOT_EMOJI.to_string(),
            value: JACKPOT_VALUE,
        }
    }
}

impl JackpotRule {
    pub fn is_jackpot(&self, emoji: &str, value: u8) -> bool {
        emoji == self.emoji && value == self.value
    }
}

/// A dice roll attributed to a user, ready to be counted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollEvent {
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub emoji: String,
    pub value: u8,
}

impl RollEvent {
    /// None for anything that isn't a roll made by a user: no sender, no dice,
    /// or a dice forwarded from elsewhere.
    pub fn from_message(message: &Message) -> Option<Self> {
        let author = message.from.as_ref()?;
        let dice = message.dice.as_ref()?;
        if message.forward_origin.is_some() {
            return None;
        }

        Some(Self {
            chat_id: message.chat.id,
            message_id: message.message_id,
            user_id: author.id,
            display_name: author.display_name(),
            emoji: dice.emoji.clone(),
            value: dice.value,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// Not a roll, nothing was stored
    Ignored,
    /// This message was already counted
    Duplicate,
    Recorded { is_jackpot: bool },
}

impl ProcessResult {
    pub fn is_jackpot(&self) -> bool {
        matches!(self, ProcessResult::Recorded { is_jackpot: true })
    }
}
