//! Partial definition of the Telegram Bot API objects the bot reads and sends

use serde::{Deserialize, Serialize};

/// Envelope every Bot API method answers with
#[derive(Debug, Deserialize)]
pub(super) struct TelegramResponse<T> {
    pub(super) ok: bool,
    pub(super) result: Option<T>,
    pub(super) description: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub dice: Option<Dice>,
    /// Present when the message was forwarded from somewhere else
    pub forward_origin: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

impl User {
    /// The handle shown on the leaderboard: username if set, first name otherwise
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.first_name.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChatInfo {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Dice {
    pub emoji: String,
    pub value: u8,
}

#[derive(Debug, Serialize, Clone)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub(super) struct GetUpdatesParams {
    pub(super) offset: Option<i64>,
    pub(super) timeout: u64,
    pub(super) allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub(super) struct SendMessageParams<'a> {
    pub(super) chat_id: i64,
    pub(super) text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) reply_to_message_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct GetChatParams {
    pub(super) chat_id: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct SetMyCommandsParams<'a> {
    pub(super) commands: &'a [BotCommand],
}
