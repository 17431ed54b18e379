use std::time::Duration;

use anyhow::anyhow;
use serde::{de::DeserializeOwned, Serialize};
use types::{
    GetChatParams, GetUpdatesParams, SendMessageParams, SetMyCommandsParams, TelegramResponse,
};
pub use types::{BotCommand, Chat, ChatInfo, Dice, Message, Update, User};

mod types;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";
/// sendMessage rejects longer texts
pub const MAX_MESSAGE_CHARS: usize = 4096;

// extra time given to a long poll on top of what we asked telegram to hold it for
const POLL_GRACE: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub trait TelegramClient {
    /// Long-polls for updates newer than `offset`
    fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> impl std::future::Future<Output = Result<Vec<Update>, anyhow::Error>> + Send;

    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to_message_id: Option<i64>,
    ) -> impl std::future::Future<Output = Result<(), anyhow::Error>> + Send;

    /// Looks up the current profile of a user (or any chat) by id
    fn get_chat(
        &self,
        chat_id: i64,
    ) -> impl std::future::Future<Output = Result<ChatInfo, anyhow::Error>> + Send;

    fn get_me(&self) -> impl std::future::Future<Output = Result<User, anyhow::Error>> + Send;

    fn set_my_commands(
        &self,
        commands: &[BotCommand],
    ) -> impl std::future::Future<Output = Result<(), anyhow::Error>> + Send;
}

pub struct TelegramReqwestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TelegramReqwestClient {
    pub fn new_with_token(token: &str) -> Self {
        TelegramReqwestClient::new_with_url_and_token(DEFAULT_API_URL, token)
    }

    pub fn new_with_url_and_token(api_url: &str, token: &str) -> Self {
        Self {
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            client: reqwest::Client::new(),
        }
    }

    async fn perform_request<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
        timeout: Duration,
    ) -> Result<R, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .timeout(timeout)
            .json(params)
            .send()
            .await?
            .json::<TelegramResponse<R>>()
            .await?;

        match response {
            TelegramResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            TelegramResponse { description, .. } => Err(anyhow!(
                "telegram {} failed: {}",
                method,
                description.unwrap_or_else(|| "no description".to_string())
            )),
        }
    }
}

impl TelegramClient for TelegramReqwestClient {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, anyhow::Error> {
        self.perform_request(
            "getUpdates",
            &GetUpdatesParams {
                offset,
                timeout: timeout_secs,
                allowed_updates: vec!["message"],
            },
            Duration::from_secs(timeout_secs) + POLL_GRACE,
        )
        .await
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to_message_id: Option<i64>,
    ) -> Result<(), anyhow::Error> {
        self.perform_request::<_, Message>(
            "sendMessage",
            &SendMessageParams {
                chat_id,
                text,
                reply_to_message_id,
            },
            REQUEST_TIMEOUT,
        )
        .await
        .map(|_| ())
    }

    async fn get_chat(&self, chat_id: i64) -> Result<ChatInfo, anyhow::Error> {
        self.perform_request("getChat", &GetChatParams { chat_id }, REQUEST_TIMEOUT)
            .await
    }

    async fn get_me(&self) -> Result<User, anyhow::Error> {
        self.perform_request("getMe", &serde_json::json!({}), REQUEST_TIMEOUT)
            .await
    }

    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), anyhow::Error> {
        self.perform_request::<_, bool>(
            "setMyCommands",
            &SetMyCommandsParams { commands },
            REQUEST_TIMEOUT,
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub reply_to_message_id: Option<i64>,
}

#[cfg(test)]
pub struct MockTelegramClient {
    pub updates_ret_val: std::sync::Mutex<std::collections::VecDeque<Vec<Update>>>,
    pub chats_ret_val: std::collections::HashMap<i64, ChatInfo>,
    pub get_chat_delay: Option<Duration>,
    pub me_ret_val: Result<User, anyhow::Error>,
    pub sent_messages: std::sync::Mutex<Vec<SentMessage>>,
    pub registered_commands: std::sync::Mutex<Vec<BotCommand>>,
}

#[cfg(test)]
impl Default for MockTelegramClient {
    fn default() -> Self {
        Self {
            updates_ret_val: Default::default(),
            chats_ret_val: Default::default(),
            get_chat_delay: None,
            me_ret_val: Err(anyhow!("default value")),
            sent_messages: Default::default(),
            registered_commands: Default::default(),
        }
    }
}

#[cfg(test)]
impl MockTelegramClient {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent_messages.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TelegramClient for MockTelegramClient {
    async fn get_updates(
        &self,
        _offset: Option<i64>,
        _timeout_secs: u64,
    ) -> Result<Vec<Update>, anyhow::Error> {
        let next = self.updates_ret_val.lock().unwrap().pop_front();
        match next {
            Some(updates) => Ok(updates),
            None => {
                // stands in for a long poll that times out with nothing new
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(vec![])
            }
        }
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to_message_id: Option<i64>,
    ) -> Result<(), anyhow::Error> {
        self.sent_messages.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            reply_to_message_id,
        });
        Ok(())
    }

    async fn get_chat(&self, chat_id: i64) -> Result<ChatInfo, anyhow::Error> {
        if let Some(delay) = self.get_chat_delay {
            tokio::time::sleep(delay).await;
        }
        self.chats_ret_val
            .get(&chat_id)
            .cloned()
            .ok_or(anyhow!("mock error: chat {} not found", chat_id))
    }

    async fn get_me(&self) -> Result<User, anyhow::Error> {
        self.me_ret_val
            .as_ref()
            .map_err(|e| anyhow!("mock error {}", e))
            .cloned()
    }

    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), anyhow::Error> {
        self.registered_commands
            .lock()
            .unwrap()
            .extend(commands.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::{Chat, Dice, Message, Update, User};

    pub fn user(id: i64, username: &str) -> User {
        User {
            id,
            is_bot: false,
            first_name: username.to_uppercase(),
            username: Some(username.to_string()),
        }
    }

    pub fn dice_message(message_id: i64, author: Option<User>, emoji: &str, value: u8) -> Message {
        Message {
            message_id,
            from: author,
            chat: Chat {
                id: -1001,
                kind: "supergroup".to_string(),
            },
            text: None,
            dice: Some(Dice {
                emoji: emoji.to_string(),
                value,
            }),
            forward_origin: None,
        }
    }

    pub fn text_message(message_id: i64, author: Option<User>, text: &str) -> Message {
        Message {
            text: Some(text.to_string()),
            dice: None,
            ..dice_message(message_id, author, "", 0)
        }
    }

    pub fn update(update_id: i64, message: Message) -> Update {
        Update {
            update_id,
            message: Some(message),
        }
    }
}
