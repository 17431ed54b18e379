use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use futures_retry::{FutureRetry, RetryPolicy};
use regex::Regex;
use tokio::task::JoinHandle;

use crate::{
    database::Database,
    leaderboard::LeaderboardBuilder,
    rollprocessor::{RollProcessor, JACKPOT_REPLY},
    telegramclient::{BotCommand, Message, TelegramClient, Update, MAX_MESSAGE_CHARS},
};

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);
const MAX_POLL_FAILURES: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Leaderboard,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "leaderboard" => Some(Command::Leaderboard),
            _ => None,
        }
    }

    pub fn bot_commands() -> Vec<BotCommand> {
        vec![BotCommand {
            command: "leaderboard".to_string(),
            description: "Who hit the jackpot the most".to_string(),
        }]
    }
}

/// Routes incoming updates: dice go to the roll processor, commands to their handlers
pub struct UpdateDispatcher<D: Database + Send + 'static, T: TelegramClient + Send + Sync + 'static> {
    processor: RollProcessor<D>,
    builder: LeaderboardBuilder<D, T>,
    telegramclient: Arc<T>,
    command_pattern: Regex,
    bot_username: Option<String>,
    poll_timeout_secs: u64,
}

impl<D: Database + Send + 'static, T: TelegramClient + Send + Sync + 'static> UpdateDispatcher<D, T> {
    pub fn new(
        processor: RollProcessor<D>,
        builder: LeaderboardBuilder<D, T>,
        telegramclient: Arc<T>,
        poll_timeout_secs: u64,
    ) -> Result<Self, anyhow::Error> {
        Ok(Self {
            processor,
            builder,
            telegramclient,
            command_pattern: Regex::new(r"^/([A-Za-z0-9_]+)(?:@([A-Za-z0-9_]+))?(?:\s|$)")?,
            bot_username: None,
            poll_timeout_secs,
        })
    }

    /// Commands addressed to another bot (`/leaderboard@otherbot`) are not ours
    pub fn parse_command(&self, text: &str) -> Option<Command> {
        let captures = self.command_pattern.captures(text)?;
        if let (Some(target), Some(me)) = (captures.get(2), self.bot_username.as_deref()) {
            if !target.as_str().eq_ignore_ascii_case(me) {
                return None;
            }
        }
        Command::from_name(&captures.get(1)?.as_str().to_ascii_lowercase())
    }

    pub async fn handle_update(&self, update: Update) -> Result<(), anyhow::Error> {
        let message = match update.message {
            Some(message) => message,
            None => {
                log::debug!("Update {} has no message, ignoring", update.update_id);
                return Ok(());
            }
        };

        if message.dice.is_some() {
            return self.handle_roll(&message).await;
        }

        match message.text.as_deref().and_then(|text| self.parse_command(text)) {
            Some(Command::Leaderboard) => self.handle_leaderboard(&message).await,
            None => Ok(()),
        }
    }

    async fn handle_roll(&self, message: &Message) -> Result<(), anyhow::Error> {
        if self.processor.process_message(message).await?.is_jackpot() {
            log::info!(
                "Jackpot in chat {} (message {})",
                message.chat.id,
                message.message_id
            );
            self.telegramclient
                .send_message(message.chat.id, JACKPOT_REPLY, Some(message.message_id))
                .await?;
        }
        Ok(())
    }

    async fn handle_leaderboard(&self, message: &Message) -> Result<(), anyhow::Error> {
        let leaderboard = self.builder.build_leaderboard().await?;
        let pieces = leaderboard.to_messages(MAX_MESSAGE_CHARS);
        if pieces.len() > 1 {
            log::debug!("Leaderboard is split over {} messages", pieces.len());
        }
        for piece in pieces {
            self.telegramclient
                .send_message(message.chat.id, &piece, Some(message.message_id))
                .await?;
        }
        Ok(())
    }

    /// Fetches one batch of updates and spawns a handler per update.
    /// Returns the offset for the next poll along with the handler tasks.
    pub async fn poll_once(
        self: &Arc<Self>,
        offset: Option<i64>,
    ) -> Result<(Option<i64>, Vec<JoinHandle<()>>), anyhow::Error> {
        let mut consecutive_failures = 0;
        let (updates, _attempts) = FutureRetry::new(
            || self.telegramclient.get_updates(offset, self.poll_timeout_secs),
            |e: anyhow::Error| {
                consecutive_failures += 1;
                if consecutive_failures >= MAX_POLL_FAILURES {
                    return RetryPolicy::ForwardError(e);
                }
                log::warn!("Polling for updates failed, retrying: {}", e);
                RetryPolicy::WaitRetry(POLL_RETRY_DELAY)
            },
        )
        .await
        .map_err(|(e, attempts)| anyhow!("polling failed {} times in a row: {}", attempts, e))?;

        let next_offset = updates
            .iter()
            .map(|update| update.update_id + 1)
            .max()
            .or(offset);

        let handles = updates
            .into_iter()
            .map(|update| {
                let dispatcher = self.clone();
                tokio::task::spawn(async move {
                    let update_id = update.update_id;
                    if let Err(e) = dispatcher.handle_update(update).await {
                        log::error!("problem while handling update {}: {}", update_id, e);
                    }
                })
            })
            .collect();

        Ok((next_offset, handles))
    }

    /// Registers the bot's commands, then polls until polling fails for good
    pub async fn run(mut self) -> Result<(), anyhow::Error> {
        match self.telegramclient.get_me().await {
            Ok(me) => {
                log::info!("Logged in as {:?}", me.username);
                self.bot_username = me.username;
            }
            Err(e) => log::warn!("can't get own bot profile, accepting all command mentions: {}", e),
        }

        if let Err(e) = self
            .telegramclient
            .set_my_commands(&Command::bot_commands())
            .await
        {
            log::warn!("can't register bot commands: {}", e);
        }

        let dispatcher = Arc::new(self);
        let mut offset = None;

        log::info!("Now entering main event loop");
        loop {
            let (next_offset, _handles) = dispatcher.poll_once(offset).await?;
            offset = next_offset;
        }
    }
}
