use std::sync::Arc;

use tokio::sync::Mutex;

mod types;

use crate::{
    database::{
        types::{RollRecord, UserRecord},
        Database,
    },
    telegramclient::Message,
};
pub use types::{JackpotRule, ProcessResult, RollEvent, JACKPOT_EMOJI, JACKPOT_VALUE};

pub const JACKPOT_REPLY: &str = "holy you're cracked";

/// Counts jackpot hits per user as rolls come in
pub struct RollProcessor<D: Database + Send> {
    database: Arc<Mutex<D>>,
    rule: JackpotRule,
}

impl<D: Database + Send> RollProcessor<D> {
    pub fn new(database: Arc<Mutex<D>>, rule: JackpotRule) -> Self {
        Self { database, rule }
    }

    /// Counts the message if it is a dice roll from a user, ignores it otherwise
    pub async fn process_message(&self, message: &Message) -> Result<ProcessResult, anyhow::Error> {
        match RollEvent::from_message(message) {
            Some(event) => self.process_roll(event).await,
            None => {
                log::debug!(
                    "Message {} in chat {} is not a countable roll",
                    message.message_id,
                    message.chat.id
                );
                Ok(ProcessResult::Ignored)
            }
        }
    }

    pub async fn process_roll(&self, event: RollEvent) -> Result<ProcessResult, anyhow::Error> {
        let is_jackpot = self.rule.is_jackpot(&event.emoji, event.value);

        // held for the whole read-modify-write so concurrent rolls can't lose updates
        let database = self.database.lock().await;
        let logged = database.atomically(|db| {
            let logged = db.insert_roll_record(RollRecord {
                chat_id: event.chat_id,
                message_id: event.message_id,
                user_id: event.user_id,
                emoji: event.emoji.clone(),
                value: event.value,
            })?;
            if !logged {
                return Ok(false);
            }

            let mut record = db.get_user_record(event.user_id)?.unwrap_or(UserRecord {
                id: event.user_id,
                display_name: event.display_name.clone(),
                hit_count: 0,
            });
            record.display_name = event.display_name.clone();
            if is_jackpot {
                record.hit_count += 1;
            }
            db.insert_user_record(record)?;

            Ok(true)
        })?;
        drop(database);

        if !logged {
            log::info!(
                "Message {} in chat {} was already counted, skipping",
                event.message_id,
                event.chat_id
            );
            return Ok(ProcessResult::Duplicate);
        }

        log::debug!(
            "{} ({}) rolled {} {}, jackpot? {}",
            event.display_name,
            event.user_id,
            event.emoji,
            event.value,
            is_jackpot
        );
        Ok(ProcessResult::Recorded { is_jackpot })
    }
}
