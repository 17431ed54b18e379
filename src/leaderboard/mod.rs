use std::sync::Arc;

use futures::StreamExt;
use itertools::Itertools;
use tokio::sync::Mutex;

mod types;

use crate::{
    database::{types::UserRecord, Database},
    telegramclient::TelegramClient,
};
pub use types::{LabelSource, Leaderboard, LeaderboardLine, LEADERBOARD_HEADER};

/// Most hits first, ties broken by lowest user id
pub fn rank_records(records: Vec<UserRecord>) -> Vec<UserRecord> {
    records
        .into_iter()
        .sorted_by(|a, b| b.hit_count.cmp(&a.hit_count).then(a.id.cmp(&b.id)))
        .collect()
}

pub struct LeaderboardBuilder<D: Database + Send, T: TelegramClient + Send + Sync> {
    database: Arc<Mutex<D>>,
    telegramclient: Arc<T>,
    label_source: LabelSource,
}

impl<D: Database + Send, T: TelegramClient + Send + Sync> LeaderboardBuilder<D, T> {
    pub fn new(database: Arc<Mutex<D>>, telegramclient: Arc<T>, label_source: LabelSource) -> Self {
        Self {
            database,
            telegramclient,
            label_source,
        }
    }

    /// Reads every user and ranks them. Never writes to the store.
    pub async fn build_leaderboard(&self) -> Result<Leaderboard, anyhow::Error> {
        let records = {
            let database = self.database.lock().await;
            database.get_all_users()?
        };
        log::debug!("Building leaderboard for {} users", records.len());

        let ranked = rank_records(records);
        let labels = self.resolve_labels(&ranked).await;

        Ok(Leaderboard {
            lines: ranked
                .into_iter()
                .zip(labels)
                .enumerate()
                .map(|(index, (record, label))| LeaderboardLine {
                    rank: index + 1,
                    user_id: record.id,
                    label,
                    hit_count: record.hit_count,
                })
                .collect(),
        })
    }

    async fn resolve_labels(&self, ranked: &[UserRecord]) -> Vec<String> {
        match self.label_source {
            LabelSource::Stored => ranked
                .iter()
                .map(|record| record.display_name.clone())
                .collect(),
            LabelSource::Directory {
                timeout,
                concurrency,
            } => {
                let lookups = ranked
                    .iter()
                    .map(|record| self.lookup_label(record, timeout))
                    .collect::<Vec<_>>();

                // buffered keeps the output in input order
                futures::stream::iter(lookups)
                    .buffered(concurrency.max(1))
                    .collect::<Vec<_>>()
                    .await
            }
        }
    }

    async fn lookup_label(&self, record: &UserRecord, timeout: std::time::Duration) -> String {
        match tokio::time::timeout(timeout, self.telegramclient.get_chat(record.id)).await {
            // bare usernames, the same form the stored names take
            Ok(Ok(chat)) => match chat.username {
                Some(username) => username,
                None => {
                    log::debug!("User {} has no username, using stored name", record.id);
                    record.display_name.clone()
                }
            },
            Ok(Err(e)) => {
                log::warn!("Lookup for user {} failed, using stored name: {}", record.id, e);
                record.display_name.clone()
            }
            Err(_) => {
                log::warn!(
                    "Lookup for user {} timed out after {:?}, using stored name",
                    record.id,
                    timeout
                );
                record.display_name.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::sync::Mutex;

    use super::{rank_records, LabelSource, LeaderboardBuilder, LEADERBOARD_HEADER};
    use crate::{
        database::{types::UserRecord, Database, DatabaseConnection, DatabaseConnectionCreater},
        rollprocessor::{JackpotRule, RollEvent, RollProcessor, JACKPOT_EMOJI},
        telegramclient::{ChatInfo, MockTelegramClient},
    };

    fn record(id: i64, name: &str, hit_count: u64) -> UserRecord {
        UserRecord {
            id,
            display_name: name.to_string(),
            hit_count,
        }
    }

    fn new_database(records: Vec<UserRecord>) -> Arc<Mutex<DatabaseConnection>> {
        let database = DatabaseConnectionCreater::open_in_memory()
            .start()
            .expect("can open in memory db");
        for record in records {
            database.insert_user_record(record).expect("can insert");
        }
        Arc::new(Mutex::new(database))
    }

    fn stored_builder(
        database: Arc<Mutex<DatabaseConnection>>,
    ) -> LeaderboardBuilder<DatabaseConnection, MockTelegramClient> {
        LeaderboardBuilder::new(
            database,
            Arc::new(MockTelegramClient::default()),
            LabelSource::Stored,
        )
    }

    #[test]
    fn test_rank_records_sorts_by_hits_then_id() {
        let ranked = rank_records(vec![
            record(5, "e", 1),
            record(2, "b", 3),
            record(9, "i", 3),
            record(1, "a", 0),
            record(3, "c", 1),
        ]);
        let ids = ranked.iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![2, 9, 3, 5, 1]);
    }

    #[tokio::test]
    async fn test_empty_store_renders_header_only() {
        let builder = stored_builder(new_database(vec![]));
        let leaderboard = builder.build_leaderboard().await.expect("can build");

        assert!(leaderboard.lines.is_empty());
        assert_eq!(leaderboard.to_string(), LEADERBOARD_HEADER);
    }

    #[tokio::test]
    async fn test_two_user_scenario() {
        let database = new_database(vec![]);
        let processor = RollProcessor::new(database.clone(), JackpotRule::default());
        let rolls = [(1, 1, "A", 64), (2, 1, "A", 64), (3, 2, "B", 17)];
        for (message_id, user_id, name, value) in rolls {
            processor
                .process_roll(RollEvent {
                    chat_id: -1001,
                    message_id,
                    user_id,
                    display_name: name.to_string(),
                    emoji: JACKPOT_EMOJI.to_string(),
                    value,
                })
                .await
                .expect("can process roll");
        }

        let leaderboard = stored_builder(database)
            .build_leaderboard()
            .await
            .expect("can build");
        assert_eq!(leaderboard.to_string(), "Leaderboard:\n1. A - 2\n2. B - 0");
    }

    #[tokio::test]
    async fn test_includes_zero_hit_users_and_is_sorted() {
        let database = new_database(vec![
            record(1, "one", 0),
            record(2, "two", 4),
            record(3, "three", 2),
            record(4, "four", 4),
        ]);
        let leaderboard = stored_builder(database)
            .build_leaderboard()
            .await
            .expect("can build");

        assert_eq!(leaderboard.lines.len(), 4);
        assert!(leaderboard
            .lines
            .windows(2)
            .all(|pair| pair[0].hit_count >= pair[1].hit_count));
        let ranks = leaderboard.lines.iter().map(|l| l.rank).collect::<Vec<_>>();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        assert_eq!(leaderboard.lines[0].label, "two");
        assert_eq!(leaderboard.lines[1].label, "four");
    }

    #[tokio::test]
    async fn test_building_twice_is_identical_and_read_only() {
        let database = new_database(vec![record(1, "one", 3), record(2, "two", 1)]);
        let builder = stored_builder(database.clone());

        let first = builder.build_leaderboard().await.expect("can build");
        let second = builder.build_leaderboard().await.expect("can build");
        assert_eq!(first, second);

        let mut users = database.lock().await.get_all_users().expect("can list");
        users.sort_by_key(|u| u.id);
        assert_eq!(users, vec![record(1, "one", 3), record(2, "two", 1)]);
    }

    #[tokio::test]
    async fn test_directory_lookup_degrades_per_entry() {
        let database = new_database(vec![
            record(1, "stored_one", 5),
            record(2, "stored_two", 3),
            record(3, "stored_three", 1),
        ]);
        let mut client = MockTelegramClient::default();
        client.chats_ret_val.insert(
            1,
            ChatInfo {
                id: 1,
                username: Some("live_one".to_string()),
                first_name: Some("One".to_string()),
            },
        );
        client.chats_ret_val.insert(
            3,
            ChatInfo {
                id: 3,
                username: None,
                first_name: Some("Three".to_string()),
            },
        );
        // user 2 is missing, so its lookup fails

        let builder = LeaderboardBuilder::new(
            database,
            Arc::new(client),
            LabelSource::Directory {
                timeout: Duration::from_secs(1),
                concurrency: 2,
            },
        );
        let leaderboard = builder.build_leaderboard().await.expect("lookup errors don't abort");

        assert_eq!(
            leaderboard.to_string(),
            "Leaderboard:\n1. live_one - 5\n2. stored_two - 3\n3. stored_three - 1"
        );
        assert!(leaderboard.lines.iter().all(|l| !l.label.starts_with('@')));
    }

    #[tokio::test]
    async fn test_directory_lookup_timeout_falls_back() {
        let database = new_database(vec![record(1, "stored_one", 1)]);
        let mut client = MockTelegramClient::default();
        client.chats_ret_val.insert(
            1,
            ChatInfo {
                id: 1,
                username: Some("too_slow".to_string()),
                first_name: None,
            },
        );
        client.get_chat_delay = Some(Duration::from_millis(500));

        let builder = LeaderboardBuilder::new(
            database,
            Arc::new(client),
            LabelSource::Directory {
                timeout: Duration::from_millis(20),
                concurrency: 4,
            },
        );
        let leaderboard = builder.build_leaderboard().await.expect("can build");

        assert_eq!(leaderboard.lines[0].label, "stored_one");
    }
}
