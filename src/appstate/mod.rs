use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    config::Config,
    database::{Database, DatabaseConnection, DatabaseConnectionCreater},
    leaderboard::LeaderboardBuilder,
    rollprocessor::{JackpotRule, RollProcessor},
    telegramclient::{TelegramClient, TelegramReqwestClient},
    updatedispatcher::UpdateDispatcher,
};

#[cfg(test)]
use crate::telegramclient::MockTelegramClient;

pub struct AppState<D: Database + Send, T: TelegramClient + Send + Sync> {
    pub database: Arc<Mutex<D>>,
    pub telegramclient: Arc<T>,
    pub config: Config,
}

impl<D: Database + Send, T: TelegramClient + Send + Sync> Clone for AppState<D, T> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            telegramclient: self.telegramclient.clone(),
            config: self.config.clone(),
        }
    }
}

impl<D: Database + Send + 'static, T: TelegramClient + Send + Sync + 'static> AppState<D, T> {
    pub fn roll_processor(&self) -> RollProcessor<D> {
        RollProcessor::new(self.database.clone(), JackpotRule::default())
    }

    pub fn leaderboard_builder(&self) -> LeaderboardBuilder<D, T> {
        LeaderboardBuilder::new(
            self.database.clone(),
            self.telegramclient.clone(),
            self.config.label_source(),
        )
    }

    pub fn dispatcher(&self) -> Result<UpdateDispatcher<D, T>, anyhow::Error> {
        UpdateDispatcher::new(
            self.roll_processor(),
            self.leaderboard_builder(),
            self.telegramclient.clone(),
            self.config.poll_timeout_secs,
        )
    }
}

pub fn new_real_appstate(
    config: Config,
) -> Result<AppState<DatabaseConnection, TelegramReqwestClient>, anyhow::Error> {
    Ok(AppState {
        database: Arc::new(Mutex::new(
            DatabaseConnectionCreater::open_else_new(&config.database_path).start()?,
        )),
        telegramclient: Arc::new(TelegramReqwestClient::new_with_url_and_token(
            &config.telegram_api_url,
            &config.telegram_token,
        )),
        config,
    })
}

#[cfg(test)]
pub fn new_testing_appstate(
    telegramclient: MockTelegramClient,
) -> Result<AppState<DatabaseConnection, MockTelegramClient>, anyhow::Error> {
    let config = Config::from_lookup(|key| match key {
        "TG_TOKEN" => Some("testing".to_string()),
        _ => None,
    })?;

    Ok(AppState {
        database: Arc::new(Mutex::new(
            DatabaseConnectionCreater::open_in_memory().start()?,
        )),
        telegramclient: Arc::new(telegramclient),
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::new_testing_appstate;
    use crate::{
        database::Database,
        rollprocessor::JACKPOT_EMOJI,
        telegramclient::{
            fixtures::{dice_message, text_message, update, user},
            MockTelegramClient,
        },
    };

    #[tokio::test]
    async fn test_components_share_one_store() {
        let app_state = new_testing_appstate(MockTelegramClient::default())
            .expect("can create test appstate");

        app_state
            .roll_processor()
            .process_message(&dice_message(1, Some(user(4, "dora")), JACKPOT_EMOJI, 64))
            .await
            .expect("can process");

        let leaderboard = app_state
            .leaderboard_builder()
            .build_leaderboard()
            .await
            .expect("can build");
        assert_eq!(leaderboard.to_string(), "Leaderboard:\n1. dora - 1");

        let cloned = app_state.clone();
        assert_eq!(
            cloned
                .database
                .lock()
                .await
                .get_all_users()
                .expect("can list")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_run_registers_commands_and_serves_updates() {
        let mut client = MockTelegramClient::default();
        client.me_ret_val = Ok(user(999, "gamblerbot"));
        client.updates_ret_val.lock().unwrap().push_back(vec![update(
            1,
            text_message(1, Some(user(1, "ann")), "/leaderboard@gamblerbot"),
        )]);
        let app_state = new_testing_appstate(client).expect("can create test appstate");
        let client = app_state.telegramclient.clone();
        let dispatcher = app_state.dispatcher().expect("can create dispatcher");

        // run never returns on its own, so only give it a moment
        let _ = tokio::time::timeout(std::time::Duration::from_millis(200), dispatcher.run()).await;

        assert_eq!(client.registered_commands.lock().unwrap().len(), 1);
        assert_eq!(client.sent().len(), 1);
        assert_eq!(client.sent()[0].text, "Leaderboard:");
    }
}
