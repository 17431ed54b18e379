pub mod appstate;
pub mod config;
pub mod database;
pub mod leaderboard;
pub mod rollprocessor;
pub mod telegramclient;
pub mod updatedispatcher;
