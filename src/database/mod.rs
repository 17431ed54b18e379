use std::path::Path;

use rusqlite::OptionalExtension;
use types::{RollRecord, UserRecord};

pub mod types;

pub trait Database {
    // Gets a user record from the DB, None if the user was never seen
    fn get_user_record(&self, id: i64) -> Result<Option<UserRecord>, anyhow::Error>;

    // Inserts or overwrites a user record
    fn insert_user_record(&self, record: UserRecord) -> Result<(), anyhow::Error>;

    // Gets a list of all users from the DB, in no particular order
    fn get_all_users(&self) -> Result<Vec<UserRecord>, anyhow::Error>;

    // Logs a roll. Returns false if the same (chat, message) pair was already logged
    fn insert_roll_record(&self, roll: RollRecord) -> Result<bool, anyhow::Error>;

    // Gets every logged roll for a user, oldest message first
    fn get_rolls_for_user(&self, user_id: i64) -> Result<Vec<RollRecord>, anyhow::Error>;

    /// Runs `f` inside a single transaction. Everything `f` wrote is committed
    /// if it returns Ok, and rolled back otherwise.
    fn atomically<T, F>(&self, f: F) -> Result<T, anyhow::Error>
    where
        F: FnOnce(&Self) -> Result<T, anyhow::Error>;
}

#[derive(Default, Debug)]
pub struct DatabaseConnectionCreater {
    file_path: Option<String>,
}

pub struct DatabaseConnection {
    connection: rusqlite::Connection,
}

impl DatabaseConnectionCreater {
    pub fn open_else_new(file_path: &str) -> Self {
        Self {
            file_path: Some(file_path.to_string()),
        }
    }

    pub fn open_in_memory() -> Self {
        Self::default()
    }

    fn initialize_tables_if_needed(
        dbconn: DatabaseConnection,
    ) -> Result<DatabaseConnection, anyhow::Error> {
        let statement = r#"
CREATE TABLE IF NOT EXISTS "users" (
  "ID"	INTEGER NOT NULL,
  "DISPLAY_NAME"	TEXT NOT NULL,
  "HIT_COUNT"	INTEGER NOT NULL DEFAULT 0,
  PRIMARY KEY("ID")
);
CREATE TABLE IF NOT EXISTS "rolls" (
  "CHAT_ID"	INTEGER NOT NULL,
  "MESSAGE_ID"	INTEGER NOT NULL,
  "USER_ID"	INTEGER NOT NULL,
  "EMOJI"	TEXT NOT NULL,
  "VALUE"	INTEGER NOT NULL,
  PRIMARY KEY("CHAT_ID", "MESSAGE_ID")
);
CREATE INDEX IF NOT EXISTS "rolls_by_user" ON "rolls" ("USER_ID");
"#;
        dbconn.connection.execute_batch(statement)?;
        Ok(dbconn)
    }

    pub fn start(self) -> Result<DatabaseConnection, anyhow::Error> {
        let connection = match self.file_path {
            Some(path) => {
                if let Some(parent) = Path::new(&path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                log::info!("Opening database at {}", path);
                DatabaseConnection {
                    connection: rusqlite::Connection::open(path)?,
                }
            }
            None => DatabaseConnection {
                connection: rusqlite::Connection::open_in_memory()?,
            },
        };

        Self::initialize_tables_if_needed(connection)
    }
}

fn user_record_from_row(row: &rusqlite::Row<'_>) -> Result<UserRecord, rusqlite::Error> {
    Ok(UserRecord {
        id: row.get(0)?,
        display_name: row.get(1)?,
        hit_count: row.get(2)?,
    })
}

impl Database for DatabaseConnection {
    fn get_user_record(&self, id: i64) -> Result<Option<UserRecord>, anyhow::Error> {
        let mut statement = self.connection.prepare(
            r#"SELECT ID, DISPLAY_NAME, HIT_COUNT FROM users WHERE ID = ? LIMIT 1;"#,
        )?;
        Ok(statement
            .query_row((id,), user_record_from_row)
            .optional()?)
    }

    fn insert_user_record(&self, record: UserRecord) -> Result<(), anyhow::Error> {
        let statement =
            r#"INSERT OR REPLACE INTO users (ID, DISPLAY_NAME, HIT_COUNT) VALUES (?, ?, ?);"#;

        self.connection.execute(
            statement,
            (record.id, record.display_name, record.hit_count),
        )?;

        Ok(())
    }

    fn get_all_users(&self) -> Result<Vec<UserRecord>, anyhow::Error> {
        let mut statement = self
            .connection
            .prepare(r#"SELECT ID, DISPLAY_NAME, HIT_COUNT FROM users"#)?;
        let records = statement
            .query_map((), user_record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn insert_roll_record(&self, roll: RollRecord) -> Result<bool, anyhow::Error> {
        let statement = r#"INSERT OR IGNORE INTO rolls (CHAT_ID, MESSAGE_ID, USER_ID, EMOJI, VALUE) VALUES (?, ?, ?, ?, ?);"#;

        let inserted = self.connection.execute(
            statement,
            (
                roll.chat_id,
                roll.message_id,
                roll.user_id,
                roll.emoji,
                roll.value,
            ),
        )?;

        Ok(inserted == 1)
    }

    fn get_rolls_for_user(&self, user_id: i64) -> Result<Vec<RollRecord>, anyhow::Error> {
        let mut statement = self.connection.prepare(
            r#"SELECT CHAT_ID, MESSAGE_ID, USER_ID, EMOJI, VALUE FROM rolls WHERE USER_ID = ? ORDER BY CHAT_ID, MESSAGE_ID"#,
        )?;
        let rolls = statement
            .query_map((user_id,), |row| {
                Ok(RollRecord {
                    chat_id: row.get(0)?,
                    message_id: row.get(1)?,
                    user_id: row.get(2)?,
                    emoji: row.get(3)?,
                    value: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rolls)
    }

    fn atomically<T, F>(&self, f: F) -> Result<T, anyhow::Error>
    where
        F: FnOnce(&Self) -> Result<T, anyhow::Error>,
    {
        // dropping the transaction without committing rolls it back
        let transaction = self.connection.unchecked_transaction()?;
        let result = f(self)?;
        transaction.commit()?;
        Ok(result)
    }
}

/// In-memory store whose user writes can be made to fail
#[cfg(test)]
pub struct MockFailingDatabase {
    pub inner: DatabaseConnection,
    pub fail_user_writes: bool,
}

#[cfg(test)]
impl Default for MockFailingDatabase {
    fn default() -> Self {
        Self {
            inner: DatabaseConnectionCreater::open_in_memory()
                .start()
                .expect("can open in memory db"),
            fail_user_writes: true,
        }
    }
}

#[cfg(test)]
impl Database for MockFailingDatabase {
    fn get_user_record(&self, id: i64) -> Result<Option<UserRecord>, anyhow::Error> {
        self.inner.get_user_record(id)
    }

    fn insert_user_record(&self, record: UserRecord) -> Result<(), anyhow::Error> {
        if self.fail_user_writes {
            return Err(anyhow::anyhow!("mock error: disk is full"));
        }
        self.inner.insert_user_record(record)
    }

    fn get_all_users(&self) -> Result<Vec<UserRecord>, anyhow::Error> {
        self.inner.get_all_users()
    }

    fn insert_roll_record(&self, roll: RollRecord) -> Result<bool, anyhow::Error> {
        self.inner.insert_roll_record(roll)
    }

    fn get_rolls_for_user(&self, user_id: i64) -> Result<Vec<RollRecord>, anyhow::Error> {
        self.inner.get_rolls_for_user(user_id)
    }

    fn atomically<T, F>(&self, f: F) -> Result<T, anyhow::Error>
    where
        F: FnOnce(&Self) -> Result<T, anyhow::Error>,
    {
        self.inner.atomically(|_| f(self))
    }
}
