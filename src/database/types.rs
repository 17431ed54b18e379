#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub display_name: String,
    pub hit_count: u64,
}

/// One logged dice roll. `(chat_id, message_id)` identifies a delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollRecord {
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub emoji: String,
    pub value: u8,
}
