//! Chat boosts reported by Telegram (`chat_boosts` collection).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatBoostRecord {
    pub user_id: u64,
    pub chat_id: i64,
    pub boost_id: String,
    /// Unix timestamp.
    pub add_date: i64,
    /// Unix timestamp.
    pub expiration_date: i64,
}
