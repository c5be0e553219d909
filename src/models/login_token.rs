// src/models/login_token.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'login_tokens' table in the database.
/// A code opens the exam area once, while unused and unexpired.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LoginToken {
    pub id: i64,
    pub code: String,
    pub user_sicil: i64,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl LoginToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && now < self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NewLoginToken {
    pub code: String,
    pub user_sicil: i64,
    pub expires_at: DateTime<Utc>,
}
