// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'admins' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: i64,

    /// Unique login name.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// Shown as the assigner of the assignments this admin creates.
    pub display_name: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for admin login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for the subject's exam login with a one-time code.
#[derive(Debug, Deserialize, Validate)]
pub struct ExamLoginRequest {
    pub sicil: i64,
    #[validate(length(min = 1, max = 16, message = "Code is required"))]
    pub code: String,
}

/// A screener with their latest monthly success rate.
/// Read from the externally maintained personnel statistics.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct PersonnelRate {
    pub sicil: i64,
    pub full_name: String,
    /// Percentage, 0..=100.
    pub success_rate: f64,
    /// `YYYY-MM`.
    pub month: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ClassifiedPersonnel {
    pub red: Vec<PersonnelRate>,
    pub yellow: Vec<PersonnelRate>,
    pub green: Vec<PersonnelRate>,
}
