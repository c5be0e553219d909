// src/models/package.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'packages' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Informational only; nothing enforces it.
    pub difficulty_level: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Package row joined with its association count, for listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PackageSummary {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub difficulty_level: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub question_count: i64,
}

/// A package with its questions in exam order.
#[derive(Debug, Serialize)]
pub struct PackageDetail {
    #[serde(flatten)]
    pub package: Package,
    pub question_ids: Vec<i64>,
}

/// DTO for creating a package from an explicit question selection.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePackageRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub difficulty_level: Option<String>,
    /// Exam order is the order of this list.
    #[serde(default)]
    pub question_ids: Vec<i64>,
}

/// DTO for the admin "auto package" action.
#[derive(Debug, Default, Deserialize)]
pub struct AutoPackageRequest {
    pub size: Option<usize>,
}

/// Validated package fields ready to be written to the store.
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub title: String,
    pub description: Option<String>,
    pub difficulty_level: Option<String>,
}

/// A package and its question order, not yet written.
#[derive(Debug, Clone)]
pub struct PackageDraft {
    pub package: NewPackage,
    pub question_ids: Vec<i64>,
}
