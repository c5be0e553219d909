// src/store/mod.rs

//! Persistence boundary of the exam service.
//!
//! Every method is one logical operation. Multi-row writes
//! (`insert_package`, `insert_assignment_batch`, `complete_assignment`,
//! `delete_*`) either commit fully or not at all.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{
        assignment::{Assignment, AssignmentListItem, NewAssignment, TrackingEntry},
        attempt::{Attempt, NewAttempt},
        login_token::NewLoginToken,
        package::{NewPackage, Package, PackageDraft, PackageSummary},
        question::{NewQuestion, Question},
        user::{AdminUser, PersonnelRate},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type DynStore = Arc<dyn ExamStore>;

#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn find_admin_by_username(&self, username: &str) -> AppResult<Option<AdminUser>>;
    async fn insert_admin(
        &self,
        username: &str,
        password_hash: &str,
        display_name: &str,
    ) -> AppResult<i64>;

    async fn list_questions(&self) -> AppResult<Vec<Question>>;
    async fn find_question(&self, id: i64) -> AppResult<Option<Question>>;
    /// Questions among `ids` that exist, in no particular order.
    async fn find_questions(&self, ids: &[i64]) -> AppResult<Vec<Question>>;
    async fn list_question_ids(&self) -> AppResult<Vec<i64>>;
    async fn insert_question(&self, question: &NewQuestion) -> AppResult<i64>;
    async fn update_question(&self, id: i64, question: &NewQuestion) -> AppResult<bool>;
    /// Removes the question and its package associations.
    async fn delete_question(&self, id: i64) -> AppResult<bool>;

    /// Writes the package and its ordered associations together.
    async fn insert_package(&self, package: &NewPackage, question_ids: &[i64]) -> AppResult<i64>;
    async fn list_packages(&self) -> AppResult<Vec<PackageSummary>>;
    async fn find_package(&self, id: i64) -> AppResult<Option<Package>>;
    /// Question ids in exam order.
    async fn package_question_ids(&self, package_id: i64) -> AppResult<Vec<i64>>;
    async fn count_package_questions(&self, package_id: i64) -> AppResult<i64>;
    /// Removes the associations, then the package. Questions are untouched.
    async fn delete_package(&self, id: i64) -> AppResult<bool>;

    /// Writes the new packages, the assignments (with their question snapshots)
    /// and the tokens together. `PackageRef::New(i)` points at `packages[i]`.
    /// Returns the new assignment ids in input order.
    async fn insert_assignment_batch(
        &self,
        packages: &[PackageDraft],
        assignments: &[NewAssignment],
        tokens: &[NewLoginToken],
    ) -> AppResult<Vec<i64>>;
    /// Whether an unused, unexpired token already carries `code`.
    async fn is_code_active(&self, code: &str, now: DateTime<Utc>) -> AppResult<bool>;
    /// Flips one matching token from unused to used in a single conditional write.
    /// `true` only for the request that performed the flip.
    async fn consume_login_token(
        &self,
        sicil: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    async fn list_assignments_for_subject(&self, sicil: i64)
    -> AppResult<Vec<AssignmentListItem>>;
    async fn list_tracking(&self) -> AppResult<Vec<TrackingEntry>>;
    async fn find_assignment(&self, id: i64) -> AppResult<Option<Assignment>>;
    async fn find_assignment_for_subject(
        &self,
        id: i64,
        sicil: i64,
    ) -> AppResult<Option<Assignment>>;
    /// The assignment's frozen question order.
    async fn assignment_question_ids(&self, assignment_id: i64) -> AppResult<Vec<i64>>;
    /// Marks a pending, not yet due assignment completed and appends its attempts.
    /// Returns `false`, writing nothing, when the assignment was no longer pending.
    async fn complete_assignment(
        &self,
        assignment_id: i64,
        attempts: &[NewAttempt],
        score: f64,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;
    async fn list_attempts(&self, assignment_id: i64) -> AppResult<Vec<Attempt>>;
    /// Removes attempts, then the snapshot, then the assignment. Tokens stay.
    async fn delete_assignment(&self, id: i64) -> AppResult<bool>;

    /// Latest month's success rate for every screener.
    async fn latest_personnel_rates(&self) -> AppResult<Vec<PersonnelRate>>;
}
