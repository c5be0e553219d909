// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{
        assignment::{Assignment, AssignmentListItem, NewAssignment, PackageRef, TrackingEntry},
        attempt::{Attempt, NewAttempt},
        login_token::{LoginToken, NewLoginToken},
        package::{NewPackage, Package, PackageDraft, PackageSummary},
        question::{NewQuestion, Question},
        user::{AdminUser, PersonnelRate},
    },
    store::ExamStore,
};

/// Process-local store backing tests and `STORE_BACKEND=memory` runs.
/// One lock guards everything, so every method is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    admins: Vec<AdminUser>,
    questions: BTreeMap<i64, Question>,
    packages: BTreeMap<i64, Package>,
    /// package id -> question ids in exam order
    package_questions: HashMap<i64, Vec<i64>>,
    assignments: BTreeMap<i64, Assignment>,
    /// assignment id -> frozen question order
    assignment_questions: HashMap<i64, Vec<i64>>,
    tokens: Vec<LoginToken>,
    attempts: Vec<Attempt>,
    personnel: HashMap<i64, String>,
    /// (sicil, month, success rate)
    monthly_stats: Vec<(i64, String, f64)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_package(&mut self, package: &NewPackage, question_ids: &[i64]) -> i64 {
        let id = self.next_id();
        self.packages.insert(
            id,
            Package {
                id,
                title: package.title.clone(),
                description: package.description.clone(),
                difficulty_level: package.difficulty_level.clone(),
                created_at: Some(Utc::now()),
            },
        );
        self.package_questions.insert(id, question_ids.to_vec());
        id
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stands in for the spreadsheet import, which owns personnel statistics.
    pub async fn record_monthly_rate(&self, sicil: i64, full_name: &str, month: &str, rate: f64) {
        let mut tables = self.inner.lock().await;
        tables.personnel.insert(sicil, full_name.to_string());
        tables
            .monthly_stats
            .retain(|(s, m, _)| !(*s == sicil && m == month));
        tables.monthly_stats.push((sicil, month.to_string(), rate));
    }

    pub async fn login_token(&self, sicil: i64, code: &str) -> Option<LoginToken> {
        let tables = self.inner.lock().await;
        tables
            .tokens
            .iter()
            .find(|t| t.user_sicil == sicil && t.code == code)
            .cloned()
    }
}

fn question_from(id: i64, q: &NewQuestion, created_at: Option<DateTime<Utc>>) -> Question {
    Question {
        id,
        image_url: q.image_url.clone(),
        has_threat: q.has_threat,
        threat_type: q.threat_type.clone(),
        coordinate_x: q.coordinate_x,
        coordinate_y: q.coordinate_y,
        threat_polygon: q.threat_polygon.clone().map(Json),
        created_at,
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn find_admin_by_username(&self, username: &str) -> AppResult<Option<AdminUser>> {
        let tables = self.inner.lock().await;
        Ok(tables.admins.iter().find(|a| a.username == username).cloned())
    }

    async fn insert_admin(
        &self,
        username: &str,
        password_hash: &str,
        display_name: &str,
    ) -> AppResult<i64> {
        let mut tables = self.inner.lock().await;
        let id = tables.next_id();
        tables.admins.push(AdminUser {
            id,
            username: username.to_string(),
            password: password_hash.to_string(),
            display_name: display_name.to_string(),
            created_at: Some(Utc::now()),
        });
        Ok(id)
    }

    async fn list_questions(&self) -> AppResult<Vec<Question>> {
        let tables = self.inner.lock().await;
        Ok(tables.questions.values().rev().cloned().collect())
    }

    async fn find_question(&self, id: i64) -> AppResult<Option<Question>> {
        let tables = self.inner.lock().await;
        Ok(tables.questions.get(&id).cloned())
    }

    async fn find_questions(&self, ids: &[i64]) -> AppResult<Vec<Question>> {
        let tables = self.inner.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.questions.get(id).cloned())
            .collect())
    }

    async fn list_question_ids(&self) -> AppResult<Vec<i64>> {
        let tables = self.inner.lock().await;
        Ok(tables.questions.keys().copied().collect())
    }

    async fn insert_question(&self, question: &NewQuestion) -> AppResult<i64> {
        let mut tables = self.inner.lock().await;
        let id = tables.next_id();
        tables
            .questions
            .insert(id, question_from(id, question, Some(Utc::now())));
        Ok(id)
    }

    async fn update_question(&self, id: i64, question: &NewQuestion) -> AppResult<bool> {
        let mut tables = self.inner.lock().await;
        match tables.questions.get_mut(&id) {
            Some(existing) => {
                *existing = question_from(id, question, existing.created_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_question(&self, id: i64) -> AppResult<bool> {
        let mut tables = self.inner.lock().await;
        for ids in tables.package_questions.values_mut() {
            ids.retain(|q| *q != id);
        }
        Ok(tables.questions.remove(&id).is_some())
    }

    async fn insert_package(&self, package: &NewPackage, question_ids: &[i64]) -> AppResult<i64> {
        let mut tables = self.inner.lock().await;
        Ok(tables.insert_package(package, question_ids))
    }

    async fn list_packages(&self) -> AppResult<Vec<PackageSummary>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .packages
            .values()
            .rev()
            .map(|p| PackageSummary {
                id: p.id,
                title: p.title.clone(),
                description: p.description.clone(),
                difficulty_level: p.difficulty_level.clone(),
                created_at: p.created_at,
                question_count: tables
                    .package_questions
                    .get(&p.id)
                    .map_or(0, |ids| ids.len() as i64),
            })
            .collect())
    }

    async fn find_package(&self, id: i64) -> AppResult<Option<Package>> {
        let tables = self.inner.lock().await;
        Ok(tables.packages.get(&id).cloned())
    }

    async fn package_question_ids(&self, package_id: i64) -> AppResult<Vec<i64>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .package_questions
            .get(&package_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_package_questions(&self, package_id: i64) -> AppResult<i64> {
        let tables = self.inner.lock().await;
        Ok(tables
            .package_questions
            .get(&package_id)
            .map_or(0, |ids| ids.len() as i64))
    }

    async fn delete_package(&self, id: i64) -> AppResult<bool> {
        let mut tables = self.inner.lock().await;
        tables.package_questions.remove(&id);
        Ok(tables.packages.remove(&id).is_some())
    }

    async fn insert_assignment_batch(
        &self,
        packages: &[PackageDraft],
        assignments: &[NewAssignment],
        tokens: &[NewLoginToken],
    ) -> AppResult<Vec<i64>> {
        let mut tables = self.inner.lock().await;

        // Every reference is checked before the first write
        if let Some(index) = assignments.iter().find_map(|a| match a.package {
            PackageRef::New(index) if index >= packages.len() => Some(index),
            _ => None,
        }) {
            return Err(AppError::InternalServerError(format!(
                "Batch has no package #{}",
                index
            )));
        }

        let package_ids: Vec<i64> = packages
            .iter()
            .map(|draft| tables.insert_package(&draft.package, &draft.question_ids))
            .collect();

        let now = Utc::now();
        let mut ids = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let package_id = match assignment.package {
                PackageRef::Existing(id) => id,
                PackageRef::New(index) => package_ids[index],
            };
            let id = tables.next_id();
            tables.assignments.insert(
                id,
                Assignment {
                    id,
                    user_sicil: assignment.user_sicil,
                    package_id,
                    assigned_by: assignment.assigned_by.clone(),
                    assignment_type: assignment.assignment_type.as_str().to_string(),
                    status: "pending".to_string(),
                    due_date: assignment.due_date,
                    created_at: Some(now),
                    completed_at: None,
                    score: None,
                },
            );
            tables
                .assignment_questions
                .insert(id, assignment.question_ids.clone());
            ids.push(id);
        }

        for token in tokens {
            let id = tables.next_id();
            tables.tokens.push(LoginToken {
                id,
                code: token.code.clone(),
                user_sicil: token.user_sicil,
                expires_at: token.expires_at,
                is_used: false,
                created_at: Some(now),
            });
        }

        Ok(ids)
    }

    async fn is_code_active(&self, code: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let tables = self.inner.lock().await;
        Ok(tables
            .tokens
            .iter()
            .any(|t| t.code == code && t.is_valid_at(now)))
    }

    async fn consume_login_token(
        &self,
        sicil: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut tables = self.inner.lock().await;
        match tables
            .tokens
            .iter_mut()
            .find(|t| t.user_sicil == sicil && t.code == code && t.is_valid_at(now))
        {
            Some(token) => {
                token.is_used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_assignments_for_subject(
        &self,
        sicil: i64,
    ) -> AppResult<Vec<AssignmentListItem>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .assignments
            .values()
            .rev()
            .filter(|a| a.user_sicil == sicil)
            .map(|a| {
                let package = tables.packages.get(&a.package_id);
                AssignmentListItem {
                    id: a.id,
                    status: a.status.clone(),
                    due_date: a.due_date,
                    assignment_type: a.assignment_type.clone(),
                    created_at: a.created_at,
                    score: a.score,
                    title: package.map(|p| p.title.clone()),
                    description: package.and_then(|p| p.description.clone()),
                    question_count: tables
                        .assignment_questions
                        .get(&a.id)
                        .map_or(0, |ids| ids.len() as i64),
                }
            })
            .collect())
    }

    async fn list_tracking(&self) -> AppResult<Vec<TrackingEntry>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .assignments
            .values()
            .rev()
            .map(|a| TrackingEntry {
                id: a.id,
                user_sicil: a.user_sicil,
                full_name: tables.personnel.get(&a.user_sicil).cloned(),
                package_title: tables.packages.get(&a.package_id).map(|p| p.title.clone()),
                assignment_type: a.assignment_type.clone(),
                status: a.status.clone(),
                score: a.score,
                due_date: a.due_date,
                completed_at: a.completed_at,
            })
            .collect())
    }

    async fn find_assignment(&self, id: i64) -> AppResult<Option<Assignment>> {
        let tables = self.inner.lock().await;
        Ok(tables.assignments.get(&id).cloned())
    }

    async fn find_assignment_for_subject(
        &self,
        id: i64,
        sicil: i64,
    ) -> AppResult<Option<Assignment>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .assignments
            .get(&id)
            .filter(|a| a.user_sicil == sicil)
            .cloned())
    }

    async fn assignment_question_ids(&self, assignment_id: i64) -> AppResult<Vec<i64>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .assignment_questions
            .get(&assignment_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn complete_assignment(
        &self,
        assignment_id: i64,
        attempts: &[NewAttempt],
        score: f64,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut tables = self.inner.lock().await;
        match tables.assignments.get_mut(&assignment_id) {
            Some(a) if a.status == "pending" && a.due_date >= now => {
                a.status = "completed".to_string();
                a.completed_at = Some(now);
                a.score = Some(score);
            }
            _ => return Ok(false),
        }

        for attempt in attempts {
            let id = tables.next_id();
            tables.attempts.push(Attempt {
                id,
                assignment_id,
                question_id: attempt.question_id,
                click_x: attempt.click_x,
                click_y: attempt.click_y,
                user_choice: attempt.user_choice.as_str().to_string(),
                is_correct: attempt.is_correct,
                distance_score: attempt.distance_score,
                duration_seconds: attempt.duration_seconds,
                created_at: Some(now),
            });
        }
        Ok(true)
    }

    async fn list_attempts(&self, assignment_id: i64) -> AppResult<Vec<Attempt>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .attempts
            .iter()
            .filter(|a| a.assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn delete_assignment(&self, id: i64) -> AppResult<bool> {
        let mut tables = self.inner.lock().await;
        tables.attempts.retain(|a| a.assignment_id != id);
        tables.assignment_questions.remove(&id);
        Ok(tables.assignments.remove(&id).is_some())
    }

    async fn latest_personnel_rates(&self) -> AppResult<Vec<PersonnelRate>> {
        let tables = self.inner.lock().await;
        let Some(latest) = tables.monthly_stats.iter().map(|(_, m, _)| m).max() else {
            return Ok(Vec::new());
        };

        let mut rates: Vec<PersonnelRate> = tables
            .monthly_stats
            .iter()
            .filter(|(_, m, _)| m == latest)
            .filter_map(|(sicil, month, rate)| {
                tables.personnel.get(sicil).map(|name| PersonnelRate {
                    sicil: *sicil,
                    full_name: name.clone(),
                    success_rate: *rate,
                    month: month.clone(),
                })
            })
            .collect();
        rates.sort_by(|a, b| a.success_rate.total_cmp(&b.success_rate));
        Ok(rates)
    }
}
