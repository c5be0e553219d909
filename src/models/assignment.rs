// src/models/assignment.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Completed,
    Expired,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AssignmentStatus::Pending),
            "completed" => Ok(AssignmentStatus::Completed),
            "expired" => Ok(AssignmentStatus::Expired),
            other => Err(format!("unknown assignment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentType {
    #[default]
    Mandatory,
    Suggested,
}

impl AssignmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentType::Mandatory => "mandatory",
            AssignmentType::Suggested => "suggested",
        }
    }
}

/// Status as every reader must see it: a pending assignment past its due date
/// reads as expired. Nothing writes the expired status back.
pub fn effective_status(
    stored: AssignmentStatus,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AssignmentStatus {
    if stored == AssignmentStatus::Pending && due_date < now {
        AssignmentStatus::Expired
    } else {
        stored
    }
}

fn parse_status(raw: &str) -> AssignmentStatus {
    // The table's CHECK constraint rules out anything else; read garbage as terminal.
    raw.parse().unwrap_or(AssignmentStatus::Expired)
}

/// Represents the 'assignments' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub user_sicil: i64,
    pub package_id: i64,
    pub assigned_by: String,
    pub assignment_type: String,
    /// Stored status; use [`Assignment::effective_status`] for decisions.
    pub status: String,
    pub due_date: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
}

impl Assignment {
    pub fn effective_status(&self, now: DateTime<Utc>) -> AssignmentStatus {
        effective_status(parse_status(&self.status), self.due_date, now)
    }

    /// The same row with its status replaced by the effective one, for responses.
    pub fn with_effective_status(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now).as_str().to_string();
        self
    }
}

/// Row for the subject's own assignment list.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssignmentListItem {
    pub id: i64,
    pub status: String,
    pub due_date: DateTime<Utc>,
    pub assignment_type: String,
    pub created_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub question_count: i64,
}

impl AssignmentListItem {
    pub fn with_effective_status(mut self, now: DateTime<Utc>) -> Self {
        self.status = effective_status(parse_status(&self.status), self.due_date, now)
            .as_str()
            .to_string();
        self
    }
}

/// Row for the supervisor tracking table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrackingEntry {
    pub id: i64,
    pub user_sicil: i64,
    pub full_name: Option<String>,
    pub package_title: Option<String>,
    pub assignment_type: String,
    pub status: String,
    pub score: Option<f64>,
    pub due_date: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TrackingEntry {
    pub fn with_effective_status(mut self, now: DateTime<Utc>) -> Self {
        self.status = effective_status(parse_status(&self.status), self.due_date, now)
            .as_str()
            .to_string();
        self
    }
}

/// DTO for creating a batch of assignments.
#[derive(Debug, Deserialize)]
pub struct CreateAssignmentsRequest {
    pub package_id: Option<i64>,
    #[serde(default)]
    pub is_auto: bool,
    /// Sample an independent auto package for every subject instead of one per batch.
    #[serde(default)]
    pub per_subject_auto: bool,
    #[serde(default)]
    pub sicil_list: Vec<i64>,
    #[serde(rename = "type", default)]
    pub assignment_type: AssignmentType,
    pub due_date: Option<DateTime<Utc>>,
}

/// Package an assignment points at when its batch is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageRef {
    Existing(i64),
    /// Index into the packages written by the same batch.
    New(usize),
}

/// One assignment to be written, with its frozen question order.
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub user_sicil: i64,
    pub package: PackageRef,
    pub assigned_by: String,
    pub assignment_type: AssignmentType,
    pub due_date: DateTime<Utc>,
    pub question_ids: Vec<i64>,
}

/// What the exam runner needs before playing an assignment.
#[derive(Debug, Serialize)]
pub struct ExamOverview {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignment_type: String,
    pub due_date: DateTime<Utc>,
    pub question_ids: Vec<i64>,
    pub time_limit_seconds: u32,
}

/// Supervisor view of one assignment and its recorded answers.
#[derive(Debug, Serialize)]
pub struct AssignmentDetail {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub question_ids: Vec<i64>,
    pub attempts: Vec<crate::models::attempt::Attempt>,
}

/// Code handed out of band to a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedCode {
    pub sicil: i64,
    pub code: String,
}
