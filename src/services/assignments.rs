// src/services/assignments.rs

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::ExamSettings,
    error::{AppError, AppResult},
    models::{
        assignment::{
            AssignmentDetail, AssignmentListItem, CreateAssignmentsRequest, IssuedCode,
            NewAssignment, PackageRef, TrackingEntry,
        },
        login_token::NewLoginToken,
        user::{ClassifiedPersonnel, PersonnelRate},
    },
    services::{
        codes::{MAX_CODE_ATTEMPTS, generate_code},
        packages::sample_auto_package,
    },
    store::ExamStore,
};

/// Success rates below this are flagged red.
pub const RED_THRESHOLD: f64 = 75.0;
/// Success rates at or above this are green.
pub const GREEN_THRESHOLD: f64 = 85.0;

/// Partitions screeners by their success rate: red `< 75`, yellow `[75, 85)`, green `>= 85`.
pub fn classify(rates: Vec<PersonnelRate>) -> ClassifiedPersonnel {
    let mut classified = ClassifiedPersonnel::default();
    for rate in rates {
        if rate.success_rate < RED_THRESHOLD {
            classified.red.push(rate);
        } else if rate.success_rate < GREEN_THRESHOLD {
            classified.yellow.push(rate);
        } else {
            classified.green.push(rate);
        }
    }
    classified
}

pub async fn classify_personnel(store: &dyn ExamStore) -> AppResult<ClassifiedPersonnel> {
    Ok(classify(store.latest_personnel_rates().await?))
}

/// Creates one assignment and one login code per subject in a single write.
///
/// With `is_auto` the batch shares one freshly sampled package, or each subject
/// gets its own when `per_subject_auto` is also set. Sampled packages are written
/// in the same batch as the assignments.
pub async fn create_assignments(
    store: &dyn ExamStore,
    settings: &ExamSettings,
    assigned_by: &str,
    req: CreateAssignmentsRequest,
    now: DateTime<Utc>,
) -> AppResult<Vec<IssuedCode>> {
    let mut seen = HashSet::new();
    let subjects: Vec<i64> = req
        .sicil_list
        .iter()
        .copied()
        .filter(|sicil| seen.insert(*sicil))
        .collect();
    if subjects.is_empty() {
        return Err(AppError::Validation(
            "At least one personnel must be selected".to_string(),
        ));
    }

    let validity = Duration::hours(settings.code_validity_hours);
    let due_date = match req.due_date {
        Some(due) if due < now => {
            return Err(AppError::Validation("Due date is in the past".to_string()));
        }
        Some(due) => due,
        None => now + validity,
    };

    let mut drafts = Vec::new();
    // (package, question snapshot) per subject, in `subjects` order
    let mut packages: Vec<(PackageRef, Vec<i64>)> = Vec::with_capacity(subjects.len());
    if req.is_auto {
        if req.per_subject_auto {
            for index in 0..subjects.len() {
                let draft = sample_auto_package(store, settings.auto_package_size, now).await?;
                packages.push((PackageRef::New(index), draft.question_ids.clone()));
                drafts.push(draft);
            }
        } else {
            let draft = sample_auto_package(store, settings.auto_package_size, now).await?;
            packages.resize(subjects.len(), (PackageRef::New(0), draft.question_ids.clone()));
            drafts.push(draft);
        }
    } else {
        let package_id = req.package_id.ok_or_else(|| {
            AppError::Validation("Either package_id or is_auto is required".to_string())
        })?;
        store
            .find_package(package_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Package not found".to_string()))?;
        let question_ids = store.package_question_ids(package_id).await?;
        packages.resize(
            subjects.len(),
            (PackageRef::Existing(package_id), question_ids),
        );
    }

    let expires_at = now + validity;
    let mut batch_codes = HashSet::with_capacity(subjects.len());
    let mut assignments = Vec::with_capacity(subjects.len());
    let mut tokens = Vec::with_capacity(subjects.len());
    let mut issued = Vec::with_capacity(subjects.len());

    for (sicil, (package, question_ids)) in subjects.iter().copied().zip(packages) {
        let code = allocate_code(store, &mut batch_codes, now).await?;
        assignments.push(NewAssignment {
            user_sicil: sicil,
            package,
            assigned_by: assigned_by.to_string(),
            assignment_type: req.assignment_type,
            due_date,
            question_ids,
        });
        tokens.push(NewLoginToken {
            code: code.clone(),
            user_sicil: sicil,
            expires_at,
        });
        issued.push(IssuedCode { sicil, code });
    }

    store
        .insert_assignment_batch(&drafts, &assignments, &tokens)
        .await?;

    tracing::info!(
        "{} assigned {} exams ({}), due {}",
        assigned_by,
        issued.len(),
        req.assignment_type.as_str(),
        due_date
    );
    Ok(issued)
}

/// Draws a code unused by any active token and by the current batch.
async fn allocate_code(
    store: &dyn ExamStore,
    batch_codes: &mut HashSet<String>,
    now: DateTime<Utc>,
) -> AppResult<String> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = {
            let mut rng = rand::thread_rng();
            generate_code(&mut rng)
        };
        if batch_codes.contains(&code) || store.is_code_active(&code, now).await? {
            continue;
        }
        batch_codes.insert(code.clone());
        return Ok(code);
    }
    Err(AppError::InternalServerError(format!(
        "No free login code after {} attempts",
        MAX_CODE_ATTEMPTS
    )))
}

/// Consumes the subject's one-time code. Succeeds at most once per code.
pub async fn authenticate(
    store: &dyn ExamStore,
    sicil: i64,
    code: &str,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if !store.consume_login_token(sicil, code.trim(), now).await? {
        tracing::warn!(sicil, "Rejected exam login");
        return Err(AppError::AuthError(
            "Invalid, used or expired code".to_string(),
        ));
    }
    tracing::info!(sicil, "Exam login code consumed");
    Ok(())
}

pub async fn assignments_for_subject(
    store: &dyn ExamStore,
    sicil: i64,
    now: DateTime<Utc>,
) -> AppResult<Vec<AssignmentListItem>> {
    Ok(store
        .list_assignments_for_subject(sicil)
        .await?
        .into_iter()
        .map(|item| item.with_effective_status(now))
        .collect())
}

pub async fn tracking(store: &dyn ExamStore, now: DateTime<Utc>) -> AppResult<Vec<TrackingEntry>> {
    Ok(store
        .list_tracking()
        .await?
        .into_iter()
        .map(|entry| entry.with_effective_status(now))
        .collect())
}

pub async fn assignment_detail(
    store: &dyn ExamStore,
    id: i64,
    now: DateTime<Utc>,
) -> AppResult<AssignmentDetail> {
    let assignment = store
        .find_assignment(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found".to_string()))?;
    let question_ids = store.assignment_question_ids(id).await?;
    let attempts = store.list_attempts(id).await?;
    Ok(AssignmentDetail {
        assignment: assignment.with_effective_status(now),
        question_ids,
        attempts,
    })
}

/// Removes the assignment with its attempts. The login token is left as is.
pub async fn delete_assignment(store: &dyn ExamStore, id: i64) -> AppResult<()> {
    if !store.delete_assignment(id).await? {
        return Err(AppError::NotFound("Assignment not found".to_string()));
    }
    tracing::info!("Assignment {} deleted", id);
    Ok(())
}
