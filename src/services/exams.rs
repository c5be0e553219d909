// src/services/exams.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{
    config::ExamSettings,
    error::{AppError, AppResult},
    models::{
        assignment::{Assignment, AssignmentStatus, ExamOverview},
        attempt::{AnswerSubmission, SubmitExamResponse},
        question::PublicQuestion,
        threat::THREAT_TYPES,
    },
    services::{
        exam_session::{ExamQuestion, Timing, grade_submission, validate_answers},
        options::build_options,
    },
    store::ExamStore,
};

/// Loads the subject's assignment and refuses it once it is no longer playable.
async fn playable_assignment(
    store: &dyn ExamStore,
    assignment_id: i64,
    sicil: i64,
    now: DateTime<Utc>,
) -> AppResult<Assignment> {
    let assignment = store
        .find_assignment_for_subject(assignment_id, sicil)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found".to_string()))?;

    match assignment.effective_status(now) {
        AssignmentStatus::Pending => Ok(assignment),
        AssignmentStatus::Completed => Err(AppError::AlreadyCompleted(
            "Assignment already completed".to_string(),
        )),
        AssignmentStatus::Expired => {
            Err(AppError::AlreadyCompleted("Assignment has expired".to_string()))
        }
    }
}

pub async fn fetch_exam(
    store: &dyn ExamStore,
    settings: &ExamSettings,
    assignment_id: i64,
    sicil: i64,
    now: DateTime<Utc>,
) -> AppResult<ExamOverview> {
    let assignment = playable_assignment(store, assignment_id, sicil, now).await?;
    let package = store.find_package(assignment.package_id).await?;
    let question_ids = store.assignment_question_ids(assignment.id).await?;

    Ok(ExamOverview {
        id: assignment.id,
        title: package.as_ref().map(|p| p.title.clone()),
        description: package.and_then(|p| p.description),
        assignment_type: assignment.assignment_type,
        due_date: assignment.due_date,
        question_ids,
        time_limit_seconds: settings.question_time_limit_secs,
    })
}

/// The image and a fresh option set. Never carries the ground truth.
pub async fn fetch_question(
    store: &dyn ExamStore,
    settings: &ExamSettings,
    question_id: i64,
) -> AppResult<PublicQuestion> {
    let question = store
        .find_question(question_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    let options = {
        let mut rng = rand::thread_rng();
        build_options(&question.ground_truth(), &THREAT_TYPES, &mut rng)
    };

    Ok(PublicQuestion {
        id: question.id,
        image_url: question.image_url,
        options,
        time_limit_seconds: settings.question_time_limit_secs,
    })
}

/// Grades the whole answer list and finalizes the assignment in one store write.
pub async fn submit_exam(
    store: &dyn ExamStore,
    settings: &ExamSettings,
    assignment_id: i64,
    sicil: i64,
    answers: Vec<AnswerSubmission>,
    now: DateTime<Utc>,
) -> AppResult<SubmitExamResponse> {
    let assignment = playable_assignment(store, assignment_id, sicil, now).await?;
    let question_ids = store.assignment_question_ids(assignment.id).await?;
    let answers = validate_answers(&question_ids, answers)?;

    let mut truths: HashMap<i64, _> = store
        .find_questions(&question_ids)
        .await?
        .into_iter()
        .map(|q| (q.id, q.ground_truth()))
        .collect();
    let questions: Vec<ExamQuestion> = question_ids
        .iter()
        .map(|id| ExamQuestion {
            id: *id,
            truth: truths.remove(id),
        })
        .collect();

    let (mut session, finished) = grade_submission(questions, answers, Timing::from(settings))?;

    if !store
        .complete_assignment(assignment.id, &finished.attempts, finished.score, now)
        .await?
    {
        tracing::warn!(assignment_id, sicil, "Rejected a second submission");
        return Err(AppError::AlreadyCompleted(
            "Assignment already completed".to_string(),
        ));
    }
    session.mark_completed();

    tracing::info!(
        assignment_id,
        sicil,
        score = finished.score,
        "Exam submitted: {}/{} correct",
        finished.correct_count,
        finished.total_questions
    );

    Ok(SubmitExamResponse {
        score: finished.score,
        correct_count: finished.correct_count,
        total_questions: finished.total_questions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            assignment::{AssignmentType, NewAssignment, PackageRef},
            attempt::Choice,
            package::NewPackage,
            question::NewQuestion,
        },
        services::geometry::Point,
        store::MemoryStore,
    };
    use chrono::Duration;

    const SICIL: i64 = 1001;

    fn clean() -> NewQuestion {
        NewQuestion {
            image_url: "/uploads/clean.png".to_string(),
            has_threat: false,
            threat_type: None,
            coordinate_x: None,
            coordinate_y: None,
            threat_polygon: None,
        }
    }

    fn knife_in_square() -> NewQuestion {
        NewQuestion {
            image_url: "/uploads/knife.png".to_string(),
            has_threat: true,
            threat_type: Some("bicak".to_string()),
            coordinate_x: None,
            coordinate_y: None,
            threat_polygon: Some(vec![
                Point { x: 0.2, y: 0.2 },
                Point { x: 0.2, y: 0.4 },
                Point { x: 0.4, y: 0.4 },
                Point { x: 0.4, y: 0.2 },
            ]),
        }
    }

    fn answer(question_id: i64, choice: Choice, click: Option<(f64, f64)>) -> AnswerSubmission {
        AnswerSubmission {
            question_id,
            choice,
            click_x: click.map(|c| c.0),
            click_y: click.map(|c| c.1),
            duration_seconds: 3.0,
        }
    }

    /// Returns (assignment id, [clean question id, threat question id]).
    async fn setup(store: &MemoryStore, due_in: Duration) -> (i64, Vec<i64>) {
        let q1 = store.insert_question(&clean()).await.unwrap();
        let q2 = store.insert_question(&knife_in_square()).await.unwrap();
        let package = NewPackage {
            title: "Haftalık".to_string(),
            description: None,
            difficulty_level: None,
        };
        let package_id = store.insert_package(&package, &[q1, q2]).await.unwrap();
        let ids = store
            .insert_assignment_batch(
                &[],
                &[NewAssignment {
                    user_sicil: SICIL,
                    package: PackageRef::Existing(package_id),
                    assigned_by: "Admin".to_string(),
                    assignment_type: AssignmentType::Mandatory,
                    due_date: Utc::now() + due_in,
                    question_ids: vec![q1, q2],
                }],
                &[],
            )
            .await
            .unwrap();
        (ids[0], vec![q1, q2])
    }

    #[tokio::test]
    async fn perfect_exam_scores_100() {
        let store = MemoryStore::new();
        let settings = ExamSettings::default();
        let (id, qs) = setup(&store, Duration::hours(1)).await;

        let answers = vec![
            answer(qs[0], Choice::Clean, None),
            answer(qs[1], Choice::Threat("bicak".to_string()), Some((0.3, 0.3))),
        ];
        let result = submit_exam(&store, &settings, id, SICIL, answers, Utc::now())
            .await
            .unwrap();
        assert_eq!(result.score, 100.0);
        assert_eq!(result.correct_count, 2);

        let assignment = store.find_assignment(id).await.unwrap().unwrap();
        assert_eq!(assignment.status, "completed");
        assert_eq!(store.list_attempts(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn click_outside_polygon_halves_score() {
        let store = MemoryStore::new();
        let settings = ExamSettings::default();
        let (id, qs) = setup(&store, Duration::hours(1)).await;

        let answers = vec![
            answer(qs[0], Choice::Clean, None),
            answer(qs[1], Choice::Threat("bicak".to_string()), Some((0.8, 0.8))),
        ];
        let result = submit_exam(&store, &settings, id, SICIL, answers, Utc::now())
            .await
            .unwrap();
        assert_eq!(result.score, 50.0);

        let attempts = store.list_attempts(id).await.unwrap();
        let miss = attempts.iter().find(|a| a.question_id == qs[1]).unwrap();
        assert!(!miss.is_correct);
        assert_eq!(miss.distance_score, Some(1.0));
    }

    #[tokio::test]
    async fn unanswered_questions_time_out() {
        let store = MemoryStore::new();
        let settings = ExamSettings::default();
        let (id, qs) = setup(&store, Duration::hours(1)).await;

        let answers = vec![answer(qs[0], Choice::Timeout, None)];
        let result = submit_exam(&store, &settings, id, SICIL, answers, Utc::now())
            .await
            .unwrap();
        assert_eq!(result.score, 0.0);

        let attempts = store.list_attempts(id).await.unwrap();
        assert!(attempts.iter().all(|a| a.user_choice == "timeout"));
    }

    #[tokio::test]
    async fn second_submission_is_rejected() {
        let store = MemoryStore::new();
        let settings = ExamSettings::default();
        let (id, qs) = setup(&store, Duration::hours(1)).await;

        let answers = || vec![answer(qs[0], Choice::Clean, None)];
        submit_exam(&store, &settings, id, SICIL, answers(), Utc::now())
            .await
            .unwrap();
        let err = submit_exam(&store, &settings, id, SICIL, answers(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyCompleted(_)));
        assert_eq!(store.list_attempts(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_answers_write_nothing() {
        let store = MemoryStore::new();
        let settings = ExamSettings::default();
        let (id, qs) = setup(&store, Duration::hours(1)).await;

        let answers = vec![answer(qs[0], Choice::Clean, Some((1.5, 0.2)))];
        let err = submit_exam(&store, &settings, id, SICIL, answers, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.list_attempts(id).await.unwrap().is_empty());
        assert_eq!(store.find_assignment(id).await.unwrap().unwrap().status, "pending");
    }

    #[tokio::test]
    async fn other_subject_sees_not_found() {
        let store = MemoryStore::new();
        let settings = ExamSettings::default();
        let (id, _) = setup(&store, Duration::hours(1)).await;

        let err = fetch_exam(&store, &settings, id, 2002, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn expired_assignment_is_terminal() {
        let store = MemoryStore::new();
        let settings = ExamSettings::default();
        let (id, qs) = setup(&store, Duration::minutes(5)).await;
        let later = Utc::now() + Duration::hours(1);

        let err = fetch_exam(&store, &settings, id, SICIL, later).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyCompleted(_)));
        let answers = vec![answer(qs[0], Choice::Clean, None)];
        let err = submit_exam(&store, &settings, id, SICIL, answers, later)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyCompleted(_)));
    }

    #[tokio::test]
    async fn exam_survives_package_deletion() {
        let store = MemoryStore::new();
        let settings = ExamSettings::default();
        let (id, qs) = setup(&store, Duration::hours(1)).await;
        let package_id = store.find_assignment(id).await.unwrap().unwrap().package_id;
        store.delete_package(package_id).await.unwrap();

        let overview = fetch_exam(&store, &settings, id, SICIL, Utc::now()).await.unwrap();
        assert_eq!(overview.question_ids, qs);
        assert_eq!(overview.title, None);
        assert_eq!(overview.time_limit_seconds, 20);
    }

    #[tokio::test]
    async fn question_payload_offers_four_options() {
        let store = MemoryStore::new();
        let settings = ExamSettings::default();
        let (_, qs) = setup(&store, Duration::hours(1)).await;

        let question = fetch_question(&store, &settings, qs[1]).await.unwrap();
        assert_eq!(question.options.len(), 4);
        assert!(question.options.iter().any(|o| o.id == "bicak"));

        let err = fetch_question(&store, &settings, 9999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
