// src/services/exam_session.rs

use std::collections::{HashMap, HashSet};

use crate::{
    config::ExamSettings,
    error::{AppError, AppResult},
    models::{
        attempt::{AnswerSubmission, Choice, NewAttempt},
        question::GroundTruth,
    },
    services::{
        geometry::Point,
        scoring::{Grade, compute_score, grade_answer},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    /// Index into the question sequence of the turn being played.
    InProgress(usize),
    /// Every question is graded; waiting for the attempts to be persisted.
    Submitting,
    Completed,
}

/// Turn timing. The deadline is client-driven; the server only refuses to credit
/// answers reported later than `limit + grace`.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub limit_secs: f64,
    pub grace_secs: f64,
}

impl From<&ExamSettings> for Timing {
    fn from(settings: &ExamSettings) -> Self {
        Timing {
            limit_secs: f64::from(settings.question_time_limit_secs),
            grace_secs: f64::from(settings.answer_grace_secs),
        }
    }
}

/// A question of the assignment's frozen sequence.
/// `truth` is `None` when the question has since been removed from the catalog.
#[derive(Debug, Clone)]
pub struct ExamQuestion {
    pub id: i64,
    pub truth: Option<GroundTruth>,
}

#[derive(Debug, Clone)]
pub struct FinishedExam {
    pub attempts: Vec<NewAttempt>,
    pub correct_count: usize,
    pub total_questions: usize,
    pub score: f64,
}

/// Drives one assignment question by question, grading each turn as it is played.
#[derive(Debug)]
pub struct ExamSession {
    questions: Vec<ExamQuestion>,
    timing: Timing,
    state: SessionState,
    attempts: Vec<NewAttempt>,
    correct_count: usize,
}

impl ExamSession {
    pub fn new(questions: Vec<ExamQuestion>, timing: Timing) -> Self {
        Self {
            questions,
            timing,
            state: SessionState::NotStarted,
            attempts: Vec::new(),
            correct_count: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn start(&mut self) -> AppResult<()> {
        if self.state != SessionState::NotStarted {
            return Err(AppError::Validation("Exam already started".to_string()));
        }
        self.state = if self.questions.is_empty() {
            SessionState::Submitting
        } else {
            SessionState::InProgress(0)
        };
        Ok(())
    }

    /// Id of the question currently being played.
    pub fn current_question(&self) -> Option<i64> {
        match self.state {
            SessionState::InProgress(index) => self.questions.get(index).map(|q| q.id),
            _ => None,
        }
    }

    /// Grades the answer for the current question and advances.
    pub fn answer(&mut self, answer: &AnswerSubmission) -> AppResult<&NewAttempt> {
        let index = self.current_index()?;
        let expected = self.questions[index].id;
        if answer.question_id != expected {
            return Err(AppError::Validation(format!(
                "Expected an answer for question {}, got {}",
                expected, answer.question_id
            )));
        }

        if answer.choice == Choice::Timeout
            || answer.duration_seconds > self.timing.limit_secs + self.timing.grace_secs
        {
            if answer.choice != Choice::Timeout {
                tracing::warn!(
                    question_id = expected,
                    duration = answer.duration_seconds,
                    "Answer arrived after the turn deadline, grading as timeout"
                );
            }
            return self.time_out();
        }

        let click = match (answer.click_x, answer.click_y) {
            (Some(x), Some(y)) => Some(Point { x, y }),
            _ => None,
        };
        let grade = match &self.questions[index].truth {
            Some(truth) => grade_answer(truth, &answer.choice, click),
            None => {
                tracing::warn!(question_id = expected, "Question missing from catalog, grading as wrong");
                Grade {
                    is_correct: false,
                    distance: None,
                }
            }
        };

        let attempt = NewAttempt {
            question_id: expected,
            click_x: answer.click_x,
            click_y: answer.click_y,
            user_choice: answer.choice.clone(),
            is_correct: grade.is_correct,
            distance_score: grade.distance,
            duration_seconds: answer.duration_seconds,
        };
        Ok(self.record(index, attempt))
    }

    /// Records the current turn as expired: no click, full allotted time.
    pub fn time_out(&mut self) -> AppResult<&NewAttempt> {
        let index = self.current_index()?;
        let attempt = NewAttempt {
            question_id: self.questions[index].id,
            click_x: None,
            click_y: None,
            user_choice: Choice::Timeout,
            is_correct: false,
            distance_score: None,
            duration_seconds: self.timing.limit_secs,
        };
        Ok(self.record(index, attempt))
    }

    /// Hands out the graded attempts and score once every turn is played.
    pub fn finish(&self) -> AppResult<FinishedExam> {
        if self.state != SessionState::Submitting {
            return Err(AppError::Validation(
                "Exam cannot be submitted before every question is answered".to_string(),
            ));
        }
        Ok(FinishedExam {
            attempts: self.attempts.clone(),
            correct_count: self.correct_count,
            total_questions: self.questions.len(),
            score: compute_score(self.correct_count, self.questions.len()),
        })
    }

    /// Called once the store has committed the submission.
    pub fn mark_completed(&mut self) {
        if self.state == SessionState::Submitting {
            self.state = SessionState::Completed;
        }
    }

    fn current_index(&self) -> AppResult<usize> {
        match self.state {
            SessionState::InProgress(index) => Ok(index),
            SessionState::NotStarted => {
                Err(AppError::Validation("Exam has not been started".to_string()))
            }
            SessionState::Submitting | SessionState::Completed => Err(AppError::Validation(
                "Every question has already been answered".to_string(),
            )),
        }
    }

    fn record(&mut self, index: usize, attempt: NewAttempt) -> &NewAttempt {
        if attempt.is_correct {
            self.correct_count += 1;
        }
        self.attempts.push(attempt);
        self.state = if index + 1 < self.questions.len() {
            SessionState::InProgress(index + 1)
        } else {
            SessionState::Submitting
        };
        &self.attempts[self.attempts.len() - 1]
    }
}

fn is_normalized(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

/// Checks a submitted answer list against the assignment's question sequence
/// before anything is graded or written. Returns the answers keyed by question.
pub fn validate_answers(
    question_ids: &[i64],
    answers: Vec<AnswerSubmission>,
) -> AppResult<HashMap<i64, AnswerSubmission>> {
    if answers.is_empty() && !question_ids.is_empty() {
        return Err(AppError::Validation("No answers submitted".to_string()));
    }

    let known: HashSet<i64> = question_ids.iter().copied().collect();
    let mut by_question = HashMap::with_capacity(answers.len());

    for answer in answers {
        if !known.contains(&answer.question_id) {
            return Err(AppError::Validation(format!(
                "Question {} is not part of this exam",
                answer.question_id
            )));
        }
        match (answer.click_x, answer.click_y) {
            (Some(x), Some(y)) if !is_normalized(x) || !is_normalized(y) => {
                return Err(AppError::Validation(
                    "Click coordinates must be within [0, 1]".to_string(),
                ));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(AppError::Validation(
                    "Click needs both click_x and click_y".to_string(),
                ));
            }
            _ => {}
        }
        if !answer.duration_seconds.is_finite() || answer.duration_seconds < 0.0 {
            return Err(AppError::Validation(
                "duration_seconds must be a non-negative number".to_string(),
            ));
        }
        let question_id = answer.question_id;
        if by_question.insert(question_id, answer).is_some() {
            return Err(AppError::Validation(format!(
                "Question {} was answered more than once",
                question_id
            )));
        }
    }

    Ok(by_question)
}

/// Plays a whole submission through a session in sequence order.
/// Unanswered questions are recorded as timeouts.
pub fn grade_submission(
    questions: Vec<ExamQuestion>,
    mut answers: HashMap<i64, AnswerSubmission>,
    timing: Timing,
) -> AppResult<(ExamSession, FinishedExam)> {
    let mut session = ExamSession::new(questions, timing);
    session.start()?;

    while let Some(question_id) = session.current_question() {
        match answers.remove(&question_id) {
            Some(answer) => session.answer(&answer)?,
            None => session.time_out()?,
        };
    }

    let finished = session.finish()?;
    Ok((session, finished))
}
