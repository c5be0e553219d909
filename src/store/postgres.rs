// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    error::{AppError, AppResult},
    models::{
        assignment::{Assignment, AssignmentListItem, NewAssignment, PackageRef, TrackingEntry},
        attempt::{Attempt, NewAttempt},
        login_token::NewLoginToken,
        package::{NewPackage, Package, PackageDraft, PackageSummary},
        question::{NewQuestion, Question},
        user::{AdminUser, PersonnelRate},
    },
    store::ExamStore,
};

const QUESTION_COLUMNS: &str = "id, image_url, has_threat, threat_type, coordinate_x, \
     coordinate_y, threat_polygon, created_at";

const ASSIGNMENT_COLUMNS: &str = "id, user_sicil, package_id, assigned_by, assignment_type, \
     status, due_date, created_at, completed_at, score";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn find_admin_by_username(&self, username: &str) -> AppResult<Option<AdminUser>> {
        let admin = sqlx::query_as::<_, AdminUser>(
            "SELECT id, username, password, display_name, created_at FROM admins WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(admin)
    }

    async fn insert_admin(
        &self,
        username: &str,
        password_hash: &str,
        display_name: &str,
    ) -> AppResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO admins (username, password, display_name) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_questions(&self) -> AppResult<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn find_question(&self, id: i64) -> AppResult<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(question)
    }

    async fn find_questions(&self, ids: &[i64]) -> AppResult<Vec<Question>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Dynamic IN clause
        let mut query_builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id IN ("
        ));
        let mut separated = query_builder.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let questions = query_builder
            .build_query_as::<Question>()
            .fetch_all(&self.pool)
            .await?;
        Ok(questions)
    }

    async fn list_question_ids(&self) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT id FROM questions ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn insert_question(&self, question: &NewQuestion) -> AppResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO questions
            (image_url, has_threat, threat_type, coordinate_x, coordinate_y, threat_polygon)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&question.image_url)
        .bind(question.has_threat)
        .bind(&question.threat_type)
        .bind(question.coordinate_x)
        .bind(question.coordinate_y)
        .bind(question.threat_polygon.as_ref().map(Json))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_question(&self, id: i64, question: &NewQuestion) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE questions
            SET image_url = $1, has_threat = $2, threat_type = $3,
                coordinate_x = $4, coordinate_y = $5, threat_polygon = $6
            WHERE id = $7
            "#,
        )
        .bind(&question.image_url)
        .bind(question.has_threat)
        .bind(&question.threat_type)
        .bind(question.coordinate_x)
        .bind(question.coordinate_y)
        .bind(question.threat_polygon.as_ref().map(Json))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_question(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM package_questions WHERE question_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_package(&self, package: &NewPackage, question_ids: &[i64]) -> AppResult<i64> {
        let mut tx = self.pool.begin().await?;
        let package_id = insert_package_rows(&mut *tx, package, question_ids).await?;
        tx.commit().await?;
        Ok(package_id)
    }

    async fn list_packages(&self) -> AppResult<Vec<PackageSummary>> {
        let packages = sqlx::query_as::<_, PackageSummary>(
            r#"
            SELECT
                p.id, p.title, p.description, p.difficulty_level, p.created_at,
                COUNT(pq.question_id) AS question_count
            FROM packages p
            LEFT JOIN package_questions pq ON pq.package_id = p.id
            GROUP BY p.id
            ORDER BY p.created_at DESC, p.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(packages)
    }

    async fn find_package(&self, id: i64) -> AppResult<Option<Package>> {
        let package = sqlx::query_as::<_, Package>(
            "SELECT id, title, description, difficulty_level, created_at FROM packages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(package)
    }

    async fn package_question_ids(&self, package_id: i64) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT question_id FROM package_questions WHERE package_id = $1 ORDER BY order_index ASC",
        )
        .bind(package_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn count_package_questions(&self, package_id: i64) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM package_questions WHERE package_id = $1")
                .bind(package_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn delete_package(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM package_questions WHERE package_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM packages WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_assignment_batch(
        &self,
        packages: &[PackageDraft],
        assignments: &[NewAssignment],
        tokens: &[NewLoginToken],
    ) -> AppResult<Vec<i64>> {
        let mut tx = self.pool.begin().await?;

        let mut package_ids = Vec::with_capacity(packages.len());
        for draft in packages {
            package_ids.push(insert_package_rows(&mut *tx, &draft.package, &draft.question_ids).await?);
        }

        let mut ids = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let package_id = match assignment.package {
                PackageRef::Existing(id) => id,
                PackageRef::New(index) => *package_ids.get(index).ok_or_else(|| {
                    AppError::InternalServerError(format!("Batch has no package #{}", index))
                })?,
            };
            let assignment_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO assignments
                (user_sicil, package_id, assigned_by, assignment_type, due_date, status)
                VALUES ($1, $2, $3, $4, $5, 'pending')
                RETURNING id
                "#,
            )
            .bind(assignment.user_sicil)
            .bind(package_id)
            .bind(&assignment.assigned_by)
            .bind(assignment.assignment_type.as_str())
            .bind(assignment.due_date)
            .fetch_one(&mut *tx)
            .await?;

            if !assignment.question_ids.is_empty() {
                let mut builder = QueryBuilder::<Postgres>::new(
                    "INSERT INTO assignment_questions (assignment_id, question_id, order_index) ",
                );
                builder.push_values(
                    assignment.question_ids.iter().enumerate(),
                    |mut row, (index, question_id)| {
                        row.push_bind(assignment_id)
                            .push_bind(*question_id)
                            .push_bind(index as i32);
                    },
                );
                builder.build().execute(&mut *tx).await?;
            }

            ids.push(assignment_id);
        }

        if !tokens.is_empty() {
            let mut builder =
                QueryBuilder::<Postgres>::new("INSERT INTO login_tokens (code, user_sicil, expires_at) ");
            builder.push_values(tokens, |mut row, token| {
                row.push_bind(&token.code)
                    .push_bind(token.user_sicil)
                    .push_bind(token.expires_at);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn is_code_active(&self, code: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM login_tokens WHERE code = $1 AND is_used = FALSE AND expires_at > $2)",
        )
        .bind(code)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn consume_login_token(
        &self,
        sicil: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        // The outer `is_used = FALSE` is re-checked against the latest row version,
        // so of two concurrent requests only one can flip the flag.
        let result = sqlx::query(
            r#"
            UPDATE login_tokens SET is_used = TRUE
            WHERE is_used = FALSE
              AND id = (
                SELECT id FROM login_tokens
                WHERE user_sicil = $1 AND code = $2 AND is_used = FALSE AND expires_at > $3
                ORDER BY expires_at DESC
                LIMIT 1
              )
            "#,
        )
        .bind(sicil)
        .bind(code)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_assignments_for_subject(
        &self,
        sicil: i64,
    ) -> AppResult<Vec<AssignmentListItem>> {
        let items = sqlx::query_as::<_, AssignmentListItem>(
            r#"
            SELECT
                a.id, a.status, a.due_date, a.assignment_type, a.created_at, a.score,
                p.title, p.description,
                (SELECT COUNT(*) FROM assignment_questions aq WHERE aq.assignment_id = a.id) AS question_count
            FROM assignments a
            LEFT JOIN packages p ON p.id = a.package_id
            WHERE a.user_sicil = $1
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .bind(sicil)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn list_tracking(&self) -> AppResult<Vec<TrackingEntry>> {
        let entries = sqlx::query_as::<_, TrackingEntry>(
            r#"
            SELECT
                a.id, a.user_sicil, pe.full_name, p.title AS package_title,
                a.assignment_type, a.status, a.score, a.due_date, a.completed_at
            FROM assignments a
            LEFT JOIN personnel pe ON pe.sicil = a.user_sicil
            LEFT JOIN packages p ON p.id = a.package_id
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn find_assignment(&self, id: i64) -> AppResult<Option<Assignment>> {
        let assignment = sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(assignment)
    }

    async fn find_assignment_for_subject(
        &self,
        id: i64,
        sicil: i64,
    ) -> AppResult<Option<Assignment>> {
        let assignment = sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1 AND user_sicil = $2"
        ))
        .bind(id)
        .bind(sicil)
        .fetch_optional(&self.pool)
        .await?;
        Ok(assignment)
    }

    async fn assignment_question_ids(&self, assignment_id: i64) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT question_id FROM assignment_questions WHERE assignment_id = $1 ORDER BY order_index ASC",
        )
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn complete_assignment(
        &self,
        assignment_id: i64,
        attempts: &[NewAttempt],
        score: f64,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE assignments
            SET status = 'completed', completed_at = $2, score = $3
            WHERE id = $1 AND status = 'pending' AND due_date >= $2
            "#,
        )
        .bind(assignment_id)
        .bind(now)
        .bind(score)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        if !attempts.is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO attempts (assignment_id, question_id, click_x, click_y, user_choice, \
                 is_correct, distance_score, duration_seconds) ",
            );
            builder.push_values(attempts, |mut row, attempt| {
                row.push_bind(assignment_id)
                    .push_bind(attempt.question_id)
                    .push_bind(attempt.click_x)
                    .push_bind(attempt.click_y)
                    .push_bind(attempt.user_choice.as_str().to_string())
                    .push_bind(attempt.is_correct)
                    .push_bind(attempt.distance_score)
                    .push_bind(attempt.duration_seconds);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn list_attempts(&self, assignment_id: i64) -> AppResult<Vec<Attempt>> {
        let attempts = sqlx::query_as::<_, Attempt>(
            r#"
            SELECT id, assignment_id, question_id, click_x, click_y, user_choice,
                   is_correct, distance_score, duration_seconds, created_at
            FROM attempts
            WHERE assignment_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    async fn delete_assignment(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM attempts WHERE assignment_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM assignment_questions WHERE assignment_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn latest_personnel_rates(&self) -> AppResult<Vec<PersonnelRate>> {
        let rates = sqlx::query_as::<_, PersonnelRate>(
            r#"
            SELECT pe.sicil, pe.full_name, ms.success_rate, ms.month
            FROM personnel pe
            JOIN monthly_stats ms ON ms.sicil = pe.sicil
            WHERE ms.month = (SELECT MAX(month) FROM monthly_stats)
            ORDER BY ms.success_rate ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rates)
    }
}

/// Writes a package and its ordered associations on an open transaction.
async fn insert_package_rows(
    conn: &mut PgConnection,
    package: &NewPackage,
    question_ids: &[i64],
) -> AppResult<i64> {
    let package_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO packages (title, description, difficulty_level)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(&package.title)
    .bind(&package.description)
    .bind(&package.difficulty_level)
    .fetch_one(&mut *conn)
    .await?;

    if !question_ids.is_empty() {
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO package_questions (package_id, question_id, order_index) ",
        );
        builder.push_values(question_ids.iter().enumerate(), |mut row, (index, question_id)| {
            row.push_bind(package_id)
                .push_bind(*question_id)
                .push_bind(index as i32);
        });
        builder.build().execute(&mut *conn).await?;
    }

    Ok(package_id)
}
