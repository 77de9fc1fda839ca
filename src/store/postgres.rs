// src/store/postgres.rs

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, postgres::PgPoolOptions, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptAnswers, AttemptOverview, GradedAttempt, ResponseDetail, TestAttempt},
        question::{Answer, Question, QuestionDraft},
        test::{NewTest, Test, TestChanges, TestSummary},
    },
    store::{Store, StoreResult},
};

const TEST_COLUMNS: &str =
    "id, title, description, duration_minutes, start_time, end_time, tags, created_at";

const QUESTION_COLUMNS: &str = "id, test_id, question_text, question_type, options, \
    correct_answer, marks, negative_marks, difficulty, explanation, created_at";

const ATTEMPT_COLUMNS: &str = "id, user_id, test_id, answers, total_score, percentage, \
    is_completed, started_at, completed_at";

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with a short retry loop (the database container may still be
    /// booting) and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let mut retry_count = 0;
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) => {
                    retry_count += 1;
                    if retry_count > 5 {
                        return Err(e);
                    }
                    tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        };
        tracing::info!("Database connected...");

        tracing::info!("Running migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied successfully.");

        Ok(Self::new(pool))
    }
}

/// A freshly inserted question together with its display position.
#[derive(sqlx::FromRow)]
struct PositionedQuestion {
    #[sqlx(flatten)]
    question: Question,
    position: i32,
}

/// Multi-row insert; drafts keep their order through consecutive positions
/// starting at `first_position`.
fn insert_questions_query(
    test_id: Uuid,
    first_position: i32,
    drafts: Vec<QuestionDraft>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO questions (id, test_id, position, question_text, question_type, options, \
         correct_answer, marks, negative_marks, difficulty, explanation) ",
    );

    builder.push_values(drafts.into_iter().zip(first_position..), |mut row, (draft, position)| {
        row.push_bind(Uuid::new_v4())
            .push_bind(test_id)
            .push_bind(position)
            .push_bind(draft.question_text)
            .push_bind(draft.question_type.as_str())
            .push_bind(Json(draft.options))
            .push_bind(Json(draft.correct_answer))
            .push_bind(draft.marks)
            .push_bind(draft.negative_marks)
            .push_bind(draft.difficulty.as_str())
            .push_bind(draft.explanation);
    });
    builder.push(" RETURNING ");
    builder.push(QUESTION_COLUMNS);
    builder.push(", position");
    builder
}

fn log_db_error(context: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!("Failed to {}: {:?}", context, e);
        AppError::InternalServerError(e.to_string())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_tests(&self) -> StoreResult<Vec<TestSummary>> {
        let sql = r#"
            SELECT
                t.id, t.title, t.description, t.duration_minutes,
                t.start_time, t.end_time, t.tags, t.created_at,
                COUNT(q.id) AS question_count
            FROM tests t
            LEFT JOIN questions q ON q.test_id = t.id
            GROUP BY t.id
            ORDER BY t.start_time DESC
        "#;

        sqlx::query_as::<_, TestSummary>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(log_db_error("list tests"))
    }

    async fn get_test(&self, id: Uuid) -> StoreResult<Option<Test>> {
        let sql = format!("SELECT {} FROM tests WHERE id = $1", TEST_COLUMNS);
        Ok(sqlx::query_as::<_, Test>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_test(&self, new: NewTest) -> StoreResult<Test> {
        let sql = format!(
            r#"
            INSERT INTO tests (id, title, description, duration_minutes, start_time, end_time, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            TEST_COLUMNS
        );

        sqlx::query_as::<_, Test>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.title)
            .bind(new.description)
            .bind(new.schedule.duration_minutes)
            .bind(new.schedule.start_time)
            .bind(new.schedule.end_time)
            .bind(new.tags)
            .fetch_one(&self.pool)
            .await
            .map_err(log_db_error("create test"))
    }

    async fn update_test(&self, id: Uuid, changes: TestChanges) -> StoreResult<Option<Test>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE tests SET ");
        let mut separated = builder.separated(", ");

        separated.push("start_time = ");
        separated.push_bind_unseparated(changes.schedule.start_time);
        separated.push("end_time = ");
        separated.push_bind_unseparated(changes.schedule.end_time);
        separated.push("duration_minutes = ");
        separated.push_bind_unseparated(changes.schedule.duration_minutes);

        if let Some(title) = changes.title {
            separated.push("title = ");
            separated.push_bind_unseparated(title);
        }

        if let Some(description) = changes.description {
            separated.push("description = ");
            separated.push_bind_unseparated(description);
        }

        if let Some(tags) = changes.tags {
            separated.push("tags = ");
            separated.push_bind_unseparated(tags);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING ");
        builder.push(TEST_COLUMNS);

        builder
            .build_query_as::<Test>()
            .fetch_optional(&self.pool)
            .await
            .map_err(log_db_error("update test"))
    }

    async fn delete_test(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(log_db_error("delete test"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_questions(&self, test_id: Uuid) -> StoreResult<Vec<Question>> {
        let sql = format!(
            "SELECT {} FROM questions WHERE test_id = $1 ORDER BY position, created_at, id",
            QUESTION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Question>(&sql)
            .bind(test_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_question(&self, id: Uuid) -> StoreResult<Option<Question>> {
        let sql = format!("SELECT {} FROM questions WHERE id = $1", QUESTION_COLUMNS);
        Ok(sqlx::query_as::<_, Question>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_questions(
        &self,
        test_id: Uuid,
        drafts: Vec<QuestionDraft>,
    ) -> StoreResult<Vec<Question>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;

        // Serialize imports into the same test so positions do not collide.
        sqlx::query("SELECT id FROM tests WHERE id = $1 FOR UPDATE")
            .bind(test_id)
            .execute(&mut *tx)
            .await
            .map_err(log_db_error("lock test"))?;

        let next: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM questions WHERE test_id = $1",
        )
        .bind(test_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(log_db_error("read question position"))?;

        let mut builder = insert_questions_query(test_id, next, drafts);
        let mut created = builder
            .build_query_as::<PositionedQuestion>()
            .fetch_all(&mut *tx)
            .await
            .map_err(log_db_error("create questions"))?;

        tx.commit().await?;

        // RETURNING does not promise input order.
        created.sort_by_key(|q| q.position);
        Ok(created.into_iter().map(|q| q.question).collect())
    }

    async fn update_question(
        &self,
        id: Uuid,
        draft: QuestionDraft,
    ) -> StoreResult<Option<Question>> {
        let sql = format!(
            r#"
            UPDATE questions SET
                question_text = $2,
                question_type = $3,
                options = $4,
                correct_answer = $5,
                marks = $6,
                negative_marks = $7,
                difficulty = $8,
                explanation = $9
            WHERE id = $1
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        );

        sqlx::query_as::<_, Question>(&sql)
            .bind(id)
            .bind(draft.question_text)
            .bind(draft.question_type.as_str())
            .bind(Json(draft.options))
            .bind(Json(draft.correct_answer))
            .bind(draft.marks)
            .bind(draft.negative_marks)
            .bind(draft.difficulty.as_str())
            .bind(draft.explanation)
            .fetch_optional(&self.pool)
            .await
            .map_err(log_db_error("update question"))
    }

    async fn delete_question(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(log_db_error("delete question"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_attempt(&self, user_id: Uuid, test_id: Uuid) -> StoreResult<TestAttempt> {
        let sql = format!(
            r#"
            INSERT INTO test_attempts (id, user_id, test_id, answers)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        );

        sqlx::query_as::<_, TestAttempt>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(test_id)
            .bind(Json(AttemptAnswers::default()))
            .fetch_one(&self.pool)
            .await
            .map_err(log_db_error("create attempt"))
    }

    async fn find_open_attempt(
        &self,
        user_id: Uuid,
        test_id: Uuid,
    ) -> StoreResult<Option<TestAttempt>> {
        let sql = format!(
            r#"
            SELECT {} FROM test_attempts
            WHERE user_id = $1 AND test_id = $2 AND NOT is_completed
            ORDER BY started_at DESC
            LIMIT 1
            "#,
            ATTEMPT_COLUMNS
        );

        Ok(sqlx::query_as::<_, TestAttempt>(&sql)
            .bind(user_id)
            .bind(test_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_attempt(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<TestAttempt>> {
        let sql = format!(
            "SELECT {} FROM test_attempts WHERE id = $1 AND user_id = $2",
            ATTEMPT_COLUMNS
        );

        Ok(sqlx::query_as::<_, TestAttempt>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_attempts(&self, user_id: Uuid) -> StoreResult<Vec<AttemptOverview>> {
        let sql = r#"
            SELECT
                a.id, a.test_id, t.title AS test_title, t.duration_minutes,
                a.total_score, a.percentage, a.is_completed, a.started_at, a.completed_at
            FROM test_attempts a
            JOIN tests t ON t.id = a.test_id
            WHERE a.user_id = $1
            ORDER BY a.started_at DESC
        "#;

        sqlx::query_as::<_, AttemptOverview>(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(log_db_error("list attempts"))
    }

    async fn save_responses(
        &self,
        id: Uuid,
        user_id: Uuid,
        responses: BTreeMap<Uuid, Answer>,
    ) -> StoreResult<Option<TestAttempt>> {
        let sql = format!(
            r#"
            UPDATE test_attempts
            SET answers = jsonb_set(answers, '{{responses}}', $3)
            WHERE id = $1 AND user_id = $2 AND NOT is_completed
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        );

        sqlx::query_as::<_, TestAttempt>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(Json(responses))
            .fetch_optional(&self.pool)
            .await
            .map_err(log_db_error("save answers"))
    }

    async fn record_exit(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<i64>> {
        // Single statement: concurrent exits cannot lose an increment.
        let sql = r#"
            UPDATE test_attempts
            SET answers = jsonb_set(
                answers,
                '{exit_count}',
                to_jsonb(COALESCE((answers->>'exit_count')::BIGINT, 0) + 1)
            )
            WHERE id = $1 AND user_id = $2
            RETURNING (answers->>'exit_count')::BIGINT
        "#;

        sqlx::query_scalar::<_, i64>(sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(log_db_error("record exit"))
    }

    async fn complete_attempt(
        &self,
        id: Uuid,
        user_id: Uuid,
        final_responses: BTreeMap<Uuid, Answer>,
        graded: GradedAttempt,
    ) -> StoreResult<Option<TestAttempt>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE test_attempts SET
                answers = jsonb_set(answers, '{{responses}}', $3),
                total_score = $4,
                percentage = $5,
                is_completed = TRUE,
                completed_at = NOW()
            WHERE id = $1 AND user_id = $2 AND NOT is_completed
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        );

        let attempt = sqlx::query_as::<_, TestAttempt>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(Json(final_responses))
            .bind(graded.total_score)
            .bind(graded.percentage)
            .fetch_optional(&mut *tx)
            .await
            .map_err(log_db_error("complete attempt"))?;

        // Dropping the transaction rolls it back.
        let Some(attempt) = attempt else {
            return Ok(None);
        };

        if !graded.responses.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO question_responses \
                 (id, attempt_id, question_id, user_answer, is_correct, marks_obtained) ",
            );
            builder.push_values(graded.responses, |mut row, response| {
                row.push_bind(Uuid::new_v4())
                    .push_bind(id)
                    .push_bind(response.question_id)
                    .push_bind(response.user_answer.map(Json))
                    .push_bind(response.is_correct)
                    .push_bind(response.marks_obtained);
            });

            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(log_db_error("insert responses"))?;
        }

        tx.commit().await?;

        Ok(Some(attempt))
    }

    async fn list_responses(&self, attempt_id: Uuid) -> StoreResult<Vec<ResponseDetail>> {
        let sql = r#"
            SELECT
                r.question_id, q.question_text, q.question_type, q.options,
                q.correct_answer, q.explanation, q.marks, q.negative_marks,
                r.user_answer, r.is_correct, r.marks_obtained
            FROM question_responses r
            JOIN questions q ON q.id = r.question_id
            WHERE r.attempt_id = $1
            ORDER BY q.position, q.created_at, q.id
        "#;

        sqlx::query_as::<_, ResponseDetail>(sql)
            .bind(attempt_id)
            .fetch_all(&self.pool)
            .await
            .map_err(log_db_error("list responses"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Answer, Difficulty, QuestionType};

    fn draft(text: &str) -> QuestionDraft {
        QuestionDraft {
            question_text: text.to_string(),
            question_type: QuestionType::Nat,
            options: vec![],
            correct_answer: Answer::Numeric(1.0),
            marks: 1.0,
            negative_marks: 0.0,
            difficulty: Difficulty::Medium,
            explanation: None,
        }
    }

    #[test]
    fn bulk_insert_writes_positions_and_returns_them() {
        let builder = insert_questions_query(Uuid::nil(), 3, vec![draft("a"), draft("b")]);
        let sql = builder.sql();

        assert!(sql.starts_with("INSERT INTO questions (id, test_id, position,"));
        // Eleven columns per row, two rows.
        assert!(sql.contains("$22"));
        assert!(!sql.contains("$23"));
        assert!(sql.trim_end().ends_with(", position"));
    }
}
