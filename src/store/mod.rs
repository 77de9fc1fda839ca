// src/store/mod.rs

//! Persistence seam. Handlers only ever talk to `dyn Store`.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptOverview, GradedAttempt, ResponseDetail, TestAttempt},
        question::{Answer, Question, QuestionDraft},
        test::{NewTest, Test, TestChanges, TestSummary},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, AppError>;

pub type DynStore = Arc<dyn Store>;

/// Every attempt operation takes the caller's id and only matches rows that
/// belong to them; a foreign attempt looks exactly like a missing one.
#[async_trait]
pub trait Store: Send + Sync {
    // Tests
    async fn list_tests(&self) -> StoreResult<Vec<TestSummary>>;
    async fn get_test(&self, id: Uuid) -> StoreResult<Option<Test>>;
    async fn create_test(&self, new: NewTest) -> StoreResult<Test>;
    async fn update_test(&self, id: Uuid, changes: TestChanges) -> StoreResult<Option<Test>>;
    async fn delete_test(&self, id: Uuid) -> StoreResult<bool>;

    // Questions
    async fn list_questions(&self, test_id: Uuid) -> StoreResult<Vec<Question>>;
    async fn get_question(&self, id: Uuid) -> StoreResult<Option<Question>>;
    async fn create_questions(
        &self,
        test_id: Uuid,
        drafts: Vec<QuestionDraft>,
    ) -> StoreResult<Vec<Question>>;
    async fn update_question(&self, id: Uuid, draft: QuestionDraft)
    -> StoreResult<Option<Question>>;
    async fn delete_question(&self, id: Uuid) -> StoreResult<bool>;

    // Attempts
    async fn create_attempt(&self, user_id: Uuid, test_id: Uuid) -> StoreResult<TestAttempt>;
    async fn find_open_attempt(
        &self,
        user_id: Uuid,
        test_id: Uuid,
    ) -> StoreResult<Option<TestAttempt>>;
    async fn get_attempt(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<TestAttempt>>;
    async fn list_attempts(&self, user_id: Uuid) -> StoreResult<Vec<AttemptOverview>>;

    /// Replaces the stored responses map of an unfinished attempt, leaving
    /// the exit counter untouched. `None` when nothing matched.
    async fn save_responses(
        &self,
        id: Uuid,
        user_id: Uuid,
        responses: BTreeMap<Uuid, Answer>,
    ) -> StoreResult<Option<TestAttempt>>;

    /// Atomically bumps `exit_count` and returns the new value.
    async fn record_exit(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<i64>>;

    /// Writes the graded responses and closes the attempt in one unit.
    /// Returns `None` if the attempt is missing, foreign, or already closed.
    async fn complete_attempt(
        &self,
        id: Uuid,
        user_id: Uuid,
        final_responses: BTreeMap<Uuid, Answer>,
        graded: GradedAttempt,
    ) -> StoreResult<Option<TestAttempt>>;

    async fn list_responses(&self, attempt_id: Uuid) -> StoreResult<Vec<ResponseDetail>>;
}

