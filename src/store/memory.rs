// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::{
        attempt::{
            AttemptAnswers, AttemptOverview, GradedAttempt, QuestionResponse, ResponseDetail,
            TestAttempt,
        },
        question::{Answer, Question, QuestionDraft},
        test::{NewTest, Test, TestChanges, TestSummary},
    },
    store::{Store, StoreResult},
};

#[derive(Default)]
struct Tables {
    tests: HashMap<Uuid, Test>,
    /// Insertion order doubles as display order.
    questions: Vec<Question>,
    attempts: HashMap<Uuid, TestAttempt>,
    responses: Vec<QuestionResponse>,
}

/// In-process store used when no `DATABASE_URL` is configured and by the
/// integration tests. Every operation runs under one lock, so each call is
/// atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn question_from_draft(test_id: Uuid, draft: QuestionDraft) -> Question {
    Question {
        id: Uuid::new_v4(),
        test_id,
        question_text: draft.question_text,
        question_type: draft.question_type,
        options: Json(draft.options),
        correct_answer: Json(draft.correct_answer),
        marks: draft.marks,
        negative_marks: draft.negative_marks,
        difficulty: draft.difficulty,
        explanation: draft.explanation,
        created_at: Utc::now(),
    }
}

fn owned<'a>(
    attempts: &'a mut HashMap<Uuid, TestAttempt>,
    id: Uuid,
    user_id: Uuid,
) -> Option<&'a mut TestAttempt> {
    attempts.get_mut(&id).filter(|a| a.user_id == user_id)
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_tests(&self) -> StoreResult<Vec<TestSummary>> {
        let tables = self.tables.read().await;
        let mut tests: Vec<TestSummary> = tables
            .tests
            .values()
            .map(|t| TestSummary {
                test: t.clone(),
                question_count: tables.questions.iter().filter(|q| q.test_id == t.id).count()
                    as i64,
            })
            .collect();
        tests.sort_by(|a, b| b.test.start_time.cmp(&a.test.start_time));
        Ok(tests)
    }

    async fn get_test(&self, id: Uuid) -> StoreResult<Option<Test>> {
        Ok(self.tables.read().await.tests.get(&id).cloned())
    }

    async fn create_test(&self, new: NewTest) -> StoreResult<Test> {
        let test = Test {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            duration_minutes: new.schedule.duration_minutes,
            start_time: new.schedule.start_time,
            end_time: new.schedule.end_time,
            tags: new.tags,
            created_at: Utc::now(),
        };
        self.tables.write().await.tests.insert(test.id, test.clone());
        Ok(test)
    }

    async fn update_test(&self, id: Uuid, changes: TestChanges) -> StoreResult<Option<Test>> {
        let mut tables = self.tables.write().await;
        let Some(test) = tables.tests.get_mut(&id) else {
            return Ok(None);
        };

        test.start_time = changes.schedule.start_time;
        test.end_time = changes.schedule.end_time;
        test.duration_minutes = changes.schedule.duration_minutes;
        if let Some(title) = changes.title {
            test.title = title;
        }
        if let Some(description) = changes.description {
            test.description = Some(description);
        }
        if let Some(tags) = changes.tags {
            test.tags = tags;
        }
        Ok(Some(test.clone()))
    }

    async fn delete_test(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.tests.remove(&id).is_none() {
            return Ok(false);
        }

        // Cascade like the foreign keys do.
        tables.questions.retain(|q| q.test_id != id);
        let attempt_ids: Vec<Uuid> = tables
            .attempts
            .values()
            .filter(|a| a.test_id == id)
            .map(|a| a.id)
            .collect();
        tables.attempts.retain(|_, a| a.test_id != id);
        tables.responses.retain(|r| !attempt_ids.contains(&r.attempt_id));
        Ok(true)
    }

    async fn list_questions(&self, test_id: Uuid) -> StoreResult<Vec<Question>> {
        let tables = self.tables.read().await;
        Ok(tables
            .questions
            .iter()
            .filter(|q| q.test_id == test_id)
            .cloned()
            .collect())
    }

    async fn get_question(&self, id: Uuid) -> StoreResult<Option<Question>> {
        let tables = self.tables.read().await;
        Ok(tables.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn create_questions(
        &self,
        test_id: Uuid,
        drafts: Vec<QuestionDraft>,
    ) -> StoreResult<Vec<Question>> {
        let created: Vec<Question> = drafts
            .into_iter()
            .map(|d| question_from_draft(test_id, d))
            .collect();
        self.tables
            .write()
            .await
            .questions
            .extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_question(
        &self,
        id: Uuid,
        draft: QuestionDraft,
    ) -> StoreResult<Option<Question>> {
        let mut tables = self.tables.write().await;
        let Some(question) = tables.questions.iter_mut().find(|q| q.id == id) else {
            return Ok(None);
        };

        let replacement = question_from_draft(question.test_id, draft);
        *question = Question {
            id: question.id,
            created_at: question.created_at,
            ..replacement
        };
        Ok(Some(question.clone()))
    }

    async fn delete_question(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.questions.len();
        tables.questions.retain(|q| q.id != id);
        let removed = tables.questions.len() != before;
        if removed {
            tables.responses.retain(|r| r.question_id != id);
        }
        Ok(removed)
    }

    async fn create_attempt(&self, user_id: Uuid, test_id: Uuid) -> StoreResult<TestAttempt> {
        let attempt = TestAttempt {
            id: Uuid::new_v4(),
            user_id,
            test_id,
            answers: Json(AttemptAnswers::default()),
            total_score: None,
            percentage: None,
            is_completed: false,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.tables
            .write()
            .await
            .attempts
            .insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn find_open_attempt(
        &self,
        user_id: Uuid,
        test_id: Uuid,
    ) -> StoreResult<Option<TestAttempt>> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && a.test_id == test_id && !a.is_completed)
            .max_by_key(|a| a.started_at)
            .cloned())
    }

    async fn get_attempt(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<TestAttempt>> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .get(&id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn list_attempts(&self, user_id: Uuid) -> StoreResult<Vec<AttemptOverview>> {
        let tables = self.tables.read().await;
        let mut overviews: Vec<AttemptOverview> = tables
            .attempts
            .values()
            .filter(|a| a.user_id == user_id)
            .filter_map(|a| {
                let test = tables.tests.get(&a.test_id)?;
                Some(AttemptOverview {
                    id: a.id,
                    test_id: a.test_id,
                    test_title: test.title.clone(),
                    duration_minutes: test.duration_minutes,
                    total_score: a.total_score,
                    percentage: a.percentage,
                    is_completed: a.is_completed,
                    started_at: a.started_at,
                    completed_at: a.completed_at,
                })
            })
            .collect();
        overviews.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(overviews)
    }

    async fn save_responses(
        &self,
        id: Uuid,
        user_id: Uuid,
        responses: BTreeMap<Uuid, Answer>,
    ) -> StoreResult<Option<TestAttempt>> {
        let mut tables = self.tables.write().await;
        let attempt = owned(&mut tables.attempts, id, user_id).filter(|a| !a.is_completed);
        Ok(attempt.map(|a| {
            a.answers.0.responses = responses;
            a.clone()
        }))
    }

    async fn record_exit(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<i64>> {
        let mut tables = self.tables.write().await;
        Ok(owned(&mut tables.attempts, id, user_id).map(|a| {
            a.answers.0.exit_count += 1;
            a.answers.0.exit_count
        }))
    }

    async fn complete_attempt(
        &self,
        id: Uuid,
        user_id: Uuid,
        final_responses: BTreeMap<Uuid, Answer>,
        graded: GradedAttempt,
    ) -> StoreResult<Option<TestAttempt>> {
        let mut tables = self.tables.write().await;
        let Some(attempt) = owned(&mut tables.attempts, id, user_id).filter(|a| !a.is_completed)
        else {
            return Ok(None);
        };

        attempt.answers.0.responses = final_responses;
        attempt.total_score = Some(graded.total_score);
        attempt.percentage = Some(graded.percentage);
        attempt.is_completed = true;
        attempt.completed_at = Some(Utc::now());
        let attempt = attempt.clone();

        tables
            .responses
            .extend(graded.responses.into_iter().map(|r| QuestionResponse {
                id: Uuid::new_v4(),
                attempt_id: id,
                question_id: r.question_id,
                user_answer: r.user_answer.map(Json),
                is_correct: r.is_correct,
                marks_obtained: r.marks_obtained,
            }));

        Ok(Some(attempt))
    }

    async fn list_responses(&self, attempt_id: Uuid) -> StoreResult<Vec<ResponseDetail>> {
        let tables = self.tables.read().await;
        // Follow question order so reports read top to bottom.
        Ok(tables
            .questions
            .iter()
            .filter_map(|q| {
                let r = tables
                    .responses
                    .iter()
                    .find(|r| r.attempt_id == attempt_id && r.question_id == q.id)?;
                Some(ResponseDetail {
                    question_id: q.id,
                    question_text: q.question_text.clone(),
                    question_type: q.question_type,
                    options: q.options.clone(),
                    correct_answer: q.correct_answer.clone(),
                    explanation: q.explanation.clone(),
                    marks: q.marks,
                    negative_marks: q.negative_marks,
                    user_answer: r.user_answer.clone(),
                    is_correct: r.is_correct,
                    marks_obtained: r.marks_obtained,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test::Schedule;

    async fn store_with_test() -> (MemoryStore, Test) {
        let store = MemoryStore::new();
        let start = Utc::now() - chrono::Duration::hours(1);
        let test = store
            .create_test(NewTest {
                title: "Mock".to_string(),
                description: None,
                schedule: Schedule::new(start, start + chrono::Duration::hours(3), 60).unwrap(),
                tags: vec![],
            })
            .await
            .unwrap();
        (store, test)
    }

    #[tokio::test]
    async fn attempts_are_scoped_to_owner() {
        let (store, test) = store_with_test().await;
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let attempt = store.create_attempt(owner, test.id).await.unwrap();

        assert!(store.get_attempt(attempt.id, owner).await.unwrap().is_some());
        assert!(store.get_attempt(attempt.id, stranger).await.unwrap().is_none());
        assert!(store.record_exit(attempt.id, stranger).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_exit_counts_every_call() {
        let (store, test) = store_with_test().await;
        let user = Uuid::new_v4();
        let attempt = store.create_attempt(user, test.id).await.unwrap();

        for expected in 1..=5 {
            let count = store.record_exit(attempt.id, user).await.unwrap();
            assert_eq!(count, Some(expected));
        }
    }

    #[tokio::test]
    async fn concurrent_exits_are_not_lost() {
        let (store, test) = store_with_test().await;
        let store = std::sync::Arc::new(store);
        let user = Uuid::new_v4();
        let attempt = store.create_attempt(user, test.id).await.unwrap();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.record_exit(attempt.id, user).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let stored = store.get_attempt(attempt.id, user).await.unwrap().unwrap();
        assert_eq!(stored.answers.0.exit_count, 50);
    }

    #[tokio::test]
    async fn completed_attempt_cannot_be_completed_again() {
        let (store, test) = store_with_test().await;
        let user = Uuid::new_v4();
        let attempt = store.create_attempt(user, test.id).await.unwrap();
        let graded = GradedAttempt {
            responses: vec![],
            total_score: 0.0,
            max_score: 0.0,
            percentage: 0.0,
        };

        let first = store
            .complete_attempt(attempt.id, user, BTreeMap::new(), graded.clone())
            .await
            .unwrap();
        assert!(first.is_some_and(|a| a.is_completed));

        let second = store
            .complete_attempt(attempt.id, user, BTreeMap::new(), graded)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn deleting_test_cascades() {
        let (store, test) = store_with_test().await;
        let user = Uuid::new_v4();
        store.create_attempt(user, test.id).await.unwrap();

        assert!(store.delete_test(test.id).await.unwrap());
        assert!(store.list_attempts(user).await.unwrap().is_empty());
        assert!(!store.delete_test(test.id).await.unwrap());
    }
}
