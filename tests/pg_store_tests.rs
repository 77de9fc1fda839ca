// tests/pg_store_tests.rs

use chrono::{Duration, Utc};
use g8::{
    models::{
        question::{Answer, Difficulty, QuestionDraft, QuestionType},
        test::{NewTest, Schedule},
    },
    store::{PgStore, Store},
};

/// Connects to the database named by DATABASE_URL, or returns `None` so the
/// test is skipped on machines without Postgres.
async fn connect() -> Option<PgStore> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    Some(
        PgStore::connect(&database_url)
            .await
            .expect("Failed to connect to Postgres for testing"),
    )
}

fn nat(text: &str) -> QuestionDraft {
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

#[tokio::test]
async fn bulk_imported_questions_keep_their_order() {
    let Some(store) = connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let now = Utc::now();
    let test = store
        .create_test(NewTest {
            title: "Ordering".to_string(),
            description: None,
            schedule: Schedule::new(now, now + Duration::hours(1), 30).unwrap(),
            tags: vec![],
        })
        .await
        .unwrap();

    let first: Vec<String> = (1..=12).map(|i| format!("Q{}", i)).collect();
    let created = store
        .create_questions(test.id, first.iter().map(|t| nat(t)).collect())
        .await
        .unwrap();
    let created_texts: Vec<&str> = created.iter().map(|q| q.question_text.as_str()).collect();
    assert_eq!(created_texts, first.iter().map(String::as_str).collect::<Vec<_>>());

    // A second import lands after the first one.
    store
        .create_questions(test.id, vec![nat("Q13"), nat("Q14")])
        .await
        .unwrap();

    let listed: Vec<String> = store
        .list_questions(test.id)
        .await
        .unwrap()
        .into_iter()
        .map(|q| q.question_text)
        .collect();
    let expected: Vec<String> = (1..=14).map(|i| format!("Q{}", i)).collect();
    assert_eq!(listed, expected);

    store.delete_test(test.id).await.unwrap();
}
