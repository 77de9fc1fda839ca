// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, ai, attempt, exam, health},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public: health, test listing and test detail.
/// * Signed in: attempts, results, practice generation.
/// * Admin (signed in and on the allow-list): test/question management and
///   AI authoring tools.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);
    let admin_only = middleware::from_fn_with_state(state.clone(), admin_middleware);

    let test_routes = Router::new()
        .route("/", get(exam::list_tests))
        .route("/{id}", get(exam::get_test))
        // Protected attempt routes
        .merge(
            Router::new()
                .route("/start", post(attempt::start_attempt))
                .route("/save-answers", post(attempt::save_answers))
                .route("/submit", post(attempt::submit_attempt))
                .route("/record-exit", post(attempt::record_exit))
                .route("/result/{attempt_id}", get(attempt::get_result))
                .route_layer(auth.clone()),
        );

    let user_routes = Router::new()
        .route("/attempts", get(attempt::list_my_attempts))
        .route_layer(auth.clone());

    let protected_routes = Router::new()
        .route("/ai/generate", post(ai::generate))
        .route("/ai/engines", get(ai::list_engines))
        .route_layer(auth.clone());

    let admin_routes = Router::new()
        .route("/tests/create", post(admin::create_test))
        .route("/tests/update", post(admin::update_test))
        .route("/tests/{id}", delete(admin::delete_test))
        .route("/tests/{id}/questions", get(admin::list_questions))
        .route("/questions/create", post(admin::create_question))
        .route("/questions/bulk", post(admin::bulk_create_questions))
        .route("/questions/update", post(admin::update_question))
        .route("/questions/{id}", delete(admin::delete_question))
        .route("/questions/enhance", post(ai::enhance))
        .route("/questions/explain", post(ai::explain))
        .route("/questions/translate", post(ai::translate))
        .route("/questions/parse", post(ai::parse))
        .route("/questions/assess-difficulty", post(ai::assess_difficulty))
        // Double middleware protection: Auth first, then Admin check
        .route_layer(admin_only)
        .route_layer(auth);

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/tests", test_routes)
        .nest("/api/user", user_routes)
        .nest("/api/protected", protected_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
