// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, assignments, auth, exam},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, personnel_middleware},
};

/// Assembles the main application router.
///
/// * `/api/auth`: admin and exam logins, public.
/// * `/api/exams`, `/api/exam-questions`: the screener's exam runner.
/// * `/api/admin`: catalog, packages and assignments.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/exam-login", post(auth::exam_login));

    let exam_routes = Router::new()
        .route("/exams/my-assignments", get(exam::my_assignments))
        .route("/exams/{id}", get(exam::get_exam))
        .route("/exams/{id}/submit", post(exam::submit_exam))
        .route("/exam-questions/{id}", get(exam::get_question))
        // Auth first, then the role check
        .layer(middleware::from_fn(personnel_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/threat-types", get(admin::list_threat_types))
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/questions/{id}",
            get(admin::get_question)
                .put(admin::update_question)
                .delete(admin::delete_question),
        )
        .route(
            "/packages",
            get(admin::list_packages).post(admin::create_package),
        )
        .route("/packages/auto", post(admin::auto_generate_package))
        .route(
            "/packages/{id}",
            get(admin::get_package).delete(admin::delete_package),
        )
        .route(
            "/personnel/classified",
            get(assignments::classified_personnel),
        )
        .route(
            "/personnel/{sicil}/assignments",
            get(assignments::personnel_assignments),
        )
        .route(
            "/assignments",
            get(assignments::tracking).post(assignments::create_assignments),
        )
        .route(
            "/assignments/{id}",
            get(assignments::assignment_detail).delete(assignments::delete_assignment),
        )
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", exam_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
