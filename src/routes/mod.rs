pub mod college;
pub mod health;
pub mod master;
pub mod student;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::middleware::{
    auth::{require_roles, RoleGate},
    rate_limit::{new_rps_state, rps_middleware},
};
use crate::config::Config;
use crate::models::user::Role;
use crate::AppState;

const MASTER: &[Role] = &[Role::Master];
const COLLEGE_ADMIN: &[Role] = &[Role::CollegeAdmin];
const COLLEGE_STAFF: &[Role] = &[Role::CollegeAdmin, Role::Faculty];
const STUDENT: &[Role] = &[Role::Student];

pub fn master_routes(jwt_secret: &str) -> Router<AppState> {
    Router::new()
        .route(
            "/api/master/tests",
            get(master::list_tests).post(master::create_test),
        )
        .route("/api/master/tests/:id", get(master::get_test))
        .route(
            "/api/master/tests/:id/deactivate",
            post(master::deactivate_test),
        )
        .route(
            "/api/master/tests/:id/colleges",
            get(master::list_test_assignments).post(master::assign_colleges),
        )
        .route(
            "/api/master/tests/:id/statistics",
            get(master::test_statistics),
        )
        .route(
            "/api/master/tests/:id/export",
            get(master::export_test_report),
        )
        .route(
            "/api/master/questions/generate",
            post(master::generate_questions),
        )
        .route(
            "/api/master/questions/extract",
            post(master::extract_questions),
        )
        .route("/api/master/colleges", post(master::create_college))
        .layer(from_fn_with_state(
            RoleGate::new(jwt_secret, MASTER),
            require_roles,
        ))
}

pub fn college_routes(jwt_secret: &str) -> Router<AppState> {
    let admin = Router::new()
        .route("/api/college/assignments", get(college::list_assignments))
        .route(
            "/api/college/assignments/:id/decision",
            post(college::decide_assignment),
        )
        .route(
            "/api/college/assignments/:id/students",
            post(college::assign_students),
        )
        .route(
            "/api/college/students",
            get(college::list_students).post(college::create_student),
        )
        .layer(from_fn_with_state(
            RoleGate::new(jwt_secret, COLLEGE_ADMIN),
            require_roles,
        ));

    let reports = Router::new()
        .route(
            "/api/college/reports/performance",
            get(college::performance_report),
        )
        .route(
            "/api/college/tests/:id/statistics",
            get(college::test_statistics),
        )
        .layer(from_fn_with_state(
            RoleGate::new(jwt_secret, COLLEGE_STAFF),
            require_roles,
        ));

    admin.merge(reports)
}

pub fn student_routes(jwt_secret: &str) -> Router<AppState> {
    Router::new()
        .route("/api/student/tests", get(student::list_tests))
        .route("/api/student/tests/:id", get(student::get_test))
        .route(
            "/api/student/tests/:id/begin",
            post(student::begin_attempt),
        )
        .route(
            "/api/student/tests/:id/submit",
            post(student::submit_attempt),
        )
        .route(
            "/api/student/tests/:id/results",
            get(student::get_results),
        )
        .route("/api/student/attempts", get(student::attempt_history))
        .layer(from_fn_with_state(
            RoleGate::new(jwt_secret, STUDENT),
            require_roles,
        ))
}

/// All role groups plus `/health`, rate limited per client.
pub fn api_router(config: &Config) -> Router<AppState> {
    let jwt_secret = config.jwt_secret.as_str();
    let base_routes = Router::new().route("/health", get(health::health));

    let api = master_routes(jwt_secret)
        .merge(college_routes(jwt_secret))
        .merge(student_routes(jwt_secret))
        .layer(from_fn_with_state(
            new_rps_state(config.api_rps, &config.trusted_proxies),
            rps_middleware,
        ));

    base_routes.merge(api)
}
