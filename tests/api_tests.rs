// tests/api_tests.rs

use std::sync::Arc;

use serde_json::{Value, json};
use xray_exam::{
    config::{Config, ExamSettings, StoreBackend},
    routes, seed_admin,
    state::AppState,
    store::{DynStore, ExamStore, MemoryStore},
};

const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "admin_password";

struct TestApp {
    address: String,
    client: reqwest::Client,
    store: Arc<MemoryStore>,
}

/// Spawns the app on a random port, backed by a fresh in-memory store.
async fn spawn_app() -> TestApp {
    let config = Config {
        store_backend: StoreBackend::Memory,
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: Some(ADMIN_USERNAME.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        admin_display_name: Some("Eğitim Birimi".to_string()),
        exam: ExamSettings::default(),
    };

    let memory = Arc::new(MemoryStore::new());
    let store: DynStore = memory.clone();
    seed_admin(store.as_ref(), &config)
        .await
        .expect("Failed to seed admin");

    let app = routes::create_router(AppState { store, config });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        store: memory,
    }
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn admin_token(&self) -> String {
        let res = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 200);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    async fn create_question(&self, admin: &str, body: Value) -> i64 {
        let res = self.post(admin, "/api/admin/questions", body).await;
        assert_eq!(res.status().as_u16(), 201);
        let body: Value = res.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    async fn create_package(&self, admin: &str, question_ids: &[i64]) -> i64 {
        let res = self
            .post(
                admin,
                "/api/admin/packages",
                json!({ "title": "Haftalık Tarama", "question_ids": question_ids }),
            )
            .await;
        assert_eq!(res.status().as_u16(), 201);
        let body: Value = res.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    /// Assigns the package and returns the code issued to each sicil, in order.
    async fn assign(&self, admin: &str, package_id: i64, sicils: &[i64]) -> Vec<String> {
        let res = self
            .post(
                admin,
                "/api/admin/assignments",
                json!({ "package_id": package_id, "sicil_list": sicils, "type": "mandatory" }),
            )
            .await;
        assert_eq!(res.status().as_u16(), 201);
        let body: Value = res.json().await.unwrap();
        let codes = body["codes"].as_array().unwrap();
        sicils
            .iter()
            .map(|sicil| {
                codes
                    .iter()
                    .find(|c| c["sicil"].as_i64() == Some(*sicil))
                    .and_then(|c| c["code"].as_str())
                    .unwrap()
                    .to_string()
            })
            .collect()
    }

    async fn exam_login(&self, sicil: i64, code: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/exam-login"))
            .json(&json!({ "sicil": sicil, "code": code }))
            .send()
            .await
            .unwrap()
    }

    async fn personnel_token(&self, sicil: i64, code: &str) -> String {
        let res = self.exam_login(sicil, code).await;
        assert_eq!(res.status().as_u16(), 200);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn only_assignment(&self, token: &str) -> Value {
        let res = self.get(token, "/api/exams/my-assignments").await;
        assert_eq!(res.status().as_u16(), 200);
        let list: Vec<Value> = res.json().await.unwrap();
        assert_eq!(list.len(), 1);
        list.into_iter().next().unwrap()
    }
}

fn clean_question() -> Value {
    json!({ "image_url": "/uploads/clean.png", "has_threat": false })
}

fn knife_polygon_question() -> Value {
    json!({
        "image_url": "/uploads/knife.png",
        "has_threat": true,
        "threat_type": "bicak",
        "threat_polygon": [
            { "x": 0.2, "y": 0.2 },
            { "x": 0.2, "y": 0.4 },
            { "x": 0.4, "y": 0.4 },
            { "x": 0.4, "y": 0.2 }
        ]
    })
}

fn gun_part_point_question() -> Value {
    json!({
        "image_url": "/uploads/gun.png",
        "has_threat": true,
        "threat_type": "silah_parcasi",
        "coordinate_x": 0.5,
        "coordinate_y": 0.5
    })
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = spawn_app().await;
    let res = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn full_exam_with_perfect_score() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let clean = app.create_question(&admin, clean_question()).await;
    let knife = app.create_question(&admin, knife_polygon_question()).await;
    let gun = app.create_question(&admin, gun_part_point_question()).await;
    let package_id = app.create_package(&admin, &[clean, knife, gun]).await;

    let codes = app.assign(&admin, package_id, &[1001]).await;
    let token = app.personnel_token(1001, &codes[0]).await;

    let assignment = app.only_assignment(&token).await;
    assert_eq!(assignment["status"], "pending");
    assert_eq!(assignment["question_count"], 3);
    let assignment_id = assignment["id"].as_i64().unwrap();

    let res = app.get(&token, &format!("/api/exams/{}", assignment_id)).await;
    assert_eq!(res.status().as_u16(), 200);
    let exam: Value = res.json().await.unwrap();
    assert_eq!(exam["question_ids"], json!([clean, knife, gun]));
    assert_eq!(exam["time_limit_seconds"], 20);

    for id in [clean, knife, gun] {
        let res = app.get(&token, &format!("/api/exam-questions/{}", id)).await;
        assert_eq!(res.status().as_u16(), 200);
        let question: Value = res.json().await.unwrap();
        assert_eq!(question["options"].as_array().unwrap().len(), 4);
        assert!(question.get("has_threat").is_none());
        assert!(question.get("threat_type").is_none());
        assert!(question.get("threat_polygon").is_none());
        assert!(question.get("coordinate_x").is_none());
    }

    let res = app
        .post(
            &token,
            &format!("/api/exams/{}/submit", assignment_id),
            json!({ "answers": [
                { "question_id": clean, "choice": "clean", "duration_seconds": 4.0 },
                { "question_id": knife, "choice": "bicak", "click_x": 0.3, "click_y": 0.3, "duration_seconds": 6.5 },
                // exactly on the hit radius
                { "question_id": gun, "choice": "silah_parcasi", "click_x": 0.53, "click_y": 0.54, "duration_seconds": 9.0 }
            ]}),
        )
        .await;
    assert_eq!(res.status().as_u16(), 200);
    let result: Value = res.json().await.unwrap();
    assert_eq!(result["score"], 100.0);
    assert_eq!(result["correct_count"], 3);
    assert_eq!(result["total_questions"], 3);

    let assignment = app.only_assignment(&token).await;
    assert_eq!(assignment["status"], "completed");

    let res = app.get(&admin, "/api/admin/assignments").await;
    let tracking: Vec<Value> = res.json().await.unwrap();
    assert_eq!(tracking[0]["score"], 100.0);
    assert_eq!(tracking[0]["assignment_type"], "mandatory");

    let res = app
        .get(&admin, &format!("/api/admin/assignments/{}", assignment_id))
        .await;
    let detail: Value = res.json().await.unwrap();
    assert_eq!(detail["attempts"].as_array().unwrap().len(), 3);
    assert_eq!(detail["assigned_by"], "Eğitim Birimi");
}

#[tokio::test]
async fn wrong_location_and_type_score_partially() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let clean = app.create_question(&admin, clean_question()).await;
    let knife = app.create_question(&admin, knife_polygon_question()).await;
    let package_id = app.create_package(&admin, &[clean, knife]).await;
    let codes = app.assign(&admin, package_id, &[1001]).await;
    let token = app.personnel_token(1001, &codes[0]).await;
    let id = app.only_assignment(&token).await["id"].as_i64().unwrap();

    let res = app
        .post(
            &token,
            &format!("/api/exams/{}/submit", id),
            json!({ "answers": [
                { "question_id": clean, "choice": "clean", "duration_seconds": 2.0 },
                { "question_id": knife, "choice": "bicak", "click_x": 0.9, "click_y": 0.9, "duration_seconds": 3.0 }
            ]}),
        )
        .await;
    assert_eq!(res.status().as_u16(), 200);
    let result: Value = res.json().await.unwrap();
    assert_eq!(result["score"], 50.0);
    assert_eq!(result["correct_count"], 1);
}

#[tokio::test]
async fn all_timeouts_score_zero() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let clean = app.create_question(&admin, clean_question()).await;
    let knife = app.create_question(&admin, knife_polygon_question()).await;
    let package_id = app.create_package(&admin, &[clean, knife]).await;
    let codes = app.assign(&admin, package_id, &[1001]).await;
    let token = app.personnel_token(1001, &codes[0]).await;
    let id = app.only_assignment(&token).await["id"].as_i64().unwrap();

    let res = app
        .post(
            &token,
            &format!("/api/exams/{}/submit", id),
            json!({ "answers": [
                { "question_id": clean, "choice": "timeout", "duration_seconds": 20.0 },
                { "question_id": knife, "choice": "timeout", "duration_seconds": 20.0 }
            ]}),
        )
        .await;
    assert_eq!(res.status().as_u16(), 200);
    let result: Value = res.json().await.unwrap();
    assert_eq!(result["score"], 0.0);

    let attempts = app.store.list_attempts(id).await.unwrap();
    assert_eq!(attempts.len(), 2);
    assert!(attempts.iter().all(|a| a.user_choice == "timeout" && !a.is_correct));
}

#[tokio::test]
async fn second_submission_is_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let clean = app.create_question(&admin, clean_question()).await;
    let package_id = app.create_package(&admin, &[clean]).await;
    let codes = app.assign(&admin, package_id, &[1001]).await;
    let token = app.personnel_token(1001, &codes[0]).await;
    let id = app.only_assignment(&token).await["id"].as_i64().unwrap();

    let body = json!({ "answers": [
        { "question_id": clean, "choice": "clean", "duration_seconds": 2.0 }
    ]});
    let path = format!("/api/exams/{}/submit", id);

    let first = app.post(&token, &path, body.clone()).await;
    assert_eq!(first.status().as_u16(), 200);
    let second = app.post(&token, &path, body).await;
    assert_eq!(second.status().as_u16(), 400);
    assert_eq!(app.store.list_attempts(id).await.unwrap().len(), 1);

    let res = app.get(&token, &format!("/api/exams/{}", id)).await;
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn login_code_cannot_be_reused() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let package_id = app.create_package(&admin, &[]).await;
    let codes = app.assign(&admin, package_id, &[1001]).await;

    assert_eq!(app.exam_login(1002, &codes[0]).await.status().as_u16(), 401);
    assert_eq!(app.exam_login(1001, &codes[0]).await.status().as_u16(), 200);
    assert_eq!(app.exam_login(1001, &codes[0]).await.status().as_u16(), 401);
}

#[tokio::test]
async fn other_subjects_assignment_is_not_found() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let clean = app.create_question(&admin, clean_question()).await;
    let package_id = app.create_package(&admin, &[clean]).await;
    let codes = app.assign(&admin, package_id, &[1001, 1002]).await;

    let first = app.personnel_token(1001, &codes[0]).await;
    let second = app.personnel_token(1002, &codes[1]).await;
    let first_assignment = app.only_assignment(&first).await["id"].as_i64().unwrap();

    let res = app
        .get(&second, &format!("/api/exams/{}", first_assignment))
        .await;
    assert_eq!(res.status().as_u16(), 404);

    let res = app
        .post(
            &second,
            &format!("/api/exams/{}/submit", first_assignment),
            json!({ "answers": [{ "question_id": clean, "choice": "clean" }] }),
        )
        .await;
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn package_requires_title() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let res = app
        .post(&admin, "/api/admin/packages", json!({ "title": "", "question_ids": [] }))
        .await;
    assert_eq!(res.status().as_u16(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn auto_package_needs_a_catalog() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let res = app.post(&admin, "/api/admin/packages/auto", json!({})).await;
    assert_eq!(res.status().as_u16(), 400);

    let res = app
        .post(
            &admin,
            "/api/admin/assignments",
            json!({ "is_auto": true, "sicil_list": [1001] }),
        )
        .await;
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn invalid_question_is_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let res = app
        .post(
            &admin,
            "/api/admin/questions",
            json!({
                "image_url": "/uploads/x.png",
                "has_threat": true,
                "threat_type": "bicak",
                "threat_polygon": [{ "x": 0.1, "y": 0.1 }, { "x": 0.2, "y": 0.2 }]
            }),
        )
        .await;
    assert_eq!(res.status().as_u16(), 400);

    let res = app
        .post(
            &admin,
            "/api/admin/questions",
            json!({ "image_url": "/uploads/x.png", "has_threat": true, "threat_type": "uzay_gemisi" }),
        )
        .await;
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn routes_enforce_roles() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let package_id = app.create_package(&admin, &[]).await;
    let codes = app.assign(&admin, package_id, &[1001]).await;
    let personnel = app.personnel_token(1001, &codes[0]).await;

    let res = app
        .client
        .get(app.url("/api/admin/questions"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);

    assert_eq!(app.get(&personnel, "/api/admin/questions").await.status().as_u16(), 401);
    assert_eq!(app.get(&admin, "/api/exams/my-assignments").await.status().as_u16(), 401);
    assert_eq!(app.get("garbage", "/api/exams/my-assignments").await.status().as_u16(), 401);
}

#[tokio::test]
async fn personnel_are_classified_by_latest_month() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    app.store.record_monthly_rate(1, "Ali", "2024-05", 90.0).await;
    app.store.record_monthly_rate(1, "Ali", "2024-06", 60.0).await;
    app.store.record_monthly_rate(2, "Zeynep", "2024-06", 80.0).await;
    app.store.record_monthly_rate(3, "Can", "2024-06", 85.0).await;

    let res = app.get(&admin, "/api/admin/personnel/classified").await;
    assert_eq!(res.status().as_u16(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["red"][0]["sicil"], 1);
    assert_eq!(body["yellow"][0]["sicil"], 2);
    assert_eq!(body["green"][0]["sicil"], 3);
}
