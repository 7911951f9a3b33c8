use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use ulid::Ulid;

use pension::config::Config;
use pension::engine::Engine;
use pension::http::{create_router, AppState};

const ADMIN_PASSWORD: &str = "kennel-keeper";

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("pension_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = Config::from_lookup(|key| match key {
        "PENSION_JWT_SECRET" => Some("integration-secret".into()),
        "PENSION_ADMIN_PASSWORD" => Some(ADMIN_PASSWORD.into()),
        "PENSION_CLIENT_URL" => Some("http://client.test".into()),
        "PENSION_DATA_DIR" => Some(dir.to_string_lossy().into_owned()),
        _ => None,
    });
    let engine = Arc::new(Engine::open(config.wal_path()).unwrap());
    let app = create_router(AppState::new(engine, config));

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

struct Api {
    client: Client,
    base: String,
}

impl Api {
    async fn start() -> Self {
        let addr = start_test_server().await;
        Self {
            client: Client::new(),
            base: format!("http://{addr}/api"),
        }
    }

    async fn send(&self, method: reqwest::Method, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = self.client.request(method, format!("{}{path}", self.base));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        let body = res.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, token, None).await
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, token, Some(body)).await
    }

    async fn put(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, path, token, Some(body)).await
    }

    async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(reqwest::Method::DELETE, path, token, None).await
    }

    async fn admin_token(&self) -> String {
        let (status, body) = self
            .post("/auth/login", None, json!({"username": "admin", "password": ADMIN_PASSWORD}))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Returns (token, user id).
    async fn register(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/auth/register",
                None,
                json!({"email": email, "password": "woof-woof", "firstName": "Rex", "lastName": "Owner"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn create_room(&self, admin: &str, name: &str) -> String {
        let (status, body) = self
            .post(
                "/rooms",
                Some(admin),
                json!({"name": name, "capacity": 1, "pricePerNight": 35.0, "description": "Quiet corner"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn book(&self, token: &str, room_id: &str, check_in: &str, check_out: &str) -> (StatusCode, Value) {
        self.post(
            "/bookings",
            Some(token),
            json!({"roomId": room_id, "checkIn": check_in, "checkOut": check_out}),
        )
        .await
    }
}

// ── Auth ─────────────────────────────────────────────────────

#[tokio::test]
async fn register_login_and_me() {
    let api = Api::start().await;
    let (token, id) = api.register("Rex@Example.com").await;

    let (status, me) = api.get("/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["id"], id.as_str());
    assert_eq!(me["user"]["email"], "rex@example.com");
    assert_eq!(me["user"]["role"], "customer");
    assert!(me["user"].get("passwordHash").is_none());

    let (status, body) = api
        .post("/auth/login", None, json!({"username": "rex@example.com", "password": "woof-woof"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, body) = api
        .post("/auth/login", None, json!({"username": "rex@example.com", "password": "wrong"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, body) = api
        .post(
            "/auth/register",
            None,
            json!({"email": "rex@example.com", "password": "another", "firstName": "R", "lastName": "O"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "EMAIL_TAKEN");
}

#[tokio::test]
async fn admin_login_has_no_id() {
    let api = Api::start().await;
    let admin = api.admin_token().await;
    let (status, me) = api.get("/auth/me", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(me["user"]["id"].is_null());
    assert_eq!(me["user"]["role"], "admin");

    let (status, _) = api
        .post("/auth/login", None, json!({"username": "admin", "password": "guess"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn validation_errors_name_the_fields() {
    let api = Api::start().await;
    let (status, body) = api
        .post(
            "/auth/register",
            None,
            json!({"email": "not-an-email", "password": "123", "firstName": "A", "lastName": "B"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["details"]["email"].is_array());
    assert!(body["details"]["password"].is_array());
}

#[tokio::test]
async fn password_reset_is_single_use() {
    let api = Api::start().await;
    api.register("reset@example.com").await;

    let (status, body) = api
        .post("/auth/forgot-password", None, json!({"email": "nobody@example.com"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let unknown_message = body["message"].clone();
    let unknown_url = body["resetUrl"].as_str().unwrap().to_string();

    let (status, body) = api
        .post("/auth/forgot-password", None, json!({"email": "reset@example.com"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], unknown_message);
    let url = body["resetUrl"].as_str().unwrap();
    assert!(url.starts_with("http://client.test/reset-password/"));
    let token = url.rsplit('/').next().unwrap();

    let path = format!("/auth/reset-password/{token}");
    let (status, _) = api.post(&path, None, json!({"password": "new-secret"})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = api.post(&path, None, json!({"password": "again-secret"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_RESET_TOKEN");

    let (status, _) = api
        .post("/auth/login", None, json!({"username": "reset@example.com", "password": "new-secret"}))
        .await;
    assert_eq!(status, StatusCode::OK);

    // The link handed out for an unknown address leads nowhere.
    let unknown_token = unknown_url.rsplit('/').next().unwrap();
    let (status, body) = api
        .post(&format!("/auth/reset-password/{unknown_token}"), None, json!({"password": "new-secret"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_RESET_TOKEN");
}

#[tokio::test]
async fn forgot_password_answers_alike_for_unknown_emails() {
    let api = Api::start().await;
    api.register("known@example.com").await;

    let mut shapes = Vec::new();
    for email in ["known@example.com", "unknown@example.com"] {
        let (status, body) = api.post("/auth/forgot-password", None, json!({"email": email})).await;
        assert_eq!(status, StatusCode::OK);
        let url = body["resetUrl"].as_str().unwrap();
        assert!(url.starts_with("http://client.test/reset-password/"));
        let mut keys: Vec<_> = body.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        shapes.push((keys, body["message"].clone()));
    }
    assert_eq!(shapes[0], shapes[1]);
}

// ── Bookings ─────────────────────────────────────────────────

#[tokio::test]
async fn booking_lifecycle() {
    let api = Api::start().await;
    let admin = api.admin_token().await;
    let room = api.create_room(&admin, "Kennel 1").await;
    let (alice, _) = api.register("alice@example.com").await;
    let (bob, _) = api.register("bob@example.com").await;

    let (status, booking) = api.book(&alice, &room, "2030-06-01", "2030-06-05").await;
    assert_eq!(status, StatusCode::CREATED, "{booking}");
    assert_eq!(booking["status"], "confirmed");
    let booking_id = booking["id"].as_str().unwrap().to_string();

    // Overlap, and a stay that arrives on the previous check-out day.
    let (status, body) = api.book(&bob, &room, "2030-06-04", "2030-06-08").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    let (status, _) = api.book(&bob, &room, "2030-06-05", "2030-06-08").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = api.book(&bob, &room, "2030-06-05", "2030-06-05").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = api
        .post(
            "/bookings/check-availability",
            None,
            json!({"roomId": room, "checkIn": "2030-06-02", "checkOut": "2030-06-03"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);

    // Bob can neither see nor cancel Alice's stay.
    let (status, _) = api.get(&format!("/bookings/{booking_id}"), Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = api.delete(&format!("/bookings/{booking_id}"), Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, bobs) = api.get("/bookings", Some(&bob)).await;
    assert_eq!(bobs.as_array().unwrap().len(), 0);

    let (status, body) = api.delete(&format!("/bookings/{booking_id}"), Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "cancelled");

    let (status, _) = api.book(&bob, &room, "2030-06-04", "2030-06-08").await;
    assert_eq!(status, StatusCode::CREATED);

    // The administrator sees both rows, with names joined in.
    let (_, all) = api.get("/bookings", Some(&admin)).await;
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|b| b["roomName"] == "Kennel 1"));

    let (status, body) = api
        .put(
            &format!("/bookings/{booking_id}"),
            Some(&admin),
            json!({"status": "confirmed", "notes": null}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "TERMINAL_STATUS");
}

#[tokio::test]
async fn concurrent_creates_have_one_winner() {
    let api = Arc::new(Api::start().await);
    let admin = api.admin_token().await;
    let room = api.create_room(&admin, "Contended").await;

    let mut tokens = Vec::new();
    for i in 0..8 {
        tokens.push(api.register(&format!("racer{i}@example.com")).await.0);
    }

    let attempts = tokens.into_iter().map(|token| {
        let api = api.clone();
        let room = room.clone();
        async move { api.book(&token, &room, "2030-08-10", "2030-08-12").await.0 }
    });
    let statuses = futures::future::join_all(attempts).await;

    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, statuses.len() - 1);
}

#[tokio::test]
async fn admin_books_for_a_customer() {
    let api = Api::start().await;
    let admin = api.admin_token().await;
    let room = api.create_room(&admin, "Front desk").await;
    let (carol, carol_id) = api.register("carol@example.com").await;

    let (status, booking) = api
        .post(
            "/bookings",
            Some(&admin),
            json!({"roomId": room, "checkIn": "2030-03-01", "checkOut": "2030-03-03", "customerId": carol_id}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["userId"], carol_id.as_str());

    let (_, mine) = api.get("/bookings", Some(&carol)).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, history) = api.get(&format!("/customers/{carol_id}/bookings"), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, body) = api.delete(&format!("/customers/{carol_id}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "IN_USE");
}

// ── Rooms and blocked dates ──────────────────────────────────

#[tokio::test]
async fn customers_cannot_manage_rooms() {
    let api = Api::start().await;
    let (token, _) = api.register("dave@example.com").await;
    let (status, body) = api
        .post("/rooms", Some(&token), json!({"name": "Mine", "capacity": 1, "pricePerNight": 1}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = api.get("/customers", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, rooms) = api.get("/rooms", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rooms.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn blocked_dates_close_rooms() {
    let api = Api::start().await;
    let admin = api.admin_token().await;
    let a = api.create_room(&admin, "A").await;
    let b = api.create_room(&admin, "B").await;
    let (token, _) = api.register("erin@example.com").await;

    let (status, block) = api
        .post(
            "/blocked-dates",
            Some(&admin),
            json!({"roomId": a, "startDate": "2030-12-24", "endDate": "2030-12-26", "reason": "Holidays"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = api.book(&token, &a, "2030-12-20", "2030-12-24").await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = api.book(&token, &b, "2030-12-20", "2030-12-24").await;
    assert_eq!(status, StatusCode::CREATED);

    // A house-wide block covers every room.
    let (status, _) = api
        .post(
            "/blocked-dates",
            Some(&admin),
            json!({"startDate": "2031-01-10", "endDate": "2031-01-10"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = api.book(&token, &b, "2031-01-09", "2031-01-10").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, for_a) = api.get(&format!("/blocked-dates/room/{a}"), None).await;
    assert_eq!(for_a.as_array().unwrap().len(), 1);

    let (_, calendar) = api
        .get(&format!("/rooms/{a}/availability?from=2030-12-20&to=2030-12-31"), None)
        .await;
    assert_eq!(calendar["busy"][0]["start"], "2030-12-24");
    assert_eq!(calendar["busy"][0]["end"], "2030-12-26");

    let block_id = block["id"].as_str().unwrap();
    let (status, _) = api.delete(&format!("/blocked-dates/{block_id}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = api.book(&token, &a, "2030-12-20", "2030-12-24").await;
    assert_eq!(status, StatusCode::CREATED);

    // Rooms with confirmed stays cannot be deleted.
    let (status, _) = api.delete(&format!("/rooms/{a}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
