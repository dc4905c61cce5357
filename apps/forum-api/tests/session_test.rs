mod common;

#[tokio::test]
async fn register_login_session_roundtrip() {
    let (addr, _state) = common::start_server().await;
    let client = reqwest::Client::new();

    let user_id = common::register_user(addr, "alice").await;
    let token = common::login_user(addr, "alice").await;

    let resp = client
        .get(format!("http://{addr}/api/session"))
        .header("Cookie", format!("session_token={token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["id"], user_id);
    assert_eq!(body["nickname"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn login_accepts_email_as_identifier() {
    let (addr, _state) = common::start_server().await;
    let client = reqwest::Client::new();

    common::register_user(addr, "bob").await;

    let resp = client
        .post(format!("http://{addr}/api/login"))
        .json(&serde_json::json!({
            "identifier": "bob@example.com",
            "password": "correct-horse",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(common::extract_session_cookie(&resp).is_some());
}

#[tokio::test]
async fn login_cookie_advertises_the_enforced_ttl() {
    let (addr, _state) = common::start_server().await;
    let client = reqwest::Client::new();

    common::register_user(addr, "ttl_user").await;

    let resp = client
        .post(format!("http://{addr}/api/login"))
        .json(&serde_json::json!({
            "identifier": "ttl_user",
            "password": "correct-horse",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let cookie = resp
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|c| c.starts_with("session_token="))
        .expect("session cookie set")
        .to_string();

    let max_age = forum_api::auth::session::SESSION_TTL.as_secs();
    assert!(cookie.contains("HttpOnly"), "cookie: {cookie}");
    assert!(cookie.contains("Path=/"), "cookie: {cookie}");
    assert!(
        cookie.contains(&format!("Max-Age={max_age}")),
        "cookie max-age should match the store's TTL: {cookie}"
    );
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let (addr, _state) = common::start_server().await;
    let client = reqwest::Client::new();

    common::register_user(addr, "carol").await;

    let resp = client
        .post(format!("http://{addr}/api/login"))
        .json(&serde_json::json!({
            "identifier": "carol",
            "password": "wrong-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn session_requires_cookie() {
    let (addr, _state) = common::start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}/api/session"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("http://{addr}/api/session"))
        .header("Cookie", "session_token=ses_bogus")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn logout_invalidates_session_and_is_idempotent() {
    let (addr, _state) = common::start_server().await;
    let client = reqwest::Client::new();

    let (_user_id, token) = common::register_and_login(addr, "dave").await;
    let cookie = format!("session_token={token}");

    let resp = client
        .post(format!("http://{addr}/api/logout"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    // The token no longer resolves.
    let resp = client
        .get(format!("http://{addr}/api/session"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // A second logout with the stale cookie still succeeds.
    let resp = client
        .post(format!("http://{addr}/api/logout"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
}

#[tokio::test]
async fn each_login_gets_a_distinct_token() {
    let (addr, _state) = common::start_server().await;

    common::register_user(addr, "erin").await;
    let t1 = common::login_user(addr, "erin").await;
    let t2 = common::login_user(addr, "erin").await;
    assert_ne!(t1, t2);

    // Both sessions are live at once.
    let client = reqwest::Client::new();
    for token in [&t1, &t2] {
        let resp = client
            .get(format!("http://{addr}/api/session"))
            .header("Cookie", format!("session_token={token}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
}

#[tokio::test]
async fn register_rejects_duplicate_nickname() {
    let (addr, _state) = common::start_server().await;
    let client = reqwest::Client::new();

    common::register_user(addr, "frank").await;

    let resp = client
        .post(format!("http://{addr}/api/register"))
        .json(&serde_json::json!({
            "nickname": "frank",
            "email": "frank2@example.com",
            "password": "correct-horse",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn register_validates_fields() {
    let (addr, _state) = common::start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/register"))
        .json(&serde_json::json!({
            "nickname": "x",
            "email": "not-an-email",
            "password": "short",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = resp.json().await.unwrap();
    let fields: Vec<&str> = body["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"nickname"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}
