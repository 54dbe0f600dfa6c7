use academy::auth::SessionData;
use academy::models::{Role, user};
use academy::{Config, TestApp};
use axum::http::StatusCode;
use sea_orm::EntityTrait;

// ═══ Entry points ═══

#[tokio::test]
async fn test_root_redirects_to_login() {
    let app = TestApp::new().await;
    let res = app.get("/", None).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), Some("/login"));
}

#[tokio::test]
async fn test_login_page_renders_without_notice() {
    let app = TestApp::new().await;
    let res = app.get("/login", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.view(), "login");
    assert_eq!(res.context()["session_expired"], false);
}

#[tokio::test]
async fn test_login_page_shows_session_expired_notice() {
    let app = TestApp::new().await;
    let res = app.get("/login?reason=session_expired", None).await;
    assert_eq!(res.context()["session_expired"], true);

    let res = app.get("/login?reason=whatever", None).await;
    assert_eq!(res.context()["session_expired"], false);
}

#[tokio::test]
async fn test_login_page_redirects_signed_in_browser() {
    let app = TestApp::new().await;
    let cookie = app.login_cookie("root", "root-password").await;
    let res = app.get("/login", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), Some("/dashboard"));
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let app = TestApp::new().await;
    let res = app.get("/nowhere", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.view(), "error");
}

// ═══ Credential verification ═══

#[tokio::test]
async fn test_login_success_sets_cookie_and_redirects() {
    let app = TestApp::new().await;
    let res = app.login("root", "root-password").await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), Some("/dashboard"));

    let set_cookie = res.headers["set-cookie"].to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("Max-Age=259200"));
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
    let app = TestApp::new().await;

    let wrong_password = app.login("root", "nope").await;
    let unknown_user = app.login("ghost", "root-password").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        wrong_password.context()["error"],
        unknown_user.context()["error"]
    );
    assert!(wrong_password.session_cookie().is_none());
    assert!(unknown_user.session_cookie().is_none());
}

#[tokio::test]
async fn test_login_requires_both_fields() {
    let app = TestApp::new().await;
    let res = app.login("root", "").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.view(), "login");
    assert_eq!(res.context()["username"], "root");

    let res = app.post_form("/login", None, &[]).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

// ═══ Authorization gate ═══

#[tokio::test]
async fn test_guarded_routes_redirect_without_session() {
    let app = TestApp::new().await;
    for path in ["/dashboard", "/students", "/students/1/evaluations", "/admin/users"] {
        let res = app.get(path, None).await;
        assert_eq!(res.status, StatusCode::FOUND, "{path}");
        assert_eq!(res.location(), Some("/login"), "{path}");
    }
}

#[tokio::test]
async fn test_guard_blocks_mutation_without_session() {
    let app = TestApp::new().await;
    let res = app
        .post_form("/students", None, &[("name", "Kim"), ("gender", "M")])
        .await;
    assert_eq!(res.location(), Some("/login"));

    let count = academy::models::student::Entity::find()
        .all(&app.db)
        .await
        .unwrap()
        .len();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_dashboard_context() {
    let app = TestApp::new().await;
    let cookie = app.login_cookie("root", "root-password").await;
    let res = app.get("/dashboard", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.view(), "dashboard");
    let ctx = res.context();
    assert_eq!(ctx["username"], "root");
    assert_eq!(ctx["role"], "super_admin");
    assert_eq!(ctx["current_page"], "dashboard");
    assert_eq!(ctx["user_count"], 1);
}

#[tokio::test]
async fn test_tampered_cookie_is_treated_as_absent() {
    let app = TestApp::new().await;
    let cookie = app.login_cookie("root", "root-password").await;
    let tampered = format!("{cookie}x");

    let res = app.get("/dashboard", Some(&tampered)).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), Some("/login"));
}

#[tokio::test]
async fn test_cookie_signed_with_other_secret_is_rejected() {
    let app = TestApp::new().await;
    let mut other = Config::for_tests();
    other.session_secret = "someone-else".to_string();
    let forger = TestApp::with_config(other).await;

    let forged = forger.session_cookie_for(&SessionData {
        user_id: 1,
        username: "root".to_string(),
        role: "super_admin".to_string(),
        session_token: None,
    });
    let res = app.get("/admin/users", Some(&forged)).await;
    assert_eq!(res.location(), Some("/login"));
}

// ═══ Single active session ═══

#[tokio::test]
async fn test_second_login_expires_first_browser() {
    let app = TestApp::new().await;
    let first = app.login_cookie("root", "root-password").await;
    let second = app.login_cookie("root", "root-password").await;

    let res = app.get("/dashboard", Some(&first)).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), Some("/login?reason=session_expired"));
    assert!(res.clears_session_cookie());

    let res = app.get("/dashboard", Some(&second)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_session_performs_no_mutation() {
    let app = TestApp::new().await;
    let first = app.login_cookie("root", "root-password").await;
    let _second = app.login_cookie("root", "root-password").await;

    let res = app
        .post_form("/students", Some(&first), &[("name", "Kim"), ("gender", "M")])
        .await;
    assert_eq!(res.location(), Some("/login?reason=session_expired"));

    let students = academy::models::student::Entity::find()
        .all(&app.db)
        .await
        .unwrap();
    assert!(students.is_empty());
}

#[tokio::test]
async fn test_login_overwrites_stored_token() {
    let app = TestApp::new().await;
    app.login_cookie("root", "root-password").await;
    let first = user::Entity::find_by_id(1).one(&app.db).await.unwrap().unwrap();
    app.login_cookie("root", "root-password").await;
    let second = user::Entity::find_by_id(1).one(&app.db).await.unwrap().unwrap();

    let (first, second) = (first.session_token.unwrap(), second.session_token.unwrap());
    assert_eq!(first.len(), 64);
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_logout_clears_token_and_cookie() {
    let app = TestApp::new().await;
    let cookie = app.login_cookie("root", "root-password").await;

    let res = app.post_form("/logout", Some(&cookie), &[]).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), Some("/login"));
    assert!(res.clears_session_cookie());

    let root = user::Entity::find_by_id(1).one(&app.db).await.unwrap().unwrap();
    assert_eq!(root.session_token, None);

    // A copy of the old cookie cannot come back.
    let res = app.get("/dashboard", Some(&cookie)).await;
    assert_eq!(res.location(), Some("/login?reason=session_expired"));
}

#[tokio::test]
async fn test_logout_without_session_just_redirects() {
    let app = TestApp::new().await;
    let res = app.get("/logout", None).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), Some("/login"));
}

#[tokio::test]
async fn test_session_of_deleted_user_expires() {
    let app = TestApp::new().await;
    let cookie = app.session_cookie_for(&SessionData {
        user_id: 999,
        username: "gone".to_string(),
        role: "admin".to_string(),
        session_token: Some("ab".repeat(32)),
    });

    let res = app.get("/students", Some(&cookie)).await;
    assert_eq!(res.location(), Some("/login?reason=session_expired"));
}

#[tokio::test]
async fn test_session_without_token_bypasses_check() {
    let app = TestApp::new().await;
    app.login_cookie("root", "root-password").await;

    let legacy = app.session_cookie_for(&SessionData {
        user_id: 1,
        username: "root".to_string(),
        role: "super_admin".to_string(),
        session_token: None,
    });
    let res = app.get("/dashboard", Some(&legacy)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_disabled_enforcement_allows_parallel_sessions() {
    let mut config = Config::for_tests();
    config.enforce_single_session = false;
    let app = TestApp::with_config(config).await;

    let first = app.login_cookie("root", "root-password").await;
    let second = app.login_cookie("root", "root-password").await;

    assert_eq!(app.get("/dashboard", Some(&first)).await.status, StatusCode::OK);
    assert_eq!(app.get("/dashboard", Some(&second)).await.status, StatusCode::OK);

    let root = user::Entity::find_by_id(1).one(&app.db).await.unwrap().unwrap();
    assert_eq!(root.session_token, None);
}

#[tokio::test]
async fn test_sessions_are_per_user() {
    let app = TestApp::new().await;
    app.seed_user("lee", "lee-password", Role::Admin).await;

    let root = app.login_cookie("root", "root-password").await;
    let lee = app.login_cookie("lee", "lee-password").await;

    assert_eq!(app.get("/dashboard", Some(&root)).await.status, StatusCode::OK);
    assert_eq!(app.get("/dashboard", Some(&lee)).await.status, StatusCode::OK);
}
