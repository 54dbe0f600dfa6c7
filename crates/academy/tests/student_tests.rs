use academy::TestApp;
use academy::models::student;
use axum::http::StatusCode;
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};

async fn signed_in() -> (TestApp, String) {
    let app = TestApp::new().await;
    let cookie = app.login_cookie("root", "root-password").await;
    (app, cookie)
}

async fn add_student(app: &TestApp, cookie: &str, name: &str, gender: &str) {
    let res = app
        .post_form(
            "/students",
            Some(cookie),
            &[("name", name), ("gender", gender)],
        )
        .await;
    assert_eq!(res.status, StatusCode::FOUND, "{}", res.body);
}

async fn student_count(app: &TestApp) -> u64 {
    student::Entity::find().count(&app.db).await.unwrap()
}

// ═══ Create + list ═══

#[tokio::test]
async fn test_created_student_is_listed_and_gender_filter_excludes_it() {
    let (app, cookie) = signed_in().await;

    let res = app
        .post_form("/students", Some(&cookie), &[("name", "Kim"), ("gender", "M")])
        .await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), Some("/students"));

    let res = app.get("/students?page=1", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.view(), "students");
    let ctx = res.context();
    assert_eq!(ctx["per_page"], 10);
    assert_eq!(ctx["total_count"], 1);
    assert_eq!(ctx["students"][0]["name"], "Kim");
    assert_eq!(ctx["current_page"], "students");

    let res = app.get("/students?gender=F", Some(&cookie)).await;
    let ctx = res.context();
    assert_eq!(ctx["total_count"], 0);
    assert_eq!(ctx["students"].as_array().unwrap().len(), 0);
    assert_eq!(ctx["total_pages"], 1);
}

#[tokio::test]
async fn test_unknown_gender_filter_is_ignored() {
    let (app, cookie) = signed_in().await;
    add_student(&app, &cookie, "Kim", "M").await;
    add_student(&app, &cookie, "Park", "F").await;

    let res = app.get("/students?gender=X", Some(&cookie)).await;
    assert_eq!(res.context()["total_count"], 2);
    assert_eq!(res.context()["gender"], "");
}

#[tokio::test]
async fn test_phone_numbers_are_sanitized() {
    let (app, cookie) = signed_in().await;
    app.post_form(
        "/students",
        Some(&cookie),
        &[
            ("name", "Kim"),
            ("gender", "M"),
            ("phone", "010-1234-5678"),
            ("parent_phone", ""),
            ("remarks", ""),
        ],
    )
    .await;

    let saved = student::Entity::find().one(&app.db).await.unwrap().unwrap();
    assert_eq!(saved.phone.as_deref(), Some("01012345678"));
    assert_eq!(saved.parent_phone, None);
    assert_eq!(saved.remarks, None);
}

#[tokio::test]
async fn test_missing_name_rerenders_form() {
    let (app, cookie) = signed_in().await;
    let res = app
        .post_form(
            "/students",
            Some(&cookie),
            &[("name", "  "), ("gender", "M"), ("phone", "010")],
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.view(), "student_form");
    assert!(res.context()["error"].is_string());
    assert_eq!(res.context()["student"]["phone"], "010");
    assert_eq!(student_count(&app).await, 0);
}

#[tokio::test]
async fn test_invalid_gender_rejected() {
    let (app, cookie) = signed_in().await;
    for gender in ["", "X", "m"] {
        let res = app
            .post_form("/students", Some(&cookie), &[("name", "Kim"), ("gender", gender)])
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "gender={gender:?}");
    }
    assert_eq!(student_count(&app).await, 0);
}

// ═══ Pagination + search ═══

#[tokio::test]
async fn test_pagination_and_page_size_fallback() {
    let (app, cookie) = signed_in().await;
    for i in 0..12 {
        add_student(&app, &cookie, &format!("Student {i:02}"), "F").await;
    }

    let res = app.get("/students", Some(&cookie)).await;
    let ctx = res.context();
    assert_eq!(ctx["students"].as_array().unwrap().len(), 10);
    assert_eq!(ctx["total_pages"], 2);
    assert_eq!(ctx["has_next"], true);
    assert_eq!(ctx["has_prev"], false);
    // Newest first.
    assert_eq!(ctx["students"][0]["name"], "Student 11");

    let res = app.get("/students?page=2", Some(&cookie)).await;
    assert_eq!(res.context()["students"].as_array().unwrap().len(), 2);

    let res = app.get("/students?per_page=15", Some(&cookie)).await;
    assert_eq!(res.context()["per_page"], 10);

    let res = app.get("/students?per_page=20", Some(&cookie)).await;
    assert_eq!(res.context()["per_page"], 20);
    assert_eq!(res.context()["total_pages"], 1);

    let res = app.get("/students?page=0", Some(&cookie)).await;
    assert_eq!(res.context()["page"], 1);

    let res = app.get("/students?page=9", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.context()["students"].as_array().unwrap().len(), 0);
    assert_eq!(res.context()["total_count"], 12);
}

#[tokio::test]
async fn test_search_matches_name_and_phones() {
    let (app, cookie) = signed_in().await;
    app.post_form(
        "/students",
        Some(&cookie),
        &[("name", "Kim"), ("gender", "M"), ("phone", "010-1111-2222")],
    )
    .await;
    app.post_form(
        "/students",
        Some(&cookie),
        &[("name", "Park"), ("gender", "F"), ("parent_phone", "010-3333-4444")],
    )
    .await;

    let res = app.get("/students?search=Kim", Some(&cookie)).await;
    assert_eq!(res.context()["total_count"], 1);
    assert_eq!(res.context()["search"], "Kim");

    let res = app.get("/students?search=3333", Some(&cookie)).await;
    assert_eq!(res.context()["students"][0]["name"], "Park");

    let res = app.get("/students?search=%20%20", Some(&cookie)).await;
    assert_eq!(res.context()["total_count"], 2);
}

#[tokio::test]
async fn test_search_wildcards_match_literally() {
    let (app, cookie) = signed_in().await;
    add_student(&app, &cookie, "Kim", "M").await;
    add_student(&app, &cookie, "Lee", "F").await;
    add_student(&app, &cookie, "Top_10%", "F").await;

    let res = app.get("/students?search=%25", Some(&cookie)).await;
    assert_eq!(res.context()["total_count"], 1);
    assert_eq!(res.context()["students"][0]["name"], "Top_10%");

    let res = app.get("/students?search=K_m", Some(&cookie)).await;
    assert_eq!(res.context()["total_count"], 0);

    let res = app.get("/students?search=p_1", Some(&cookie)).await;
    assert_eq!(res.context()["total_count"], 1);
}

#[tokio::test]
async fn test_search_ignores_case() {
    let (app, cookie) = signed_in().await;
    add_student(&app, &cookie, "Kim", "M").await;

    let res = app.get("/students?search=kIM", Some(&cookie)).await;
    assert_eq!(res.context()["total_count"], 1);
}

#[tokio::test]
async fn test_enormous_page_number_is_an_empty_page() {
    let (app, cookie) = signed_in().await;
    add_student(&app, &cookie, "Kim", "M").await;

    for per_page in ["10", "50"] {
        let res = app
            .get(
                &format!("/students?page=1000000000000000000&per_page={per_page}"),
                Some(&cookie),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{}", res.body);
        let ctx = res.context();
        assert_eq!(ctx["students"].as_array().unwrap().len(), 0);
        assert_eq!(ctx["total_count"], 1);
        assert_eq!(ctx["has_next"], false);
    }
}

// ═══ Edit + delete ═══

#[tokio::test]
async fn test_edit_form_with_bad_or_unknown_id_redirects() {
    let (app, cookie) = signed_in().await;
    for path in ["/students/abc/edit", "/students/42/edit"] {
        let res = app.get(path, Some(&cookie)).await;
        assert_eq!(res.status, StatusCode::FOUND, "{path}");
        assert_eq!(res.location(), Some("/students"), "{path}");
    }
}

#[tokio::test]
async fn test_update_student() {
    let (app, cookie) = signed_in().await;
    add_student(&app, &cookie, "Kim", "M").await;
    let id = student::Entity::find().one(&app.db).await.unwrap().unwrap().id;

    let res = app.get(&format!("/students/{id}/edit"), Some(&cookie)).await;
    assert_eq!(res.view(), "student_form");
    assert_eq!(res.context()["student"]["name"], "Kim");

    let res = app
        .post_form(
            &format!("/students/{id}"),
            Some(&cookie),
            &[("name", "Kim Minji"), ("gender", "F"), ("remarks", "Moved to evening class")],
        )
        .await;
    assert_eq!(res.location(), Some("/students"));

    let saved = student::Entity::find_by_id(id).one(&app.db).await.unwrap().unwrap();
    assert_eq!(saved.name, "Kim Minji");
    assert_eq!(saved.gender, "F");
    assert_eq!(saved.remarks.as_deref(), Some("Moved to evening class"));
}

#[tokio::test]
async fn test_update_validation_leaves_row_untouched() {
    let (app, cookie) = signed_in().await;
    add_student(&app, &cookie, "Kim", "M").await;
    let id = student::Entity::find().one(&app.db).await.unwrap().unwrap().id;

    let res = app
        .post_form(&format!("/students/{id}"), Some(&cookie), &[("name", "Kim"), ("gender", "Q")])
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let saved = student::Entity::find_by_id(id).one(&app.db).await.unwrap().unwrap();
    assert_eq!(saved.gender, "M");
}

#[tokio::test]
async fn test_delete_student() {
    let (app, cookie) = signed_in().await;
    add_student(&app, &cookie, "Kim", "M").await;
    let id = student::Entity::find().one(&app.db).await.unwrap().unwrap().id;

    let res = app
        .post_form(&format!("/students/{id}/delete"), Some(&cookie), &[])
        .await;
    assert_eq!(res.location(), Some("/students"));
    assert_eq!(student_count(&app).await, 0);

    // Already gone: still lands back on the list.
    let res = app
        .post_form(&format!("/students/{id}/delete"), Some(&cookie), &[])
        .await;
    assert_eq!(res.location(), Some("/students"));
}

#[tokio::test]
async fn test_delete_unknown_student_redirects_to_list() {
    let (app, cookie) = signed_in().await;
    add_student(&app, &cookie, "Kim", "M").await;

    let res = app
        .post_form("/students/9999/delete", Some(&cookie), &[])
        .await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.location(), Some("/students"));
    assert_eq!(student_count(&app).await, 1);
}

#[tokio::test]
async fn test_delete_failure_renders_error_page() {
    let (app, cookie) = signed_in().await;
    add_student(&app, &cookie, "Kim", "M").await;
    let id = student::Entity::find().one(&app.db).await.unwrap().unwrap().id;

    app.db
        .execute_unprepared("DROP TABLE evaluations")
        .await
        .unwrap();
    app.db
        .execute_unprepared("DROP TABLE students")
        .await
        .unwrap();

    let res = app
        .post_form(&format!("/students/{id}/delete"), Some(&cookie), &[])
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.view(), "error");
    assert_eq!(res.context()["status"], 500);
    assert!(!res.context()["message"].as_str().unwrap().contains("students"));
}
