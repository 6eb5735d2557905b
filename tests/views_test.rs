//! Functional tests for the views application.
//!
//! Tests verify that:
//! - Page routes render HTML with an anti-forgery token and cookie
//! - A post carrying the token is accepted and echoes the submitted values
//! - A post without a matching token is rejected
//! - Unmatched paths fall back to static files

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use benchapps::db::PersonRepository;
use benchapps::{Application, Config, bootstrap};
use tempfile::TempDir;
use tower::ServiceExt;

const TOKEN_FIELD: &str = r#"name="__RequestVerificationToken" value=""#;

async fn setup(dir: &TempDir, database: Option<&str>) -> Application {
    let mut config = Config::default_config();
    config.database = database.map(String::from);
    config.sqlite_path = Some(dir.path().join("BasicViews.db"));
    config.content_root = dir.path().to_path_buf();
    bootstrap(&config).await.unwrap()
}

struct Page {
    status: StatusCode,
    content_type: String,
    set_cookie: Option<String>,
    body: String,
}

async fn send(router: &Router, request: Request<Body>) -> Page {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let header_text = |name: header::HeaderName| {
        response
            .headers()
            .get(name)
            .map(|v: &header::HeaderValue| v.to_str().unwrap().to_string())
    };
    let content_type = header_text(header::CONTENT_TYPE).unwrap_or_default();
    let set_cookie = header_text(header::SET_COOKIE);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    Page {
        status,
        content_type,
        set_cookie,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, cookie: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

fn verification_token(body: &str) -> String {
    let start = body.find(TOKEN_FIELD).expect("token field") + TOKEN_FIELD.len();
    let end = body[start..].find('"').expect("token end") + start;
    body[start..end].to_string()
}

/// Cookie header value (`name=value`) from a `Set-Cookie` header.
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().to_string()
}

fn person_fields<'a>(token: &'a str, name: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("__RequestVerificationToken", token),
        ("Age", "12"),
        ("BirthDate", "2006-03-01T09:51:43.041-07:00"),
        ("Name", name),
    ]
}

#[tokio::test]
async fn test_page_routes_render_form() {
    let dir = TempDir::new().unwrap();
    let app = setup(&dir, None).await;

    for path in ["/", "/Home", "/Home/Index", "/Home/HtmlHelpers"] {
        let page = send(&app.router, get(path)).await;
        assert_eq!(page.status, StatusCode::OK, "{path}");
        assert!(page.content_type.starts_with("text/html"));
        assert!(!verification_token(&page.body).is_empty());

        let cookie = page.set_cookie.expect("anti-forgery cookie");
        assert!(cookie.starts_with("__antiforgery="));
        assert!(cookie.contains("HttpOnly"));
    }
}

#[tokio::test]
async fn test_get_reuses_cookie_token() {
    let dir = TempDir::new().unwrap();
    let app = setup(&dir, None).await;

    let first = send(&app.router, get("/")).await;
    let cookie = cookie_pair(&first.set_cookie.unwrap());

    let request = Request::builder()
        .uri("/Home/HtmlHelpers")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let second = send(&app.router, request).await;
    assert!(second.set_cookie.is_none());
    assert_eq!(verification_token(&second.body), verification_token(&first.body));
}

#[tokio::test]
async fn test_post_with_token_echoes_and_saves() {
    let dir = TempDir::new().unwrap();
    let app = setup(&dir, None).await;

    let page = send(&app.router, get("/")).await;
    let token = verification_token(&page.body);
    let cookie = cookie_pair(&page.set_cookie.unwrap());

    let name = "Ada Lovelace";
    let request = post_form("/Home/HtmlHelpers", Some(&cookie), &person_fields(&token, name));
    let page = send(&app.router, request).await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(page.content_type.starts_with("text/html"));
    assert!(page.body.contains(&format!(r#"value="{name}""#)));

    let pool = app.pool.as_ref().unwrap();
    let repo = PersonRepository::new(pool);
    assert_eq!(repo.count().await.unwrap(), 1);
    let saved = repo.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(saved.name, name);
    assert_eq!(saved.age, 12);
    assert_eq!(saved.birth_date.to_rfc3339(), "2006-03-01T09:51:43.041-07:00");
}

#[tokio::test]
async fn test_post_escapes_submitted_values() {
    let dir = TempDir::new().unwrap();
    let app = setup(&dir, Some("None")).await;

    let page = send(&app.router, get("/")).await;
    let token = verification_token(&page.body);
    let cookie = cookie_pair(&page.set_cookie.unwrap());

    let request = post_form("/", Some(&cookie), &person_fields(&token, "<script>x</script>"));
    let page = send(&app.router, request).await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(!page.body.contains("<script>"));
    assert!(page.body.contains("&lt;script&gt;x&lt;/script&gt;"));
}

#[tokio::test]
async fn test_post_without_token_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = setup(&dir, None).await;

    let page = send(&app.router, get("/")).await;
    let token = verification_token(&page.body);
    let cookie = cookie_pair(&page.set_cookie.unwrap());

    // Neither cookie nor field
    let fields = person_fields("", "Ada");
    let page = send(&app.router, post_form("/", None, &fields[1..])).await;
    assert_eq!(page.status, StatusCode::BAD_REQUEST);

    // Field without cookie
    let page = send(&app.router, post_form("/", None, &person_fields(&token, "Ada"))).await;
    assert_eq!(page.status, StatusCode::BAD_REQUEST);

    // Cookie with a different field value
    let request = post_form("/", Some(&cookie), &person_fields("forged", "Ada"));
    let page = send(&app.router, request).await;
    assert_eq!(page.status, StatusCode::BAD_REQUEST);

    let pool = app.pool.as_ref().unwrap();
    assert_eq!(PersonRepository::new(pool).count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_person_rerenders_with_errors() {
    let dir = TempDir::new().unwrap();
    let app = setup(&dir, None).await;

    let page = send(&app.router, get("/")).await;
    let token = verification_token(&page.body);
    let cookie = cookie_pair(&page.set_cookie.unwrap());

    let fields = [
        ("__RequestVerificationToken", token.as_str()),
        ("Name", ""),
        ("Age", "200"),
        ("BirthDate", "yesterday"),
    ];
    let page = send(&app.router, post_form("/", Some(&cookie), &fields)).await;
    assert_eq!(page.status, StatusCode::BAD_REQUEST);
    assert!(page.content_type.starts_with("text/html"));
    assert!(page.body.contains("The Name field is required."));
    assert!(page.body.contains(r#"value="200""#));
}

#[tokio::test]
async fn test_static_files_fallback() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("wwwroot/css")).unwrap();
    std::fs::write(dir.path().join("wwwroot/css/site.css"), "body { margin: 0; }").unwrap();
    let app = setup(&dir, Some("None")).await;

    let page = send(&app.router, get("/css/site.css")).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.content_type.starts_with("text/css"));
    assert_eq!(page.body, "body { margin: 0; }");

    let page = send(&app.router, get("/missing.js")).await;
    assert_eq!(page.status, StatusCode::NOT_FOUND);
}
