//! Server-rendered person form.
//!
//! The default controller route resolves `/`, `/Home` and `/Home/Index` to
//! the index page; `/Home/HtmlHelpers` renders the same form under its own
//! title. Anything else is served from the static web root.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{MatchedPath, State, rejection::FormRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::collections::BTreeMap;
use tower_http::services::ServeDir;
use tracing::{debug, info};

use super::AppState;
use super::antiforgery;
use crate::db::PersonRepository;
use crate::error::{AppError, AppResult};
use crate::models::{Person, PersonForm};

pub const PAGE_PATHS: &[&str] = &["/", "/Home", "/Home/Index", "/Home/HtmlHelpers"];

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Escape text for use in element content and quoted attribute values.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Everything the page template needs.
#[derive(Debug, Default)]
struct Page<'a> {
    action: &'a str,
    token: &'a str,
    form: Option<&'a PersonForm>,
    errors: Option<&'a BTreeMap<String, Vec<String>>>,
    saved: Option<&'a Person>,
}

impl Page<'_> {
    fn title(&self) -> &'static str {
        if self.action == "/Home/HtmlHelpers" {
            "HTML Helpers"
        } else {
            "Home"
        }
    }

    fn field_errors(&self, field: &str) -> String {
        self.errors
            .and_then(|errors| errors.get(field))
            .map(|messages| {
                messages
                    .iter()
                    .map(|m| format!(r#"<span class="field-validation-error">{}</span>"#, escape_html(m)))
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn input(&self, label: &str, field: &str, kind: &str, value: &str) -> String {
        format!(
            r#"    <div>
      <label for="{field}">{label}</label>
      <input type="{kind}" id="{field}" name="{field}" value="{value}" />
      {errors}
    </div>
"#,
            value = escape_html(value),
            errors = self.field_errors(field),
        )
    }

    fn render(&self) -> String {
        let (name, age, birth_date) = match self.form {
            Some(form) => (form.name.as_str(), form.age.as_str(), form.birth_date.as_str()),
            None => ("", "", ""),
        };

        let saved = match self.saved {
            Some(person) if person.id > 0 => format!(
                "  <p class=\"saved\">Saved person {} ({}).</p>\n",
                person.id,
                escape_html(&person.name)
            ),
            Some(person) => format!(
                "  <p class=\"saved\">Accepted {}.</p>\n",
                escape_html(&person.name)
            ),
            None => String::new(),
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8" />
  <title>{title}</title>
  <link rel="stylesheet" href="/css/site.css" />
</head>
<body>
  <h1>{title}</h1>
{saved}  <form method="post" action="{action}">
    <input type="hidden" name="{token_field}" value="{token}" />
{name}{age}{birth_date}    <button type="submit">Submit</button>
  </form>
</body>
</html>
"#,
            title = self.title(),
            action = escape_html(self.action),
            token_field = antiforgery::FORM_FIELD,
            token = escape_html(self.token),
            name = self.input("Name", "Name", "text", name),
            age = self.input("Age", "Age", "number", age),
            birth_date = self.input("Birth date", "BirthDate", "text", birth_date),
        )
    }
}

fn html(status: StatusCode, body: String, set_cookie: Option<&str>) -> AppResult<Response> {
    let mut response = (status, [(header::CONTENT_TYPE, HTML_CONTENT_TYPE)], body).into_response();
    if let Some(token) = set_cookie {
        response
            .headers_mut()
            .insert(header::SET_COOKIE, antiforgery::set_cookie_header(token)?);
    }
    Ok(response)
}

/// GET on any page path
async fn show_form(matched: MatchedPath, headers: HeaderMap) -> AppResult<Response> {
    let (token, issued) = match antiforgery::cookie_token(&headers) {
        Some(token) => (token, false),
        None => (antiforgery::generate_token(), true),
    };

    let page = Page {
        action: matched.as_str(),
        token: &token,
        ..Page::default()
    };
    html(StatusCode::OK, page.render(), issued.then_some(token.as_str()))
}

/// POST on any page path
async fn submit_form(
    State(state): State<Arc<AppState>>,
    matched: MatchedPath,
    headers: HeaderMap,
    form: Result<Form<PersonForm>, FormRejection>,
) -> AppResult<Response> {
    let Form(form) = form.map_err(|rejection| {
        let mut fields = BTreeMap::new();
        fields.insert("form".to_string(), vec![rejection.body_text()]);
        AppError::validation(fields)
    })?;

    antiforgery::verify(&headers, form.request_verification_token.as_deref())?;
    let token = form.request_verification_token.as_deref().unwrap_or_default();

    let person = match form.validate() {
        Ok(person) => person,
        Err(AppError::Validation { fields, .. }) => {
            debug!(fields = fields.len(), "Person form rejected");
            let page = Page {
                action: matched.as_str(),
                token,
                form: Some(&form),
                errors: Some(&fields),
                saved: None,
            };
            return html(StatusCode::BAD_REQUEST, page.render(), None);
        }
        Err(e) => return Err(e),
    };

    let person = match &state.pool {
        Some(pool) => {
            let saved = PersonRepository::new(pool).create(&person).await?;
            info!(person_id = saved.id, "Person saved");
            saved
        }
        None => person,
    };

    let page = Page {
        action: matched.as_str(),
        token,
        form: Some(&form),
        errors: None,
        saved: Some(&person),
    };
    html(StatusCode::OK, page.render(), None)
}

/// View routes with the static file fallback
pub fn router(web_root: PathBuf) -> Router<Arc<AppState>> {
    let mut router = Router::new();
    for path in PAGE_PATHS {
        router = router.route(path, get(show_form).post(submit_form));
    }
    router.fallback_service(ServeDir::new(web_root))
}
