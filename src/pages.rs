//! Admin pages.
//!
//! Only the shells are served here: the login form and the dashboard entry
//! point. Both make sure the browser holds a CSRF cookie so page scripts can
//! echo it on state-changing calls.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, header::SET_COOKIE},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use tracing::debug;

use crate::AppState;
use crate::auth::{AdminIdentity, SESSION_COOKIE_NAME, ensure_csrf_cookie, get_cookie};

/// Landing page after login.
pub const DASHBOARD_PATH: &str = "/admin";

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Admin sign in</title></head>
<body>
<main>
<h1>Admin sign in</h1>
<form id="login-form">
<label>Email <input type="email" name="email" autocomplete="username" required></label>
<label>Password <input type="password" name="password" autocomplete="current-password" minlength="6" required></label>
<button type="submit">Sign in</button>
</form>
</main>
</body>
</html>
"#;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/admin/login", get(login_page))
        .route("/admin", get(dashboard))
        .route("/admin/{*path}", get(dashboard))
        .with_state(state)
}

fn with_csrf_cookie(headers: &HeaderMap, secure: bool, page: Html<String>) -> Response {
    match ensure_csrf_cookie(headers, secure) {
        Some(cookie) => ([(SET_COOKIE, cookie)], page).into_response(),
        None => page.into_response(),
    }
}

/// The login form. Visitors that already hold a valid session go straight to
/// the dashboard.
async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = get_cookie(&headers, SESSION_COOKIE_NAME) {
        if state.tokens.verify(token).is_ok() {
            return Redirect::temporary(DASHBOARD_PATH).into_response();
        }
        debug!("Stale session cookie on login page");
    }

    with_csrf_cookie(&headers, state.secure_cookies, Html(LOGIN_PAGE.to_string()))
}

async fn dashboard(
    State(state): State<AppState>,
    AdminIdentity(identity): AdminIdentity,
    headers: HeaderMap,
) -> Response {
    let page = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><meta name=\"admin-role\" content=\"{}\"><title>Admin</title></head>\n<body><main id=\"admin-root\"></main></body>\n</html>\n",
        identity.role.as_str()
    );

    with_csrf_cookie(&headers, state.secure_cookies, Html(page))
}
