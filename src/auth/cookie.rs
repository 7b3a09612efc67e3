//! Cookie parsing and `Set-Cookie` builders.

use axum::http::header;

/// Cookie carrying the session token for admin page navigation.
pub const SESSION_COOKIE_NAME: &str = "admin_token";

/// Double-submit CSRF cookie. Readable by page scripts so they can echo it.
pub const CSRF_COOKIE_NAME: &str = "csrf-token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

fn secure_attr(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}

/// `Set-Cookie` value for the session token.
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        SESSION_COOKIE_NAME,
        token,
        max_age_secs,
        secure_attr(secure)
    )
}

/// `Set-Cookie` value for a CSRF token. Not HttpOnly.
pub fn csrf_cookie(token: &str, secure: bool) -> String {
    format!(
        "{}={}; SameSite=Strict; Path=/{}",
        CSRF_COOKIE_NAME,
        token,
        secure_attr(secure)
    )
}

/// `Set-Cookie` value that deletes `name`.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    let http_only = if name == SESSION_COOKIE_NAME {
        "; HttpOnly"
    } else {
        ""
    };
    format!(
        "{}={}; SameSite=Strict; Path=/; Max-Age=0{}",
        name,
        http_only,
        secure_attr(secure)
    )
}
