//! Admin access control.
//!
//! The route gate decides, per request, whether a path needs a session token
//! and where to look for it: admin pages accept the `admin_token` cookie (or a
//! bearer header) and redirect to the login page on failure, admin API routes
//! accept only a bearer header and answer 401. The CSRF guard adds a
//! double-submit check on state-changing API calls.

mod cookie;
mod csrf;
mod gate;
mod identity;
mod ip;

pub use cookie::{
    CSRF_COOKIE_NAME, SESSION_COOKIE_NAME, clear_cookie, csrf_cookie, get_cookie, session_cookie,
};
pub use csrf::{
    CSRF_HEADER_NAME, CsrfError, csrf_guard, ensure_csrf_cookie, generate_csrf_token,
    requires_csrf, validate_double_submit,
};
pub use gate::{
    EMAIL_HEADER, GateState, LOGIN_PAGE_PATH, ROLE_HEADER, RouteClass, USER_ID_HEADER,
    bearer_token, route_gate,
};
pub use identity::AdminIdentity;
pub use ip::{ClientIpHeader, HasHeadersAndExtensions, IpExtractor, extract_client_ip};
