pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod credentials;
pub mod db;
pub mod fallback;
pub mod forms;
pub mod jwt;
pub mod pages;
pub mod password;
pub mod rate_limit;
pub mod session;

use api::create_api_router;
use auth::{GateState, IpExtractor, csrf_guard, route_gate};
use axum::{Router, middleware};
use credentials::{AdminAccount, CredentialConfigError, CredentialStore};
use db::{Database, PrimaryStore};
use fallback::FallbackStore;
use jwt::TokenService;
use rate_limit::{FormRateLimit, LoginPolicy};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Secret for signing session tokens
    pub jwt_secret: Vec<u8>,
    /// Session token lifetime
    pub token_lifetime: Duration,
    /// Administrator accounts
    pub admins: Vec<AdminAccount>,
    /// Primary submission store (None means not initialized)
    pub db: Option<Database>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// IP extraction strategy (requires running behind a proxy)
    pub ip_extractor: Option<IpExtractor>,
    /// Login attempts allowed per origin per window
    pub login_max_attempts: u32,
    /// Login rate-limit window
    pub login_window: Duration,
}

/// Process-wide state shared by every handler.
///
/// Built once at startup. Credentials and the token service are read-only;
/// the login limiter and fallback store synchronize internally. Nothing here
/// is shared between processes.
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub tokens: Arc<TokenService>,
    pub login_policy: Arc<LoginPolicy>,
    pub form_limit: FormRateLimit,
    pub fallback: Arc<FallbackStore>,
    pub store: PrimaryStore,
    pub secure_cookies: bool,
    pub ip_extractor: Option<IpExtractor>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, CredentialConfigError> {
        let credentials = CredentialStore::new(config.admins)?;

        Ok(Self {
            credentials: Arc::new(credentials),
            tokens: Arc::new(TokenService::new(&config.jwt_secret, config.token_lifetime)),
            login_policy: Arc::new(LoginPolicy::new(
                config.login_max_attempts,
                config.login_window,
            )),
            form_limit: FormRateLimit::new(config.ip_extractor.clone()),
            fallback: Arc::new(FallbackStore::new()),
            store: PrimaryStore::new(config.db),
            secure_cookies: config.secure_cookies,
            ip_extractor: config.ip_extractor,
        })
    }
}

/// Create the application router.
pub fn create_app(state: AppState) -> Router {
    let gate = GateState {
        tokens: state.tokens.clone(),
    };

    // Layers run outermost-last: the gate authenticates before CSRF is checked.
    Router::new()
        .nest("/api", create_api_router(state.clone()))
        .merge(pages::router(state))
        .layer(middleware::from_fn(csrf_guard))
        .layer(middleware::from_fn_with_state(gate, route_gate))
}

/// Spawn background housekeeping. Call this before starting the server.
pub fn init_cleanup(state: &AppState) {
    cleanup::spawn_cleanup_scheduler(state.login_policy.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(state: AppState, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(state);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    state: AppState,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&state);

    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(state, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
