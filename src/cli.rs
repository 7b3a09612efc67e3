//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::{ClientIpHeader, IpExtractor};
use crate::credentials::AdminAccount;
use crate::db::Database;
use crate::jwt::parse_lifetime;
use crate::password::hash_password;
use crate::rate_limit::{DEFAULT_LOGIN_MAX_ATTEMPTS, DEFAULT_LOGIN_WINDOW};
use clap::Parser;
use std::io::BufRead;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "pointe", about = "Admin authentication for the academy website")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "7292")]
    pub port: u16,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Session token lifetime, e.g. "7d", "12h", "30m" or seconds
    #[arg(long, env = "JWT_EXPIRES_IN", default_value = "7d", value_parser = parse_lifetime)]
    pub token_lifetime: Duration,

    /// JSON file listing administrator accounts
    #[arg(long, env = "ADMINS_FILE")]
    pub admins_file: Option<String>,

    /// Path to SQLite database file for form submissions. Without it every
    /// submission is kept in memory only
    #[arg(short, long, env = "DATABASE_PATH")]
    pub database: Option<String>,

    /// Public origin of the site (https enables Secure cookies)
    #[arg(long, env = "PUBLIC_ORIGIN", default_value = "http://localhost:7292")]
    pub public_origin: String,

    /// Trust this proxy header for the client IP
    #[arg(long, env = "IP_HEADER", value_enum)]
    pub ip_header: Option<ClientIpHeader>,

    /// Login attempts allowed per client per window
    #[arg(long, default_value_t = DEFAULT_LOGIN_MAX_ATTEMPTS)]
    pub login_max_attempts: u32,

    /// Login rate-limit window in seconds
    #[arg(long, default_value_t = DEFAULT_LOGIN_WINDOW.as_secs())]
    pub login_window_secs: u64,

    /// Log output format
    #[arg(short, long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Read a password from stdin, print its hash for the admins file and exit
    #[arg(long)]
    pub hash_password: bool,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    check_secret_length(&secret)?;
    Some(secret)
}

fn check_secret_length(secret: &str) -> Option<()> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }
    Some(())
}

/// Parse an admins file. Accounts are validated when the credential store
/// is built.
pub fn parse_admins(json: &str) -> Result<Vec<AdminAccount>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Load administrator accounts.
/// Returns None and logs an error if the file cannot be read or parsed.
/// No file means no accounts: every login attempt fails.
pub fn load_admins(admins_file: Option<&str>) -> Option<Vec<AdminAccount>> {
    let Some(path) = admins_file else {
        warn!("No admins file configured; admin login is disabled");
        return Some(Vec::new());
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(path = %path, error = %e, "Failed to read admins file");
            return None;
        }
    };

    match parse_admins(&content) {
        Ok(admins) => {
            info!(path = %path, count = admins.len(), "Admin accounts loaded");
            Some(admins)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to parse admins file");
            None
        }
    }
}

/// Parse and validate the public origin URL.
/// Returns None and logs an error if validation fails.
pub fn validate_public_origin(public_origin: &str) -> Option<Url> {
    let url = match Url::parse(public_origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %public_origin, error = %e, "Invalid public-origin URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = url.host_str() == Some("localhost");

    if !is_https && !is_localhost {
        error!("public-origin must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Handle the --hash-password flag: hash the first line of stdin and print it.
pub fn handle_hash_password() {
    let mut line = String::new();
    if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
        error!(error = %e, "Failed to read password from stdin");
        std::process::exit(1);
    }

    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        error!("Password is empty");
        std::process::exit(1);
    }

    match hash_password(password) {
        Ok(hash) => println!("{}", hash),
        Err(e) => {
            error!(error = %e, "Failed to hash password");
            std::process::exit(1);
        }
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    public_origin: &Url,
    jwt_secret: String,
    admins: Vec<AdminAccount>,
    db: Option<Database>,
) -> ServerConfig {
    let secure_cookies = public_origin.scheme() == "https";

    ServerConfig {
        jwt_secret: jwt_secret.into_bytes(),
        token_lifetime: args.token_lifetime,
        admins,
        db,
        secure_cookies,
        ip_extractor: args.ip_header.map(IpExtractor::from),
        login_max_attempts: args.login_max_attempts,
        login_window: Duration::from_secs(args.login_window_secs),
    }
}
