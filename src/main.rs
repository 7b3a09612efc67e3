use clap::Parser;
use pointe::cli::{
    Args, build_config, handle_hash_password, init_logging, load_admins, load_jwt_secret,
    open_database, validate_public_origin,
};
use pointe::{AppState, init_cleanup, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    if args.hash_password {
        handle_hash_password();
        return;
    }

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(public_origin) = validate_public_origin(&args.public_origin) else {
        std::process::exit(1);
    };

    let Some(admins) = load_admins(args.admins_file.as_deref()) else {
        std::process::exit(1);
    };

    let db = match args.database.as_deref() {
        Some(path) => {
            let Some(db) = open_database(path).await else {
                std::process::exit(1);
            };
            Some(db)
        }
        None => {
            info!("No database configured; submissions are kept in memory");
            None
        }
    };

    let config = build_config(&args, &public_origin, jwt_secret, admins, db);
    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Invalid admin accounts");
            std::process::exit(1);
        }
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => error!(error = %e, "Failed to read local address"),
    }

    init_cleanup(&state);

    if let Err(e) = run_server(state, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
