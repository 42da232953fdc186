use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod config;
mod errors;
mod jobs;
mod mapping;
mod models;
mod script;
mod services;
mod store;

use models::tier::TierTable;
use services::consume::ConsumeService;
use services::issue::IssueService;
use services::provider::PgProjectProvider;
use services::OwnerIdentity;
use store::postgres::PgStore;
use store::TokenStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub db: PgStore,
    pub tokens: Arc<dyn TokenStore>,
    pub issuer: IssueService,
    pub consumer: ConsumeService,
    pub config: config::Config,
}

fn build_state(db: PgStore, cfg: config::Config) -> Arc<AppState> {
    let tokens: Arc<dyn TokenStore> = Arc::new(db.clone());
    let projects = Arc::new(PgProjectProvider::new(db.clone()));
    let policy = Arc::new(TierTable::default());

    Arc::new(AppState {
        issuer: IssueService::new(tokens.clone(), projects, policy),
        consumer: ConsumeService::new(tokens.clone()),
        tokens,
        db,
        config: cfg,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "fillgate=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Token { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            handle_token_command(command, db).await
        }
        Some(cli::Commands::Script { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            handle_script_command(command, db).await
        }
        Some(cli::Commands::Sweep) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let removed = db.delete_expired(chrono::Utc::now()).await?;
            println!("Removed {} expired token(s).", removed);
            Ok(())
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let state = build_state(db, cfg.clone());

    let app = axum::Router::new()
        // Health endpoints (no auth)
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .route("/readyz", axum::routing::get(readiness_check))
        // Management + fill API under /api/v1
        .nest("/api/v1", api::api_router(state.clone()))
        .with_state(state.clone())
        // Fill requests are small; 1 MB is generous headroom
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        // Restrict CORS to the dashboard origin (localhost allowed for dev)
        .layer({
            use axum::http::{HeaderName, Method};
            use tower_http::cors::AllowOrigin;
            let dashboard_origin = cfg.dashboard_origin.clone();
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                    HeaderName::from_static("x-api-key"),
                    HeaderName::from_static("x-request-id"),
                ])
        })
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware));

    // Reclaim storage for tokens past their expiry
    jobs::sweep::spawn(state.tokens.clone(), cfg.sweep_interval_secs);
    tracing::info!(
        "Expired-token sweep started (every {}s)",
        cfg.sweep_interval_secs
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Fillgate listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response.
/// This allows clients to correlate errors with service logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

async fn readiness_check() -> &'static str {
    "ok"
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    // Prevent MIME-type sniffing (the script endpoint returns JS-in-JSON)
    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());

    // Prevent clickjacking by disallowing iframe embedding
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());

    // Prevent the browser from caching sensitive API responses
    headers.insert("Cache-Control", "no-store".parse().unwrap());

    // Strip Referrer to avoid leaking tokens in URLs
    headers.insert("Referrer-Policy", "no-referrer".parse().unwrap());

    // Remove server identity header
    headers.remove("Server");

    resp
}

async fn handle_token_command(cmd: cli::TokenCommands, db: PgStore) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Issue {
            project_id,
            owner_id,
            tier,
        } => {
            let project_id = uuid::Uuid::parse_str(&project_id).context("Invalid project_id")?;
            let owner_id = uuid::Uuid::parse_str(&owner_id).context("Invalid owner_id")?;

            let tokens: Arc<dyn TokenStore> = Arc::new(db.clone());
            let issuer = IssueService::new(
                tokens,
                Arc::new(PgProjectProvider::new(db)),
                Arc::new(TierTable::default()),
            );

            let owner = OwnerIdentity {
                id: owner_id,
                tier,
            };
            let issued = issuer
                .issue(&owner, project_id)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;

            println!("Token issued:");
            println!("  Token:      {}", issued.token);
            println!("  Expires:    {}", issued.expires_at);
            println!("  Max usage:  {}", issued.max_usage);
            println!("  Rate limit: {}s between uses", issued.rate_limit_seconds);
        }
        cli::TokenCommands::List { owner_id } => {
            let owner_id = uuid::Uuid::parse_str(&owner_id).context("Invalid owner_id")?;
            let tokens = db.list_tokens(owner_id, 100, 0).await?;
            if tokens.is_empty() {
                println!("No tokens found.");
            } else {
                println!(
                    "{:<14} {:<38} {:<8} {:<8} EXPIRES",
                    "PREFIX", "PROJECT", "USED", "ACTIVE"
                );
                for t in tokens {
                    println!(
                        "{:<14} {:<38} {:<8} {:<8} {}",
                        t.token_prefix,
                        t.project_id,
                        format!("{}/{}", t.usage_count, t.max_usage),
                        t.is_active,
                        t.expires_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        cli::TokenCommands::Deactivate { token_id, owner_id } => {
            let owner_id = uuid::Uuid::parse_str(&owner_id).context("Invalid owner_id")?;
            let deactivated = db.deactivate_token(&token_id, owner_id).await?;
            if deactivated {
                println!("Token deactivated.");
            } else {
                println!("Token not found, not yours, or already inactive.");
            }
        }
    }
    Ok(())
}

async fn handle_script_command(cmd: cli::ScriptCommands, db: PgStore) -> anyhow::Result<()> {
    match cmd {
        cli::ScriptCommands::Generate { token_id, raw } => {
            let token = db
                .get_token(&token_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("token not found: {}", token_id))?;

            if raw {
                println!("{}", script::generator::generate(&token.data_snapshot));
            } else {
                println!(
                    "{}",
                    script::generator::bookmarklet_href(&token.data_snapshot)
                );
            }
        }
    }
    Ok(())
}
