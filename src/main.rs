use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use telemedicine_backend::auth::SessionCookie;
use telemedicine_backend::config::{SessionBackend, Settings};
use telemedicine_backend::database::{create_pool, run_migrations, PgRepository};
use telemedicine_backend::handlers::{self, AppState};
use telemedicine_backend::redis_session::RedisSessionStore;
use telemedicine_backend::session::{MemorySessionStore, SessionStore};
use telemedicine_backend::{logging, metrics};
use tracing::info;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new().context("Failed to load configuration")?;

    logging::init_logging(settings.logging.dir.as_deref(), &settings.logging.level)
        .context("Failed to initialize logging")?;
    metrics::init_metrics().context("Failed to register metrics")?;

    info!("Telemedicine backend starting...");

    info!("Connecting to PostgreSQL...");
    let pool = create_pool(&settings.database)
        .await
        .context("Failed to create database pool")?;

    if settings.database.run_migrations {
        info!("Running database migrations...");
        run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;
    }

    let ttl = Duration::from_secs(settings.session.ttl_seconds);
    let sessions: Arc<dyn SessionStore> = match settings.session.store {
        SessionBackend::Memory => {
            info!("Using in-memory session store");
            Arc::new(MemorySessionStore::new(ttl))
        }
        SessionBackend::Redis => {
            info!("Connecting to Redis session store...");
            let url = settings
                .session
                .redis_url
                .as_deref()
                .context("session.redis_url is not set")?;
            Arc::new(
                RedisSessionStore::connect(url, ttl)
                    .await
                    .context("Failed to connect to Redis")?,
            )
        }
    };

    let app_state = web::Data::new(AppState {
        repository: Arc::new(PgRepository::new(pool.clone())),
        sessions,
        session_cookie: SessionCookie::new(&settings.session)?,
    });

    let bind_addr = (settings.server.host.clone(), settings.server.port);
    let cors_origins = settings.cors.allowed_origins.clone();
    info!("Starting server on {}:{}", bind_addr.0, bind_addr.1);

    let mut server = HttpServer::new(move || {
        // Credentials are allowed so browsers send the session cookie cross-origin.
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
            .supports_credentials()
            .max_age(3600);

        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(TracingLogger::default())
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(handlers::configure)
    });
    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }

    server.bind(bind_addr)?.run().await?;

    info!("Server stopped, closing database pool");
    pool.close().await;

    Ok(())
}
