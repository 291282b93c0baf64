use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use std::io;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};

use dotenvy::dotenv;
use flights_posting_api::auth::{AuthService, RateLimitStore};
use flights_posting_api::config::AppConfig;
use flights_posting_api::database::DatabaseService;
use flights_posting_api::handlers;
use flights_posting_api::middleware::*;
use flights_posting_api::services::{CityService, CommentService, FlightService, PostService, UserService};
use flights_posting_api::utils;

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    log::error!("{}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment from .env (if present)
    let _ = dotenv();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    // File + stdout logging; env_logger takes over if the log directory is unusable
    let _logger = flexi_logger::Logger::try_with_str(&config.logging.level)
        .and_then(|logger| {
            logger
                .log_to_file(
                    flexi_logger::FileSpec::default()
                        .directory(&config.logging.directory)
                        .suppress_timestamp(),
                )
                .duplicate_to_stdout(flexi_logger::Duplicate::Info)
                .start()
        })
        .map_err(|e| {
            env_logger::builder()
                .filter_level(utils::logging::level_from_string(&config.logging.level))
                .format_timestamp_secs()
                .init();
            log::warn!("File logging unavailable, using stdout only: {}", e);
        })
        .ok();

    log::info!("Starting {} v{}", config.app.project_name, env!("CARGO_PKG_VERSION"));
    log::info!("Server: {}:{}", config.server.host, config.server.port);
    log::info!("Status: {}", config.app.app_status);
    log::info!("Workers: {}", config.server.workers);

    let db_service = Arc::new(
        DatabaseService::new(&config.database)
            .await
            .map_err(|e| startup_error("Failed to initialize database", e))?,
    );

    if let Err(e) = db_service.init_schema().await {
        log::error!("Failed to initialize DB schema: {}", e);
    } else {
        log::info!("DB schema ensured");
    }

    let auth_service = Arc::new(
        AuthService::new(config.auth.clone()).map_err(|e| startup_error("Failed to load signing keys", e))?,
    );
    log::info!("Tokens signed with {:?}", auth_service.algorithm());

    let rate_limit_store = Arc::new(Mutex::new(RateLimitStore::new()));

    let user_service = Arc::new(UserService::new(Arc::clone(&db_service), Arc::clone(&auth_service)));
    let city_service = Arc::new(CityService::new(Arc::clone(&db_service)));
    let flight_service = Arc::new(FlightService::new(Arc::clone(&db_service)));
    let post_service = Arc::new(PostService::new(Arc::clone(&db_service)));
    let comment_service = Arc::new(CommentService::new(Arc::clone(&db_service)));

    let is_production = config.app.is_production();
    if !is_production {
        log::info!(
            "API docs: http://{}:{}/docs",
            config.server.host, config.server.port
        );
    }

    // Forget clients whose window has expired
    let store_bg = Arc::clone(&rate_limit_store);
    let window_seconds = config.security.rate_limit_window_seconds;
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(window_seconds.max(60)));
        loop {
            interval.tick().await;
            let mut store = store_bg.lock().await;
            store.cleanup(window_seconds);
            log::debug!("Rate limiter tracking {} clients", store.tracked_clients());
        }
    });

    let app_config = config.clone();
    HttpServer::new(move || {
        let security = &app_config.security;
        App::new()
            .app_data(web::Data::new(app_config.app.clone()))
            .app_data(web::Data::new(Arc::clone(&db_service)))
            .app_data(web::Data::new(Arc::clone(&user_service)))
            .app_data(web::Data::new(Arc::clone(&city_service)))
            .app_data(web::Data::new(Arc::clone(&flight_service)))
            .app_data(web::Data::new(Arc::clone(&post_service)))
            .app_data(web::Data::new(Arc::clone(&comment_service)))
            // The last wrap sees the request first
            .wrap(AuthMiddleware {
                auth_service: Arc::clone(&auth_service),
            })
            .wrap(RequestSizeLimitMiddleware {
                max_size: security.max_request_size_bytes,
            })
            .wrap(RateLimitMiddleware {
                store: Arc::clone(&rate_limit_store),
                max_requests: security.rate_limit_requests,
                window_seconds: security.rate_limit_window_seconds,
                auth_service: Some(Arc::clone(&auth_service)),
            })
            .wrap(SecurityHeadersMiddleware)
            .wrap(CorsMiddleware::for_status(is_production, &security.allowed_origins))
            .wrap(TrustedHostMiddleware::for_status(is_production, &security.allowed_hosts))
            .wrap(LoggingMiddleware)
            .wrap(actix_middleware::Compress::default())
            .configure(|cfg| {
                handlers::configure(cfg);
                if !is_production {
                    handlers::docs::configure(cfg);
                }
            })
    })
    .bind((config.server.host.clone(), config.server.port))?
    .workers(config.server.workers)
    .keep_alive(std::time::Duration::from_secs(config.server.keep_alive_seconds))
    .client_request_timeout(std::time::Duration::from_secs(config.server.client_timeout_seconds))
    .client_disconnect_timeout(std::time::Duration::from_secs(config.server.client_shutdown_seconds))
    .max_connections(config.server.max_connections)
    .run()
    .await
}
