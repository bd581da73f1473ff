use axum::{extract::DefaultBodyLimit, http::HeaderValue};
use campus_assessment::{
    config::{get_config, init_config, Config, LogFormat},
    database::{
        memory::MemoryStore,
        pool::{create_pool, run_migrations},
        postgres::PgStore,
        store::SharedStore,
    },
    routes,
    services::notification_service::NotificationWorker,
    utils::time::{SharedClock, SystemClock},
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::permissive().allow_origin(AllowOrigin::list(origins))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config();
    init_tracing(config.log_format);

    let store: SharedStore = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            info!("Using PostgreSQL store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    let clock: SharedClock = Arc::new(SystemClock);

    let app_state = AppState::new(store.clone(), clock.clone(), config)?;

    match &config.notification_webhook_url {
        Some(url) => {
            let worker = NotificationWorker::new(
                store.clone(),
                clock.clone(),
                url.clone(),
                config.webhook_secret.clone(),
            );
            tokio::spawn(async move {
                loop {
                    match worker.run_once().await {
                        Ok(true) => {}
                        Ok(false) => {
                            tokio::time::sleep(Duration::from_millis(1000)).await;
                        }
                        Err(e) => {
                            tracing::error!(error = ?e, "Notification worker error");
                            tokio::time::sleep(Duration::from_secs(2)).await;
                        }
                    }
                }
            });
        }
        None => info!("NOTIFICATION_WEBHOOK_URL not set, notifications stay in the outbox"),
    }

    let app = routes::api_router(config)
        .with_state(app_state)
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
