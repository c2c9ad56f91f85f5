use std::net::SocketAddr;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use basecamp::app::auth::AuthService;
use basecamp::config::rate_limits::RateLimits;
use basecamp::config::AppConfig;
use basecamp::domain::user::Role;
use basecamp::http;
use basecamp::infra::{cache::RedisCache, db::Db, storage::ObjectStorage};
use basecamp::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    let applied = db.apply_migrations(&config.migrations_dir).await?;
    tracing::info!(count = applied, dir = %config.migrations_dir, "migrations applied");

    let cache = RedisCache::connect(&config.redis_url).await?;
    let storage = ObjectStorage::new(&config).await?;

    if let Some(admin) = &config.bootstrap_admin {
        let auth = AuthService::new(db.clone(), config.paseto_access_key, config.access_ttl_minutes);
        let user = auth
            .ensure_user(&admin.name, &admin.email, &admin.password, Role::Admin)
            .await?;
        tracing::info!(user_id = %user.id, email = %user.email, "bootstrap admin ready");
    }

    let state = AppState {
        db,
        cache,
        storage,
        paseto_access_key: config.paseto_access_key,
        access_ttl_minutes: config.access_ttl_minutes,
        image_max_bytes: config.image_max_bytes,
        image_url_ttl_seconds: config.image_url_ttl_seconds,
        rate_limits: RateLimits {
            submissions_per_hour: config.submissions_per_hour,
            login_attempts_per_hour: config.login_attempts_per_hour,
        },
    };

    let app: Router = http::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("listening on {}", config.http_addr);

    let app = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
