//! OpenSASE POS - Self-hosted coffee shop point of sale

use std::sync::Arc;

use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_pos::api::{auth::hash_password, build_app, AppState, AuthKeys, SERVICE_NAME};
use opensase_pos::config::{BootstrapAdmin, Config, StoreKind};
use opensase_pos::domain::aggregates::{Role, User, UserDraft};
use opensase_pos::infra::{EventPublisher, InMemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let store: Arc<dyn Store> = match config.store {
        StoreKind::Postgres => {
            let url = config.database_url.as_ref().context("DATABASE_URL is required")?;
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url.expose_secret())
                .await
                .context("could not connect to the database")?;
            sqlx::migrate!("./migrations").run(&pool).await.context("migrations failed")?;
            Arc::new(PgStore::new(pool))
        }
        StoreKind::Memory => {
            tracing::warn!("using the in-memory store; data is lost on shutdown");
            Arc::new(InMemoryStore::new())
        }
    };

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(store.as_ref(), admin).await?;
    }

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable; events will only be logged");
                None
            }
        },
        None => None,
    };

    let auth = AuthKeys::new(&config.jwt_secret, config.token_ttl_minutes);
    let state = AppState::new(store, auth, EventPublisher::new(nats), config.report_top_n);
    let app = build_app(state);

    let addr = config.socket_addr();
    tracing::info!("🚀 {} listening on {}", SERVICE_NAME, addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Create the first admin on an empty user table.
async fn bootstrap_admin(store: &dyn Store, admin: &BootstrapAdmin) -> Result<()> {
    if store.count_users().await? > 0 {
        return Ok(());
    }
    let draft = UserDraft {
        email: admin.email.clone(),
        full_name: Some("Administrador".to_string()),
        role: Role::Admin,
        is_active: true,
        password: None,
    };
    let hash = hash_password(admin.password.expose_secret())?;
    let user = User::new(&draft, hash);
    store.insert_user(&user).await?;
    tracing::info!(email = %user.email, "bootstrap admin created");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
