use anyhow::Context;
use clap::Parser;
use paylink_checkout::build_client;
use paylink_core::LinkStore;
use paylink_gateway::{telemetry, App, AppState, Cli, Settings, StoreSettings};
use paylink_store::{RedisLinkStore, UpstashLinkStore};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the environment.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    telemetry::init(cli.log_format);
    let settings = Settings::from_cli(cli).context("invalid configuration")?;

    info!(
        listen_addr = %settings.listen_addr,
        store = %settings.store,
        sms = settings.sms_enabled(),
        webhooks = settings.webhooks_enabled(),
        api_key = settings.api_key.is_some(),
        "starting paylink gateway"
    );
    if settings.webhook_secret.is_some() && !settings.webhooks_enabled() {
        warn!(
            "STRIPE_WEBHOOK_SECRET is set but WooCommerce is not configured, \
             webhook route disabled"
        );
    }

    let http = build_client(settings.http_timeout)?;
    let store = connect_store(&settings.store, http.clone()).await?;
    let state = AppState::from_settings(&settings, http, store);
    let router = App::router(state, &settings.cors_origins);

    let listener = tokio::net::TcpListener::bind(settings.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway stopped");
    Ok(())
}

async fn connect_store(
    settings: &StoreSettings,
    http: reqwest::Client,
) -> anyhow::Result<Option<Arc<dyn LinkStore>>> {
    let store: Option<Arc<dyn LinkStore>> = match settings {
        StoreSettings::Redis { url } => Some(Arc::new(
            RedisLinkStore::connect(url)
                .await
                .context("failed to connect to Redis")?,
        )),
        StoreSettings::Upstash(config) => {
            Some(Arc::new(UpstashLinkStore::new(http, config.clone())))
        }
        StoreSettings::Disabled => {
            info!("no link store configured, short links disabled");
            None
        }
    };
    Ok(store)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
