//! Storefront service - cart, checkout and payment confirmation API

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::cart::CartService;
use storefront::http::{self, AppState, TokenVerifier};
use storefront::notify::{EventPublisher, NatsPublisher, NullPublisher};
use storefront::payments::{RazorpayGateway, StripeIntents};
use storefront::ports::{CartRepository, Catalog, OrderRepository};
use storefront::domain::aggregates::CatalogItem;
use storefront::store::seed::read_seed;
use storefront::store::{InMemoryStore, PgStore};
use storefront::{CheckoutService, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, events will be dropped");
                Arc::new(NullPublisher)
            }
        },
        None => Arc::new(NullPublisher),
    };

    let state = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            let store = PgStore::new(pool);
            for item in seed_items(&config)? {
                store.upsert_item(&item).await?;
            }
            build_state(&config, Arc::new(store), events)?
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            let store = InMemoryStore::new();
            let items = seed_items(&config)?;
            if items.is_empty() {
                tracing::warn!("In-memory catalog is empty; set CATALOG_SEED to load items");
            }
            for item in items {
                store.upsert_item(item).await;
            }
            build_state(&config, Arc::new(store), events)?
        }
    };

    let app = http::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!(port = config.port, "Storefront listening");
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}

fn seed_items(config: &Config) -> Result<Vec<CatalogItem>> {
    let Some(path) = &config.catalog_seed else { return Ok(Vec::new()) };
    let items = read_seed(path)?;
    tracing::info!(path = %path.display(), count = items.len(), "Seeding catalog");
    Ok(items)
}

fn build_state<S>(config: &Config, store: Arc<S>, events: Arc<dyn EventPublisher>) -> Result<AppState>
where
    S: Catalog + CartRepository + OrderRepository + 'static,
{
    let client = reqwest::Client::builder().timeout(Duration::from_secs(15)).build()?;

    let mut checkout = CheckoutService::new(store.clone(), store.clone(), store.clone())
        .with_events(events)
        .with_shipping(config.shipping_policy())
        .with_currency(&config.currency);
    match &config.stripe_secret_key {
        Some(key) => checkout = checkout.with_intents(Arc::new(StripeIntents::new(client.clone(), key.as_str()))),
        None => tracing::warn!("STRIPE_SECRET_KEY not set, card payments disabled"),
    }
    match &config.razorpay {
        Some(keys) => {
            let gateway = RazorpayGateway::new(client, keys.key_id.as_str(), keys.key_secret.as_str());
            checkout = checkout.with_gateway(Arc::new(gateway));
        }
        None => tracing::warn!("Razorpay keys not set, provider orders disabled"),
    }

    Ok(AppState {
        catalog: store.clone(),
        carts: CartService::new(store.clone(), store),
        checkout,
        tokens: Arc::new(TokenVerifier::new(&config.jwt_secret)),
    })
}
