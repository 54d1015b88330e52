use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use bauplan_backend::{
    app, auth, config, db, logging,
    oracle::{AnthropicOracle, OpenAiOracle, OracleRouter},
    pipeline::Pipeline,
    services::RedisCache,
    store::PgFactStore,
};

fn build_router(settings: &config::Settings) -> Result<OracleRouter> {
    let timeout = settings.oracle_timeout_seconds;
    let mut router = OracleRouter::new(Duration::from_secs(timeout));

    if let Some(p) = &settings.openai {
        let oracle = OpenAiOracle::new(&p.base_url, &p.api_key, &p.model, timeout)?;
        router = router.with_provider(Arc::new(oracle));
    }
    if let Some(p) = &settings.anthropic {
        let oracle = AnthropicOracle::new(&p.base_url, &p.api_key, &p.model, timeout)?;
        router = router.with_provider(Arc::new(oracle));
    }
    Ok(router)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;

    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting Bauplan backend"
    );

    // Database pool, schema migrated
    let pool = db::create_pool(&settings).await?;

    let cache = RedisCache::new(&settings.redis_url, settings.redis_cache_ttl_seconds).await?;

    let router = build_router(&settings)?;
    tracing::info!(
        providers = ?router.providers().collect::<Vec<_>>(),
        "Drafting oracle configured"
    );

    let pipeline = Pipeline::new(Arc::new(PgFactStore::new(pool.clone())), router);

    // JWKS cache for session validation
    let jwks_cache = auth::JwksCache::new(
        settings.supabase_jwt_jwks_url.clone(),
        settings.supabase_jwt_issuer.clone(),
        settings.supabase_jwt_audience.clone(),
        settings.jwks_cache_ttl_seconds,
    )?;
    if let Err(e) = jwks_cache.warm_cache().await {
        tracing::warn!(error = %e, "Failed to warm JWKS cache - will fetch on first request");
    }

    let state = app::AppState::new(
        pool,
        settings.clone(),
        pipeline,
        cache,
        Arc::new(jwks_cache),
    );
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.server_addr))?;
    tracing::info!(addr = %settings.server_addr, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
