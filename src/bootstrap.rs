//! Application wiring.
//!
//! Dependencies (store pool, cache, token service) are constructed once
//! here and handed to modules by reference; nothing hangs off process
//! globals.

use std::sync::Arc;

use anyhow::Context;

use shelf_auth::TokenService;
use shelf_cache::QueryCache;
use shelf_kernel::settings::Settings;
use shelf_kernel::{InitCtx, Migration, ModuleRegistry};

use crate::modules;

/// Shared handles every module is constructed from.
pub struct AppContext {
    pub db: sqlx::PgPool,
    pub cache: QueryCache,
    pub tokens: Arc<TokenService>,
}

impl AppContext {
    /// Construct all shared handles.
    ///
    /// PostgreSQL connectivity and the token signing secret are both
    /// required; failure here aborts startup.
    pub async fn build(settings: &Settings) -> anyhow::Result<Self> {
        let db = shelf_db::create_pool(&settings.database)
            .await
            .context("failed to connect to PostgreSQL; cannot serve without the primary store")?;

        let cache_pool = shelf_cache::create_pool(&settings.cache)
            .context("failed to configure the Redis pool")?;
        let cache = QueryCache::new(cache_pool, &settings.cache);

        let tokens = Arc::new(
            TokenService::from_settings(&settings.auth)
                .context("set auth.jwt_secret (SHELF_AUTH__JWT_SECRET) before starting")?,
        );

        Ok(Self { db, cache, tokens })
    }
}

/// Run the full service: migrate, init modules, serve until shutdown.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let ctx = AppContext::build(&settings).await?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &ctx);

    shelf_db::run_migrations(&ctx.db, &registry.collect_migrations())
        .await
        .context("failed to apply module migrations")?;

    let init_ctx = InitCtx {
        settings: &settings,
    };
    registry.init_modules(&init_ctx).await?;
    registry.start_modules(&init_ctx).await?;

    shelf_http::start_server(&registry, &settings).await?;

    registry.stop_modules().await?;

    tracing::info!("shelf-app shutdown complete");
    Ok(())
}

/// Apply pending migrations and exit.
///
/// Needs only the primary store, not Redis or a token secret.
pub async fn migrate(settings: Settings) -> anyhow::Result<()> {
    let db = shelf_db::create_pool(&settings.database)
        .await
        .context("failed to connect to PostgreSQL")?;

    shelf_db::run_migrations(&db, &module_migrations())
        .await
        .context("failed to apply module migrations")?;

    tracing::info!("migrations applied");
    Ok(())
}

/// Migrations of every module, in the registry's deterministic order.
fn module_migrations() -> Vec<(String, Migration)> {
    let mut migrations: Vec<(String, Migration)> = Vec::new();

    for migration in modules::auth::migrations() {
        migrations.push(("auth".to_string(), migration));
    }
    for migration in modules::books::migrations() {
        migrations.push(("books".to_string(), migration));
    }

    migrations.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(b.1.id)));
    migrations
}
