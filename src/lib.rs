//! Bookshelf application library.
//!
//! Wires the database, the module registry and the HTTP server together.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use bookshelf_db::Database;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub mod modules;

use modules::books::store::SurrealBookStore;

/// Build a registry holding every module, backed by `database`.
pub fn build_registry(database: &Database, settings: &Settings) -> ModuleRegistry {
    let store = SurrealBookStore::new(database.client(), &settings.database);
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, Arc::new(store));
    registry
}

/// Run the service until SIGINT or SIGTERM.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    run_until(settings, bookshelf_http::shutdown_signal()).await
}

/// Run the service until `shutdown` resolves.
///
/// The database handle is acquired first and dropped last, so it is released
/// on every exit path once connected.
pub async fn run_until<F>(settings: Settings, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let database = Database::connect(&settings.database)
        .await
        .context("failed to open the book store")?;

    let registry = build_registry(&database, &settings);
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    let served = bookshelf_http::start_server(&registry, &settings, shutdown).await;

    // Stop modules even when the server failed, then report the first error.
    let stopped = registry.stop_modules().await;
    served?;
    stopped?;

    tracing::info!("bookshelf shutdown complete");
    Ok(())
}
