use anyhow::Context;
use bookshelf_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %bookshelf_db::sanitize_url(&settings.database.endpoint),
        collection = %settings.database.collection,
        "bookshelf bootstrap starting"
    );

    bookshelf_app::run(settings).await
}
