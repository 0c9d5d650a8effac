//! SurrealDB client factory.
//!
//! The protocol is selected from the endpoint scheme:
//! - `ws://` / `wss://` - WebSocket connections
//! - `http://` / `https://` - HTTP connections
//! - `mem://` - In-memory database (for testing)

use anyhow::Context;
use bookshelf_kernel::settings::DatabaseSettings;

/// SurrealDB client type using the `Any` engine for runtime protocol selection
pub type SurrealClient = surrealdb::Surreal<surrealdb::engine::any::Any>;

/// Owned database handle.
///
/// The connection lives as long as this value and every clone of the client
/// handed out by [`Database::client`]; it is released on drop, whichever way
/// the owner exits.
pub struct Database {
    client: SurrealClient,
    endpoint: String,
}

impl Database {
    /// Connect, authenticate if credentials are configured, and select the
    /// namespace and database. There is no retry: a failure here is fatal to
    /// the caller.
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let endpoint = sanitize_url(&settings.endpoint);
        tracing::info!(target: "bookshelf-db", %endpoint, "connecting to database");

        let client = surrealdb::engine::any::connect(settings.endpoint.as_str())
            .await
            .with_context(|| format!("failed to connect to SurrealDB at '{}'", endpoint))?;

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            client
                .signin(surrealdb::opt::auth::Root { username, password })
                .await
                .with_context(|| format!("failed to authenticate with SurrealDB at '{}'", endpoint))?;
        }

        client
            .use_ns(&settings.namespace)
            .use_db(&settings.database)
            .await
            .with_context(|| {
                format!(
                    "failed to select namespace '{}' / database '{}'",
                    settings.namespace, settings.database
                )
            })?;

        tracing::info!(
            target: "bookshelf-db",
            %endpoint,
            ns = %settings.namespace,
            db = %settings.database,
            "database connected"
        );

        Ok(Self { client, endpoint })
    }

    /// Shared client handle; cloning is cheap and safe across tasks.
    pub fn client(&self) -> SurrealClient {
        self.client.clone()
    }

    /// Round-trip to the server to confirm it is reachable.
    pub async fn health(&self) -> anyhow::Result<()> {
        self.client
            .health()
            .await
            .with_context(|| format!("health check against '{}' failed", self.endpoint))
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        tracing::info!(target: "bookshelf-db", endpoint = %self.endpoint, "closing database connection");
    }
}

/// Strip credentials from a connection URL so it can be logged.
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let after_at = &url[at_pos..];
            return format!("{}***{}", scheme, after_at);
        }
    }
    url.to_string()
}
