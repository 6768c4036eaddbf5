use std::sync::Arc;

use anyhow::Context;

use gatehouse_api::app::{self, AppServices};
use gatehouse_api::config::AppConfig;
use gatehouse_auth::PermissionCatalog;
use gatehouse_infra::{
    IdentityStore, InMemoryIdentityStore, PostgresIdentityStore, Reconciler,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gatehouse_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let store: Arc<dyn IdentityStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresIdentityStore::connect(url)
                .await
                .context("failed to connect to the identity database")?;
            store.ensure_schema().await.context("failed to create identity schema")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory identity store");
            InMemoryIdentityStore::arc()
        }
    };

    let catalog = Arc::new(PermissionCatalog::with_core(&[])?);

    let summary = Reconciler::new(config.reconcile_mode)
        .run(&catalog, config.admin.as_ref(), &store)
        .await
        .context("startup reconciliation failed")?;
    if !summary.catalog.is_clean() {
        tracing::warn!(
            failed = summary.catalog.failures.len(),
            "permission catalog partially reconciled"
        );
    }

    let services = Arc::new(AppServices::new(&config, catalog, store)?);
    let app = app::build_app(services)?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
