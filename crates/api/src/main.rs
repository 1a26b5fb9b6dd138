use std::sync::Arc;

use anyhow::Context;

use warden_infra::config::AuthConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = AuthConfig::from_env().context("invalid configuration")?;
    let services = warden_api::app::services::build_services(&config)
        .context("failed to initialize services")?;

    let app = warden_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        issuer = %config.issuer,
        jwks = config.jwks_url.is_some(),
        legacy_hs256 = config.legacy_secret.is_some(),
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
