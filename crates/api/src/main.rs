use anyhow::Context;

use rentgate_infra::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rentgate_observability::init();

    let settings = Settings::from_env().context("invalid configuration")?;
    if settings.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let services = rentgate_api::app::AppServices::from_settings(&settings)
        .await
        .context("failed to initialise grant store")?;
    let app = rentgate_api::app::build_app(settings.jwt_secret.clone(), services);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
