use axum::Router;
use dotenvy::dotenv;
use log::info;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use deskserver::shared::config::AppConfig;
use deskserver::shared::state::AppState;
use deskserver::shared::utils::create_conn;
use deskserver::sla::{LogAlertSink, PgSlaStore, SlaMonitor, SlaStore, SystemClock};
use deskserver::tickets::configure_tickets_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_conn(&config.database)?;

    let store: Arc<dyn SlaStore> = Arc::new(PgSlaStore::new(pool.clone()));
    let monitor = SlaMonitor::new(
        store,
        Arc::new(LogAlertSink),
        Arc::new(SystemClock),
        config.sla.recalc_interval_secs,
    );
    monitor.start();

    let state = Arc::new(AppState {
        conn: pool,
        config: config.clone(),
    });
    let app = Router::new()
        .merge(configure_tickets_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!("deskserver listening on {}", config.server.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
