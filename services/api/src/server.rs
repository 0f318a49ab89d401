use crate::cli::ServeArgs;
use crate::infra::{AppState, ConfiguredStore, ModelInfo};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use karma_rewards::config::AppConfig;
use karma_rewards::error::AppError;
use karma_rewards::rewards::{load_reward_data, RewardService};
use karma_rewards::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PRUNE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    args.data.apply(&mut config.rewards);

    telemetry::init(&config.telemetry)?;

    let loaded = load_reward_data(&config.rewards)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        model: Arc::new(ModelInfo::from(&loaded.model)),
    };

    let store = Arc::new(ConfiguredStore::open(&config.store).await?);
    let reward_service = Arc::new(RewardService::new(Arc::new(loaded.engine), store));
    spawn_retention_pruner(reward_service.clone(), config.store.retention_days);

    let app = with_operational_routes(reward_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "karma rewards service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Prune expired grants now and then once a day for the life of the process.
fn spawn_retention_pruner(service: Arc<RewardService<ConfiguredStore>>, retention_days: u32) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let today = Local::now().date_naive();
            if let Err(err) = service.prune_expired(today, retention_days).await {
                warn!(error = %err, "reward retention prune failed");
            }
        }
    });
}
