use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use form_relay::config::AppConfig;
use form_relay::error::AppError;
use form_relay::submissions::notifications::{DispatcherState, MailError, NotificationDispatcher};
use form_relay::submissions::{form_router, SubmissionPipeline};
use form_relay::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        site_key: config.recaptcha.site_key.clone(),
    };

    let pipeline = Arc::new(SubmissionPipeline::from_config(&config)?);
    let dispatcher_state = pipeline.dispatcher().state();
    info!(state = ?dispatcher_state, "email dispatcher initialized");
    if dispatcher_state == DispatcherState::Configured {
        if pipeline.dispatcher().verify_connection().await {
            info!("SMTP relay reachable");
        } else {
            warn!("SMTP relay unreachable; submissions will fail until it recovers");
        }
    }

    let app = with_operational_routes(form_router(pipeline))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "form relay ready");

    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) async fn verify_smtp() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let dispatcher = NotificationDispatcher::from_config(&config);
    if dispatcher.state() == DispatcherState::Unconfigured {
        println!(
            "SMTP is not configured (set SMTP_HOST, SMTP_USER and SMTP_PASSWORD, plus SMTP_FROM when SMTP_USER is not an address)."
        );
        return Ok(());
    }

    if dispatcher.verify_connection().await {
        println!("SMTP relay accepted the connection.");
        Ok(())
    } else {
        Err(MailError::Smtp("relay did not accept the connection".to_string()).into())
    }
}
