//! Prometheus metrics and the optional /metrics endpoint

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

lazy_static! {
    pub static ref INTENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("spectra_intents_total", "Completed intent executions by outcome"),
        &["outcome"],
    )
    .expect("intents counter");
    pub static ref STEP_RETRIES_TOTAL: IntCounter = IntCounter::new(
        "spectra_step_retries_total",
        "Step retries across all intent executions",
    )
    .expect("retries counter");
    pub static ref STEP_LATENCY_SECONDS: Histogram = Histogram::with_opts(HistogramOpts::new(
        "spectra_step_latency_seconds",
        "Wall time per executed step",
    ))
    .expect("step latency histogram");
    pub static ref PERCEPTION_CACHE_HITS: IntGauge = IntGauge::new(
        "spectra_perception_cache_hits",
        "Cumulative media perception cache hits",
    )
    .expect("cache hit gauge");
}

static REGISTER_ONCE: Lazy<()> = Lazy::new(|| {
    let registry = global_registry();
    registry
        .register(Box::new(INTENTS_TOTAL.clone()))
        .expect("register intents counter");
    registry
        .register(Box::new(STEP_RETRIES_TOTAL.clone()))
        .expect("register retries counter");
    registry
        .register(Box::new(STEP_LATENCY_SECONDS.clone()))
        .expect("register step latency");
    registry
        .register(Box::new(PERCEPTION_CACHE_HITS.clone()))
        .expect("register cache hits");
});

pub fn register_metrics() {
    Lazy::force(&REGISTER_ONCE);
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

/// Serve /metrics on the given port; port 0 disables the endpoint.
pub fn spawn_metrics_server(port: u16) -> Option<JoinHandle<()>> {
    if port == 0 {
        return None;
    }

    register_metrics();
    let registry = Arc::new(global_registry().clone());
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(%addr, "metrics server listening");
    Some(tokio::spawn(async move {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app.into_make_service()).await {
                    error!(?err, "metrics server exited with error");
                }
            }
            Err(err) => {
                error!(?err, "failed to bind metrics listener");
            }
        }
    }))
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!(?err, "failed to encode prometheus metrics");
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "metric encode error",
        )
            .into_response();
    }

    match String::from_utf8(buffer) {
        Ok(body) => body.into_response(),
        Err(err) => {
            error!(?err, "failed to convert prometheus metrics to utf8");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "metric encode error",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent() {
        register_metrics();
        register_metrics();

        INTENTS_TOTAL.with_label_values(&["completed"]).inc();
        assert!(INTENTS_TOTAL.with_label_values(&["completed"]).get() >= 1);
    }
}
