//! # Prometheus Metrics
//!
//! Exposes admission metrics for the node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared across request handlers and background tasks.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Transactions received on `POST /transactions`.
    pub transactions_submitted_total: IntCounter,
    /// Transactions admitted to the pool.
    pub transactions_accepted_total: IntCounter,
    /// Transactions refused for any reason (structural, verification, pool).
    pub transactions_rejected_total: IntCounter,
    /// Current number of pending transactions in the pool.
    pub transactions_in_pool: IntGauge,
    /// Time from receiving a submission to the pool's decision, in seconds.
    pub admission_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("afan".into()), None)?;

        let transactions_submitted_total = register(
            &registry,
            IntCounter::new(
                "transactions_submitted_total",
                "Total number of transactions submitted to the node",
            )?,
        )?;
        let transactions_accepted_total = register(
            &registry,
            IntCounter::new(
                "transactions_accepted_total",
                "Total number of transactions admitted to the pool",
            )?,
        )?;
        let transactions_rejected_total = register(
            &registry,
            IntCounter::new(
                "transactions_rejected_total",
                "Total number of submitted transactions that were refused",
            )?,
        )?;
        let transactions_in_pool = register(
            &registry,
            IntGauge::new(
                "transactions_in_pool",
                "Current number of pending transactions in the pool",
            )?,
        )?;
        let admission_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "admission_latency_seconds",
                    "Transaction admission latency (assembly + verification + pooling) in seconds",
                )
                .buckets(vec![
                    0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
                ]),
            )?,
        )?;

        Ok(Self {
            registry,
            transactions_submitted_total,
            transactions_accepted_total,
            transactions_rejected_total,
            transactions_in_pool,
            admission_latency_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn register<C: Collector + Clone + 'static>(
    registry: &Registry,
    collector: C,
) -> Result<C, prometheus::Error> {
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
