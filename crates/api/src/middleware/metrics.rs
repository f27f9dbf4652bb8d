//! Prometheus metrics: HTTP middleware, business counters and the
//! `/metrics` exporter.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use domain::models::pool::PoolKind;
use domain::models::unsent_audit::ReversalTrigger;
use domain::models::upload::UploadResult;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Records `http_requests_total` and `http_request_duration_seconds`.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = method_to_str(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(duration);

    response
}

fn method_to_str(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

/// Outcome label of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimMetricOutcome {
    Claimed,
    Reused,
    Exhausted,
    Failed,
}

impl ClaimMetricOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            ClaimMetricOutcome::Claimed => "claimed",
            ClaimMetricOutcome::Reused => "reused",
            ClaimMetricOutcome::Exhausted => "exhausted",
            ClaimMetricOutcome::Failed => "failed",
        }
    }
}

pub fn record_pool_claim(kind: PoolKind, outcome: ClaimMetricOutcome) {
    counter!(
        "pool_claims_total",
        "kind" => kind.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_reversal(trigger: ReversalTrigger) {
    counter!("reversals_total", "trigger" => trigger.as_str()).increment(1);
}

pub fn record_upload_rows(kind: PoolKind, result: &UploadResult) {
    counter!("uploads_rows_total", "kind" => kind.as_str(), "outcome" => "accepted")
        .increment(result.successful_uploads as u64);
    counter!("uploads_rows_total", "kind" => kind.as_str(), "outcome" => "rejected")
        .increment(result.failed_uploads as u64);
}

/// GET /metrics in Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Installs the global Prometheus recorder. Later calls are no-ops.
pub fn init_metrics() -> Result<(), BuildError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&[0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0])?
        .install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_to_str() {
        assert_eq!(method_to_str(&Method::GET), "GET");
        assert_eq!(method_to_str(&Method::POST), "POST");
        assert_eq!(method_to_str(&Method::DELETE), "DELETE");
        assert_eq!(method_to_str(&Method::TRACE), "OTHER");
    }

    #[test]
    fn test_claim_outcome_labels() {
        assert_eq!(ClaimMetricOutcome::Claimed.as_str(), "claimed");
        assert_eq!(ClaimMetricOutcome::Exhausted.as_str(), "exhausted");
    }

    #[test]
    fn test_counters_without_recorder_are_noops() {
        record_pool_claim(PoolKind::GiftCard, ClaimMetricOutcome::Claimed);
        record_reversal(ReversalTrigger::Admin);
        record_upload_rows(PoolKind::Link, &UploadResult::default());
    }
}
