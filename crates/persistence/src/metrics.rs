//! Database metrics.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

pub const QUERY_DURATION_METRIC: &str = "db_query_duration_seconds";

pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(QUERY_DURATION_METRIC, "query" => query_name.to_string()).record(duration_secs);
}

/// Publishes connection pool gauges. Called from the readiness probe.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();
    let active = size.saturating_sub(idle);

    gauge!("db_pool_connections_active").set(active as f64);
    gauge!("db_pool_connections_idle").set(idle as f64);
    gauge!("db_pool_connections_total").set(size as f64);
}

/// Times one repository operation.
///
/// ```ignore
/// let timer = QueryTimer::new("claim_gift_card");
/// let result = tx.commit().await;
/// timer.record();
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        record_query_duration(self.query_name, self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_timer_keeps_name() {
        let timer = QueryTimer::new("claim_link");
        assert_eq!(timer.query_name, "claim_link");
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        QueryTimer::new("list_links").record();
    }
}
