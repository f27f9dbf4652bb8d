//! Logging initialization.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Per-statement sqlx logs are noise next to the query metrics.
const QUIET_DIRECTIVES: &str = "sqlx::query=warn";

fn env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(format!("{},{}", level, QUIET_DIRECTIVES))?),
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides `logging.level`.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(&config.level)?);

    match config.format.as_str() {
        "json" => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?,
        "pretty" => registry
            .with(fmt::layer().pretty().with_span_events(FmtSpan::CLOSE))
            .try_init()?,
        other => anyhow::bail!("Unknown logging.format '{}': expected json or pretty", other),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_rejected() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "xml".to_string(),
        };
        let err = init_logging(&config).unwrap_err();
        assert!(err.to_string().contains("xml"));
    }

    #[test]
    fn test_bad_level_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert!(env_filter("info[").is_err());
    }
}
