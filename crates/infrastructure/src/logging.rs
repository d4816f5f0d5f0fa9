use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ConfigError, LogFormat, LogLevel};

/// Install the global subscriber for the agent.
///
/// Logs go to stderr; stdout is reserved for command output (`validate`,
/// `match`) and must stay parseable. `RUST_LOG` overrides the configured
/// level. The JSON layer attaches the enclosing span (the root `service`
/// span) to every line.
///
/// Call once, before the engine starts.
pub fn init_logging(level: LogLevel, format: LogFormat) -> Result<(), ConfigError> {
    let registry = tracing_subscriber::registry().with(build_filter(
        level,
        std::env::var("RUST_LOG").ok().as_deref(),
    ));

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    Ok(())
}

/// `RUST_LOG` directives when present and valid, else the configured level.
fn build_filter(level: LogLevel, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_is_a_valid_filter() {
        for level in [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ] {
            assert!(
                EnvFilter::try_new(level.as_str()).is_ok(),
                "{} should be a valid filter",
                level.as_str()
            );
        }
    }

    #[test]
    fn rust_log_overrides_level() {
        let filter = build_filter(LogLevel::Info, Some("application=trace"));
        assert_eq!(
            filter.to_string(),
            EnvFilter::new("application=trace").to_string()
        );
    }

    #[test]
    fn blank_or_bad_rust_log_falls_back() {
        let warn = EnvFilter::new("warn").to_string();
        assert_eq!(build_filter(LogLevel::Warn, None).to_string(), warn);
        assert_eq!(build_filter(LogLevel::Warn, Some("  ")).to_string(), warn);
        assert_eq!(
            build_filter(LogLevel::Warn, Some("application=loud")).to_string(),
            warn
        );
    }
}
