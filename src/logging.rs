//! Diagnostic logging setup for the binary.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "RESHELVE_LOG";

/// Picks the filter directive: `RESHELVE_LOG` wins, then `--verbose`.
pub fn filter_directive(env_value: Option<&str>, verbose: bool) -> String {
    match env_value {
        Some(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ if verbose => "debug".to_string(),
        _ => "warn".to_string(),
    }
}

/// Installs a stderr subscriber. Calling it twice is harmless.
pub fn init_logging(verbose: bool) {
    let env_value = std::env::var(LOG_ENV).ok();
    let directive = filter_directive(env_value.as_deref(), verbose);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_verbose() {
        assert_eq!(filter_directive(Some("reshelve=trace"), false), "reshelve=trace");
        assert_eq!(filter_directive(Some("info"), true), "info");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(filter_directive(None, false), "warn");
        assert_eq!(filter_directive(None, true), "debug");
        assert_eq!(filter_directive(Some("  "), true), "debug");
    }
}
