//! Tracing setup for the controller daemon.
//!
//! One entry point, driven by the CLI: a level string and a flag selecting
//! plain or JSON output. `RUST_LOG` overrides the level when set, so a
//! deployed daemon can be turned up without new flags.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `level` applies when `RUST_LOG` is unset. With `json` the fmt layer
/// emits one JSON object per line for log aggregation; otherwise it writes
/// human-readable lines with file and line context for local runs.
pub fn init(level: &str, json: bool) -> Result<()> {
    let registry = tracing_subscriber::registry().with(level_filter(level));

    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }

    Ok(())
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_uses_configured_level() {
        std::env::remove_var("RUST_LOG");
        assert_eq!(level_filter("debug").to_string(), "debug");
        assert_eq!(level_filter("warn").to_string(), "warn");
    }
}
