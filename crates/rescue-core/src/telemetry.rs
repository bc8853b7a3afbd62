//! Tracing initialisation for CI Rescue binaries.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber.
///
/// `json` switches to newline-delimited JSON log lines for aggregation
/// pipelines. `level` is the default verbosity when `RUST_LOG` is not set;
/// when it is set, `RUST_LOG` wins.
///
/// Safe to call more than once: the global subscriber can only be set
/// once per process, and later calls are ignored.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .try_init()
            .ok();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
            .ok();
    }
}
