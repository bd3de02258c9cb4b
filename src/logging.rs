//! Tracing subscriber setup for hosts embedding the pipeline.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` selects levels (default
/// `astroglass_forecast=info`); `RUST_LOG_FORMAT=json` switches to JSON lines.
/// Later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("astroglass_forecast=info"));

    let json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init();
        init();
    }
}
