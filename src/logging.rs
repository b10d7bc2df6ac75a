//! Diagnostic logging, off unless `LOG` is set

use tcp_relay_shared::limits;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// True when the diagnostic flag is present and non-empty
pub fn enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Install the subscriber if diagnostics were requested
///
/// `RUST_LOG` narrows the output further; without it every relay event down to
/// `debug` is shown.
pub fn init() {
    let flag = std::env::var(limits::LOG_ENV_VAR).ok();
    if !enabled(flag.as_deref()) {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
