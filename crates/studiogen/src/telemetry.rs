//! Process-wide tracing setup.
//!
//! `RUST_LOG` overrides the default `info` filter. `log::*` records from the
//! storage layer are bridged into tracing.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LogFormat;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init(format: LogFormat) {
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Plain => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed(),
    };

    let subscriber = Registry::default().with(fmt_layer.with_filter(env_filter()));

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return;
    }
    // Already set when another logger owns `log`; tracing still works.
    tracing_log::LogTracer::init().ok();
}
