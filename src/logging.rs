use error_stack::{Result, ResultExt};
use std::io::IsTerminal;
use std::sync::Once;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::Subscriber;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, registry::LookupSpan, EnvFilter, Layer,
};

use crate::config::{self, LoggingStyle};

#[derive(Debug, Error)]
#[error("Failed to initialize tracing")]
pub struct TracingInitError;

/// Installs the global subscriber writing to stderr.
///
/// `RUST_LOG` overrides [`config::Logging::targets`] if it is set.
pub fn init(config: &config::Logging) -> Result<(), TracingInitError> {
    let targets = std::env::var("RUST_LOG").unwrap_or_else(|_| config.targets.clone());
    let ansi = std::io::stderr().is_terminal();

    let registry = tracing_subscriber::Registry::default()
        .with(fmt_layer(std::io::stderr, ansi, config.style, &targets))
        .with(tracing_error::ErrorLayer::default());

    tracing::subscriber::set_global_default(registry)
        .change_context(TracingInitError)
        .attach_printable("already initialized tracing")
}

pub fn init_for_tests() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let targets = std::env::var("RUST_LOG").unwrap_or_default();
        let registry = tracing_subscriber::Registry::default()
            .with(fmt_layer(
                tracing_subscriber::fmt::TestWriter::new,
                false,
                LoggingStyle::Full,
                &targets,
            ))
            .with(tracing_error::ErrorLayer::default());

        // another test harness may have installed one already
        if tracing::subscriber::set_global_default(registry).is_err() {
            eprintln!("tracing is already initialized");
        }
    });
}

fn fmt_layer<S>(
    maker: impl for<'w> MakeWriter<'w> + Send + Sync + 'static,
    ansi: bool,
    style: LoggingStyle,
    targets: &str,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(ansi)
        .with_writer(maker);

    match style {
        LoggingStyle::Compact => layer.compact().with_filter(make_env_filter(targets)).boxed(),
        LoggingStyle::Full => layer.with_filter(make_env_filter(targets)).boxed(),
        LoggingStyle::Pretty => layer.pretty().with_filter(make_env_filter(targets)).boxed(),
    }
}

fn make_env_filter(targets: &str) -> EnvFilter {
    let default_level = if cfg!(debug_assertions) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .parse_lossy(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_filter_accepts_bad_directives() {
        let filter = make_env_filter("agora=trace,[[[");
        assert!(filter.to_string().contains("agora=trace"));
    }

    #[test]
    fn init_for_tests_is_idempotent() {
        init_for_tests();
        init_for_tests();
        tracing::info!("logging works");
    }
}
