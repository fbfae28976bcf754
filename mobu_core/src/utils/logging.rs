//! # Logging Initialization
//!
//! One global `tracing` subscriber for the whole process, installed at most
//! once no matter how often [`init_logging`] is called.
//!
//! - `RUST_LOG` wins when set. Otherwise the given level applies everywhere,
//!   with `debug` for the engine and protocol client crates.
//! - With `log_to_file`, output goes to a daily rolling `mobu.log` in the
//!   user's cache directory, without colors. If that directory cannot be found
//!   or written, logging falls back to stderr.
//! - On stderr, `ansi` decides whether level colors are used. Production
//!   deployments usually ship stderr to a collector and turn them off.
//! - With the `opentelemetry` feature and `OTEL_EXPORTER_OTLP_ENDPOINT` set,
//!   spans are also exported over OTLP. Each monkey's loop runs in a
//!   `monkey{user, business}` span, so a trace follows one simulated user.

use anyhow::Result;
use directories::ProjectDirs;
#[cfg(feature = "opentelemetry")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "opentelemetry")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "opentelemetry")]
use opentelemetry_sdk::{
    Resource,
    trace::{self as sdktrace, SdkTracerProvider},
};
use std::{io::stderr, path::Path, sync::Once};
use tracing_subscriber::{EnvFilter, fmt::layer, prelude::*};

static INIT: Once = Once::new();

pub const LOG_FILE_PREFIX: &str = "mobu.log";

/// Verbose stderr logging for tests.
pub fn init_test_logging() {
    let _ = init_logging("trace", false, true);
}

/// Builds the filter used when `RUST_LOG` is unset.
///
/// Accepts the uppercase level names deployments already configure, so
/// `WARNING` and `CRITICAL` map to `warn` and `error`.
pub fn default_filter(log_level: &str) -> String {
    let level = match log_level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" => "error".to_string(),
        other => other.to_string(),
    };
    format!("{level},mobu_core=debug,mobu_jupyter_client=debug")
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if the default filter cannot be parsed from `log_level`.
pub fn init_logging(log_level: &str, log_to_file: bool, ansi: bool) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter(log_level))?,
    };

    INIT.call_once(|| {
        if log_to_file
            && let Some(proj_dirs) = ProjectDirs::from("com", "Mobu", "mobu")
            && test_write_permission(proj_dirs.cache_dir())
        {
            // rolling::daily panics instead of returning an error when the
            // directory turns out to be unwritable.
            let file_appender = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                tracing_appender::rolling::daily(proj_dirs.cache_dir(), LOG_FILE_PREFIX)
            }));

            if let Ok(file_appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                let subscriber = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(layer().with_writer(non_blocking).with_ansi(false));

                #[cfg(feature = "opentelemetry")]
                let subscriber = subscriber.with(init_otel());

                subscriber.init();
                // Leaked so buffered lines are flushed at exit.
                Box::leak(Box::new(guard));
                return;
            }
        }

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(layer().with_writer(stderr).with_ansi(ansi));

        #[cfg(feature = "opentelemetry")]
        let subscriber = subscriber.with(init_otel());

        subscriber.init();
    });

    Ok(())
}

#[cfg(feature = "opentelemetry")]
fn init_otel<S>() -> Option<tracing_opentelemetry::OpenTelemetryLayer<S, sdktrace::Tracer>>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(format!("{}/v1/traces", endpoint.trim_end_matches('/')))
        .build()
        .ok()?;

    let resource = Resource::builder().with_service_name("mobu").build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    let tracer = provider.tracer("mobu");

    Some(tracing_opentelemetry::layer().with_tracer(tracer))
}

/// Creates `dir` if needed and checks that a file can be written into it.
fn test_write_permission(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }

    let probe = dir.join(".mobu_log_test");
    match std::fs::write(&probe, "test") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_filter_lowercases_level() {
        assert_eq!(
            default_filter("INFO"),
            "info,mobu_core=debug,mobu_jupyter_client=debug"
        );
        assert!(default_filter("WARNING").starts_with("warn,"));
        assert!(default_filter("CRITICAL").starts_with("error,"));
    }

    #[test]
    fn write_permission_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        assert!(test_write_permission(&nested));
        assert!(nested.is_dir());
        assert!(!nested.join(".mobu_log_test").exists());
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_test_logging();
        init_test_logging();
        assert!(init_logging("debug", false, false).is_ok());
    }
}
