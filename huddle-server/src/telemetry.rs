//! Process-wide logging and metrics.
//!
//! `RUST_LOG` wins over `logging.level` when it is set, so operators can raise verbosity
//! for one module without touching the configuration file.

use std::sync::OnceLock;

use axum::{
    Extension,
    http::{HeaderValue, header},
    response::IntoResponse,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use shared::config::server::{Config, LogFormat, LoggingConfig};
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, MakeWriter},
};

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

fn filter_for(logging: &LoggingConfig) -> EnvFilter {
    let fallback = logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::builder()
            .with_default_directive(fallback.into())
            .from_env_lossy(),
    }
}

/// Builds the subscriber for `logging`, writing to `writer`.
fn subscriber<W>(logging: &LoggingConfig, writer: W) -> Box<dyn tracing::Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::fmt()
        .with_env_filter(filter_for(logging))
        .with_target(false)
        .with_thread_names(false)
        .with_writer(writer);
    match logging.format {
        LogFormat::Json => Box::new(base.json().with_ansi(false).finish()),
        LogFormat::Text => Box::new(base.with_ansi(true).finish()),
    }
}

/// Installs the global subscriber. Returns `false` when one was already installed.
pub fn init_logging(config: &Config) -> bool {
    let installed =
        tracing::subscriber::set_global_default(subscriber(&config.logging, std::io::stdout))
            .is_ok();
    if !installed {
        warn!("a global tracing subscriber is already installed");
    }
    installed
}

/// Handle to the Prometheus recorder, installed the first time it is requested.
pub fn metrics_handle() -> PrometheusHandle {
    RECORDER
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                warn!("metrics recorder already set; the scrape endpoint may be empty");
            }
            handle
        })
        .clone()
}

/// `GET /metrics` in the Prometheus text format.
pub async fn scrape(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static(PROMETHEUS_TEXT))],
        handle.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::config::server::Profile;
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn log_once(format: LogFormat) -> String {
        let mut logging = Config::default_for_profile(Profile::Dev).logging;
        logging.format = format;
        let captured = Captured::default();
        let dispatch = tracing::Dispatch::new(subscriber(&logging, captured.clone()));
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!(conversation_id = "c-1", "message stored");
        });
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn json_format_emits_structured_fields() {
        let output = log_once(LogFormat::Json);
        let line = output.lines().next().unwrap();
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["fields"]["message"], "message stored");
        assert_eq!(value["fields"]["conversation_id"], "c-1");
    }

    #[test]
    fn text_format_is_human_readable() {
        let output = log_once(LogFormat::Text);
        assert!(output.contains("message stored"));
        assert!(serde_json::from_str::<serde_json::Value>(output.trim()).is_err());
    }

    #[test]
    fn unknown_levels_fall_back_to_info() {
        let logging = LoggingConfig {
            level: "chatty".into(),
            format: LogFormat::Text,
        };
        let rendered = filter_for(&logging).to_string();
        assert!(rendered.contains("info") || std::env::var("RUST_LOG").is_ok());
    }
}
