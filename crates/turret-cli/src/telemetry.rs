//! `tracing` subscriber setup for `turretd`, with an optional OTLP span
//! exporter.
//!
//! | Source | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter; falls back to `logging.level`. |
//! | `logging.format` / `TURRETD_LOG_FORMAT` | `compact` (default) or `json`. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` / `logging.otlp_endpoint` | Enables the OTLP/HTTP exporter. |

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. Hold the returned guard until exit so
/// pending spans are flushed.
pub fn init_tracing(service_name: &str, cfg: &LoggingConfig) -> TracerProviderGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let json = cfg.format == LogFormat::Json;

    let provider = otlp_endpoint(cfg).and_then(|endpoint| build_provider(service_name, endpoint));
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("turretd")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().compact()))
        .init();

    TracerProviderGuard(provider)
}

/// Shuts the OTel provider down on drop, flushing pending spans.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("turretd: OpenTelemetry shutdown error: {e}");
        }
    }
}

fn otlp_endpoint(cfg: &LoggingConfig) -> Option<String> {
    std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .or_else(|| cfg.otlp_endpoint.clone())
        .filter(|endpoint| !endpoint.is_empty())
}

fn build_provider(service_name: &str, endpoint: String) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("turretd: OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // Simple exporter: the tokio runtime does not exist yet at init time.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_falls_back_to_config() {
        // SAFETY: single-threaded test; no other thread reads this env-var.
        unsafe { std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT") };
        let mut cfg = LoggingConfig::default();
        assert_eq!(otlp_endpoint(&cfg), None);

        cfg.otlp_endpoint = Some("http://collector:4318".to_string());
        assert_eq!(otlp_endpoint(&cfg).as_deref(), Some("http://collector:4318"));

        cfg.otlp_endpoint = Some(String::new());
        assert_eq!(otlp_endpoint(&cfg), None);
    }

    #[test]
    fn guard_without_provider_drops_cleanly() {
        drop(TracerProviderGuard(None));
    }
}
