use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace, Resource};
use std::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Flushes exported spans when the script ends.
pub struct TelemetryGuard {
    otel: bool,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.otel {
            opentelemetry::global::shutdown_tracer_provider();
        }
    }
}

/// Console logging for every binary. `RUST_LOG` filters (default `info`),
/// `LOG_FORMAT=json` switches to JSON lines, and `OTEL_EXPORTER_OTLP_ENDPOINT`
/// adds OTLP span export.
pub fn init(service: &'static str) -> Result<TelemetryGuard> {
    let otel = match env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) if !endpoint.is_empty() => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(
                    trace::config()
                        .with_resource(Resource::new(vec![KeyValue::new("service.name", service)])),
                )
                .install_batch(runtime::Tokio)
                .context("failed to install OTLP exporter")?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        _ => None,
    };
    let exporting = otel.is_some();

    let json = env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let plain_layer = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::ChronoLocal::rfc_3339())
            .with_ansi(true)
    });
    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_timer(fmt::time::ChronoLocal::rfc_3339())
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(plain_layer)
        .with(json_layer)
        .with(otel)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(TelemetryGuard { otel: exporting })
}
