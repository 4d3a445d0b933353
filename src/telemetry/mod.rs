//! Logging and OpenTelemetry setup.
//!
//! Always logs to stderr through tracing-subscriber. When an OTLP endpoint
//! is configured, traces, metrics and logs are exported there as well.

pub mod metrics;
pub mod work;

use crate::error::{Error, Result};
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;

/// Configuration for telemetry initialization.
pub struct TelemetryConfig {
    /// Optional OTLP endpoint (e.g. "http://localhost:4317").
    /// When `None`, only the stderr fmt layer is installed.
    pub endpoint: Option<String>,
    /// The service name reported in telemetry signals.
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is not set (e.g. "info").
    pub default_filter: String,
}

/// The three OTLP pipelines, exported over gRPC.
struct OtlpProviders {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
    logger: SdkLoggerProvider,
}

/// Flushes and shuts down the OTel pipelines on drop.
///
/// Hold it for the lifetime of the process; without an endpoint it is inert.
pub struct TelemetryGuard {
    providers: Option<OtlpProviders>,
}

impl TelemetryGuard {
    /// Force-flush all telemetry pipelines.
    pub fn force_flush(&self) {
        if let Some(ref p) = self.providers {
            let _ = p.tracer.force_flush();
            let _ = p.meter.force_flush();
            let _ = p.logger.force_flush();
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        // Reverse of construction order.
        if let Some(p) = self.providers.take() {
            let _ = p.logger.shutdown();
            let _ = p.meter.shutdown();
            let _ = p.tracer.shutdown();
        }
    }
}

fn build_otlp_providers(endpoint: &str, service_name: String) -> Result<OtlpProviders> {
    use opentelemetry_otlp::WithExportConfig as _;

    let exporter_err = |signal: &str, e: opentelemetry_otlp::ExporterBuildError| {
        Error::Other(format!("failed to create OTLP {signal} exporter: {e}"))
    };

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(service_name)
        .build();

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| exporter_err("span", e))?;
    let tracer = SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .with_resource(resource.clone())
        .build();

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| exporter_err("metric", e))?;
    let meter = SdkMeterProvider::builder()
        .with_periodic_exporter(metric_exporter)
        .with_resource(resource.clone())
        .build();
    opentelemetry::global::set_meter_provider(meter.clone());

    let log_exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| exporter_err("log", e))?;
    let logger = SdkLoggerProvider::builder()
        .with_batch_exporter(log_exporter)
        .with_resource(resource)
        .build();

    Ok(OtlpProviders {
        tracer,
        meter,
        logger,
    })
}

/// Initialize logging, plus OTLP export when an endpoint is configured.
///
/// # Errors
///
/// Returns an error if an OTLP exporter fails to build or a global tracing
/// subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let subscriber_err = |e: tracing_subscriber::util::TryInitError| {
        Error::Other(format!("failed to init tracing subscriber: {e}"))
    };

    let Some(endpoint) = config.endpoint else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(subscriber_err)?;
        return Ok(TelemetryGuard { providers: None });
    };

    let providers = build_otlp_providers(&endpoint, config.service_name)?;
    let otel_trace_layer =
        tracing_opentelemetry::layer().with_tracer(providers.tracer.tracer("workitem-agent"));
    let otel_log_layer =
        opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&providers.logger);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .with(otel_trace_layer)
        .with(otel_log_layer)
        .try_init()
        .map_err(subscriber_err)?;

    Ok(TelemetryGuard {
        providers: Some(providers),
    })
}
