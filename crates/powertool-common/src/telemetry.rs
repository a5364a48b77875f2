//! Logging, tracing and metrics setup for the operator process
//!
//! Logs always go to stdout. OTLP export of spans and metrics is enabled by
//! `OTEL_EXPORTER_OTLP_ENDPOINT`; the returned [`TelemetryGuard`] flushes both
//! on shutdown.

use std::str::FromStr;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,powertool=debug,kube=info,tower=warn,hyper=warn";

/// Telemetry setup failures
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Span exporter could not be built
    #[error("failed to initialize tracer: {0}")]
    TracerInit(String),

    /// Metric exporter could not be built
    #[error("failed to initialize metrics exporter: {0}")]
    MetricsInit(String),

    /// A global subscriber was already installed
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),

    /// Unrecognized log format name
    #[error("unknown log format '{0}', expected json or text")]
    UnknownLogFormat(String),
}

/// Shape of log lines on stdout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable lines for local runs
    Text,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "pretty" => Ok(Self::Text),
            other => Err(TelemetryError::UnknownLogFormat(other.to_string())),
        }
    }
}

/// Telemetry settings
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `service.name` of exported spans and metrics
    pub service_name: String,
    /// OTLP gRPC endpoint; `None` keeps telemetry in the log stream
    pub otlp_endpoint: Option<String>,
    /// Log line format
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "powertool-operator".to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|e| !e.is_empty()),
            log_format: LogFormat::Json,
        }
    }
}

/// Owns the OTLP providers so buffered spans and metrics can be flushed
#[derive(Default)]
pub struct TelemetryGuard {
    tracer: Option<TracerProvider>,
    meter: Option<SdkMeterProvider>,
}

impl TelemetryGuard {
    /// Whether OTLP export is active
    pub fn is_exporting(&self) -> bool {
        self.tracer.is_some()
    }

    /// Flush and stop exporters
    pub fn shutdown(self) {
        if let Some(tracer) = self.tracer {
            if let Err(e) = tracer.shutdown() {
                eprintln!("failed to flush spans: {}", e);
            }
        }
        if let Some(meter) = self.meter {
            if let Err(e) = meter.shutdown() {
                eprintln!("failed to flush metrics: {}", e);
            }
        }
    }
}

/// Install the global subscriber, and OTLP exporters when an endpoint is set
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let mut guard = TelemetryGuard::default();
    let otel_layer = match &config.otlp_endpoint {
        Some(endpoint) => {
            let resource = build_resource(&config.service_name);
            let meter = meter_provider(endpoint, resource.clone())?;
            global::set_meter_provider(meter.clone());
            let tracer = tracer_provider(endpoint, resource)?;
            global::set_tracer_provider(tracer.clone());

            let layer = tracing_opentelemetry::layer()
                .with_tracer(tracer.tracer(config.service_name.clone()));
            guard = TelemetryGuard {
                tracer: Some(tracer),
                meter: Some(meter),
            };
            Some(layer)
        }
        None => None,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (json, text) = match config.log_format {
        LogFormat::Json => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
            None,
        ),
        LogFormat::Text => (None, Some(tracing_subscriber::fmt::layer().compact())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    Ok(guard)
}

/// Resource attributes: service identity plus pod identity from the
/// downward API
fn build_resource(service_name: &str) -> Resource {
    let mut attributes = vec![
        KeyValue::new(SERVICE_NAME, service_name.to_string()),
        KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
    ];
    attributes.extend(
        [
            ("POD_NAME", "k8s.pod.name"),
            ("POD_NAMESPACE", "k8s.namespace.name"),
            ("NODE_NAME", "k8s.node.name"),
        ]
        .into_iter()
        .filter_map(|(var, key)| std::env::var(var).ok().map(|v| KeyValue::new(key, v))),
    );
    Resource::new(attributes)
}

fn tracer_provider(endpoint: &str, resource: Resource) -> Result<TracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(resource)
        .build())
}

fn meter_provider(endpoint: &str, resource: Resource) -> Result<SdkMeterProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    Ok(SdkMeterProvider::builder()
        .with_reader(PeriodicReader::builder(exporter, runtime::Tokio).build())
        .with_resource(resource)
        .build())
}
