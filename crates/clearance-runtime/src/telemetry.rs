//! Diagnostic tracing for the clearance gate.
//!
//! Call [`init_tracing`] once at process startup and keep the returned
//! [`TracerProviderGuard`] until exit.
//!
//! # What gets traced
//!
//! | Source | Kind | Level |
//! |---|---|---|
//! | [`Poller`](crate::poller::Poller) | `poll_cycle` span around every status read and tick | `INFO` |
//! | `clearance_kernel` | stage transitions and resets (`from`, `to`, `reason` fields) | `DEBUG` |
//! | `clearance_memory::journal` | every operator-facing event, target `clearance::events` | matches the event severity |
//! | `clearance_runtime::poller` | source unavailable / skipped tick | `WARN` |
//!
//! With an OTLP endpoint configured, each `poll_cycle` span is exported and
//! the kernel's transition events appear as span events inside it.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP/HTTP collector base URL (e.g. `http://localhost:4318`). |
//! | `RUST_LOG` | Filter directives (default `info`). `clearance_kernel=debug` shows transitions. |
//! | `CLEARANCE_LOG_FORMAT` | `json` for newline-delimited JSON, anything else for compact text. |
//!
//! # Example
//!
//! ```rust,no_run
//! let mut guard = clearance_runtime::telemetry::init_tracing("clearance");
//! // … run the gate …
//! guard.shutdown();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting the console log format.
pub const LOG_FORMAT_ENV: &str = "CLEARANCE_LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "info";

/// Instrumentation scope name reported to the collector.
const TRACER_NAME: &str = "clearance";

/// Console output format for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// Interpret the value of [`LOG_FORMAT_ENV`].
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }

    fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Install the global subscriber: env filter, optional OTLP layer, console
/// formatter.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let provider = build_provider(service_name);
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(TRACER_NAME)));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(otel_layer)
        .with(console_layer(LogFormat::from_env()))
        .init();

    TracerProviderGuard(provider)
}

// ─────────────────────────────────────────────────────────────────────────────
// RAII guard
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the OTel [`SdkTracerProvider`]; flushes pending spans on shutdown.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// Flush and shut the provider down.  Later calls, and the eventual drop,
    /// do nothing.
    ///
    /// Call this before `std::process::exit`, which skips destructors.
    pub fn shutdown(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[clearance] OpenTelemetry provider shutdown error: {e}");
        }
    }

    /// `true` while spans are still being exported.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn console_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
    }
}

/// Build the provider when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.  `None`
/// means console-only output.
fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[clearance] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // Built before the tokio runtime exists, so no batch exporter.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}
