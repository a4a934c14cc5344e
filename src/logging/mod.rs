//! Structured logging: subscriber setup, correlation ids and alignment spans.

pub mod config;
pub mod spans;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

pub use config::LoggingConfig;
pub use spans::AlignmentSpan;

thread_local! {
    static CORRELATION_ID: std::cell::RefCell<Option<Uuid>> = const { std::cell::RefCell::new(None) };
}

/// Install the global subscriber. `RUST_LOG` overrides the configured levels.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directives()))?;

    let mut layers = Vec::new();
    let mut guard = None;

    if config.console_output {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(config.include_file_location)
            .with_file(config.include_file_location)
            .with_writer(std::io::stderr);
        layers.push(console_layer.boxed());
    }

    if let Some(ref log_dir) = config.log_directory {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "face-align.log");
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json();
        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    tracing::info!(?config, "Logging system initialized");
    Ok(guard)
}

/// Set a correlation ID for the current thread
pub fn set_correlation_id(id: Uuid) {
    CORRELATION_ID.with(|correlation_id| {
        *correlation_id.borrow_mut() = Some(id);
    });
}

/// Get the current correlation ID for this thread
pub fn get_correlation_id() -> Option<Uuid> {
    CORRELATION_ID.with(|correlation_id| *correlation_id.borrow())
}

/// Generate a new correlation ID and set it for the current thread
pub fn new_correlation_id() -> Uuid {
    let id = Uuid::new_v4();
    set_correlation_id(id);
    id
}

pub fn clear_correlation_id() {
    CORRELATION_ID.with(|correlation_id| {
        *correlation_id.borrow_mut() = None;
    });
}

/// Create a span with correlation ID automatically included
#[macro_export]
macro_rules! correlation_span {
    ($level:expr, $name:expr) => {
        if let Some(correlation_id) = $crate::logging::get_correlation_id() {
            tracing::span!($level, $name, correlation_id = %correlation_id)
        } else {
            tracing::span!($level, $name)
        }
    };
    ($level:expr, $name:expr, $($field:tt)*) => {
        if let Some(correlation_id) = $crate::logging::get_correlation_id() {
            tracing::span!($level, $name, correlation_id = %correlation_id, $($field)*)
        } else {
            tracing::span!($level, $name, $($field)*)
        }
    };
}
