use std::sync::Once;

/// Filter used when neither the config nor `RUST_LOG` provides one.
///
/// wgpu's internals are chatty at `info`; keep them at `warn` unless asked.
const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "debug",
/// "umbra_engine=trace,wgpu=warn").
///
/// `write_style` controls ANSI coloring behavior.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Explicit config wins over `RUST_LOG`, which wins over [`DEFAULT_FILTER`].
fn resolve_filter(configured: Option<String>, from_env: Option<String>) -> String {
    configured
        .or(from_env)
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned())
}

/// Initializes the global logger once.
///
/// Subsequent calls are ignored, so tools and tests may call this freely.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        let filter = resolve_filter(config.env_filter, std::env::var("RUST_LOG").ok());
        builder.parse_filters(&filter);

        builder.write_style(config.write_style);

        // A second logger may already be installed by a host application.
        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized");
    });
}
