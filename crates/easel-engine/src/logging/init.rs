use std::sync::Once;

use log::LevelFilter;

/// Logger configuration.
///
/// Filters use the `env_logger` syntax ("warn", "easel_engine=debug,wgpu=warn").
/// Resolution order: `env_filter`, then `RUST_LOG`, then `default_level`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub default_level: LevelFilter,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: LevelFilter::Info,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    /// Config with an explicit filter, ignoring `RUST_LOG`.
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            env_filter: Some(filter.into()),
            ..Self::default()
        }
    }

    fn builder(&self, rust_log: Option<String>) -> env_logger::Builder {
        let mut builder = env_logger::Builder::new();
        match self.env_filter.clone().or(rust_log) {
            Some(filter) => builder.parse_filters(&filter),
            None => builder.filter_level(self.default_level),
        };
        builder.write_style(self.write_style);
        builder
    }
}

static INIT: Once = Once::new();

/// Installs the global logger once; later calls do nothing.
///
/// Renderer warnings (stack underflow, missing capabilities, unsupported
/// blend modes) go through `log`, so hosts that want to see them call this
/// early in `main`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = config.builder(std::env::var("RUST_LOG").ok());

        // A host that already installed a logger keeps it.
        if builder.try_init().is_err() {
            log::debug!("logger already installed; easel logging config ignored");
            return;
        }

        log::debug!("logging initialized");
    });
}
