use std::sync::Once;

use log::LevelFilter;

/// How [`init_logging`] sets up `env_logger`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter in `env_logger` syntax, e.g. `"ferrogl=debug"`. Falls back to
    /// `RUST_LOG`, then to `info`.
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Lowers `ferrogl::resource` to `trace` on top of the filter above,
    /// which shows every native handle as it is created and released.
    pub native_calls: bool,
    /// Routes output through the test harness capture.
    pub test_capture: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            native_calls: false,
            test_capture: cfg!(test),
        }
    }
}

static INIT: Once = Once::new();

/// Installs `env_logger` the first time it is called; later calls do nothing.
/// If another logger is already installed, that logger stays.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        match config.env_filter.or_else(|| std::env::var("RUST_LOG").ok()) {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => {
                builder.filter_level(LevelFilter::Info);
            }
        }
        if config.native_calls {
            builder.filter_module("ferrogl::resource", LevelFilter::Trace);
        }
        builder.write_style(config.write_style).is_test(config.test_capture);

        if builder.try_init().is_ok() {
            log::debug!("ferrogl logging ready (native call tracing: {})", config.native_calls);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_is_harmless() {
        init_logging(LoggingConfig { native_calls: true, ..Default::default() });
        init_logging(LoggingConfig { env_filter: Some("off".into()), ..Default::default() });
        log::info!("still logging");
    }
}
