use std::path::Path;
use tracing::subscriber::set_global_default;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Install the global subscriber: console output always, plus a daily-rolling
/// JSON file when `log_dir` is given. `RUST_LOG` takes precedence over `log_level`.
///
/// Never log passwords, hashes or contact details through these layers.
pub fn init_logging(log_dir: Option<&Path>, log_level: &str) -> anyhow::Result<()> {
    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "telemedicine.log");
            Some(
                fmt::layer()
                    .json()
                    .with_writer(file_appender)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = Registry::default()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer);

    set_global_default(subscriber)?;

    tracing::info!("Logging initialized with level: {}", log_level);

    Ok(())
}
