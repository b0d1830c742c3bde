use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `Settings::log_level`; production emits JSON lines.
pub fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = if settings.is_production() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        // A subscriber is already installed (tests, embedding binaries).
        tracing::debug!("Tracing subscriber already initialized: {}", e);
    }
}
