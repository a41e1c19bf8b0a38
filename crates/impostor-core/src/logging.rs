use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,impostor=debug,wgpu_core=warn,wgpu_hal=warn,naga=warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global fmt subscriber.
///
/// # Panics
///
/// Panics if a global subscriber is already installed. Use [`try_init`] where
/// that can happen (tests, embedding hosts).
pub fn init() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Like [`init`], but returns `false` instead of panicking when a subscriber
/// is already installed.
pub fn try_init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init()
        .is_ok()
}
