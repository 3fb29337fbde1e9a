use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize the tracing subscriber once per process.
///
/// The filter can be overridden with `RUST_LOG`; the tidy runner logs
/// its progress and outcome at info/warn level.
pub fn init_tracing() {
    let _ = INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn"));
        let _ = tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter)
            .try_init();
    });
}
