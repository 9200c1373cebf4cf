use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Send engine diagnostics to stderr so stdout stays machine-readable.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init(level: &str) {
    let default_filter = format!("fund_waterfall_cli={level},fund_waterfall_core={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init();
}
