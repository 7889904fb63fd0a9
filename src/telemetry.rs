use tracing_subscriber::EnvFilter;

/// install a compact fmt subscriber filtered by `RUST_LOG` (default `info`).
/// safe to call more than once; later calls leave the first subscriber in place
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .compact()
        .try_init();
}
