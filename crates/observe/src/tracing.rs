use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// `env_filter` uses the `tracing_subscriber::EnvFilter` directive syntax,
/// e.g. `info` or `warn,json_exporter=debug`. May only be called once.
pub fn initialize(env_filter: &str) {
    let filter = EnvFilter::try_new(env_filter)
        .unwrap_or_else(|err| panic!("invalid log filter {env_filter:?}: {err}"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
