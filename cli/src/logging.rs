use tracing_subscriber::EnvFilter;

/// Send logs to stderr. `RUST_LOG` wins over the `-v` count.
pub fn init_logging(verbose: u8, no_color: bool) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(verbose >= 2)
        .init();

    tracing::trace!("args: {:?}", std::env::args().collect::<Vec<_>>());
}
