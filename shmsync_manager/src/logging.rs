use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the fmt subscriber. `RUST_LOG` wins over `verbose`.
///
/// Library crates log through `log`; `init` also installs the bridge that
/// forwards those records here.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "shmsync=debug" } else { "shmsync=info" };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
