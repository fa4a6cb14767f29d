use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "optcg_prices=info,tcgcsv_client=info,warn";

/// Install the global fmt subscriber. `RUST_LOG` wins over `default_filter`;
/// `verbose` adds file and line locations to every event.
pub fn init_tracing(default_filter: &str, verbose: bool) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}
