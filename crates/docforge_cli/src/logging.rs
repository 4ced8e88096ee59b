//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::GlobalArgs;

/// Returns the default filter directive for the global verbosity flags.
///
/// `--quiet` wins over `--verbose`.
pub fn default_directive(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "docforge_cache=debug,docforge_cli=debug,info"
    } else {
        "info"
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the verbosity flags.
pub fn init(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(global)));

    let layer = fmt::layer()
        .with_target(global.verbose)
        .with_ansi(global.color)
        .with_writer(std::io::stderr);

    // A subscriber installed by an embedding process takes precedence.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}
