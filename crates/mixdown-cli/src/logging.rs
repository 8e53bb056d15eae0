//! Log output for the CLI.
//!
//! Logs go to stderr so `--json` output on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over the verbosity flag.

use tracing_subscriber::EnvFilter;

/// Default filter without `-v`.
pub const DEFAULT_FILTER: &str = "warn";
/// Default filter with `-v`.
pub const VERBOSE_FILTER: &str = "mixdown_spec=debug,mixdown_render=debug,mixdown_cli=debug,info";

/// Returns the filter directive for a verbosity flag.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Installs the global subscriber. Calling this twice is a no-op.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
