//! # Tracing Setup
//!
//! Structured logging for the deployment tools. Reconciler and locator calls
//! open spans carrying the stack name or lookup tag, so the compact format
//! reads like `reconcile{stack_name="dev-vpc-stack"}: Stack absent, creating`.

use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber. Logs go to stderr so rendered templates
/// on stdout stay clean.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` when
/// `verbose` is true.
///
/// ```ignore
/// setup_tracing(false);
/// tracing::info!("Application started");
/// ```
pub fn setup_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
