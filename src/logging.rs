//! Structured logs on stderr.
//!
//! Filter directives come from `REDINSIGHT_LOG`, then `RUST_LOG`, then the
//! `info` default. An unparseable value falls through to the next source.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "REDINSIGHT_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Installs the global subscriber. A second call is a no-op.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(std::env::var(LOG_ENV).ok()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_env_filter(project_directives: Option<String>) -> EnvFilter {
    if let Some(filter) = project_directives
        .as_deref()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
    {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(DEFAULT_DIRECTIVE)
}
