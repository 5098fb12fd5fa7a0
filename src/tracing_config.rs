//! Tracing configuration.
//!
//! Output is controlled by two environment variables:
//!
//! - `KOLINT_LOG` (falls back to `RUST_LOG`): filter in `RUST_LOG` syntax,
//!   e.g. `debug` or `kolint_native::resolve=trace`.
//! - `KOLINT_LOG_FORMAT`: `text` (default) or `json`.
//!
//! ```bash
//! KOLINT_LOG=kolint_native::resolve=debug my-lint-driver views/
//! ```
//!
//! Nothing is installed unless one of the filter variables is set.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    /// Newline-delimited JSON objects.
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var("KOLINT_LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

fn build_filter() -> EnvFilter {
    if let Ok(val) = std::env::var("KOLINT_LOG") {
        EnvFilter::builder().parse_lossy(val)
    } else {
        EnvFilter::from_default_env()
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// A no-op when neither `KOLINT_LOG` nor `RUST_LOG` is set, or when a
/// subscriber is already installed.
pub fn init_tracing() {
    let has_kolint_log = std::env::var("KOLINT_LOG").is_ok();
    let has_rust_log = std::env::var("RUST_LOG").is_ok();
    if !has_kolint_log && !has_rust_log {
        return;
    }

    let filter = build_filter();
    let installed = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
