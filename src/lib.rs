//! CRM account provisioning through browser automation
//!
//! This library drives a third-party web CRM to provision customer
//! accounts:
//! - Two-phase email + one-time-code login that can span process
//!   boundaries via an exported session state
//! - Account search and impersonation switch on the admin surface
//! - Pipeline panel ("board") creation with staged columns
//! - Contact tag creation
//!
//! A dry-run mode logs every intended action without touching the browser.

pub mod admin;
pub mod api;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod contacts;
pub mod driver;
pub mod error;
pub mod login;
pub mod panels;
pub mod runner;
pub mod selectors;
pub mod session;

pub use backend::{BackendError, CdpBackend, PageBackend};
pub use config::Config;
pub use driver::{PageDriver, RunMode};
pub use error::{AutomationError, Result};
pub use session::SessionState;

use std::path::Path;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
///
/// Console output always; file output only when the file can actually be
/// opened for append, otherwise a visible downgrade to console-only. Call
/// once at process start.
pub fn init_logging(log_file: Option<&Path>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crm_automation=info".into());

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    let file = log_file.map(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
    });

    match file {
        Some(Ok(file)) => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Arc::new(file)),
                )
                .init();
        }
        Some(Err(e)) => {
            registry.init();
            tracing::warn!(error = %e, "Log file not writable, logging to console only");
        }
        None => registry.init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Verify all public exports are accessible
        let _config = Config::default();
        let _mode = RunMode::default();
        let _state = SessionState::default();
    }
}
