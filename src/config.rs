//! Environment-backed configuration

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://crm.infinitegear.app";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the target CRM
    pub base_url: String,

    /// Default login email (CRM_EMAIL)
    pub email: Option<String>,

    /// Default per-operation timeout
    pub default_timeout: Duration,

    /// Directory for failure screenshots
    pub screenshot_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            email: None,
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_DIR),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let base_url = std::env::var("CRM_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let email = std::env::var("CRM_EMAIL").ok().filter(|s| !s.is_empty());

        let timeout_ms = std::env::var("CRM_DEFAULT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
            default_timeout: Duration::from_millis(timeout_ms),
            screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_DIR),
        }
    }

    /// Resolve the login email: CLI flag first, then CRM_EMAIL
    pub fn resolve_email(&self, cli_email: Option<String>) -> Option<String> {
        cli_email
            .filter(|s| !s.is_empty())
            .or_else(|| self.email.clone())
    }

    pub fn login_url(&self) -> String {
        format!("{}/login", self.base_url)
    }

    pub fn partner_admin_url(&self) -> String {
        format!("{}/admin/company/partner", self.base_url)
    }

    pub fn panels_url(&self) -> String {
        format!("{}/panels", self.base_url)
    }

    pub fn contacts_url(&self) -> String {
        format!("{}/contacts", self.base_url)
    }
}
