//! Guarded page-automation primitives shared by all page drivers
//!
//! Every mutating primitive describes itself, logs its intent, and routes
//! through a single dispatch point that consults the run mode once. Lookup
//! timeouts surface as [`AutomationError::ElementNotFound`], anything else
//! as [`AutomationError::ActionFailed`]. Probes (`exists`, `count`) never
//! mutate and report absence in dry-run.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::{BackendError, PageBackend};
use crate::error::{AutomationError, Result};
use crate::selectors::Selector;

/// Execution mode, injected once at the root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Perform actions against the live page
    #[default]
    Apply,

    /// Log intended actions without touching the browser
    DryRun,
}

impl RunMode {
    pub fn is_dry_run(self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

/// A mutating page action, described before execution
enum PageAction<'a> {
    Navigate {
        url: &'a str,
    },
    Click {
        selector: &'a Selector,
        index: usize,
    },
    JsClick {
        selector: &'a Selector,
        index: usize,
    },
    Fill {
        selector: &'a Selector,
        index: usize,
        value: &'a str,
    },
    TypeChars {
        selector: &'a Selector,
        index: usize,
        text: &'a str,
        key_delay: Duration,
    },
    Focus {
        selector: &'a Selector,
        index: usize,
    },
    PressPageKey {
        key: &'a str,
    },
    ScrollIntoView {
        selector: &'a Selector,
        index: usize,
    },
    ScrollBy {
        selector: &'a Selector,
        index: usize,
        dy: i64,
    },
}

/// Poll interval for bounded visibility waits
const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Base page driver wrapping a [`PageBackend`]
pub struct PageDriver<B> {
    backend: B,
    mode: RunMode,
    default_timeout: Duration,
    screenshot_dir: PathBuf,
}

impl<B: PageBackend> PageDriver<B> {
    pub fn new(
        backend: B,
        mode: RunMode,
        default_timeout: Duration,
        screenshot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            mode,
            default_timeout,
            screenshot_dir: screenshot_dir.into(),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Single execution gate for every mutating primitive
    async fn dispatch(&self, intent: String, action: PageAction<'_>) -> Result<()> {
        info!("{intent}");
        if self.mode.is_dry_run() {
            return Ok(());
        }

        let result = match action {
            PageAction::Navigate { url } => self.backend.goto(url).await,
            PageAction::Click { selector, index } => self.backend.click(selector, index).await,
            PageAction::JsClick { selector, index } => {
                self.backend.js_click(selector, index).await
            }
            PageAction::Fill {
                selector,
                index,
                value,
            } => self.backend.fill(selector, index, value).await,
            PageAction::TypeChars {
                selector,
                index,
                text,
                key_delay,
            } => {
                self.backend
                    .type_chars(selector, index, text, key_delay)
                    .await
            }
            PageAction::Focus { selector, index } => self.backend.focus(selector, index).await,
            PageAction::PressPageKey { key } => self.backend.press_page_key(key).await,
            PageAction::ScrollIntoView { selector, index } => {
                self.backend.scroll_into_view(selector, index).await
            }
            PageAction::ScrollBy {
                selector,
                index,
                dy,
            } => self.backend.scroll_by(selector, index, dy).await,
        };

        result.map_err(|e| classify(&intent, e))
    }

    pub async fn navigate(&self, url: &str, description: &str) -> Result<()> {
        self.dispatch(
            format!("Navigating to {description} ({url})"),
            PageAction::Navigate { url },
        )
        .await
    }

    pub async fn click(&self, selector: &Selector, description: &str) -> Result<()> {
        self.click_nth(selector, 0, description).await
    }

    pub async fn click_nth(
        &self,
        selector: &Selector,
        index: usize,
        description: &str,
    ) -> Result<()> {
        self.dispatch(
            format!("Clicking {description} ({selector})"),
            PageAction::Click { selector, index },
        )
        .await
    }

    pub async fn js_click_nth(
        &self,
        selector: &Selector,
        index: usize,
        description: &str,
    ) -> Result<()> {
        self.dispatch(
            format!("Clicking {description} via DOM dispatch ({selector})"),
            PageAction::JsClick { selector, index },
        )
        .await
    }

    pub async fn fill(&self, selector: &Selector, value: &str, description: &str) -> Result<()> {
        self.fill_nth(selector, 0, value, description).await
    }

    pub async fn fill_nth(
        &self,
        selector: &Selector,
        index: usize,
        value: &str,
        description: &str,
    ) -> Result<()> {
        self.dispatch(
            format!(
                "Filling {description} with '{}' ({selector})",
                mask_value(description, value)
            ),
            PageAction::Fill {
                selector,
                index,
                value,
            },
        )
        .await
    }

    pub async fn type_chars(
        &self,
        selector: &Selector,
        index: usize,
        text: &str,
        key_delay: Duration,
        description: &str,
    ) -> Result<()> {
        self.dispatch(
            format!(
                "Typing '{}' into {description} ({selector})",
                mask_value(description, text)
            ),
            PageAction::TypeChars {
                selector,
                index,
                text,
                key_delay,
            },
        )
        .await
    }

    pub async fn focus_nth(
        &self,
        selector: &Selector,
        index: usize,
        description: &str,
    ) -> Result<()> {
        self.dispatch(
            format!("Focusing {description} ({selector})"),
            PageAction::Focus { selector, index },
        )
        .await
    }

    pub async fn press_key(&self, key: &str, description: &str) -> Result<()> {
        self.dispatch(
            format!("Pressing {key} to {description}"),
            PageAction::PressPageKey { key },
        )
        .await
    }

    pub async fn scroll_into_view(&self, selector: &Selector, description: &str) -> Result<()> {
        self.scroll_into_view_nth(selector, 0, description).await
    }

    pub async fn scroll_into_view_nth(
        &self,
        selector: &Selector,
        index: usize,
        description: &str,
    ) -> Result<()> {
        self.dispatch(
            format!("Scrolling {description} into view ({selector})"),
            PageAction::ScrollIntoView { selector, index },
        )
        .await
    }

    pub async fn scroll_by(
        &self,
        selector: &Selector,
        index: usize,
        dy: i64,
        description: &str,
    ) -> Result<()> {
        self.dispatch(
            format!("Scrolling {description} by {dy}px ({selector})"),
            PageAction::ScrollBy {
                selector,
                index,
                dy,
            },
        )
        .await
    }

    /// Bounded visibility probe; never raises.
    ///
    /// In dry-run there is no live DOM to consult, so the probe reports
    /// absent without touching the backend.
    pub async fn exists(&self, selector: &Selector, timeout: Duration) -> bool {
        debug!("Checking presence of {selector}");
        if self.mode.is_dry_run() {
            return false;
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let visible = match self.backend.count(selector).await {
                Ok(n) if n > 0 => self.backend.is_visible(selector, 0).await.unwrap_or(false),
                _ => false,
            };
            if visible {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    /// Wait until the selector has a visible match
    pub async fn wait_visible(
        &self,
        selector: &Selector,
        timeout: Duration,
        description: &str,
    ) -> Result<()> {
        if self.mode.is_dry_run() {
            debug!("Skipping wait for {description} ({selector})");
            return Ok(());
        }
        if self.exists(selector, timeout).await {
            Ok(())
        } else {
            Err(AutomationError::ElementNotFound(format!(
                "{description} ({selector}) not visible within {timeout:?}"
            )))
        }
    }

    /// Wait until the selector has no visible match
    pub async fn wait_hidden(&self, selector: &Selector, timeout: Duration) -> Result<()> {
        if self.mode.is_dry_run() {
            return Ok(());
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let visible = match self.backend.count(selector).await {
                Ok(n) if n > 0 => self.backend.is_visible(selector, 0).await.unwrap_or(false),
                _ => false,
            };
            if !visible {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AutomationError::ElementNotFound(format!(
                    "{selector} still visible after {timeout:?}"
                )));
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    /// Number of current matches; zero in dry-run
    pub async fn count(&self, selector: &Selector) -> Result<usize> {
        if self.mode.is_dry_run() {
            return Ok(0);
        }
        self.backend
            .count(selector)
            .await
            .map_err(|e| classify(&format!("counting {selector}"), e))
    }

    /// Current `value` of a form element; empty in dry-run
    pub async fn read_value(&self, selector: &Selector, index: usize) -> Result<String> {
        if self.mode.is_dry_run() {
            return Ok(String::new());
        }
        self.backend
            .read_value(selector, index)
            .await
            .map_err(|e| classify(&format!("reading {selector}"), e))
    }

    /// Fixed settle pause, skipped in dry-run
    pub async fn settle(&self, duration: Duration) {
        if self.mode.is_dry_run() {
            return;
        }
        tokio::time::sleep(duration).await;
    }

    /// Best-effort diagnostic screenshot into the configured directory
    pub async fn screenshot(&self, name: &str) -> Option<PathBuf> {
        if self.mode.is_dry_run() {
            return None;
        }

        if let Err(e) = std::fs::create_dir_all(&self.screenshot_dir) {
            warn!(error = %e, "could not create the screenshot directory");
            return None;
        }

        let safe_name: String = name
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        let path = self.screenshot_dir.join(format!("{safe_name}.png"));

        match self.backend.screenshot(&path).await {
            Ok(()) => {
                info!("Screenshot saved to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "failed to capture a screenshot");
                None
            }
        }
    }
}

fn classify(intent: &str, error: BackendError) -> AutomationError {
    match error {
        BackendError::NotFound(s) | BackendError::Timeout(s) => {
            AutomationError::ElementNotFound(format!("{intent}: {s}"))
        }
        BackendError::Cdp(s) => AutomationError::ActionFailed(format!("{intent}: {s}")),
    }
}

/// Mask values whose field description marks them as sensitive
fn mask_value<'a>(description: &str, value: &'a str) -> &'a str {
    let description = description.to_lowercase();
    if description.contains("code") || description.contains("password") {
        "***"
    } else {
        value
    }
}
