//! Browser lifecycle and the fixed provisioning sequence
//!
//! One browser, one page, driven strictly sequentially: login, account
//! switch, panels, tags. The browser is closed on every exit path.

use std::path::PathBuf;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::admin::AdminPage;
use crate::backend::CdpBackend;
use crate::catalog;
use crate::config::Config;
use crate::contacts::ContactsPage;
use crate::driver::{PageDriver, RunMode};
use crate::error::{AutomationError, Result};
use crate::login::LoginPage;
use crate::panels::PanelsPage;
use crate::session::SessionState;

/// Which part of the run to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Phase 1: request the code, save the session, exit
    InitAuth,

    /// Phase 2: restore the session, submit the code, provision
    CompleteAuth,

    /// Interactive: both phases with a terminal prompt in between
    Full,
}

/// Per-run options resolved from the CLI
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub account_name: String,
    pub email: String,
    pub mode: RunMode,
    pub headless: bool,
    pub step: Step,
    pub code: Option<String>,
    pub auth_file: PathBuf,
}

/// A launched browser plus the page driver over it
pub struct Automation {
    browser: Browser,
    handler_task: JoinHandle<()>,
    driver: PageDriver<CdpBackend>,
    config: Config,
}

impl Automation {
    pub async fn launch(config: Config, mode: RunMode, headless: bool) -> Result<Self> {
        info!("Launching browser");

        let mut builder = BrowserConfig::builder()
            .viewport(Viewport {
                width: 1366,
                height: 900,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: false,
                has_touch: false,
            })
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage");

        if !headless {
            builder = builder.with_head();
        }

        let browser_config = builder.build().map_err(AutomationError::Browser)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AutomationError::Browser(e.to_string()))?;

        // Drain CDP events for the lifetime of the browser
        let handler_task = tokio::task::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AutomationError::Browser(e.to_string()))?;

        let driver = PageDriver::new(
            CdpBackend::new(page),
            mode,
            config.default_timeout,
            config.screenshot_dir.clone(),
        );

        info!("Browser launched successfully");

        Ok(Self {
            browser,
            handler_task,
            driver,
            config,
        })
    }

    pub fn driver(&self) -> &PageDriver<CdpBackend> {
        &self.driver
    }

    /// Phase 1: request the code and export the session state
    pub async fn init_auth(&self, email: &str) -> Result<SessionState> {
        let login = LoginPage::new(&self.driver);

        self.driver
            .navigate(&self.config.login_url(), "login page")
            .await?;
        login.initiate_login(email).await?;

        let state = SessionState::capture(self.driver.backend()).await?;
        info!("Session captured, waiting for the verification code");
        Ok(state)
    }

    /// Phase 2: restore the session, re-enter the email, submit the code,
    /// then provision.
    ///
    /// The email is re-submitted even with a restored session: the remote
    /// UI re-derives the code screen from a fresh submission, and repeating
    /// it is safe.
    pub async fn complete_auth(
        &self,
        email: &str,
        code: &str,
        account_name: &str,
        state: Option<SessionState>,
    ) -> Result<()> {
        let login = LoginPage::new(&self.driver);

        if let Some(state) = &state {
            state.apply_cookies(self.driver.backend()).await?;
        }

        self.driver
            .navigate(&self.config.login_url(), "login page")
            .await?;

        if let Some(state) = &state {
            state.apply_storage(self.driver.backend()).await?;
        }

        login.initiate_login(email).await?;
        login.submit_otp(code).await?;

        self.provision(account_name).await
    }

    /// Interactive flow: prompt for the code mid-run
    pub async fn full_run(&self, email: &str, account_name: &str) -> Result<()> {
        let login = LoginPage::new(&self.driver);

        self.driver
            .navigate(&self.config.login_url(), "login page")
            .await?;
        login.login(email).await?;

        self.provision(account_name).await
    }

    /// Post-login sequence: account switch, panels, tags
    async fn provision(&self, account_name: &str) -> Result<()> {
        let admin = AdminPage::new(&self.driver, &self.config);
        let panels = PanelsPage::new(&self.driver, &self.config);
        let contacts = ContactsPage::new(&self.driver, &self.config);

        admin.access_account(account_name).await?;

        panels.go_to_panels().await?;
        panels.create_all_panels(&catalog::default_panels()).await?;

        contacts.go_to_contacts().await?;
        contacts.create_tags(&catalog::DEFAULT_TAGS).await?;

        info!("Automation successfully completed");
        Ok(())
    }

    /// Best-effort failure screenshot into the configured directory
    pub async fn capture_failure(&self) {
        let name = format!("error_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"));
        self.driver.screenshot(&name).await;
    }

    pub async fn shutdown(mut self) {
        info!("Closing browser");
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close the browser cleanly");
        }
        self.handler_task.abort();
    }
}

/// Run one CLI step end to end, releasing the browser on every path
pub async fn run(config: Config, opts: RunOptions) -> Result<()> {
    let automation = Automation::launch(config, opts.mode, opts.headless).await?;

    let result = run_inner(&automation, &opts).await;

    if result.is_err() && !opts.mode.is_dry_run() {
        automation.capture_failure().await;
    }
    automation.shutdown().await;

    result
}

async fn run_inner(automation: &Automation, opts: &RunOptions) -> Result<()> {
    match opts.step {
        Step::InitAuth => {
            let state = automation.init_auth(&opts.email).await?;
            state.save(&opts.auth_file)?;
            info!(
                file = %opts.auth_file.display(),
                "Phase 1 complete; rerun with --step complete-auth --code <code>"
            );
            Ok(())
        }
        Step::CompleteAuth => {
            let code = opts.code.clone().ok_or_else(|| {
                AutomationError::InvalidInput(
                    "--code is required for the complete-auth step".to_string(),
                )
            })?;

            let state = match SessionState::load(&opts.auth_file) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!(
                        file = %opts.auth_file.display(),
                        error = %e,
                        "Session state not restored, starting fresh (login may fail)"
                    );
                    None
                }
            };

            automation
                .complete_auth(&opts.email, &code, &opts.account_name, state)
                .await
        }
        Step::Full => automation.full_run(&opts.email, &opts.account_name).await,
    }
}
