//! Two-phase login handshake: email submission, then an out-of-band
//! one-time code
//!
//! Phase 1 (`initiate_login`) requests the code and returns control to the
//! caller; the code arrives minutes later, often in a different process.
//! Phase 2 (`submit_otp`) enters it. The legacy `login` composes both
//! around a blocking terminal prompt.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::backend::PageBackend;
use crate::driver::PageDriver;
use crate::error::{AutomationError, Result};
use crate::selectors::catalog;

/// Placeholder code used by dry-run instead of prompting
pub const DRY_RUN_CODE: &str = "000000";

/// Expected number of discrete single-digit code fields
const OTP_FIELDS: usize = 6;

pub struct LoginPage<'a, B> {
    driver: &'a PageDriver<B>,
}

impl<'a, B: PageBackend> LoginPage<'a, B> {
    pub fn new(driver: &'a PageDriver<B>) -> Self {
        Self { driver }
    }

    /// Phase 1: enter the email and request the verification code.
    ///
    /// Returns once the code input is expected on screen. A timeout on that
    /// final wait is logged but not fatal; the remote UI may already be
    /// showing the input.
    pub async fn initiate_login(&self, email: &str) -> Result<()> {
        info!(email, "Initiating login");

        if self
            .driver
            .exists(&catalog::LOGIN_START_BTN, Duration::from_secs(5))
            .await
        {
            self.driver
                .click(&catalog::LOGIN_START_BTN, "login entry button")
                .await?;
            self.driver.settle(Duration::from_secs(1)).await;
            self.driver
                .wait_visible(
                    &catalog::LOGIN_EMAIL_INPUT,
                    Duration::from_secs(10),
                    "email input",
                )
                .await?;
        }

        self.driver
            .fill(&catalog::LOGIN_EMAIL_INPUT, email, "email input")
            .await?;
        self.driver.settle(Duration::from_secs(2)).await;

        self.driver
            .click(&catalog::LOGIN_SUBMIT_BTN, "send code button")
            .await?;

        match self
            .driver
            .wait_visible(
                &catalog::LOGIN_CODE_INPUT,
                Duration::from_secs(10),
                "code input",
            )
            .await
        {
            Ok(()) => info!("Code input is visible, ready for phase 2"),
            Err(_) => warn!("Timed out waiting for the code input; check that the email was sent"),
        }

        Ok(())
    }

    /// Phase 2: enter the verification code and submit.
    ///
    /// Fails fast on an empty code, before any browser interaction. Success
    /// is not verified here; a rejected code surfaces when the post-login
    /// navigation fails.
    pub async fn submit_otp(&self, code: &str) -> Result<()> {
        if code.trim().is_empty() {
            return Err(AutomationError::InvalidInput(
                "verification code is required".to_string(),
            ));
        }

        info!("Submitting verification code");

        if let Err(e) = self.enter_code(code).await {
            error!(error = %e, "Error entering the verification code");
        }

        if self
            .driver
            .exists(&catalog::LOGIN_SUBMIT_OTP_BTN, Duration::from_secs(2))
            .await
        {
            self.driver
                .click(&catalog::LOGIN_SUBMIT_OTP_BTN, "code submit button")
                .await?;
        } else if self
            .driver
            .exists(&catalog::LOGIN_SUBMIT_BTN, Duration::from_secs(2))
            .await
        {
            self.driver
                .click(&catalog::LOGIN_SUBMIT_BTN, "sign-in button (fallback)")
                .await?;
        }

        info!("Login credential submission complete");
        self.driver.settle(Duration::from_secs(2)).await;
        Ok(())
    }

    /// Type the code into the widget, adapting to its shape.
    ///
    /// With 6 discrete digit fields and a 6-character code, each digit is
    /// typed into its own field with real key events and small delays (the
    /// widget listens for keystrokes, not value assignment). Any other
    /// combination falls back to filling the first field with the whole
    /// code.
    async fn enter_code(&self, code: &str) -> Result<()> {
        self.driver
            .wait_visible(
                &catalog::LOGIN_CODE_INPUT,
                Duration::from_secs(30),
                "code input",
            )
            .await?;

        let fields = self.driver.count(&catalog::LOGIN_CODE_INPUT).await?;

        if fields >= OTP_FIELDS && code.chars().count() == OTP_FIELDS {
            info!("Typing 6-digit code into discrete fields");
            for (i, digit) in code.chars().enumerate() {
                self.driver
                    .focus_nth(&catalog::LOGIN_CODE_INPUT, i, "code digit field")
                    .await?;
                self.driver.settle(Duration::from_millis(50)).await;
                self.driver
                    .type_chars(
                        &catalog::LOGIN_CODE_INPUT,
                        i,
                        &digit.to_string(),
                        Duration::from_millis(50),
                        "code digit field",
                    )
                    .await?;
                self.driver.settle(Duration::from_millis(150)).await;
            }
        } else {
            warn!(
                fields,
                code_len = code.len(),
                "Unexpected code widget shape, filling the first field"
            );
            self.driver
                .fill(&catalog::LOGIN_CODE_INPUT, code, "code input")
                .await?;
        }

        Ok(())
    }

    /// Legacy interactive flow: phase 1, a blocking terminal prompt for the
    /// code, then phase 2. Dry-run substitutes a placeholder code.
    pub async fn login(&self, email: &str) -> Result<()> {
        self.initiate_login(email).await?;

        info!("Waiting for the verification code; check your messages");
        let code = if self.driver.mode().is_dry_run() {
            info!(code = DRY_RUN_CODE, "Dry-run: using placeholder code");
            DRY_RUN_CODE.to_string()
        } else {
            prompt_for_code().await?
        };

        self.submit_otp(&code).await
    }
}

/// Blocking terminal read, off the async runtime
async fn prompt_for_code() -> Result<String> {
    tokio::task::spawn_blocking(|| {
        use std::io::Write;

        print!(">>> enter the verification code (2FA): ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok::<_, std::io::Error>(line.trim().to_string())
    })
    .await
    .map_err(|e| AutomationError::ActionFailed(format!("prompt task failed: {e}")))?
    .map_err(AutomationError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockPageBackend;
    use crate::driver::RunMode;
    use crate::selectors::Selector;
    use mockall::Sequence;

    fn driver(backend: MockPageBackend, mode: RunMode) -> PageDriver<MockPageBackend> {
        PageDriver::new(backend, mode, Duration::from_secs(5), "screenshots")
    }

    #[tokio::test]
    async fn test_empty_code_fails_before_any_browser_interaction() {
        // No expectations: any backend call panics.
        let driver = driver(MockPageBackend::new(), RunMode::Apply);
        let login = LoginPage::new(&driver);

        let err = login.submit_otp("").await.unwrap_err();
        assert!(matches!(err, AutomationError::InvalidInput(_)));

        let err = login.submit_otp("   ").await.unwrap_err();
        assert!(matches!(err, AutomationError::InvalidInput(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_six_fields_receive_one_digit_each_in_order() {
        let mut backend = MockPageBackend::new();

        backend.expect_count().returning(|sel: &Selector| {
            if *sel == catalog::LOGIN_CODE_INPUT {
                Ok(6)
            } else {
                Ok(1)
            }
        });
        backend.expect_is_visible().returning(|_, _| Ok(true));
        backend.expect_click().returning(|_, _| Ok(()));

        let mut seq = Sequence::new();
        for (i, digit) in "123456".chars().enumerate() {
            backend
                .expect_focus()
                .withf(move |sel, idx| *sel == catalog::LOGIN_CODE_INPUT && *idx == i)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
            backend
                .expect_type_chars()
                .withf(move |sel, idx, text, _| {
                    *sel == catalog::LOGIN_CODE_INPUT
                        && *idx == i
                        && text == digit.to_string()
                })
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _, _, _| Ok(()));
        }

        let driver = driver(backend, RunMode::Apply);
        let login = LoginPage::new(&driver);

        login.submit_otp("123456").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_widget_shape_falls_back_to_single_fill() {
        let mut backend = MockPageBackend::new();

        // A single combined field instead of 6 discrete ones
        backend.expect_count().returning(|_: &Selector| Ok(1));
        backend.expect_is_visible().returning(|_, _| Ok(true));
        backend.expect_click().returning(|_, _| Ok(()));
        backend.expect_focus().never();
        backend.expect_type_chars().never();
        backend
            .expect_fill()
            .withf(|sel, idx, value| {
                *sel == catalog::LOGIN_CODE_INPUT && *idx == 0 && value == "123456"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let driver = driver(backend, RunMode::Apply);
        let login = LoginPage::new(&driver);

        login.submit_otp("123456").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_four_char_code_with_six_fields_uses_single_fill() {
        let mut backend = MockPageBackend::new();

        backend.expect_count().returning(|_| Ok(6));
        backend.expect_is_visible().returning(|_, _| Ok(true));
        backend.expect_click().returning(|_, _| Ok(()));
        backend.expect_focus().never();
        backend
            .expect_fill()
            .withf(|_, _, value| value == "1234")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let driver = driver(backend, RunMode::Apply);
        let login = LoginPage::new(&driver);

        login.submit_otp("1234").await.unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_login_never_reaches_the_stub_page() {
        // No expectations: goto/click/fill would panic the test.
        let driver = driver(MockPageBackend::new(), RunMode::DryRun);
        let login = LoginPage::new(&driver);

        login.login("user@example.com").await.unwrap();
    }
}
