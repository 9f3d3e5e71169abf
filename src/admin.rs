//! Account search and impersonation switch on the admin partner page
//!
//! Failures here propagate: nothing downstream makes sense if the switch
//! did not happen.

use std::borrow::Cow;
use std::time::Duration;

use tracing::info;

use crate::backend::PageBackend;
use crate::config::Config;
use crate::driver::PageDriver;
use crate::error::Result;
use crate::selectors::{catalog, Selector};

/// Operator identity selected in the access modal
pub const OPERATOR_PROFILE: &str = "Dr. Daniel Dorta - SuperAdmin";

pub struct AdminPage<'a, B> {
    driver: &'a PageDriver<B>,
    partner_url: String,
}

impl<'a, B: PageBackend> AdminPage<'a, B> {
    pub fn new(driver: &'a PageDriver<B>, config: &Config) -> Self {
        Self {
            driver,
            partner_url: config.partner_admin_url(),
        }
    }

    /// Search the account by name and switch into it as the fixed operator
    /// profile.
    ///
    /// There is no positive confirmation of the switch; the fixed settle at
    /// the end plus loud failure of the next navigation stand in for one.
    pub async fn access_account(&self, account_name: &str) -> Result<()> {
        self.driver
            .navigate(&self.partner_url, "admin partner page")
            .await?;

        // Per-character typing so the frontend's input-change detection
        // sees the search term.
        self.driver
            .click(&catalog::ADMIN_SEARCH_INPUT, "account search input")
            .await?;
        self.driver
            .type_chars(
                &catalog::ADMIN_SEARCH_INPUT,
                0,
                account_name,
                Duration::from_millis(100),
                "account search input",
            )
            .await?;
        self.driver.press_key("Enter", "submit account search").await?;

        // Wait for the result list XHR to land
        self.driver.settle(Duration::from_secs(2)).await;

        self.driver
            .click(&catalog::ACCESS_BTN, "account access button")
            .await?;

        info!("Waiting for the access modal");
        self.driver
            .wait_visible(
                &catalog::ACCESS_MODAL_TITLE,
                Duration::from_secs(10),
                "access modal",
            )
            .await?;

        self.driver
            .click(&catalog::ACCESS_MODAL_SEARCH, "profile search input")
            .await?;
        self.driver
            .type_chars(
                &catalog::ACCESS_MODAL_SEARCH,
                0,
                OPERATOR_PROFILE,
                Duration::from_millis(50),
                "profile search input",
            )
            .await?;
        self.driver.press_key("Enter", "submit profile search").await?;
        self.driver.settle(Duration::from_secs(1)).await;

        // The confirm button sits on the filtered profile's row
        let confirm = Selector::Near {
            css: Cow::Borrowed("button"),
            text: Cow::Borrowed("Acessar"),
            anchor: Cow::Borrowed(OPERATOR_PROFILE),
        };
        self.driver.click(&confirm, "confirm access button").await?;

        // Dashboard switch has no completion signal; give it time
        self.driver.settle(Duration::from_secs(5)).await;

        info!(account = account_name, "Account access initiated");
        Ok(())
    }
}
