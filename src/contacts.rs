//! Tag creation scoped to the first contact in the list view
//!
//! Tag-by-tag failures are tolerated: each one is screenshotted, any stuck
//! dialog dismissed, and the loop moves on. Only one creation dialog is
//! ever in flight.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::backend::PageBackend;
use crate::config::Config;
use crate::driver::PageDriver;
use crate::error::{AutomationError, Result};
use crate::selectors::catalog;

pub struct ContactsPage<'a, B> {
    driver: &'a PageDriver<B>,
    contacts_url: String,
}

impl<'a, B: PageBackend> ContactsPage<'a, B> {
    pub fn new(driver: &'a PageDriver<B>, config: &Config) -> Self {
        Self {
            driver,
            contacts_url: config.contacts_url(),
        }
    }

    pub async fn go_to_contacts(&self) -> Result<()> {
        self.driver
            .navigate(&self.contacts_url, "contacts page")
            .await
    }

    /// Create the given tags on the first contact in the list
    pub async fn create_tags(&self, tags: &[&str]) -> Result<()> {
        info!("--- Creating tags ---");

        self.driver
            .navigate(&self.contacts_url, "contacts page")
            .await?;

        info!("Accessing the first contact to manage tags");
        if self
            .driver
            .wait_visible(
                &catalog::FIRST_CONTACT_ROW,
                Duration::from_secs(15),
                "contact list",
            )
            .await
            .is_err()
        {
            error!("Contact list did not load or is empty");
            self.driver.screenshot("error_contacts_list").await;
            return Ok(());
        }

        self.driver
            .click(&catalog::FIRST_CONTACT_ROW, "first contact row")
            .await?;
        // The side panel takes a moment to render
        self.driver.settle(Duration::from_secs(2)).await;

        if !self.open_tag_editor().await {
            return Ok(());
        }

        for &tag in tags {
            if self.driver.mode().is_dry_run() {
                info!(tag, "Dry-run: would add tag");
                continue;
            }

            if let Err(e) = self.add_tag(tag).await {
                error!(tag, error = %e, "Failed to add tag");
                self.driver
                    .screenshot(&format!("error_tag_{tag}"))
                    .await;
                // Dismiss whatever dialog is stuck before moving on
                let _ = self
                    .driver
                    .press_key("Escape", "dismiss a stuck dialog")
                    .await;
                self.driver.settle(Duration::from_millis(500)).await;
            }
        }

        self.save_tags().await;
        info!("Tag creation flow complete");
        Ok(())
    }

    /// Open the tag editor, falling back to a button near the "Etiquetas"
    /// label when the pencil selector misses
    async fn open_tag_editor(&self) -> bool {
        if self.driver.mode().is_dry_run() {
            let _ = self
                .driver
                .click(&catalog::TAGS_EDIT_ICON, "edit tags button")
                .await;
            return true;
        }

        if self
            .driver
            .exists(&catalog::TAGS_EDIT_ICON, Duration::from_secs(5))
            .await
        {
            return self
                .driver
                .click(&catalog::TAGS_EDIT_ICON, "edit tags button")
                .await
                .is_ok();
        }

        warn!("Edit tags button not found with the primary selector, trying the fallback");
        match self
            .driver
            .click(&catalog::TAGS_EDIT_FALLBACK, "edit tags button (fallback)")
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to open the tag editor");
                self.driver.screenshot("error_edit_tags_btn").await;
                false
            }
        }
    }

    async fn add_tag(&self, tag: &str) -> Result<()> {
        info!(tag, "Processing tag");

        // The popover can close after each save; reopen when needed
        if !self
            .driver
            .exists(&catalog::ADD_TAG_BTN, Duration::from_millis(500))
            .await
        {
            info!("Reopening the tag editor popover");
            self.driver
                .click(&catalog::TAGS_EDIT_ICON, "edit tags button")
                .await?;
            self.driver
                .wait_visible(
                    &catalog::ADD_TAG_BTN,
                    Duration::from_secs(5),
                    "add tag button",
                )
                .await?;
        }

        self.driver
            .click(&catalog::ADD_TAG_BTN, "add tag button")
            .await?;

        self.driver
            .wait_visible(&catalog::TAG_DIALOG, Duration::from_secs(7), "tag dialog")
            .await?;
        // Let the dialog animation finish before touching it
        self.driver.settle(Duration::from_millis(500)).await;

        // Dialogs stack; the newest one's input is last
        let inputs = self.driver.count(&catalog::TAG_NAME_INPUT).await?;
        let input_index = inputs.saturating_sub(1);

        self.driver
            .fill_nth(&catalog::TAG_NAME_INPUT, input_index, tag, "tag name input")
            .await?;

        let buttons = self.driver.count(&catalog::TAG_SAVE_BTN).await?;
        self.driver
            .click_nth(
                &catalog::TAG_SAVE_BTN,
                buttons.saturating_sub(1),
                "tag save button",
            )
            .await?;

        // The save must land before the next dialog opens
        self.driver
            .wait_hidden(&catalog::TAG_DIALOG, Duration::from_secs(10))
            .await
            .map_err(|_| {
                AutomationError::ActionFailed(format!("tag dialog did not close for '{tag}'"))
            })?;

        info!(tag, "Tag saved");
        self.driver.settle(Duration::from_millis(300)).await;
        Ok(())
    }

    /// Final "save tags" click; tolerated on failure
    async fn save_tags(&self) {
        info!("Clicking the final save tags control");

        let result = async {
            // Be sure the creation dialog is fully gone first
            let _ = self
                .driver
                .wait_hidden(&catalog::TAG_DIALOG, Duration::from_secs(5))
                .await;
            self.driver.settle(Duration::from_millis(500)).await;

            let candidates = self.driver.count(&catalog::TAG_FINAL_SAVE_BTN).await?;
            // A plain click gets intercepted by the popover overlay here,
            // so dispatch it at the DOM level.
            self.driver
                .js_click_nth(
                    &catalog::TAG_FINAL_SAVE_BTN,
                    candidates.saturating_sub(1),
                    "save tags control",
                )
                .await?;
            self.driver.settle(Duration::from_secs(2)).await;
            Ok::<_, AutomationError>(())
        }
        .await;

        if let Err(e) = result {
            error!(error = %e, "Failed to click the final save tags control");
            self.driver.screenshot("error_final_save_tags").await;
        }
    }
}
