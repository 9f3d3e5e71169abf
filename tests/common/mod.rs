//! Shared test support: a recording stub backend
//!
//! Records every backend call as a readable line and answers with benign
//! defaults, so driver flows can run without a browser.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crm_automation::backend::{BackendResult, PageBackend};
use crm_automation::selectors::{catalog, Selector};

pub struct StubBackend {
    calls: Mutex<Vec<String>>,
    /// Reported number of discrete OTP fields
    pub otp_fields: usize,
}

impl StubBackend {
    pub fn new(otp_fields: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            otp_fields,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PageBackend for StubBackend {
    async fn goto(&self, url: &str) -> BackendResult<()> {
        self.record(format!("goto {url}"));
        Ok(())
    }

    async fn current_url(&self) -> BackendResult<String> {
        self.record("current_url".to_string());
        Ok("https://crm.infinitegear.app/login".to_string())
    }

    async fn count(&self, selector: &Selector) -> BackendResult<usize> {
        self.record(format!("count {selector}"));
        if *selector == catalog::LOGIN_CODE_INPUT {
            Ok(self.otp_fields)
        } else {
            Ok(1)
        }
    }

    async fn is_visible(&self, selector: &Selector, index: usize) -> BackendResult<bool> {
        self.record(format!("is_visible {selector} [{index}]"));
        Ok(true)
    }

    async fn click(&self, selector: &Selector, index: usize) -> BackendResult<()> {
        self.record(format!("click {selector} [{index}]"));
        Ok(())
    }

    async fn js_click(&self, selector: &Selector, index: usize) -> BackendResult<()> {
        self.record(format!("js_click {selector} [{index}]"));
        Ok(())
    }

    async fn fill(&self, selector: &Selector, index: usize, value: &str) -> BackendResult<()> {
        self.record(format!("fill {selector} [{index}] {value:?}"));
        Ok(())
    }

    async fn type_chars(
        &self,
        selector: &Selector,
        index: usize,
        text: &str,
        _key_delay: Duration,
    ) -> BackendResult<()> {
        self.record(format!("type_chars {selector} [{index}] {text:?}"));
        Ok(())
    }

    async fn focus(&self, selector: &Selector, index: usize) -> BackendResult<()> {
        self.record(format!("focus {selector} [{index}]"));
        Ok(())
    }

    async fn press_page_key(&self, key: &str) -> BackendResult<()> {
        self.record(format!("press_page_key {key}"));
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &Selector, index: usize) -> BackendResult<()> {
        self.record(format!("scroll_into_view {selector} [{index}]"));
        Ok(())
    }

    async fn scroll_by(&self, selector: &Selector, index: usize, dy: i64) -> BackendResult<()> {
        self.record(format!("scroll_by {selector} [{index}] {dy}"));
        Ok(())
    }

    async fn read_value(&self, selector: &Selector, index: usize) -> BackendResult<String> {
        self.record(format!("read_value {selector} [{index}]"));
        Ok(String::new())
    }

    async fn screenshot(&self, path: &Path) -> BackendResult<()> {
        self.record(format!("screenshot {}", path.display()));
        Ok(())
    }

    async fn cookies(&self) -> BackendResult<Vec<Value>> {
        self.record("cookies".to_string());
        Ok(vec![serde_json::json!({"name": "sid", "value": "42"})])
    }

    async fn set_cookies(&self, cookies: Vec<Value>) -> BackendResult<()> {
        self.record(format!("set_cookies {}", cookies.len()));
        Ok(())
    }

    async fn local_storage(&self) -> BackendResult<Vec<(String, String)>> {
        self.record("local_storage".to_string());
        Ok(vec![("token".to_string(), "abc".to_string())])
    }

    async fn set_local_storage(&self, entries: &[(String, String)]) -> BackendResult<()> {
        self.record(format!("set_local_storage {}", entries.len()));
        Ok(())
    }
}
