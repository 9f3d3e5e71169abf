//! Page backend: the seam between page drivers and the browser engine
//!
//! [`PageBackend`] captures every operation the drivers need from a live
//! page; [`CdpBackend`] implements it over a chromiumoxide [`Page`]. Tests
//! substitute a mock or a recording stub.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType,
};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use serde_json::Value;
use thiserror::Error;

use crate::selectors::Selector;

/// Backend errors
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("No element matched {0}")]
    NotFound(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Browser command failed: {0}")]
    Cdp(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Operations the page drivers need from a live page.
///
/// Elements are addressed as `(selector, index)` into the ordered match
/// list. Mutating methods dispatch real input events; `js_click` is the one
/// deliberate exception, for controls that sit under an overlay.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageBackend: Send + Sync {
    async fn goto(&self, url: &str) -> BackendResult<()>;

    async fn current_url(&self) -> BackendResult<String>;

    /// Number of elements currently matching the selector
    async fn count(&self, selector: &Selector) -> BackendResult<usize>;

    async fn is_visible(&self, selector: &Selector, index: usize) -> BackendResult<bool>;

    async fn click(&self, selector: &Selector, index: usize) -> BackendResult<()>;

    /// DOM-level click dispatch, bypassing hit testing
    async fn js_click(&self, selector: &Selector, index: usize) -> BackendResult<()>;

    /// Clear the element and type the value
    async fn fill(&self, selector: &Selector, index: usize, value: &str) -> BackendResult<()>;

    /// Type character by character with a delay between keystrokes
    async fn type_chars(
        &self,
        selector: &Selector,
        index: usize,
        text: &str,
        key_delay: Duration,
    ) -> BackendResult<()>;

    async fn focus(&self, selector: &Selector, index: usize) -> BackendResult<()>;

    /// Dispatch a key press at the page level (no element focus change)
    async fn press_page_key(&self, key: &str) -> BackendResult<()>;

    async fn scroll_into_view(&self, selector: &Selector, index: usize) -> BackendResult<()>;

    /// Scroll the element's own scroll container by `dy` pixels
    async fn scroll_by(&self, selector: &Selector, index: usize, dy: i64) -> BackendResult<()>;

    /// Current `value` property of a form element
    async fn read_value(&self, selector: &Selector, index: usize) -> BackendResult<String>;

    async fn screenshot(&self, path: &Path) -> BackendResult<()>;

    async fn cookies(&self) -> BackendResult<Vec<Value>>;

    async fn set_cookies(&self, cookies: Vec<Value>) -> BackendResult<()>;

    /// localStorage entries of the current origin
    async fn local_storage(&self) -> BackendResult<Vec<(String, String)>>;

    async fn set_local_storage(&self, entries: &[(String, String)]) -> BackendResult<()>;
}

/// Chromiumoxide-backed implementation of [`PageBackend`]
pub struct CdpBackend {
    page: Page,
    tag_seq: AtomicU64,
}

impl CdpBackend {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            tag_seq: AtomicU64::new(0),
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    fn cdp_err(e: impl std::fmt::Display) -> BackendError {
        BackendError::Cdp(e.to_string())
    }

    /// Quote a string as a JavaScript literal
    fn js_quote(s: &str) -> String {
        serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
    }

    /// JavaScript expression evaluating to the ordered array of matches
    fn js_collect(selector: &Selector) -> String {
        match selector {
            Selector::Css(css) => {
                format!(
                    "Array.from(document.querySelectorAll({}))",
                    Self::js_quote(css)
                )
            }
            Selector::Text(text) => {
                // Deepest elements whose normalized text equals the value.
                format!(
                    "(() => {{ \
                       const t = {}.replace(/\\s+/g, ' ').trim(); \
                       const all = Array.from(document.querySelectorAll('*')); \
                       const hits = all.filter(el => ((el.textContent || '').replace(/\\s+/g, ' ').trim()) === t); \
                       return hits.filter(el => !hits.some(other => other !== el && el.contains(other))); \
                     }})()",
                    Self::js_quote(text)
                )
            }
            Selector::CssWithText(css, text) => {
                format!(
                    "(() => {{ \
                       const t = {}.toLowerCase(); \
                       return Array.from(document.querySelectorAll({})) \
                         .filter(el => (el.textContent || '').toLowerCase().includes(t)); \
                     }})()",
                    Self::js_quote(text),
                    Self::js_quote(css)
                )
            }
            Selector::Near { css, text, anchor } => {
                // Climb from each element holding the anchor text until an
                // ancestor contains a candidate match.
                format!(
                    "(() => {{ \
                       const needle = {}.toLowerCase(); \
                       const t = {}.toLowerCase(); \
                       const leaves = Array.from(document.querySelectorAll('*')) \
                         .filter(el => el.children.length === 0 && (el.textContent || '').toLowerCase().includes(needle)); \
                       const out = []; \
                       for (const leaf of leaves) {{ \
                         let node = leaf.parentElement; \
                         while (node) {{ \
                           const hits = Array.from(node.querySelectorAll({})) \
                             .filter(el => t === '' || (el.textContent || '').toLowerCase().includes(t)); \
                           if (hits.length > 0) {{ \
                             for (const h of hits) {{ if (!out.includes(h)) out.push(h); }} \
                             break; \
                           }} \
                           if (node === document.body) break; \
                           node = node.parentElement; \
                         }} \
                       }} \
                       return out; \
                     }})()",
                    Self::js_quote(anchor),
                    Self::js_quote(text),
                    Self::js_quote(css)
                )
            }
        }
    }

    async fn eval_value(&self, expression: &str) -> BackendResult<Value> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(Self::cdp_err)?;

        result.into_value().map_err(Self::cdp_err)
    }

    /// Resolve `(selector, index)` to a native element handle.
    ///
    /// CSS selectors go through `querySelectorAll` directly. The other
    /// variants are located in-page, marked with a unique attribute, then
    /// re-found by that attribute so native input events target the right
    /// node. The marker is removed immediately after.
    async fn element(&self, selector: &Selector, index: usize) -> BackendResult<Element> {
        if let Selector::Css(css) = selector {
            let elements = self
                .page
                .find_elements(css.as_ref())
                .await
                .map_err(Self::cdp_err)?;
            return elements
                .into_iter()
                .nth(index)
                .ok_or_else(|| BackendError::NotFound(selector.to_string()));
        }

        let tag = format!("autom-{}", self.tag_seq.fetch_add(1, Ordering::Relaxed));
        let marked = self
            .eval_value(&format!(
                "(() => {{ const els = {}; const el = els[{}]; if (!el) return false; \
                 el.setAttribute('data-autom-tag', {}); return true; }})()",
                Self::js_collect(selector),
                index,
                Self::js_quote(&tag)
            ))
            .await?;

        if marked != Value::Bool(true) {
            return Err(BackendError::NotFound(selector.to_string()));
        }

        let element = self
            .page
            .find_element(format!("[data-autom-tag=\"{tag}\"]"))
            .await
            .map_err(|_| BackendError::NotFound(selector.to_string()))?;

        let _ = self
            .eval_value(
                "(() => { const els = document.querySelectorAll('[data-autom-tag]'); \
                 els.forEach(el => el.removeAttribute('data-autom-tag')); return els.length; })()",
            )
            .await;

        Ok(element)
    }
}

#[async_trait]
impl PageBackend for CdpBackend {
    async fn goto(&self, url: &str) -> BackendResult<()> {
        self.page.goto(url).await.map_err(Self::cdp_err)?;
        // Let the SPA settle its initial render
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn current_url(&self) -> BackendResult<String> {
        self.page
            .url()
            .await
            .map_err(Self::cdp_err)?
            .ok_or_else(|| BackendError::Cdp("page has no URL".to_string()))
    }

    async fn count(&self, selector: &Selector) -> BackendResult<usize> {
        let value = self
            .eval_value(&format!("({}).length", Self::js_collect(selector)))
            .await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn is_visible(&self, selector: &Selector, index: usize) -> BackendResult<bool> {
        let value = self
            .eval_value(&format!(
                "(() => {{ const el = ({})[{}]; if (!el) return false; \
                 const r = el.getBoundingClientRect(); \
                 return !!(r.width || r.height) && getComputedStyle(el).visibility !== 'hidden'; }})()",
                Self::js_collect(selector),
                index
            ))
            .await?;
        Ok(value == Value::Bool(true))
    }

    async fn click(&self, selector: &Selector, index: usize) -> BackendResult<()> {
        let element = self.element(selector, index).await?;
        element.click().await.map_err(Self::cdp_err)?;
        // Small delay after click
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    }

    async fn js_click(&self, selector: &Selector, index: usize) -> BackendResult<()> {
        let value = self
            .eval_value(&format!(
                "(() => {{ const el = ({})[{}]; if (!el) return false; el.click(); return true; }})()",
                Self::js_collect(selector),
                index
            ))
            .await?;
        if value != Value::Bool(true) {
            return Err(BackendError::NotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn fill(&self, selector: &Selector, index: usize, value: &str) -> BackendResult<()> {
        let element = self.element(selector, index).await?;

        element.click().await.map_err(Self::cdp_err)?;
        element
            .press_key("Control+a")
            .await
            .map_err(Self::cdp_err)?;
        element.press_key("Backspace").await.map_err(Self::cdp_err)?;
        element.type_str(value).await.map_err(Self::cdp_err)?;

        Ok(())
    }

    async fn type_chars(
        &self,
        selector: &Selector,
        index: usize,
        text: &str,
        key_delay: Duration,
    ) -> BackendResult<()> {
        let element = self.element(selector, index).await?;
        element.click().await.map_err(Self::cdp_err)?;

        for ch in text.chars() {
            element
                .type_str(ch.to_string())
                .await
                .map_err(Self::cdp_err)?;
            tokio::time::sleep(key_delay).await;
        }
        Ok(())
    }

    async fn focus(&self, selector: &Selector, index: usize) -> BackendResult<()> {
        let value = self
            .eval_value(&format!(
                "(() => {{ const el = ({})[{}]; if (!el) return false; el.focus(); return true; }})()",
                Self::js_collect(selector),
                index
            ))
            .await?;
        if value != Value::Bool(true) {
            return Err(BackendError::NotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn press_page_key(&self, key: &str) -> BackendResult<()> {
        let vk: i64 = match key {
            "Enter" => 13,
            "Escape" => 27,
            "PageDown" => 34,
            _ => 0,
        };

        let mut down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyDown)
            .key(key)
            .windows_virtual_key_code(vk)
            .native_virtual_key_code(vk);
        if key == "Enter" {
            down = down.text("\r");
        }

        self.page
            .execute(down.build().map_err(BackendError::Cdp)?)
            .await
            .map_err(Self::cdp_err)?;

        self.page
            .execute(
                DispatchKeyEventParams::builder()
                    .r#type(DispatchKeyEventType::KeyUp)
                    .key(key)
                    .windows_virtual_key_code(vk)
                    .native_virtual_key_code(vk)
                    .build()
                    .map_err(BackendError::Cdp)?,
            )
            .await
            .map_err(Self::cdp_err)?;

        Ok(())
    }

    async fn scroll_into_view(&self, selector: &Selector, index: usize) -> BackendResult<()> {
        let value = self
            .eval_value(&format!(
                "(() => {{ const el = ({})[{}]; if (!el) return false; \
                 el.scrollIntoView({{block: 'center', behavior: 'auto'}}); return true; }})()",
                Self::js_collect(selector),
                index
            ))
            .await?;
        if value != Value::Bool(true) {
            return Err(BackendError::NotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn scroll_by(&self, selector: &Selector, index: usize, dy: i64) -> BackendResult<()> {
        let value = self
            .eval_value(&format!(
                "(() => {{ const el = ({})[{}]; if (!el) return false; \
                 el.scrollTop += {dy}; return true; }})()",
                Self::js_collect(selector),
                index
            ))
            .await?;
        if value != Value::Bool(true) {
            return Err(BackendError::NotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn read_value(&self, selector: &Selector, index: usize) -> BackendResult<String> {
        let value = self
            .eval_value(&format!(
                "(() => {{ const el = ({})[{}]; return el ? (el.value ?? '') : ''; }})()",
                Self::js_collect(selector),
                index
            ))
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&self, path: &Path) -> BackendResult<()> {
        let params = CaptureScreenshotParams::builder().build();
        let data = self.page.screenshot(params).await.map_err(Self::cdp_err)?;
        std::fs::write(path, &data).map_err(Self::cdp_err)?;
        Ok(())
    }

    async fn cookies(&self) -> BackendResult<Vec<Value>> {
        let cookies = self.page.get_cookies().await.map_err(Self::cdp_err)?;
        cookies
            .into_iter()
            .map(|c| serde_json::to_value(c).map_err(Self::cdp_err))
            .collect()
    }

    async fn set_cookies(&self, cookies: Vec<Value>) -> BackendResult<()> {
        let params: Vec<CookieParam> = cookies
            .iter()
            .filter_map(cookie_param_from_value)
            .collect();
        if params.is_empty() {
            return Ok(());
        }
        self.page.set_cookies(params).await.map_err(Self::cdp_err)?;
        Ok(())
    }

    async fn local_storage(&self) -> BackendResult<Vec<(String, String)>> {
        let value = self
            .eval_value(
                "(() => { const out = []; \
                 for (let i = 0; i < localStorage.length; i++) { \
                   const k = localStorage.key(i); out.push([k, localStorage.getItem(k)]); } \
                 return out; })()",
            )
            .await?;
        serde_json::from_value(value).map_err(Self::cdp_err)
    }

    async fn set_local_storage(&self, entries: &[(String, String)]) -> BackendResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut script = String::from("(() => { ");
        for (key, value) in entries {
            script.push_str(&format!(
                "localStorage.setItem({}, {}); ",
                Self::js_quote(key),
                Self::js_quote(value)
            ));
        }
        script.push_str("return true; })()");
        self.eval_value(&script).await?;
        Ok(())
    }
}

/// Rebuild a cookie parameter from a captured cookie value.
///
/// The capture side serializes the CDP cookie objects verbatim; only the
/// fields the set-cookie command understands are carried back. Expiry is
/// not restored, which leaves restored cookies session-scoped; the
/// handshake completes well within one browser lifetime.
fn cookie_param_from_value(value: &Value) -> Option<CookieParam> {
    let name = value.get("name")?.as_str()?.to_string();
    let cookie_value = value.get("value")?.as_str()?.to_string();

    let mut cookie = CookieParam::new(name, cookie_value);
    cookie.domain = value
        .get("domain")
        .and_then(Value::as_str)
        .map(str::to_string);
    cookie.path = value
        .get("path")
        .and_then(Value::as_str)
        .map(str::to_string);
    cookie.secure = value.get("secure").and_then(Value::as_bool);
    cookie.http_only = value.get("httpOnly").and_then(Value::as_bool);

    Some(cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::catalog;

    #[test]
    fn test_js_quote_escapes() {
        assert_eq!(CdpBackend::js_quote("plain"), "\"plain\"");
        assert_eq!(CdpBackend::js_quote("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn test_js_collect_css() {
        let js = CdpBackend::js_collect(&catalog::FIRST_CONTACT_ROW);
        assert_eq!(
            js,
            "Array.from(document.querySelectorAll(\"tbody tr:first-child\"))"
        );
    }

    #[test]
    fn test_js_collect_text_is_quoted() {
        let js = CdpBackend::js_collect(&catalog::NEW_PANEL_BTN);
        assert!(js.contains("\"Novo painel\""));
        assert!(js.contains("querySelectorAll('*')"));
    }

    #[test]
    fn test_cookie_param_round_trip() {
        let value = serde_json::json!({
            "name": "session",
            "value": "abc123",
            "domain": ".crm.infinitegear.app",
            "path": "/",
            "secure": true,
            "httpOnly": true,
            "expires": 1_900_000_000.0,
            "size": 13,
            "session": false
        });

        let param = cookie_param_from_value(&value).expect("cookie should convert");
        assert_eq!(param.name, "session");
        assert_eq!(param.value, "abc123");
        assert_eq!(param.domain.as_deref(), Some(".crm.infinitegear.app"));
    }

    #[test]
    fn test_cookie_param_requires_name_and_value() {
        assert!(cookie_param_from_value(&serde_json::json!({"value": "x"})).is_none());
        assert!(cookie_param_from_value(&serde_json::json!({"name": "x"})).is_none());
    }
}
