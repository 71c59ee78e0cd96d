//! Page Abstraction
//!
//! Element operations on a live CDP page. Everything the workflow needs is
//! expressed as small JavaScript snippets evaluated in the page, plus real
//! mouse events for clicks and `Input.insertText` for typing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cdp::{MouseButton, MouseEventType, Session};
use crate::driver::{ElementState, FrameMark};
use crate::error::{Error, Result};
use crate::locators::Locator;

/// Attribute used to tag rendered frames for staleness checks
const FRAME_ATTR: &str = "data-meterpay-frame";

/// Quote a string as a JavaScript literal
fn js_string(s: &str) -> String {
    // JSON strings are valid JS string literals
    Value::String(s.to_string()).to_string()
}

/// A browser page
pub struct Page {
    session: Session,
    next_mark: AtomicU64,
}

impl Page {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            session,
            next_mark: AtomicU64::new(1),
        }
    }

    /// Get the underlying CDP session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Navigate to a URL
    pub async fn goto(&self, url: &str) -> Result<()> {
        let result = self.session.navigate(url).await?;
        if let Some(error) = result.error_text {
            return Err(Error::Navigation(format!("{}: {}", url, error)));
        }
        Ok(())
    }

    /// Poll `document.readyState` until the document has loaded
    pub async fn wait_for_load(&self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            // The context may be mid-navigation; keep waiting
            if let Ok(state) = self.evaluate::<String>("document.readyState").await {
                if state == "complete" {
                    return Ok(());
                }
            }
            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "page did not finish loading within {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Evaluate JavaScript and deserialize the result; `null`/`undefined` map to JSON null
    pub async fn evaluate<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let evaluated = self.session.evaluate(expression).await?;
        if let Some(exception) = evaluated.exception_details {
            return Err(Error::Evaluation(format!(
                "{} at {}:{}",
                exception.message(),
                exception.line_number,
                exception.column_number
            )));
        }
        let value = evaluated.result.value.unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Click at viewport coordinates
    pub async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        self.session
            .dispatch_mouse_event(MouseEventType::MouseMoved, x, y, None, None)
            .await?;
        self.session
            .dispatch_mouse_event(
                MouseEventType::MousePressed,
                x,
                y,
                Some(MouseButton::Left),
                Some(1),
            )
            .await?;

        tokio::time::sleep(Duration::from_millis(50)).await;

        self.session
            .dispatch_mouse_event(
                MouseEventType::MouseReleased,
                x,
                y,
                Some(MouseButton::Left),
                Some(1),
            )
            .await
    }

    pub async fn probe(&self, locator: &Locator) -> Result<Option<ElementState>> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return null;
                const rect = el.getBoundingClientRect();
                const style = window.getComputedStyle(el);
                const visible = rect.width > 0 && rect.height > 0
                    && style.visibility !== 'hidden' && style.display !== 'none';
                const isField = el.tagName === 'INPUT' || el.tagName === 'TEXTAREA';
                const text = isField ? (el.value || '') : (el.innerText || el.textContent || '');
                const enabled = !el.disabled && el.getAttribute('aria-disabled') !== 'true';
                return {{ visible, enabled, text }};
            }})()"#,
            sel = js_string(&locator.selector())
        );
        self.evaluate(&js).await
    }

    pub async fn click(&self, locator: &Locator) -> Result<()> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return null;
                el.scrollIntoView({{ block: 'center', inline: 'center' }});
                const r = el.getBoundingClientRect();
                return [r.left + r.width / 2, r.top + r.height / 2];
            }})()"#,
            sel = js_string(&locator.selector())
        );
        let center: Option<(f64, f64)> = self.evaluate(&js).await?;
        let (x, y) = center.ok_or_else(|| Error::not_found(locator.to_string()))?;
        self.click_at(x, y).await
    }

    pub async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        self.click(locator).await?;

        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.focus();
                if (typeof el.select === 'function') el.select();
                el.value = '';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = js_string(&locator.selector())
        );
        let cleared: bool = self.evaluate(&js).await?;
        if !cleared {
            return Err(Error::not_found(locator.to_string()));
        }

        self.session.insert_text(text).await
    }

    pub async fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        let js = format!(
            r#"Array.from(document.querySelectorAll({sel}))
                .map(el => (el.innerText || el.textContent || '').trim())"#,
            sel = js_string(&locator.selector())
        );
        self.evaluate(&js).await
    }

    pub async fn mark_frame(&self, locator: &Locator) -> Result<Option<FrameMark>> {
        let mark = self.next_mark.fetch_add(1, Ordering::Relaxed);
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.setAttribute('{FRAME_ATTR}', '{mark}');
                return true;
            }})()"#,
            sel = js_string(&locator.selector())
        );
        let tagged: bool = self.evaluate(&js).await?;
        Ok(tagged.then_some(FrameMark(mark)))
    }

    pub async fn is_stale(&self, mark: &FrameMark) -> Result<bool> {
        let js = format!(
            r#"document.querySelector('[{FRAME_ATTR}="{}"]') === null"#,
            mark.0
        );
        self.evaluate(&js).await
    }
}
