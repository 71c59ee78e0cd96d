//! CDP Connection/Session Management
//!
//! A [`Connection`] speaks to the browser target; a [`Session`] is attached to
//! one page target and carries the page-level commands.

use std::sync::Arc;
use std::time::Duration;

use super::transport::Transport;
use super::types::*;
use crate::error::Result;

/// Grace period for the browser to exit on its own
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// A CDP connection to the browser
pub struct Connection {
    transport: Arc<Transport>,
}

impl Connection {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Get browser version info
    pub async fn version(&self) -> Result<BrowserVersion> {
        self.transport.call(None, &BrowserGetVersion {}).await
    }

    /// Open a new tab and attach a flattened session to it
    pub async fn open_page(&self, url: &str) -> Result<Session> {
        let target = self
            .transport
            .call(
                None,
                &TargetCreateTarget {
                    url: url.to_string(),
                },
            )
            .await?;

        let attached = self
            .transport
            .call(
                None,
                &TargetAttachToTarget {
                    target_id: target.target_id.clone(),
                    flatten: true,
                },
            )
            .await?;

        Ok(Session {
            transport: Arc::clone(&self.transport),
            session_id: attached.session_id,
            target_id: target.target_id,
        })
    }

    /// Ask the browser to exit, then make sure the process is gone
    pub async fn close(&self) -> Result<()> {
        let command = BrowserClose {};
        let close = self.transport.call(None, &command);
        match tokio::time::timeout(CLOSE_GRACE, close).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::debug!("Browser.close failed, killing process: {}", e),
            Err(_) => tracing::debug!("Browser.close unanswered, killing process"),
        }
        self.transport.shutdown().await
    }
}

/// A CDP session attached to a specific target
pub struct Session {
    transport: Arc<Transport>,
    session_id: String,
    target_id: String,
}

impl Session {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Send a command to this session
    pub async fn send<C: Command>(&self, command: &C) -> Result<C::Response> {
        self.transport.call(Some(&self.session_id), command).await
    }

    pub async fn page_enable(&self) -> Result<()> {
        self.send(&PageEnable {}).await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<Navigated> {
        self.send(&PageNavigate {
            url: url.to_string(),
        })
        .await
    }

    /// Evaluate an expression, returning the result by value and awaiting promises
    pub async fn evaluate(&self, expression: &str) -> Result<Evaluated> {
        self.send(&RuntimeEvaluate {
            expression: expression.to_string(),
            return_by_value: true,
            await_promise: true,
        })
        .await
    }

    pub async fn dispatch_mouse_event(
        &self,
        r#type: MouseEventType,
        x: f64,
        y: f64,
        button: Option<MouseButton>,
        click_count: Option<i32>,
    ) -> Result<()> {
        self.send(&InputDispatchMouseEvent {
            r#type,
            x,
            y,
            button,
            click_count,
        })
        .await?;
        Ok(())
    }

    /// Insert text at the current cursor position
    pub async fn insert_text(&self, text: &str) -> Result<()> {
        self.send(&InputInsertText {
            text: text.to_string(),
        })
        .await?;
        Ok(())
    }
}
