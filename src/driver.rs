//! Page driver contract
//!
//! The workflow never talks to CDP directly. It drives a [`PageDriver`], which
//! the live [`crate::BrowserDriver`] implements against a real browser and the
//! test suite implements with a simulated portal.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::locators::Locator;

/// Snapshot of the first element matching a locator
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ElementState {
    /// Rendered with a non-empty box and not hidden by CSS
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Rendered text (`innerText`), or the value of form controls
    #[serde(default)]
    pub text: String,
}

impl ElementState {
    pub fn is_interactable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// Handle on a rendered frame of the page, used to detect re-rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMark(pub u64);

/// Element-level operations on one live page
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// State of the first matching element, `None` when nothing matches
    async fn probe(&self, locator: &Locator) -> Result<Option<ElementState>>;

    /// Click the first matching element
    async fn click(&self, locator: &Locator) -> Result<()>;

    /// Clear the first matching input and insert `text`
    async fn fill(&self, locator: &Locator, text: &str) -> Result<()>;

    /// Text of every matching element, in document order
    async fn texts(&self, locator: &Locator) -> Result<Vec<String>>;

    /// Tag the first matching element so a later re-render can be detected
    async fn mark_frame(&self, locator: &Locator) -> Result<Option<FrameMark>>;

    /// True once the tagged element is no longer attached to the document
    async fn is_stale(&self, mark: &FrameMark) -> Result<bool>;

    /// Shut the page and its browser down
    async fn close(&self) -> Result<()>;
}
