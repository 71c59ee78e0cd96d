//! # Meterpay
//!
//! Buys a prepaid power/water token through the utility's web payment portal
//! by driving a real browser over the Chrome DevTools Protocol.
//!
//! The portal is a multi-step form: meter number and card details (with a
//! paginated month/year picker for the card expiry), then the purchase amount,
//! then a confirmation popup, then a page carrying either the token or an
//! error. [`PurchaseWorkflow`] walks those pages and stops at the
//! confirmation popup until the caller approves the payment.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meterpay::{
//!     acquire, parse_amount, CardCredentials, Checkpoint, PortalConfig, PurchaseDetails,
//!     PurchaseWorkflow, WorkflowOutcome,
//! };
//!
//! #[tokio::main]
//! async fn main() -> meterpay::Result<()> {
//!     let config = PortalConfig::default();
//!     let details = PurchaseDetails::new(
//!         "04123456789",
//!         parse_amount("20")?,
//!         CardCredentials::from_env()?,
//!     )?;
//!
//!     // Chrome first, Edge if Chrome cannot be started
//!     let session = acquire(&config.engines, &config).await?;
//!
//!     match PurchaseWorkflow::new(session, details, &config).run().await {
//!         Checkpoint::AwaitingConfirmation(pending) => {
//!             println!("{}", pending.summary());
//!             match pending.confirm().await {
//!                 WorkflowOutcome::Success(receipt) => println!("Token: {}", receipt.token),
//!                 WorkflowOutcome::Failure { reason } => eprintln!("Error: {}", reason),
//!             }
//!         }
//!         Checkpoint::Resolved(outcome) => eprintln!("{:?}", outcome),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! For a UI that must not block, [`spawn_purchase`] runs the same steps on a
//! worker task and reports progress as [`WorkflowEvent`]s.

use std::time::Duration;

pub mod browser;
pub mod cdp;
pub mod config;
pub mod datepicker;
pub mod driver;
pub mod error;
pub mod interact;
pub mod locators;
pub mod page;
pub mod session;
pub mod worker;
pub mod workflow;

// Re-exports
pub use browser::{Browser, BrowserDriver, BrowserEngine};
pub use config::{parse_amount, validate_meter_number, Amount, CardCredentials};
pub use datepicker::DatePicker;
pub use driver::{ElementState, FrameMark, PageDriver};
pub use error::{EngineFailure, Error, Result};
pub use interact::Interactor;
pub use locators::{By, Locator};
pub use page::Page;
pub use session::{acquire, EngineProvider, Session};
pub use worker::{spawn_purchase, PurchaseHandle, WorkflowEvent};
pub use workflow::{
    Checkpoint, ConfirmationSummary, PendingConfirmation, PurchaseDetails, PurchaseReceipt,
    PurchaseWorkflow, WorkflowOutcome, WorkflowState,
};

/// Default payment portal entry page
pub const DEFAULT_PORTAL_URL: &str = "https://puc.able-soft.com:10131/ADR/PaymentADR_Step1.aspx";

/// Wait budgets for page interactions
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Waiting for an element to become clickable before click/type
    pub interact: Duration,
    /// Waiting for an element to become visible (reads, page barriers)
    pub visible: Duration,
    /// Reading elements that may legitimately be absent
    pub optional: Duration,
    /// Waiting for the token or error page after submission
    pub outcome: Duration,
    /// Delay between polls
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            interact: Duration::from_secs(15),
            visible: Duration::from_secs(10),
            optional: Duration::from_secs(2),
            outcome: Duration::from_secs(15),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Configuration for a portal run
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Portal entry page
    pub url: String,
    /// Headless mode
    pub headless: bool,
    /// Engines to try, in order
    pub engines: Vec<BrowserEngine>,
    /// Explicit browser binary, overriding discovery
    pub browser_path: Option<String>,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    pub timeouts: Timeouts,
    /// Most year pages the date picker may turn before giving up
    pub picker_page_limit: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PORTAL_URL.to_string(),
            headless: true,
            engines: vec![BrowserEngine::Chrome, BrowserEngine::Edge],
            browser_path: None,
            viewport_width: 1920,
            viewport_height: 1080,
            timeouts: Timeouts::default(),
            picker_page_limit: 50,
        }
    }
}

impl PortalConfig {
    /// Create a visible (non-headless) config
    pub fn visible() -> Self {
        Self {
            headless: false,
            ..Default::default()
        }
    }
}
