//! Error types for meterpay

use thiserror::Error;

/// Result type for meterpay operations
pub type Result<T> = std::result::Result<T, Error>;

/// CDP errors raised while a page is replacing its document
const TRANSIENT_CDP_MESSAGES: [&str; 4] = [
    "Execution context was destroyed",
    "Cannot find context with specified id",
    "Cannot find default execution context",
    "Inspected target navigated",
];

/// Error type for meterpay
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to launch a browser process
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// No binary found for the requested engine
    #[error("{0} not found")]
    BrowserNotFound(String),

    /// Every engine in the fallback list failed to start
    #[error("No browser engine available ({})", format_attempts(.attempts))]
    DriverUnavailable { attempts: Vec<EngineFailure> },

    /// Transport error
    #[error("Transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// CDP protocol error
    #[error("CDP error in {method}: {message} (code {code})")]
    Cdp {
        method: String,
        code: i64,
        message: String,
    },

    /// JavaScript evaluated in the page threw or returned nothing
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Navigation error
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Element never became visible
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Element never became present, visible and enabled
    #[error("Element not interactable: {0}")]
    ElementNotInteractable(String),

    /// Timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Expiry month outside 1-12
    #[error("Invalid month: {0}")]
    InvalidMonth(u32),

    /// The calendar widget ended up in a state the navigator cannot search
    #[error("Date picker navigation failed: {0}")]
    DatePickerNavigationFailed(String),

    /// The session's driver was already released
    #[error("Session already released")]
    SessionReleased,

    /// `confirm`/`abandon` called outside the confirmation gate
    #[error("Workflow is not awaiting confirmation")]
    NotAwaitingConfirmation,

    /// Missing or malformed configuration (credentials)
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input rejected before the workflow starts
    #[error("{0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One failed engine launch, kept for the aggregated `DriverUnavailable` error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub engine: String,
    pub error: String,
}

fn format_attempts(attempts: &[EngineFailure]) -> String {
    if attempts.is_empty() {
        return "no engines configured".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.engine, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a transport error with context
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
            source: None,
        }
    }

    /// Create a transport error with IO source
    pub fn transport_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source: Some(source),
        }
    }

    /// Create a CDP error with full context
    pub fn cdp(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Cdp {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    pub fn not_interactable(what: impl Into<String>) -> Self {
        Self::ElementNotInteractable(what.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::ElementNotFound(what.into())
    }

    /// Errors a page can produce while it is re-rendering or navigating.
    ///
    /// Polling loops treat these as "not yet" instead of failing the wait.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Evaluation(_) => true,
            Error::Cdp { message, .. } => TRANSIENT_CDP_MESSAGES
                .iter()
                .any(|m| message.contains(m)),
            _ => false,
        }
    }

    /// Precondition errors are reported before any browser is started
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Config(_) | Error::InvalidInput(_))
    }
}
