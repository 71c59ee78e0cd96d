//! Purchase workflow
//!
//! Walks the portal from the details page to the confirmation popup, then
//! hands control back to the caller. The pause is a value:
//! [`Checkpoint::AwaitingConfirmation`] holds a [`PendingConfirmation`] that
//! can only be confirmed or abandoned, each consuming it. Every path out of
//! the workflow releases the session exactly once.

use std::fmt;
use std::time::Duration;

use crate::config::{validate_meter_number, Amount, CardCredentials};
use crate::datepicker::DatePicker;
use crate::driver::PageDriver;
use crate::error::{Error, Result};
use crate::interact::Interactor;
use crate::locators::{amount_page, confirmation_popup, details_page, result_page};
use crate::session::Session;
use crate::{PortalConfig, Timeouts};

/// Reported when neither a token nor a recognisable error page appears
pub const UNKNOWN_OUTCOME: &str = "Unknown outcome: neither token nor explicit error found.";
/// Reported when the error page carries no detail text
pub const UNKNOWN_PAYMENT_ERROR: &str = "Unknown payment error.";
/// Marker text of the portal's error page title
const ERROR_TITLE_MARKER: &str = "Error Message";

/// Validated inputs for one purchase
#[derive(Debug, Clone)]
pub struct PurchaseDetails {
    meter_number: String,
    amount: Amount,
    card: CardCredentials,
}

impl PurchaseDetails {
    pub fn new(meter_number: &str, amount: Amount, card: CardCredentials) -> Result<Self> {
        Ok(Self {
            meter_number: validate_meter_number(meter_number)?,
            amount,
            card,
        })
    }

    pub fn meter_number(&self) -> &str {
        &self.meter_number
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn card(&self) -> &CardCredentials {
        &self.card
    }
}

/// Progress through the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Init,
    DetailsEntered,
    MeterValidated,
    AmountEntered,
    AwaitingConfirmation,
    Submitted,
    Resolved,
}

/// A successful purchase
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseReceipt {
    pub customer_name: String,
    pub meter_number: String,
    pub token: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    Success(PurchaseReceipt),
    Failure { reason: String },
}

impl WorkflowOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// What the user is asked to approve
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationSummary {
    pub customer_name: String,
    pub meter_number: String,
    pub amount: Amount,
}

impl fmt::Display for ConfirmationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Customer: {}", self.customer_name)?;
        writeln!(f, "Meter No: {}", self.meter_number)?;
        write!(f, "Amount: ${}", self.amount)
    }
}

/// Where [`PurchaseWorkflow::run`] stopped
pub enum Checkpoint<D: PageDriver> {
    /// Paused at the confirmation popup; the session is still live
    AwaitingConfirmation(PendingConfirmation<D>),
    /// Finished before the gate; the session has been released
    Resolved(WorkflowOutcome),
}

/// Why the run stopped short of the gate
enum Halt {
    /// The portal refused the input
    Rejected(String),
    Failed(Error),
}

impl From<Error> for Halt {
    fn from(e: Error) -> Self {
        Halt::Failed(e)
    }
}

impl Halt {
    fn into_reason(self) -> String {
        match self {
            Halt::Rejected(reason) => reason,
            Halt::Failed(e) => e.to_string(),
        }
    }
}

/// One purchase run over an owned session
pub struct PurchaseWorkflow<D: PageDriver> {
    session: Session<D>,
    details: PurchaseDetails,
    timeouts: Timeouts,
    picker_page_limit: u32,
    state: WorkflowState,
}

impl<D: PageDriver> PurchaseWorkflow<D> {
    pub fn new(session: Session<D>, details: PurchaseDetails, config: &PortalConfig) -> Self {
        Self {
            session,
            details,
            timeouts: config.timeouts.clone(),
            picker_page_limit: config.picker_page_limit,
            state: WorkflowState::Init,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    fn transition(&mut self, next: WorkflowState) {
        tracing::debug!("workflow {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Fill every page up to the confirmation popup
    pub async fn run(mut self) -> Checkpoint<D> {
        tracing::info!("Starting purchase for meter {}", self.details.meter_number);
        match self.advance_to_gate().await {
            Ok(customer_name) => {
                self.transition(WorkflowState::AwaitingConfirmation);
                tracing::info!("Awaiting confirmation for {}", customer_name);
                Checkpoint::AwaitingConfirmation(PendingConfirmation {
                    workflow: self,
                    customer_name,
                })
            }
            Err(halt) => {
                let outcome = WorkflowOutcome::failure(halt.into_reason());
                Checkpoint::Resolved(self.resolve(outcome).await)
            }
        }
    }

    async fn advance_to_gate(&mut self) -> std::result::Result<String, Halt> {
        self.enter_details().await?;
        self.transition(WorkflowState::DetailsEntered);

        if let Some(banner) = self.check_meter().await? {
            tracing::warn!("Portal rejected meter: {}", banner);
            return Err(Halt::Rejected(format!("Invalid Meter: {}", banner)));
        }
        self.transition(WorkflowState::MeterValidated);

        let customer_name = self.enter_amount().await?;
        self.transition(WorkflowState::AmountEntered);

        self.interactor()?
            .wait_visible(&confirmation_popup::SUBMIT_BUTTON, self.timeouts.visible)
            .await?;
        Ok(customer_name)
    }

    fn interactor(&self) -> Result<Interactor<'_, D>> {
        Ok(Interactor::new(self.session.driver()?, &self.timeouts))
    }

    async fn enter_details(&self) -> Result<()> {
        let ui = self.interactor()?;
        let card = &self.details.card;

        // Page-load barrier
        ui.wait_visible(&details_page::METER_INPUT, self.timeouts.visible)
            .await?;

        ui.type_text(&details_page::METER_INPUT, &self.details.meter_number)
            .await?;
        ui.type_text(&details_page::CARD_NUMBER_INPUT, &card.number)
            .await?;
        ui.type_text(&details_page::CARD_NAME_INPUT, &card.name)
            .await?;
        ui.type_text(&details_page::CARD_CODE_INPUT, &card.code)
            .await?;

        DatePicker::new(&ui, self.picker_page_limit)
            .select(card.expiry_month, card.expiry_year)
            .await
    }

    /// Submit the details page; `Some(banner)` when the meter was refused
    async fn check_meter(&self) -> Result<Option<String>> {
        let ui = self.interactor()?;
        ui.click(&details_page::NEXT_BUTTON).await?;

        let banner = ui
            .try_read_text(&details_page::METER_ERROR_LABEL, self.timeouts.optional)
            .await?;
        Ok(banner.filter(|text| !text.is_empty()))
    }

    /// Read the customer name and enter the amount; returns the name
    async fn enter_amount(&self) -> Result<String> {
        let ui = self.interactor()?;

        let first = ui.read_text(&amount_page::CUSTOMER_FIRST_NAME).await?;
        let last = ui.read_text(&amount_page::CUSTOMER_LAST_NAME).await?;
        let customer_name = format!("{} {}", first_name(&first), last);

        ui.click(&amount_page::OTHER_AMOUNT_RADIO).await?;
        ui.type_text(&amount_page::AMOUNT_INPUT, &self.details.amount.to_string())
            .await?;
        ui.click(&amount_page::NEXT_BUTTON).await?;
        Ok(customer_name)
    }

    async fn submit(&self) -> Result<()> {
        self.interactor()?
            .click(&confirmation_popup::SUBMIT_BUTTON)
            .await
    }

    /// Classify the page shown after submission
    async fn read_outcome(&self, customer_name: &str) -> Result<WorkflowOutcome> {
        let ui = self.interactor()?;
        let candidates = [&result_page::TOKEN_LABEL, &result_page::ERROR_TITLE];

        if ui
            .wait_any_visible(&candidates, self.timeouts.outcome)
            .await?
            .is_none()
        {
            tracing::warn!("No result page within {}ms", self.timeouts.outcome.as_millis());
            return Ok(WorkflowOutcome::failure(UNKNOWN_OUTCOME));
        }

        let token = ui
            .try_read_text(&result_page::TOKEN_LABEL, Duration::ZERO)
            .await?
            .filter(|t| !t.is_empty());
        if let Some(token) = token {
            return Ok(WorkflowOutcome::Success(PurchaseReceipt {
                customer_name: customer_name.to_string(),
                meter_number: self.details.meter_number.clone(),
                token,
                amount: self.details.amount,
            }));
        }

        let title = ui
            .try_read_text(&result_page::ERROR_TITLE, Duration::ZERO)
            .await?
            .unwrap_or_default();
        if !title.contains(ERROR_TITLE_MARKER) {
            return Ok(WorkflowOutcome::failure(UNKNOWN_OUTCOME));
        }

        let detail = ui
            .try_read_text(&result_page::ERROR_DETAIL, self.timeouts.optional)
            .await?
            .filter(|d| !d.is_empty());
        Ok(WorkflowOutcome::failure(
            detail.unwrap_or_else(|| UNKNOWN_PAYMENT_ERROR.to_string()),
        ))
    }

    async fn release(&mut self) {
        if let Err(e) = self.session.release().await {
            tracing::warn!("Failed to close browser cleanly: {}", e);
        }
    }

    async fn resolve(&mut self, outcome: WorkflowOutcome) -> WorkflowOutcome {
        self.transition(WorkflowState::Resolved);
        self.release().await;
        match &outcome {
            WorkflowOutcome::Success(receipt) => {
                tracing::info!("Purchase succeeded for meter {}", receipt.meter_number)
            }
            WorkflowOutcome::Failure { reason } => tracing::warn!("Purchase failed: {}", reason),
        }
        outcome
    }
}

/// Keep the given names only, dropping a parenthesised suffix
fn first_name(raw: &str) -> &str {
    raw.split('(').next().unwrap_or_default().trim_end()
}

/// A workflow paused at the confirmation popup
pub struct PendingConfirmation<D: PageDriver> {
    workflow: PurchaseWorkflow<D>,
    customer_name: String,
}

impl<D: PageDriver> PendingConfirmation<D> {
    pub fn summary(&self) -> ConfirmationSummary {
        ConfirmationSummary {
            customer_name: self.customer_name.clone(),
            meter_number: self.workflow.details.meter_number.clone(),
            amount: self.workflow.details.amount,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.workflow.state
    }

    /// Submit the payment and report what the portal answered
    pub async fn confirm(mut self) -> WorkflowOutcome {
        let workflow = &mut self.workflow;
        tracing::info!("Payment confirmed, submitting");

        let outcome = match workflow.submit().await {
            Ok(()) => {
                workflow.transition(WorkflowState::Submitted);
                match workflow.read_outcome(&self.customer_name).await {
                    Ok(outcome) => outcome,
                    Err(e) => WorkflowOutcome::failure(e.to_string()),
                }
            }
            Err(e) => WorkflowOutcome::failure(e.to_string()),
        };
        workflow.resolve(outcome).await
    }

    /// Close the browser without submitting
    pub async fn abandon(mut self) {
        tracing::info!("Payment abandoned before submission");
        self.workflow.transition(WorkflowState::Resolved);
        self.workflow.release().await;
    }
}
