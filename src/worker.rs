//! Background purchase runner
//!
//! Runs the whole acquire/run/confirm cycle on a tokio task so a front end
//! never blocks on the browser. Progress arrives as [`WorkflowEvent`]s; the
//! confirmation decision goes back through the [`PurchaseHandle`].

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::session::{acquire, EngineProvider};
use crate::workflow::{
    Checkpoint, ConfirmationSummary, PurchaseDetails, PurchaseReceipt, PurchaseWorkflow,
    WorkflowOutcome,
};
use crate::PortalConfig;

const EVENT_BUFFER: usize = 8;

/// Progress of a background purchase
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// A browser is up with the portal open
    Launched { engine: String },
    /// Paused; answer with [`PurchaseHandle::confirm`] or [`PurchaseHandle::abandon`]
    AwaitingConfirmation(ConfirmationSummary),
    Succeeded(PurchaseReceipt),
    Failed(String),
    /// The user declined; nothing was submitted
    Abandoned,
}

impl WorkflowEvent {
    /// Nothing follows a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_) | Self::Abandoned)
    }
}

impl From<WorkflowOutcome> for WorkflowEvent {
    fn from(outcome: WorkflowOutcome) -> Self {
        match outcome {
            WorkflowOutcome::Success(receipt) => Self::Succeeded(receipt),
            WorkflowOutcome::Failure { reason } => Self::Failed(reason),
        }
    }
}

#[derive(Debug)]
enum Decision {
    Confirm,
    Abandon,
}

/// Front-end side of a running purchase.
///
/// Dropping the handle while the workflow waits for confirmation abandons it.
pub struct PurchaseHandle {
    events: mpsc::Receiver<WorkflowEvent>,
    decision: Option<oneshot::Sender<Decision>>,
    at_gate: bool,
    task: JoinHandle<()>,
}

/// Start a purchase on a background task
pub fn spawn_purchase<P>(
    providers: Vec<P>,
    config: PortalConfig,
    details: PurchaseDetails,
) -> PurchaseHandle
where
    P: EngineProvider + 'static,
{
    let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
    let (decision_tx, decision_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let last = run_purchase(&providers, &config, details, &event_tx, decision_rx).await;
        if event_tx.send(last).await.is_err() {
            tracing::debug!("Purchase finished after its handle was dropped");
        }
    });

    PurchaseHandle {
        events,
        decision: Some(decision_tx),
        at_gate: false,
        task,
    }
}

/// Returns the terminal event
async fn run_purchase<P: EngineProvider>(
    providers: &[P],
    config: &PortalConfig,
    details: PurchaseDetails,
    events: &mpsc::Sender<WorkflowEvent>,
    decision: oneshot::Receiver<Decision>,
) -> WorkflowEvent {
    let session = match acquire(providers, config).await {
        Ok(session) => session,
        Err(e) => return WorkflowEvent::Failed(format!("Failed to start browser: {}", e)),
    };

    let _ = events
        .send(WorkflowEvent::Launched {
            engine: session.engine().to_string(),
        })
        .await;

    let pending = match PurchaseWorkflow::new(session, details, config).run().await {
        Checkpoint::AwaitingConfirmation(pending) => pending,
        Checkpoint::Resolved(outcome) => return outcome.into(),
    };

    let _ = events
        .send(WorkflowEvent::AwaitingConfirmation(pending.summary()))
        .await;

    match decision.await {
        Ok(Decision::Confirm) => pending.confirm().await.into(),
        Ok(Decision::Abandon) => {
            pending.abandon().await;
            WorkflowEvent::Abandoned
        }
        Err(_) => {
            tracing::info!("Purchase handle dropped at confirmation");
            pending.abandon().await;
            WorkflowEvent::Abandoned
        }
    }
}

impl PurchaseHandle {
    /// Next progress event; `None` once the terminal event has been taken
    pub async fn next_event(&mut self) -> Option<WorkflowEvent> {
        let event = self.events.recv().await;
        match &event {
            Some(WorkflowEvent::AwaitingConfirmation(_)) => self.at_gate = true,
            Some(e) if e.is_terminal() => self.at_gate = false,
            _ => {}
        }
        event
    }

    /// Approve the payment. Only valid after `AwaitingConfirmation` was received.
    pub fn confirm(&mut self) -> Result<()> {
        self.decide(Decision::Confirm)
    }

    /// Decline the payment. Only valid after `AwaitingConfirmation` was received.
    pub fn abandon(&mut self) -> Result<()> {
        self.decide(Decision::Abandon)
    }

    fn decide(&mut self, decision: Decision) -> Result<()> {
        if !self.at_gate {
            return Err(Error::NotAwaitingConfirmation);
        }
        let sender = self.decision.take().ok_or(Error::NotAwaitingConfirmation)?;
        self.at_gate = false;
        tracing::debug!("Sending decision: {:?}", decision);
        sender
            .send(decision)
            .map_err(|_| Error::NotAwaitingConfirmation)
    }

    /// Wait for the background task to finish
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!("Purchase task failed: {}", e);
        }
    }
}
