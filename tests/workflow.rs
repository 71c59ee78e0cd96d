//! Purchase workflow against the simulated portal

mod support;

use meterpay::locators::{amount_page, details_page};
use meterpay::workflow::{UNKNOWN_OUTCOME, UNKNOWN_PAYMENT_ERROR};
use meterpay::{
    CardCredentials, Checkpoint, PendingConfirmation, PurchaseDetails, PurchaseWorkflow, Session,
    WorkflowOutcome, WorkflowState,
};
use support::{details, test_config, ResultPage, SimulatedPortal};

async fn run(portal: &SimulatedPortal) -> Checkpoint<SimulatedPortal> {
    let session = Session::new("chrome", portal.clone());
    PurchaseWorkflow::new(session, details(), &test_config()).run().await
}

async fn reach_gate(portal: &SimulatedPortal) -> PendingConfirmation<SimulatedPortal> {
    match run(portal).await {
        Checkpoint::AwaitingConfirmation(pending) => pending,
        Checkpoint::Resolved(outcome) => panic!("stopped before confirmation: {:?}", outcome),
    }
}

async fn resolved(portal: &SimulatedPortal) -> WorkflowOutcome {
    match run(portal).await {
        Checkpoint::Resolved(outcome) => outcome,
        Checkpoint::AwaitingConfirmation(_) => panic!("unexpectedly reached confirmation"),
    }
}

#[tokio::test]
async fn test_confirmed_purchase_returns_token() {
    let portal = SimulatedPortal::new();
    let pending = reach_gate(&portal).await;

    assert_eq!(pending.state(), WorkflowState::AwaitingConfirmation);
    let summary = pending.summary();
    assert_eq!(summary.customer_name, "JOHN DOE");
    assert_eq!(summary.meter_number, "04123456789");
    assert_eq!(portal.close_count(), 0);

    match pending.confirm().await {
        WorkflowOutcome::Success(receipt) => {
            assert_eq!(receipt.token, "ABCD-1234-EFGH-5678");
            assert_eq!(receipt.customer_name, "JOHN DOE");
            assert_eq!(receipt.meter_number, "04123456789");
            assert_eq!(receipt.amount.to_string(), "20.00");
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(portal.close_count(), 1);
}

#[tokio::test]
async fn test_form_filled_from_details() {
    let portal = SimulatedPortal::new();
    let pending = reach_gate(&portal).await;

    assert_eq!(portal.field(&details_page::METER_INPUT), "04123456789");
    assert_eq!(portal.field(&details_page::CARD_NUMBER_INPUT), "4111111111111111");
    assert_eq!(portal.field(&details_page::CARD_NAME_INPUT), "JANE DOE");
    assert_eq!(portal.field(&details_page::CARD_CODE_INPUT), "123");
    assert_eq!(portal.field(&amount_page::AMOUNT_INPUT), "20.00");
    assert_eq!(portal.state().expiry, Some(("Mar".to_string(), 2027)));

    pending.abandon().await;
}

#[tokio::test]
async fn test_rejected_meter_stops_before_amount() {
    let portal = SimulatedPortal::new().with(|s| s.meter_error = Some("Meter not found".into()));

    let outcome = resolved(&portal).await;
    assert_eq!(outcome, WorkflowOutcome::failure("Invalid Meter: Meter not found"));
    assert_eq!(portal.close_count(), 1);
    assert!(!portal.clicked(amount_page::OTHER_AMOUNT_RADIO.name()));
}

#[tokio::test]
async fn test_portal_error_detail_reported() {
    let portal = SimulatedPortal::new().with(|s| {
        s.result = ResultPage::Error {
            title: "Error Message".into(),
            detail: Some("Card declined".into()),
        }
    });

    let outcome = reach_gate(&portal).await.confirm().await;
    assert_eq!(outcome, WorkflowOutcome::failure("Card declined"));
    assert_eq!(portal.close_count(), 1);
}

#[tokio::test]
async fn test_error_page_without_detail() {
    let portal = SimulatedPortal::new().with(|s| {
        s.result = ResultPage::Error {
            title: "Error Message".into(),
            detail: None,
        }
    });

    let outcome = reach_gate(&portal).await.confirm().await;
    assert_eq!(outcome, WorkflowOutcome::failure(UNKNOWN_PAYMENT_ERROR));
}

#[tokio::test]
async fn test_unrecognised_result_is_unknown_outcome() {
    for result in [
        ResultPage::Blank,
        ResultPage::Token(String::new()),
        ResultPage::Error {
            title: "Session expired".into(),
            detail: None,
        },
    ] {
        let portal = SimulatedPortal::new().with(|s| s.result = result);
        let outcome = reach_gate(&portal).await.confirm().await;
        assert_eq!(outcome, WorkflowOutcome::failure(UNKNOWN_OUTCOME));
        assert_eq!(portal.close_count(), 1);
    }
}

#[tokio::test]
async fn test_abandon_closes_without_submitting() {
    let portal = SimulatedPortal::new();
    reach_gate(&portal).await.abandon().await;

    assert_eq!(portal.close_count(), 1);
    assert!(!portal.clicked("confirm payment button"));
}

#[tokio::test]
async fn test_missing_control_fails_and_releases() {
    let portal = SimulatedPortal::new().with(|s| s.hide_amount_radio = true);

    match resolved(&portal).await {
        WorkflowOutcome::Failure { reason } => {
            assert!(reason.contains("Element not interactable"), "{}", reason)
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(portal.close_count(), 1);
}

#[tokio::test]
async fn test_popup_timeout_fails_and_releases() {
    let portal = SimulatedPortal::new().with(|s| s.suppress_popup = true);

    match resolved(&portal).await {
        WorkflowOutcome::Failure { reason } => assert!(reason.starts_with("Timeout"), "{}", reason),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(portal.close_count(), 1);
}

#[tokio::test]
async fn test_date_picker_failure_fails_and_releases() {
    let portal = SimulatedPortal::new().with(|s| s.frozen = true);
    let config = test_config();
    let base = details();
    let details = PurchaseDetails::new(
        base.meter_number(),
        base.amount(),
        CardCredentials {
            expiry_year: 2045,
            ..base.card().clone()
        },
    )
    .unwrap();

    let session = Session::new("chrome", portal.clone());
    match PurchaseWorkflow::new(session, details, &config).run().await {
        Checkpoint::Resolved(WorkflowOutcome::Failure { reason }) => {
            assert!(reason.starts_with("Date picker navigation failed"), "{}", reason)
        }
        _ => panic!("expected date picker failure"),
    }
    assert_eq!(portal.close_count(), 1);
}
