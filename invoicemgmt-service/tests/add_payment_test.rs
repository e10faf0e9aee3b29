//! Opening a new collection after a failed payment.

mod common;

use chrono::Duration;
use common::*;
use invoicemgmt_service::dtos::AddInvoicePaymentRequest;
use invoicemgmt_service::models::{InvoiceStatus, PaymentMethod, PaymentStatus};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_test::assert_ok;
use uuid::Uuid;

fn add_request(invoice_id: Uuid, amount: Decimal) -> AddInvoicePaymentRequest {
    AddInvoicePaymentRequest {
        invoice_id: invoice_id.to_string(),
        payment_method: PaymentMethod::ConvenienceStore,
        amount,
        due_date: today() + Duration::days(1),
        expiry_date: today() + Duration::days(8),
        remarks: "second attempt".to_string(),
    }
}

#[tokio::test]
async fn test_add_payment_after_failure() {
    let h = TestHarness::new();
    let invoice = seed_invoice(&h.ledger, InvoiceStatus::Issued, dec!(80));
    let failed = seed_payment(
        &h.ledger,
        &invoice,
        PaymentStatus::Failed,
        PaymentMethod::DirectDebit,
    );

    let result = assert_ok!(
        h.engine
            .add_invoice_payment(&context(), &add_request(invoice.invoice_id, dec!(80)))
            .await
    );

    let payment = result.payment.unwrap();
    assert_eq!(payment.payment_status, "PENDING");
    assert_eq!(payment.payment_sequence_number, failed.payment_sequence_number + 1);
    assert_eq!(result.invoice.status, "ISSUED");

    let state = h.ledger.state();
    assert_eq!(state.payments_of(invoice.invoice_id).len(), 2);
    let logs = state.logs_of(invoice.invoice_id);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, "PAYMENT_ADDED");
    assert_eq!(logs[0].action_detail, "CONVENIENCE_STORE");
}

#[tokio::test]
async fn test_add_payment_requires_failed_latest_payment() {
    let h = TestHarness::new();
    let invoice = seed_invoice(&h.ledger, InvoiceStatus::Issued, dec!(80));
    seed_payment(
        &h.ledger,
        &invoice,
        PaymentStatus::Pending,
        PaymentMethod::ConvenienceStore,
    );

    let err = h
        .engine
        .add_invoice_payment(&context(), &add_request(invoice.invoice_id, dec!(80)))
        .await
        .unwrap_err();

    assert!(err
        .to_string()
        .contains("latest payment should be in FAILED status, found PENDING"));
    assert_eq!(h.ledger.state().payments.len(), 1);
}

#[tokio::test]
async fn test_add_payment_amount_checks() {
    let h = TestHarness::new();
    let invoice = seed_invoice(&h.ledger, InvoiceStatus::Issued, dec!(80));

    let err = h
        .engine
        .add_invoice_payment(&context(), &add_request(invoice.invoice_id, dec!(0)))
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("amount cannot be less than or equal to 0"));
    assert_eq!(h.ledger.begins(), 0);

    let err = h
        .engine
        .add_invoice_payment(&context(), &add_request(invoice.invoice_id, dec!(50)))
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("amount should be equal to outstanding balance"));
}

#[tokio::test]
async fn test_add_payment_rejects_manual_method() {
    let h = TestHarness::new();
    let invoice = seed_invoice(&h.ledger, InvoiceStatus::Issued, dec!(80));
    let mut request = add_request(invoice.invoice_id, dec!(80));
    request.payment_method = PaymentMethod::Cash;

    let err = h
        .engine
        .add_invoice_payment(&context(), &request)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid payment method: CASH"));
}
