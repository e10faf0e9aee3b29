//! Request checks shared by the lifecycle operations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{Invoice, InvoiceStatus};
use crate::services::store::StudentRepository;

pub fn parse_id(value: &str, field: &str) -> Result<Uuid, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{} is required", field)));
    }
    Uuid::from_str(value)
        .map_err(|_| AppError::bad_request(format!("invalid {}: {}", field, value)))
}

/// Due and expiry dates must be today or later, due first.
pub fn validate_dates(
    due_date: NaiveDate,
    expiry_date: NaiveDate,
    today: NaiveDate,
) -> Result<(), AppError> {
    if due_date < today {
        return Err(AppError::bad_request(
            "invalid date: DueDate must be today or after",
        ));
    }
    if expiry_date < today {
        return Err(AppError::bad_request(
            "invalid date: ExpiryDate must be today or after",
        ));
    }
    if due_date > expiry_date {
        return Err(AppError::bad_request(
            "invalid date: DueDate must be before ExpiryDate",
        ));
    }
    Ok(())
}

/// A draft invoice with a positive total.
pub fn validate_issuable(invoice: &Invoice) -> Result<(), AppError> {
    if !invoice.has_status(InvoiceStatus::Draft) {
        return Err(AppError::bad_request(format!(
            "error invalid invoice status: {}",
            invoice.status
        )));
    }
    if invoice.total < Decimal::ZERO {
        return Err(AppError::bad_request(
            "error Should have positive total, negative total found",
        ));
    }
    if invoice.total.is_zero() {
        return Err(AppError::bad_request(
            "error Should have positive total, zero total amount found",
        ));
    }
    Ok(())
}

/// Direct debit needs a verified bank account on file.
pub async fn ensure_verified_bank_account<T>(tx: &mut T, student_id: Uuid) -> Result<(), AppError>
where
    T: StudentRepository,
{
    let accounts = tx.find_bank_accounts(&[student_id]).await?;
    match accounts.iter().find(|a| a.student_id == student_id) {
        None => Err(AppError::bad_request(
            "student has no bank account registered",
        )),
        Some(account) if !account.is_verified => Err(AppError::bad_request(
            "student bank account is not verified",
        )),
        Some(_) => Ok(()),
    }
}

/// Amounts are compared at two decimal places.
pub fn amounts_match(a: Decimal, b: Decimal) -> bool {
    a.round_dp(2) == b.round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_id() {
        assert!(parse_id("", "invoice id")
            .unwrap_err()
            .to_string()
            .contains("invoice id is required"));
        assert!(parse_id("abc", "invoice id")
            .unwrap_err()
            .to_string()
            .contains("invalid invoice id: abc"));
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "invoice id").unwrap(), id);
    }

    #[test]
    fn test_dates_must_not_be_in_the_past() {
        let today = Utc::now().date_naive();
        let yesterday = today - Duration::days(1);

        let err = validate_dates(yesterday, today, today).unwrap_err();
        assert!(err.to_string().contains("DueDate must be today or after"));

        let err = validate_dates(today, yesterday, today).unwrap_err();
        assert!(err.to_string().contains("ExpiryDate must be today or after"));
    }

    #[test]
    fn test_due_date_must_precede_expiry() {
        let today = Utc::now().date_naive();
        let err = validate_dates(today + Duration::days(5), today + Duration::days(1), today)
            .unwrap_err();
        assert!(err.to_string().contains("DueDate must be before ExpiryDate"));
        assert!(validate_dates(today, today, today).is_ok());
    }

    #[test]
    fn test_amounts_match_at_two_places() {
        assert!(amounts_match(dec!(623.00), dec!(623)));
        assert!(amounts_match(dec!(10.001), dec!(10.00)));
        assert!(!amounts_match(dec!(10.01), dec!(10.00)));
    }
}
