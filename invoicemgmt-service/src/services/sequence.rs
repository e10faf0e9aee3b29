//! Payment sequence number allocation.
//!
//! In the default mode the database assigns the next number on insert. In
//! manual mode the allocator takes the tenant's advisory lock, reads the
//! current maximum and numbers the whole batch contiguously. The lock is
//! scoped to the unit of work, so it is released on commit and on rollback.
//! Nothing is cached between calls.

use service_core::error::AppError;
use tracing::{debug, instrument};

use crate::models::NewPayment;
use crate::services::features::ResolvedFeatures;
use crate::services::store::PaymentRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMode {
    DataStore,
    Manual,
}

impl SequenceMode {
    pub fn from_features(features: &ResolvedFeatures) -> Self {
        if features.manual_payment_sequence {
            SequenceMode::Manual
        } else {
            SequenceMode::DataStore
        }
    }
}

/// Assign sequence numbers to a batch of new payments, in batch order.
#[instrument(skip(tx, payments), fields(batch_size = payments.len()))]
pub async fn assign_sequence_numbers<T>(
    tx: &mut T,
    mode: SequenceMode,
    payments: &mut [NewPayment],
) -> Result<(), AppError>
where
    T: PaymentRepository,
{
    match mode {
        SequenceMode::DataStore => {
            for payment in payments.iter_mut() {
                payment.payment_sequence_number = None;
            }
            Ok(())
        }
        SequenceMode::Manual => {
            if payments.is_empty() {
                return Ok(());
            }

            if !tx.try_lock_payment_sequence().await? {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "payment sequence number lock is held by another transaction"
                )));
            }

            let latest = tx.latest_payment_sequence_number().await?;
            for (offset, payment) in payments.iter_mut().enumerate() {
                payment.payment_sequence_number = Some(latest + 1 + offset as i32);
            }

            debug!(
                first = latest + 1,
                last = latest + payments.len() as i32,
                "Payment sequence numbers assigned"
            );
            Ok(())
        }
    }
}
