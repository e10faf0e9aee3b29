//! Feature toggles, resolved once per request.

use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashSet;
use uuid::Uuid;

pub const MANUAL_PAYMENT_SEQUENCE_FLAG: &str = "ENABLE_PAYMENT_SEQUENCE_NUMBER_MANUAL_SETTING";
pub const IMPROVED_BULK_ISSUE_FLAG: &str = "ENABLE_IMPROVE_BULK_ISSUE_INVOICE";

/// Source of feature flag values.
#[async_trait]
pub trait FeatureToggle: Send + Sync {
    async fn is_enabled(&self, flag: &str) -> Result<bool, AppError>;
}

/// Flags backed by the service configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigFeatureToggle {
    enabled: HashSet<String>,
}

impl ConfigFeatureToggle {
    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: flags.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl FeatureToggle for ConfigFeatureToggle {
    async fn is_enabled(&self, flag: &str) -> Result<bool, AppError> {
        Ok(self.enabled.contains(flag))
    }
}

/// Flag values the engine needs for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedFeatures {
    /// Assign payment sequence numbers under an advisory lock instead of
    /// the database default.
    pub manual_payment_sequence: bool,
    /// Issue bulk batches through the staged id set instead of invoice by
    /// invoice.
    pub improved_bulk_issue: bool,
}

impl ResolvedFeatures {
    pub async fn resolve<T: FeatureToggle + ?Sized>(toggle: &T) -> Result<Self, AppError> {
        Ok(Self {
            manual_payment_sequence: toggle.is_enabled(MANUAL_PAYMENT_SEQUENCE_FLAG).await?,
            improved_bulk_issue: toggle.is_enabled(IMPROVED_BULK_ISSUE_FLAG).await?,
        })
    }
}

/// Caller identity and per-request settings.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_id: Uuid,
    pub user_id: String,
    pub organization_id: String,
    pub features: ResolvedFeatures,
}

impl RequestContext {
    pub fn new(tenant_id: Uuid, user_id: impl Into<String>, features: ResolvedFeatures) -> Self {
        Self {
            tenant_id,
            user_id: user_id.into(),
            organization_id: tenant_id.to_string(),
            features,
        }
    }
}
