//! Advisor used when no advisory service is configured.

use async_trait::async_trait;

use crate::application::ports::{AdvisoryPort, AdvisoryRequest, AdvisoryVerdict, ProviderError};

/// Approves everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAdvisor;

#[async_trait]
impl AdvisoryPort for DisabledAdvisor {
    async fn review(&self, request: &AdvisoryRequest) -> Result<AdvisoryVerdict, ProviderError> {
        tracing::debug!(symbol = %request.symbol, "Advisory disabled, approving");
        Ok(AdvisoryVerdict::Approve)
    }
}
