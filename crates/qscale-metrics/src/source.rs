//! The observation source contract.

use async_trait::async_trait;

use qscale_core::Observation;

use crate::error::MetricsError;

/// Supplies a fresh observation of the scaled workload on demand.
///
/// Implementations must not cache: the control loop depends on
/// `observe()` reflecting the cluster as it is *now*, in particular the
/// live replica count while waiting for an actuation to converge.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn observe(&self) -> Result<Observation, MetricsError>;
}
