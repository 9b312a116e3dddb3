use async_trait::async_trait;
use teleclean_core::AppResult;

/// One held sweep lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepLease {
    /// Coordination scope key.
    pub scope_key: String,
    /// Lease token used for safe release.
    pub token: String,
    /// Lease holder identity.
    pub holder_id: String,
}

/// Distributed coordination port that keeps sweeps single-caller.
#[async_trait]
pub trait SweepLeaseCoordinator: Send + Sync {
    /// Attempts to acquire the lease for `scope_key`; `None` when another holder owns it.
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>>;

    /// Releases the lease using token compare-and-delete semantics.
    async fn release_lease(&self, lease: &SweepLease) -> AppResult<()>;
}
