use crate::entities::{AclPolicy, AdminState, EndpointInfo, Initiator, Metadata, Volume};
use crate::error::Result;
use async_trait::async_trait;
use basalt_core::{ReqContext, VolumeOpts};

/// Trait over the appliance control plane.
///
/// This is the seam between the orchestrator and the REST surface; the
/// real implementation is `ApplianceClient`, and `MockAppliance` provides
/// an in-memory array for tests. All names are user-facing; the agent
/// prefix is applied by implementations.
///
/// Idempotence contract: `create_volume` and `create_initiator` map a
/// conflict-class failure to success. Deletion of a missing entity is NOT
/// absorbed here; the orchestrator decides how to treat it.
#[async_trait]
pub trait ApplianceGateway: Send + Sync {
    /// Fetch a volume, or NotFound.
    async fn get_volume(&self, ctx: &ReqContext, name: &str) -> Result<Volume>;

    /// Create a volume. Creation mode is selected deterministically:
    /// clone source > template > raw.
    async fn create_volume(&self, ctx: &ReqContext, name: &str, opts: &VolumeOpts) -> Result<()>;

    /// Apply a performance policy to the volume's block volume. Callers
    /// only invoke this when at least one bound is non-zero.
    async fn set_performance_policy(
        &self,
        ctx: &ReqContext,
        name: &str,
        iops_max: u64,
        bw_max: u64,
    ) -> Result<()>;

    async fn put_metadata(&self, ctx: &ReqContext, name: &str, meta: &Metadata) -> Result<()>;

    async fn get_metadata(&self, ctx: &ReqContext, name: &str) -> Result<Metadata>;

    /// Transition the volume's admin state. `force` is required for the
    /// offline transition while sessions may still be logged in.
    async fn set_admin_state(
        &self,
        ctx: &ReqContext,
        name: &str,
        state: AdminState,
        force: bool,
    ) -> Result<()>;

    async fn delete_volume(&self, ctx: &ReqContext, name: &str) -> Result<()>;

    /// Fetch the volume's storage endpoint coordinates. May legitimately
    /// return a not-yet-ready `EndpointInfo` shortly after the online
    /// transition; callers poll with a bounded budget.
    async fn get_storage_endpoint(&self, ctx: &ReqContext, name: &str) -> Result<EndpointInfo>;

    /// All volumes carrying the agent prefix, stripped for presentation.
    async fn list_volumes(&self, ctx: &ReqContext) -> Result<Vec<String>>;

    async fn get_initiator(&self, ctx: &ReqContext, id: &str) -> Result<Initiator>;

    /// Create an initiator object. A conflict (already registered, e.g.
    /// by a previous mount) resolves to the existing object.
    async fn create_initiator(&self, ctx: &ReqContext, name: &str, id: &str) -> Result<Initiator>;

    async fn get_acl(&self, ctx: &ReqContext, volume: &str) -> Result<AclPolicy>;

    async fn put_acl(&self, ctx: &ReqContext, volume: &str, acl: &AclPolicy) -> Result<()>;
}
