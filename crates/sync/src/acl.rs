//! Region ACL service: reads the region's ACL through [`AclBackend`] and
//! enforces the share gate locally before any remote mutation.

use std::sync::Arc;

use fieldboard_client::AclBackend;
use fieldboard_core::acl::{AclEntry, AclGrant, PermissionSet, Principal, RegionAcl};

use crate::error::SyncResult;

#[derive(Clone)]
pub struct RegionAclService {
    backend: Arc<dyn AclBackend>,
}

impl RegionAclService {
    pub fn new(backend: Arc<dyn AclBackend>) -> Self {
        Self { backend }
    }

    pub async fn load(&self, region_id: &str) -> SyncResult<RegionAcl> {
        let entries = self.backend.get_acl(region_id).await?;
        Ok(RegionAcl::new(region_id, entries))
    }

    pub async fn effective_permissions(
        &self,
        region_id: &str,
        principal: &Principal,
    ) -> SyncResult<PermissionSet> {
        Ok(self.load(region_id).await?.effective_permissions(principal))
    }

    pub async fn can_share(&self, region_id: &str, principal: &Principal) -> SyncResult<bool> {
        Ok(self.load(region_id).await?.can_share(principal))
    }

    /// Grant or replace a principal's permissions. Rejected with
    /// [`CoreError::Forbidden`](fieldboard_core::CoreError::Forbidden) unless `actor` holds `share` on the region.
    pub async fn set_acl(
        &self,
        region_id: &str,
        actor: &Principal,
        grant: AclGrant,
    ) -> SyncResult<AclEntry> {
        let mut acl = self.load(region_id).await?;
        // Validates locally (share gate, principal id) before the remote call.
        acl.set_acl(actor, grant.clone())?;
        let entry = self.backend.put_acl(region_id, &grant).await?;
        tracing::info!(
            region_id,
            user_id = %actor.user_id,
            principal_id = %entry.principal_id,
            "Region ACL updated"
        );
        Ok(entry)
    }

    pub async fn remove_acl(&self, region_id: &str, actor: &Principal, acl_id: &str) -> SyncResult<()> {
        let mut acl = self.load(region_id).await?;
        acl.remove_acl(actor, acl_id)?;
        self.backend.delete_acl(region_id, acl_id).await?;
        tracing::info!(region_id, user_id = %actor.user_id, acl_id, "Region ACL entry removed");
        Ok(())
    }
}
