//! Backend seams the sync layer is written against.
//!
//! [`LayoutApiClient`](crate::api::LayoutApiClient) implements both traits
//! over HTTP; tests substitute in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fieldboard_core::acl::{AclEntry, AclGrant};
use fieldboard_core::history::VersionStatus;
use fieldboard_core::mutation::LayoutMutation;

use crate::error::ClientError;

/// Server confirmation of a publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedVersion {
    pub id: Uuid,
    pub version_number: u64,
    pub status: VersionStatus,
    #[serde(default)]
    pub notes: Option<String>,
    /// The version archived by this publish, if any.
    #[serde(default)]
    pub archived_version_id: Option<Uuid>,
}

#[async_trait]
pub trait LayoutBackend: Send + Sync {
    /// Persist one replay-safe mutation.
    async fn apply(&self, mutation: &LayoutMutation) -> Result<(), ClientError>;

    async fn publish_version(
        &self,
        version_id: Uuid,
        notes: Option<&str>,
    ) -> Result<PublishedVersion, ClientError>;

    /// Cheap reachability probe used as the connectivity signal.
    async fn health(&self) -> Result<(), ClientError>;
}

#[async_trait]
pub trait AclBackend: Send + Sync {
    async fn get_acl(&self, region_id: &str) -> Result<Vec<AclEntry>, ClientError>;

    async fn put_acl(&self, region_id: &str, grant: &AclGrant) -> Result<AclEntry, ClientError>;

    async fn delete_acl(&self, region_id: &str, acl_id: &str) -> Result<(), ClientError>;
}
