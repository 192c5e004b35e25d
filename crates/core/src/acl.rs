//! Region access control.
//!
//! Permission bits are independent flags: `share` does not imply `edit`
//! and `edit` does not imply `read`. A principal's effective permissions
//! are the union of every entry that names the user, one of their roles or
//! one of their teams. Only principals holding `share` may change a
//! region's ACL, including their own entry.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::RegionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    User,
    Role,
    Team,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub edit: bool,
    #[serde(default)]
    pub share: bool,
}

impl PermissionSet {
    pub const NONE: PermissionSet = PermissionSet {
        read: false,
        edit: false,
        share: false,
    };

    pub const READ_ONLY: PermissionSet = PermissionSet {
        read: true,
        edit: false,
        share: false,
    };

    pub const ALL: PermissionSet = PermissionSet {
        read: true,
        edit: true,
        share: true,
    };

    pub fn union(self, other: PermissionSet) -> PermissionSet {
        PermissionSet {
            read: self.read || other.read,
            edit: self.edit || other.edit,
            share: self.share || other.share,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub id: String,
    pub region_id: RegionId,
    pub principal_type: PrincipalType,
    pub principal_id: String,
    pub permission_set: PermissionSet,
}

/// Body of an ACL upsert: who gets which permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclGrant {
    pub principal_type: PrincipalType,
    pub principal_id: String,
    pub permission_set: PermissionSet,
}

/// The acting user together with the roles and teams they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default)]
    pub team_ids: Vec<String>,
}

impl Principal {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn matches(&self, principal_type: PrincipalType, principal_id: &str) -> bool {
        match principal_type {
            PrincipalType::User => self.user_id == principal_id,
            PrincipalType::Role => self.role_ids.iter().any(|r| r == principal_id),
            PrincipalType::Team => self.team_ids.iter().any(|t| t == principal_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionAcl {
    pub region_id: RegionId,
    pub entries: Vec<AclEntry>,
}

impl RegionAcl {
    pub fn new(region_id: impl Into<RegionId>, entries: Vec<AclEntry>) -> Self {
        Self {
            region_id: region_id.into(),
            entries,
        }
    }

    pub fn effective_permissions(&self, principal: &Principal) -> PermissionSet {
        self.entries
            .iter()
            .filter(|e| principal.matches(e.principal_type, &e.principal_id))
            .fold(PermissionSet::NONE, |acc, e| acc.union(e.permission_set))
    }

    pub fn can_share(&self, principal: &Principal) -> bool {
        self.effective_permissions(principal).share
    }

    /// Fail with [`CoreError::Forbidden`] unless `actor` holds `share`.
    pub fn authorize_share(&self, actor: &Principal) -> Result<(), CoreError> {
        if self.can_share(actor) {
            return Ok(());
        }
        tracing::warn!(
            region_id = %self.region_id,
            user_id = %actor.user_id,
            "ACL change rejected: missing share permission"
        );
        Err(CoreError::Forbidden(format!(
            "User '{}' cannot share region '{}'",
            actor.user_id, self.region_id
        )))
    }

    pub fn find(&self, principal_type: PrincipalType, principal_id: &str) -> Option<&AclEntry> {
        self.entries
            .iter()
            .find(|e| e.principal_type == principal_type && e.principal_id == principal_id)
    }

    /// Insert or replace the entry for the grant's principal.
    pub fn set_acl(&mut self, actor: &Principal, grant: AclGrant) -> Result<&AclEntry, CoreError> {
        self.authorize_share(actor)?;
        if grant.principal_id.trim().is_empty() {
            return Err(CoreError::Validation(
                "Principal id must not be empty".to_string(),
            ));
        }

        let existing = self.entries.iter().position(|e| {
            e.principal_type == grant.principal_type && e.principal_id == grant.principal_id
        });
        let index = match existing {
            Some(i) => {
                self.entries[i].permission_set = grant.permission_set;
                i
            }
            None => {
                self.entries.push(AclEntry {
                    id: uuid::Uuid::new_v4().to_string(),
                    region_id: self.region_id.clone(),
                    principal_type: grant.principal_type,
                    principal_id: grant.principal_id,
                    permission_set: grant.permission_set,
                });
                self.entries.len() - 1
            }
        };
        Ok(&self.entries[index])
    }

    pub fn remove_acl(&mut self, actor: &Principal, acl_id: &str) -> Result<AclEntry, CoreError> {
        self.authorize_share(actor)?;
        let index = self
            .entries
            .iter()
            .position(|e| e.id == acl_id)
            .ok_or_else(|| CoreError::not_found("AclEntry", acl_id))?;
        Ok(self.entries.remove(index))
    }
}
