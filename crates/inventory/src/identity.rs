//! User-identity resolution at the service boundary
//!
//! The member directory tolerates more than one member row per user
//! identity. Rather than comparing a caller against a single member id,
//! every permission check resolves the caller's full identity set and
//! tests membership in it. The duplication itself is a data-quality
//! artifact of the upstream directory, not a feature; see DESIGN.md.

use crate::error::{InventoryError, InventoryResult};
use crate::store::traits::MemberStore;
use crate::types::Member;
use common::{MemberId, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// The resolved identity behind one user: a primary member row plus the
/// full set of member ids owned by that user.
#[derive(Debug, Clone)]
pub struct MemberIdentity {
    pub primary: Member,
    pub member_ids: HashSet<MemberId>,
}

impl MemberIdentity {
    /// Whether this identity owns the given member id
    pub fn owns(&self, member_id: MemberId) -> bool {
        self.member_ids.contains(&member_id)
    }

    /// The primary member id (oldest row for the user)
    pub fn primary_id(&self) -> MemberId {
        self.primary.member_id
    }
}

/// Resolves user ids to member identity sets
pub struct IdentityResolver {
    members: Arc<dyn MemberStore>,
}

impl IdentityResolver {
    pub fn new(members: Arc<dyn MemberStore>) -> Self {
        Self { members }
    }

    /// Resolve a user to its member identity
    ///
    /// The oldest member row is the primary. Errors with `UserNotFound`
    /// when the user has no member rows at all.
    pub async fn resolve(&self, user_id: UserId) -> InventoryResult<MemberIdentity> {
        let ids = self.members.member_ids_for_user(user_id).await?;

        let primary_id = *ids
            .first()
            .ok_or(InventoryError::UserNotFound(user_id))?;

        if ids.len() > 1 {
            warn!(
                %user_id,
                rows = ids.len(),
                "User has multiple member rows; treating the full set as one identity"
            );
        }

        let primary = self
            .members
            .get(primary_id)
            .await?
            .ok_or(InventoryError::MemberNotFound(primary_id))?;

        Ok(MemberIdentity {
            primary,
            member_ids: ids.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryInventory;
    use chrono::Utc;

    #[tokio::test]
    async fn test_resolve_unknown_user_fails() {
        let store = Arc::new(InMemoryInventory::new());
        let resolver = IdentityResolver::new(store);

        let result = resolver.resolve(UserId::new()).await;
        assert!(matches!(result, Err(InventoryError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_merges_duplicate_rows() {
        let store = Arc::new(InMemoryInventory::new());
        let user = UserId::new();

        let mut old = Member::new(user, "reader", "london");
        old.created_at = Utc::now() - chrono::Duration::days(30);
        let old_id = old.member_id;
        let dup = Member::new(user, "reader-dup", "london");
        let dup_id = dup.member_id;

        store.upsert(old).await.unwrap();
        store.upsert(dup).await.unwrap();

        let resolver = IdentityResolver::new(store);
        let identity = resolver.resolve(user).await.unwrap();

        assert_eq!(identity.primary_id(), old_id);
        assert!(identity.owns(old_id));
        assert!(identity.owns(dup_id));
        assert!(!identity.owns(MemberId::new()));
    }
}
