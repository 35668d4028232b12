use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::domains::decode_rows;
use crate::domains::user::{ParentChildRelation, User, UserProfile, ROLE_CHILD};
use crate::error::{NestwatchError, Result};
use crate::interfaces::store::{Filter, StorageGateway};

/// One parent/child edge with both user records joined in.
#[derive(Debug, Clone, Serialize)]
pub struct FamilyRelation {
    pub parent_user_id: i64,
    pub child_user_id: i64,
    pub parent: Option<UserProfile>,
    pub child: Option<UserProfile>,
}

pub struct FamilyService {
    store: Arc<dyn StorageGateway>,
}

impl FamilyService {
    pub fn new(store: Arc<dyn StorageGateway>) -> Self {
        Self { store }
    }

    pub async fn children(&self, parent_user_id: i64) -> Result<Vec<FamilyRelation>> {
        let edge_rows = self
            .store
            .select(
                "parent_child_relations",
                &["parent_user_id", "child_user_id"],
                &[Filter::eq("parent_user_id", parent_user_id)],
            )
            .await?;
        let edges: Vec<ParentChildRelation> = decode_rows(edge_rows)?;
        if edges.is_empty() {
            return Ok(Vec::new());
        }

        let mut user_ids: Vec<i64> = edges
            .iter()
            .flat_map(|edge| [edge.parent_user_id, edge.child_user_id])
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let user_rows = self
            .store
            .select(
                "users",
                &["user_id", "username", "role", "user_age"],
                &[Filter::is_in(
                    "user_id",
                    user_ids.into_iter().map(Value::from).collect(),
                )],
            )
            .await?;
        let users: Vec<User> = decode_rows(user_rows)?;

        let profile = |user_id: i64| {
            users.iter().find(|u| u.user_id == user_id).map(|u| UserProfile {
                username: u.username.clone(),
                role: u.role.clone(),
                user_age: u.user_age,
            })
        };

        Ok(edges
            .into_iter()
            .map(|edge| FamilyRelation {
                parent_user_id: edge.parent_user_id,
                child_user_id: edge.child_user_id,
                parent: profile(edge.parent_user_id),
                child: profile(edge.child_user_id),
            })
            .collect())
    }

    /// Creates the child account, then the relation edge. The two writes are
    /// not transactional behind this gateway, so a failed edge insert triggers
    /// a compensating delete of the just-created user row.
    pub async fn add_child(
        &self,
        parent_user_id: i64,
        child_name: &str,
        child_age: i64,
    ) -> Result<i64> {
        let created = self
            .store
            .insert(
                "users",
                json!({
                    "username": child_name,
                    "role": ROLE_CHILD,
                    "user_age": child_age,
                }),
            )
            .await?;
        let child_user_id = created
            .get("user_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                NestwatchError::Upstream("user insert returned no user_id".to_string())
            })?;

        let edge = json!({
            "parent_user_id": parent_user_id,
            "child_user_id": child_user_id,
        });
        if let Err(err) = self.store.insert("parent_child_relations", edge).await {
            if let Err(cleanup) = self
                .store
                .delete("users", &[Filter::eq("user_id", child_user_id)])
                .await
            {
                tracing::warn!(
                    "failed to clean up orphan child user {child_user_id}: {cleanup}"
                );
            }
            return Err(err);
        }

        Ok(child_user_id)
    }

    /// Removes the relation edge only; the child's user row is retained.
    pub async fn remove_child(&self, parent_user_id: i64, child_user_id: i64) -> Result<()> {
        self.store
            .delete(
                "parent_child_relations",
                &[
                    Filter::eq("parent_user_id", parent_user_id),
                    Filter::eq("child_user_id", child_user_id),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn rename_child(&self, child_user_id: i64, new_name: &str) -> Result<()> {
        self.store
            .update(
                "users",
                json!({ "username": new_name }),
                &[Filter::eq("user_id", child_user_id)],
            )
            .await?;
        Ok(())
    }
}
