use std::sync::Arc;

use serde_json::json;

use nestwatch::interfaces::store::{Filter, StorageGateway};
use nestwatch::services::family::FamilyService;

mod common;
use common::{monitoring_store, seed_parent_with_children, FailTableStore};

#[tokio::test]
async fn add_child_creates_user_and_relation() {
    let store = Arc::new(monitoring_store());
    let service = FamilyService::new(store.clone());

    let child_user_id = service.add_child(1, "alice", 9).await.unwrap();
    assert_eq!(child_user_id, 1);

    let users = store
        .select("users", &[], &[Filter::eq("user_id", child_user_id)])
        .await
        .unwrap();
    assert_eq!(users[0].get("role"), Some(&json!("child")));
    assert_eq!(users[0].get("username"), Some(&json!("alice")));

    let edges = store
        .select(
            "parent_child_relations",
            &[],
            &[Filter::eq("child_user_id", child_user_id)],
        )
        .await
        .unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].get("parent_user_id"), Some(&json!(1)));
}

#[tokio::test]
async fn add_child_cleans_up_orphan_user_when_edge_insert_fails() {
    let store = Arc::new(FailTableStore {
        inner: monitoring_store(),
        fail_inserts_into: "parent_child_relations",
    });
    let service = FamilyService::new(store.clone());

    assert!(service.add_child(1, "alice", 9).await.is_err());

    // The compensating delete removed the just-created user row.
    let users = store.select("users", &[], &[]).await.unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn remove_child_deletes_only_the_relation() {
    let store = Arc::new(monitoring_store());
    seed_parent_with_children(&store, 1, &[(2, "alice")]).await;
    let service = FamilyService::new(store.clone());

    service.remove_child(1, 2).await.unwrap();

    let edges = store
        .select("parent_child_relations", &[], &[])
        .await
        .unwrap();
    assert!(edges.is_empty());

    // The child's user row is retained.
    let users = store
        .select("users", &[], &[Filter::eq("user_id", 2)])
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn rename_child_updates_username_only() {
    let store = Arc::new(monitoring_store());
    seed_parent_with_children(&store, 1, &[(2, "alice")]).await;
    let service = FamilyService::new(store.clone());

    service.rename_child(2, "alicia").await.unwrap();

    let users = store
        .select("users", &[], &[Filter::eq("user_id", 2)])
        .await
        .unwrap();
    assert_eq!(users[0].get("username"), Some(&json!("alicia")));
    assert_eq!(users[0].get("user_age"), Some(&json!(10)));
}

#[tokio::test]
async fn children_roster_joins_both_ends_of_each_edge() {
    let store = Arc::new(monitoring_store());
    seed_parent_with_children(&store, 1, &[(2, "alice"), (3, "bob")]).await;
    let service = FamilyService::new(store);

    let roster = service.children(1).await.unwrap();
    assert_eq!(roster.len(), 2);

    let alice = roster.iter().find(|r| r.child_user_id == 2).unwrap();
    assert_eq!(alice.parent_user_id, 1);
    assert_eq!(
        alice.child.as_ref().unwrap().username.as_deref(),
        Some("alice")
    );
    assert_eq!(
        alice.parent.as_ref().unwrap().role.as_deref(),
        Some("parent")
    );

    // Unknown parent resolves to an empty roster.
    let service = FamilyService::new(Arc::new(monitoring_store()));
    assert!(service.children(1).await.unwrap().is_empty());
}
