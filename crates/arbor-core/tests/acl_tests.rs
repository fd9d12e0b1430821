//! ACL-inheritance integration tests.
//!
//! Covers subtree re-parenting (including the byte-identical no-op case),
//! privilege-hierarchy satisfaction, group-granted entries, and the
//! ACL-filtered children cursor.

use arbor_core::{AclFilter, RepoError};
use arbor_test_fixtures::{
    memory_repository, new_collection, new_group, new_resource, new_user,
};
use arbor_types::{Depth, GcMode};

#[tokio::test]
async fn reparent_to_the_same_parent_is_byte_identical() {
    let repo = memory_repository(GcMode::Inline).await;
    let root = repo.root_id();

    let a = new_collection(&repo, root, "a").await.unwrap();
    let b = new_resource(&repo, a, "b").await.unwrap();
    let alice = new_user(&repo).await.unwrap();

    repo.add_ace(root, alice, "read", true, false).await.unwrap();
    repo.add_ace(a, alice, "write", true, true).await.unwrap();

    let before = repo.resolve_aces(b).await.unwrap();
    let touched = repo.reparent_acl(a, root).await.unwrap();
    assert_eq!(touched, 0);
    let after = repo.resolve_aces(b).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn reparent_moves_the_whole_inheritance_subtree() {
    let repo = memory_repository(GcMode::Inline).await;
    let root = repo.root_id();

    let x = new_collection(&repo, root, "x").await.unwrap();
    let y = new_collection(&repo, root, "y").await.unwrap();
    let sub = new_collection(&repo, x, "sub").await.unwrap();
    let leaf = new_resource(&repo, sub, "leaf").await.unwrap();
    let alice = new_user(&repo).await.unwrap();

    repo.add_ace(x, alice, "read", true, false).await.unwrap();
    repo.add_ace(y, alice, "write", true, false).await.unwrap();

    // Inherited through x: the read grant applies to the leaf.
    let winners = repo.resolve_aces(leaf).await.unwrap();
    assert!(winners.iter().any(|ace| ace.resource_id == x));
    assert!(!winners.iter().any(|ace| ace.resource_id == y));

    // Move sub (and transitively leaf) under y: two path rows rewritten.
    let touched = repo.reparent_acl(sub, y).await.unwrap();
    assert_eq!(touched, 2);

    let winners = repo.resolve_aces(leaf).await.unwrap();
    assert!(winners.iter().any(|ace| ace.resource_id == y));
    assert!(!winners.iter().any(|ace| ace.resource_id == x));
}

#[tokio::test]
async fn reparent_into_the_moved_subtree_fails() {
    let repo = memory_repository(GcMode::Inline).await;
    let root = repo.root_id();

    let a = new_collection(&repo, root, "a").await.unwrap();
    let b = new_collection(&repo, a, "b").await.unwrap();

    let err = repo.reparent_acl(a, b).await.unwrap_err();
    assert!(matches!(err, RepoError::PreconditionFailed(_)));
}

#[tokio::test]
async fn granted_all_satisfies_contained_privileges() {
    let repo = memory_repository(GcMode::Inline).await;
    let root = repo.root_id();

    let doc = new_resource(&repo, root, "doc").await.unwrap();
    let alice = new_user(&repo).await.unwrap();

    repo.add_ace(root, alice, "all", true, false).await.unwrap();

    assert!(repo.check_privilege(alice, doc, "read").await.unwrap());
    assert!(repo.check_privilege(alice, doc, "write").await.unwrap());
    assert!(repo.check_privilege(alice, doc, "all").await.unwrap());

    // Containment is one-directional.
    let bob = new_user(&repo).await.unwrap();
    repo.add_ace(root, bob, "read", true, false).await.unwrap();
    assert!(repo.check_privilege(bob, doc, "read").await.unwrap());
    assert!(!repo.check_privilege(bob, doc, "write").await.unwrap());
    assert!(!repo.check_privilege(bob, doc, "all").await.unwrap());
}

#[tokio::test]
async fn group_granted_entries_apply_to_transitive_members() {
    let repo = memory_repository(GcMode::Inline).await;
    let root = repo.root_id();

    let doc = new_resource(&repo, root, "doc").await.unwrap();
    let staff = new_group(&repo).await.unwrap();
    let eng = new_group(&repo).await.unwrap();
    let alice = new_user(&repo).await.unwrap();

    repo.add_group_member(staff, eng).await.unwrap();
    repo.add_group_member(eng, alice).await.unwrap();
    repo.add_ace(root, staff, "read", true, false).await.unwrap();

    assert!(repo.check_privilege(alice, doc, "read").await.unwrap());

    // Removing the nested link revokes the inherited grant.
    repo.remove_group_member(staff, eng).await.unwrap();
    assert!(!repo.check_privilege(alice, doc, "read").await.unwrap());
}

#[tokio::test]
async fn nearer_deny_beats_farther_grant() {
    let repo = memory_repository(GcMode::Inline).await;
    let root = repo.root_id();

    let a = new_collection(&repo, root, "a").await.unwrap();
    let leaf = new_resource(&repo, a, "leaf").await.unwrap();
    let alice = new_user(&repo).await.unwrap();

    repo.add_ace(root, alice, "read", true, false).await.unwrap();
    repo.add_ace(a, alice, "read", false, false).await.unwrap();

    assert!(!repo.check_privilege(alice, leaf, "read").await.unwrap());
    // The grant still applies where the deny is not on the chain.
    let other = new_resource(&repo, root, "other").await.unwrap();
    assert!(repo.check_privilege(alice, other, "read").await.unwrap());
}

#[tokio::test]
async fn filtered_children_silently_omit_denied_rows() {
    let repo = memory_repository(GcMode::Inline).await;
    let root = repo.root_id();

    let docs = new_collection(&repo, root, "docs").await.unwrap();
    let visible = new_resource(&repo, docs, "visible").await.unwrap();
    let hidden = new_resource(&repo, docs, "hidden").await.unwrap();
    let alice = new_user(&repo).await.unwrap();

    repo.add_ace(docs, alice, "read", true, false).await.unwrap();
    repo.add_ace(hidden, alice, "read", false, false).await.unwrap();

    let seen = repo
        .children(docs, Depth::One, Some(AclFilter::read(alice)))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    let ids: Vec<_> = seen.iter().map(|r| r.id).collect();
    assert!(ids.contains(&docs));
    assert!(ids.contains(&visible));
    assert!(!ids.contains(&hidden));
}
