//! Grant store tests: bitmask evaluation, revocation, group indirection
//!
//! Every scenario runs against both the LMDB and the in-memory storage.

use std::sync::Arc;
use std::thread;

use permitbit::{
    Acl, Actor, ClassId, Fingerprint, Fingerprintable, GrantStorage, LmdbStorage, MemoryStorage,
    PermissionRegistry, PermitError, StoreConfig, Via, MAX_FINGERPRINT_LEN,
};
use tempfile::TempDir;

struct User(&'static str);

impl Fingerprintable for User {
    fn type_qualifier(&self) -> &str {
        "User"
    }
    fn identifier(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

impl Actor for User {}

struct Group(&'static str);

impl Fingerprintable for Group {
    fn type_qualifier(&self) -> &str {
        "Group"
    }
    fn identifier(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

impl Actor for Group {}

struct Doc(Option<u64>);

impl Fingerprintable for Doc {
    fn type_qualifier(&self) -> &str {
        "Document"
    }
    fn identifier(&self) -> Option<String> {
        self.0.map(|id| id.to_string())
    }
}

/// Entity with an arbitrary string identifier
struct Tag(String);

impl Fingerprintable for Tag {
    fn type_qualifier(&self) -> &str {
        "Tag"
    }
    fn identifier(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl Actor for Tag {}

fn permissions() -> Arc<permitbit::PermissionTable> {
    let mut r = PermissionRegistry::new();
    r.register("read").unwrap();
    r.register("write").unwrap();
    r.register("delete").unwrap();
    r.register_composite("edit", &["read", "write"]).unwrap();
    r.freeze()
}

fn lmdb() -> (TempDir, Acl<LmdbStorage>) {
    let dir = TempDir::new().unwrap();
    let storage = LmdbStorage::open(&StoreConfig::new(dir.path())).unwrap();
    (dir, Acl::new(storage, permissions()))
}

fn memory() -> Acl<MemoryStorage> {
    Acl::new(MemoryStorage::new(), permissions())
}

/// Run a scenario against both backends
macro_rules! both_backends {
    ($name:ident) => {
        mod $name {
            #[test]
            fn lmdb() {
                let (_dir, acl) = super::lmdb();
                super::$name(&acl);
            }

            #[test]
            fn memory() {
                super::$name(&super::memory());
            }
        }
    };
}

// ============================================================================
// Basic grant / check / revoke
// ============================================================================

/// Verify grant, check and revoke of a single permission
fn grant_check_revoke<S: GrantStorage>(acl: &Acl<S>) {
    let (t, x) = (Doc(Some(1)), User("x"));

    acl.grant(&t, &x, &["read"]).unwrap();
    assert!(acl.check(&t, &x, "read").unwrap());
    assert!(!acl.check(&t, &x, "write").unwrap());

    acl.revoke(&t, &x).unwrap();
    assert!(!acl.check(&t, &x, "read").unwrap());
}
both_backends!(grant_check_revoke);

/// Verify a target with no rows denies everything, without error
fn empty_target_denies<S: GrantStorage>(acl: &Acl<S>) {
    let (t, x) = (Doc(Some(99)), User("x"));
    for p in ["read", "write", "delete", "edit"] {
        assert!(!acl.check(&t, &x, p).unwrap());
    }
    assert!(acl.grants_on(&t).unwrap().is_empty());
}
both_backends!(empty_target_denies);

/// Verify revoking a grant that never existed is a no-op
fn revoke_is_idempotent<S: GrantStorage>(acl: &Acl<S>) {
    let (t, x) = (Doc(Some(1)), User("x"));
    assert_eq!(acl.revoke(&t, &x).unwrap(), 0);
    acl.grant(&t, &x, &["read"]).unwrap();
    assert_eq!(acl.revoke(&t, &x).unwrap(), 1);
    assert_eq!(acl.revoke(&t, &x).unwrap(), 0);
}
both_backends!(revoke_is_idempotent);

/// Verify revoking one pair leaves other actors and targets alone
fn revoke_is_scoped_to_pair<S: GrantStorage>(acl: &Acl<S>) {
    let (t1, t2) = (Doc(Some(1)), Doc(Some(2)));
    let (x, y) = (User("x"), User("y"));
    acl.grant(&t1, &x, &["read"]).unwrap();
    acl.grant(&t1, &y, &["read"]).unwrap();
    acl.grant(&t2, &x, &["read"]).unwrap();

    acl.revoke(&t1, &x).unwrap();
    assert!(!acl.check(&t1, &x, "read").unwrap());
    assert!(acl.check(&t1, &y, "read").unwrap());
    assert!(acl.check(&t2, &x, "read").unwrap());
}
both_backends!(revoke_is_scoped_to_pair);

// ============================================================================
// Bitmask semantics
// ============================================================================

/// Verify check is true iff every requested bit is in one stored mask
fn bitmask_subset<S: GrantStorage>(acl: &Acl<S>) {
    let (t, x) = (Doc(Some(1)), User("x"));
    let g = acl.grant(&t, &x, &["read", "delete"]).unwrap();
    assert_eq!(g.grants, 0b101);

    let table = acl.permissions();
    for p in table.iter() {
        let expected = p.bits() & g.grants == p.bits();
        assert_eq!(acl.check(&t, &x, p.name()).unwrap(), expected, "{}", p.name());
    }
}
both_backends!(bitmask_subset);

/// Verify a composite needs all of its bits on a single row
fn composite_needs_one_row<S: GrantStorage>(acl: &Acl<S>) {
    let (t, x) = (Doc(Some(1)), User("x"));
    acl.grant(&t, &x, &["read"]).unwrap();
    acl.grant(&t, &x, &["write"]).unwrap();
    assert!(acl.check(&t, &x, "read").unwrap());
    assert!(acl.check(&t, &x, "write").unwrap());
    assert!(!acl.check(&t, &x, "edit").unwrap());

    acl.grant(&t, &x, &["edit"]).unwrap();
    assert!(acl.check(&t, &x, "edit").unwrap());
    assert_eq!(acl.grants_on(&t).unwrap().len(), 3);
}
both_backends!(composite_needs_one_row);

// ============================================================================
// Error cases
// ============================================================================

/// Verify empty or fully unknown permission lists write nothing
fn empty_grant_rejected<S: GrantStorage>(acl: &Acl<S>) {
    let (t, x) = (Doc(Some(1)), User("x"));
    assert!(matches!(acl.grant(&t, &x, &[]), Err(PermitError::EmptyGrant { .. })));
    assert!(matches!(
        acl.grant(&t, &x, &["nope", "also_nope"]),
        Err(PermitError::EmptyGrant { .. })
    ));
    assert!(acl.grants_on(&t).unwrap().is_empty());

    // unknown names next to known ones are skipped
    let g = acl.grant(&t, &x, &["nope", "write"]).unwrap();
    assert_eq!(g.grants, 0b010);
}
both_backends!(empty_grant_rejected);

/// Verify checking an unregistered permission is an error
fn unknown_permission_on_check<S: GrantStorage>(acl: &Acl<S>) {
    let (t, x) = (Doc(Some(1)), User("x"));
    assert!(matches!(
        acl.check(&t, &x, "launch"),
        Err(PermitError::UnknownPermission(n)) if n == "launch"
    ));
}
both_backends!(unknown_permission_on_check);

/// Verify entities without an identifier cannot be granted or checked
fn unsaved_target_rejected<S: GrantStorage>(acl: &Acl<S>) {
    let x = User("x");
    assert!(matches!(
        acl.grant(&Doc(None), &x, &["read"]),
        Err(PermitError::NotFingerprintable(_))
    ));
    assert!(matches!(
        acl.check(&Doc(None), &x, "read"),
        Err(PermitError::NotFingerprintable(_))
    ));
}
both_backends!(unsaved_target_rejected);

// ============================================================================
// Group indirection
// ============================================================================

/// Verify members of a granted group hold its permissions
fn group_grants_reach_members<S: GrantStorage>(acl: &Acl<S>) {
    let (t, staff, alice) = (Doc(Some(1)), Group("staff"), User("alice"));
    acl.grant(&t, &staff, &["read"]).unwrap();
    assert!(!acl.check(&t, &alice, "read").unwrap());

    assert!(acl.add_member(&staff, &alice).unwrap());
    assert!(acl.check(&t, &alice, "read").unwrap());
    assert!(!acl.check(&t, &alice, "write").unwrap());
    assert_eq!(
        acl.access_via(&t, &alice, "read").unwrap(),
        Some(Via::Group(Fingerprint::parse("Group/staff").unwrap()))
    );

    assert!(acl.remove_member(&staff, &alice).unwrap());
    assert!(!acl.check(&t, &alice, "read").unwrap());
}
both_backends!(group_grants_reach_members);

/// Verify indirection stops at one level
fn indirection_is_one_level<S: GrantStorage>(acl: &Acl<S>) {
    let (t, x, y, a) = (Doc(Some(1)), Group("x"), Group("y"), User("a"));
    acl.grant(&t, &x, &["read"]).unwrap();
    acl.add_member(&x, &y).unwrap();
    acl.add_member(&y, &a).unwrap();

    assert!(acl.check(&t, &y, "read").unwrap());
    assert!(!acl.check(&t, &a, "read").unwrap());
}
both_backends!(indirection_is_one_level);

/// Verify direct rows are reported ahead of group rows
fn direct_wins_over_group<S: GrantStorage>(acl: &Acl<S>) {
    let (t, g, a) = (Doc(Some(1)), Group("g"), User("a"));
    acl.grant(&t, &g, &["read"]).unwrap();
    acl.add_member(&g, &a).unwrap();
    acl.grant(&t, &a, &["read"]).unwrap();
    assert_eq!(acl.access_via(&t, &a, "read").unwrap(), Some(Via::Direct));
}
both_backends!(direct_wins_over_group);

/// Verify membership listings in both directions
fn membership_listings<S: GrantStorage>(acl: &Acl<S>) {
    let (g1, g2, a) = (Group("g1"), Group("g2"), User("a"));
    acl.add_member(&g1, &a).unwrap();
    acl.add_member(&g2, &a).unwrap();
    assert!(!acl.add_member(&g2, &a).unwrap());

    let groups: Vec<String> = acl.groups_of(&a).unwrap().into_iter().map(String::from).collect();
    assert_eq!(groups, vec!["Group/g1", "Group/g2"]);
    assert_eq!(acl.members_of(&g1).unwrap(), vec![Fingerprint::parse("User/a").unwrap()]);
}
both_backends!(membership_listings);

// ============================================================================
// Listings, purge, class-level grants
// ============================================================================

/// Verify grants_on / grants_of return whole rows
fn listings<S: GrantStorage>(acl: &Acl<S>) {
    let (t1, t2, x) = (Doc(Some(1)), Doc(Some(2)), User("x"));
    acl.grant(&t1, &x, &["read"]).unwrap();
    acl.grant(&t2, &x, &["write"]).unwrap();

    let of_x = acl.grants_of(&x).unwrap();
    assert_eq!(of_x.len(), 2);
    assert!(of_x.iter().all(|g| g.actor.as_str() == "User/x"));

    let on_t1 = acl.grants_on(&t1).unwrap();
    assert_eq!(on_t1.len(), 1);
    assert_eq!(on_t1[0].target.as_str(), "Document/1");
    assert_eq!(acl.permissions().names_of(on_t1[0].grants), vec!["read"]);
    assert!(on_t1[0].created_at > 0);
}
both_backends!(listings);

/// Verify purging an entity removes its rows on both sides and its memberships
fn purge_entity<S: GrantStorage>(acl: &Acl<S>) {
    let (t, g, a, b) = (Doc(Some(1)), Group("g"), User("a"), User("b"));
    acl.grant(&t, &a, &["read"]).unwrap();
    acl.grant(&t, &g, &["read"]).unwrap();
    acl.add_member(&g, &b).unwrap();

    assert_eq!(acl.purge(&g).unwrap(), 1);
    assert!(!acl.check(&t, &b, "read").unwrap());
    assert!(acl.groups_of(&b).unwrap().is_empty());

    assert_eq!(acl.purge(&t).unwrap(), 1);
    assert!(acl.grants_of(&a).unwrap().is_empty());
}
both_backends!(purge_entity);

/// Verify classes are valid grant targets
fn class_level_grants<S: GrantStorage>(acl: &Acl<S>) {
    const DOCUMENT: ClassId = ClassId::new("Document");
    let x = User("x");
    acl.grant(&DOCUMENT, &x, &["write"]).unwrap();
    assert!(acl.check(&DOCUMENT, &x, "write").unwrap());
    // class rows do not leak onto instances
    assert!(!acl.check(&Doc(Some(1)), &x, "write").unwrap());
    assert_eq!(acl.grants_of(&x).unwrap()[0].target.as_str(), "class/Document");
}
both_backends!(class_level_grants);

/// Verify the longest allowed fingerprints work on both sides of a row
fn longest_fingerprints<S: GrantStorage>(acl: &Acl<S>) {
    let fill = MAX_FINGERPRINT_LEN - "Tag/".len();
    let (t, a) = (Tag("t".repeat(fill)), Tag("a".repeat(fill)));
    acl.grant(&t, &a, &["read"]).unwrap();
    acl.add_member(&t, &a).unwrap();
    assert!(acl.check(&t, &a, "read").unwrap());
    assert_eq!(acl.grants_on(&t).unwrap()[0].actor.as_str().len(), MAX_FINGERPRINT_LEN);

    let too_long = Tag("t".repeat(fill + 1));
    assert!(matches!(
        acl.grant(&too_long, &a, &["read"]),
        Err(PermitError::NotFingerprintable(_))
    ));
}
both_backends!(longest_fingerprints);

/// Verify fingerprints sharing a prefix stay separate
fn similar_fingerprints_do_not_collide<S: GrantStorage>(acl: &Acl<S>) {
    let (t1, t10) = (Doc(Some(1)), Doc(Some(10)));
    let x = User("x");
    acl.grant(&t10, &x, &["read"]).unwrap();
    assert!(!acl.check(&t1, &x, "read").unwrap());
    assert!(acl.grants_on(&t1).unwrap().is_empty());
}
both_backends!(similar_fingerprints_do_not_collide);

// ============================================================================
// Durability and concurrency
// ============================================================================

/// Verify rows survive reopening the LMDB store
#[test]
fn lmdb_rows_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::new(dir.path());
    {
        let acl = Acl::new(LmdbStorage::open(&config).unwrap(), permissions());
        acl.grant(&Doc(Some(1)), &User("x"), &["read"]).unwrap();
    }
    let acl = Acl::new(LmdbStorage::open(&config).unwrap(), permissions());
    assert!(acl.check(&Doc(Some(1)), &User("x"), "read").unwrap());
    let next = acl.grant(&Doc(Some(1)), &User("x"), &["write"]).unwrap();
    assert_eq!(next.id, 2);
}

/// Verify both membership directions agree after racing adds and removes
fn concurrent_membership_stays_consistent<S: GrantStorage>(acl: &Acl<S>) {
    let t = Doc(Some(1));
    let groups = [Group("a"), Group("b")];
    let users = [User("u1"), User("u2")];
    for g in &groups {
        acl.grant(&t, g, &["read"]).unwrap();
    }

    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                for _ in 0..200 {
                    for g in &groups {
                        for u in &users {
                            acl.add_member(g, u).unwrap();
                        }
                    }
                }
            });
            s.spawn(|| {
                for _ in 0..200 {
                    for g in &groups {
                        for u in &users {
                            acl.remove_member(g, u).unwrap();
                        }
                    }
                }
            });
        }
    });

    for g in &groups {
        let members = acl.members_of(g).unwrap();
        for u in &users {
            let forward = members.contains(&permitbit::fingerprint(u).unwrap());
            let reverse = acl.groups_of(u).unwrap().contains(&permitbit::fingerprint(g).unwrap());
            assert_eq!(forward, reverse, "{} / {}", g.0, u.0);
        }
    }

    for g in &groups {
        for u in &users {
            acl.remove_member(g, u).unwrap();
        }
    }
    for u in &users {
        assert!(acl.groups_of(u).unwrap().is_empty());
        assert!(!acl.check(&t, u, "read").unwrap());
    }
}
both_backends!(concurrent_membership_stays_consistent);

/// Verify concurrent writers on different pairs all land
fn concurrent_grants<S: GrantStorage + 'static>(acl: Arc<Acl<S>>) {
    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let acl = Arc::clone(&acl);
            thread::spawn(move || {
                for j in 0..25u64 {
                    acl.grant(&Doc(Some(i * 100 + j)), &User("w"), &["read"]).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(acl.grants_of(&User("w")).unwrap().len(), 200);
    assert!(acl.check(&Doc(Some(724)), &User("w"), "read").unwrap());
}

#[test]
fn concurrent_grants_lmdb() {
    let (_dir, acl) = lmdb();
    concurrent_grants(Arc::new(acl));
}

#[test]
fn concurrent_grants_memory() {
    concurrent_grants(Arc::new(memory()));
}
