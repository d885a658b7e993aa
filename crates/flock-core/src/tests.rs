use std::collections::HashSet;

use proptest::prelude::*;

use crate::{
    AccountRef, AccountRefError, FollowerId, RecentRing, RichWalk, RunCounters, Sighting,
    Timestamp, reconcile,
};

fn ids(raw: &[u64]) -> HashSet<FollowerId> {
    raw.iter().copied().map(FollowerId::from).collect()
}

#[test]
fn reconcile_concrete_scenario() {
    let res = reconcile(&ids(&[10, 20, 30]), &ids(&[20, 30, 40]));

    assert_eq!(res.new_ids, ids(&[40]));
    assert_eq!(res.gone_ids, ids(&[10]));
    assert!(res.spare_ids.is_empty());
}

#[test]
fn reconcile_identical_snapshots_is_empty() {
    let snapshot = ids(&[1, 2, 3]);
    assert!(reconcile(&snapshot, &snapshot).is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

    #[test]
    fn reconcile_matches_set_difference(
        local in proptest::collection::hash_set(0u64..64, 0..32),
        remote in proptest::collection::hash_set(0u64..64, 0..32),
    ) {
        let local: HashSet<FollowerId> = local.into_iter().map(FollowerId::from).collect();
        let remote: HashSet<FollowerId> = remote.into_iter().map(FollowerId::from).collect();

        let res = reconcile(&local, &remote);

        prop_assert_eq!(&res.new_ids, &remote.difference(&local).copied().collect::<HashSet<_>>());
        prop_assert_eq!(&res.gone_ids, &local.difference(&remote).copied().collect::<HashSet<_>>());
        prop_assert!(res.new_ids.is_disjoint(&res.gone_ids));
        prop_assert!(res.new_ids.is_disjoint(&res.spare_ids));
        prop_assert!(res.gone_ids.is_disjoint(&res.spare_ids));
    }

    #[test]
    fn rich_walk_without_spares_agrees_with_reconcile(
        local in proptest::collection::hash_set(0u64..64, 0..32),
        remote in proptest::collection::hash_set(0u64..64, 0..32),
    ) {
        let local: HashSet<FollowerId> = local.into_iter().map(FollowerId::from).collect();
        let remote: HashSet<FollowerId> = remote.into_iter().map(FollowerId::from).collect();

        let mut walk = RichWalk::new(local.clone(), &remote);
        for id in &remote {
            walk.observe(*id);
        }
        prop_assert!(walk.take_spares().is_empty());

        prop_assert_eq!(walk.finish(), reconcile(&local, &remote));
    }
}

#[test]
fn rich_walk_classifies_sightings() {
    let mut walk = RichWalk::new(ids(&[1, 2]), &ids(&[1, 3]));

    assert_eq!(walk.observe(1.into()), Sighting::Existing);
    assert_eq!(walk.observe(3.into()), Sighting::New);
    assert_eq!(walk.observe(3.into()), Sighting::Repeat);
    assert_eq!(walk.observe(1.into()), Sighting::Repeat);
}

#[test]
fn rich_walk_spare_is_not_gone() {
    // id-only listing knows {1,2,3}, the rich listing only shows {1,2}
    let mut walk = RichWalk::new(ids(&[1, 2, 3]), &ids(&[1, 2, 3]));
    walk.observe(1.into());
    walk.observe(2.into());

    assert_eq!(walk.take_spares(), vec![FollowerId::from(3)]);
    assert_eq!(walk.resolve_spare(3.into()), Some(Sighting::Existing));
    // second resolution is ignored
    assert_eq!(walk.resolve_spare(3.into()), None);

    let res = walk.finish();
    assert_eq!(res.spare_ids, ids(&[3]));
    assert!(res.gone_ids.is_empty());
    assert!(res.new_ids.is_empty());
}

#[test]
fn rich_walk_unresolved_local_spare_is_gone() {
    let mut walk = RichWalk::new(ids(&[1, 5]), &ids(&[1, 5]));
    walk.observe(1.into());

    assert_eq!(walk.take_spares(), vec![FollowerId::from(5)]);

    let res = walk.finish();
    assert_eq!(res.gone_ids, ids(&[5]));
    assert!(res.spare_ids.is_empty());
}

#[test]
fn rich_walk_id_seen_in_walk_is_not_a_spare() {
    let mut walk = RichWalk::new(ids(&[]), &ids(&[7]));
    walk.observe(7.into());

    assert!(walk.take_spares().is_empty());
    assert_eq!(walk.resolve_spare(7.into()), None);

    let res = walk.finish();
    assert_eq!(res.new_ids, ids(&[7]));
    assert!(res.spare_ids.is_empty());
}

#[test]
fn rich_walk_new_spare_goes_to_spares_only() {
    let mut walk = RichWalk::new(ids(&[]), &ids(&[4, 9]));
    walk.observe(4.into());
    walk.take_spares();

    assert_eq!(walk.resolve_spare(9.into()), Some(Sighting::New));

    let res = walk.finish();
    assert_eq!(res.new_ids, ids(&[4]));
    assert_eq!(res.spare_ids, ids(&[9]));
}

#[test]
fn account_ref_parsing() {
    assert_eq!(
        "12345".parse::<AccountRef>(),
        Ok(AccountRef::Id(12345.into()))
    );
    assert_eq!(
        "@some_user".parse::<AccountRef>(),
        Ok(AccountRef::Handle("some_user".into()))
    );
    assert_eq!("".parse::<AccountRef>(), Err(AccountRefError::Empty));
    assert_eq!(
        "some_user".parse::<AccountRef>(),
        Err(AccountRefError::MissingAt)
    );
    assert_eq!(
        "@".parse::<AccountRef>(),
        Err(AccountRefError::Length { len: 1 })
    );
    assert_eq!(
        "@a_very_long_handle".parse::<AccountRef>(),
        Err(AccountRefError::Length { len: 19 })
    );
    assert_eq!(
        "@bad-name".parse::<AccountRef>(),
        Err(AccountRefError::InvalidChar { ch: '-' })
    );
    assert_eq!(
        "99999999999999999999999".parse::<AccountRef>(),
        Err(AccountRefError::InvalidId {
            id: "99999999999999999999999".into()
        })
    );
}

#[test]
fn account_ref_display_round_trips() {
    for raw in ["42", "@flock_bot"] {
        let parsed: AccountRef = raw.parse().expect("valid");
        assert_eq!(parsed.to_string(), raw);
    }
}

#[test]
fn counters_fold() {
    let mut total = RunCounters::default();
    total += RunCounters::inserted(2);
    total += RunCounters::updated(3);
    total += RunCounters::archived(1);
    total += RunCounters::inserted(1);

    assert_eq!(
        total,
        RunCounters {
            inserted: 3,
            updated: 3,
            removed: 1,
            history_inserted: 1,
        }
    );
    assert!(!total.is_zero());
    assert!(RunCounters::default().is_zero());
}

#[test]
fn counters_saturate() {
    let mut total = RunCounters::inserted(u64::MAX);
    total += RunCounters::inserted(5);
    assert_eq!(total.inserted, u64::MAX);
}

#[test]
fn ring_keeps_last_entries_in_order() {
    let mut ring = RecentRing::new(3);
    assert!(ring.is_empty());

    ring.extend([1, 2]);
    assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![1, 2]);

    ring.extend([3, 4, 5]);
    assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    assert_eq!(ring.len(), 3);
    assert_eq!(ring.total_pushed(), 5);

    ring.push(6);
    assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![4, 5, 6]);
}

#[test]
fn ring_zero_capacity_holds_one() {
    let mut ring = RecentRing::new(0);
    ring.extend(["a", "b"]);
    assert_eq!(ring.capacity(), 1);
    assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec!["b"]);
}

#[test]
fn timestamp_display() {
    assert_eq!(Timestamp::from(0).to_string(), "1970-01-01T00:00:00Z");
    assert_eq!(
        Timestamp::from(1_700_000_000).to_string(),
        "2023-11-14T22:13:20Z"
    );
}
