//! Property-based tests for seat allocation and the participation state machine
//!
//! Random sequences of join requests and driver decisions are replayed against
//! a single ride. Whatever the sequence, the confirmed seats must never exceed
//! the ride's capacity, and a refused decision must not change the entry.

use proptest::prelude::*;
use ride_share::{
    participation::{Confirmation, ParticipationStatus},
    ride::{Ride, RideStatus},
    stats::stats_for,
    RideError, RideId,
};
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Join { rider: u8, seats: u32 },
    Accept { rider: u8 },
    Reject { rider: u8 },
}

fn rider_name(rider: u8) -> String {
    format!("rider_{rider}")
}

/// Strategy to generate one operation over a small pool of riders so that
/// duplicates and repeated decisions actually happen
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6, 1u32..=4).prop_map(|(rider, seats)| Op::Join { rider, seats }),
        (0u8..6).prop_map(|rider| Op::Accept { rider }),
        (0u8..6).prop_map(|rider| Op::Reject { rider }),
    ]
}

fn new_ride(capacity: u32) -> Ride {
    Ride::new(
        RideId::new(1),
        "jperez".into(),
        "2025-08-01 10:00".into(),
        "Centro".into(),
        capacity,
    )
}

fn apply(ride: &mut Ride, op: &Op) -> Result<(), RideError> {
    match op {
        Op::Join { rider, seats } => ride.request_to_join(&rider_name(*rider), "Centro", *seats),
        Op::Accept { rider } => ride.accept(&rider_name(*rider)),
        Op::Reject { rider } => ride.reject(&rider_name(*rider)),
    }
}

// PROPERTY TESTS
proptest! {
    /// Property: confirmed seats never exceed capacity
    #[test]
    fn prop_confirmed_seats_within_capacity(
        capacity in 0u32..=6,
        ops in prop::collection::vec(op_strategy(), 0..=40),
    ) {
        let mut ride = new_ride(capacity);

        for op in &ops {
            let _ = apply(&mut ride, op);
            prop_assert!(
                ride.confirmed_seats() <= capacity,
                "confirmed {} > capacity {} after {:?}",
                ride.confirmed_seats(), capacity, op
            );
        }
    }

    /// Property: a refused operation leaves the ride exactly as it was
    #[test]
    fn prop_refused_operations_change_nothing(
        capacity in 0u32..=6,
        ops in prop::collection::vec(op_strategy(), 0..=40),
    ) {
        let mut ride = new_ride(capacity);

        for op in &ops {
            let before = ride.clone();
            if apply(&mut ride, op).is_err() {
                prop_assert_eq!(&ride, &before);
            }
        }
    }

    /// Property: each alias appears at most once per ride
    #[test]
    fn prop_join_uniqueness(
        ops in prop::collection::vec(op_strategy(), 0..=40),
    ) {
        let mut ride = new_ride(4);
        for op in &ops {
            let _ = apply(&mut ride, op);
        }

        let mut seen = HashSet::new();
        for p in &ride.participants {
            prop_assert!(seen.insert(p.participant.clone()), "duplicate entry for {}", p.participant);
        }
    }

    /// Property: a decision is taken at most once, and accept only fails
    /// with SeatsUnavailable when the seats really are missing
    #[test]
    fn prop_decisions_are_final(
        capacity in 0u32..=6,
        ops in prop::collection::vec(op_strategy(), 0..=40),
    ) {
        let mut ride = new_ride(capacity);

        for op in &ops {
            let before = ride.clone();
            let result = apply(&mut ride, op);

            if let (Op::Accept { rider }, Err(RideError::SeatsUnavailable { requested, free })) = (op, &result) {
                let entry = before.participant(&rider_name(*rider)).unwrap();
                prop_assert_eq!(entry.occupied_spaces, *requested);
                prop_assert!(before.confirmed_seats() + requested > capacity);
                prop_assert_eq!(*free, capacity - before.confirmed_seats());
            }

            for old in &before.participants {
                if old.confirmation != Confirmation::Pending {
                    let now = ride.participant(&old.participant).unwrap();
                    prop_assert_eq!(now.confirmation, old.confirmation);
                }
            }
        }
    }

    /// Property: the ride status only moves forward, and stats totals match
    /// the number of entries no matter how the ride ends
    #[test]
    fn prop_lifecycle_is_monotonic(
        ops in prop::collection::vec(op_strategy(), 0..=20),
        present in prop::collection::hash_set(0u8..6, 0..=4),
        unload in prop::collection::vec(0u8..6, 0..=6),
        end in any::<bool>(),
    ) {
        let mut ride = new_ride(6);
        for op in &ops {
            let _ = apply(&mut ride, op);
        }
        let confirmed_before: Vec<_> = ride
            .participants
            .iter()
            .filter(|p| p.is_confirmed())
            .map(|p| p.participant.clone())
            .collect();

        let present: HashSet<String> = present.into_iter().map(rider_name).collect();
        ride.start(&present).unwrap();
        prop_assert_eq!(ride.status, RideStatus::InProgress);

        for rider in &unload {
            let _ = ride.unload(&rider_name(*rider));
        }
        if end {
            ride.end().unwrap();
            prop_assert_eq!(ride.status, RideStatus::Done);
            prop_assert!(ride
                .participants
                .iter()
                .all(|p| p.status != ParticipationStatus::InProgress));
        }
        prop_assert!(ride.start(&present).is_err());

        for alias in &confirmed_before {
            let status = ride.participant(alias).unwrap().status;
            if !present.contains(alias) {
                prop_assert_eq!(status, ParticipationStatus::Missing);
            } else {
                prop_assert_ne!(status, ParticipationStatus::Missing);
            }
        }

        let rides = vec![ride];
        for p in &rides[0].participants {
            prop_assert_eq!(stats_for(&rides, &p.participant).total, 1);
        }
    }
}
