//! The aggregate state: user registry, ride store and participation journal.
//!
//! Every operation here is pure in-memory bookkeeping. Durability is the
//! concern of [`crate::store`], and serialization of callers is the concern of
//! [`crate::service`].
use super::error::RideError;
use super::journal::{Journal, RecordKind};
use super::ride::{Ride, StatusChange};
use super::stats::{self, RideDetail, RiderStats};
use super::types::RideId;
use super::user::{User, UserRegistry};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct RideState {
    #[n(0)]
    pub users: UserRegistry,
    #[n(1)]
    pub rides: Vec<Ride>,
    #[n(2)]
    pub last_ride_id: RideId, // high-water mark, never derived from rides.len()
    #[n(3)]
    pub journal: Journal,
}

impl RideState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Working copy for a mutation. Users and rides are copied, the journal
    /// starts empty and is merged back with [`Journal::absorb`].
    pub fn draft(&self) -> RideState {
        RideState {
            users: self.users.clone(),
            rides: self.rides.clone(),
            last_ride_id: self.last_ride_id,
            journal: Journal::new(),
        }
    }

    pub fn register_user(&mut self, user: User) -> Result<(), RideError> {
        self.users.register(user)
    }

    pub fn user(&self, alias: &str) -> Result<&User, RideError> {
        self.users
            .lookup(alias)
            .ok_or_else(|| RideError::UserNotFound(alias.to_string()))
    }

    pub fn create_ride(
        &mut self,
        driver: &str,
        scheduled_at: &str,
        final_address: &str,
        available_seats: u32,
    ) -> Result<RideId, RideError> {
        if !self.users.contains(driver) {
            return Err(RideError::DriverNotFound(driver.to_string()));
        }

        let id = self.last_ride_id.next();
        self.rides.push(Ride::new(
            id,
            driver.to_string(),
            scheduled_at.to_string(),
            final_address.to_string(),
            available_seats,
        ));
        self.last_ride_id = id;
        Ok(id)
    }

    pub fn ride(&self, ride_id: RideId) -> Result<&Ride, RideError> {
        self.rides
            .iter()
            .find(|r| r.id == ride_id)
            .ok_or(RideError::RideNotFound(ride_id))
    }

    fn ride_mut(&mut self, ride_id: RideId) -> Result<&mut Ride, RideError> {
        self.rides
            .iter_mut()
            .find(|r| r.id == ride_id)
            .ok_or(RideError::RideNotFound(ride_id))
    }

    pub fn request_to_join(
        &mut self,
        ride_id: RideId,
        alias: &str,
        destination: &str,
        occupied_spaces: u32,
    ) -> Result<(), RideError> {
        self.ride_mut(ride_id)?
            .request_to_join(alias, destination, occupied_spaces)?;

        self.journal.append(
            ride_id,
            alias.to_string(),
            RecordKind::Requested {
                destination: destination.to_string(),
                occupied_spaces,
            },
        )?;
        Ok(())
    }

    pub fn accept(&mut self, ride_id: RideId, alias: &str) -> Result<(), RideError> {
        self.ride_mut(ride_id)?.accept(alias)?;
        self.journal
            .append(ride_id, alias.to_string(), RecordKind::Accepted)?;
        Ok(())
    }

    pub fn reject(&mut self, ride_id: RideId, alias: &str) -> Result<(), RideError> {
        self.ride_mut(ride_id)?.reject(alias)?;
        self.journal
            .append(ride_id, alias.to_string(), RecordKind::Rejected)?;
        Ok(())
    }

    pub fn start_ride(
        &mut self,
        ride_id: RideId,
        present: &HashSet<String>,
    ) -> Result<(), RideError> {
        let changes = self.ride_mut(ride_id)?.start(present)?;
        self.record_changes(ride_id, changes)
    }

    pub fn end_ride(&mut self, ride_id: RideId) -> Result<(), RideError> {
        let changes = self.ride_mut(ride_id)?.end()?;
        self.record_changes(ride_id, changes)
    }

    pub fn unload_participant(&mut self, ride_id: RideId, alias: &str) -> Result<(), RideError> {
        self.ride_mut(ride_id)?.unload(alias)?;
        self.journal
            .append(ride_id, alias.to_string(), RecordKind::Unloaded)?;
        Ok(())
    }

    fn record_changes(
        &mut self,
        ride_id: RideId,
        changes: Vec<StatusChange>,
    ) -> Result<(), RideError> {
        for (alias, status) in changes {
            if let Some(kind) = RecordKind::for_status(status) {
                self.journal.append(ride_id, alias, kind)?;
            }
        }
        Ok(())
    }

    pub fn rides_by_driver(&self, alias: &str) -> Vec<Ride> {
        self.rides
            .iter()
            .filter(|r| r.driver == alias)
            .cloned()
            .collect()
    }

    pub fn ride_detail(&self, ride_id: RideId) -> Result<RideDetail, RideError> {
        let ride = self.ride(ride_id)?;
        Ok(RideDetail::build(ride, &self.rides))
    }

    pub fn stats_for(&self, alias: &str) -> RiderStats {
        stats::stats_for(&self.rides, alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participation::ParticipationStatus;

    fn state_with_driver() -> RideState {
        let mut state = RideState::new();
        state
            .register_user(User::new("jperez", "Juan Perez", Some("ABC-123".into())))
            .unwrap();
        state.register_user(User::new("ana", "Ana", None)).unwrap();
        state
    }

    #[test]
    fn create_ride_requires_driver() {
        let mut state = RideState::new();
        let err = state
            .create_ride("ghost", "2025-08-01 10:00", "Centro", 2)
            .unwrap_err();

        assert!(matches!(err, RideError::DriverNotFound(_)));
        assert!(state.rides.is_empty());
        assert_eq!(state.last_ride_id, RideId::new(0));
    }

    #[test]
    fn ride_ids_follow_high_water_mark() {
        let mut state = state_with_driver();
        let first = state
            .create_ride("jperez", "2025-08-01 10:00", "Centro", 2)
            .unwrap();
        assert_eq!(first, RideId::new(1));

        // a store loaded with fewer rides than ids handed out must not reuse ids
        state.rides.clear();
        let second = state
            .create_ride("jperez", "2025-08-02 10:00", "Centro", 2)
            .unwrap();
        assert_eq!(second, RideId::new(2));
    }

    #[test]
    fn operations_on_unknown_ride_fail() {
        let mut state = state_with_driver();
        let missing = RideId::new(42);

        assert!(matches!(
            state.request_to_join(missing, "ana", "Centro", 1),
            Err(RideError::RideNotFound(id)) if id == missing
        ));
        assert!(matches!(state.accept(missing, "ana"), Err(RideError::RideNotFound(_))));
        assert!(matches!(state.end_ride(missing), Err(RideError::RideNotFound(_))));
        assert!(state.journal.is_empty());
    }

    #[test]
    fn journal_follows_the_lifecycle() {
        let mut state = state_with_driver();
        let id = state
            .create_ride("jperez", "2025-08-01 10:00", "Centro", 2)
            .unwrap();

        state.request_to_join(id, "ana", "Centro", 1).unwrap();
        state.accept(id, "ana").unwrap();
        state
            .start_ride(id, &["ana".to_string()].into())
            .unwrap();
        state.unload_participant(id, "ana").unwrap();
        state.end_ride(id).unwrap();

        let kinds: Vec<_> = state
            .journal
            .for_ride(id)
            .into_iter()
            .map(|r| r.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                RecordKind::Requested {
                    destination: "Centro".into(),
                    occupied_spaces: 1
                },
                RecordKind::Accepted,
                RecordKind::Boarded,
                RecordKind::Unloaded,
            ]
        );
        assert_eq!(
            state.ride(id).unwrap().participant("ana").unwrap().status,
            ParticipationStatus::Completed
        );
    }

    #[test]
    fn failed_operation_records_nothing() {
        let mut state = state_with_driver();
        let id = state
            .create_ride("jperez", "2025-08-01 10:00", "Centro", 1)
            .unwrap();
        state.request_to_join(id, "ana", "Centro", 2).unwrap();

        assert!(state.accept(id, "ana").is_err());
        assert_eq!(state.journal.len(), 1);
    }

    #[test]
    fn rides_by_driver_keeps_store_order() {
        let mut state = state_with_driver();
        let a = state.create_ride("jperez", "t1", "X", 1).unwrap();
        state.create_ride("ana", "t2", "Y", 1).unwrap();
        let c = state.create_ride("jperez", "t3", "Z", 1).unwrap();

        let ids: Vec<_> = state
            .rides_by_driver("jperez")
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![a, c]);
        assert!(state.rides_by_driver("nobody").is_empty());
    }

    #[test]
    fn draft_copies_everything_but_history() {
        let mut state = state_with_driver();
        let id = state.create_ride("jperez", "t1", "X", 2).unwrap();
        state.request_to_join(id, "ana", "Centro", 1).unwrap();

        let mut draft = state.draft();
        assert_eq!(draft.rides, state.rides);
        assert_eq!(draft.last_ride_id, state.last_ride_id);
        assert!(draft.journal.is_empty());

        draft.accept(id, "ana").unwrap();
        state.journal.absorb(draft.journal);
        let seqs: Vec<_> = state.journal.records().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(state.journal.records()[1].kind, RecordKind::Accepted);
    }

    #[test]
    fn state_encoding_round_trips() {
        let mut state = state_with_driver();
        let id = state.create_ride("jperez", "t1", "X", 2).unwrap();
        state.request_to_join(id, "ana", "Centro", 1).unwrap();

        let encoded = minicbor::to_vec(&state).unwrap();
        let decoded: RideState = minicbor::decode(&encoded).unwrap();
        assert_eq!(decoded, state);
    }
}
