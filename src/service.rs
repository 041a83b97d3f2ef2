//! Service layer API for ride and participation operations
use super::config::ServiceConfig;
use super::error::RideError;
use super::journal::ParticipationRecord;
use super::ride::Ride;
use super::state::RideState;
use super::stats::{RideDetail, RiderStats};
use super::store::{SledStore, StateStore};
use super::types::RideId;
use super::user::User;
use anyhow::Context;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Entry point for collaborators. Every operation holds the state lock for its
/// whole validate, mutate, flush sequence, so seat checks, status transitions
/// and id allocation never interleave.
pub struct RideService<S: StateStore = SledStore> {
    state: Mutex<RideState>,
    store: S,
}

impl RideService<SledStore> {
    /// Opens (or creates) the sled database named by `config` and loads it.
    pub fn open(config: &ServiceConfig) -> anyhow::Result<Self> {
        let db = sled::open(&config.db_path)
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;
        let store = SledStore::new(Arc::new(db)).with_flush_on_write(config.flush_on_write);

        Self::new(store).context("failed to load stored ride state")
    }
}

impl<S: StateStore> RideService<S> {
    pub fn new(store: S) -> Result<Self, RideError> {
        let state = store.load()?.unwrap_or_default();
        tracing::info!(
            users = state.users.len(),
            rides = state.rides.len(),
            last_ride_id = %state.last_ride_id,
            "ride service ready"
        );

        Ok(Self {
            state: Mutex::new(state),
            store,
        })
    }

    // mutations run on a draft and the published state is only replaced after
    // a flush, so a poisoned lock still guards a consistent value
    fn lock(&self) -> MutexGuard<'_, RideState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, f: impl FnOnce(&RideState) -> Result<T, RideError>) -> Result<T, RideError> {
        f(&*self.lock())
    }

    /// Applies `f` to a draft of the state, flushes the draft and only then
    /// publishes it. On any failure the published state is untouched.
    fn mutate<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut RideState) -> Result<T, RideError>,
    ) -> Result<T, RideError> {
        let mut guard = self.lock();
        let mut draft = guard.draft();

        let value = f(&mut draft).inspect_err(|error| {
            tracing::warn!(operation, %error, "operation refused");
        })?;

        // the draft only holds this operation's records; lend it the full
        // journal for the flush and take it back if the flush fails
        let appended = std::mem::take(&mut draft.journal);
        draft.journal = std::mem::take(&mut guard.journal);
        let mark = draft.journal.len();
        draft.journal.absorb(appended);

        if let Err(error) = self.store.flush(&draft) {
            tracing::error!(operation, %error, "flush failed, discarding change");
            draft.journal.truncate(mark);
            guard.journal = draft.journal;
            return Err(error.into());
        }

        *guard = draft;
        Ok(value)
    }

    /// Register a new user under a unique alias
    pub fn register(
        &self,
        alias: &str,
        name: &str,
        car_plate: Option<&str>,
    ) -> Result<(), RideError> {
        let user = User::new(alias, name, car_plate.map(str::to_string));
        self.mutate("register", |state| state.register_user(user))?;

        tracing::info!(alias, "user registered");
        Ok(())
    }

    pub fn lookup(&self, alias: &str) -> Result<User, RideError> {
        self.read(|state| state.user(alias).cloned())
    }

    /// All users in registration order
    pub fn list_users(&self) -> Vec<User> {
        self.lock().users.users().to_vec()
    }

    /// Publish a new ride owned by `driver`
    pub fn create_ride(
        &self,
        driver: &str,
        scheduled_at: &str,
        final_address: &str,
        available_seats: u32,
    ) -> Result<RideId, RideError> {
        let ride_id = self.mutate("create_ride", |state| {
            state.create_ride(driver, scheduled_at, final_address, available_seats)
        })?;

        tracing::info!(%ride_id, driver, available_seats, "ride created");
        Ok(ride_id)
    }

    /// Start a ready ride. Confirmed participants not in `present` are marked missing.
    pub fn start_ride<I>(&self, ride_id: RideId, present: I) -> Result<(), RideError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let present: HashSet<String> = present.into_iter().map(Into::into).collect();
        self.mutate("start_ride", |state| state.start_ride(ride_id, &present))?;

        tracing::info!(%ride_id, present = present.len(), "ride started");
        Ok(())
    }

    /// Finish an in-progress ride
    pub fn end_ride(&self, ride_id: RideId) -> Result<(), RideError> {
        self.mutate("end_ride", |state| state.end_ride(ride_id))?;

        tracing::info!(%ride_id, "ride ended");
        Ok(())
    }

    /// Mark an on-board participant as dropped off
    pub fn unload_participant(&self, ride_id: RideId, alias: &str) -> Result<(), RideError> {
        self.mutate("unload_participant", |state| {
            state.unload_participant(ride_id, alias)
        })?;

        tracing::info!(%ride_id, alias, "participant unloaded");
        Ok(())
    }

    /// Ask for `occupied_spaces` seats on a ride that hasn't started yet
    pub fn request_to_join(
        &self,
        ride_id: RideId,
        alias: &str,
        destination: &str,
        occupied_spaces: u32,
    ) -> Result<(), RideError> {
        self.mutate("request_to_join", |state| {
            state.request_to_join(ride_id, alias, destination, occupied_spaces)
        })?;

        tracing::info!(%ride_id, alias, occupied_spaces, "join requested");
        Ok(())
    }

    /// Confirm a pending join request if the seats are still free
    pub fn accept(&self, ride_id: RideId, alias: &str) -> Result<(), RideError> {
        self.mutate("accept", |state| state.accept(ride_id, alias))?;

        tracing::info!(%ride_id, alias, "participant accepted");
        Ok(())
    }

    /// Turn down a pending join request
    pub fn reject(&self, ride_id: RideId, alias: &str) -> Result<(), RideError> {
        self.mutate("reject", |state| state.reject(ride_id, alias))?;

        tracing::info!(%ride_id, alias, "participant rejected");
        Ok(())
    }

    pub fn ride(&self, ride_id: RideId) -> Result<Ride, RideError> {
        self.read(|state| state.ride(ride_id).cloned())
    }

    /// Rides published by `alias`, oldest first
    pub fn rides_by_driver(&self, alias: &str) -> Result<Vec<Ride>, RideError> {
        self.read(|state| {
            state.user(alias)?;
            Ok(state.rides_by_driver(alias))
        })
    }

    pub fn ride_detail(&self, ride_id: RideId) -> Result<RideDetail, RideError> {
        self.read(|state| state.ride_detail(ride_id))
    }

    /// Like [`RideService::ride_detail`], but the ride must belong to `driver`.
    pub fn driver_ride_detail(&self, driver: &str, ride_id: RideId) -> Result<RideDetail, RideError> {
        self.read(|state| {
            let detail = state.ride_detail(ride_id)?;
            if detail.driver != driver {
                return Err(RideError::RideNotFound(ride_id));
            }
            Ok(detail)
        })
    }

    pub fn stats_for(&self, alias: &str) -> RiderStats {
        self.lock().stats_for(alias)
    }

    /// Journal records of a ride in the order they happened
    pub fn ride_history(&self, ride_id: RideId) -> Result<Vec<ParticipationRecord>, RideError> {
        self.read(|state| {
            state.ride(ride_id)?;
            Ok(state.journal.for_ride(ride_id))
        })
    }
}
