//! Persistence gateway: durable storage of the aggregate [`RideState`].
//!
//! The core calls [`StateStore::flush`] once after every mutation and never
//! after a read. A failed flush must leave durable state as it was, so callers
//! can discard their draft and stay consistent with storage.
use super::error::PersistenceError;
use super::journal::{Journal, ParticipationRecord};
use super::ride::Ride;
use super::state::RideState;
use super::types::RideId;
use super::user::UserRegistry;
use sled::{Batch, Db, IVec};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub trait StateStore {
    /// Loads the last flushed state, `None` if nothing was ever flushed.
    fn load(&self) -> Result<Option<RideState>, PersistenceError>;
    fn flush(&self, state: &RideState) -> Result<(), PersistenceError>;
}

const STATE_KEY: &str = "state";
const STATE_DIGEST_KEY: &str = "state.sha256";
const RECORD_PREFIX: &str = "record/";

/// Users, rides and the id high-water mark. Journal records are stored
/// under their own keys so a flush only appends the new ones.
#[derive(Debug, minicbor::Encode, minicbor::Decode)]
struct Snapshot {
    #[n(0)]
    users: UserRegistry,
    #[n(1)]
    rides: Vec<Ride>,
    #[n(2)]
    last_ride_id: RideId,
}

impl Snapshot {
    fn of(state: &RideState) -> Self {
        Self {
            users: state.users.clone(),
            rides: state.rides.clone(),
            last_ride_id: state.last_ride_id,
        }
    }

    fn into_state(self, journal: Journal) -> RideState {
        RideState {
            users: self.users,
            rides: self.rides,
            last_ride_id: self.last_ride_id,
            journal,
        }
    }
}

// `record/<seq>/<sha256>`, seq zero padded so that key order is journal order
fn record_key(seq: u64, hash: &str) -> String {
    format!("{RECORD_PREFIX}{seq:020}/{hash}")
}

/// Sled backed store. Each flush is one atomic batch holding the snapshot,
/// its digest and the journal records appended since the previous flush.
pub struct SledStore {
    instance: Arc<Db>,
    flush_on_write: bool,
    persisted_records: AtomicUsize,
}

impl SledStore {
    pub fn new(instance: Arc<Db>) -> Self {
        Self {
            instance,
            flush_on_write: true,
            persisted_records: AtomicUsize::new(0),
        }
    }

    /// Whether every flush waits for sled to sync its log to disk.
    pub fn with_flush_on_write(mut self, flush_on_write: bool) -> Self {
        self.flush_on_write = flush_on_write;
        self
    }

    fn load_journal(&self) -> Result<Journal, PersistenceError> {
        let mut records = vec![];
        for entry in self.instance.scan_prefix(RECORD_PREFIX) {
            let (key, value) = entry?;
            if !key.ends_with(sha256::digest(&value[..]).as_bytes()) {
                return Err(PersistenceError::Corrupt(format!(
                    "journal record {} does not match its hash",
                    String::from_utf8_lossy(&key)
                )));
            }
            let record: ParticipationRecord = minicbor::decode(&value)?;
            records.push(record);
        }
        Ok(Journal::from_records(records))
    }

    /// Writes `state` in one batch, then runs `sync`. When `sync` fails the
    /// batch is undone so storage still holds the previous flush.
    fn commit(
        &self,
        state: &RideState,
        sync: impl FnOnce(&Db) -> sled::Result<()>,
    ) -> Result<(), PersistenceError> {
        let from = self.persisted_records.load(Ordering::SeqCst);
        let previous = (
            self.instance.get(STATE_KEY)?,
            self.instance.get(STATE_DIGEST_KEY)?,
        );

        let snapshot = minicbor::to_vec(Snapshot::of(state))?;
        let digest = sha256::digest(&snapshot[..]);

        let mut batch = Batch::default();
        let mut written = vec![];
        batch.insert(STATE_KEY.as_bytes(), snapshot);
        batch.insert(STATE_DIGEST_KEY.as_bytes(), digest.as_bytes());
        for record in state.journal.since(from) {
            let (hash, cbor) = record.build()?;
            tracing::debug!(seq = record.seq, %hash, "appending journal record");
            let key = record_key(record.seq, &hash);
            batch.insert(key.as_bytes(), cbor);
            written.push(key);
        }
        self.instance.apply_batch(batch)?;

        if let Err(error) = sync(&self.instance) {
            tracing::error!(%error, "sync failed, restoring previous flush");
            self.undo(previous, &written)?;
            return Err(error.into());
        }

        self.persisted_records
            .store(state.journal.len(), Ordering::SeqCst);
        Ok(())
    }

    fn undo(
        &self,
        (state, digest): (Option<IVec>, Option<IVec>),
        written: &[String],
    ) -> Result<(), PersistenceError> {
        let mut batch = Batch::default();
        match (state, digest) {
            (Some(state), Some(digest)) => {
                batch.insert(STATE_KEY.as_bytes(), state);
                batch.insert(STATE_DIGEST_KEY.as_bytes(), digest);
            }
            _ => {
                batch.remove(STATE_KEY.as_bytes());
                batch.remove(STATE_DIGEST_KEY.as_bytes());
            }
        }
        for key in written {
            batch.remove(key.as_bytes());
        }
        self.instance.apply_batch(batch)?;
        Ok(())
    }
}

impl StateStore for SledStore {
    fn load(&self) -> Result<Option<RideState>, PersistenceError> {
        let Some(bytes) = self.instance.get(STATE_KEY)? else {
            tracing::debug!("no stored state found");
            return Ok(None);
        };

        let digest = self.instance.get(STATE_DIGEST_KEY)?;
        let expected = sha256::digest(&bytes[..]);
        if digest.as_deref() != Some(expected.as_bytes()) {
            return Err(PersistenceError::Corrupt(
                "snapshot digest does not match its contents".into(),
            ));
        }

        let snapshot: Snapshot = minicbor::decode(&bytes)?;
        let journal = self.load_journal()?;
        self.persisted_records
            .store(journal.len(), Ordering::SeqCst);

        tracing::debug!(
            users = snapshot.users.len(),
            rides = snapshot.rides.len(),
            records = journal.len(),
            "loaded stored state"
        );
        Ok(Some(snapshot.into_state(journal)))
    }

    fn flush(&self, state: &RideState) -> Result<(), PersistenceError> {
        let flush_on_write = self.flush_on_write;
        self.commit(state, |db| {
            if flush_on_write {
                db.flush()?;
            }
            Ok(())
        })
    }
}

/// In-process store holding the encoded state. Can be armed to fail the next
/// flush, which exercises the persistence error path.
#[derive(Default)]
pub struct MemoryStore {
    encoded: Mutex<Option<Vec<u8>>>,
    fail_next: AtomicBool,
    flushes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_flush(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of successful flushes so far.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<RideState>, PersistenceError> {
        let encoded = self.encoded.lock().unwrap_or_else(PoisonError::into_inner);
        match encoded.as_deref() {
            Some(bytes) => Ok(Some(minicbor::decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn flush(&self, state: &RideState) -> Result<(), PersistenceError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PersistenceError::Rejected("injected failure".into()));
        }

        let bytes = minicbor::to_vec(state)?;
        *self.encoded.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn load(&self) -> Result<Option<RideState>, PersistenceError> {
        (**self).load()
    }

    fn flush(&self, state: &RideState) -> Result<(), PersistenceError> {
        (**self).flush(state)
    }
}
