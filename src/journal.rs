//! Append-only journal of participation-level transitions.
//!
//! Every change to a participant's confirmation or status appends a
//! [`ParticipationRecord`]. Storage keys records by their sequence number;
//! [`ParticipationRecord::build`] also yields the sha256 digest of the encoding.
use super::error::PersistenceError;
use super::participation::ParticipationStatus;
use super::types::{RideId, TimeStamp};
use bech32::{Bech32m, Hrp};
use chrono::Utc;
use uuid7::uuid7;

const RECORD_HRP: Hrp = Hrp::parse_unchecked("rec_");

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct ParticipationRecord {
    #[n(0)]
    pub record_id: String, // bech32 encoded uuid7
    #[n(1)]
    pub seq: u64, // position in the journal
    #[n(2)]
    pub ride_id: RideId,
    #[n(3)]
    pub participant: String,
    #[n(4)]
    pub recorded_at: TimeStamp<Utc>,
    #[n(5)]
    pub kind: RecordKind,
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum RecordKind {
    #[n(0)]
    Requested {
        #[n(0)]
        destination: String,
        #[n(1)]
        occupied_spaces: u32,
    },
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
    #[n(3)]
    Boarded,
    #[n(4)]
    Missed,
    #[n(5)]
    Unloaded,
    #[n(6)]
    NotMarked,
}

impl RecordKind {
    /// Record for a status that a lifecycle step assigned to a participant.
    pub fn for_status(status: ParticipationStatus) -> Option<Self> {
        match status {
            ParticipationStatus::InProgress => Some(RecordKind::Boarded),
            ParticipationStatus::Missing => Some(RecordKind::Missed),
            ParticipationStatus::NotMarked => Some(RecordKind::NotMarked),
            ParticipationStatus::Completed => Some(RecordKind::Unloaded),
            ParticipationStatus::Rejected => Some(RecordKind::Rejected),
            ParticipationStatus::Waiting => None,
        }
    }
}

/// Fresh record id, a uuid7 encoded as bech32m with the `rec_` prefix.
pub fn new_record_id() -> Result<String, PersistenceError> {
    let encode = bech32::encode::<Bech32m>(RECORD_HRP, uuid7().as_bytes())?;
    Ok(encode)
}

impl ParticipationRecord {
    pub fn new(
        seq: u64,
        ride_id: RideId,
        participant: String,
        kind: RecordKind,
    ) -> Result<Self, PersistenceError> {
        Ok(Self {
            record_id: new_record_id()?,
            seq,
            ride_id,
            participant,
            recorded_at: TimeStamp::new(),
            kind,
        })
    }

    /// Returns the record's content hash and its CBOR encoding.
    pub fn build(&self) -> Result<(String, Vec<u8>), minicbor::encode::Error<std::convert::Infallible>> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor[..]);

        Ok((hash, cbor))
    }
}

/// Journal entries in append order.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(transparent)]
pub struct Journal(#[n(0)] Vec<ParticipationRecord>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a journal from records read back in arbitrary order.
    pub fn from_records(mut records: Vec<ParticipationRecord>) -> Self {
        records.sort_by_key(|r| r.seq);
        Self(records)
    }

    pub fn append(
        &mut self,
        ride_id: RideId,
        participant: String,
        kind: RecordKind,
    ) -> Result<(), PersistenceError> {
        let seq = self.0.len() as u64;
        self.0
            .push(ParticipationRecord::new(seq, ride_id, participant, kind)?);
        Ok(())
    }

    /// Moves the records of `other` to the end of this journal, continuing
    /// this journal's sequence.
    pub fn absorb(&mut self, other: Journal) {
        for mut record in other.0 {
            record.seq = self.0.len() as u64;
            self.0.push(record);
        }
    }

    /// Drops every record from position `len` on.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub fn records(&self) -> &[ParticipationRecord] {
        &self.0
    }

    /// Records appended at or after position `from`.
    pub fn since(&self, from: usize) -> &[ParticipationRecord] {
        self.0.get(from..).unwrap_or(&[])
    }

    pub fn for_ride(&self, ride_id: RideId) -> Vec<ParticipationRecord> {
        self.0
            .iter()
            .filter(|r| r.ride_id == ride_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
