//! Ride records and the ride lifecycle state machine.
use super::error::RideError;
use super::participation::{Participation, ParticipationStatus};
use super::types::{RideId, TimeStamp};
use chrono::Utc;
use std::collections::HashSet;

/// `Ready -> InProgress -> Done`. Nothing leaves `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum RideStatus {
    #[n(0)]
    Ready,
    #[n(1)]
    InProgress,
    #[n(2)]
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Ride {
    #[n(0)]
    pub id: RideId,
    #[n(1)]
    pub driver: String,
    #[n(2)]
    pub scheduled_at: String, // opaque, never parsed
    #[n(3)]
    pub final_address: String,
    #[n(4)]
    pub status: RideStatus,
    #[n(5)]
    pub available_seats: u32,
    #[n(6)]
    pub participants: Vec<Participation>,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
}

/// A participant whose status changed as a side effect of a lifecycle step.
pub type StatusChange = (String, ParticipationStatus);

impl Ride {
    pub fn new(
        id: RideId,
        driver: String,
        scheduled_at: String,
        final_address: String,
        available_seats: u32,
    ) -> Self {
        Self {
            id,
            driver,
            scheduled_at,
            final_address,
            status: RideStatus::Ready,
            available_seats,
            participants: vec![],
            created_at: TimeStamp::new(),
        }
    }

    fn transition(&mut self, expected: RideStatus, to: RideStatus) -> Result<(), RideError> {
        if self.status != expected {
            return Err(RideError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Starts a ready ride. Confirmed participants listed in `present` board,
    /// the rest are marked missing. Unconfirmed entries are left alone.
    pub fn start(&mut self, present: &HashSet<String>) -> Result<Vec<StatusChange>, RideError> {
        self.transition(RideStatus::Ready, RideStatus::InProgress)?;

        let mut changes = vec![];
        for p in self.participants.iter_mut().filter(|p| p.is_confirmed()) {
            p.status = if present.contains(&p.participant) {
                ParticipationStatus::InProgress
            } else {
                ParticipationStatus::Missing
            };
            changes.push((p.participant.clone(), p.status));
        }
        Ok(changes)
    }

    /// Ends an in-progress ride. Anyone still on board was never unloaded and
    /// becomes `NotMarked`.
    pub fn end(&mut self) -> Result<Vec<StatusChange>, RideError> {
        self.transition(RideStatus::InProgress, RideStatus::Done)?;

        let mut changes = vec![];
        for p in self
            .participants
            .iter_mut()
            .filter(|p| p.status == ParticipationStatus::InProgress)
        {
            p.status = ParticipationStatus::NotMarked;
            changes.push((p.participant.clone(), p.status));
        }
        Ok(changes)
    }
}
