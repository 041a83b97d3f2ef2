//! Join requests and in-ride presence for a single ride's participants.
use super::error::RideError;
use super::ride::{Ride, RideStatus};

/// The driver's decision on a join request. Leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum Confirmation {
    #[n(0)]
    Pending,
    #[n(1)]
    Confirmed,
    #[n(2)]
    Rejected,
}

/// Physical outcome of a participant relative to the ride's execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum ParticipationStatus {
    #[n(0)]
    Waiting,
    #[n(1)]
    Missing,
    #[n(2)]
    InProgress,
    #[n(3)]
    NotMarked,
    #[n(4)]
    Completed,
    #[n(5)]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Participation {
    #[n(0)]
    pub participant: String,
    #[n(1)]
    pub destination: String,
    #[n(2)]
    pub occupied_spaces: u32,
    #[n(3)]
    pub confirmation: Confirmation,
    #[n(4)]
    pub status: ParticipationStatus,
}

impl Participation {
    pub fn new(participant: String, destination: String, occupied_spaces: u32) -> Self {
        Self {
            participant,
            destination,
            occupied_spaces,
            confirmation: Confirmation::Pending,
            status: ParticipationStatus::Waiting,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmation == Confirmation::Confirmed
    }
}

impl Ride {
    pub fn participant(&self, alias: &str) -> Option<&Participation> {
        self.participants.iter().find(|p| p.participant == alias)
    }

    fn participant_mut(&mut self, alias: &str) -> Result<&mut Participation, RideError> {
        let ride_id = self.id;
        self.participants
            .iter_mut()
            .find(|p| p.participant == alias)
            .ok_or_else(|| RideError::ParticipantNotFound {
                ride_id,
                alias: alias.to_string(),
            })
    }

    /// Seats held by confirmed participants.
    pub fn confirmed_seats(&self) -> u32 {
        self.participants
            .iter()
            .filter(|p| p.is_confirmed())
            .map(|p| p.occupied_spaces)
            .sum()
    }

    pub fn free_seats(&self) -> u32 {
        self.available_seats.saturating_sub(self.confirmed_seats())
    }

    /// Appends a pending request. Capacity is only enforced on [`Ride::accept`].
    pub fn request_to_join(
        &mut self,
        alias: &str,
        destination: &str,
        occupied_spaces: u32,
    ) -> Result<(), RideError> {
        if occupied_spaces == 0 {
            return Err(RideError::InvalidSeatCount);
        }
        if self.status != RideStatus::Ready {
            return Err(RideError::RideAlreadyStarted(self.id));
        }
        // a rejected entry still blocks the alias
        if self.participant(alias).is_some() {
            return Err(RideError::AlreadyRequested(alias.to_string()));
        }

        self.participants.push(Participation::new(
            alias.to_string(),
            destination.to_string(),
            occupied_spaces,
        ));
        Ok(())
    }

    pub fn accept(&mut self, alias: &str) -> Result<(), RideError> {
        let free = self.free_seats();
        let candidate = self.participant_mut(alias)?;

        if candidate.confirmation != Confirmation::Pending {
            return Err(RideError::AlreadyDecided(alias.to_string()));
        }
        // the candidate is pending, so `free` never counts its own seats
        if candidate.occupied_spaces > free {
            return Err(RideError::SeatsUnavailable {
                requested: candidate.occupied_spaces,
                free,
            });
        }

        candidate.confirmation = Confirmation::Confirmed;
        candidate.status = ParticipationStatus::Waiting;
        Ok(())
    }

    pub fn reject(&mut self, alias: &str) -> Result<(), RideError> {
        let candidate = self.participant_mut(alias)?;

        if candidate.confirmation != Confirmation::Pending {
            return Err(RideError::AlreadyDecided(alias.to_string()));
        }

        candidate.confirmation = Confirmation::Rejected;
        candidate.status = ParticipationStatus::Rejected;
        Ok(())
    }

    /// Marks an on-board participant as dropped off.
    pub fn unload(&mut self, alias: &str) -> Result<(), RideError> {
        match self.participants.iter_mut().find(|p| p.participant == alias) {
            Some(p) if p.status == ParticipationStatus::InProgress => {
                p.status = ParticipationStatus::Completed;
                Ok(())
            }
            _ => Err(RideError::NotInProgress(alias.to_string())),
        }
    }
}
