use crate::ride::RideStatus;
use crate::types::RideId;

/// Broad class of a [`RideError`], used by transport layers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Persistence,
}

#[derive(thiserror::Error, Debug)]
pub enum RideError {
    #[error("Alias '{0}' is already registered")]
    AliasTaken(String),
    #[error("User '{0}' not found")]
    UserNotFound(String),
    #[error("Driver '{0}' not found")]
    DriverNotFound(String),
    #[error("Ride {0} not found")]
    RideNotFound(RideId),
    #[error("Participant '{alias}' not found in ride {ride_id}")]
    ParticipantNotFound { ride_id: RideId, alias: String },
    #[error("Ride {0} has already started")]
    RideAlreadyStarted(RideId),
    #[error("'{0}' already requested to join this ride")]
    AlreadyRequested(String),
    #[error("Join request from '{0}' was already accepted or rejected")]
    AlreadyDecided(String),
    #[error("No seats available: requested {requested}, free {free}")]
    SeatsUnavailable { requested: u32, free: u32 },
    #[error("'{0}' is not currently on the ride")]
    NotInProgress(String),
    #[error("Invalid ride transition from {from:?} to {to:?}")]
    InvalidTransition { from: RideStatus, to: RideStatus },
    #[error("Occupied spaces must be greater than zero")]
    InvalidSeatCount,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl RideError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RideError::UserNotFound(_)
            | RideError::DriverNotFound(_)
            | RideError::RideNotFound(_)
            | RideError::ParticipantNotFound { .. } => ErrorKind::NotFound,
            RideError::AliasTaken(_)
            | RideError::RideAlreadyStarted(_)
            | RideError::AlreadyRequested(_)
            | RideError::AlreadyDecided(_)
            | RideError::SeatsUnavailable { .. }
            | RideError::NotInProgress(_)
            | RideError::InvalidTransition { .. } => ErrorKind::Conflict,
            RideError::InvalidSeatCount => ErrorKind::Validation,
            RideError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode state: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("failed to decode stored state: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("failed to encode record id: {0}")]
    RecordId(#[from] bech32::EncodeError),
    #[error("stored state is corrupt: {0}")]
    Corrupt(String),
    #[error("flush rejected: {0}")]
    Rejected(String),
}
