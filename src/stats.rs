//! Read-only views over the ride store: per-rider history and ride detail.
use super::participation::{Confirmation, ParticipationStatus};
use super::ride::{Ride, RideStatus};
use super::types::RideId;

/// Historical participation outcomes for one rider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiderStats {
    pub total: u32,
    pub completed: u32,
    pub missing: u32,
    pub not_marked: u32,
    pub rejected: u32,
}

/// Tallies every participation entry of `alias` across `rides`.
///
/// `total` counts entries in any status, while `Waiting` and `InProgress`
/// are unfinished outcomes and don't feed any of the other counters.
pub fn stats_for<'a>(rides: impl IntoIterator<Item = &'a Ride>, alias: &str) -> RiderStats {
    let mut stats = RiderStats::default();

    let entries = rides
        .into_iter()
        .flat_map(|r| r.participants.iter())
        .filter(|p| p.participant == alias);

    for entry in entries {
        stats.total += 1;
        match entry.status {
            ParticipationStatus::Completed => stats.completed += 1,
            ParticipationStatus::Missing => stats.missing += 1,
            ParticipationStatus::NotMarked => stats.not_marked += 1,
            ParticipationStatus::Rejected => stats.rejected += 1,
            ParticipationStatus::Waiting | ParticipationStatus::InProgress => {}
        }
    }
    stats
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantDetail {
    pub alias: String,
    pub destination: String,
    pub occupied_spaces: u32,
    pub confirmation: Confirmation,
    pub status: ParticipationStatus,
    pub stats: RiderStats,
}

/// A ride with each participant enriched by their rider statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RideDetail {
    pub id: RideId,
    pub driver: String,
    pub scheduled_at: String,
    pub final_address: String,
    pub status: RideStatus,
    pub available_seats: u32,
    pub participants: Vec<ParticipantDetail>,
}

impl RideDetail {
    /// Builds the detail of `ride`, computing statistics against `all_rides`.
    pub fn build(ride: &Ride, all_rides: &[Ride]) -> Self {
        let participants = ride
            .participants
            .iter()
            .map(|p| ParticipantDetail {
                alias: p.participant.clone(),
                destination: p.destination.clone(),
                occupied_spaces: p.occupied_spaces,
                confirmation: p.confirmation,
                status: p.status,
                stats: stats_for(all_rides, &p.participant),
            })
            .collect();

        Self {
            id: ride.id,
            driver: ride.driver.clone(),
            scheduled_at: ride.scheduled_at.clone(),
            final_address: ride.final_address.clone(),
            status: ride.status,
            available_seats: ride.available_seats,
            participants,
        }
    }

    pub fn participant(&self, alias: &str) -> Option<&ParticipantDetail> {
        self.participants.iter().find(|p| p.alias == alias)
    }
}
