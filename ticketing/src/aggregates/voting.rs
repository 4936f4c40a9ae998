//! Song voting.
//!
//! While an event is ONGOING every paid seat carries one vote for a song on
//! the event's lineup. A registration can never cast more votes than it
//! holds seats.

use std::collections::BTreeMap;

use boxoffice_core::reducer::Reducer;
use serde::Serialize;

use super::status::current_status;
use super::{find_event, owned_registration, TicketingEnvironment};
use crate::error::TicketingError;
use crate::state::TicketingState;
use crate::types::{
    EventId, EventStatus, RegistrationId, RegistrationStatus, SongId, UserId, Vote,
};

/// Weight of a vote cast by a customer
pub const VOTE_WEIGHT: u32 = 1;

/// Actions for the Voting aggregate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VotingAction {
    /// Spend one of a registration's seats on a song
    Cast {
        /// Customer voting
        customer: UserId,
        /// Registration whose seat is used
        registration_id: RegistrationId,
        /// Song voted for
        song_id: SongId,
    },
}

/// Reducer for the Voting aggregate
#[derive(Clone, Copy, Debug, Default)]
pub struct VotingReducer;

impl VotingReducer {
    /// Creates a new `VotingReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_cast(
        state: &TicketingState,
        customer: &UserId,
        registration_id: &RegistrationId,
        song_id: &SongId,
        env: &TicketingEnvironment,
    ) -> Result<(), TicketingError> {
        let registration = owned_registration(state, customer, registration_id)?;
        if registration.status != RegistrationStatus::Completed
            || state.completed_payment(registration_id).is_none()
        {
            return Err(TicketingError::InvalidRegistrationStatus {
                registration_id: registration_id.clone(),
                status: registration.status,
            });
        }

        let event = find_event(state, &registration.event_id)?;
        let status = current_status(event, env.now());
        if status != EventStatus::Ongoing {
            return Err(TicketingError::EventNotAvailable {
                event_id: event.id.clone(),
                status,
            });
        }

        let on_lineup = state
            .performances
            .iter()
            .filter(|performance| performance.event_id == event.id)
            .any(|performance| performance.song(song_id).is_some());
        if !on_lineup {
            return Err(TicketingError::SongNotFound(song_id.clone()));
        }

        let seats = registration.seat_count();
        if state.votes_cast(registration_id) >= seats {
            return Err(TicketingError::VoteLimitReached {
                registration_id: registration_id.clone(),
                seats,
            });
        }
        Ok(())
    }
}

impl Reducer for VotingReducer {
    type State = TicketingState;
    type Action = VotingAction;
    type Environment = TicketingEnvironment;
    type Output = Result<Vote, TicketingError>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::Output {
        match action {
            VotingAction::Cast {
                customer,
                registration_id,
                song_id,
            } => {
                Self::validate_cast(state, &customer, &registration_id, &song_id, env)?;
                let vote = Vote {
                    id: state.votes.allocate_id(),
                    song_id,
                    registration_id,
                    weight: VOTE_WEIGHT,
                    cast_at: env.now(),
                    deleted: false,
                };
                tracing::info!(
                    vote_id = %vote.id,
                    song_id = %vote.song_id,
                    registration_id = %vote.registration_id,
                    "Vote cast"
                );
                state.votes.insert(vote.clone());
                Ok(vote)
            }
        }
    }
}

/// Votes a registration may still cast
#[must_use]
pub fn remaining_votes(state: &TicketingState, registration_id: &RegistrationId) -> u32 {
    state
        .registrations
        .get(registration_id)
        .map_or(0, |registration| {
            registration
                .seat_count()
                .saturating_sub(state.votes_cast(registration_id))
        })
}

/// One song's line in the results table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SongTally {
    /// Song
    pub song_id: SongId,
    /// Song title
    pub title: String,
    /// Performer whose set list carries the song
    pub performer: String,
    /// Votes cast for the song
    pub total_votes: u32,
    /// Sum of the votes' weights
    pub total_weight: u32,
    /// Share of all weight cast at the event, 0-100
    pub percentage: f64,
    /// 1-based position in the table
    pub rank: usize,
}

/// Voting results of an event, highest weight first (ties by song id).
///
/// Songs nobody voted for are left out.
///
/// # Errors
///
/// Returns [`TicketingError::EventNotFound`] if the event is missing or
/// deleted.
pub fn vote_results(
    state: &TicketingState,
    event_id: &EventId,
) -> Result<Vec<SongTally>, TicketingError> {
    find_event(state, event_id)?;

    let songs: BTreeMap<&SongId, (&str, &str)> = state
        .performances
        .iter()
        .filter(|performance| &performance.event_id == event_id)
        .flat_map(|performance| {
            performance
                .songs
                .iter()
                .map(move |song| (&song.id, (song.title.as_str(), performance.performer.as_str())))
        })
        .collect();

    let mut counts: BTreeMap<&SongId, (u32, u32)> = BTreeMap::new();
    for vote in state.votes.iter().filter(|vote| songs.contains_key(&vote.song_id)) {
        let entry = counts.entry(&vote.song_id).or_default();
        entry.0 = entry.0.saturating_add(1);
        entry.1 = entry.1.saturating_add(vote.weight);
    }
    let grand_total: u32 = counts.values().map(|(_, weight)| *weight).fold(0, u32::saturating_add);

    let mut rows: Vec<(&SongId, u32, u32)> = counts
        .into_iter()
        .map(|(song_id, (votes, weight))| (song_id, votes, weight))
        .collect();
    rows.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(b.0)));

    Ok(rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, (song_id, total_votes, total_weight))| {
            let (title, performer) = songs.get(song_id)?;
            Some(SongTally {
                song_id: song_id.clone(),
                title: (*title).to_string(),
                performer: (*performer).to_string(),
                total_votes,
                total_weight,
                percentage: if grand_total == 0 {
                    0.0
                } else {
                    f64::from(total_weight) / f64::from(grand_total) * 100.0
                },
                rank: index + 1,
            })
        })
        .collect())
}
