//! Performance aggregate.
//!
//! An event's lineup is a set of performances, each an artist slot with a
//! set list. Slots of the same event never overlap. Intervals are half-open
//! (`[start, end)`), so a slot may begin the minute the previous one ends.

use std::fmt;

use boxoffice_core::reducer::Reducer;
use boxoffice_store::SequentialId;
use chrono::{DateTime, Utc};

use super::status::current_status;
use super::{managed_event, TicketingEnvironment};
use crate::error::TicketingError;
use crate::state::TicketingState;
use crate::time::TimeWindow;
use crate::types::{
    Event, EventId, EventStatus, Performance, PerformanceId, Song, SongId, UserId,
};

/// Bounds on a trimmed performer name, in characters
const PERFORMER_MIN: usize = 2;
const PERFORMER_MAX: usize = 50;

/// Nested counter of song ids inside the performances collection
const SONG_SEQUENCE: &str = "songs";

// ============================================================================
// Conflict detection
// ============================================================================

/// Result of checking a slot against an event's lineup
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScheduleCheck {
    /// No clash
    Valid,
    /// Overlaps an existing slot
    TimeConflict,
    /// Starts and ends exactly when an existing slot does
    ExactTimeMatch,
}

impl ScheduleCheck {
    /// Check whether the slot can be used
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for ScheduleCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Valid => "valid",
            Self::TimeConflict => "overlaps an existing performance",
            Self::ExactTimeMatch => "exact time match with an existing performance",
        })
    }
}

/// Check whether `[start, end)` and `[other_start, other_end)` overlap.
///
/// True when the candidate starts inside the other slot, ends inside it,
/// contains it, or is contained by it.
#[must_use]
pub fn overlaps(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    other_start: DateTime<Utc>,
    other_end: DateTime<Utc>,
) -> bool {
    let starts_inside = other_start <= start && start < other_end;
    let ends_inside = other_start < end && end <= other_end;
    let contains = start <= other_start && other_end <= end;
    let contained = other_start <= start && end <= other_end;
    starts_inside || ends_inside || contains || contained
}

/// Classify the slot `[start, end)` against `existing` performances.
///
/// Deleted performances and the one named by `exclude` (the performance being
/// edited) are ignored. An exact match anywhere wins over a plain overlap.
///
/// # Examples
///
/// ```
/// use boxoffice::aggregates::performance::{check_schedule, ScheduleCheck};
/// use chrono::{TimeZone, Utc};
///
/// let at = |h| Utc.with_ymd_and_hms(2025, 5, 1, h, 0, 0).unwrap();
/// assert_eq!(check_schedule(at(10), at(11), [], None), ScheduleCheck::Valid);
/// ```
pub fn check_schedule<'a>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    existing: impl IntoIterator<Item = &'a Performance>,
    exclude: Option<&PerformanceId>,
) -> ScheduleCheck {
    let mut result = ScheduleCheck::Valid;
    for performance in existing {
        if performance.deleted || Some(&performance.id) == exclude {
            continue;
        }
        if performance.start_time == start && performance.end_time == end {
            return ScheduleCheck::ExactTimeMatch;
        }
        if overlaps(start, end, performance.start_time, performance.end_time) {
            result = ScheduleCheck::TimeConflict;
        }
    }
    result
}

/// Live performances of an event, in start order
#[must_use]
pub fn performances_for_event(state: &TicketingState, event_id: &EventId) -> Vec<Performance> {
    let mut lineup: Vec<Performance> = state
        .performances
        .iter()
        .filter(|performance| &performance.event_id == event_id)
        .cloned()
        .collect();
    lineup.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
    lineup
}

// ============================================================================
// Actions
// ============================================================================

/// Actions for the Performance aggregate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PerformanceAction {
    /// Add a performance to an event's lineup
    Add {
        /// Organizer of the event
        organizer: UserId,
        /// Event
        event_id: EventId,
        /// Performer name
        performer: String,
        /// Slot start
        start: DateTime<Utc>,
        /// Slot end
        end: DateTime<Utc>,
        /// Set list titles, in order (at least one)
        songs: Vec<String>,
    },
    /// Move a performance to another slot
    Reschedule {
        /// Organizer of the event
        organizer: UserId,
        /// Performance
        performance_id: PerformanceId,
        /// New start
        start: DateTime<Utc>,
        /// New end
        end: DateTime<Utc>,
    },
    /// Change the performer name
    Rename {
        /// Organizer of the event
        organizer: UserId,
        /// Performance
        performance_id: PerformanceId,
        /// New performer name
        performer: String,
    },
    /// Append a song to the set list
    AddSong {
        /// Organizer of the event
        organizer: UserId,
        /// Performance
        performance_id: PerformanceId,
        /// Song title
        title: String,
    },
    /// Drop a song from the set list
    RemoveSong {
        /// Organizer of the event
        organizer: UserId,
        /// Performance
        performance_id: PerformanceId,
        /// Song
        song_id: SongId,
    },
    /// Remove a performance from the lineup
    Delete {
        /// Organizer of the event
        organizer: UserId,
        /// Performance
        performance_id: PerformanceId,
    },
}

/// Reducer for the Performance aggregate
#[derive(Clone, Copy, Debug, Default)]
pub struct PerformanceReducer;

impl PerformanceReducer {
    /// Creates a new `PerformanceReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// An event whose lineup `organizer` may still change at `now`
    fn editable_event<'a>(
        state: &'a TicketingState,
        organizer: &UserId,
        event_id: &EventId,
        now: DateTime<Utc>,
    ) -> Result<&'a Event, TicketingError> {
        let event = managed_event(state, organizer, event_id)?;
        let status = current_status(event, now);
        if matches!(status, EventStatus::Cancelled | EventStatus::Completed) {
            return Err(TicketingError::EventNotAvailable {
                event_id: event_id.clone(),
                status,
            });
        }
        Ok(event)
    }

    /// A live performance of an event `organizer` may still change at `now`
    fn editable_performance<'a>(
        state: &'a TicketingState,
        organizer: &UserId,
        performance_id: &PerformanceId,
        now: DateTime<Utc>,
    ) -> Result<(&'a Performance, &'a Event), TicketingError> {
        let performance = state
            .performances
            .get(performance_id)
            .ok_or_else(|| TicketingError::PerformanceNotFound(performance_id.clone()))?;
        let event = Self::editable_event(state, organizer, &performance.event_id, now)?;
        Ok((performance, event))
    }

    fn validate_performer(performer: &str) -> Result<String, TicketingError> {
        let performer = performer.trim();
        let length = performer.chars().count();
        if !(PERFORMER_MIN..=PERFORMER_MAX).contains(&length) {
            return Err(TicketingError::InvalidInput(format!(
                "performer name must be {PERFORMER_MIN}-{PERFORMER_MAX} characters"
            )));
        }
        Ok(performer.to_string())
    }

    fn validate_title(title: &str) -> Result<String, TicketingError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TicketingError::InvalidInput(
                "song title must not be empty".to_string(),
            ));
        }
        Ok(title.to_string())
    }

    /// Check a slot fits inside the event and clashes with nothing
    fn validate_slot(
        state: &TicketingState,
        event: &Event,
        slot: TimeWindow,
        exclude: Option<&PerformanceId>,
    ) -> Result<(), TicketingError> {
        let window = TimeWindow::new(event.start_time, event.end_time)?;
        if !window.encloses(&slot) {
            return Err(TicketingError::OutsideEventWindow {
                start: event.start_time,
                end: event.end_time,
            });
        }

        let siblings = state
            .performances
            .iter()
            .filter(|performance| performance.event_id == event.id);
        match check_schedule(slot.start, slot.end, siblings, exclude) {
            ScheduleCheck::Valid => Ok(()),
            clash => Err(TicketingError::ScheduleConflict(clash)),
        }
    }

    fn allocate_song(state: &mut TicketingState, title: String) -> Song {
        let sequence = state.performances.allocate_counter(SONG_SEQUENCE);
        Song {
            id: SongId::from_sequence(sequence),
            title,
        }
    }

    fn add(
        state: &mut TicketingState,
        organizer: &UserId,
        event_id: EventId,
        performer: &str,
        slot: TimeWindow,
        songs: &[String],
        now: DateTime<Utc>,
    ) -> Result<Performance, TicketingError> {
        let event = Self::editable_event(state, organizer, &event_id, now)?;
        let performer = Self::validate_performer(performer)?;
        if songs.is_empty() {
            return Err(TicketingError::InvalidInput(
                "a performance needs at least one song".to_string(),
            ));
        }
        let titles = songs
            .iter()
            .map(|title| Self::validate_title(title))
            .collect::<Result<Vec<_>, _>>()?;
        Self::validate_slot(state, event, slot, None)?;

        let id = state.performances.allocate_id();
        let songs = titles
            .into_iter()
            .map(|title| Self::allocate_song(state, title))
            .collect();
        let performance = Performance {
            id,
            event_id,
            performer,
            songs,
            start_time: slot.start,
            end_time: slot.end,
            deleted: false,
        };
        tracing::info!(
            performance_id = %performance.id,
            event_id = %performance.event_id,
            songs = performance.songs.len(),
            "Performance added"
        );
        state.performances.insert(performance.clone());
        Ok(performance)
    }

    fn update(
        state: &mut TicketingState,
        performance_id: &PerformanceId,
        change: impl FnOnce(&mut Performance),
    ) -> Result<Performance, TicketingError> {
        let performance = state
            .performances
            .get_mut(performance_id)
            .ok_or_else(|| TicketingError::PerformanceNotFound(performance_id.clone()))?;
        change(performance);
        Ok(performance.clone())
    }

    fn apply(
        state: &mut TicketingState,
        action: PerformanceAction,
        now: DateTime<Utc>,
    ) -> Result<Performance, TicketingError> {
        match action {
            PerformanceAction::Add {
                organizer,
                event_id,
                performer,
                start,
                end,
                songs,
            } => {
                let slot = TimeWindow::new(start, end)?;
                Self::add(state, &organizer, event_id, &performer, slot, &songs, now)
            }

            PerformanceAction::Reschedule {
                organizer,
                performance_id,
                start,
                end,
            } => {
                let (_, event) =
                    Self::editable_performance(state, &organizer, &performance_id, now)?;
                let slot = TimeWindow::new(start, end)?;
                Self::validate_slot(state, event, slot, Some(&performance_id))?;
                tracing::info!(%performance_id, "Performance rescheduled");
                Self::update(state, &performance_id, |performance| {
                    performance.start_time = start;
                    performance.end_time = end;
                })
            }

            PerformanceAction::Rename {
                organizer,
                performance_id,
                performer,
            } => {
                Self::editable_performance(state, &organizer, &performance_id, now)?;
                let performer = Self::validate_performer(&performer)?;
                Self::update(state, &performance_id, |performance| {
                    performance.performer = performer;
                })
            }

            PerformanceAction::AddSong {
                organizer,
                performance_id,
                title,
            } => {
                Self::editable_performance(state, &organizer, &performance_id, now)?;
                let title = Self::validate_title(&title)?;
                let song = Self::allocate_song(state, title);
                tracing::debug!(%performance_id, song_id = %song.id, "Song added");
                Self::update(state, &performance_id, |performance| {
                    performance.songs.push(song);
                })
            }

            PerformanceAction::RemoveSong {
                organizer,
                performance_id,
                song_id,
            } => {
                let (performance, _) =
                    Self::editable_performance(state, &organizer, &performance_id, now)?;
                if performance.song(&song_id).is_none() {
                    return Err(TicketingError::SongNotFound(song_id));
                }
                if performance.songs.len() == 1 {
                    return Err(TicketingError::InvalidInput(
                        "a performance needs at least one song".to_string(),
                    ));
                }
                Self::update(state, &performance_id, |performance| {
                    performance.songs.retain(|song| song.id != song_id);
                })
            }

            PerformanceAction::Delete {
                organizer,
                performance_id,
            } => {
                Self::editable_performance(state, &organizer, &performance_id, now)?;
                tracing::info!(%performance_id, "Performance deleted");
                Self::update(state, &performance_id, |performance| {
                    performance.deleted = true;
                })
            }
        }
    }
}

impl Reducer for PerformanceReducer {
    type State = TicketingState;
    type Action = PerformanceAction;
    type Environment = TicketingEnvironment;
    type Output = Result<Performance, TicketingError>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::Output {
        Self::apply(state, action, env.now())
    }
}

// ============================================================================
// Lineup
// ============================================================================

/// Actions on an event's whole lineup
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineupAction {
    /// Delete every performance of the event
    Clear {
        /// Organizer of the event
        organizer: UserId,
        /// Event
        event_id: EventId,
    },
}

/// Reducer for whole-lineup changes; outputs how many performances changed
#[derive(Clone, Copy, Debug, Default)]
pub struct LineupReducer;

impl LineupReducer {
    /// Creates a new `LineupReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for LineupReducer {
    type State = TicketingState;
    type Action = LineupAction;
    type Environment = TicketingEnvironment;
    type Output = Result<usize, TicketingError>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::Output {
        match action {
            LineupAction::Clear {
                organizer,
                event_id,
            } => {
                PerformanceReducer::editable_event(state, &organizer, &event_id, env.now())?;
                let mut removed = 0;
                for performance in state.performances.iter_mut() {
                    if performance.event_id == event_id {
                        performance.deleted = true;
                        removed += 1;
                    }
                }
                tracing::info!(%event_id, removed, "Lineup cleared");
                Ok(removed)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::test_support::{add_event, add_performance, customer, env_at, organizer};
    use boxoffice_testing::{assertions, helpers::utc, ReducerTest};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        utc(2025, 5, 1, hour, minute)
    }

    fn festival(state: &mut TicketingState) -> EventId {
        add_event(state, at(9, 0), at(23, 0), 100)
    }

    fn slot(start: DateTime<Utc>, end: DateTime<Utc>) -> Performance {
        Performance {
            id: PerformanceId::new("PERF001"),
            event_id: EventId::new("EV001"),
            performer: "Existing".to_string(),
            songs: Vec::new(),
            start_time: start,
            end_time: end,
            deleted: false,
        }
    }

    #[test]
    fn boundary_configurations() {
        let existing = [slot(at(10, 0), at(11, 0))];
        let check = |start, end| check_schedule(start, end, &existing, None);

        assert_eq!(check(at(11, 0), at(12, 0)), ScheduleCheck::Valid);
        assert_eq!(check(at(9, 0), at(10, 0)), ScheduleCheck::Valid);
        assert_eq!(check(at(10, 30), at(11, 30)), ScheduleCheck::TimeConflict);
        assert_eq!(check(at(9, 30), at(10, 30)), ScheduleCheck::TimeConflict);
        assert_eq!(check(at(9, 0), at(12, 0)), ScheduleCheck::TimeConflict);
        assert_eq!(check(at(10, 15), at(10, 45)), ScheduleCheck::TimeConflict);
        assert_eq!(check(at(10, 0), at(10, 30)), ScheduleCheck::TimeConflict);
        assert_eq!(check(at(10, 30), at(11, 0)), ScheduleCheck::TimeConflict);
        assert_eq!(check(at(10, 0), at(11, 0)), ScheduleCheck::ExactTimeMatch);
    }

    #[test]
    fn deleted_and_excluded_slots_are_ignored() {
        let mut deleted = slot(at(10, 0), at(11, 0));
        deleted.deleted = true;
        assert_eq!(
            check_schedule(at(10, 0), at(11, 0), [&deleted], None),
            ScheduleCheck::Valid
        );

        let editing = slot(at(10, 0), at(11, 0));
        assert_eq!(
            check_schedule(at(10, 30), at(11, 30), [&editing], Some(&editing.id)),
            ScheduleCheck::Valid
        );
    }

    #[test]
    fn add_allocates_song_ids() {
        let mut state = TicketingState::new();
        let event_id = festival(&mut state);
        add_performance(&mut state, &event_id, at(10, 0), at(11, 0), &["Opening"]);

        ReducerTest::new(PerformanceReducer::new())
            .with_env(env_at(utc(2025, 4, 1, 9, 0)))
            .given_state(state)
            .when_action(PerformanceAction::Add {
                organizer: organizer(),
                event_id,
                performer: "  The Voids  ".to_string(),
                start: at(11, 0),
                end: at(12, 0),
                songs: vec!["First".to_string(), "Second".to_string()],
            })
            .then_state(|state| assert_eq!(state.performances.len(), 2))
            .then_output(|output| {
                let performance = output.as_ref().unwrap();
                assert_eq!(performance.id.as_str(), "PERF002");
                assert_eq!(performance.performer, "The Voids");
                let ids: Vec<&str> = performance.songs.iter().map(|s| s.id.as_str()).collect();
                assert_eq!(ids, ["SONG0002", "SONG0003"]);
            })
            .run();
    }

    #[test]
    fn exact_duplicate_is_reported_as_such() {
        let mut state = TicketingState::new();
        let event_id = festival(&mut state);
        add_performance(&mut state, &event_id, at(10, 0), at(11, 0), &["Opening"]);

        ReducerTest::new(PerformanceReducer::new())
            .with_env(env_at(utc(2025, 4, 1, 9, 0)))
            .given_state(state)
            .when_action(PerformanceAction::Add {
                organizer: organizer(),
                event_id,
                performer: "Copycats".to_string(),
                start: at(10, 0),
                end: at(11, 0),
                songs: vec!["Echo".to_string()],
            })
            .then_state_unchanged()
            .then_output(|output| {
                assertions::assert_rejected_with(output, |error| {
                    matches!(error, TicketingError::ScheduleConflict(ScheduleCheck::ExactTimeMatch))
                });
            })
            .run();
    }

    #[test]
    fn slot_must_sit_inside_the_event() {
        let mut state = TicketingState::new();
        let event_id = festival(&mut state);

        ReducerTest::new(PerformanceReducer::new())
            .with_env(env_at(utc(2025, 4, 1, 9, 0)))
            .given_state(state)
            .when_action(PerformanceAction::Add {
                organizer: organizer(),
                event_id,
                performer: "Night Owls".to_string(),
                start: at(22, 30),
                end: at(23, 30),
                songs: vec!["Late".to_string()],
            })
            .then_state_unchanged()
            .then_output(|output| {
                assertions::assert_rejected_with(output, |error| {
                    matches!(error, TicketingError::OutsideEventWindow { .. })
                });
            })
            .run();
    }

    #[test]
    fn only_the_organizer_manages_the_lineup() {
        let mut state = TicketingState::new();
        let event_id = festival(&mut state);

        ReducerTest::new(PerformanceReducer::new())
            .with_env(env_at(utc(2025, 4, 1, 9, 0)))
            .given_state(state)
            .when_action(PerformanceAction::Add {
                organizer: customer(),
                event_id,
                performer: "Gatecrashers".to_string(),
                start: at(10, 0),
                end: at(11, 0),
                songs: vec!["Uninvited".to_string()],
            })
            .then_state_unchanged()
            .then_output(|output| {
                assertions::assert_rejected_with(output, |error| {
                    matches!(error, TicketingError::NotEventOrganizer(_))
                });
            })
            .run();
    }

    #[test]
    fn reschedule_ignores_its_own_slot() {
        let mut state = TicketingState::new();
        let event_id = festival(&mut state);
        let performance_id =
            add_performance(&mut state, &event_id, at(10, 0), at(11, 0), &["Opening"]);
        add_performance(&mut state, &event_id, at(12, 0), at(13, 0), &["Closing"]);

        ReducerTest::new(PerformanceReducer::new())
            .with_env(env_at(utc(2025, 4, 1, 9, 0)))
            .given_state(state)
            .when_action(PerformanceAction::Reschedule {
                organizer: organizer(),
                performance_id,
                start: at(10, 30),
                end: at(12, 0),
            })
            .then_output(|output| {
                let performance = output.as_ref().unwrap();
                assert_eq!(performance.start_time, at(10, 30));
                assert_eq!(performance.end_time, at(12, 0));
            })
            .run();
    }

    #[test]
    fn last_song_cannot_be_removed() {
        let mut state = TicketingState::new();
        let event_id = festival(&mut state);
        let performance_id =
            add_performance(&mut state, &event_id, at(10, 0), at(11, 0), &["Only"]);
        let song_id = state.performances.get(&performance_id).unwrap().songs[0].id.clone();

        ReducerTest::new(PerformanceReducer::new())
            .with_env(env_at(utc(2025, 4, 1, 9, 0)))
            .given_state(state)
            .when_action(PerformanceAction::RemoveSong {
                organizer: organizer(),
                performance_id,
                song_id,
            })
            .then_state_unchanged()
            .then_output(|output| assertions::assert_rejected(output))
            .run();
    }

    #[test]
    fn set_list_edits() {
        let mut state = TicketingState::new();
        let event_id = festival(&mut state);
        let performance_id =
            add_performance(&mut state, &event_id, at(10, 0), at(11, 0), &["One", "Two"]);
        let env = env_at(utc(2025, 4, 1, 9, 0));

        let performance = PerformanceReducer
            .reduce(
                &mut state,
                PerformanceAction::AddSong {
                    organizer: organizer(),
                    performance_id: performance_id.clone(),
                    title: "Three".to_string(),
                },
                &env,
            )
            .unwrap();
        assert_eq!(performance.songs.last().unwrap().id.as_str(), "SONG0003");

        let performance = PerformanceReducer
            .reduce(
                &mut state,
                PerformanceAction::RemoveSong {
                    organizer: organizer(),
                    performance_id: performance_id.clone(),
                    song_id: SongId::new("SONG0001"),
                },
                &env,
            )
            .unwrap();
        let titles: Vec<&str> = performance.songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Two", "Three"]);

        let performance = PerformanceReducer
            .reduce(
                &mut state,
                PerformanceAction::Rename {
                    organizer: organizer(),
                    performance_id,
                    performer: "X".to_string(),
                },
                &env,
            );
        assertions::assert_rejected(&performance);
    }

    #[test]
    fn clearing_the_lineup_frees_every_slot() {
        let mut state = TicketingState::new();
        let event_id = festival(&mut state);
        add_performance(&mut state, &event_id, at(10, 0), at(11, 0), &["One"]);
        add_performance(&mut state, &event_id, at(11, 0), at(12, 0), &["Two"]);
        let env = env_at(utc(2025, 4, 1, 9, 0));

        let removed = LineupReducer
            .reduce(
                &mut state,
                LineupAction::Clear {
                    organizer: organizer(),
                    event_id: event_id.clone(),
                },
                &env,
            )
            .unwrap();
        assert_eq!(removed, 2);
        assert!(performances_for_event(&state, &event_id).is_empty());

        // The old slots no longer block anything
        let performance = PerformanceReducer.reduce(
            &mut state,
            PerformanceAction::Add {
                organizer: organizer(),
                event_id,
                performer: "Encore".to_string(),
                start: at(10, 0),
                end: at(11, 0),
                songs: vec!["Again".to_string()],
            },
            &env,
        );
        assertions::assert_accepted(&performance);
    }
}
