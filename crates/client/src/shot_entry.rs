//! Shot entry working set for one (participant, distance).
//!
//! Pure state machine: no I/O, no timers. The lane driver feeds key events
//! in and persists the batch whenever a transition reports a completed
//! series. Shot numbers are 1-based and kept contiguous; the lowest
//! unfilled slot is the only valid input target, and corrections go
//! through an explicit confirm-and-clear of the slot first.

use std::collections::BTreeMap;

use lanescore_shared::{
    active_distance, Distance, EventStatus, ParticipantState, ShotInput, MAX_SCORE, SERIES_LEN,
};

/// Why scoring cannot be opened right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRefusal {
    /// Event still in setup; scores would be meaningless.
    NotStarted,
    /// Event finished; the record is sealed.
    Finished,
    /// Started, but no distance is active at the moment.
    NoActiveDistance,
}

/// Decide whether scoring is open and against which distance.
pub fn open_target<'a>(
    status: EventStatus,
    distances: &'a [Distance],
) -> Result<&'a Distance, EntryRefusal> {
    match status {
        EventStatus::Created => Err(EntryRefusal::NotStarted),
        EventStatus::Finished => Err(EntryRefusal::Finished),
        EventStatus::Started => active_distance(distances).ok_or(EntryRefusal::NoActiveDistance),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected,
    /// The shot is filled and was already selected: ask before clearing it.
    ConfirmClear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    Accepted {
        shot: u32,
        /// Set when the shot's series is now fully filled, which is the
        /// auto-save trigger.
        series_complete: Option<u32>,
    },
    /// Selection pointed past the next empty slot; it was moved there and
    /// the keypress discarded so the sequence stays contiguous.
    Redirected { next: u32 },
    AllFilled,
    InvalidScore,
}

#[derive(Debug, Clone)]
pub struct ShotEntry {
    participant_id: i64,
    distance_id: i64,
    shots_count: u32,
    shots: BTreeMap<u32, (u32, bool)>,
    selected: Option<u32>,
    /// Locked-in total over previously finished distances, displayed next
    /// to the working set but never edited here.
    finished_total: i64,
}

impl ShotEntry {
    /// Build the working set, preloading anything the server already holds
    /// for this distance.
    pub fn new(participant_id: i64, distance: &Distance, state: Option<&ParticipantState>) -> Self {
        let mut shots = BTreeMap::new();
        let mut finished_total = 0;
        if let Some(state) = state {
            finished_total = state.finished_total();
            if let Some(slice) = state.distance(distance.id) {
                for record in &slice.shots {
                    if record.shot >= 1 && record.shot <= distance.shots_count {
                        shots.insert(record.shot, (record.score, record.is_x));
                    }
                }
            }
        }
        let mut entry = Self {
            participant_id,
            distance_id: distance.id,
            shots_count: distance.shots_count,
            shots,
            selected: None,
            finished_total,
        };
        entry.selected = entry.next_empty();
        entry
    }

    pub fn participant_id(&self) -> i64 {
        self.participant_id
    }

    pub fn distance_id(&self) -> i64 {
        self.distance_id
    }

    pub fn shots_count(&self) -> u32 {
        self.shots_count
    }

    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    pub fn score_at(&self, shot: u32) -> Option<(u32, bool)> {
        self.shots.get(&shot).copied()
    }

    pub fn filled_count(&self) -> u32 {
        self.shots.len() as u32
    }

    /// First unfilled slot, or `None` when the distance is complete.
    pub fn next_empty(&self) -> Option<u32> {
        (1..=self.shots_count).find(|n| !self.shots.contains_key(n))
    }

    // --- Series geometry ---

    pub fn series_of(shot: u32) -> u32 {
        (shot - 1) / SERIES_LEN + 1
    }

    pub fn series_count(&self) -> u32 {
        self.shots_count.div_ceil(SERIES_LEN)
    }

    /// How many slots this series actually has; the trailing series may be
    /// shorter than [`SERIES_LEN`].
    pub fn intended_series_len(&self, series: u32) -> u32 {
        let start = (series - 1) * SERIES_LEN + 1;
        SERIES_LEN.min(self.shots_count - (start - 1))
    }

    fn series_filled(&self, series: u32) -> u32 {
        let start = (series - 1) * SERIES_LEN + 1;
        let end = (start + self.intended_series_len(series)).min(self.shots_count + 1);
        (start..end).filter(|n| self.shots.contains_key(n)).count() as u32
    }

    // --- Transitions ---

    pub fn select(&mut self, shot: u32) -> SelectOutcome {
        if self.selected == Some(shot) && self.shots.contains_key(&shot) {
            return SelectOutcome::ConfirmClear;
        }
        self.selected = Some(shot);
        SelectOutcome::Selected
    }

    /// Clear one shot and reselect it. Only meaningful for the most recent
    /// shots; the driver re-persists the batch right after.
    pub fn clear(&mut self, shot: u32) {
        self.shots.remove(&shot);
        self.selected = Some(shot);
    }

    pub fn input(&mut self, score: u32, is_x: bool) -> InputOutcome {
        if score > MAX_SCORE || (is_x && score != MAX_SCORE) {
            return InputOutcome::InvalidScore;
        }
        let Some(next) = self.next_empty() else {
            return InputOutcome::AllFilled;
        };
        let target = match self.selected {
            None => next,
            Some(shot) if shot == next => next,
            Some(_) => {
                self.selected = Some(next);
                return InputOutcome::Redirected { next };
            }
        };

        self.shots.insert(target, (score, is_x));
        self.selected = self.next_empty();

        let series = Self::series_of(target);
        let series_complete =
            (self.series_filled(series) == self.intended_series_len(series)).then_some(series);
        InputOutcome::Accepted {
            shot: target,
            series_complete,
        }
    }

    /// Remove the highest-numbered shot and select its slot. Returns the
    /// slot, or `None` when nothing has been entered.
    pub fn delete_last(&mut self) -> Option<u32> {
        let last = *self.shots.keys().next_back()?;
        self.shots.remove(&last);
        self.selected = Some(last);
        Some(last)
    }

    /// The series an exit warning should mention: a partially filled series
    /// whose intended size is the full [`SERIES_LEN`]. Short trailing
    /// series never warn, and neither does a clean series boundary.
    pub fn incomplete_series(&self) -> Option<(u32, u32, u32)> {
        (1..=self.series_count()).find_map(|series| {
            let intended = self.intended_series_len(series);
            let filled = self.series_filled(series);
            (intended == SERIES_LEN && filled > 0 && filled < intended)
                .then_some((series, filled, intended))
        })
    }

    // --- Totals ---

    pub fn in_progress_total(&self) -> i64 {
        self.shots.values().map(|(score, _)| *score as i64).sum()
    }

    pub fn total_score(&self) -> i64 {
        self.finished_total + self.in_progress_total()
    }

    pub fn finished_total(&self) -> i64 {
        self.finished_total
    }

    /// Full working set as a save batch. The server replaces its copy for
    /// this (participant, distance) pair, so resending is idempotent.
    pub fn batch(&self) -> Vec<ShotInput> {
        self.shots
            .iter()
            .map(|(&shot, &(score, is_x))| ShotInput {
                participant_id: self.participant_id,
                distance_id: self.distance_id,
                shot_number: shot,
                score,
                is_x,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanescore_shared::{DistanceState, DistanceStatus, ShotRecord};

    fn distance(shots_count: u32) -> Distance {
        Distance {
            id: 2,
            title: "18m".into(),
            shots_count,
            sort_order: 1,
            status: DistanceStatus::Active,
        }
    }

    fn fresh(shots_count: u32) -> ShotEntry {
        ShotEntry::new(7, &distance(shots_count), None)
    }

    #[test]
    fn scoring_opens_only_for_a_started_event_with_an_active_distance() {
        let distances = vec![distance(6)];
        assert_eq!(
            open_target(EventStatus::Created, &distances),
            Err(EntryRefusal::NotStarted)
        );
        assert_eq!(
            open_target(EventStatus::Finished, &distances),
            Err(EntryRefusal::Finished)
        );
        assert_eq!(
            open_target(EventStatus::Started, &distances).map(|d| d.id),
            Ok(2)
        );
        let pending = vec![Distance {
            status: DistanceStatus::Pending,
            ..distance(6)
        }];
        assert_eq!(
            open_target(EventStatus::Started, &pending),
            Err(EntryRefusal::NoActiveDistance)
        );
    }

    #[test]
    fn six_shots_fill_in_order_and_complete_two_series() {
        let mut entry = fresh(6);
        assert_eq!(entry.selected(), Some(1));

        let scores = [(9, false), (10, true), (8, false), (10, false), (9, false), (10, true)];
        let mut saves = Vec::new();
        for (i, &(score, is_x)) in scores.iter().enumerate() {
            match entry.input(score, is_x) {
                InputOutcome::Accepted {
                    shot,
                    series_complete,
                } => {
                    assert_eq!(shot, i as u32 + 1);
                    if let Some(series) = series_complete {
                        saves.push(series);
                    }
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        assert_eq!(saves, vec![1, 2]);
        assert_eq!(entry.in_progress_total(), 56);
        assert_eq!(entry.next_empty(), None);
        assert_eq!(entry.input(7, false), InputOutcome::AllFilled);

        let batch = entry.batch();
        assert_eq!(batch.len(), 6);
        assert_eq!(batch[1].shot_number, 2);
        assert!(batch[1].is_x);
    }

    #[test]
    fn series_geometry_handles_a_short_trailing_series() {
        let entry = fresh(10);
        assert_eq!(entry.series_count(), 4);
        assert_eq!(entry.intended_series_len(1), 3);
        assert_eq!(entry.intended_series_len(3), 3);
        assert_eq!(entry.intended_series_len(4), 1);
        assert_eq!(ShotEntry::series_of(9), 3);
        assert_eq!(ShotEntry::series_of(10), 4);
    }

    #[test]
    fn single_slot_trailing_series_completes_on_its_only_shot() {
        let mut entry = fresh(10);
        for _ in 0..9 {
            entry.input(5, false);
        }
        match entry.input(10, true) {
            InputOutcome::Accepted {
                shot,
                series_complete,
            } => {
                assert_eq!(shot, 10);
                assert_eq!(series_complete, Some(4));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn selecting_ahead_of_the_next_empty_slot_redirects() {
        let mut entry = fresh(6);
        entry.input(9, false);
        assert_eq!(entry.select(5), SelectOutcome::Selected);
        assert_eq!(entry.input(8, false), InputOutcome::Redirected { next: 2 });
        // The redirected keypress was discarded; the next one lands on 2.
        assert!(matches!(
            entry.input(8, false),
            InputOutcome::Accepted { shot: 2, .. }
        ));
    }

    #[test]
    fn reselecting_a_filled_shot_asks_before_clearing() {
        let mut entry = fresh(6);
        entry.input(9, false);
        assert_eq!(entry.select(1), SelectOutcome::Selected);
        assert_eq!(entry.select(1), SelectOutcome::ConfirmClear);
        entry.clear(1);
        assert_eq!(entry.score_at(1), None);
        assert_eq!(entry.selected(), Some(1));
        assert!(matches!(
            entry.input(10, true),
            InputOutcome::Accepted { shot: 1, .. }
        ));
    }

    #[test]
    fn correcting_a_filled_shot_requires_clearing_it_first() {
        let mut entry = fresh(6);
        for _ in 0..3 {
            entry.input(9, false);
        }
        entry.select(2);
        // A keypress on a filled slot is redirected, not an overwrite.
        assert_eq!(entry.input(10, true), InputOutcome::Redirected { next: 4 });
        assert_eq!(entry.score_at(2), Some((9, false)));

        entry.select(2);
        assert_eq!(entry.select(2), SelectOutcome::ConfirmClear);
        entry.clear(2);
        match entry.input(10, true) {
            InputOutcome::Accepted {
                shot,
                series_complete,
            } => {
                assert_eq!(shot, 2);
                // The hole is plugged, so the series is full again and the
                // corrected batch gets persisted.
                assert_eq!(series_complete, Some(1));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(entry.in_progress_total(), 28);
        // Selection returned to the lowest unfilled slot.
        assert_eq!(entry.selected(), Some(4));
    }

    #[test]
    fn invalid_scores_are_rejected() {
        let mut entry = fresh(6);
        assert_eq!(entry.input(11, false), InputOutcome::InvalidScore);
        assert_eq!(entry.input(9, true), InputOutcome::InvalidScore);
        assert_eq!(entry.filled_count(), 0);
    }

    #[test]
    fn delete_last_always_removes_the_highest_shot() {
        let mut entry = fresh(6);
        assert_eq!(entry.delete_last(), None);
        for _ in 0..4 {
            entry.input(7, false);
        }
        assert_eq!(entry.delete_last(), Some(4));
        assert_eq!(entry.selected(), Some(4));
        assert_eq!(entry.filled_count(), 3);
        // Shots stay contiguous from 1.
        assert_eq!(entry.next_empty(), Some(4));
    }

    #[test]
    fn exit_warning_covers_only_full_size_series() {
        let mut entry = fresh(10);
        assert_eq!(entry.incomplete_series(), None);
        entry.input(9, false);
        assert_eq!(entry.incomplete_series(), Some((1, 1, 3)));
        entry.input(9, false);
        entry.input(9, false);
        assert_eq!(entry.incomplete_series(), None);
        for _ in 0..6 {
            entry.input(9, false);
        }
        // Nine shots down, only the single-slot series 4 remains: no
        // warning for a short trailing series.
        assert_eq!(entry.incomplete_series(), None);
    }

    #[test]
    fn preloads_server_state_and_locked_in_totals() {
        let state = ParticipantState {
            distances: vec![
                DistanceState {
                    distance_id: 1,
                    status: DistanceStatus::Finished,
                    total_score: Some(250),
                    shots: vec![],
                },
                DistanceState {
                    distance_id: 2,
                    status: DistanceStatus::Active,
                    total_score: Some(19),
                    shots: vec![
                        ShotRecord {
                            shot: 1,
                            score: 9,
                            is_x: false,
                        },
                        ShotRecord {
                            shot: 2,
                            score: 10,
                            is_x: true,
                        },
                    ],
                },
            ],
        };
        let entry = ShotEntry::new(7, &distance(6), Some(&state));
        assert_eq!(entry.filled_count(), 2);
        assert_eq!(entry.selected(), Some(3));
        assert_eq!(entry.finished_total(), 250);
        assert_eq!(entry.in_progress_total(), 19);
        assert_eq!(entry.total_score(), 269);
    }
}
