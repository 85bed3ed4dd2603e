//! Participant roster cards for the lane and host/viewer screens.

use std::collections::{BTreeMap, HashMap};

use lanescore_shared::{
    Distance, DistanceStatus, EventStatus, Participant, ParticipantState, PublicProperties,
};

/// One distance tag on a card. Scores are only shown once a distance is
/// underway; pending distances render as a bare title.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceCell {
    pub distance_id: i64,
    pub title: String,
    pub score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterCard {
    pub participant: Participant,
    pub distances: Vec<DistanceCell>,
    pub total: i64,
}

fn card(
    participant: &Participant,
    distances: &[Distance],
    states: &HashMap<i64, ParticipantState>,
) -> RosterCard {
    let state = states.get(&participant.id);
    let cells = distances
        .iter()
        .map(|distance| {
            let score = match distance.status {
                DistanceStatus::Pending => None,
                DistanceStatus::Active | DistanceStatus::Finished => state
                    .and_then(|s| s.distance(distance.id))
                    .and_then(|d| d.total_score),
            };
            DistanceCell {
                distance_id: distance.id,
                title: distance.title.clone(),
                score,
            }
        })
        .collect();
    RosterCard {
        participant: participant.clone(),
        distances: cells,
        total: state.map(ParticipantState::overall_total).unwrap_or(0),
    }
}

/// One lane's roster, ordered by shift label.
pub fn lane_roster(
    participants: &[Participant],
    distances: &[Distance],
    states: &HashMap<i64, ParticipantState>,
) -> Vec<RosterCard> {
    let mut cards: Vec<_> = participants
        .iter()
        .map(|p| card(p, distances, states))
        .collect();
    cards.sort_by(|a, b| a.participant.shift.cmp(&b.participant.shift));
    cards
}

/// Full-range roster grouped by lane number, for host and viewer screens.
pub fn roster_by_lane(
    participants: &[Participant],
    distances: &[Distance],
    states: &HashMap<i64, ParticipantState>,
) -> BTreeMap<u32, Vec<RosterCard>> {
    let mut lanes: BTreeMap<u32, Vec<RosterCard>> = BTreeMap::new();
    for participant in participants {
        lanes
            .entry(participant.lane_number)
            .or_default()
            .push(card(participant, distances, states));
    }
    for cards in lanes.values_mut() {
        cards.sort_by(|a, b| a.participant.shift.cmp(&b.participant.shift));
    }
    lanes
}

/// Lanes may register shooters only during setup, and only while the host
/// has the public flag on.
pub fn can_add_participants(status: EventStatus, properties: &PublicProperties) -> bool {
    status == EventStatus::Created && properties.client_allow_add_participant
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: i64, lane: u32, shift: &str) -> Participant {
        Participant {
            id,
            name: format!("Shooter {id}"),
            lane_number: lane,
            shift: shift.into(),
            gender: None,
            age_category: None,
            shooting_type: None,
            group_type: None,
            personal_number: None,
        }
    }

    fn distance(id: i64, status: DistanceStatus) -> Distance {
        Distance {
            id,
            title: format!("{}m", id * 10),
            shots_count: 30,
            sort_order: id,
            status,
        }
    }

    #[test]
    fn pending_distances_hide_scores_and_cards_sort_by_shift() {
        let participants = vec![participant(2, 3, "B"), participant(1, 3, "A")];
        let distances = vec![
            distance(1, DistanceStatus::Finished),
            distance(2, DistanceStatus::Pending),
        ];
        let mut states = HashMap::new();
        states.insert(
            1,
            ParticipantState {
                distances: vec![lanescore_shared::DistanceState {
                    distance_id: 1,
                    status: DistanceStatus::Finished,
                    total_score: Some(250),
                    shots: vec![],
                }],
            },
        );

        let cards = lane_roster(&participants, &distances, &states);
        assert_eq!(cards[0].participant.shift, "A");
        assert_eq!(cards[0].distances[0].score, Some(250));
        assert_eq!(cards[0].distances[1].score, None);
        assert_eq!(cards[0].total, 250);
        assert_eq!(cards[1].total, 0);
    }

    #[test]
    fn by_lane_groups_and_orders_lanes() {
        let participants = vec![
            participant(1, 5, "A"),
            participant(2, 2, "A"),
            participant(3, 5, "B"),
        ];
        let lanes = roster_by_lane(&participants, &[], &HashMap::new());
        assert_eq!(lanes.keys().copied().collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(lanes[&5].len(), 2);
    }

    #[test]
    fn add_participant_needs_setup_phase_and_the_allow_flag() {
        let allow = PublicProperties {
            client_allow_add_participant: true,
        };
        let deny = PublicProperties {
            client_allow_add_participant: false,
        };
        assert!(can_add_participants(EventStatus::Created, &allow));
        assert!(!can_add_participants(EventStatus::Created, &deny));
        assert!(!can_add_participants(EventStatus::Started, &allow));
    }
}
