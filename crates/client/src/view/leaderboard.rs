//! Leaderboard grouping and ranking on top of the server's flat rows.

use std::collections::{BTreeMap, HashMap};

use lanescore_shared::{EventStatus, LeaderboardEntry};

const UNKNOWN: &str = "unknown";

/// Facet filters. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facets {
    pub gender: Option<String>,
    pub shooting_type: Option<String>,
}

impl Facets {
    fn matches(&self, gender: &str, shooting_type: &str) -> bool {
        self.gender.as_deref().is_none_or(|g| g == gender)
            && self.shooting_type.as_deref().is_none_or(|t| t == shooting_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    /// 1-based position within the group. `None` while the event is still
    /// in setup, when standings would be noise.
    pub rank: Option<u32>,
    pub entry: LeaderboardEntry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardGroup {
    pub gender: String,
    pub shooting_type: String,
    pub title: String,
    pub entries: Vec<RankedEntry>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Leaderboard {
    pub groups: Vec<LeaderboardGroup>,
}

/// Regroup the server's rows by (gender, shooting type), sort and rank.
/// The server's own grouping key is discarded; demographics drive the
/// display. Groups come out ordered by key so the layout is stable
/// between refreshes.
pub fn build(
    fetched: &HashMap<String, Vec<LeaderboardEntry>>,
    status: EventStatus,
    facets: &Facets,
) -> Leaderboard {
    let mut grouped: BTreeMap<(String, String), Vec<LeaderboardEntry>> = BTreeMap::new();
    for entry in fetched.values().flatten() {
        let gender = entry
            .gender
            .clone()
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let shooting_type = entry
            .shooting_type
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
        if !facets.matches(&gender, &shooting_type) {
            continue;
        }
        grouped
            .entry((gender, shooting_type))
            .or_default()
            .push(entry.clone());
    }

    let ranked = status != EventStatus::Created;
    let groups = grouped
        .into_iter()
        .map(|((gender, shooting_type), mut rows)| {
            rows.sort_by(|a, b| {
                b.total_score
                    .cmp(&a.total_score)
                    .then(b.x_count.cmp(&a.x_count))
                    .then(b.ten_count.cmp(&a.ten_count))
            });
            let entries = rows
                .into_iter()
                .enumerate()
                .map(|(i, entry)| RankedEntry {
                    rank: ranked.then_some(i as u32 + 1),
                    entry,
                })
                .collect();
            LeaderboardGroup {
                title: group_title(&gender, &shooting_type),
                gender,
                shooting_type,
                entries,
            }
        })
        .collect();

    Leaderboard { groups }
}

/// Heading for one group. Unknown parts are omitted; a fully unknown group
/// gets a generic heading rather than the word "unknown".
pub fn group_title(gender: &str, shooting_type: &str) -> String {
    let gender_part = match gender {
        "male" => Some("MEN".to_string()),
        "female" => Some("WOMEN".to_string()),
        UNKNOWN => None,
        other => Some(other.to_uppercase()),
    };
    let type_part = match shooting_type {
        UNKNOWN => None,
        other => Some(other.replace('_', " ").to_uppercase()),
    };
    match (type_part, gender_part) {
        (Some(t), Some(g)) => format!("{t} {g}"),
        (Some(t), None) => t,
        (None, Some(g)) => g,
        (None, None) => "UNSPECIFIED".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched(rows: Vec<LeaderboardEntry>) -> HashMap<String, Vec<LeaderboardEntry>> {
        HashMap::from([("all".to_string(), rows)])
    }

    fn entry(
        id: i64,
        total: i64,
        x: u32,
        tens: u32,
        gender: Option<&str>,
        shooting_type: Option<&str>,
    ) -> LeaderboardEntry {
        LeaderboardEntry {
            id,
            name: format!("Shooter {id}"),
            lane_shift: "3A".into(),
            total_score: total,
            x_count: x,
            ten_count: tens,
            m_count: 0,
            avg_score: 0.0,
            gender: gender.map(String::from),
            shooting_type: shooting_type.map(String::from),
            distance_scores: vec![],
        }
    }

    #[test]
    fn ties_break_on_x_then_ten_count() {
        let rows = vec![
            entry(1, 560, 10, 20, Some("male"), Some("recurve")),
            entry(2, 560, 12, 18, Some("male"), Some("recurve")),
            entry(3, 560, 12, 22, Some("male"), Some("recurve")),
        ];
        let board = build(&fetched(rows), EventStatus::Started, &Facets::default());
        let ids: Vec<_> = board.groups[0].entries.iter().map(|e| e.entry.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(board.groups[0].entries[0].rank, Some(1));
    }

    #[test]
    fn ranks_are_suppressed_during_setup() {
        let rows = vec![entry(1, 0, 0, 0, Some("female"), Some("compound_bow"))];
        let board = build(&fetched(rows), EventStatus::Created, &Facets::default());
        assert_eq!(board.groups[0].entries[0].rank, None);
    }

    #[test]
    fn missing_demographics_fall_back_to_one_unknown_group() {
        let rows = vec![
            entry(1, 100, 0, 0, None, None),
            entry(2, 90, 0, 0, Some(""), None),
        ];
        let board = build(&fetched(rows), EventStatus::Started, &Facets::default());
        assert_eq!(board.groups.len(), 1);
        assert_eq!(board.groups[0].title, "UNSPECIFIED");
        assert_eq!(board.groups[0].entries.len(), 2);
    }

    #[test]
    fn titles_follow_the_display_convention() {
        assert_eq!(group_title("male", "compound_bow"), "COMPOUND BOW MEN");
        assert_eq!(group_title("female", "unknown"), "WOMEN");
        assert_eq!(group_title("unknown", "barebow"), "BAREBOW");
    }

    #[test]
    fn facets_narrow_the_groups() {
        let rows = vec![
            entry(1, 100, 0, 0, Some("male"), Some("recurve")),
            entry(2, 90, 0, 0, Some("female"), Some("recurve")),
        ];
        let facets = Facets {
            gender: Some("female".into()),
            shooting_type: None,
        };
        let board = build(&fetched(rows), EventStatus::Started, &facets);
        assert_eq!(board.groups.len(), 1);
        assert_eq!(board.groups[0].entries[0].entry.id, 2);
    }
}
