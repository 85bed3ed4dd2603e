//! Read-only view models derived from fetched state. Pure functions and
//! plain structs; the UI layer renders them as-is.

pub mod leaderboard;
pub mod roster;

pub use leaderboard::{Facets, Leaderboard, LeaderboardGroup, RankedEntry};
pub use roster::{can_add_participants, lane_roster, roster_by_lane, DistanceCell, RosterCard};
