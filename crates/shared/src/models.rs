//! Wire-level data models for events, distances, participants and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event codes are always exactly this long.
pub const CODE_LEN: usize = 6;
/// Highest score a single shot can carry.
pub const MAX_SCORE: u32 = 10;
/// Shots per display/auto-save series.
pub const SERIES_LEN: u32 = 3;
/// Valid range for a distance's shot target.
pub const MIN_SHOTS: u32 = 1;
pub const MAX_SHOTS: u32 = 200;
/// Physical lanes on the range.
pub const LANE_COUNT: u32 = 28;

/// Shape check for event codes, applied client-side before any request.
pub fn valid_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.chars().all(|c| c.is_ascii_alphanumeric())
}

// --- Event ---

/// Event lifecycle. Monotonic: created -> started -> finished, never back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Created,
    Started,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub code: String,
    pub shots_count: u32,
    pub status: EventStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCreate {
    pub code: String,
    pub shots_count: u32,
}

/// Response to event creation: the host password is minted server-side and
/// shown to the operator exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub code: String,
    pub host_password: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shots_count: Option<u32>,
}

// --- Distance ---

/// Distance lifecycle. The server guarantees at most one `Active` distance
/// per event; the client verifies that against fetched state rather than
/// assuming it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceStatus {
    Pending,
    Active,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Distance {
    pub id: i64,
    pub title: String,
    pub shots_count: u32,
    pub sort_order: i64,
    pub status: DistanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceCreate {
    pub title: String,
    pub shots_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistancePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shots_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DistanceStatus>,
}

/// The currently active distance, if the invariant holds.
pub fn active_distance(distances: &[Distance]) -> Option<&Distance> {
    distances.iter().find(|d| d.status == DistanceStatus::Active)
}

// --- Participant ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub id: i64,
    pub name: String,
    pub lane_number: u32,
    pub shift: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age_category: Option<String>,
    #[serde(default)]
    pub shooting_type: Option<String>,
    #[serde(default)]
    pub group_type: Option<String>,
    #[serde(default)]
    pub personal_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantDraft {
    pub name: String,
    pub lane_number: u32,
    pub shift: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shooting_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_number: Option<String>,
}

// --- Results ---

/// One row of a save batch. Shot numbers are 1-based and contiguous per
/// (participant, distance).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShotInput {
    pub participant_id: i64,
    pub distance_id: i64,
    pub shot_number: u32,
    pub score: u32,
    pub is_x: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShotRecord {
    pub shot: u32,
    pub score: u32,
    pub is_x: bool,
}

/// Per-distance slice of a participant's scored record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistanceState {
    pub distance_id: i64,
    pub status: DistanceStatus,
    pub total_score: Option<i64>,
    #[serde(default)]
    pub shots: Vec<ShotRecord>,
}

/// Read view of everything a participant has shot so far, cached locally
/// keyed by participant id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParticipantState {
    #[serde(default)]
    pub distances: Vec<DistanceState>,
}

impl ParticipantState {
    pub fn distance(&self, distance_id: i64) -> Option<&DistanceState> {
        self.distances.iter().find(|d| d.distance_id == distance_id)
    }

    /// Sum of totals over finished distances only. The active distance is
    /// deliberately excluded so an in-progress working set is never counted
    /// twice.
    pub fn finished_total(&self) -> i64 {
        self.distances
            .iter()
            .filter(|d| d.status == DistanceStatus::Finished)
            .filter_map(|d| d.total_score)
            .sum()
    }

    /// Grand total over all distances, used on roster cards.
    pub fn overall_total(&self) -> i64 {
        self.distances.iter().filter_map(|d| d.total_score).sum()
    }
}

/// Host drill-down for one participant/distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceDetail {
    pub title: String,
    pub total_score: i64,
    pub avg_score: f64,
    pub x_count: u32,
    pub ten_count: u32,
    pub series: Vec<SeriesDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesDetail {
    pub series: u32,
    pub total: i64,
    pub avg: f64,
    pub shots: Vec<DetailShot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailShot {
    pub score: Option<u32>,
    pub is_x: bool,
}

// --- Leaderboard ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistanceScore {
    pub distance_id: i64,
    pub score: Option<i64>,
    #[serde(default)]
    pub shots_taken: u32,
}

/// One ranked row as aggregated server-side. Grouping and ranking on top of
/// these is purely presentational.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub id: i64,
    pub name: String,
    pub lane_shift: String,
    pub total_score: i64,
    pub x_count: u32,
    pub ten_count: u32,
    #[serde(default)]
    pub m_count: u32,
    #[serde(default)]
    pub avg_score: f64,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub shooting_type: Option<String>,
    #[serde(default)]
    pub distance_scores: Vec<DistanceScore>,
}

// --- Sessions ---

/// Outcome trichotomy shared by host, viewer and lane logins. `Created`
/// only ever occurs for lanes (first entry mints the lane password).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Ok,
    PasswordRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub status: SessionStatus,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub lane_number: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneSessions {
    pub lanes: Vec<u32>,
}

// --- Properties ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventProperties {
    #[serde(default)]
    pub host_password: String,
    #[serde(default)]
    pub viewer_password: String,
    #[serde(default)]
    pub client_allow_add_participant: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertiesPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_allow_add_participant: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProperties {
    #[serde(default = "default_true")]
    pub client_allow_add_participant: bool,
}

fn default_true() -> bool {
    true
}
