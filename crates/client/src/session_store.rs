//! Typed persistence layer over [`crate::storage`].
//!
//! Owns every key the client persists: per-role event codes, session
//! tokens, the current lane, and cached per-participant score snapshots.
//! Tokens have no expiry logic here; the server invalidates them and the
//! client detects that via a push event or a failed authenticated call.

use serde::{de::DeserializeOwned, Serialize};

use lanescore_shared::ParticipantState;

use crate::log_warn;
use crate::storage::{default_backend, StorageBackend};

/// The three client roles. Used as a key prefix so one browser can hold a
/// host, a lane and a viewer session side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
    Viewer,
}

impl Role {
    fn prefix(self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Client => "client",
            Role::Viewer => "viewer",
        }
    }
}

const KEY_LANE: &str = "client_lane";
const KEY_HOST_PASSWORD: &str = "host_password";
const STATE_PREFIX: &str = "participant_state_";

pub struct SessionStore {
    backend: Box<dyn StorageBackend>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            backend: default_backend(),
        }
    }

    /// Store backed by memory only. Used in tests.
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(crate::storage::MemoryStore::default()),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => {
                if !self.backend.set(key, &json) {
                    log_warn!("storage write failed for key {}", key);
                }
            }
            Err(e) => log_warn!("storage serialize failed for key {}: {}", key, e),
        }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        serde_json::from_str(&self.backend.get(key)?).ok()
    }

    // --- Event code, per role ---

    pub fn save_event_code(&self, role: Role, code: &str) {
        self.save(&format!("{}_code", role.prefix()), &code);
    }

    pub fn event_code(&self, role: Role) -> Option<String> {
        self.load(&format!("{}_code", role.prefix()))
    }

    pub fn clear_event_code(&self, role: Role) {
        self.backend.remove(&format!("{}_code", role.prefix()));
    }

    // --- Session tokens ---

    /// Host and viewer tokens are event-wide; lane tokens are per lane.
    pub fn save_session(&self, role: Role, session_id: &str) {
        self.save(&format!("{}_session", role.prefix()), &session_id);
    }

    pub fn session(&self, role: Role) -> Option<String> {
        self.load(&format!("{}_session", role.prefix()))
    }

    pub fn clear_session(&self, role: Role) {
        self.backend.remove(&format!("{}_session", role.prefix()));
    }

    pub fn save_lane_session(&self, lane: u32, session_id: &str) {
        self.save(&format!("lane_session_{lane}"), &session_id);
    }

    pub fn lane_session(&self, lane: u32) -> Option<String> {
        self.load(&format!("lane_session_{lane}"))
    }

    pub fn clear_lane_session(&self, lane: u32) {
        self.backend.remove(&format!("lane_session_{lane}"));
    }

    // --- Current lane ---

    pub fn save_lane(&self, lane: u32) {
        self.save(KEY_LANE, &lane);
    }

    pub fn lane(&self) -> Option<u32> {
        self.load(KEY_LANE)
    }

    pub fn clear_lane(&self) {
        self.backend.remove(KEY_LANE);
    }

    // --- Host password (cleared on explicit exit) ---

    pub fn save_host_password(&self, password: &str) {
        self.save(KEY_HOST_PASSWORD, &password);
    }

    pub fn host_password(&self) -> Option<String> {
        self.load(KEY_HOST_PASSWORD)
    }

    pub fn clear_host_password(&self) {
        self.backend.remove(KEY_HOST_PASSWORD);
    }

    // --- Cached participant snapshots ---

    pub fn save_participant_state(&self, participant_id: i64, state: &ParticipantState) {
        self.save(&format!("{STATE_PREFIX}{participant_id}"), state);
    }

    pub fn participant_state(&self, participant_id: i64) -> Option<ParticipantState> {
        self.load(&format!("{STATE_PREFIX}{participant_id}"))
    }

    pub fn clear_participant_state(&self, participant_id: i64) {
        self.backend.remove(&format!("{STATE_PREFIX}{participant_id}"));
    }

    /// Wipe every cached snapshot. Done on lane entry so stale views from a
    /// previous event or lane never bleed through.
    pub fn clear_all_participant_states(&self) {
        for key in self.backend.keys() {
            if key.starts_with(STATE_PREFIX) {
                self.backend.remove(&key);
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanescore_shared::{DistanceState, DistanceStatus};

    fn state(total: i64) -> ParticipantState {
        ParticipantState {
            distances: vec![DistanceState {
                distance_id: 1,
                status: DistanceStatus::Finished,
                total_score: Some(total),
                shots: vec![],
            }],
        }
    }

    #[test]
    fn roles_do_not_share_codes_or_sessions() {
        let store = SessionStore::in_memory();
        store.save_event_code(Role::Host, "ABC123");
        store.save_event_code(Role::Viewer, "XYZ789");
        store.save_session(Role::Host, "host-token");

        assert_eq!(store.event_code(Role::Host).as_deref(), Some("ABC123"));
        assert_eq!(store.event_code(Role::Viewer).as_deref(), Some("XYZ789"));
        assert_eq!(store.event_code(Role::Client), None);
        assert_eq!(store.session(Role::Viewer), None);
    }

    #[test]
    fn lane_sessions_are_scoped_per_lane() {
        let store = SessionStore::in_memory();
        store.save_lane_session(3, "s3");
        store.save_lane_session(4, "s4");
        store.clear_lane_session(3);
        assert_eq!(store.lane_session(3), None);
        assert_eq!(store.lane_session(4).as_deref(), Some("s4"));
    }

    #[test]
    fn clearing_all_snapshots_leaves_other_keys_alone() {
        let store = SessionStore::in_memory();
        store.save_participant_state(1, &state(100));
        store.save_participant_state(2, &state(200));
        store.save_lane(3);
        store.clear_all_participant_states();
        assert_eq!(store.participant_state(1), None);
        assert_eq!(store.participant_state(2), None);
        assert_eq!(store.lane(), Some(3));
    }

    #[test]
    fn host_password_is_removable() {
        let store = SessionStore::in_memory();
        store.save_host_password("K7Q2PX");
        assert!(store.host_password().is_some());
        store.clear_host_password();
        assert_eq!(store.host_password(), None);
    }
}
