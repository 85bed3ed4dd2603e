//! Host console driver: event lifecycle, distance and participant
//! management, lane administration, leaderboard.

use std::collections::{BTreeMap, HashMap};

use futures_channel::mpsc::UnboundedReceiver;

use lanescore_shared::{
    active_distance, CreatedEvent, Distance, DistanceCreate, DistanceDetail, DistancePatch,
    DistanceStatus, Event, EventCreate, EventPatch, EventProperties, EventStatus, GatewayError,
    LoginRequest, Participant, ParticipantDraft, ParticipantState, PropertiesPatch, SessionStatus,
    SyncMessage, MAX_SHOTS, MIN_SHOTS,
};

use crate::config::Endpoints;
use crate::gateway::Gateway;
use crate::session_store::{Role, SessionStore};
use crate::sync::SyncChannel;
use crate::view::{leaderboard, roster_by_lane, Facets, Leaderboard, RosterCard};
use crate::log_warn;

/// Outcome of entering an event code as host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEntry {
    /// No such event: offer to create it under this code.
    Unknown,
    Ready,
    PasswordRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEffect {
    RosterChanged,
    ResultsChanged,
    DistancesChanged,
    Ignored,
}

pub struct HostApp {
    gateway: Gateway,
    store: SessionStore,
    sync: Option<SyncChannel>,
    push_rx: Option<UnboundedReceiver<SyncMessage>>,
    code: Option<String>,
    event: Option<Event>,
    distances: Vec<Distance>,
    participants: Vec<Participant>,
    states: HashMap<i64, ParticipantState>,
}

impl HostApp {
    pub fn new(endpoints: Endpoints) -> Self {
        Self::with_store(endpoints, SessionStore::new())
    }

    pub fn with_store(endpoints: Endpoints, store: SessionStore) -> Self {
        Self {
            gateway: Gateway::new(endpoints),
            store,
            sync: None,
            push_rx: None,
            code: None,
            event: None,
            distances: Vec::new(),
            participants: Vec::new(),
            states: HashMap::new(),
        }
    }

    pub fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }

    pub fn distances(&self) -> &[Distance] {
        &self.distances
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// The stored host password, for redisplay in the host's own settings.
    pub fn host_password(&self) -> Option<String> {
        self.store.host_password()
    }

    // --- Entry, creation and login ---

    /// Look the code up. Unknown codes are an invitation to create, not an
    /// error; a known code tries the cached session before asking for the
    /// password.
    pub async fn enter(&mut self, code: &str) -> Result<HostEntry, GatewayError> {
        super::check_code(code)?;
        match self.gateway.event(code).await {
            Ok(event) => {
                self.code = Some(code.to_string());
                self.event = Some(event);
                if let Some(session) = self.store.session(Role::Host) {
                    let login = LoginRequest {
                        password: None,
                        session_id: Some(session),
                    };
                    if let Ok(response) = self.gateway.host_login(code, &login).await {
                        if response.status == SessionStatus::Ok {
                            self.adopt_session(code, response.session_id);
                            return Ok(HostEntry::Ready);
                        }
                    }
                    self.store.clear_session(Role::Host);
                }
                Ok(HostEntry::PasswordRequired)
            }
            Err(e) if e.is_not_found() => {
                self.code = Some(code.to_string());
                Ok(HostEntry::Unknown)
            }
            Err(e) => Err(e),
        }
    }

    /// Create the event under the entered code. The server mints the host
    /// password; it is stored for this operator and shown in settings.
    pub async fn create(&mut self, shots_count: u32) -> Result<CreatedEvent, GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let create = EventCreate {
            code: code.clone(),
            shots_count: shots_count.clamp(MIN_SHOTS, MAX_SHOTS),
        };
        let created = self.gateway.create_event(&create).await?;
        self.store.save_host_password(&created.host_password);
        self.adopt_session(&code, Some(created.session_id.clone()));
        self.event = Some(self.gateway.event(&code).await?);
        Ok(created)
    }

    /// Password login. An auth failure surfaces once; no retry loop.
    pub async fn login(&mut self, password: &str) -> Result<(), GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let login = LoginRequest {
            password: Some(password.to_string()),
            session_id: None,
        };
        let response = self.gateway.host_login(&code, &login).await?;
        match response.status {
            SessionStatus::Ok | SessionStatus::Created => {
                self.adopt_session(&code, response.session_id);
                Ok(())
            }
            SessionStatus::PasswordRequired => {
                Err(GatewayError::Auth("host password rejected".to_string()))
            }
        }
    }

    fn adopt_session(&mut self, code: &str, session_id: Option<String>) {
        self.store.save_event_code(Role::Host, code);
        if let Some(session) = session_id {
            self.store.save_session(Role::Host, &session);
            self.gateway.set_session(Some(session));
        }
    }

    /// Resume from the stored code + token. Falls back to manual entry.
    pub async fn restore(&mut self) -> Option<HostEntry> {
        let code = self.store.event_code(Role::Host)?;
        match self.enter(&code).await {
            Ok(HostEntry::Ready) => Some(HostEntry::Ready),
            _ => None,
        }
    }

    // --- Sync channel ---

    pub fn attach_sync(&mut self) {
        let Some(code) = &self.code else { return };
        let channel = SyncChannel::new(self.gateway.endpoints().ws_url(code));
        self.push_rx = Some(super::forward_all(&channel));
        channel.connect();
        self.sync = Some(channel);
    }

    pub fn poll_push(&mut self) -> Option<SyncMessage> {
        super::try_pop(&mut self.push_rx)
    }

    fn broadcast(&self, message: SyncMessage) {
        if let Some(sync) = &self.sync {
            sync.send(&message);
        }
    }

    // --- Event lifecycle ---

    pub async fn refresh(&mut self) -> Result<(), GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        self.event = Some(self.gateway.event(&code).await?);
        self.distances = self.gateway.distances(&code).await?;
        self.participants = self.gateway.participants(&code).await?;
        for participant in &self.participants {
            match self.gateway.participant_state(&code, participant.id).await {
                Ok(state) => {
                    self.states.insert(participant.id, state);
                }
                Err(e) => log_warn!("state refresh failed for participant {}: {}", participant.id, e),
            }
        }
        Ok(())
    }

    async fn set_event_status(&mut self, status: EventStatus) -> Result<(), GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let patch = EventPatch {
            status: Some(status),
            shots_count: None,
        };
        self.event = Some(self.gateway.update_event(&code, &patch).await?);
        self.broadcast(SyncMessage::EventStatus {
            status,
            active_distance_id: active_distance(&self.distances).map(|d| d.id),
        });
        Ok(())
    }

    pub async fn start_event(&mut self) -> Result<(), GatewayError> {
        self.set_event_status(EventStatus::Started).await
    }

    /// Finish the event. Lanes with open entry screens get a pushed stop.
    pub async fn finish_event(&mut self) -> Result<(), GatewayError> {
        self.set_event_status(EventStatus::Finished).await
    }

    // --- Distances ---

    fn pending_only(&self, distance_id: i64) -> Result<(), GatewayError> {
        let Some(distance) = self.distances.iter().find(|d| d.id == distance_id) else {
            return Err(GatewayError::NotFound(format!("distance {distance_id}")));
        };
        if distance.status != DistanceStatus::Pending {
            return Err(GatewayError::Validation(
                "only pending distances can be edited".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn add_distance(
        &mut self,
        title: &str,
        shots_count: u32,
    ) -> Result<Distance, GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let create = DistanceCreate {
            title: title.to_string(),
            shots_count: shots_count.clamp(MIN_SHOTS, MAX_SHOTS),
        };
        let distance = self.gateway.create_distance(&code, &create).await?;
        self.distances.push(distance.clone());
        self.distances.sort_by_key(|d| d.sort_order);
        self.broadcast(SyncMessage::DistanceUpdate {
            distance_id: Some(distance.id),
        });
        Ok(distance)
    }

    pub async fn edit_distance(
        &mut self,
        distance_id: i64,
        title: Option<String>,
        shots_count: Option<u32>,
    ) -> Result<Distance, GatewayError> {
        self.pending_only(distance_id)?;
        let code = self.code.clone().ok_or_else(no_event)?;
        let patch = DistancePatch {
            title,
            shots_count: shots_count.map(|n| n.clamp(MIN_SHOTS, MAX_SHOTS)),
            status: None,
        };
        let updated = self.gateway.update_distance(&code, distance_id, &patch).await?;
        if let Some(slot) = self.distances.iter_mut().find(|d| d.id == distance_id) {
            *slot = updated.clone();
        }
        self.broadcast(SyncMessage::DistanceUpdate {
            distance_id: Some(distance_id),
        });
        Ok(updated)
    }

    pub async fn delete_distance(&mut self, distance_id: i64) -> Result<(), GatewayError> {
        self.pending_only(distance_id)?;
        let code = self.code.clone().ok_or_else(no_event)?;
        self.gateway.delete_distance(&code, distance_id).await?;
        self.distances.retain(|d| d.id != distance_id);
        self.broadcast(SyncMessage::DistanceUpdate { distance_id: None });
        Ok(())
    }

    async fn patch_distance_status(
        &mut self,
        distance_id: i64,
        status: DistanceStatus,
    ) -> Result<(), GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let patch = DistancePatch {
            title: None,
            shots_count: None,
            status: Some(status),
        };
        let updated = self.gateway.update_distance(&code, distance_id, &patch).await?;
        if let Some(slot) = self.distances.iter_mut().find(|d| d.id == distance_id) {
            *slot = updated;
        }
        Ok(())
    }

    /// Activate a distance, opening scoring for every lane.
    pub async fn start_distance(&mut self, distance_id: i64) -> Result<(), GatewayError> {
        self.patch_distance_status(distance_id, DistanceStatus::Active)
            .await?;
        self.broadcast(SyncMessage::EventStatus {
            status: EventStatus::Started,
            active_distance_id: Some(distance_id),
        });
        Ok(())
    }

    /// Finish the active distance. Lanes mid-entry save and close.
    pub async fn stop_distance(&mut self, distance_id: i64) -> Result<(), GatewayError> {
        self.patch_distance_status(distance_id, DistanceStatus::Finished)
            .await?;
        self.broadcast(SyncMessage::EventStatus {
            status: EventStatus::Started,
            active_distance_id: None,
        });
        Ok(())
    }

    // --- Participants ---

    fn setup_only(&self) -> Result<String, GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let created = self
            .event
            .as_ref()
            .is_some_and(|e| e.status == EventStatus::Created);
        if !created {
            return Err(GatewayError::Validation(
                "the roster is locked once the event starts".to_string(),
            ));
        }
        Ok(code)
    }

    pub async fn add_participant(
        &mut self,
        draft: &ParticipantDraft,
    ) -> Result<Participant, GatewayError> {
        let code = self.setup_only()?;
        let participant = self.gateway.create_participant(&code, draft).await?;
        self.participants.push(participant.clone());
        self.broadcast(SyncMessage::Refresh);
        Ok(participant)
    }

    pub async fn edit_participant(
        &mut self,
        participant_id: i64,
        draft: &ParticipantDraft,
    ) -> Result<Participant, GatewayError> {
        let code = self.setup_only()?;
        let updated = self
            .gateway
            .update_participant(&code, participant_id, draft)
            .await?;
        if let Some(slot) = self.participants.iter_mut().find(|p| p.id == participant_id) {
            *slot = updated.clone();
        }
        self.broadcast(SyncMessage::Refresh);
        Ok(updated)
    }

    pub async fn delete_participant(&mut self, participant_id: i64) -> Result<(), GatewayError> {
        let code = self.setup_only()?;
        self.gateway.delete_participant(&code, participant_id).await?;
        self.participants.retain(|p| p.id != participant_id);
        self.states.remove(&participant_id);
        self.broadcast(SyncMessage::Refresh);
        Ok(())
    }

    // --- Results ---

    pub fn roster(&self) -> BTreeMap<u32, Vec<RosterCard>> {
        roster_by_lane(&self.participants, &self.distances, &self.states)
    }

    pub async fn leaderboard(&self, facets: &Facets) -> Result<Leaderboard, GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let fetched = self.gateway.leaderboard(&code).await?;
        let status = self.event.as_ref().map(|e| e.status).unwrap_or(EventStatus::Created);
        Ok(leaderboard::build(&fetched, status, facets))
    }

    /// Per-series drill-down for one shooter on one distance.
    pub async fn distance_detail(
        &self,
        participant_id: i64,
        distance_id: i64,
    ) -> Result<DistanceDetail, GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        self.gateway
            .distance_detail(&code, participant_id, distance_id)
            .await
    }

    /// Wipe a shooter's scored record entirely.
    pub async fn delete_results(&mut self, participant_id: i64) -> Result<(), GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        self.gateway.delete_results(&code, participant_id).await?;
        self.states.remove(&participant_id);
        self.broadcast(SyncMessage::ResultUpdate {
            participant_id,
            total_score: 0,
        });
        Ok(())
    }

    // --- Lane administration ---

    pub async fn lane_sessions(&self) -> Result<Vec<u32>, GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        Ok(self.gateway.lane_sessions(&code).await?.lanes)
    }

    /// Revoke one lane's session and password. The lane learns about it
    /// through the pushed reset and drops its credentials without another
    /// round-trip.
    pub async fn reset_lane(&mut self, lane: u32) -> Result<(), GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        self.gateway.reset_lane_session(&code, lane).await?;
        self.broadcast(SyncMessage::LaneSessionReset { lane_number: lane });
        Ok(())
    }

    // --- Properties ---

    pub async fn properties(&self) -> Result<EventProperties, GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        self.gateway.properties(&code).await
    }

    pub async fn update_properties(
        &mut self,
        patch: &PropertiesPatch,
    ) -> Result<EventProperties, GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let updated = self.gateway.update_properties(&code, patch).await?;
        if patch.host_password.is_some() {
            self.store.save_host_password(&updated.host_password);
        }
        Ok(updated)
    }

    // --- Push application ---

    pub async fn apply_push(&mut self, message: SyncMessage) -> PushEffect {
        match message {
            SyncMessage::Refresh => {
                if let Err(e) = self.refresh().await {
                    log_warn!("pushed refresh failed: {}", e);
                }
                PushEffect::RosterChanged
            }
            SyncMessage::ResultUpdate { participant_id, .. } => {
                if let Some(code) = self.code.clone() {
                    match self.gateway.participant_state(&code, participant_id).await {
                        Ok(state) => {
                            self.states.insert(participant_id, state);
                        }
                        Err(e) => log_warn!(
                            "state refresh failed for participant {}: {}",
                            participant_id,
                            e
                        ),
                    }
                }
                PushEffect::ResultsChanged
            }
            SyncMessage::DistanceUpdate { .. } | SyncMessage::EventStatus { .. } => {
                if let Some(code) = self.code.clone() {
                    match self.gateway.distances(&code).await {
                        Ok(distances) => self.distances = distances,
                        Err(e) => log_warn!("pushed distance refresh failed: {}", e),
                    }
                }
                PushEffect::DistancesChanged
            }
            SyncMessage::LaneSessionReset { .. } => PushEffect::Ignored,
        }
    }

    /// Leave the host role, forgetting the code, token and stored password.
    pub fn exit(&mut self) {
        if let Some(sync) = self.sync.take() {
            sync.disconnect();
        }
        self.push_rx = None;
        self.store.clear_event_code(Role::Host);
        self.store.clear_session(Role::Host);
        self.store.clear_host_password();
        self.gateway.set_session(None);
        self.code = None;
        self.event = None;
    }
}

fn no_event() -> GatewayError {
    GatewayError::Stale("no event entered".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> HostApp {
        HostApp::with_store(
            Endpoints::new("http://localhost:8000/api", "ws://localhost:8000/ws"),
            SessionStore::in_memory(),
        )
    }

    fn distance(id: i64, status: DistanceStatus) -> Distance {
        Distance {
            id,
            title: "18m".into(),
            shots_count: 30,
            sort_order: id,
            status,
        }
    }

    #[test]
    fn only_pending_distances_may_be_edited() {
        let mut app = app();
        app.distances = vec![
            distance(1, DistanceStatus::Pending),
            distance(2, DistanceStatus::Active),
            distance(3, DistanceStatus::Finished),
        ];
        assert!(app.pending_only(1).is_ok());
        assert!(matches!(app.pending_only(2), Err(GatewayError::Validation(_))));
        assert!(matches!(app.pending_only(3), Err(GatewayError::Validation(_))));
        assert!(app.pending_only(9).unwrap_err().is_not_found());
    }

    #[test]
    fn roster_edits_are_locked_after_start() {
        let mut app = app();
        app.code = Some("ABC123".into());
        app.event = Some(Event {
            code: "ABC123".into(),
            shots_count: 30,
            status: EventStatus::Created,
            created_at: None,
            started_at: None,
            finished_at: None,
        });
        assert!(app.setup_only().is_ok());
        app.event.as_mut().unwrap().status = EventStatus::Started;
        assert!(matches!(app.setup_only(), Err(GatewayError::Validation(_))));
    }

    #[test]
    fn exit_forgets_code_token_and_password() {
        let mut app = app();
        app.code = Some("ABC123".into());
        app.store.save_event_code(Role::Host, "ABC123");
        app.store.save_session(Role::Host, "token");
        app.store.save_host_password("PW1234");
        app.gateway.set_session(Some("token".into()));

        app.exit();
        assert_eq!(app.store.event_code(Role::Host), None);
        assert_eq!(app.store.session(Role::Host), None);
        assert_eq!(app.store.host_password(), None);
        assert_eq!(app.gateway.session(), None);
    }
}
