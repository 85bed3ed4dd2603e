//! Lane scoring driver: lane login, roster, and the shot entry session.

use std::collections::HashMap;

use futures_channel::mpsc::UnboundedReceiver;
use thiserror::Error;

use lanescore_shared::{
    active_distance, Distance, Event, EventStatus, GatewayError, LoginRequest, Participant,
    ParticipantDraft, ParticipantState, PublicProperties, SessionStatus, SyncMessage, LANE_COUNT,
};

use crate::config::Endpoints;
use crate::gateway::Gateway;
use crate::session_store::{Role, SessionStore};
use crate::shot_entry::{open_target, EntryRefusal, InputOutcome, SelectOutcome, ShotEntry};
use crate::sync::SyncChannel;
use crate::view::{can_add_participants, lane_roster, RosterCard};
use crate::{log_error, log_info, log_warn};

/// Outcome of a lane login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneEntry {
    /// First registration of this lane. The minted password is held in
    /// memory for a single showing; call
    /// [`LaneApp::proceed_after_password`] once the operator has seen it.
    Created,
    Ready,
    PasswordRequired,
}

#[derive(Debug, Clone, Error)]
pub enum EntryError {
    #[error("scoring closed: {0:?}")]
    Refused(EntryRefusal),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Result of closing the entry screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// A full-size series is partially filled; ask before leaving, then
    /// call again with `force`.
    ConfirmIncomplete {
        series: u32,
        filled: u32,
        intended: u32,
    },
    Done,
}

/// What applying one push message did to this app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEffect {
    /// The active distance was stopped under an open entry screen; the
    /// working set was flushed and the screen must close.
    ForcedStop,
    /// This lane's session was revoked; credentials are gone and the UI
    /// must return to lane selection.
    SessionReset,
    RosterChanged,
    DistancesChanged,
    Ignored,
}

pub struct LaneApp {
    gateway: Gateway,
    store: SessionStore,
    sync: Option<SyncChannel>,
    push_rx: Option<UnboundedReceiver<SyncMessage>>,
    code: Option<String>,
    lane: Option<u32>,
    /// Lane awaiting its password after a `PasswordRequired` login outcome.
    pending_lane: Option<u32>,
    event: Option<Event>,
    distances: Vec<Distance>,
    participants: Vec<Participant>,
    states: HashMap<i64, ParticipantState>,
    properties: PublicProperties,
    entry: Option<ShotEntry>,
    minted_password: Option<String>,
}

impl LaneApp {
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
            lane: None,
            pending_lane: None,
            event: None,
            distances: Vec::new(),
            participants: Vec::new(),
            states: HashMap::new(),
            properties: PublicProperties {
                client_allow_add_participant: true,
            },
            entry: None,
            minted_password: None,
        }
    }

    pub fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }

    pub fn lane(&self) -> Option<u32> {
        self.lane
    }

    pub fn distances(&self) -> &[Distance] {
        &self.distances
    }

    // --- Entry and login ---

    /// Validate the event code and adopt it. Clears any cached participant
    /// snapshots so nothing from a previous event bleeds through.
    pub async fn enter(&mut self, code: &str) -> Result<Event, GatewayError> {
        super::check_code(code)?;
        let event = self.gateway.event(code).await?;
        self.store.save_event_code(Role::Client, code);
        self.store.clear_all_participant_states();
        self.code = Some(code.to_string());
        self.event = Some(event.clone());
        Ok(event)
    }

    /// Log into a lane, reusing a stored session token when one exists. A
    /// rejected token comes back as `PasswordRequired` rather than an
    /// error, so restoration never loops.
    pub async fn select_lane(&mut self, lane: u32) -> Result<LaneEntry, GatewayError> {
        if !(1..=LANE_COUNT).contains(&lane) {
            return Err(GatewayError::Validation(format!(
                "lane must be between 1 and {LANE_COUNT}"
            )));
        }
        let code = self.code.clone().ok_or_else(no_event)?;
        let login = LoginRequest {
            password: None,
            session_id: self.store.lane_session(lane),
        };
        let response = self.gateway.lane_login(&code, lane, &login).await?;
        Ok(self.adopt_lane_session(lane, response.status, response.session_id, response.password))
    }

    pub async fn submit_password(&mut self, password: &str) -> Result<LaneEntry, GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        // The lane that just answered PasswordRequired takes precedence over
        // anything stored by an earlier visit.
        let lane = self
            .pending_lane
            .or(self.lane)
            .or_else(|| self.store.lane())
            .ok_or_else(no_event)?;
        let login = LoginRequest {
            password: Some(password.to_string()),
            session_id: None,
        };
        let response = self.gateway.lane_login(&code, lane, &login).await?;
        Ok(self.adopt_lane_session(lane, response.status, response.session_id, response.password))
    }

    fn adopt_lane_session(
        &mut self,
        lane: u32,
        status: SessionStatus,
        session_id: Option<String>,
        password: Option<String>,
    ) -> LaneEntry {
        match status {
            SessionStatus::PasswordRequired => {
                // The cached token (if any) is dead; drop it, but remember
                // which lane the password prompt is for.
                self.store.clear_lane_session(lane);
                self.pending_lane = Some(lane);
                LaneEntry::PasswordRequired
            }
            SessionStatus::Created | SessionStatus::Ok => {
                if let Some(session) = session_id {
                    self.store.save_lane_session(lane, &session);
                    self.gateway.set_session(Some(session));
                }
                self.store.save_lane(lane);
                self.lane = Some(lane);
                self.pending_lane = None;
                if status == SessionStatus::Created {
                    self.minted_password = password;
                    LaneEntry::Created
                } else {
                    LaneEntry::Ready
                }
            }
        }
    }

    /// The freshly minted lane password, available until acknowledged.
    pub fn minted_password(&self) -> Option<&str> {
        self.minted_password.as_deref()
    }

    /// The operator has seen the minted password; drop the cleartext.
    pub fn proceed_after_password(&mut self) {
        self.minted_password = None;
    }

    /// Resume from stored code + lane + token. Any failure falls back to
    /// manual entry without clearing what might still be valid.
    pub async fn restore(&mut self) -> Option<LaneEntry> {
        let code = self.store.event_code(Role::Client)?;
        let lane = self.store.lane()?;
        self.enter(&code).await.ok()?;
        match self.select_lane(lane).await {
            Ok(entry @ (LaneEntry::Ready | LaneEntry::PasswordRequired)) => Some(entry),
            // A restored lane can never be freshly created.
            Ok(LaneEntry::Created) | Err(_) => None,
        }
    }

    // --- Sync channel ---

    /// Open the push subscription for the current event.
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

    // --- Roster ---

    /// Re-fetch everything the lane screen shows. Individual participant
    /// state fetches may fail without failing the refresh; the cached
    /// snapshot stands in.
    pub async fn refresh_roster(&mut self) -> Result<(), GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let lane = self.lane.ok_or_else(no_event)?;
        self.event = Some(self.gateway.event(&code).await?);
        self.distances = self.gateway.distances(&code).await?;
        self.participants = self.gateway.lane_participants(&code, lane).await?;
        match self.gateway.public_properties(&code).await {
            Ok(properties) => self.properties = properties,
            Err(e) => log_warn!("public properties refresh failed: {}", e),
        }
        let ids: Vec<i64> = self.participants.iter().map(|p| p.id).collect();
        for id in ids {
            self.refresh_participant_state(&code, id).await;
        }
        Ok(())
    }

    async fn refresh_participant_state(&mut self, code: &str, participant_id: i64) {
        match self.gateway.participant_state(code, participant_id).await {
            Ok(state) => {
                self.store.save_participant_state(participant_id, &state);
                self.states.insert(participant_id, state);
            }
            Err(e) => {
                log_warn!("state refresh failed for participant {}: {}", participant_id, e);
                if let Some(cached) = self.store.participant_state(participant_id) {
                    self.states.entry(participant_id).or_insert(cached);
                }
            }
        }
    }

    pub fn roster(&self) -> Vec<RosterCard> {
        lane_roster(&self.participants, &self.distances, &self.states)
    }

    pub fn can_add_participants(&self) -> bool {
        self.event
            .as_ref()
            .is_some_and(|e| can_add_participants(e.status, &self.properties))
    }

    pub async fn add_participant(
        &mut self,
        draft: &ParticipantDraft,
    ) -> Result<Participant, GatewayError> {
        if !self.can_add_participants() {
            return Err(GatewayError::Validation(
                "registration is closed for this event".to_string(),
            ));
        }
        let code = self.code.clone().ok_or_else(no_event)?;
        let participant = self.gateway.create_participant(&code, draft).await?;
        self.participants.push(participant.clone());
        if let Some(sync) = &self.sync {
            sync.send(&SyncMessage::Refresh);
        }
        Ok(participant)
    }

    // --- Shot entry ---

    /// Open the scoring screen for one shooter against the active distance.
    pub async fn open_entry(&mut self, participant_id: i64) -> Result<(), EntryError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let event = self.event.as_ref().ok_or_else(no_event)?;
        let distance = open_target(event.status, &self.distances)
            .map_err(EntryError::Refused)?
            .clone();
        // Prefer fresh state; fall back to the cached snapshot when the
        // fetch fails so scoring can continue offline-ish.
        let state = match self.gateway.participant_state(&code, participant_id).await {
            Ok(state) => {
                self.store.save_participant_state(participant_id, &state);
                Some(state)
            }
            Err(e) => {
                log_warn!("state fetch failed for participant {}: {}", participant_id, e);
                self.store.participant_state(participant_id)
            }
        };
        self.entry = Some(ShotEntry::new(participant_id, &distance, state.as_ref()));
        Ok(())
    }

    pub fn entry(&self) -> Option<&ShotEntry> {
        self.entry.as_ref()
    }

    pub fn select_shot(&mut self, shot: u32) -> Option<SelectOutcome> {
        self.entry.as_mut().map(|entry| entry.select(shot))
    }

    /// Clear one shot and immediately re-persist the shortened batch.
    pub async fn clear_shot(&mut self, shot: u32) {
        if let Some(entry) = self.entry.as_mut() {
            entry.clear(shot);
            self.auto_save().await;
        }
    }

    /// Record a keypress. Completing a series triggers an auto-save whose
    /// failure is logged, never surfaced.
    pub async fn input_score(&mut self, score: u32, is_x: bool) -> Option<InputOutcome> {
        let outcome = self.entry.as_mut()?.input(score, is_x);
        if matches!(
            outcome,
            InputOutcome::Accepted {
                series_complete: Some(_),
                ..
            }
        ) {
            self.auto_save().await;
        }
        Some(outcome)
    }

    /// Remove the most recent shot and re-persist right away.
    pub async fn delete_last(&mut self) -> Option<u32> {
        let removed = self.entry.as_mut()?.delete_last()?;
        self.auto_save().await;
        Some(removed)
    }

    async fn auto_save(&mut self) {
        let (Some(code), Some(entry)) = (self.code.clone(), self.entry.as_ref()) else {
            return;
        };
        let participant_id = entry.participant_id();
        let total = entry.total_score();
        match self.gateway.save_shots(&code, &entry.batch()).await {
            Ok(()) => {
                if let Some(sync) = &self.sync {
                    sync.send(&SyncMessage::ResultUpdate {
                        participant_id,
                        total_score: total,
                    });
                }
                self.refresh_participant_state(&code, participant_id).await;
            }
            Err(e) => log_error!("auto-save failed for participant {}: {}", participant_id, e),
        }
    }

    /// Leave the entry screen, persisting the working set. An incomplete
    /// full-size series asks for confirmation first; save failures on the
    /// explicit path are surfaced and keep the screen open.
    pub async fn exit_entry(&mut self, force: bool) -> Result<ExitOutcome, GatewayError> {
        let Some(entry) = self.entry.as_ref() else {
            return Ok(ExitOutcome::Done);
        };
        if !force {
            if let Some((series, filled, intended)) = entry.incomplete_series() {
                return Ok(ExitOutcome::ConfirmIncomplete {
                    series,
                    filled,
                    intended,
                });
            }
        }
        let code = self.code.clone().ok_or_else(no_event)?;
        let participant_id = entry.participant_id();
        let total = entry.total_score();
        self.gateway.save_shots(&code, &entry.batch()).await?;
        if let Some(sync) = &self.sync {
            sync.send(&SyncMessage::ResultUpdate {
                participant_id,
                total_score: total,
            });
        }
        self.entry = None;
        self.refresh_participant_state(&code, participant_id).await;
        Ok(ExitOutcome::Done)
    }

    // --- Push application ---

    /// Whether a pushed event-status change must terminate an open entry
    /// session: scoring only survives while the event is running and the
    /// entry's own distance is still the active one.
    fn stop_required(entry: &ShotEntry, status: EventStatus, active_distance_id: Option<i64>) -> bool {
        status != EventStatus::Started || active_distance_id != Some(entry.distance_id())
    }

    /// Active distance after a pushed status change. Push payloads are
    /// hints; the re-fetched list is authoritative when the re-fetch
    /// succeeded, and the hint only stands in when it failed.
    fn pushed_active(refetched: bool, distances: &[Distance], hint: Option<i64>) -> Option<i64> {
        if refetched {
            active_distance(distances).map(|d| d.id)
        } else {
            hint
        }
    }

    /// Revoke local credentials for this lane. No further authenticated
    /// call is made; unsent edits are abandoned.
    fn handle_session_reset(&mut self, lane_number: u32) -> bool {
        if self.lane != Some(lane_number) {
            return false;
        }
        log_info!("lane {} session was reset by the host", lane_number);
        self.entry = None;
        self.store.clear_lane_session(lane_number);
        self.store.clear_lane();
        self.gateway.set_session(None);
        self.lane = None;
        if let Some(sync) = self.sync.take() {
            sync.disconnect();
        }
        self.push_rx = None;
        true
    }

    pub async fn apply_push(&mut self, message: SyncMessage) -> PushEffect {
        match message {
            SyncMessage::LaneSessionReset { lane_number } => {
                if self.handle_session_reset(lane_number) {
                    PushEffect::SessionReset
                } else {
                    PushEffect::Ignored
                }
            }
            SyncMessage::Refresh => {
                if let Err(e) = self.refresh_roster().await {
                    log_warn!("pushed roster refresh failed: {}", e);
                }
                PushEffect::RosterChanged
            }
            SyncMessage::ResultUpdate { participant_id, .. } => {
                // Our own echoes come back too; refreshing is harmless.
                if let Some(code) = self.code.clone() {
                    self.refresh_participant_state(&code, participant_id).await;
                }
                PushEffect::RosterChanged
            }
            SyncMessage::DistanceUpdate { .. } => {
                if let Some(code) = self.code.clone() {
                    match self.gateway.distances(&code).await {
                        Ok(distances) => self.distances = distances,
                        Err(e) => log_warn!("pushed distance refresh failed: {}", e),
                    }
                }
                let status = self.event.as_ref().map(|e| e.status);
                let active = active_distance(&self.distances).map(|d| d.id);
                let stop = match (self.entry.as_ref(), status) {
                    (Some(entry), Some(status)) => Self::stop_required(entry, status, active),
                    _ => false,
                };
                if stop {
                    self.force_stop().await;
                    PushEffect::ForcedStop
                } else {
                    PushEffect::DistancesChanged
                }
            }
            SyncMessage::EventStatus {
                status,
                active_distance_id,
            } => {
                if let Some(event) = self.event.as_mut() {
                    event.status = status;
                }
                let mut refetched = false;
                if let Some(code) = self.code.clone() {
                    match self.gateway.distances(&code).await {
                        Ok(distances) => {
                            self.distances = distances;
                            refetched = true;
                        }
                        Err(e) => log_warn!("pushed distance refresh failed: {}", e),
                    }
                }
                let active = Self::pushed_active(refetched, &self.distances, active_distance_id);
                let stop = self
                    .entry
                    .as_ref()
                    .is_some_and(|entry| Self::stop_required(entry, status, active));
                if stop {
                    self.force_stop().await;
                    PushEffect::ForcedStop
                } else {
                    PushEffect::DistancesChanged
                }
            }
        }
    }

    /// Flush and close the entry screen without asking. Used when a push
    /// message pulls the distance out from under an open session.
    async fn force_stop(&mut self) {
        self.auto_save().await;
        self.entry = None;
    }

    /// Leave the role entirely. The lane session token stays stored so the
    /// lane can resume later without its password.
    pub fn exit(&mut self) {
        if let Some(sync) = self.sync.take() {
            sync.disconnect();
        }
        self.push_rx = None;
        self.entry = None;
        self.store.clear_event_code(Role::Client);
        self.store.clear_lane();
        self.gateway.set_session(None);
        self.code = None;
        self.lane = None;
        self.pending_lane = None;
    }
}

fn no_event() -> GatewayError {
    GatewayError::Stale("no event entered".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanescore_shared::DistanceStatus;

    fn app() -> LaneApp {
        LaneApp::with_store(
            Endpoints::new("http://localhost:8000/api", "ws://localhost:8000/ws"),
            SessionStore::in_memory(),
        )
    }

    fn distance(id: i64, status: DistanceStatus) -> Distance {
        Distance {
            id,
            title: "18m".into(),
            shots_count: 6,
            sort_order: 1,
            status,
        }
    }

    fn entry_for(distance_id: i64) -> ShotEntry {
        ShotEntry::new(7, &distance(distance_id, DistanceStatus::Active), None)
    }

    #[test]
    fn stop_required_when_the_entry_distance_is_no_longer_active() {
        let entry = entry_for(2);
        assert!(!LaneApp::stop_required(&entry, EventStatus::Started, Some(2)));
        assert!(LaneApp::stop_required(&entry, EventStatus::Started, Some(3)));
        assert!(LaneApp::stop_required(&entry, EventStatus::Started, None));
        assert!(LaneApp::stop_required(&entry, EventStatus::Finished, Some(2)));
    }

    #[test]
    fn session_reset_clears_credentials_and_bars_further_calls() {
        let mut app = app();
        app.lane = Some(3);
        app.store.save_lane(3);
        app.store.save_lane_session(3, "token");
        app.gateway.set_session(Some("token".into()));
        app.entry = Some(entry_for(2));

        assert!(app.handle_session_reset(3));
        assert_eq!(app.lane, None);
        assert_eq!(app.store.lane(), None);
        assert_eq!(app.store.lane_session(3), None);
        assert_eq!(app.gateway.session(), None);
        assert!(app.entry.is_none());
    }

    #[test]
    fn session_reset_for_another_lane_is_ignored() {
        let mut app = app();
        app.lane = Some(3);
        app.store.save_lane_session(3, "token");
        assert!(!app.handle_session_reset(4));
        assert_eq!(app.lane, Some(3));
        assert_eq!(app.store.lane_session(3).as_deref(), Some("token"));
    }

    #[test]
    fn adopting_sessions_follows_the_trichotomy() {
        let mut app = app();
        let entry = app.adopt_lane_session(
            5,
            SessionStatus::Created,
            Some("fresh".into()),
            Some("PW1234".into()),
        );
        assert_eq!(entry, LaneEntry::Created);
        assert_eq!(app.minted_password(), Some("PW1234"));
        assert_eq!(app.store.lane_session(5).as_deref(), Some("fresh"));
        assert_eq!(app.store.lane(), Some(5));
        app.proceed_after_password();
        assert_eq!(app.minted_password(), None);

        let entry = app.adopt_lane_session(5, SessionStatus::Ok, Some("fresh2".into()), None);
        assert_eq!(entry, LaneEntry::Ready);
        assert_eq!(app.pending_lane, None);

        let entry = app.adopt_lane_session(5, SessionStatus::PasswordRequired, None, None);
        assert_eq!(entry, LaneEntry::PasswordRequired);
        // The stale token was discarded, the prompted lane remembered.
        assert_eq!(app.store.lane_session(5), None);
        assert_eq!(app.pending_lane, Some(5));
    }

    #[tokio::test]
    async fn password_retry_targets_the_lane_that_prompted_for_it() {
        let mut app = LaneApp::with_store(
            // Nothing listens on this port; any request fails as Transient.
            Endpoints::new("http://127.0.0.1:1/api", "ws://127.0.0.1:1/ws"),
            SessionStore::in_memory(),
        );
        app.code = Some("ABC123".into());
        // A stale lane from an earlier visit must not win over the prompt.
        app.store.save_lane(3);
        let entry = app.adopt_lane_session(5, SessionStatus::PasswordRequired, None, None);
        assert_eq!(entry, LaneEntry::PasswordRequired);
        assert_eq!(app.pending_lane, Some(5));

        // The retry reaches the gateway instead of dying on missing state.
        let err = app.submit_password("PW1234").await.unwrap_err();
        assert!(matches!(err, GatewayError::Transient(_)), "got {err:?}");
    }

    #[test]
    fn pushed_status_trusts_the_fetched_list_over_the_hint() {
        let distances = vec![
            distance(2, DistanceStatus::Active),
            distance(3, DistanceStatus::Pending),
        ];
        assert_eq!(LaneApp::pushed_active(true, &distances, Some(3)), Some(2));
        assert_eq!(LaneApp::pushed_active(true, &[], Some(3)), None);
        // Only a failed re-fetch falls back to the payload hint.
        assert_eq!(LaneApp::pushed_active(false, &distances, Some(3)), Some(3));
    }

    /// Minimal one-request-per-connection HTTP backend that records every
    /// request it serves.
    async fn stub_backend(requests: std::sync::Arc<std::sync::Mutex<Vec<String>>>) -> u16 {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let requests = requests.clone();
                tokio::spawn(async move {
                    let mut raw = Vec::new();
                    let mut buf = [0u8; 4096];
                    loop {
                        let Ok(n) = socket.read(&mut buf).await else {
                            return;
                        };
                        if n == 0 {
                            break;
                        }
                        raw.extend_from_slice(&buf[..n]);
                        let text = String::from_utf8_lossy(&raw);
                        if let Some(head_end) = text.find("\r\n\r\n") {
                            let body_len = text[..head_end]
                                .lines()
                                .find_map(|line| {
                                    line.to_ascii_lowercase()
                                        .strip_prefix("content-length:")
                                        .and_then(|v| v.trim().parse::<usize>().ok())
                                })
                                .unwrap_or(0);
                            if raw.len() >= head_end + 4 + body_len {
                                break;
                            }
                        }
                    }
                    let request = String::from_utf8_lossy(&raw).to_string();
                    let body = if request.starts_with("GET /api/distances/") {
                        "[]"
                    } else if request.contains("/state") {
                        r#"{"distances":[]}"#
                    } else {
                        "null"
                    };
                    requests.lock().unwrap().push(request);
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        port
    }

    #[tokio::test]
    async fn a_stop_push_flushes_the_working_set_before_closing_entry() {
        let requests = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let port = stub_backend(requests.clone()).await;
        let mut app = LaneApp::with_store(
            Endpoints::new(format!("http://127.0.0.1:{port}/api"), "ws://127.0.0.1:1/ws"),
            SessionStore::in_memory(),
        );
        app.code = Some("ABC123".into());
        app.lane = Some(3);
        app.event = Some(Event {
            code: "ABC123".into(),
            shots_count: 6,
            status: EventStatus::Started,
            created_at: None,
            started_at: None,
            finished_at: None,
        });
        let mut entry = entry_for(2);
        entry.input(9, false);
        entry.input(10, true);
        app.entry = Some(entry);

        // The backend reports no active distance any more.
        let effect = app
            .apply_push(SyncMessage::EventStatus {
                status: EventStatus::Started,
                active_distance_id: None,
            })
            .await;
        assert_eq!(effect, PushEffect::ForcedStop);
        assert!(app.entry.is_none());

        let requests = requests.lock().unwrap();
        let save = requests
            .iter()
            .find(|r| r.starts_with("POST") && r.contains("/api/results/ABC123"))
            .expect("the working set was never persisted");
        assert!(save.contains("\"shot_number\":1"));
        assert!(save.contains("\"shot_number\":2"));
        assert!(save.contains("\"is_x\":true"));
    }

    #[test]
    fn adding_participants_is_refused_once_started() {
        let mut app = app();
        app.event = Some(Event {
            code: "ABC123".into(),
            shots_count: 30,
            status: EventStatus::Started,
            created_at: None,
            started_at: None,
            finished_at: None,
        });
        assert!(!app.can_add_participants());
        app.event.as_mut().unwrap().status = EventStatus::Created;
        assert!(app.can_add_participants());
        app.properties.client_allow_add_participant = false;
        assert!(!app.can_add_participants());
    }
}
