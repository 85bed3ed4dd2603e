//! Read-only viewer driver: polls on a slow timer, with pushed updates
//! (when the channel is up) only pulling the next poll forward.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use futures_channel::mpsc::UnboundedReceiver;

use lanescore_shared::{
    Distance, Event, EventStatus, GatewayError, LoginRequest, Participant, SessionStatus,
    SyncMessage,
};

use crate::config::Endpoints;
use crate::gateway::Gateway;
use crate::session_store::{Role, SessionStore};
use crate::sync::SyncChannel;
use crate::view::{leaderboard, roster_by_lane, Facets, Leaderboard, RosterCard};
use crate::log_warn;

/// Normal refresh cadence.
const POLL_INTERVAL_SECS: i64 = 120;
/// Shortened cadence after a failed refresh.
const RETRY_SECS: i64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEntry {
    Ready,
    PasswordRequired,
}

/// What the viewer shows: the lane roster during setup, standings after.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerScreen {
    Roster(BTreeMap<u32, Vec<RosterCard>>),
    Leaderboard(Leaderboard),
}

pub struct ViewerApp {
    gateway: Gateway,
    store: SessionStore,
    sync: Option<SyncChannel>,
    push_rx: Option<UnboundedReceiver<SyncMessage>>,
    code: Option<String>,
    event: Option<Event>,
    facets: Facets,
    next_poll_at: Option<DateTime<Utc>>,
    dirty: bool,
}

impl ViewerApp {
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
            facets: Facets::default(),
            next_poll_at: None,
            dirty: false,
        }
    }

    pub fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }

    pub fn set_facets(&mut self, facets: Facets) {
        self.facets = facets;
        // Re-render with the new filters on the next tick.
        self.dirty = true;
    }

    // --- Entry and login ---

    /// Validate the code and log in, reusing a cached token when possible.
    pub async fn enter(&mut self, code: &str) -> Result<ViewerEntry, GatewayError> {
        super::check_code(code)?;
        let event = self.gateway.event(code).await?;
        self.code = Some(code.to_string());
        self.event = Some(event);
        let login = LoginRequest {
            password: None,
            session_id: self.store.session(Role::Viewer),
        };
        let response = self.gateway.viewer_login(code, &login).await?;
        Ok(self.adopt_session(code, response.status, response.session_id))
    }

    pub async fn submit_password(&mut self, password: &str) -> Result<ViewerEntry, GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let login = LoginRequest {
            password: Some(password.to_string()),
            session_id: None,
        };
        let response = self.gateway.viewer_login(&code, &login).await?;
        Ok(self.adopt_session(&code, response.status, response.session_id))
    }

    fn adopt_session(
        &mut self,
        code: &str,
        status: SessionStatus,
        session_id: Option<String>,
    ) -> ViewerEntry {
        match status {
            SessionStatus::PasswordRequired => {
                self.store.clear_session(Role::Viewer);
                ViewerEntry::PasswordRequired
            }
            // Viewers never mint anything; Created is treated as Ok.
            SessionStatus::Ok | SessionStatus::Created => {
                self.store.save_event_code(Role::Viewer, code);
                if let Some(session) = session_id {
                    self.store.save_session(Role::Viewer, &session);
                    self.gateway.set_session(Some(session));
                }
                // First tick refreshes immediately.
                self.dirty = true;
                ViewerEntry::Ready
            }
        }
    }

    /// Resume from the stored code + token; fall back to manual entry.
    pub async fn restore(&mut self) -> Option<ViewerEntry> {
        let code = self.store.event_code(Role::Viewer)?;
        match self.enter(&code).await {
            Ok(ViewerEntry::Ready) => Some(ViewerEntry::Ready),
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

    // --- Polling ---

    pub fn poll_due(&self, now: DateTime<Utc>) -> bool {
        self.dirty || self.next_poll_at.is_none_or(|at| now >= at)
    }

    fn schedule(&mut self, now: DateTime<Utc>, succeeded: bool) {
        let secs = if succeeded { POLL_INTERVAL_SECS } else { RETRY_SECS };
        self.next_poll_at = Some(now + TimeDelta::seconds(secs));
        self.dirty = false;
    }

    /// Drive the viewer. Call on a coarse timer; refreshes only when due
    /// or when a pushed update marked the view dirty. A failed refresh is
    /// logged and retried sooner, never surfaced.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Option<ViewerScreen> {
        // Any pushed message just pulls the next refresh forward.
        while let Some(_message) = super::try_pop(&mut self.push_rx) {
            self.dirty = true;
        }
        if !self.poll_due(now) {
            return None;
        }
        match self.refresh().await {
            Ok(screen) => {
                self.schedule(now, true);
                Some(screen)
            }
            Err(e) => {
                log_warn!("viewer refresh failed: {}", e);
                self.schedule(now, false);
                None
            }
        }
    }

    async fn refresh(&mut self) -> Result<ViewerScreen, GatewayError> {
        let code = self.code.clone().ok_or_else(no_event)?;
        let event = self.gateway.event(&code).await?;
        let status = event.status;
        self.event = Some(event);
        if status == EventStatus::Created {
            let participants: Vec<Participant> = self.gateway.participants(&code).await?;
            let distances: Vec<Distance> = self.gateway.distances(&code).await?;
            Ok(ViewerScreen::Roster(roster_by_lane(
                &participants,
                &distances,
                &Default::default(),
            )))
        } else {
            let fetched = self.gateway.leaderboard(&code).await?;
            Ok(ViewerScreen::Leaderboard(leaderboard::build(
                &fetched,
                status,
                &self.facets,
            )))
        }
    }

    pub fn exit(&mut self) {
        if let Some(sync) = self.sync.take() {
            sync.disconnect();
        }
        self.push_rx = None;
        self.store.clear_event_code(Role::Viewer);
        self.store.clear_session(Role::Viewer);
        self.gateway.set_session(None);
        self.code = None;
        self.event = None;
        self.next_poll_at = None;
    }
}

fn no_event() -> GatewayError {
    GatewayError::Stale("no event entered".to_string())
}
