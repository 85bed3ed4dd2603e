//! Typed HTTP gateway to the competition backend.
//!
//! One method per backend operation, all returning
//! `Result<T, GatewayError>`. The session token travels in the
//! `X-Session-Id` header only; it never appears in URLs or request bodies.

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Serialize};

use lanescore_shared::{
    error::extract_detail, CreatedEvent, Distance, DistanceCreate, DistanceDetail, DistancePatch,
    Event, EventCreate, EventPatch, EventProperties, GatewayError, LaneSessions, LeaderboardEntry,
    LoginRequest, Participant, ParticipantDraft, ParticipantState, PropertiesPatch,
    PublicProperties, SessionResponse, ShotInput,
};

use crate::config::Endpoints;

const SESSION_HEADER: &str = "X-Session-Id";

/// Stateless apart from the optional session token attached to every
/// request. Role drivers hold one gateway each and swap the token as they
/// log in and out.
#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    endpoints: Endpoints,
    session: Option<String>,
}

impl Gateway {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints,
            session: None,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn set_session(&mut self, session_id: Option<String>) {
        self.session = session_id;
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, self.endpoints.api_url(path));
        if let Some(session) = &self.session {
            builder = builder.header(SESSION_HEADER, session);
        }
        builder
    }

    async fn handle<T: DeserializeOwned>(
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, GatewayError> {
        let response = response.map_err(|e| GatewayError::Transient(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(GatewayError::from_status(status, extract_detail(&body)));
        }
        // 204-style empty bodies decode as JSON null for `()` returns.
        let body = if body.trim().is_empty() { "null" } else { &body };
        serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        Self::handle(self.request(reqwest::Method::GET, path).send().await).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        Self::handle(
            self.request(reqwest::Method::POST, path)
                .json(body)
                .send()
                .await,
        )
        .await
    }

    async fn patch_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        Self::handle(
            self.request(reqwest::Method::PATCH, path)
                .json(body)
                .send()
                .await,
        )
        .await
    }

    async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        Self::handle(self.request(reqwest::Method::DELETE, path).send().await).await
    }

    // --- Events ---

    pub async fn create_event(&self, create: &EventCreate) -> Result<CreatedEvent, GatewayError> {
        self.post_json("events/create", create).await
    }

    pub async fn event(&self, code: &str) -> Result<Event, GatewayError> {
        self.get_json(&format!("events/{code}")).await
    }

    pub async fn update_event(&self, code: &str, patch: &EventPatch) -> Result<Event, GatewayError> {
        self.patch_json(&format!("events/{code}"), patch).await
    }

    // --- Distances ---

    pub async fn distances(&self, code: &str) -> Result<Vec<Distance>, GatewayError> {
        self.get_json(&format!("distances/{code}")).await
    }

    pub async fn create_distance(
        &self,
        code: &str,
        create: &DistanceCreate,
    ) -> Result<Distance, GatewayError> {
        self.post_json(&format!("distances/{code}"), create).await
    }

    pub async fn update_distance(
        &self,
        code: &str,
        distance_id: i64,
        patch: &DistancePatch,
    ) -> Result<Distance, GatewayError> {
        self.patch_json(&format!("distances/{code}/{distance_id}"), patch)
            .await
    }

    pub async fn delete_distance(&self, code: &str, distance_id: i64) -> Result<(), GatewayError> {
        self.delete_json(&format!("distances/{code}/{distance_id}"))
            .await
    }

    // --- Participants ---

    pub async fn participants(&self, code: &str) -> Result<Vec<Participant>, GatewayError> {
        self.get_json(&format!("participants/{code}")).await
    }

    pub async fn lane_participants(
        &self,
        code: &str,
        lane: u32,
    ) -> Result<Vec<Participant>, GatewayError> {
        self.get_json(&format!("participants/{code}?lane_number={lane}"))
            .await
    }

    pub async fn create_participant(
        &self,
        code: &str,
        draft: &ParticipantDraft,
    ) -> Result<Participant, GatewayError> {
        self.post_json(&format!("participants/{code}"), draft).await
    }

    pub async fn update_participant(
        &self,
        code: &str,
        participant_id: i64,
        draft: &ParticipantDraft,
    ) -> Result<Participant, GatewayError> {
        self.patch_json(&format!("participants/{code}/{participant_id}"), draft)
            .await
    }

    pub async fn delete_participant(
        &self,
        code: &str,
        participant_id: i64,
    ) -> Result<(), GatewayError> {
        self.delete_json(&format!("participants/{code}/{participant_id}"))
            .await
    }

    // --- Results ---

    /// Persist a full working set for one (participant, distance). The
    /// server replaces what it holds for that pair, so retransmitting the
    /// whole batch is idempotent.
    pub async fn save_shots(&self, code: &str, shots: &[ShotInput]) -> Result<(), GatewayError> {
        self.post_json(&format!("results/{code}"), &shots).await
    }

    /// Rows come back pre-grouped by the server's own category key; the
    /// view layer regroups them by (gender, shooting type) regardless.
    pub async fn leaderboard(
        &self,
        code: &str,
    ) -> Result<HashMap<String, Vec<LeaderboardEntry>>, GatewayError> {
        self.get_json(&format!("results/{code}/leaderboard")).await
    }

    pub async fn participant_state(
        &self,
        code: &str,
        participant_id: i64,
    ) -> Result<ParticipantState, GatewayError> {
        self.get_json(&format!("results/{code}/{participant_id}/state"))
            .await
    }

    pub async fn distance_detail(
        &self,
        code: &str,
        participant_id: i64,
        distance_id: i64,
    ) -> Result<DistanceDetail, GatewayError> {
        self.get_json(&format!(
            "results/{code}/{participant_id}/distance/{distance_id}"
        ))
        .await
    }

    pub async fn delete_results(
        &self,
        code: &str,
        participant_id: i64,
    ) -> Result<(), GatewayError> {
        self.delete_json(&format!("results/{code}/{participant_id}"))
            .await
    }

    // --- Sessions ---

    pub async fn host_login(&self, code: &str, login: &LoginRequest) -> Result<SessionResponse, GatewayError> {
        self.post_json(&format!("sessions/{code}/host"), login).await
    }

    pub async fn viewer_login(
        &self,
        code: &str,
        login: &LoginRequest,
    ) -> Result<SessionResponse, GatewayError> {
        self.post_json(&format!("sessions/{code}/viewer"), login).await
    }

    pub async fn lane_login(
        &self,
        code: &str,
        lane: u32,
        login: &LoginRequest,
    ) -> Result<SessionResponse, GatewayError> {
        self.post_json(&format!("sessions/{code}/lane/{lane}"), login)
            .await
    }

    pub async fn lane_sessions(&self, code: &str) -> Result<LaneSessions, GatewayError> {
        self.get_json(&format!("sessions/{code}/lanes")).await
    }

    /// Host-only: revoke a lane's session and password so the next arrival
    /// re-registers from scratch.
    pub async fn reset_lane_session(&self, code: &str, lane: u32) -> Result<(), GatewayError> {
        self.delete_json(&format!("sessions/{code}/lane/{lane}"))
            .await
    }

    // --- Properties ---

    pub async fn properties(&self, code: &str) -> Result<EventProperties, GatewayError> {
        self.get_json(&format!("properties/{code}")).await
    }

    pub async fn update_properties(
        &self,
        code: &str,
        patch: &PropertiesPatch,
    ) -> Result<EventProperties, GatewayError> {
        self.patch_json(&format!("properties/{code}"), patch).await
    }

    pub async fn public_properties(&self, code: &str) -> Result<PublicProperties, GatewayError> {
        self.get_json(&format!("properties/{code}/public")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_is_swappable() {
        let mut gateway = Gateway::new(Endpoints::new("http://localhost:8000/api", "ws://localhost:8000/ws"));
        assert_eq!(gateway.session(), None);
        gateway.set_session(Some("abc".into()));
        assert_eq!(gateway.session(), Some("abc"));
        gateway.set_session(None);
        assert_eq!(gateway.session(), None);
    }

    #[test]
    fn shot_batch_serializes_as_a_plain_array() {
        let shots = vec![ShotInput {
            participant_id: 7,
            distance_id: 2,
            shot_number: 1,
            score: 9,
            is_x: false,
        }];
        let json = serde_json::to_value(&shots).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["shot_number"], 1);
    }
}
