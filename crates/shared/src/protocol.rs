//! Push-channel message types.
//!
//! One logical subscription exists per event code; every frame is a JSON
//! object tagged with `type`. Messages are hints to re-fetch, not state
//! transfers; the single exception is `lane_session_reset`, whose lane
//! number is trusted directly.

use serde::{Deserialize, Serialize};

use crate::models::EventStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncMessage {
    /// Event status changed, or a distance was activated/stopped.
    EventStatus {
        status: EventStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        active_distance_id: Option<i64>,
    },
    /// A distance's title, shot target or status changed.
    DistanceUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distance_id: Option<i64>,
    },
    /// The participant roster changed; a full re-fetch is recommended.
    Refresh,
    /// A participant's scored total changed; re-fetch just that participant.
    ResultUpdate {
        participant_id: i64,
        total_score: i64,
    },
    /// The host invalidated one lane's session. The named lane must drop its
    /// credentials and return to lane selection without any further
    /// authenticated call.
    LaneSessionReset { lane_number: u32 },
}

/// Dispatch key for handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    EventStatus,
    DistanceUpdate,
    Refresh,
    ResultUpdate,
    LaneSessionReset,
}

impl MessageKind {
    /// Every kind, for catch-all handler registration.
    pub const ALL: [MessageKind; 5] = [
        MessageKind::EventStatus,
        MessageKind::DistanceUpdate,
        MessageKind::Refresh,
        MessageKind::ResultUpdate,
        MessageKind::LaneSessionReset,
    ];
}

impl SyncMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            SyncMessage::EventStatus { .. } => MessageKind::EventStatus,
            SyncMessage::DistanceUpdate { .. } => MessageKind::DistanceUpdate,
            SyncMessage::Refresh => MessageKind::Refresh,
            SyncMessage::ResultUpdate { .. } => MessageKind::ResultUpdate,
            SyncMessage::LaneSessionReset { .. } => MessageKind::LaneSessionReset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_round_trip_with_snake_case_tags() {
        let json = r#"{"type":"lane_session_reset","lane_number":3}"#;
        let msg: SyncMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, SyncMessage::LaneSessionReset { lane_number: 3 });
        assert_eq!(serde_json::to_string(&msg).unwrap(), json);
    }

    #[test]
    fn event_status_payload_is_optional() {
        let msg: SyncMessage =
            serde_json::from_str(r#"{"type":"event_status","status":"started"}"#).unwrap();
        assert_eq!(
            msg,
            SyncMessage::EventStatus {
                status: EventStatus::Started,
                active_distance_id: None
            }
        );
    }

    #[test]
    fn unknown_message_types_fail_to_parse() {
        // The channel drops frames it cannot parse, which is how unknown
        // types end up ignored.
        assert!(serde_json::from_str::<SyncMessage>(r#"{"type":"celebrate"}"#).is_err());
    }
}
