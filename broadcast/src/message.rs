//! Wire frames pushed to observers

use ballotbox_core::{BallotResult, ChangeEvent, Timestamp};
use serde::{Deserialize, Serialize};

/// A change event stamped with its position in the publish order.
///
/// Serialized flat: `{"sequence": 4, "publishedAt": ..., "event": "voteUpdated", "data": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencedEvent {
    pub sequence: u64,
    pub published_at: Timestamp,
    #[serde(flatten)]
    pub event: ChangeEvent,
}

impl SequencedEvent {
    pub fn new(sequence: u64, event: ChangeEvent) -> Self {
        Self {
            sequence,
            published_at: Timestamp::now(),
            event,
        }
    }

    pub fn to_json(&self) -> BallotResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> BallotResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotbox_core::{BallotOption, OptionDraft, OptionId, VoterId};

    #[test]
    fn test_frame_is_flat() {
        let option = BallotOption::from_draft(OptionDraft::new("Pizza", VoterId::new("a")), 0);
        let frame = SequencedEvent::new(4, ChangeEvent::OptionUpdated(option.clone()));

        let json: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(json["sequence"], 4);
        assert_eq!(json["event"], "voteUpdated");
        assert_eq!(json["data"]["label"], "Pizza");
        assert_eq!(json["data"]["tally"], 0);
    }

    #[test]
    fn test_frame_decodes() {
        let id = OptionId::generate();
        let frame = SequencedEvent::new(9, ChangeEvent::OptionDeleted(id));

        let decoded = SequencedEvent::from_json(&frame.to_json().unwrap()).unwrap();
        assert_eq!(decoded.sequence, 9);
        assert_eq!(decoded.event, ChangeEvent::OptionDeleted(id));
    }
}
