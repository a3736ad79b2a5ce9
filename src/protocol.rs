//! Wire payloads exchanged with the external collaborators.
//!
//! Everything here crosses the message transport as JSON with camelCase
//! field names. Native events arrive internally tagged on `kind`, matching
//! what the event source emits.

use crate::tree::TabRecord;
use crate::types::{OrderKey, RequestId, TabId, WindowId};
use serde::{Deserialize, Serialize};

/// One mover's announced destination within a move intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentMove {
    pub id: TabId,
    pub parent_id: Option<TabId>,
    pub order_key: OrderKey,
}

/// Tree delta announced before any flat move of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveIntent {
    pub request_id: RequestId,
    pub moves: Vec<IntentMove>,
}

/// Structural acknowledgement of a move intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentAck {
    pub request_id: RequestId,
}

/// Opens the managed window for the listed ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartManagedMove {
    pub ids: Vec<TabId>,
}

/// Closes the managed window once all flat moves completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndManagedMove {}

/// Pre-declares the parent and key of a tab about to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChildIntent {
    pub container_id: WindowId,
    pub expected_flat_index: usize,
    pub parent_id: TabId,
    pub order_key: OrderKey,
}

/// Event the external system emits when the strip changes under us
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NativeEvent {
    Created {
        node: TabRecord,
    },
    Removed {
        id: TabId,
        container_id: WindowId,
    },
    Moved {
        id: TabId,
        from_index: usize,
        to_index: usize,
        container_id: WindowId,
    },
    Detached {
        id: TabId,
        old_container_id: WindowId,
        old_index: usize,
    },
    Attached {
        id: TabId,
        new_container_id: WindowId,
        new_index: usize,
    },
    ContainerRemoved {
        container_id: WindowId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_intent_wire_shape() {
        let intent = MoveIntent {
            request_id: 7,
            moves: vec![IntentMove {
                id: 3,
                parent_id: Some(1),
                order_key: "a0V".to_string(),
            }],
        };
        let value = serde_json::to_value(&intent).unwrap();
        assert_eq!(value["requestId"], 7);
        assert_eq!(value["moves"][0]["parentId"], 1);
        assert_eq!(value["moves"][0]["orderKey"], "a0V");
    }

    #[test]
    fn test_native_event_tagged_on_kind() {
        let event = NativeEvent::Moved {
            id: 4,
            from_index: 2,
            to_index: 0,
            container_id: 1,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "moved");
        assert_eq!(value["fromIndex"], 2);
        assert_eq!(value["toIndex"], 0);
        assert_eq!(value["containerId"], 1);

        let raw = r#"{"kind":"containerRemoved","containerId":9}"#;
        let parsed: NativeEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed, NativeEvent::ContainerRemoved { container_id: 9 });
    }

    #[test]
    fn test_pending_child_intent_round_trip() {
        let intent = PendingChildIntent {
            container_id: 2,
            expected_flat_index: 5,
            parent_id: 11,
            order_key: "a1".to_string(),
        };
        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains("expectedFlatIndex"));
        let back: PendingChildIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, intent);
    }
}
