//! Types supplied by the hosting environment: caller identity, timestamps,
//! payment actions, and the paint notification channel.

use serde::{Deserialize, Serialize};

use crate::canvas::{Address, Amount, Timestamp};

/// The single qualifying fee-token action attached to a call. The host
/// resolves which token the action moves; the ledger checks tag and amount.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenAction {
    Deposit { amount: Amount },
    Withdrawal { amount: Amount },
}

/// Per-call inputs from the host. Timestamps are assigned by the host, the
/// ledger never reads a clock of its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub timestamp: Timestamp,
    pub action: Option<TokenAction>,
}

impl CallContext {
    pub fn new(caller: impl Into<Address>, timestamp: Timestamp) -> Self {
        Self {
            caller: caller.into(),
            timestamp,
            action: None,
        }
    }

    pub fn with_action(mut self, action: TokenAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// Notification emitted once per painted cell. Serializes to the wire
/// schema `{"event":"Paint","x":..,"y":..,"color":"#RRGGBB","fee":..}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CanvasEvent {
    Paint {
        x: u32,
        y: u32,
        color: String,
        fee: Amount,
    },
}

/// One-way, best-effort channel for paint notifications. A sink cannot fail
/// the command that emitted into it.
pub trait EventSink {
    fn emit(&mut self, event: &CanvasEvent);
}

/// Sink for hosts that do not forward paint notifications.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &CanvasEvent) {}
}

/// Sink that keeps every emitted event, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<CanvasEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &CanvasEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paint_event_matches_wire_schema() {
        let event = CanvasEvent::Paint {
            x: 2,
            y: 3,
            color: "#AABBCC".to_string(),
            fee: 5,
        };
        let encoded = serde_json::to_string(&event).unwrap();
        assert_eq!(
            encoded,
            r##"{"event":"Paint","x":2,"y":3,"color":"#AABBCC","fee":5}"##
        );
    }

    #[test]
    fn token_actions_are_tagged() {
        let deposit = serde_json::to_string(&TokenAction::Deposit { amount: 7 }).unwrap();
        assert_eq!(deposit, r#"{"type":"deposit","amount":7}"#);

        let parsed: TokenAction =
            serde_json::from_str(r#"{"type":"withdrawal","amount":12}"#).unwrap();
        assert_eq!(parsed, TokenAction::Withdrawal { amount: 12 });
    }
}
