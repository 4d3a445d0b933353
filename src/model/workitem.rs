//! Workitem types.
//!
//! A workitem is owned by the queue service: it arrives on pop, is mutated
//! in place while processing, and goes back with the update call. Fields the
//! agent doesn't interpret are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fallback `errorsource` when a failure carries no origin information.
pub const UNKNOWN_SOURCE: &str = "Unknown source";

// ---------------------------------------------------------------------------
// Workitem
// ---------------------------------------------------------------------------

/// A unit of work popped from a work-item queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workitem {
    /// Opaque identifier assigned by the queue service.
    #[serde(default)]
    pub id: String,

    /// Number of prior attempts.
    #[serde(default)]
    pub retries: u32,

    /// Open payload. Processors write into it.
    #[serde(default = "empty_payload")]
    pub payload: Value,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Queue the item was popped from, when the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiq: Option<String>,

    #[serde(default)]
    pub state: State,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errortype: Option<ErrorType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errormessage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errorsource: Option<String>,

    /// Everything else the service sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn empty_payload() -> Value {
    Value::Object(Map::new())
}

impl Workitem {
    /// A fresh `new` workitem with a random id.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            retries: 0,
            payload,
            name: name.into(),
            wiq: None,
            state: State::New,
            errortype: None,
            errormessage: None,
            errorsource: None,
            extra: Map::new(),
        }
    }

    /// Mutable access to the payload as an object, replacing anything that
    /// isn't one with `{}`.
    pub fn payload_object(&mut self) -> &mut Map<String, Value> {
        if !self.payload.is_object() {
            self.payload = empty_payload();
        }
        match &mut self.payload {
            Value::Object(map) => map,
            _ => unreachable!("payload was just normalized to an object"),
        }
    }

    /// Mark this attempt successful and drop any stale error fields.
    pub fn mark_successful(&mut self) {
        self.state = State::Successful;
        self.errortype = None;
        self.errormessage = None;
        self.errorsource = None;
    }

    /// Mark this attempt failed with an application error; the service
    /// decides when to redeliver.
    pub fn mark_retry(&mut self, message: impl Into<String>, source: Option<String>) {
        self.state = State::Retry;
        self.errortype = Some(ErrorType::Application);
        self.errormessage = Some(message.into());
        self.errorsource = Some(source.unwrap_or_else(|| UNKNOWN_SOURCE.to_string()));
    }

    pub fn has_error(&self) -> bool {
        self.errortype.is_some() || self.errormessage.is_some() || self.errorsource.is_some()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Per-attempt state of a workitem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Not yet processed.
    #[default]
    New,
    /// Processed without error.
    Successful,
    /// Processing failed; the service should redeliver.
    Retry,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::New => "new",
            State::Successful => "successful",
            State::Retry => "retry",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(State::New),
            "successful" => Ok(State::Successful),
            "retry" => Ok(State::Retry),
            other => Err(format!("unknown workitem state: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Classifies a failed attempt. Processing failures are always
/// `application`; transport errors are the service's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Application,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorType::Application => write!(f, "application"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_service_workitem_and_keeps_unknown_fields() {
        let item: Workitem = serde_json::from_value(json!({
            "id": "wi-1",
            "retries": 2,
            "payload": {"initial": true},
            "name": "dummy",
            "state": "new",
            "priority": 5
        }))
        .unwrap();

        assert_eq!(item.id, "wi-1");
        assert_eq!(item.retries, 2);
        assert_eq!(item.state, State::New);
        assert_eq!(item.extra.get("priority"), Some(&json!(5)));

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["priority"], json!(5));
        assert!(back.get("errortype").is_none());
    }

    #[test]
    fn missing_payload_defaults_to_object() {
        let item: Workitem = serde_json::from_value(json!({"id": "x"})).unwrap();
        assert_eq!(item.payload, json!({}));
    }

    #[test]
    fn payload_object_replaces_non_objects() {
        let mut item = Workitem::new("n", json!("scalar"));
        item.payload_object().insert("k".into(), json!(1));
        assert_eq!(item.payload, json!({"k": 1}));
    }

    #[test]
    fn mark_retry_then_successful_clears_errors() {
        let mut item = Workitem::new("n", json!({}));
        item.mark_retry("boom", None);
        assert_eq!(item.state, State::Retry);
        assert_eq!(item.errortype, Some(ErrorType::Application));
        assert_eq!(item.errorsource.as_deref(), Some(UNKNOWN_SOURCE));

        let wire = serde_json::to_value(&item).unwrap();
        assert_eq!(wire["state"], json!("retry"));
        assert_eq!(wire["errortype"], json!("application"));

        item.mark_successful();
        assert_eq!(item.state, State::Successful);
        assert!(!item.has_error());
    }

    #[test]
    fn state_parses_wire_names() {
        assert_eq!("retry".parse::<State>().unwrap(), State::Retry);
        assert!("dead".parse::<State>().is_err());
        assert_eq!(State::Successful.to_string(), "successful");
    }
}
