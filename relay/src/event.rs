use serde::Deserialize;
use serde_json::Value;

use crate::RelayError;

/// Raw ingest event as it arrives, either flat or wrapped in a `body` field
/// (an object, or a JSON-encoded string as HTTP triggers deliver it).
#[derive(Debug, Deserialize)]
struct IngestEvent {
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    video_id: Option<Value>,
    #[serde(default)]
    prompt: Option<String>,
}

/// A validated unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub video_url: String,
    /// Reference at most this many frames in the payload. `None` means all.
    pub count: Option<usize>,
    /// Forwarded to the payload untouched, whatever its JSON type.
    pub video_id: Option<Value>,
    pub prompt: Option<String>,
}

pub fn parse_event(raw: &[u8]) -> Result<Job, RelayError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| RelayError::InvalidEvent(format!("event is not valid JSON: {e}")))?;

    let value = match value {
        Value::Object(mut map) => match map.remove("body") {
            Some(Value::String(body)) => serde_json::from_str(&body).map_err(|e| {
                RelayError::InvalidEvent(format!("event body is not valid JSON: {e}"))
            })?,
            Some(body) => body,
            None => Value::Object(map),
        },
        _ => {
            return Err(RelayError::InvalidEvent(
                "event must be a JSON object".into(),
            ))
        }
    };

    let event: IngestEvent = serde_json::from_value(value)
        .map_err(|e| RelayError::InvalidEvent(format!("malformed event: {e}")))?;

    let video_url = event
        .video_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| RelayError::InvalidEvent("missing video_url".into()))?;

    Ok(Job {
        video_url,
        count: event.count.filter(|&n| n > 0),
        video_id: event.video_id.filter(|id| !id.is_null()),
        prompt: event.prompt.filter(|p| !p.trim().is_empty()),
    })
}
