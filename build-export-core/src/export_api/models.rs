use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ExportApiError;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Build {
    #[serde(rename = "buildId")]
    pub build_id: String,

    /// Everything else the server told us about the build, kept as-is.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Build {
    pub fn new<S: Into<String>>(build_id: S) -> Build {
        Build {
            build_id: build_id.into(),
            metadata: Map::new(),
        }
    }

    pub fn from_json(data: &str) -> Result<Build, ExportApiError> {
        serde_json::from_str(data).map_err(|e| ExportApiError::MalformedPayload("Build", e))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventTypeInfo {
    #[serde(rename = "eventType")]
    pub event_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BuildEvent {
    #[serde(rename = "type")]
    pub event_type: EventTypeInfo,

    /// Milliseconds since the epoch.
    pub timestamp: i64,

    #[serde(default)]
    pub data: Value,
}

impl BuildEvent {
    pub fn new<S: Into<String>>(event_type: S, timestamp: i64, data: Value) -> BuildEvent {
        BuildEvent {
            event_type: EventTypeInfo {
                event_type: event_type.into(),
            },
            timestamp,
            data,
        }
    }

    pub fn from_json(data: &str) -> Result<BuildEvent, ExportApiError> {
        serde_json::from_str(data).map_err(|e| ExportApiError::MalformedPayload("BuildEvent", e))
    }

    pub fn event_type(&self) -> &str {
        &self.event_type.event_type
    }

    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|v| v.as_str())
    }

    pub fn data_bool(&self, field: &str) -> Option<bool> {
        self.data.get(field).and_then(|v| v.as_bool())
    }
}

/// The point in time, by publication to the server, from which builds get processed.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(try_from = "RawProcessFrom")]
pub enum ProcessFrom {
    #[default]
    Now,
    EpochMillis(u64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawProcessFrom {
    Millis(u64),
    Text(String),
}

impl TryFrom<RawProcessFrom> for ProcessFrom {
    type Error = ExportApiError;

    fn try_from(raw: RawProcessFrom) -> Result<Self, Self::Error> {
        match raw {
            RawProcessFrom::Millis(ms) => Ok(ProcessFrom::EpochMillis(ms)),
            RawProcessFrom::Text(s) => s.parse(),
        }
    }
}

impl FromStr for ProcessFrom {
    type Err = ExportApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("now") {
            return Ok(ProcessFrom::Now);
        }
        s.parse::<u64>()
            .map(ProcessFrom::EpochMillis)
            .map_err(|_| ExportApiError::InvalidProcessFrom(s.to_string()))
    }
}

impl fmt::Display for ProcessFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessFrom::Now => write!(f, "now"),
            ProcessFrom::EpochMillis(ms) => write!(f, "{}", ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_keeps_metadata() {
        let build = Build::from_json(
            r#"{"buildId":"abc123","pluginVersion":"3.6","buildToolType":"gradle"}"#,
        )
        .unwrap();

        assert_eq!(build.build_id, "abc123");
        assert_eq!(build.metadata.get("buildToolType"), Some(&json!("gradle")));
    }

    #[test]
    fn test_build_event_decode() {
        let event = BuildEvent::from_json(
            r#"{"type":{"majorVersion":1,"minorVersion":0,"eventType":"TaskFinished"},
                "timestamp":1600000000123,
                "data":{"path":":app:compileJava","cacheable":true}}"#,
        )
        .unwrap();

        assert_eq!(event.event_type(), "TaskFinished");
        assert_eq!(event.timestamp, 1600000000123);
        assert_eq!(event.data_str("path"), Some(":app:compileJava"));
        assert_eq!(event.data_bool("cacheable"), Some(true));
    }

    #[test]
    fn test_malformed_build_event() {
        let err = BuildEvent::from_json("{not json").unwrap_err();
        assert!(matches!(err, ExportApiError::MalformedPayload("BuildEvent", _)));
    }

    #[test]
    fn test_process_from() {
        assert_eq!("now".parse::<ProcessFrom>().unwrap(), ProcessFrom::Now);
        assert_eq!(
            "1600000000000".parse::<ProcessFrom>().unwrap(),
            ProcessFrom::EpochMillis(1600000000000)
        );
        assert!("yesterday".parse::<ProcessFrom>().is_err());
        assert_eq!(ProcessFrom::EpochMillis(42).to_string(), "42");
    }
}
