//! Replay files
//!
//! One JSON object per line:
//! - `{"stream": "Square", "data": {"color": "BLUE", "x": 1}}` publishes a sample
//! - `{"stream": "Square", "dispose": {"color": "BLUE"}}` disposes the instance
//! - `{"stream": "Square", "unregister": {"color": "BLUE"}}` marks it without writers
//!
//! An optional `"delay_ms"` waits before the event. Blank lines and lines
//! starting with `#` are skipped.

use std::path::Path;
use std::time::Duration;

use contracts::DataMap;
use serde::Deserialize;

use crate::error::{CliError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayAction {
    Publish(DataMap),
    Dispose(DataMap),
    Unregister(DataMap),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEvent {
    pub stream: String,
    pub delay: Duration,
    pub action: ReplayAction,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplayLine {
    stream: String,
    #[serde(default)]
    delay_ms: u64,
    data: Option<DataMap>,
    dispose: Option<DataMap>,
    unregister: Option<DataMap>,
}

impl ReplayLine {
    fn into_event(self) -> std::result::Result<ReplayEvent, String> {
        if self.stream.is_empty() {
            return Err("stream must not be empty".into());
        }
        let action = match (self.data, self.dispose, self.unregister) {
            (Some(data), None, None) => ReplayAction::Publish(data),
            (None, Some(key), None) => ReplayAction::Dispose(key),
            (None, None, Some(key)) => ReplayAction::Unregister(key),
            _ => return Err("expected exactly one of data, dispose, unregister".into()),
        };
        Ok(ReplayEvent {
            stream: self.stream,
            delay: Duration::from_millis(self.delay_ms),
            action,
        })
    }
}

/// Parse replay events from `content`; `path` only labels errors
pub fn parse_replay(path: &Path, content: &str) -> Result<Vec<ReplayEvent>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str::<ReplayLine>(line)
                .map_err(|e| e.to_string())
                .and_then(ReplayLine::into_event)
                .map_err(|message| CliError::replay(path, index + 1, message))
        })
        .collect()
}

pub fn load_replay(path: &Path) -> Result<Vec<ReplayEvent>> {
    let content = std::fs::read_to_string(path)?;
    parse_replay(path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::data_map;
    use std::io::Write;

    fn parse(content: &str) -> Result<Vec<ReplayEvent>> {
        parse_replay(Path::new("test.jsonl"), content)
    }

    #[test]
    fn test_parse_all_actions() {
        let events = parse(
            r#"
# shapes
{"stream": "Circle", "data": {"y": 9}}
{"stream": "Square", "data": {"x": 1, "y": 2}, "delay_ms": 20}
{"stream": "Square", "dispose": {}}
{"stream": "Square", "unregister": {"color": "RED"}}
"#,
        )
        .unwrap();

        assert_eq!(events.len(), 4);
        assert_eq!(events[0].action, ReplayAction::Publish(data_map! { "y" => 9 }));
        assert_eq!(events[1].delay, Duration::from_millis(20));
        assert_eq!(events[2].action, ReplayAction::Dispose(DataMap::new()));
        assert_eq!(
            events[3].action,
            ReplayAction::Unregister(data_map! { "color" => "RED" })
        );
    }

    #[test]
    fn test_errors_carry_line_number() {
        let err = parse("{\"stream\": \"A\", \"data\": {}}\n{\"stream\": \"A\"}\n").unwrap_err();
        match err {
            CliError::Replay { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }

        assert!(parse(r#"{"stream": "A", "data": {}, "dispose": {}}"#).is_err());
        assert!(parse(r#"{"stream": "", "data": {}}"#).is_err());
        assert!(parse(r#"{"stream": "A", "data": {}, "speed": 2}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"stream": "Square", "data": {{"x": 3}}}}"#).unwrap();

        let events = load_replay(file.path()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stream, "Square");
    }
}
