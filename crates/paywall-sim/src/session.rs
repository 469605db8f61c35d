//! Fixture and session file loading.
//!
//! A session is JSON Lines: one surface envelope per line, exactly as the
//! checkout would post it. A line may carry an extra `origin` field to
//! replay a message from somewhere other than the checkout. Blank lines and
//! lines starting with `#` are skipped.

use std::{fs, path::Path};

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::SimError;

/// One recorded inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    /// Origin override; `None` replays from the checkout's origin
    pub origin: Option<String>,
    /// Raw data as posted
    pub data: String,
}

#[derive(Deserialize)]
struct SessionLine {
    #[serde(default)]
    origin: Option<String>,
    #[serde(flatten)]
    envelope: Map<String, Value>,
}

/// Read a whole-file JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SimError> {
    let text = read(path)?;
    serde_json::from_str(&text).map_err(|source| SimError::Json {
        path: path.to_path_buf(),
        line: 0,
        source,
    })
}

/// Read a JSON Lines session.
pub fn read_session(path: &Path) -> Result<Vec<SessionEvent>, SimError> {
    parse_session(&read(path)?, path)
}

fn read(path: &Path) -> Result<String, SimError> {
    fs::read_to_string(path).map_err(|source| SimError::Io { path: path.to_path_buf(), source })
}

/// Parse session text; `path` is only used in errors.
pub fn parse_session(text: &str, path: &Path) -> Result<Vec<SessionEvent>, SimError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            let parsed: SessionLine = serde_json::from_str(line).map_err(|source| {
                SimError::Json { path: path.to_path_buf(), line: index + 1, source }
            })?;
            Ok(SessionEvent {
                origin: parsed.origin,
                data: Value::Object(parsed.envelope).to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use paywall_core::keys::KeyRecord;
    use paywall_proto::{Message, NetworkConfigs, PaywallConfig};

    use super::*;

    #[test]
    fn parses_lines_and_origin_overrides() {
        let text = r#"
# surface boots
{"kind":"handshake"}

{"kind":"checkout.userInfo","payload":{"address":"0xUser"},"origin":"https://evil.example"}
"#;
        let events = parse_session(text, Path::new("session.jsonl")).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].origin, None);
        assert_eq!(Message::decode(events[0].data.as_bytes()).unwrap(), Message::Handshake);
        assert_eq!(events[1].origin.as_deref(), Some("https://evil.example"));
        assert!(!events[1].data.contains("origin"));
    }

    #[test]
    fn reports_line_of_bad_json() {
        let text = "{\"kind\":\"handshake\"}\nnot json\n";
        match parse_session(text, Path::new("s.jsonl")) {
            Err(SimError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected json error, got {other:?}"),
        }
    }

    #[test]
    fn reads_network_map_with_numeric_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"4": {{"provider": "https://rpc.example", "unlockAppUrl": "https://app.example"}}}}"#
        )
        .unwrap();
        let networks: NetworkConfigs = read_json(file.path()).unwrap();
        assert_eq!(networks[&4].unlock_app_url, "https://app.example");
    }

    #[test]
    fn bundled_fixtures_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        let config: PaywallConfig = read_json(&dir.join("config.json")).unwrap();
        let networks: NetworkConfigs = read_json(&dir.join("networks.json")).unwrap();
        config.validate(&networks).unwrap();

        let keys: Vec<KeyRecord> = read_json(&dir.join("keys.json")).unwrap();
        assert_eq!(keys.len(), 1);

        let events = read_session(&dir.join("session.jsonl")).unwrap();
        assert_eq!(events.len(), 9);
        assert_eq!(events.iter().filter(|event| event.origin.is_some()).count(), 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let result: Result<NetworkConfigs, _> = read_json(Path::new("/nonexistent/networks.json"));
        assert!(matches!(result, Err(SimError::Io { .. })));
    }
}
