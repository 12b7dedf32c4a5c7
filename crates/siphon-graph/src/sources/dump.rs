//! Snapshot source backed by `pw-dump`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{GraphSource, ReadFailure};
use crate::tool::{run_tool, ToolError};
use crate::{ObjectKind, RawObject, Snapshot, SnapshotBuilder};

pub struct PwDumpSource {
    program: String,
    timeout: Duration,
    builder: SnapshotBuilder,
}

impl PwDumpSource {
    pub fn new(program: impl Into<String>, hub_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            builder: SnapshotBuilder::new(hub_name),
        }
    }
}

#[async_trait]
impl GraphSource for PwDumpSource {
    async fn read(&self) -> Result<Snapshot, ReadFailure> {
        let no_args: [&str; 0] = [];
        let output = run_tool(&self.program, &no_args, self.timeout)
            .await
            .map_err(|e| match e {
                ToolError::Timeout { after, .. } => ReadFailure::Timeout(after),
                ToolError::Spawn { .. } => ReadFailure::Unavailable(e.to_string()),
            })?;

        if !output.success {
            warn!(code = ?output.code, "pw-dump exited with failure");
            return Err(ReadFailure::Unavailable(format!(
                "{} exited with {:?}: {}",
                self.program,
                output.code,
                output.message()
            )));
        }

        let objects = parse_dump(&output.stdout)?;
        Ok(self.builder.build(objects))
    }

    fn name(&self) -> &'static str {
        "pw-dump"
    }
}

/// Parse `pw-dump` JSON into raw graph objects.
///
/// Entries that are not objects, or are of an interface type other than
/// node, port or link, are skipped. Props from `props` and `info.props` are
/// merged, the latter winning; non-string values are stringified.
pub fn parse_dump(json: &str) -> Result<Vec<RawObject>, ReadFailure> {
    let root: Value = serde_json::from_str(json).map_err(|e| ReadFailure::Malformed(e.to_string()))?;
    let Value::Array(entries) = root else {
        return Err(ReadFailure::Malformed("top level is not an array".to_string()));
    };

    let mut objects = Vec::new();
    for entry in &entries {
        let Some(map) = entry.as_object() else {
            continue;
        };
        let Some(kind) = map.get("type").and_then(Value::as_str).and_then(ObjectKind::from_type) else {
            continue;
        };
        let Some(id) = map.get("id").and_then(Value::as_u64).and_then(|id| u32::try_from(id).ok()) else {
            debug!("skipping dump entry without id");
            continue;
        };

        let mut obj = RawObject::new(id, kind);
        let info = map.get("info").and_then(Value::as_object);

        merge_props(&mut obj, map.get("props"));
        merge_props(&mut obj, info.and_then(|i| i.get("props")));

        if let Some(info) = info {
            obj.info_direction = info.get("direction").and_then(Value::as_str).map(String::from);
            if kind == ObjectKind::Link {
                link_ids_from_info(&mut obj, info);
            }
        }

        objects.push(obj);
    }

    Ok(objects)
}

fn merge_props(obj: &mut RawObject, props: Option<&Value>) {
    let Some(props) = props.and_then(Value::as_object) else {
        return;
    };
    for (key, value) in props {
        if let Some(s) = stringify(value) {
            obj.props.insert(key.clone(), s);
        }
    }
}

/// Link endpoints also live in `info.output-port-id` / `info.input-port-id`.
fn link_ids_from_info(obj: &mut RawObject, info: &Map<String, Value>) {
    for (info_key, prop_key) in [("output-port-id", "link.output.port"), ("input-port-id", "link.input.port")] {
        if obj.props.contains_key(prop_key) {
            continue;
        }
        if let Some(id) = info.get(info_key).and_then(Value::as_u64) {
            obj.props.insert(prop_key.to_string(), id.to_string());
        }
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_merges_and_stringifies_props() {
        let json = r#"[
            {"id": 40, "type": "PipeWire:Interface:Port",
             "props": {"port.name": "stale"},
             "info": {"direction": "output",
                      "props": {"node.id": 7, "port.name": "output_FL", "port.id": 0,
                                "port.monitor": false}}},
            "garbage",
            {"id": 3, "type": "PipeWire:Interface:Client", "info": {}},
            {"type": "PipeWire:Interface:Node"}
        ]"#;

        let objects = parse_dump(json).unwrap();
        assert_eq!(objects.len(), 1);
        let port = &objects[0];
        assert_eq!(port.kind, ObjectKind::Port);
        assert_eq!(port.props["port.name"], "output_FL");
        assert_eq!(port.props["node.id"], "7");
        assert_eq!(port.props["port.monitor"], "false");
        assert_eq!(port.info_direction.as_deref(), Some("output"));
    }

    #[test]
    fn test_link_ids_from_info() {
        let json = r#"[{"id": 90, "type": "PipeWire:Interface:Link",
                        "info": {"output-port-id": 41, "input-port-id": 52, "props": {}}}]"#;
        let objects = parse_dump(json).unwrap();
        assert_eq!(objects[0].props["link.output.port"], "41");
        assert_eq!(objects[0].props["link.input.port"], "52");
    }

    #[test]
    fn test_malformed_dump() {
        assert!(matches!(parse_dump("{not json"), Err(ReadFailure::Malformed(_))));
        assert!(matches!(parse_dump(r#"{"id": 1}"#), Err(ReadFailure::Malformed(_))));
        assert!(parse_dump("[]").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tool_is_unavailable() {
        let source = PwDumpSource::new("siphon-no-such-pw-dump", "siphon", Duration::from_secs(1));
        assert!(matches!(source.read().await, Err(ReadFailure::Unavailable(_))));
    }
}
