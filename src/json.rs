//! JSON ingestion and egress, behind the default-on `json` feature.
//!
//! This is the boundary where the silent-omission policy lives: JSON `null`
//! and values the data model cannot carry are dropped, never errors. The
//! graph side is strictly richer than JSON (cycles, sharing, non-string
//! keys), so egress is best-effort and refuses cyclic graphs.

use serde_json::{Map, Number};

use crate::error::{Result, TabwireError};
use crate::script::format_number;
use crate::value::{Arena, NodeId, Value};

/// Deepest composite nesting `to_json` renders, matching the recursion
/// limit the JSON parser applies on ingestion.
const EGRESS_DEPTH_MAX: usize = 128;

impl Arena {
    /// Parses a JSON document into this arena, returning the converted
    /// root value. `null` anywhere in the document is silently dropped:
    /// omitted from objects and skipped in arrays. A top-level `null`
    /// converts to an empty composite.
    pub fn from_json(&mut self, text: &str) -> Result<Value> {
        let doc: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| TabwireError::Transport(format!("malformed JSON: {e}")))?;
        Ok(self.ingest(&doc).unwrap_or_else(|| Value::Node(self.add_node())))
    }

    fn ingest(&mut self, doc: &serde_json::Value) -> Option<Value> {
        match doc {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number),
            serde_json::Value::String(s) => Some(Value::str(s.as_str())),
            serde_json::Value::Array(items) => {
                let node = self.add_node();
                let mut index = 1u64;
                for item in items {
                    if let Some(v) = self.ingest(item) {
                        self.insert(node, Value::Number(index as f64), v);
                        index += 1;
                    }
                }
                Some(Value::Node(node))
            }
            serde_json::Value::Object(fields) => {
                let node = self.add_node();
                for (key, field) in fields {
                    if let Some(v) = self.ingest(field) {
                        self.insert(node, Value::str(key.as_str()), v);
                    }
                }
                Some(Value::Node(node))
            }
        }
    }

    /// Renders a value from this arena as JSON.
    ///
    /// Returns `None` when a cycle is reachable or nesting exceeds 128
    /// composites; shared nodes duplicate. Non-finite
    /// numbers become `null`, non-UTF-8 strings convert lossily, non-string
    /// keys render through their literal form, composite keys drop.
    pub fn to_json(&self, value: &Value) -> Option<serde_json::Value> {
        let mut trail: Vec<NodeId> = Vec::new();
        self.egress(value, &mut trail)
    }

    fn egress(&self, value: &Value, trail: &mut Vec<NodeId>) -> Option<serde_json::Value> {
        match value {
            Value::Number(x) => Some(
                Number::from_f64(*x).map_or(serde_json::Value::Null, serde_json::Value::Number),
            ),
            Value::Str(s) => Some(serde_json::Value::String(
                String::from_utf8_lossy(s).into_owned(),
            )),
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::Node(id) => {
                if trail.contains(id) || trail.len() >= EGRESS_DEPTH_MAX {
                    return None;
                }
                trail.push(*id);
                let out = self.egress_node(*id, trail);
                trail.pop();
                out
            }
        }
    }

    fn egress_node(&self, node: NodeId, trail: &mut Vec<NodeId>) -> Option<serde_json::Value> {
        let pairs = self.pairs(node);

        // A pure 1..n array part renders as a JSON array.
        let is_array = !pairs.is_empty()
            && pairs.iter().enumerate().all(|(i, (k, _))| {
                matches!(k, Value::Number(x) if *x == (i + 1) as f64)
            });
        if is_array {
            let mut items = Vec::with_capacity(pairs.len());
            for (_, v) in pairs {
                items.push(self.egress(v, trail)?);
            }
            return Some(serde_json::Value::Array(items));
        }

        let mut fields = Map::new();
        for (k, v) in pairs {
            let key = match k {
                Value::Str(s) => String::from_utf8_lossy(s).into_owned(),
                Value::Number(x) => format_number(*x),
                Value::Bool(b) => b.to_string(),
                Value::Node(_) => continue,
            };
            fields.insert(key, self.egress(v, trail)?);
        }
        Some(serde_json::Value::Object(fields))
    }
}
