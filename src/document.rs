//! JSON-shaped documents and document identity.
//!
//! A [`Document`] wraps a JSON object. The shredder never parses the JSON
//! twice: [`Document::iter_leaves`] walks the tree once, yielding
//! `(path, type, value)` per leaf, where `path` is the normalized
//! JSON-pointer path without its leading slash (`user/name`).
//!
//! The field at `_id` is a 12-byte opaque identifier (24 hex chars on the
//! wire); its presence enables primary-key scans.

use serde_json::Value as Json;

use crate::error::ShaleError;
use crate::types::{LogicalType, Value};

/// Path of the identity field.
pub const ID_PATH: &str = "_id";

// ── Document id ────────────────────────────────────────────────────────────

/// 12-byte opaque document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId([u8; 12]);

impl DocumentId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Parse the 24-hex-char wire form.
    pub fn parse(s: &str) -> Result<Self, ShaleError> {
        if s.len() != 24 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ShaleError::Parse(format!(
                "document id must be 24 hex chars, got '{s}'"
            )));
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            // Validated hex above.
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).unwrap_or(0);
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(24);
        for b in self.0 {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// ── Document ───────────────────────────────────────────────────────────────

/// One leaf of a document tree.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub path: String,
    pub ty: LogicalType,
    pub value: Value,
}

/// A JSON-shaped record.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    json: Json,
}

impl Document {
    pub fn new(json: Json) -> Self {
        Self { json }
    }

    pub fn parse(text: &str) -> Result<Self, ShaleError> {
        serde_json::from_str(text)
            .map(Self::new)
            .map_err(|e| ShaleError::Parse(format!("malformed document: {e}")))
    }

    /// Whether this is a shreddable record: a non-empty JSON object.
    pub fn is_valid(&self) -> bool {
        matches!(&self.json, Json::Object(map) if !map.is_empty())
    }

    pub fn json(&self) -> &Json {
        &self.json
    }

    /// The document's identity, when it carries a well-formed `_id`.
    pub fn id(&self) -> Option<DocumentId> {
        match self.json.get(ID_PATH) {
            Some(Json::String(s)) => DocumentId::parse(s).ok(),
            _ => None,
        }
    }

    /// Value at a normalized path (`user/name`), if present.
    pub fn get(&self, path: &str) -> Option<Value> {
        let mut node = &self.json;
        for segment in path.split('/') {
            node = node.get(segment)?;
        }
        leaf_value(node)
    }

    /// Walk the tree once, yielding every leaf in document order.
    ///
    /// Explicit JSON nulls are treated as absent fields: they produce no
    /// leaf, and the shredder leaves their columns invalid.
    pub fn iter_leaves(&self) -> Vec<Leaf> {
        let mut leaves = Vec::new();
        if let Json::Object(map) = &self.json {
            for (key, value) in map {
                collect_leaves(key.clone(), value, &mut leaves);
            }
        }
        leaves
    }
}

fn collect_leaves(path: String, node: &Json, out: &mut Vec<Leaf>) {
    match node {
        Json::Null => {}
        Json::Object(map) => {
            for (key, value) in map {
                collect_leaves(format!("{path}/{key}"), value, out);
            }
        }
        other => {
            if let Some(value) = leaf_value(other) {
                out.push(Leaf {
                    path,
                    ty: value.logical_type(),
                    value,
                });
            }
        }
    }
}

/// Convert a non-object JSON node into a logical value.
fn leaf_value(node: &Json) -> Option<Value> {
    match node {
        Json::Null => None,
        Json::Bool(b) => Some(Value::Boolean(*b)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::BigInt(i))
            } else if let Some(u) = n.as_u64() {
                Some(Value::UBigInt(u))
            } else {
                n.as_f64().map(Value::Double)
            }
        }
        Json::String(s) => Some(Value::String(s.clone())),
        Json::Array(items) => {
            let values: Vec<Value> = items.iter().filter_map(leaf_value).collect();
            Some(Value::List(values))
        }
        Json::Object(_) => None,
    }
}
