use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::store::RecordId;

/// One operation in a batch request, as read from JSON:
/// `{"op": "update", "resource": "users", "id": 3, "body": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum BatchOp {
    Create {
        resource: String,
        #[serde(default = "empty_body")]
        body: Value,
    },
    /// Shallow-merges `body` into the existing record.
    Update {
        resource: String,
        id: RecordId,
        body: Value,
    },
    Delete {
        resource: String,
        id: RecordId,
    },
}

fn empty_body() -> Value {
    Value::Object(Default::default())
}

impl BatchOp {
    pub fn resource(&self) -> &str {
        match self {
            BatchOp::Create { resource, .. }
            | BatchOp::Update { resource, .. }
            | BatchOp::Delete { resource, .. } => resource,
        }
    }
}

impl fmt::Display for BatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchOp::Create { resource, .. } => write!(f, "create {}", resource),
            BatchOp::Update { resource, id, .. } => write!(f, "update {}/{}", resource, id),
            BatchOp::Delete { resource, id } => write!(f, "delete {}/{}", resource, id),
        }
    }
}
