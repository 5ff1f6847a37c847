//! Four kind-shaped resource clients sitting on top of [`crate::transport::Transport`]
//! (`spec.md` §4.B). Every client returns a typed result or a [`RespError`] —
//! none of them mutate the payload they're handed; callers own that value.

pub mod automation;
pub mod bucket;
pub mod classic;
pub mod settings;

use serde_json::Value;

/// Outcome of any of the four clients' upsert operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created { id: String },
    Updated { id: String },
    /// The remote object refused modification (`modificationInfo.deletable=false`
    /// on a settings object); the caller should report a warning, not an error.
    SkippedNotDeletable { id: String },
}

impl UpsertOutcome {
    pub fn id(&self) -> &str {
        match self {
            UpsertOutcome::Created { id } => id,
            UpsertOutcome::Updated { id } => id,
            UpsertOutcome::SkippedNotDeletable { id } => id,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created { .. })
    }
}

/// Merge `{"id": id}` into a JSON object payload ahead of a classic-API PUT,
/// without disturbing any other field (`spec.md` §4.B "dashboard-specific
/// id-injection").
pub(crate) fn inject_id(payload: &Value, id: &str) -> Value {
    let mut merged = payload.clone();
    if let Value::Object(map) = &mut merged {
        map.insert("id".to_string(), Value::String(id.to_string()));
    }
    merged
}

/// Strip the immutable `applicationType` field mobile-application updates must
/// not resend.
pub(crate) fn strip_application_type(payload: &Value) -> Value {
    let mut stripped = payload.clone();
    if let Value::Object(map) = &mut stripped {
        map.remove("applicationType");
    }
    stripped
}
