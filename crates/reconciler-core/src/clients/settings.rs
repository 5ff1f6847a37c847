//! Settings ("schema + scope") client (`spec.md` §4.B "Settings client").

use reconciler_types::{legacy_settings_external_id, RespError};
use serde_json::Value;

use crate::transport::Transport;

use super::UpsertOutcome;

const SETTINGS_PATH: &str = "/api/v2/settings/objects";

pub struct SettingsClient<'a> {
    transport: &'a Transport,
}

impl<'a> SettingsClient<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    pub fn list(&self, schema_id: &str, filter: Option<&str>) -> Result<Vec<Value>, RespError> {
        let mut path = format!("{SETTINGS_PATH}?schemaIds={schema_id}");
        if let Some(filter) = filter {
            path.push_str(&format!("&filter={filter}"));
        }
        let result = self.transport.paginate(&path, false, |body| {
            body.get("items").and_then(Value::as_array).cloned().unwrap_or_default()
        })?;
        Ok(result.entries)
    }

    pub fn get(&self, object_id: &str) -> Result<Value, RespError> {
        let path = format!("{SETTINGS_PATH}/{object_id}");
        let response = self.transport.get(&path)?;
        response.json().map_err(|e| RespError {
            status: response.status,
            headers: response.headers,
            body: e.to_string(),
            request_info: path,
        })
    }

    pub fn delete(&self, object_id: &str) -> Result<(), RespError> {
        self.transport.delete(&format!("{SETTINGS_PATH}/{object_id}"))?;
        Ok(())
    }

    /// Lists by `externalId`; PUT-by-objectId on a match, else POST. Also
    /// performs the opportunistic old->new externalId migration: if only a
    /// legacy-form externalId (no project prefix) is found, the legacy object
    /// is deleted and a fresh one created under the new externalId, rather
    /// than left duplicated.
    pub fn upsert(
        &self,
        schema_id: &str,
        external_id: &str,
        schema_version: Option<&str>,
        scope: &str,
        payload: &Value,
        legacy_external_id: Option<&str>,
    ) -> Result<UpsertOutcome, RespError> {
        let matches = self.list(schema_id, Some(&format!("externalId=={external_id}")))?;

        if let Some(existing) = matches.first() {
            return self.update_existing(existing, schema_id, external_id, schema_version, scope, payload);
        }

        if let Some(legacy_id) = legacy_external_id.filter(|id| *id != external_id) {
            let legacy_matches = self.list(schema_id, Some(&format!("externalId=={legacy_id}")))?;
            if let Some(legacy_object) = legacy_matches.first() {
                if let Some(object_id) = legacy_object.get("objectId").and_then(Value::as_str) {
                    self.delete(object_id)?;
                }
                return self.create(schema_id, external_id, schema_version, scope, payload);
            }
        }

        self.create(schema_id, external_id, schema_version, scope, payload)
    }

    fn update_existing(
        &self,
        existing: &Value,
        schema_id: &str,
        external_id: &str,
        schema_version: Option<&str>,
        scope: &str,
        payload: &Value,
    ) -> Result<UpsertOutcome, RespError> {
        let object_id = existing
            .get("objectId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let deletable = existing
            .get("modificationInfo")
            .and_then(|m| m.get("deletable"))
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if !deletable {
            return Ok(UpsertOutcome::SkippedNotDeletable { id: object_id });
        }

        let body = settings_envelope(schema_id, external_id, schema_version, scope, payload);
        self.transport.put(&format!("{SETTINGS_PATH}/{object_id}"), &body)?;
        Ok(UpsertOutcome::Updated { id: object_id })
    }

    fn create(
        &self,
        schema_id: &str,
        external_id: &str,
        schema_version: Option<&str>,
        scope: &str,
        payload: &Value,
    ) -> Result<UpsertOutcome, RespError> {
        let body = serde_json::Value::Array(vec![settings_envelope(schema_id, external_id, schema_version, scope, payload)]);
        let response = self.transport.post(SETTINGS_PATH, &body)?;
        let parsed = response.json().map_err(|e| RespError {
            status: response.status,
            headers: response.headers.clone(),
            body: e.to_string(),
            request_info: "POST settings objects".to_string(),
        })?;
        let object_id = parsed
            .as_array()
            .and_then(|a| a.first())
            .and_then(|entry| entry.get("objectId"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RespError {
                status: response.status,
                headers: response.headers.clone(),
                body: response.body.clone(),
                request_info: "POST settings objects (missing objectId in response)".to_string(),
            })?;
        Ok(UpsertOutcome::Created { id: object_id })
    }
}

fn settings_envelope(schema_id: &str, external_id: &str, schema_version: Option<&str>, scope: &str, payload: &Value) -> Value {
    let mut envelope = serde_json::json!({
        "schemaId": schema_id,
        "externalId": external_id,
        "scope": scope,
        "value": payload,
    });
    if let Some(version) = schema_version {
        envelope["schemaVersion"] = Value::String(version.to_string());
    }
    envelope
}

/// Convenience used by dispatch code to compute the legacy candidate before
/// calling [`SettingsClient::upsert`].
pub fn legacy_external_id_for(schema_id: &str, config_id: &str) -> String {
    legacy_settings_external_id(schema_id, config_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_envelope_includes_schema_version_when_present() {
        let envelope = settings_envelope("s", "eid", Some("1.2"), "env", &serde_json::json!({"k": "v"}));
        assert_eq!(envelope["schemaVersion"], "1.2");
        assert_eq!(envelope["externalId"], "eid");
        assert_eq!(envelope["value"]["k"], "v");
    }

    #[test]
    fn settings_envelope_omits_schema_version_when_absent() {
        let envelope = settings_envelope("s", "eid", None, "env", &serde_json::json!({}));
        assert!(envelope.get("schemaVersion").is_none());
    }

    #[test]
    fn legacy_external_id_matches_types_crate_helper() {
        assert_eq!(
            legacy_external_id_for("builtin:tags.auto-tagging", "c1"),
            legacy_settings_external_id("builtin:tags.auto-tagging", "c1")
        );
    }
}
