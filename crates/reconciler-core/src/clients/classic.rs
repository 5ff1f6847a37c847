//! Classic REST API client (`spec.md` §4.B "Classic client").

use reconciler_types::RespError;
use serde_json::Value;

use crate::transport::Transport;

use super::{inject_id, strip_application_type, UpsertOutcome};

#[derive(Debug, Clone)]
pub struct ClassicListEntry {
    pub id: String,
    pub name: Option<String>,
    pub owner: Option<String>,
}

pub struct ClassicClient<'a> {
    transport: &'a Transport,
}

impl<'a> ClassicClient<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    fn base_path(api_id: &str, scope: Option<&str>) -> String {
        match scope {
            Some(scope) => format!("/api/config/v1/{api_id}/{scope}"),
            None => format!("/api/config/v1/{api_id}"),
        }
    }

    pub fn list(&self, api_id: &str, scope: Option<&str>) -> Result<Vec<ClassicListEntry>, RespError> {
        let base = Self::base_path(api_id, scope);
        let result = self.transport.paginate(&base, true, |body| extract_entries(body))?;
        Ok(result
            .entries
            .into_iter()
            .filter_map(|v| {
                let id = v.get("id").and_then(Value::as_str)?.to_string();
                Some(ClassicListEntry {
                    id,
                    name: v.get("name").and_then(Value::as_str).map(str::to_string),
                    owner: v.get("owner").and_then(Value::as_str).map(str::to_string),
                })
            })
            .collect())
    }

    pub fn get(&self, api_id: &str, scope: Option<&str>, id: &str) -> Result<Value, RespError> {
        let path = format!("{}/{id}", Self::base_path(api_id, scope));
        let response = self.transport.get(&path)?;
        response.json().map_err(|e| RespError {
            status: response.status,
            headers: response.headers,
            body: e.to_string(),
            request_info: path,
        })
    }

    /// PUT to a fixed, id-less path, for single-configuration APIs.
    pub fn upsert_single_configuration(&self, api_id: &str, scope: Option<&str>, payload: &Value) -> Result<UpsertOutcome, RespError> {
        let path = Self::base_path(api_id, scope);
        let response = self.transport.put(&path, payload)?;
        Ok(UpsertOutcome::Updated {
            id: response.location_id().unwrap_or_else(|| api_id.to_string()),
        })
    }

    /// PUT directly to a known remote id, skipping the list-then-match a
    /// plain [`Self::upsert_by_name`] would otherwise do. Used when a config
    /// carries an `originObjectId` (`spec.md` §3) — the id was already
    /// established by a prior deployment or import, so there's no need to
    /// rediscover it by name.
    pub fn upsert_by_id(
        &self,
        api_id: &str,
        scope: Option<&str>,
        id: &str,
        payload: &Value,
        is_mobile_application: bool,
    ) -> Result<UpsertOutcome, RespError> {
        let mut body = inject_id(payload, id);
        if is_mobile_application {
            body = strip_application_type(&body);
        }
        let path = format!("{}/{id}", Self::base_path(api_id, scope));
        self.transport.put(&path, &body)?;
        Ok(UpsertOutcome::Updated { id: id.to_string() })
    }

    pub fn upsert_by_name(
        &self,
        api_id: &str,
        scope: Option<&str>,
        name: &str,
        payload: &Value,
        is_mobile_application: bool,
    ) -> Result<UpsertOutcome, RespError> {
        let existing = self.list(api_id, scope)?;
        let matched = existing.iter().find(|e| e.name.as_deref() == Some(name));

        let base = Self::base_path(api_id, scope);
        match matched {
            Some(entry) => {
                let mut body = inject_id(payload, &entry.id);
                if is_mobile_application {
                    body = strip_application_type(&body);
                }
                let path = format!("{base}/{}", entry.id);
                self.transport.put(&path, &body)?;
                Ok(UpsertOutcome::Updated { id: entry.id.clone() })
            }
            None => {
                let create_path = if api_id == "app-detection-rule" {
                    format!("{base}?position=PREPEND")
                } else {
                    base.clone()
                };
                let response = self.transport.post(&create_path, payload)?;
                let id = response
                    .location_id()
                    .or_else(|| response.json().ok()?.get("id")?.as_str().map(str::to_string))
                    .ok_or_else(|| RespError {
                        status: response.status,
                        headers: response.headers.clone(),
                        body: response.body.clone(),
                        request_info: format!("POST {create_path} (missing id in response)"),
                    })?;
                Ok(UpsertOutcome::Created { id })
            }
        }
    }

    /// For non-unique-name APIs: the engine supplies a deterministic
    /// `generated_id`. Prefer an exact name match first (adopt it), then an
    /// object already carrying `generated_id`, else create at that id.
    pub fn upsert_by_non_unique_name_and_id(
        &self,
        api_id: &str,
        scope: Option<&str>,
        generated_id: &str,
        name: &str,
        payload: &Value,
    ) -> Result<(UpsertOutcome, bool), RespError> {
        let existing = self.list(api_id, scope)?;
        let base = Self::base_path(api_id, scope);
        let name_matches: Vec<&ClassicListEntry> = existing.iter().filter(|e| e.name.as_deref() == Some(name)).collect();

        if name_matches.len() == 1 {
            let entry = name_matches[0];
            let body = inject_id(payload, &entry.id);
            self.transport.put(&format!("{base}/{}", entry.id), &body)?;
            return Ok((UpsertOutcome::Updated { id: entry.id.clone() }, false));
        }

        if existing.iter().any(|e| e.id == generated_id) {
            let body = inject_id(payload, generated_id);
            self.transport.put(&format!("{base}/{generated_id}"), &body)?;
            return Ok((UpsertOutcome::Updated { id: generated_id.to_string() }, false));
        }

        let body = inject_id(payload, generated_id);
        self.transport.put(&format!("{base}/{generated_id}"), &body)?;
        // Potential-duplicate warning: more than one existing object shares `name`.
        Ok((UpsertOutcome::Created { id: generated_id.to_string() }, name_matches.len() > 1))
    }

    pub fn delete(&self, api_id: &str, scope: Option<&str>, id: &str) -> Result<(), RespError> {
        let path = format!("{}/{id}", Self::base_path(api_id, scope));
        self.transport.delete(&path)?;
        Ok(())
    }
}

/// Most classic endpoints return `{"values": [...]}`; a minority return a bare
/// array (`aws-credentials` among them).
fn extract_entries(body: &Value) -> Vec<Value> {
    if let Some(values) = body.get("values").and_then(Value::as_array) {
        values.clone()
    } else if let Some(array) = body.as_array() {
        array.clone()
    } else {
        Vec::new()
    }
}
