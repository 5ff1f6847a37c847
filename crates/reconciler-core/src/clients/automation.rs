//! Automation resource client (`spec.md` §4.B "Automation client").

use reconciler_types::{AutomationResource, RespError};
use serde_json::Value;

use crate::transport::Transport;

use super::UpsertOutcome;

pub struct AutomationClient<'a> {
    transport: &'a Transport,
}

impl<'a> AutomationClient<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    fn path(resource: AutomationResource, id: &str) -> String {
        format!("/platform/automation/v1/{}/{id}", resource.path_segment())
    }

    fn list_path(resource: AutomationResource) -> String {
        format!("/platform/automation/v1/{}", resource.path_segment())
    }

    pub fn list(&self, resource: AutomationResource) -> Result<Vec<Value>, RespError> {
        let result = self.transport.paginate(&Self::list_path(resource), false, |body| {
            body.get("results").and_then(Value::as_array).cloned().unwrap_or_default()
        })?;
        Ok(result.entries)
    }

    pub fn get(&self, resource: AutomationResource, id: &str) -> Result<Value, RespError> {
        let path = Self::path(resource, id);
        let response = self.transport.get(&path)?;
        response.json().map_err(|e| RespError {
            status: response.status,
            headers: response.headers,
            body: e.to_string(),
            request_info: path,
        })
    }

    /// PUT to `/{resource}/{id}`; a 404 means the document doesn't exist yet,
    /// so it's created by POSTing the same payload with `id` embedded.
    pub fn upsert(&self, resource: AutomationResource, id: &str, payload: &Value) -> Result<UpsertOutcome, RespError> {
        let path = Self::path(resource, id);
        match self.transport.put(&path, payload) {
            Ok(_) => Ok(UpsertOutcome::Updated { id: id.to_string() }),
            Err(err) if err.status == 404 => {
                let mut body = payload.clone();
                if let Value::Object(map) = &mut body {
                    map.insert("id".to_string(), Value::String(id.to_string()));
                }
                self.transport.post(&Self::list_path(resource), &body)?;
                Ok(UpsertOutcome::Created { id: id.to_string() })
            }
            Err(err) => Err(err),
        }
    }

    /// Treats 404 as success: the resource is already gone.
    pub fn delete(&self, resource: AutomationResource, id: &str) -> Result<(), RespError> {
        match self.transport.delete(&Self::path(resource, id)) {
            Ok(_) => Ok(()),
            Err(err) if err.status == 404 => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_uses_resource_segment() {
        assert_eq!(
            AutomationClient::path(AutomationResource::Workflow, "abc"),
            "/platform/automation/v1/workflows/abc"
        );
        assert_eq!(
            AutomationClient::path(AutomationResource::BusinessCalendar, "abc"),
            "/platform/automation/v1/business-calendars/abc"
        );
    }

    #[test]
    fn list_path_has_no_trailing_id() {
        assert_eq!(
            AutomationClient::list_path(AutomationResource::SchedulingRule),
            "/platform/automation/v1/scheduling-rules"
        );
    }
}
