//! Routes a rendered config to its resource client by [`Kind`] (`spec.md` §4.G).

use std::collections::BTreeMap;

use reconciler_types::{deterministic_uuid, settings_external_id, Config, DeployError, Kind, ResolvedEntity};
use serde_json::Value;

use crate::clients::automation::AutomationClient;
use crate::clients::bucket::BucketClient;
use crate::clients::classic::ClassicClient;
use crate::clients::settings::{legacy_external_id_for, SettingsClient};
use crate::transport::Transport;

pub struct Dispatcher<'a> {
    transport: &'a Transport,
}

impl<'a> Dispatcher<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// `rendered_body` is the config's template already rendered against
    /// `resolved` (see `reconciler_types::template::render`); `resolved` is
    /// additionally consulted directly for the `name`/`scope` parameters the
    /// dispatch logic itself needs.
    pub fn dispatch(
        &self,
        config: &Config,
        rendered_body: &Value,
        resolved: &BTreeMap<String, Value>,
    ) -> Result<ResolvedEntity, DeployError> {
        let scope = string_param(resolved, "scope");
        let name = string_param(resolved, "name");

        let id = match &config.kind {
            Kind::ClassicApi(api) => {
                let classic = ClassicClient::new(self.transport);
                let scope_ref = scope.as_deref();

                if api.is_single_configuration {
                    classic
                        .upsert_single_configuration(&api.api_id, scope_ref, rendered_body)
                        .map(|outcome| outcome.id().to_string())
                } else if api.is_non_unique_name {
                    let generated_id = deterministic_uuid(&config.coordinate).to_string();
                    let name = name.clone().unwrap_or_default();
                    classic
                        .upsert_by_non_unique_name_and_id(&api.api_id, scope_ref, &generated_id, &name, rendered_body)
                        .map(|(outcome, _possible_duplicate)| outcome.id().to_string())
                } else {
                    let is_mobile_application = api.api_id == "mobile-application";
                    match &config.origin_object_id {
                        Some(id) => classic
                            .upsert_by_id(&api.api_id, scope_ref, id, rendered_body, is_mobile_application)
                            .map(|outcome| outcome.id().to_string()),
                        None => {
                            let name = name.clone().unwrap_or_default();
                            classic
                                .upsert_by_name(&api.api_id, scope_ref, &name, rendered_body, is_mobile_application)
                                .map(|outcome| outcome.id().to_string())
                        }
                    }
                }
                .map_err(|source| DeployError::ConfigUpsert {
                    coordinate: config.coordinate.clone(),
                    source,
                })?
            }
            Kind::Settings { schema_id, schema_version } => {
                let settings = SettingsClient::new(self.transport);
                let external_id = settings_external_id(&config.coordinate.project, schema_id, &config.coordinate.config_id);
                let legacy_id = legacy_external_id_for(schema_id, &config.coordinate.config_id);
                let scope = scope.clone().unwrap_or_default();
                settings
                    .upsert(schema_id, &external_id, schema_version.as_deref(), &scope, rendered_body, Some(&legacy_id))
                    .map(|outcome| outcome.id().to_string())
                    .map_err(|source| DeployError::ConfigUpsert {
                        coordinate: config.coordinate.clone(),
                        source,
                    })?
            }
            Kind::Automation(resource) => {
                let automation = AutomationClient::new(self.transport);
                let id = deterministic_uuid(&config.coordinate).to_string();
                automation
                    .upsert(*resource, &id, rendered_body)
                    .map(|outcome| outcome.id().to_string())
                    .map_err(|source| DeployError::ConfigUpsert {
                        coordinate: config.coordinate.clone(),
                        source,
                    })?
            }
            Kind::Bucket { bucket_name } => {
                let bucket = BucketClient::new(self.transport);
                bucket
                    .upsert(bucket_name, rendered_body)
                    .map(|outcome| outcome.id().to_string())
                    .map_err(|source| DeployError::ConfigUpsert {
                        coordinate: config.coordinate.clone(),
                        source,
                    })?
            }
        };

        Ok(ResolvedEntity::deployed(config.coordinate.clone(), id))
    }
}

fn string_param(resolved: &BTreeMap<String, Value>, name: &str) -> Option<String> {
    resolved.get(name).and_then(|v| v.as_str()).map(str::to_string)
}
