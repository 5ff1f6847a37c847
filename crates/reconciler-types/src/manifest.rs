//! Wire shapes for the manifest and per-config YAML files (`spec.md` §6). These
//! are plain `serde`-derived structs; turning bytes into them (YAML parsing,
//! directory walking) is the loader's job in `reconciler-core`, kept
//! deliberately thin per the out-of-scope note in `spec.md` §1.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::environment::{Auth, Indirected};
use crate::kind::{AutomationResource, ClassicApiKind, Kind};
use crate::parameter::Parameter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Simple,
    Grouping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSpec {
    pub client_id: Indirected,
    pub client_secret: Indirected,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Indirected>,
    #[serde(rename = "oAuth", default, skip_serializing_if = "Option::is_none")]
    pub o_auth: Option<OAuthSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSpecError {
    pub message: String,
}

impl std::fmt::Display for AuthSpecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AuthSpecError {}

impl AuthSpec {
    pub fn into_auth(self) -> Result<Auth, AuthSpecError> {
        match (self.token, self.o_auth) {
            (Some(token), None) => Ok(Auth::Token { token }),
            (None, Some(o_auth)) => Ok(Auth::OAuth {
                client_id: o_auth.client_id,
                client_secret: o_auth.client_secret,
                token_endpoint: o_auth.token_endpoint,
            }),
            (Some(_), Some(_)) => Err(AuthSpecError {
                message: "environment auth specifies both a token and oAuth; exactly one is required".into(),
            }),
            (None, None) => Err(AuthSpecError {
                message: "environment auth specifies neither a token nor oAuth".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    pub name: String,
    pub url: Indirected,
    pub auth: AuthSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentGroupEntry {
    pub name: String,
    pub environments: Vec<EnvironmentEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    pub manifest_version: String,
    pub projects: Vec<ProjectEntry>,
    pub environment_groups: Vec<EnvironmentGroupEntry>,
}

/// Raw `type:` tag of a config-file entry, one step removed from [`Kind`]: it
/// mirrors the manifest's own vocabulary (`api`/`settings`/`automation`/`bucket`)
/// before the loader folds in defaults and cross-checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigTypeSpec {
    Api {
        api: String,
        #[serde(default)]
        is_single_configuration: bool,
        #[serde(default)]
        is_non_unique_name: bool,
        #[serde(default)]
        is_sub_path_scoped: bool,
    },
    Settings {
        schema: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema_version: Option<String>,
    },
    Automation {
        resource: AutomationResource,
    },
    Bucket {
        bucket_name: String,
    },
}

impl ConfigTypeSpec {
    pub fn into_kind(self) -> Kind {
        match self {
            ConfigTypeSpec::Api {
                api,
                is_single_configuration,
                is_non_unique_name,
                is_sub_path_scoped,
            } => Kind::ClassicApi(ClassicApiKind {
                api_id: api,
                is_single_configuration,
                is_non_unique_name,
                is_sub_path_scoped,
            }),
            ConfigTypeSpec::Settings { schema, schema_version } => Kind::Settings {
                schema_id: schema,
                schema_version,
            },
            ConfigTypeSpec::Automation { resource } => Kind::Automation(resource),
            ConfigTypeSpec::Bucket { bucket_name } => Kind::Bucket { bucket_name },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub id: String,
    #[serde(flatten)]
    pub config_type: ConfigTypeSpec,
    pub template: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(default)]
    pub skip: bool,
    /// The remote primary key to use for update, when known up front
    /// (`spec.md` §3 "Config" / "originObjectId").
    #[serde(default, rename = "originObjectId", skip_serializing_if = "Option::is_none")]
    pub origin_object_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFileDocument {
    pub configs: Vec<ConfigEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_spec_requires_exactly_one_variant() {
        let token_only = AuthSpec {
            token: Some(Indirected::Value { value: "t".into() }),
            o_auth: None,
        };
        assert!(token_only.into_auth().is_ok());

        let neither = AuthSpec { token: None, o_auth: None };
        assert!(neither.into_auth().is_err());

        let both = AuthSpec {
            token: Some(Indirected::Value { value: "t".into() }),
            o_auth: Some(OAuthSpec {
                client_id: Indirected::Value { value: "id".into() },
                client_secret: Indirected::Value { value: "secret".into() },
                token_endpoint: None,
            }),
        };
        assert!(both.into_auth().is_err());
    }

    #[test]
    fn config_type_spec_converts_to_kind() {
        let api = ConfigTypeSpec::Api {
            api: "dashboard-v2".into(),
            is_single_configuration: false,
            is_non_unique_name: true,
            is_sub_path_scoped: false,
        };
        match api.into_kind() {
            Kind::ClassicApi(k) => {
                assert_eq!(k.api_id, "dashboard-v2");
                assert!(k.is_non_unique_name);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn manifest_document_round_trips_through_yaml_shaped_json() {
        let manifest = ManifestDocument {
            manifest_version: "1.0".into(),
            projects: vec![ProjectEntry {
                name: "proj".into(),
                path: "projects/proj".into(),
                project_type: ProjectType::Simple,
            }],
            environment_groups: vec![EnvironmentGroupEntry {
                name: "default".into(),
                environments: vec![EnvironmentEntry {
                    name: "prod".into(),
                    url: Indirected::Value {
                        value: "https://prod.example.com".into(),
                    },
                    auth: AuthSpec {
                        token: Some(Indirected::Environment {
                            name: "PROD_TOKEN".into(),
                        }),
                        o_auth: None,
                    },
                }],
            }],
        };

        let json = serde_json::to_string(&manifest).unwrap();
        let back: ManifestDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn config_entry_flattens_the_type_tag_alongside_sibling_fields() {
        let json = serde_json::json!({
            "id": "d1",
            "type": "api",
            "api": "dashboard-v2",
            "is_non_unique_name": true,
            "template": "dashboard.json",
            "parameters": {},
        });
        let entry: ConfigEntry = serde_json::from_value(json).unwrap();
        assert_eq!(entry.id, "d1");
        assert!(matches!(entry.config_type, ConfigTypeSpec::Api { is_non_unique_name: true, .. }));
    }
}
