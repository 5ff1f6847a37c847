//! Core domain types for the reconciler engine.
//!
//! This crate is pure data and pure functions: coordinates, the polymorphic
//! parameter model, templating, configs, kinds, resolved entities,
//! environments, projects, the error taxonomy and the JSONL report shape, plus
//! the raw manifest/config-file wire types. Nothing here touches the network,
//! the filesystem, or threads — those live in `reconciler-core`.

pub mod config;
pub mod coordinate;
pub mod entity;
pub mod environment;
pub mod errors;
pub mod ids;
pub mod kind;
pub mod manifest;
pub mod parameter;
pub mod project;
pub mod report;
pub mod template;

pub use config::Config;
pub use coordinate::Coordinate;
pub use entity::ResolvedEntity;
pub use environment::{Auth, Environment, Indirected};
pub use errors::{DeployError, EnvironmentDeploymentErrors, RespError, ValidationError};
pub use ids::{deterministic_uuid, legacy_settings_external_id, settings_external_id};
pub use kind::{AutomationResource, ClassicApiKind, Kind};
pub use manifest::{
    AuthSpec, AuthSpecError, ConfigEntry, ConfigFileDocument, ConfigTypeSpec, EnvironmentEntry, EnvironmentGroupEntry,
    ManifestDocument, OAuthSpec, ProjectEntry, ProjectType,
};
pub use parameter::{EntityLookup, Parameter, Reference, ResolveError};
pub use project::Project;
pub use report::{ConfigRef, DeployState, Detail, DetailLevel, ReportRecord, ReportSubscriber};
pub use template::{Template, TemplateError};
