use serde::{Deserialize, Serialize};

/// Resource family addressed by the automation client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutomationResource {
    Workflow,
    BusinessCalendar,
    SchedulingRule,
}

impl AutomationResource {
    /// Path segment this resource lives under, e.g. `/workflows/{id}`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            AutomationResource::Workflow => "workflows",
            AutomationResource::BusinessCalendar => "business-calendars",
            AutomationResource::SchedulingRule => "scheduling-rules",
        }
    }
}

/// Metadata carried by a classic REST API config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassicApiKind {
    pub api_id: String,
    /// True when the API has at most one instance, addressed without an id (PUT
    /// to a fixed path).
    #[serde(default)]
    pub is_single_configuration: bool,
    /// True when several objects may share a display name; identity is carried
    /// by a UUID the engine generates deterministically from the coordinate.
    #[serde(default)]
    pub is_non_unique_name: bool,
    /// True when the API's path contains a parent id supplied as the config's
    /// `scope` parameter.
    #[serde(default)]
    pub is_sub_path_scoped: bool,
}

impl ClassicApiKind {
    pub fn new(api_id: impl Into<String>) -> Self {
        Self {
            api_id: api_id.into(),
            is_single_configuration: false,
            is_non_unique_name: false,
            is_sub_path_scoped: false,
        }
    }

    pub fn single_configuration(mut self) -> Self {
        self.is_single_configuration = true;
        self
    }

    pub fn non_unique_name(mut self) -> Self {
        self.is_non_unique_name = true;
        self
    }

    pub fn sub_path_scoped(mut self) -> Self {
        self.is_sub_path_scoped = true;
        self
    }
}

/// Tagged variant discriminating how a config is shipped, carrying only the
/// metadata its resource client needs (`spec.md` §9 "inheritance among API
/// kinds" note).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kind {
    ClassicApi(ClassicApiKind),
    Settings {
        schema_id: String,
        schema_version: Option<String>,
    },
    Automation(AutomationResource),
    Bucket {
        bucket_name: String,
    },
}

impl Kind {
    /// Platform-only kinds must not target an environment whose auth is a bare
    /// classic token (invariant 4 in `spec.md` §3).
    pub fn is_platform_only(&self) -> bool {
        matches!(self, Kind::Automation(_) | Kind::Bucket { .. })
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Kind::ClassicApi(_) => "classic-api",
            Kind::Settings { .. } => "settings",
            Kind::Automation(_) => "automation",
            Kind::Bucket { .. } => "bucket",
        }
    }

    /// Whether this kind requires a `scope` parameter on its [`crate::config::Config`].
    pub fn requires_scope_parameter(&self) -> bool {
        match self {
            Kind::Settings { .. } => true,
            Kind::ClassicApi(api) => api.is_sub_path_scoped,
            Kind::Automation(_) | Kind::Bucket { .. } => false,
        }
    }

    /// Whether this kind requires a `name` parameter on its [`crate::config::Config`].
    pub fn requires_name_parameter(&self) -> bool {
        matches!(self, Kind::ClassicApi(api) if !api.is_single_configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn automation_and_bucket_are_platform_only() {
        assert!(Kind::Automation(AutomationResource::Workflow).is_platform_only());
        assert!(
            Kind::Bucket {
                bucket_name: "b".into()
            }
            .is_platform_only()
        );
    }

    #[test]
    fn classic_and_settings_are_not_platform_only() {
        assert!(!Kind::ClassicApi(ClassicApiKind::new("dashboard-v2")).is_platform_only());
        assert!(
            !Kind::Settings {
                schema_id: "builtin:tags.auto-tagging".into(),
                schema_version: None,
            }
            .is_platform_only()
        );
    }

    #[test]
    fn settings_and_sub_path_scoped_classic_require_scope() {
        assert!(
            Kind::Settings {
                schema_id: "s".into(),
                schema_version: None
            }
            .requires_scope_parameter()
        );
        let scoped = ClassicApiKind::new("api").sub_path_scoped();
        assert!(Kind::ClassicApi(scoped).requires_scope_parameter());
        assert!(!Kind::ClassicApi(ClassicApiKind::new("api")).requires_scope_parameter());
    }

    #[test]
    fn single_configuration_classic_does_not_require_name() {
        let single = ClassicApiKind::new("api").single_configuration();
        assert!(!Kind::ClassicApi(single).requires_name_parameter());
        assert!(Kind::ClassicApi(ClassicApiKind::new("api")).requires_name_parameter());
    }

    #[test]
    fn automation_path_segments_match_documented_families() {
        assert_eq!(AutomationResource::Workflow.path_segment(), "workflows");
        assert_eq!(
            AutomationResource::BusinessCalendar.path_segment(),
            "business-calendars"
        );
        assert_eq!(AutomationResource::SchedulingRule.path_segment(), "scheduling-rules");
    }

    #[test]
    fn kind_serializes_as_tagged_json() {
        let kind = Kind::Bucket {
            bucket_name: "logs".into(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "bucket");
        assert_eq!(json["bucket_name"], "logs");
    }
}
